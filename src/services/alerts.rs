use crate::db::gateway::{insert_row, select_rows, Direction, Query, Table};
use crate::db::models::{AlertStatus, NewAlert, RecordId, Severity, Stamped};
use crate::services::context::{Context, EngineError};
use chrono::Duration;
use log::{debug, info};

/// True when an open alert of this type exists for the zone and is younger
/// than `window`. Only the latest row's `created_at` is decoded.
pub fn alert_exists_recent(
    ctx: &Context,
    zone_id: &RecordId,
    alert_type: &str,
    window: Duration,
) -> Result<bool, EngineError> {
    let q = Query::new()
        .eq("zone_id", zone_id)
        .eq("alert_type", alert_type)
        .eq("status", "open")
        .order_by("created_at", Direction::Desc)
        .limit(1);
    let rows: Vec<Stamped> = select_rows(ctx.store, Table::Alerts, &q)?;
    let Some(latest) = rows.into_iter().next() else {
        return Ok(false);
    };
    let age = ctx.clock.now() - latest.created_at;
    debug!(
        "Zone {}: open {} alert is {}s old (window {}s)",
        zone_id,
        alert_type,
        age.num_seconds(),
        window.num_seconds()
    );
    Ok(age < window)
}

pub fn create_alert(
    ctx: &Context,
    zone_id: &RecordId,
    alert_type: &str,
    severity: Severity,
    message: String,
) -> Result<NewAlert, EngineError> {
    let row = NewAlert {
        zone_id: zone_id.clone(),
        alert_type: alert_type.to_string(),
        severity,
        message,
        status: AlertStatus::Open,
    };
    insert_row(ctx.store, Table::Alerts, &row)?;
    info!("Zone {}: raised {} alert: {}", zone_id, alert_type, row.message);
    Ok(row)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    Raised,
    /// A recent open alert already covers this condition.
    Deduplicated,
    /// The dedup check or insert errored; the caller logged it and moved on.
    Failed,
}

/// Raise an alert unless an open one of the same type is still inside the
/// policy window.
pub fn raise_deduplicated(
    ctx: &Context,
    zone_id: &RecordId,
    alert_type: &str,
    severity: Severity,
    message: String,
) -> Result<AlertOutcome, EngineError> {
    if alert_exists_recent(ctx, zone_id, alert_type, ctx.policy.alert_window)? {
        debug!("Zone {}: {} alert suppressed (recent open alert)", zone_id, alert_type);
        return Ok(AlertOutcome::Deduplicated);
    }
    create_alert(ctx, zone_id, alert_type, severity, message)?;
    Ok(AlertOutcome::Raised)
}
