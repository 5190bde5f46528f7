//! Cooldown gate and irrigation event logging.
//!
//! The most recent `irrigation_logs` row per zone is the only cooldown state;
//! nothing is cached between calls, so the gate survives restarts.

use crate::db::gateway::{insert_row, select_rows, Direction, Query, Table};
use crate::db::models::{IrrigationMode, NewIrrigationLog, RecordId, Stamped};
use crate::services::context::{Context, EngineError};
use chrono::{DateTime, Utc};
use log::{debug, info};

/// Time of the most recent irrigation for a zone, if any.
///
/// Only `created_at` is read. A malformed timestamp on the latest row is an
/// error rather than "no history", so it can never open the gate.
pub fn last_irrigation(ctx: &Context, zone_id: &RecordId) -> Result<Option<DateTime<Utc>>, EngineError> {
    let q = Query::new()
        .eq("zone_id", zone_id)
        .order_by("created_at", Direction::Desc)
        .limit(1);
    let rows: Vec<Stamped> = select_rows(ctx.store, Table::IrrigationLogs, &q)?;
    Ok(rows.into_iter().next().map(|r| r.created_at))
}

/// True when the zone has never been irrigated or its last irrigation is
/// strictly older than the cooldown.
pub fn can_irrigate(ctx: &Context, zone_id: &RecordId) -> Result<bool, EngineError> {
    let Some(last) = last_irrigation(ctx, zone_id)? else {
        return Ok(true);
    };
    let elapsed = ctx.clock.now() - last;
    debug!(
        "Zone {}: last irrigation {}s ago (cooldown {}s)",
        zone_id,
        elapsed.num_seconds(),
        ctx.policy.cooldown.num_seconds()
    );
    Ok(elapsed > ctx.policy.cooldown)
}

/// Append an irrigation event; litres are derived from the flow rate.
pub fn log_irrigation(
    ctx: &Context,
    zone_id: &RecordId,
    minutes: f64,
    mode: IrrigationMode,
) -> Result<NewIrrigationLog, EngineError> {
    if !(minutes.is_finite() && minutes > 0.0) {
        return Err(EngineError::InvalidRecord {
            table: Table::IrrigationLogs,
            reason: format!("irrigation duration must be positive, got {}", minutes),
        });
    }
    let row = NewIrrigationLog::new(zone_id.clone(), minutes, mode, ctx.policy.flow_rate_lpm);
    insert_row(ctx.store, Table::IrrigationLogs, &row)?;
    info!(
        "Zone {}: logged {} irrigation of {} min ({:.1} litres)",
        zone_id, mode, minutes, row.litres_used
    );
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::gateway::Gateway;
    use crate::db::memory::MemoryStore;
    use crate::services::context::Policy;
    use crate::utils::{format_utc, ManualClock};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use std::rc::Rc;

    fn setup() -> (Rc<ManualClock>, MemoryStore) {
        let clock = Rc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap()));
        let store = MemoryStore::new(Box::new(clock.clone()));
        (clock, store)
    }

    fn seed_log(store: &MemoryStore, zone: i64, minutes_ago: i64, clock: &ManualClock) {
        use crate::utils::Clock;
        let ts = clock.now() - Duration::minutes(minutes_ago);
        store
            .insert(
                Table::IrrigationLogs,
                &json!({"zone_id": zone, "duration_minutes": 5, "litres_used": 100, "mode": "rule", "created_at": format_utc(ts)}),
            )
            .unwrap();
    }

    #[test]
    fn never_irrigated_zone_may_irrigate() {
        let (clock, store) = setup();
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        assert!(can_irrigate(&ctx, &RecordId::Int(1)).unwrap());
    }

    #[test]
    fn recent_log_blocks_and_old_log_permits() {
        let (clock, store) = setup();
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        seed_log(&store, 1, 10, &clock);
        seed_log(&store, 2, 40, &clock);
        assert!(!can_irrigate(&ctx, &RecordId::Int(1)).unwrap());
        assert!(can_irrigate(&ctx, &RecordId::Int(2)).unwrap());
    }

    #[test]
    fn exact_boundary_is_still_cooling_down() {
        let (clock, store) = setup();
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        seed_log(&store, 1, 30, &clock);
        assert!(!can_irrigate(&ctx, &RecordId::Int(1)).unwrap());
        clock.advance(Duration::seconds(1));
        assert!(can_irrigate(&ctx, &RecordId::Int(1)).unwrap());
    }

    #[test]
    fn only_the_latest_log_counts() {
        let (clock, store) = setup();
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        seed_log(&store, 1, 5, &clock);
        seed_log(&store, 1, 120, &clock);
        assert!(!can_irrigate(&ctx, &RecordId::Int(1)).unwrap());
    }

    #[test]
    fn malformed_latest_timestamp_is_an_error() {
        let (clock, store) = setup();
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        store
            .insert(
                Table::IrrigationLogs,
                &json!({"zone_id": 1, "duration_minutes": 5, "created_at": "not-a-time"}),
            )
            .unwrap();
        assert!(can_irrigate(&ctx, &RecordId::Int(1)).is_err());
    }

    #[test]
    fn nulls_outside_created_at_do_not_block_the_gate() {
        let (clock, store) = setup();
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        store
            .insert(
                Table::IrrigationLogs,
                &json!({"zone_id": 1, "duration_minutes": null, "litres_used": null, "mode": null, "created_at": "2024-07-01T07:00:00Z"}),
            )
            .unwrap();
        assert!(can_irrigate(&ctx, &RecordId::Int(1)).unwrap());
        assert_eq!(
            last_irrigation(&ctx, &RecordId::Int(1)).unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 7, 1, 7, 0, 0).unwrap())
        );
    }

    #[test]
    fn logs_litres_from_flow_rate() {
        let (clock, store) = setup();
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        let row = log_irrigation(&ctx, &RecordId::Int(3), 12.0, IrrigationMode::Manual).unwrap();
        assert_eq!(row.litres_used, 240.0);
        let stored = store.rows(Table::IrrigationLogs);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0]["litres_used"], 240.0);
        assert_eq!(stored[0]["mode"], "manual");
        assert!(!can_irrigate(&ctx, &RecordId::Int(3)).unwrap());
    }

    #[test]
    fn rejects_non_positive_duration() {
        let (clock, store) = setup();
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        assert!(log_irrigation(&ctx, &RecordId::Int(3), 0.0, IrrigationMode::Rule).is_err());
        assert!(store.rows(Table::IrrigationLogs).is_empty());
    }
}
