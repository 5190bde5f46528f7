use crate::db::gateway::{select_valid_rows, Query, Table};
use crate::db::models::IrrigationLog;
use crate::services::context::{Context, EngineError};
use crate::utils::format_utc;
use chrono::{Days, NaiveDate};
use log::info;

#[derive(Debug, Clone, PartialEq)]
pub struct UsageReport {
    pub date: NaiveDate,
    pub total_litres: f64,
    /// Irrigation events counted towards the total.
    pub events: usize,
}

/// Total litres logged on the current UTC calendar day. Read-only.
pub fn report_daily_usage(ctx: &Context) -> Result<UsageReport, EngineError> {
    let today = ctx.clock.now().date_naive();
    let start = today.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
    let end = today
        .checked_add_days(Days::new(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc());
    let (Some(start), Some(end)) = (start, end) else {
        return Err(EngineError::InvalidRecord {
            table: Table::IrrigationLogs,
            reason: format!("no day boundary for {}", today),
        });
    };

    let q = Query::new()
        .gte("created_at", format_utc(start))
        .lt("created_at", format_utc(end));
    let logs: Vec<IrrigationLog> = select_valid_rows(ctx.store, Table::IrrigationLogs, &q)?;

    let mut report = UsageReport {
        date: today,
        total_litres: 0.0,
        events: 0,
    };
    // A text-typed created_at column is compared lexically by the store.
    for entry in logs.iter().filter(|l| l.created_at.date_naive() == today) {
        if let Some(litres) = entry.litres_used {
            report.total_litres += litres;
            report.events += 1;
        }
    }

    info!(
        "Total water used today ({}): {:.1} litres over {} irrigation(s)",
        report.date, report.total_litres, report.events
    );
    Ok(report)
}
