//! Driver loop: one cycle every `interval` until shut down.
//!
//! Cycle order: fetch zones, drain pending manual requests, report today's
//! usage, then simulate, store, and evaluate one reading per zone. Each step
//! and each zone is isolated; a failure is logged and the cycle carries on.

use crate::db::gateway::{insert_row, select_valid_rows, Direction, Query, StoreError, Table};
use crate::db::models::Zone;
use crate::services::alerts::AlertOutcome;
use crate::services::context::Context;
use crate::services::requests::{process_pending_requests, RequestSummary};
use crate::services::rules::{evaluate, Decision, IrrigationOutcome};
use crate::services::simulate::SensorSimulator;
use crate::services::usage::{report_daily_usage, UsageReport};
use log::{error, info, warn};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Cloneable stop signal for the loop. Triggering it also cuts short the
/// wait between cycles.
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Shutdown {
    pub fn new() -> Self {
        Shutdown::default()
    }

    pub fn trigger(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for up to `timeout`. Returns true if shutdown was requested.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (stopped, _) = cvar
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *stopped
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleReport {
    pub zones: usize,
    pub readings: usize,
    pub alerts: usize,
    /// Rule/smart irrigations plus completed manual requests.
    pub irrigations: usize,
    pub failures: usize,
    pub requests: Option<RequestSummary>,
    pub usage: Option<UsageReport>,
}

pub fn fetch_zones(ctx: &Context) -> Result<Vec<Zone>, StoreError> {
    select_valid_rows(ctx.store, Table::Zones, &Query::new().order_by("id", Direction::Asc))
}

pub fn run_cycle(ctx: &Context, simulator: &mut SensorSimulator) -> CycleReport {
    let mut report = CycleReport::default();

    let zones = match fetch_zones(ctx) {
        Ok(z) => Some(z),
        Err(e) => {
            error!("Fetching zones failed; skipping zone pass this cycle: {}", e);
            report.failures += 1;
            None
        }
    };

    match process_pending_requests(ctx) {
        Ok(summary) => {
            report.irrigations += summary.completed.len();
            report.failures += summary.failed.len();
            report.requests = Some(summary);
        }
        Err(e) => {
            warn!("Processing manual requests failed: {}", e);
            report.failures += 1;
        }
    }

    match report_daily_usage(ctx) {
        Ok(usage) => report.usage = Some(usage),
        Err(e) => {
            warn!("Daily usage report failed: {}", e);
            report.failures += 1;
        }
    }

    for zone in zones.iter().flatten() {
        report.zones += 1;
        let reading = simulator.reading(&zone.id);
        if let Err(e) = insert_row(ctx.store, Table::SensorReadings, &reading) {
            warn!("Zone {}: storing reading failed, not evaluating: {}", zone.label(), e);
            report.failures += 1;
            continue;
        }
        report.readings += 1;

        match evaluate(ctx, zone, reading.moisture) {
            Ok(Decision::Low { alert, irrigation }) => {
                match alert {
                    AlertOutcome::Raised => report.alerts += 1,
                    AlertOutcome::Failed => report.failures += 1,
                    AlertOutcome::Deduplicated => {}
                }
                if let IrrigationOutcome::Started { .. } = irrigation {
                    report.irrigations += 1;
                }
            }
            Ok(Decision::Suppressed | Decision::MoistureOk) => {}
            Err(e) => {
                warn!("Zone {}: evaluation failed: {}", zone.label(), e);
                report.failures += 1;
            }
        }
    }

    report
}

/// Run cycles at a steady cadence until `shutdown` fires or `max_cycles`
/// have completed. Returns the number of cycles run.
pub fn run_loop(
    ctx: &Context,
    simulator: &mut SensorSimulator,
    interval: Duration,
    shutdown: &Shutdown,
    max_cycles: Option<u64>,
) -> u64 {
    let mut cycles: u64 = 0;
    while !shutdown.is_triggered() {
        let tick_start = Instant::now();

        let report = run_cycle(ctx, simulator);
        cycles += 1;
        info!(
            "Cycle {} done in {}ms (zones={}, readings={}, alerts={}, irrigations={}, failures={})",
            cycles,
            tick_start.elapsed().as_millis(),
            report.zones,
            report.readings,
            report.alerts,
            report.irrigations,
            report.failures
        );

        if max_cycles.is_some_and(|max| cycles >= max) {
            break;
        }

        // Maintain steady cadence
        let elapsed = tick_start.elapsed();
        if elapsed < interval && shutdown.wait(interval - elapsed) {
            break;
        }
    }
    info!("Driver loop stopped after {} cycle(s)", cycles);
    cycles
}
