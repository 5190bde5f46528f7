//! Manual irrigation requests, handled oldest first.
//!
//! A request blocked by the cooldown stays `pending` and is looked at again on
//! the next cycle; it is never rejected.

use crate::db::gateway::{select_valid_rows, Direction, Filter, Query, Table};
use crate::db::models::{IrrigationMode, IrrigationRequest, RecordId, RequestStatus};
use crate::services::context::{Context, EngineError};
use crate::services::irrigation::{can_irrigate, log_irrigation};
use crate::utils::format_utc;
use log::{info, warn};
use serde_json::json;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RequestSummary {
    /// Irrigated and marked done, in processing order.
    pub completed: Vec<RecordId>,
    /// Left pending because the zone is cooling down.
    pub deferred: Vec<RecordId>,
    /// Invalid or failed; left pending.
    pub failed: Vec<RecordId>,
}

pub fn fetch_pending_requests(ctx: &Context) -> Result<Vec<IrrigationRequest>, EngineError> {
    let q = Query::new()
        .eq("status", "pending")
        .order_by("created_at", Direction::Asc);
    Ok(select_valid_rows(ctx.store, Table::IrrigationRequests, &q)?)
}

pub fn mark_request_done(ctx: &Context, request_id: &RecordId) -> Result<(), EngineError> {
    let patch = json!({
        "status": RequestStatus::Done,
        "processed_at": format_utc(ctx.clock.now()),
    });
    let updated = ctx
        .store
        .update(Table::IrrigationRequests, &patch, &[Filter::eq("id", request_id)])?;
    if updated.is_empty() {
        return Err(EngineError::InvalidRecord {
            table: Table::IrrigationRequests,
            reason: format!("request {} vanished before it could be marked done", request_id),
        });
    }
    Ok(())
}

enum Handled {
    Completed,
    Deferred,
}

fn handle_request(ctx: &Context, req: &IrrigationRequest) -> Result<Handled, EngineError> {
    if !(req.minutes.is_finite() && req.minutes > 0.0) {
        return Err(EngineError::InvalidRecord {
            table: Table::IrrigationRequests,
            reason: format!("request {} asks for {} minutes", req.id, req.minutes),
        });
    }
    if !can_irrigate(ctx, &req.zone_id)? {
        info!(
            "Manual request {} (zone {}): cooldown active, leaving pending",
            req.id, req.zone_id
        );
        return Ok(Handled::Deferred);
    }
    log_irrigation(ctx, &req.zone_id, req.minutes, IrrigationMode::Manual)?;
    mark_request_done(ctx, &req.id)?;
    Ok(Handled::Completed)
}

/// Process every pending request in FIFO order. A failure on one request is
/// logged and does not stop the rest.
pub fn process_pending_requests(ctx: &Context) -> Result<RequestSummary, EngineError> {
    let pending = fetch_pending_requests(ctx)?;
    let mut summary = RequestSummary::default();

    for req in &pending {
        info!(
            "Manual request {}: zone={} minutes={}",
            req.id, req.zone_id, req.minutes
        );
        match handle_request(ctx, req) {
            Ok(Handled::Completed) => summary.completed.push(req.id.clone()),
            Ok(Handled::Deferred) => summary.deferred.push(req.id.clone()),
            Err(e) => {
                warn!("Manual request {} failed: {}", req.id, e);
                summary.failed.push(req.id.clone());
            }
        }
    }

    Ok(summary)
}
