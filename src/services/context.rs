use crate::config::Config;
use crate::db::gateway::{Gateway, StoreError, Table};
use crate::utils::Clock;
use chrono::Duration;
use thiserror::Error;

/// Irrigation policy knobs shared by every decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    /// Minimum time between two irrigation events for one zone.
    pub cooldown: Duration,
    /// Age below which an open alert suppresses a new one of the same type.
    pub alert_window: Duration,
    pub flow_rate_lpm: f64,
}

impl Policy {
    pub fn from_config(cfg: &Config) -> Self {
        Policy {
            cooldown: Duration::minutes(cfg.cooldown_minutes),
            alert_window: Duration::minutes(cfg.alert_window_minutes),
            flow_rate_lpm: cfg.flow_rate_lpm,
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            cooldown: Duration::minutes(crate::config::DEFAULT_COOLDOWN_MINUTES),
            alert_window: Duration::minutes(crate::config::DEFAULT_ALERT_WINDOW_MINUTES),
            flow_rate_lpm: crate::config::DEFAULT_FLOW_RATE_LPM,
        }
    }
}

/// Everything a decision needs: the store, a clock, and the policy.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub store: &'a dyn Gateway,
    pub clock: &'a dyn Clock,
    pub policy: Policy,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a dyn Gateway, clock: &'a dyn Clock, policy: Policy) -> Self {
        Context { store, clock, policy }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid {table} record: {reason}")]
    InvalidRecord { table: Table, reason: String },
}
