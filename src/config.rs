//! Runtime configuration from the process environment.
//! Defaults mirror the simulator's stock cadence and irrigation policy.

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_POLL_SECS: u64 = 15;
pub const DEFAULT_COOLDOWN_MINUTES: i64 = 30;
pub const DEFAULT_ALERT_WINDOW_MINUTES: i64 = 60;
pub const DEFAULT_FLOW_RATE_LPM: f64 = 20.0;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone)]
pub struct StoreCredentials {
    pub url: String,
    pub api_key: String,
}

impl std::fmt::Debug for StoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCredentials")
            .field("url", &self.url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` only when running against the in-memory store.
    pub store: Option<StoreCredentials>,
    /// Driver loop cadence.
    pub poll_interval: Duration,
    pub cooldown_minutes: i64,
    pub alert_window_minutes: i64,
    /// Litres delivered per minute of irrigation.
    pub flow_rate_lpm: f64,
    pub request_timeout: Duration,
    /// Fixed seed for the reading simulator; random when unset.
    pub simulation_seed: Option<u64>,
}

impl Config {
    pub fn from_env(require_store: bool) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), require_store)
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F, require_store: bool) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let url = get("SUPABASE_URL");
        // The service key wins over the anon key when both are present.
        let api_key = get("SUPABASE_KEY").or_else(|| get("SUPABASE_ANON_KEY"));
        let store = match (url, api_key) {
            (Some(url), Some(api_key)) => {
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    return Err(ConfigError::Invalid {
                        var: "SUPABASE_URL",
                        value: url,
                        reason: "must start with http:// or https://".to_string(),
                    });
                }
                Some(StoreCredentials { url, api_key })
            }
            (None, _) if require_store => return Err(ConfigError::Missing("SUPABASE_URL")),
            (_, None) if require_store => return Err(ConfigError::Missing("SUPABASE_KEY")),
            _ => None,
        };

        let poll_secs = parse_var(&get, "POLL_INTERVAL_SECS", DEFAULT_POLL_SECS)?;
        if poll_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "POLL_INTERVAL_SECS",
                value: poll_secs.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        let cooldown_minutes = parse_var(&get, "COOLDOWN_MINUTES", DEFAULT_COOLDOWN_MINUTES)?;
        let alert_window_minutes = parse_var(&get, "ALERT_WINDOW_MINUTES", DEFAULT_ALERT_WINDOW_MINUTES)?;
        for (var, v) in [
            ("COOLDOWN_MINUTES", cooldown_minutes),
            ("ALERT_WINDOW_MINUTES", alert_window_minutes),
        ] {
            if v < 0 {
                return Err(ConfigError::Invalid {
                    var,
                    value: v.to_string(),
                    reason: "must not be negative".to_string(),
                });
            }
        }

        let flow_rate_lpm = parse_var(&get, "FLOW_RATE_LPM", DEFAULT_FLOW_RATE_LPM)?;
        if !(flow_rate_lpm.is_finite() && flow_rate_lpm > 0.0) {
            return Err(ConfigError::Invalid {
                var: "FLOW_RATE_LPM",
                value: flow_rate_lpm.to_string(),
                reason: "must be a positive number".to_string(),
            });
        }

        let timeout_secs = parse_var(&get, "REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        let simulation_seed = get("SIMULATION_SEED")
            .map(|raw| {
                raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                    var: "SIMULATION_SEED",
                    value: raw.clone(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Config {
            store,
            poll_interval: Duration::from_secs(poll_secs),
            cooldown_minutes,
            alert_window_minutes,
            flow_rate_lpm,
            request_timeout: Duration::from_secs(timeout_secs),
            simulation_seed,
        })
    }
}

fn parse_var<G, T>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
