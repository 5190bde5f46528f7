//! Per-zone irrigation decision.
//!
//! `manual` zones are never evaluated automatically. `rule` and `smart` zones
//! compare the reading against the zone threshold: below it, a deduplicated
//! `low_moisture` warning is raised and, when the cooldown gate allows,
//! irrigation runs for the zone's configured maximum.

use crate::db::models::{alert_types, IrrigationMode, Severity, Zone};
use crate::services::alerts::{raise_deduplicated, AlertOutcome};
use crate::services::context::{Context, EngineError};
use crate::services::irrigation::{can_irrigate, log_irrigation};
use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IrrigationOutcome {
    Started { minutes: f64, litres: f64 },
    Cooldown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Zone is in manual mode; nothing evaluated.
    Suppressed,
    MoistureOk,
    Low {
        alert: AlertOutcome,
        irrigation: IrrigationOutcome,
    },
}

/// Which decision procedure a mode maps to.
enum Procedure {
    Threshold,
    Disabled,
}

fn procedure_for(mode: IrrigationMode) -> Procedure {
    match mode {
        IrrigationMode::Rule => Procedure::Threshold,
        IrrigationMode::Manual => Procedure::Disabled,
        // TODO: route Smart to a learned policy once one exists; until then it
        // shares the threshold rule and only differs in how it is tagged.
        IrrigationMode::Smart => Procedure::Threshold,
    }
}

pub fn evaluate(ctx: &Context, zone: &Zone, moisture: f64) -> Result<Decision, EngineError> {
    let mode = zone.irrigation_mode;
    let name = zone.label();

    match procedure_for(mode) {
        Procedure::Disabled => {
            info!("Zone {} is MANUAL (automatic irrigation disabled)", name);
            return Ok(Decision::Suppressed);
        }
        Procedure::Threshold if mode == IrrigationMode::Smart => {
            info!("Zone {} is SMART (using rule logic)", name);
        }
        Procedure::Threshold => {}
    }

    let threshold = zone.moisture_threshold;
    if moisture >= threshold {
        info!("Zone {} moisture OK ({:.2} >= {})", name, moisture, threshold);
        return Ok(Decision::MoistureOk);
    }

    info!("Zone {} LOW moisture ({:.2} < {})", name, moisture, threshold);
    // An alert failure is reported in the decision but does not block irrigation.
    let alert = match raise_deduplicated(
        ctx,
        &zone.id,
        alert_types::LOW_MOISTURE,
        Severity::Warning,
        format!("{} moisture low: {:.2}", name, moisture),
    ) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Zone {}: low moisture alert failed: {}", name, e);
            AlertOutcome::Failed
        }
    };

    let irrigation = if can_irrigate(ctx, &zone.id)? {
        let minutes = zone.max_irrigation_minutes;
        info!("Zone {}: irrigating for {} minutes", name, minutes);
        let row = log_irrigation(ctx, &zone.id, minutes, mode)?;
        IrrigationOutcome::Started {
            minutes,
            litres: row.litres_used,
        }
    } else {
        info!("Zone {}: cooldown active, skipping irrigation", name);
        IrrigationOutcome::Cooldown
    };

    Ok(Decision::Low { alert, irrigation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::gateway::{Filter, Gateway, Query, StoreError, Table};
    use crate::db::memory::MemoryStore;
    use crate::db::models::RecordId;
    use crate::services::context::Policy;
    use crate::utils::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::{json, Value};
    use std::rc::Rc;

    /// Memory store whose alerts table is unreachable.
    struct AlertsDown(MemoryStore);

    impl AlertsDown {
        fn check(table: Table) -> Result<(), StoreError> {
            if table == Table::Alerts {
                return Err(StoreError::Http {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    impl Gateway for AlertsDown {
        fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError> {
            Self::check(table)?;
            self.0.select(table, query)
        }
        fn insert(&self, table: Table, record: &Value) -> Result<Value, StoreError> {
            Self::check(table)?;
            self.0.insert(table, record)
        }
        fn update(&self, table: Table, patch: &Value, filters: &[Filter]) -> Result<Vec<Value>, StoreError> {
            Self::check(table)?;
            self.0.update(table, patch, filters)
        }
    }

    fn setup() -> (Rc<ManualClock>, MemoryStore) {
        let clock = Rc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap()));
        let store = MemoryStore::new(Box::new(clock.clone()));
        (clock, store)
    }

    fn zone(mode: IrrigationMode) -> Zone {
        Zone {
            id: RecordId::Int(1),
            name: Some("North Field".to_string()),
            moisture_threshold: 40.0,
            max_irrigation_minutes: 15.0,
            irrigation_mode: mode,
        }
    }

    #[test]
    fn low_moisture_rule_zone_alerts_and_irrigates() {
        let (clock, store) = setup();
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        let decision = evaluate(&ctx, &zone(IrrigationMode::Rule), 25.0).unwrap();
        assert_eq!(
            decision,
            Decision::Low {
                alert: AlertOutcome::Raised,
                irrigation: IrrigationOutcome::Started {
                    minutes: 15.0,
                    litres: 300.0
                },
            }
        );

        let alerts = store.rows(Table::Alerts);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["alert_type"], "low_moisture");
        assert_eq!(alerts[0]["severity"], "warning");
        assert_eq!(alerts[0]["status"], "open");
        assert_eq!(alerts[0]["message"], "North Field moisture low: 25.00");

        let logs = store.rows(Table::IrrigationLogs);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0]["duration_minutes"], 15.0);
        assert_eq!(logs[0]["mode"], "rule");
        assert_eq!(logs[0]["litres_used"], 300.0);
    }

    #[test]
    fn manual_zone_never_acts() {
        let (clock, store) = setup();
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        for moisture in [0.0, 20.0, 39.99, 40.0, 60.0] {
            assert_eq!(
                evaluate(&ctx, &zone(IrrigationMode::Manual), moisture).unwrap(),
                Decision::Suppressed
            );
        }
        assert!(store.rows(Table::Alerts).is_empty());
        assert!(store.rows(Table::IrrigationLogs).is_empty());
    }

    #[test]
    fn adequate_moisture_does_nothing() {
        let (clock, store) = setup();
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        for moisture in [40.0, 40.01, 59.0] {
            assert_eq!(
                evaluate(&ctx, &zone(IrrigationMode::Rule), moisture).unwrap(),
                Decision::MoistureOk
            );
        }
        assert!(store.rows(Table::Alerts).is_empty());
        assert!(store.rows(Table::IrrigationLogs).is_empty());
    }

    #[test]
    fn smart_zone_follows_rule_logic_with_its_own_tag() {
        let (clock, store) = setup();
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        let decision = evaluate(&ctx, &zone(IrrigationMode::Smart), 30.0).unwrap();
        assert!(matches!(
            decision,
            Decision::Low {
                alert: AlertOutcome::Raised,
                irrigation: IrrigationOutcome::Started { .. }
            }
        ));
        assert_eq!(store.rows(Table::IrrigationLogs)[0]["mode"], "smart");
        assert_eq!(
            evaluate(&ctx, &zone(IrrigationMode::Smart), 45.0).unwrap(),
            Decision::MoistureOk
        );
    }

    #[test]
    fn repeated_low_readings_respect_cooldown_and_dedup() {
        let (clock, store) = setup();
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        let z = zone(IrrigationMode::Rule);

        evaluate(&ctx, &z, 25.0).unwrap();
        clock.advance(Duration::minutes(10));
        let second = evaluate(&ctx, &z, 22.0).unwrap();
        assert_eq!(
            second,
            Decision::Low {
                alert: AlertOutcome::Deduplicated,
                irrigation: IrrigationOutcome::Cooldown,
            }
        );
        assert_eq!(store.rows(Table::Alerts).len(), 1);
        assert_eq!(store.rows(Table::IrrigationLogs).len(), 1);

        // 31 minutes after the first irrigation: cooldown over, alert still fresh.
        clock.advance(Duration::minutes(21));
        let third = evaluate(&ctx, &z, 21.0).unwrap();
        assert_eq!(
            third,
            Decision::Low {
                alert: AlertOutcome::Deduplicated,
                irrigation: IrrigationOutcome::Started {
                    minutes: 15.0,
                    litres: 300.0
                },
            }
        );

        // 61 minutes after the first alert: a second alert is raised.
        clock.advance(Duration::minutes(30));
        let fourth = evaluate(&ctx, &z, 21.0).unwrap();
        assert!(matches!(fourth, Decision::Low { alert: AlertOutcome::Raised, .. }));
        assert_eq!(store.rows(Table::Alerts).len(), 2);
    }

    #[test]
    fn alert_failure_does_not_block_irrigation() {
        let (clock, store) = setup();
        let store = AlertsDown(store);
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        let decision = evaluate(&ctx, &zone(IrrigationMode::Rule), 25.0).unwrap();
        assert_eq!(
            decision,
            Decision::Low {
                alert: AlertOutcome::Failed,
                irrigation: IrrigationOutcome::Started {
                    minutes: 15.0,
                    litres: 300.0
                },
            }
        );
        assert_eq!(store.0.rows(Table::IrrigationLogs).len(), 1);
    }

    #[test]
    fn stale_open_alert_with_odd_columns_does_not_stop_irrigation() {
        let (clock, store) = setup();
        let ctx = Context::new(&store, clock.as_ref(), Policy::default());
        store
            .insert(
                Table::Alerts,
                &json!({"zone_id": 1, "alert_type": "low_moisture", "severity": "high", "message": null, "status": "open", "created_at": "2024-06-01T00:00:00Z"}),
            )
            .unwrap();

        for _ in 0..2 {
            let decision = evaluate(&ctx, &zone(IrrigationMode::Rule), 25.0).unwrap();
            assert!(matches!(
                decision,
                Decision::Low {
                    irrigation: IrrigationOutcome::Started { .. },
                    ..
                }
            ));
            clock.advance(Duration::days(3));
        }
        assert_eq!(store.rows(Table::IrrigationLogs).len(), 2);
    }
}
