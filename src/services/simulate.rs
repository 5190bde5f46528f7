//! Synthetic sensor readings, and the demo zones used by `--memory` runs.

use crate::db::gateway::{Gateway, StoreError, Table};
use crate::db::models::{NewSensorReading, RecordId};
use crate::utils::{format_utc, Clock};
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::ops::RangeInclusive;

pub const MOISTURE_RANGE: RangeInclusive<f64> = 20.0..=60.0;
pub const TEMPERATURE_RANGE: RangeInclusive<f64> = 25.0..=38.0;
pub const HUMIDITY_RANGE: RangeInclusive<f64> = 40.0..=80.0;

/// (name, moisture_threshold, max_irrigation_minutes, irrigation_mode)
const DEMO_ZONES: [(&str, f64, f64, &str); 4] = [
    ("North Orchard", 35.0, 10.0, "rule"),
    ("Greenhouse", 45.0, 15.0, "smart"),
    ("Herb Garden", 30.0, 5.0, "manual"),
    ("Vineyard Terrace", 40.0, 20.0, "rule"),
];

pub struct SensorSimulator {
    rng: SmallRng,
}

impl SensorSimulator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => SmallRng::seed_from_u64(s),
            None => SmallRng::from_os_rng(),
        };
        SensorSimulator { rng }
    }

    pub fn reading(&mut self, zone_id: &RecordId) -> NewSensorReading {
        NewSensorReading {
            zone_id: zone_id.clone(),
            moisture: round2(self.rng.random_range(MOISTURE_RANGE)),
            temperature: round2(self.rng.random_range(TEMPERATURE_RANGE)),
            humidity: round2(self.rng.random_range(HUMIDITY_RANGE)),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Populate an empty store with a handful of zones and one pending manual
/// request, so a `--memory` run exercises every path.
pub fn seed_demo_zones(store: &dyn Gateway, clock: &dyn Clock) -> Result<Vec<RecordId>, StoreError> {
    let mut ids = Vec::with_capacity(DEMO_ZONES.len());
    for (index, (name, threshold, max_minutes, mode)) in DEMO_ZONES.iter().enumerate() {
        let id = RecordId::Int(index as i64 + 1);
        store.insert(
            Table::Zones,
            &json!({
                "id": &id,
                "name": name,
                "moisture_threshold": threshold,
                "max_irrigation_minutes": max_minutes,
                "irrigation_mode": mode,
            }),
        )?;
        ids.push(id);
    }

    let manual_zone = &ids[2];
    store.insert(
        Table::IrrigationRequests,
        &json!({
            "zone_id": manual_zone,
            "minutes": 5,
            "status": "pending",
            "created_at": format_utc(clock.now()),
        }),
    )?;

    info!("Seeded {} demo zone(s) and 1 pending manual request", ids.len());
    Ok(ids)
}
