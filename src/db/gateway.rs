//! Data store gateway: a minimal select/insert/update surface over named
//! tables, plus typed helpers that decode rows into the models.
//!
//! Implementations:
//! - `crate::client::SupabaseClient` (PostgREST over HTTP)
//! - `crate::db::memory::MemoryStore` (process-local, used by tests and `--memory`)

use core::fmt;
use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Table {
    Zones,
    SensorReadings,
    IrrigationLogs,
    Alerts,
    IrrigationRequests,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Zones => "zones",
            Table::SensorReadings => "sensor_readings",
            Table::IrrigationLogs => "irrigation_logs",
            Table::Alerts => "alerts",
            Table::IrrigationRequests => "irrigation_requests",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(#[from] ureq::Error),
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed {table} row at {path}: {message}")]
    Decode {
        table: Table,
        path: String,
        message: String,
    },
    #[error("{0} returned no rows for a write")]
    EmptyResponse(Table),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lt,
}

impl FilterOp {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter {
            column: column.to_string(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// Row selection: conjunctive filters, optional single-column ordering, limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    fn filter(mut self, column: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Eq, value)
    }

    pub fn gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Gte, value)
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, FilterOp::Lt, value)
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

pub trait Gateway {
    fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError>;
    fn insert(&self, table: Table, record: &Value) -> Result<Value, StoreError>;
    fn update(&self, table: Table, patch: &Value, filters: &[Filter]) -> Result<Vec<Value>, StoreError>;
}

/// Decode one row, keeping the JSON path of the offending field.
pub fn decode_row<T: DeserializeOwned>(table: Table, row: Value) -> Result<T, StoreError> {
    serde_path_to_error::deserialize(row).map_err(|e| StoreError::Decode {
        table,
        path: e.path().to_string(),
        message: e.into_inner().to_string(),
    })
}

/// Select and decode every row; the first malformed row fails the call.
pub fn select_rows<T: DeserializeOwned>(
    store: &dyn Gateway,
    table: Table,
    query: &Query,
) -> Result<Vec<T>, StoreError> {
    store
        .select(table, query)?
        .into_iter()
        .map(|row| decode_row(table, row))
        .collect()
}

/// Select and decode, skipping malformed rows with a warning.
pub fn select_valid_rows<T: DeserializeOwned>(
    store: &dyn Gateway,
    table: Table,
    query: &Query,
) -> Result<Vec<T>, StoreError> {
    let rows = store.select(table, query)?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match decode_row(table, row) {
            Ok(v) => out.push(v),
            Err(e) => warn!("Skipping record: {}", e),
        }
    }
    Ok(out)
}

pub fn insert_row<T: Serialize>(store: &dyn Gateway, table: Table, row: &T) -> Result<Value, StoreError> {
    let record = serde_json::to_value(row)?;
    store.insert(table, &record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Zone;
    use serde_json::json;

    #[test]
    fn decode_error_names_the_field() {
        let err = decode_row::<Zone>(
            Table::Zones,
            json!({"id": 1, "moisture_threshold": "dry", "max_irrigation_minutes": 5}),
        )
        .unwrap_err();
        match err {
            StoreError::Decode { table, path, .. } => {
                assert_eq!(table, Table::Zones);
                assert_eq!(path, "moisture_threshold");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn query_builder_collects_clauses() {
        let q = Query::new()
            .eq("zone_id", 3)
            .gte("created_at", "2024-01-01T00:00:00Z")
            .order_by("created_at", Direction::Desc)
            .limit(1);
        assert_eq!(q.filters.len(), 2);
        assert_eq!(q.filters[0].op, FilterOp::Eq);
        assert_eq!(q.filters[1].value, json!("2024-01-01T00:00:00Z"));
        assert_eq!(q.order.as_ref().map(|o| o.direction), Some(Direction::Desc));
        assert_eq!(q.limit, Some(1));
    }
}
