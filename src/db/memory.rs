//! Process-local gateway with PostgREST-like select semantics.
//!
//! Backs the test suites and the `--memory` demo mode. Rows are kept in
//! insertion order per table. Missing `id`/`created_at` columns are filled in
//! on insert, the way the hosted tables default them.

use crate::db::gateway::{Direction, Filter, FilterOp, Gateway, Query, StoreError, Table};
use crate::utils::{format_utc, parse_utc, Clock};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::HashMap;

pub struct MemoryStore {
    clock: Box<dyn Clock>,
    tables: RefCell<HashMap<Table, Vec<Map<String, Value>>>>,
    next_id: Cell<i64>,
}

impl MemoryStore {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        MemoryStore {
            clock,
            tables: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        }
    }

    /// Snapshot of a table's rows in insertion order.
    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.tables
            .borrow()
            .get(&table)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    fn allocate_id(&self) -> i64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }
}

/// Postgres ordering semantics for the value kinds the tables hold.
/// `Null` sorts after everything, so it comes last ascending and first descending.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => match (parse_utc(x), parse_utc(y)) {
            (Ok(tx), Ok(ty)) => tx.cmp(&ty),
            _ => x.cmp(y),
        },
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        // Mixed kinds only meet when ids are compared loosely, e.g. 5 vs "5".
        _ => value_text(a).cmp(&value_text(b)),
    }
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn matches(row: &Map<String, Value>, filter: &Filter) -> bool {
    let cell = row.get(&filter.column).unwrap_or(&Value::Null);
    if cell.is_null() || filter.value.is_null() {
        // SQL comparison with NULL is never true.
        return false;
    }
    let ord = compare_values(cell, &filter.value);
    match filter.op {
        FilterOp::Eq => ord == Ordering::Equal,
        FilterOp::Gte => ord != Ordering::Less,
        FilterOp::Lt => ord == Ordering::Less,
    }
}

impl Gateway for MemoryStore {
    fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.borrow();
        let mut rows: Vec<&Map<String, Value>> = tables
            .get(&table)
            .map(|rows| rows.iter().filter(|r| query.filters.iter().all(|f| matches(r, f))).collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let av = a.get(&order.column).unwrap_or(&Value::Null);
                let bv = b.get(&order.column).unwrap_or(&Value::Null);
                let ord = compare_values(av, bv);
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows.into_iter().take(limit).cloned().map(Value::Object).collect())
    }

    fn insert(&self, table: Table, record: &Value) -> Result<Value, StoreError> {
        let mut row = match record {
            Value::Object(map) => map.clone(),
            other => {
                return Err(StoreError::Http {
                    status: 400,
                    body: format!("expected a JSON object for {}, got {}", table, other),
                });
            }
        };
        if !row.contains_key("id") {
            row.insert("id".to_string(), Value::from(self.allocate_id()));
        }
        if !row.contains_key("created_at") {
            row.insert("created_at".to_string(), Value::from(format_utc(self.clock.now())));
        }

        self.tables.borrow_mut().entry(table).or_default().push(row.clone());
        Ok(Value::Object(row))
    }

    fn update(&self, table: Table, patch: &Value, filters: &[Filter]) -> Result<Vec<Value>, StoreError> {
        let Value::Object(patch) = patch else {
            return Err(StoreError::Http {
                status: 400,
                body: format!("expected a JSON object patch for {}", table),
            });
        };

        let mut tables = self.tables.borrow_mut();
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(&table) {
            for row in rows.iter_mut().filter(|r| filters.iter().all(|f| matches(r, f))) {
                for (k, v) in patch {
                    row.insert(k.clone(), v.clone());
                }
                updated.push(Value::Object(row.clone()));
            }
        }
        Ok(updated)
    }
}
