//! HTTP gateway for a Supabase project (PostgREST under `/rest/v1`).
//!
//! - Blocking client using `ureq` (no async).
//! - Authenticates every call with the project API key (`apikey` header and
//!   bearer token).
//! - Writes ask for `return=representation` so inserts echo the stored row.

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use log::trace;
use serde_json::Value;
use std::time::Duration;

use crate::db::gateway::{Direction, Filter, Gateway, Query, StoreError, Table};

const REST_PATH: &str = "/rest/v1";

pub struct SupabaseClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(url: &str, api_key: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();

        SupabaseClient {
            agent: ureq::Agent::new_with_config(config),
            base_url: format!("{}{}", url.trim_end_matches('/'), REST_PATH),
            api_key: api_key.into(),
        }
    }

    fn url(&self, table: Table) -> String {
        format!("{}/{}", self.base_url, table.as_str())
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    fn read_rows(table: Table, mut resp: http::Response<ureq::Body>) -> Result<Vec<Value>, StoreError> {
        let status = resp.status();
        let body = resp.body_mut().read_to_string()?;
        if !status.is_success() {
            return Err(StoreError::Http {
                status: status.as_u16(),
                body,
            });
        }
        trace!("{} <- {} bytes", table, body.len());
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| {
            let rhs = if f.value.is_null() {
                "is.null".to_string()
            } else {
                format!("{}.{}", f.op.as_str(), encode_value(&f.value))
            };
            (f.column.clone(), rhs)
        })
        .collect()
}

/// PostgREST query string pairs for a select.
pub fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(filter_params(&query.filters));
    if let Some(order) = &query.order {
        let dir = match order.direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        params.push(("order".to_string(), format!("{}.{}", order.column, dir)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

impl Gateway for SupabaseClient {
    fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>, StoreError> {
        let mut req = self
            .agent
            .get(self.url(table))
            .header(ACCEPT, "application/json")
            .header("apikey", self.api_key.as_str())
            .header(AUTHORIZATION, self.bearer().as_str());
        for (k, v) in query_params(query) {
            req = req.query(k, v);
        }
        Self::read_rows(table, req.call()?)
    }

    fn insert(&self, table: Table, record: &Value) -> Result<Value, StoreError> {
        let resp = self
            .agent
            .post(self.url(table))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header("apikey", self.api_key.as_str())
            .header(AUTHORIZATION, self.bearer().as_str())
            .header("Prefer", "return=representation")
            .send_json(record)?;
        Self::read_rows(table, resp)?
            .into_iter()
            .next()
            .ok_or(StoreError::EmptyResponse(table))
    }

    fn update(&self, table: Table, patch: &Value, filters: &[Filter]) -> Result<Vec<Value>, StoreError> {
        let mut req = self
            .agent
            .patch(self.url(table))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header("apikey", self.api_key.as_str())
            .header(AUTHORIZATION, self.bearer().as_str())
            .header("Prefer", "return=representation");
        for (k, v) in filter_params(filters) {
            req = req.query(k, v);
        }
        Self::read_rows(table, req.send_json(patch)?)
    }
}
