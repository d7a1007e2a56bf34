// src/store/postgrest.rs
//
// HTTP store backed by a PostgREST endpoint (Supabase-compatible).
//
// Every table is reached at `{url}/rest/v1/{table}`. Singletons are keyed by
// `id = 1`. Filters use PostgREST operators in the query string
// (`id=gt.7`, `id=eq.1`, `order=id.desc`).

use super::Store;
use crate::error::{StoreError, StoreResult};
use crate::types::{
    ActionRecord, MachineState, NewAction, OperationalState, PerceptionSample, StoreConfig,
    TableNames, TelemetrySnapshot,
};
use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const SINGLETON_FILTER: (&str, &str) = ("id", "eq.1");

#[derive(Debug, Deserialize)]
struct IdRow {
    id: u64,
}

pub struct PostgrestStore {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    tables: TableNames,
}

impl PostgrestStore {
    pub fn new(config: &StoreConfig) -> Result<Self> {
        if config.url.is_empty() {
            anyhow::bail!("Store URL is empty (set store.url or SUPABASE_URL)");
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            tables: config.tables.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.http_client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> StoreResult<Vec<T>> {
        let response = self.request(Method::GET, table).query(query).send().await?;
        let body = checked(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, &str)],
    ) -> StoreResult<Option<T>> {
        Ok(self.select(table, query).await?.into_iter().next())
    }

    /// Insert one row and return its generated id.
    async fn insert(&self, table: &str, row: serde_json::Value) -> StoreResult<u64> {
        let response = self
            .request(Method::POST, table)
            .header("Prefer", "return=representation")
            .query(&[("select", "id")])
            .json(&row)
            .send()
            .await?;
        let body = checked(response).await?.text().await?;
        let rows: Vec<IdRow> = serde_json::from_str(&body)?;
        rows.first()
            .map(|r| r.id)
            .ok_or(StoreError::MissingRecord("inserted row id"))
    }

    /// PATCH the `id = 1` row. A filter that matches nothing is not an HTTP
    /// error in PostgREST, so the returned representation is checked.
    async fn patch_singleton(
        &self,
        table: &str,
        what: &'static str,
        patch: serde_json::Value,
    ) -> StoreResult<()> {
        let response = self
            .request(Method::PATCH, table)
            .header("Prefer", "return=representation")
            .query(&[SINGLETON_FILTER, ("select", "id")])
            .json(&patch)
            .send()
            .await?;
        let body = checked(response).await?.text().await?;
        patched_rows(&body, what)
    }
}

fn patched_rows(body: &str, what: &'static str) -> StoreResult<()> {
    let rows: Vec<IdRow> = serde_json::from_str(body)?;
    if rows.is_empty() {
        return Err(StoreError::MissingRecord(what));
    }
    Ok(())
}

async fn checked(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

impl Store for PostgrestStore {
    async fn latest_perception(&self) -> StoreResult<Option<PerceptionSample>> {
        self.select_one(
            &self.tables.perception,
            &[
                ("select", "id,point_x,has_phone"),
                ("order", "id.desc"),
                ("limit", "1"),
            ],
        )
        .await
    }

    async fn append_perception(&self, point_x: i64, has_phone: bool) -> StoreResult<u64> {
        self.insert(
            &self.tables.perception,
            json!({ "point_x": point_x, "has_phone": has_phone }),
        )
        .await
    }

    async fn machine_state(&self) -> StoreResult<Option<MachineState>> {
        self.select_one(
            &self.tables.machine,
            &[
                ("select", "maintenance_mode,operational_state"),
                SINGLETON_FILTER,
            ],
        )
        .await
    }

    async fn set_operational_state(&self, state: OperationalState) -> StoreResult<()> {
        self.patch_singleton(
            &self.tables.machine,
            "machine state",
            json!({ "operational_state": state }),
        )
        .await
    }

    async fn append_action(&self, action: &NewAction) -> StoreResult<u64> {
        let id = self
            .insert(&self.tables.actions, serde_json::to_value(action)?)
            .await?;
        debug!("Ledger row {} written ({})", id, action.action.as_str());
        Ok(id)
    }

    async fn actions_after(&self, after_id: u64) -> StoreResult<Vec<ActionRecord>> {
        let filter = format!("gt.{}", after_id);
        self.select(
            &self.tables.actions,
            &[
                ("select", "id,action,reason,risk"),
                ("id", filter.as_str()),
                ("order", "id.asc"),
            ],
        )
        .await
    }

    async fn latest_action_id(&self) -> StoreResult<Option<u64>> {
        let row: Option<IdRow> = self
            .select_one(
                &self.tables.actions,
                &[("select", "id"), ("order", "id.desc"), ("limit", "1")],
            )
            .await?;
        Ok(row.map(|r| r.id))
    }

    async fn telemetry(&self) -> StoreResult<Option<TelemetrySnapshot>> {
        self.select_one(
            &self.tables.telemetry,
            &[
                ("select", "risk_value,state_message,updated_at"),
                SINGLETON_FILTER,
            ],
        )
        .await
    }

    async fn ensure_telemetry(&self) -> StoreResult<()> {
        let existing: Option<IdRow> = self
            .select_one(&self.tables.telemetry, &[("select", "id"), SINGLETON_FILTER])
            .await?;
        if existing.is_some() {
            return Ok(());
        }

        let mut row = serde_json::to_value(TelemetrySnapshot::ready())?;
        row["id"] = json!(1);
        self.insert(&self.tables.telemetry, row).await?;
        Ok(())
    }

    async fn update_telemetry(&self, snapshot: &TelemetrySnapshot) -> StoreResult<()> {
        self.patch_singleton(
            &self.tables.telemetry,
            "telemetry",
            serde_json::to_value(snapshot)?,
        )
        .await
    }
}
