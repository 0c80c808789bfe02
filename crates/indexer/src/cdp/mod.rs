// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Client for the CDP SQL API, used as a staking event source.

pub mod auth;

use std::{collections::HashMap, time::Duration};

use alloy::primitives::Address;
use async_trait::async_trait;
use clash_rewards::RawEvent;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::source::{event_name, EventSource};

pub use auth::{CdpCredentials, RequestTarget, TokenCache, TokenSigner};

/// Production CDP API endpoint.
pub const DEFAULT_CDP_API_URL: &str = "https://api.cdp.coinbase.com";
/// Path of the SQL query endpoint.
pub const QUERY_PATH: &str = "/platform/v2/data/query/run";
/// Rows requested per query page.
pub const DEFAULT_PAGE_SIZE: u64 = 10_000;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum CdpError {
    #[error("invalid CDP credentials: {0}")]
    InvalidCredentials(String),

    #[error("HTTP error {0:?}")]
    Http(#[from] reqwest::Error),

    #[error("CDP API error: {status} {body}")]
    Status { status: u16, body: String },

    #[error("JSON error {0:?}")]
    Json(#[from] serde_json::Error),

    #[error("malformed CDP row: {0}")]
    MalformedRow(String),

    #[error("invalid CDP API URL: {0}")]
    InvalidUrl(String),
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Vec<Map<String, Value>>,
}

/// Reads contract events through CDP's SQL query endpoint.
pub struct CdpClient {
    client: Client,
    api_url: Url,
    tokens: TokenCache,
    page_size: u64,
}

impl CdpClient {
    /// Creates a client against `api_url`, usually [DEFAULT_CDP_API_URL].
    pub fn with_api_url(credentials: &CdpCredentials, api_url: Url) -> Result<Self, CdpError> {
        let host = match (api_url.host_str(), api_url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(CdpError::InvalidUrl(api_url.to_string())),
        };
        let target = RequestTarget { method: "POST".into(), host, path: QUERY_PATH.into() };
        let tokens = TokenCache::new(TokenSigner::new(credentials)?, target);
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;

        Ok(Self { client, api_url, tokens, page_size: DEFAULT_PAGE_SIZE })
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Runs one SQL query and returns its result rows.
    pub async fn run_query(&self, sql: &str) -> Result<Vec<Map<String, Value>>, CdpError> {
        let mut url = self.api_url.clone();
        url.set_path(QUERY_PATH);

        let token = self.tokens.bearer_token(unix_now())?;
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "sql": sql }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CdpError::Status { status: status.as_u16(), body });
        }

        let data: QueryResponse = response.json().await?;
        Ok(data.result)
    }
}

#[async_trait]
impl EventSource for CdpClient {
    fn name(&self) -> &str {
        "cdp"
    }

    async fn fetch_events(
        &self,
        contract: Address,
        signatures: &[&str],
    ) -> anyhow::Result<Vec<RawEvent>> {
        let mut events = Vec::new();
        let mut offset = 0;
        loop {
            let sql = events_query(contract, signatures, self.page_size, offset);
            let rows = self.run_query(&sql).await?;
            let fetched = rows.len() as u64;
            tracing::debug!("Fetched {} rows from CDP SQL API at offset {}", fetched, offset);

            for row in &rows {
                events.push(row_to_raw_event(row)?);
            }
            if fetched < self.page_size {
                break;
            }
            offset += fetched;
        }

        tracing::info!("Fetched {} events from CDP SQL API", events.len());
        Ok(events)
    }
}

/// SQL selecting one page of `contract`'s events with the given signatures, oldest first.
pub fn events_query(contract: Address, signatures: &[&str], limit: u64, offset: u64) -> String {
    let signature_list =
        signatures.iter().map(|s| format!("'{}'", s.replace('\'', "''"))).collect::<Vec<_>>();
    format!(
        "SELECT event_signature, block_number, block_timestamp, log_index, parameters \
         FROM base.events \
         WHERE address = '{contract:#x}' \
         AND event_signature IN ({}) \
         AND block_number > 0 \
         ORDER BY block_number ASC, log_index ASC \
         LIMIT {limit} OFFSET {offset}",
        signature_list.join(", ")
    )
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Converts a result row of [events_query] into a [RawEvent].
pub fn row_to_raw_event(row: &Map<String, Value>) -> Result<RawEvent, CdpError> {
    let column = |name: &str| {
        row.get(name)
            .and_then(value_to_string)
            .ok_or_else(|| CdpError::MalformedRow(format!("missing column {name}")))
    };

    let signature = column("event_signature")?;
    let block_number = column("block_number")?;
    let block_number = block_number
        .trim()
        .parse()
        .map_err(|_| CdpError::MalformedRow(format!("invalid block_number {block_number:?}")))?;

    let parameters = match row.get("parameters") {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) => serde_json::from_str(s)?,
        _ => return Err(CdpError::MalformedRow("missing column parameters".into())),
    };
    let parameters: HashMap<String, String> = parameters
        .iter()
        .filter_map(|(key, value)| value_to_string(value).map(|v| (key.clone(), v)))
        .collect();

    Ok(RawEvent {
        event_type: event_name(&signature).to_string(),
        block_number,
        block_timestamp: column("block_timestamp")?,
        parameters,
    })
}

fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}
