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

use std::{path::PathBuf, sync::Arc};

use alloy::{primitives::Address, providers::ProviderBuilder};
use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use clash_staking_indexer::{
    cdp::{CdpClient, CdpCredentials, DEFAULT_CDP_API_URL, DEFAULT_PAGE_SIZE},
    rpc::RpcEventSource,
    store::{DocumentNames, JsonFileStore},
    EventSourceObj, LedgerStoreObj, StakingSyncService, SyncConfig,
};
use tracing_subscriber::filter::LevelFilter;
use url::Url;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// CDP SQL API
    Cdp,
    /// Ethereum JSON-RPC `eth_getLogs`
    Rpc,
}

impl SourceKind {
    fn name(self) -> &'static str {
        match self {
            SourceKind::Cdp => "cdp",
            SourceKind::Rpc => "rpc",
        }
    }
}

/// Arguments for the staking sync.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct StakingSyncArgs {
    /// Address of the Clash staking contract on Base.
    #[clap(long, env = "BASE_CLASH_STAKING_ADDRESS")]
    staking_address: Address,

    /// Start of the staking program (unix seconds). Enables weekly snapshots.
    #[clap(long, env = "CLASH_STAKING_START_TIME")]
    start_time: Option<u64>,

    /// Take the snapshot at this time (unix seconds) instead of the last week boundary.
    #[clap(long, env)]
    snapshot_timestamp: Option<u64>,

    /// Where to read events from.
    #[clap(long, env, value_enum, default_value_t = SourceKind::Cdp)]
    event_source: SourceKind,

    /// Name of the CDP API key.
    #[clap(long, env)]
    cdp_api_key_name: Option<String>,

    /// Secret of the CDP API key (base64 Ed25519, or a P-256 ECDSA key in PEM form).
    #[clap(long, env, hide_env_values = true)]
    cdp_api_key_secret: Option<String>,

    /// Base URL of the CDP API.
    #[clap(long, env, default_value = DEFAULT_CDP_API_URL)]
    cdp_api_url: Url,

    /// Rows per CDP SQL query page.
    #[clap(long, env, default_value_t = DEFAULT_PAGE_SIZE)]
    cdp_page_size: u64,

    /// URL of the Ethereum RPC endpoint, for the rpc source.
    #[clap(long, env)]
    rpc_url: Option<Url>,

    /// First block scanned by the rpc source.
    #[clap(long, env, default_value_t = 0)]
    start_block: u64,

    /// Directory the documents are written to.
    #[clap(long, env = "STAKING_HISTORY_FOLDER", default_value = "data/staking")]
    output_dir: PathBuf,

    /// Prefix of the document file names.
    #[clap(long, env, default_value = "clash-staking")]
    program_name: String,

    /// Recompute the leaderboards from the stored history without fetching events.
    #[clap(long, env, default_value_t = false)]
    from_history: bool,

    /// Default log level, used when RUST_LOG is unset.
    #[clap(long, env, default_value = "info")]
    logger_level: LevelFilter,

    /// Whether to log in JSON format.
    #[clap(long, env, default_value_t = false)]
    log_json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();
    let args = StakingSyncArgs::parse();

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(args.logger_level.into())
        .from_env_lossy();

    if args.log_json {
        tracing_subscriber::fmt().with_ansi(false).json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_ansi(false).with_env_filter(filter).init();
    }

    match dotenv {
        Ok(path) => tracing::debug!("Loaded environment variables from {:?}", path),
        Err(e) if e.not_found() => tracing::debug!("No .env file found"),
        Err(e) => {
            tracing::error!("FATAL: failed to load .env file: {}", e);
            bail!("failed to load .env file: {}", e);
        }
    }

    if let Err(err) = run(&args).await {
        tracing::error!("FATAL: {:?}", err);
        return Err(err);
    }
    Ok(())
}

async fn run(args: &StakingSyncArgs) -> Result<()> {
    let names = DocumentNames::new(&args.program_name, args.event_source.name());
    let store: LedgerStoreObj = Arc::new(JsonFileStore::new(&args.output_dir, names));

    let config = SyncConfig {
        contract_address: args.staking_address,
        program_start: args.start_time,
        snapshot_timestamp: args.snapshot_timestamp,
        as_of: None,
        from_history: args.from_history,
    };

    let mut service = StakingSyncService::new(store, config);
    if !args.from_history {
        service = service.with_source(event_source(args)?);
    }

    let summary = service.run().await?;
    tracing::info!(
        "Synced {} events up to block {}, {} stakers on the leaderboard",
        summary.number_of_events,
        summary.last_block,
        summary.stakers
    );
    Ok(())
}

fn event_source(args: &StakingSyncArgs) -> Result<EventSourceObj> {
    match args.event_source {
        SourceKind::Cdp => {
            let (Some(key_id), Some(key_secret)) =
                (args.cdp_api_key_name.clone(), args.cdp_api_key_secret.clone())
            else {
                bail!("CDP_API_KEY_NAME and CDP_API_KEY_SECRET are required for the cdp source");
            };
            let credentials = CdpCredentials { key_id, key_secret };
            let client = CdpClient::with_api_url(&credentials, args.cdp_api_url.clone())
                .context("Failed to create CDP client")?
                .with_page_size(args.cdp_page_size);
            Ok(Arc::new(client))
        }
        SourceKind::Rpc => {
            let Some(rpc_url) = args.rpc_url.clone() else {
                bail!("RPC_URL is required for the rpc source");
            };
            let provider =
                ProviderBuilder::new().disable_recommended_fillers().connect_http(rpc_url);
            Ok(Arc::new(RpcEventSource::new(provider, args.start_block)))
        }
    }
}
