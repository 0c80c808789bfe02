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

//! Staking events read directly from an Ethereum RPC node.

use std::collections::HashMap;

use alloy::{
    primitives::{keccak256, Address, B256},
    providers::Provider,
    rpc::types::{BlockNumberOrTag, Filter, Log},
    sol,
};
use anyhow::{bail, Context};
use async_trait::async_trait;
use clash_rewards::RawEvent;

use crate::source::{event_name, EventSource};

/// Largest block range requested in a single `eth_getLogs` call.
pub const BLOCK_CHUNK_SIZE: u64 = 50_000;

sol! {
    interface IClashStaking {
        event Staked(
            uint256 transactionId,
            uint256 amount,
            uint40 stakedAt,
            address sender,
            uint8 lockPeriod
        );
        event Unstaked(uint256 transactionId, uint8 status, uint256 score, uint40 unstakedAt);
    }
}

/// Queries logs in chunks of [BLOCK_CHUNK_SIZE] blocks to stay under provider limits.
pub async fn query_logs_chunked<P: Provider>(
    provider: &P,
    filter: Filter,
    from_block: u64,
    to_block: u64,
) -> anyhow::Result<Vec<Log>> {
    let mut all_logs = Vec::new();

    let mut current_from = from_block;
    while current_from <= to_block {
        let current_to = current_from.saturating_add(BLOCK_CHUNK_SIZE - 1).min(to_block);

        let chunk_filter = filter
            .clone()
            .from_block(BlockNumberOrTag::Number(current_from))
            .to_block(BlockNumberOrTag::Number(current_to));

        let logs = provider.get_logs(&chunk_filter).await?;
        tracing::debug!(
            "Fetched {} logs for blocks {}-{}",
            logs.len(),
            current_from,
            current_to
        );
        all_logs.extend(logs);

        current_from = current_to + 1;
    }

    Ok(all_logs)
}

/// Reads staking events with `eth_getLogs`.
pub struct RpcEventSource<P> {
    provider: P,
    from_block: u64,
}

impl<P: Provider> RpcEventSource<P> {
    pub fn new(provider: P, from_block: u64) -> Self {
        Self { provider, from_block }
    }

    async fn block_timestamp(
        &self,
        log: &Log,
        block_number: u64,
        cache: &mut HashMap<u64, u64>,
    ) -> anyhow::Result<u64> {
        if let Some(timestamp) = log.block_timestamp {
            return Ok(timestamp);
        }
        if let Some(timestamp) = cache.get(&block_number) {
            return Ok(*timestamp);
        }
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block_number))
            .await?
            .with_context(|| format!("block {block_number} not found"))?;
        cache.insert(block_number, block.header.timestamp);
        Ok(block.header.timestamp)
    }
}

type DecodedLog = (&'static str, HashMap<String, String>);

/// Decodes a staking log into its event name and stringified parameters.
///
/// Returns `None` for logs of other events.
fn decode_parameters(log: &Log) -> anyhow::Result<Option<DecodedLog>> {
    let Some(topic) = log.topic0() else {
        return Ok(None);
    };

    let (name, parameters) = if *topic == staked_topic() {
        let event = log.log_decode::<IClashStaking::Staked>()?.inner.data;
        let parameters = HashMap::from([
            ("transactionId".to_string(), event.transactionId.to_string()),
            ("amount".to_string(), event.amount.to_string()),
            ("stakedAt".to_string(), event.stakedAt.to_string()),
            ("sender".to_string(), format!("{:#x}", event.sender)),
            ("lockPeriod".to_string(), event.lockPeriod.to_string()),
        ]);
        ("Staked", parameters)
    } else if *topic == unstaked_topic() {
        let event = log.log_decode::<IClashStaking::Unstaked>()?.inner.data;
        let parameters = HashMap::from([
            ("transactionId".to_string(), event.transactionId.to_string()),
            ("status".to_string(), event.status.to_string()),
            ("score".to_string(), event.score.to_string()),
            ("unstakedAt".to_string(), event.unstakedAt.to_string()),
        ]);
        ("Unstaked", parameters)
    } else {
        return Ok(None);
    };

    Ok(Some((name, parameters)))
}

fn staked_topic() -> B256 {
    keccak256(clash_rewards::STAKED_EVENT_SIGNATURE)
}

fn unstaked_topic() -> B256 {
    keccak256(clash_rewards::UNSTAKED_EVENT_SIGNATURE)
}

#[async_trait]
impl<P: Provider + Send + Sync> EventSource for RpcEventSource<P> {
    fn name(&self) -> &str {
        "rpc"
    }

    async fn fetch_events(
        &self,
        contract: Address,
        signatures: &[&str],
    ) -> anyhow::Result<Vec<RawEvent>> {
        let latest_block = self.provider.get_block_number().await?;
        if self.from_block > latest_block {
            bail!("Start block {} is after the latest block {}", self.from_block, latest_block);
        }
        tracing::info!(
            "Fetching staking logs from RPC ({} blocks)",
            latest_block - self.from_block + 1
        );

        let topics: Vec<B256> = signatures.iter().map(keccak256).collect();
        let filter = Filter::new().address(contract).event_signature(topics);
        let logs = query_logs_chunked(&self.provider, filter, self.from_block, latest_block)
            .await
            .context("Failed to get staking logs")?;

        let wanted: Vec<&str> = signatures.iter().map(|s| event_name(s)).collect();
        let mut timestamps = HashMap::new();
        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            let Some((name, parameters)) = decode_parameters(log)? else {
                continue;
            };
            if !wanted.contains(&name) {
                continue;
            }
            let block_number = log.block_number.context("log is missing its block number")?;
            let timestamp = self.block_timestamp(log, block_number, &mut timestamps).await?;
            events.push(RawEvent {
                event_type: name.to_string(),
                block_number,
                block_timestamp: timestamp.to_string(),
                parameters,
            });
        }

        tracing::info!("Fetched {} events from RPC", events.len());
        Ok(events)
    }
}
