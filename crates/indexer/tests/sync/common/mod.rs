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

use std::{collections::HashMap, path::Path, sync::Arc};

use alloy::primitives::Address;
use async_trait::async_trait;
use clash_rewards::{RawEvent, SECONDS_PER_DAY};
use clash_staking_indexer::{
    store::{DocumentNames, JsonFileStore},
    EventSource, StakingSyncService, SyncConfig,
};

pub const PROGRAM: &str = "clash-staking";
pub const SOURCE: &str = "memory";
pub const CONTRACT: Address = Address::repeat_byte(0xc1);
pub const ALICE: &str = "0x1111111111111111111111111111111111111111";
pub const BOB: &str = "0x2222222222222222222222222222222222222222";
pub const CAROL: &str = "0x3333333333333333333333333333333333333333";

/// Program start used by the fixtures.
pub const T0: u64 = 1_700_000_000;
pub const DAY: u64 = SECONDS_PER_DAY;

/// Serves a fixed set of rows, in the order given.
pub struct MemorySource {
    events: Vec<RawEvent>,
}

impl MemorySource {
    pub fn new(events: Vec<RawEvent>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl EventSource for MemorySource {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn fetch_events(
        &self,
        contract: Address,
        signatures: &[&str],
    ) -> anyhow::Result<Vec<RawEvent>> {
        assert_eq!(contract, CONTRACT);
        assert_eq!(signatures.len(), 2);
        Ok(self.events.clone())
    }
}

fn raw(event_type: &str, block: u64, timestamp: u64, parameters: &[(&str, String)]) -> RawEvent {
    RawEvent {
        event_type: event_type.to_string(),
        block_number: block,
        block_timestamp: timestamp.to_string(),
        parameters: parameters
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect::<HashMap<_, _>>(),
    }
}

pub fn staked(block: u64, id: u64, sender: &str, amount: u64, lock: u8, at: u64) -> RawEvent {
    raw(
        "Staked",
        block,
        at,
        &[
            ("transactionId", id.to_string()),
            ("amount", amount.to_string()),
            ("stakedAt", at.to_string()),
            ("sender", sender.to_string()),
            ("lockPeriod", lock.to_string()),
        ],
    )
}

pub fn unstaked(block: u64, id: u64, status: u8, score: u64, at: u64) -> RawEvent {
    raw(
        "Unstaked",
        block,
        at,
        &[
            ("transactionId", id.to_string()),
            ("status", status.to_string()),
            ("score", score.to_string()),
            ("unstakedAt", at.to_string()),
        ],
    )
}

/// Two open stakes, one closed stake and one stake still inside its lock, listed out of
/// block order.
pub fn fixture_events() -> Vec<RawEvent> {
    vec![
        staked(40, 3, CAROL, 1, 3, T0 + 20 * DAY),
        staked(10, 0, ALICE, 1000, 0, T0),
        unstaked(30, 2, 2, 400, T0 + 12 * DAY),
        staked(11, 1, BOB, 500, 1, T0 + DAY),
        staked(20, 2, ALICE, 200, 0, T0 + 10 * DAY),
    ]
}

pub fn config(as_of: u64) -> SyncConfig {
    SyncConfig {
        contract_address: CONTRACT,
        program_start: Some(T0),
        snapshot_timestamp: None,
        as_of: Some(as_of),
        from_history: false,
    }
}

pub fn service(dir: &Path, config: SyncConfig, events: Vec<RawEvent>) -> StakingSyncService {
    StakingSyncService::new(store(dir), config).with_source(Arc::new(MemorySource::new(events)))
}

pub fn store(dir: &Path) -> Arc<JsonFileStore> {
    Arc::new(JsonFileStore::new(dir, DocumentNames::new(PROGRAM, SOURCE)))
}

pub fn read_document(dir: &Path, name: &str) -> serde_json::Value {
    let contents = std::fs::read(dir.join(name)).unwrap();
    serde_json::from_slice(&contents).unwrap()
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}
