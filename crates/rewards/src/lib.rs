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

//! Staking ledger reconciliation and loyalty score leaderboards for the Clash staking contract.

// Declare modules
pub mod events;
pub mod leaderboard;
pub mod ledger;
pub mod scoring;
pub mod snapshot;

// Re-export commonly used types
pub use events::{
    normalize_events, parse_timestamp, IngestError, LockPeriod, RawEvent, StakeEvent, Staked,
    TransactionStatus, Unstaked, STAKED_EVENT_SIGNATURE, UNSTAKED_EVENT_SIGNATURE,
};

pub use leaderboard::{compute_leaderboard, Staker};

pub use ledger::{Ledger, LedgerError, Transaction};

pub use scoring::{score, ScoreOverflow, SECONDS_PER_DAY};

pub use snapshot::{compute_snapshot, compute_standings, WeeklySchedule, SECONDS_PER_WEEK};

use serde::{Deserialize, Serialize};

/// Journal of every staking event seen for the contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingEventHistory {
    pub events: Vec<StakeEvent>,
    pub number_of_events: usize,
    /// Highest block number among `events`, 0 when empty
    pub last_block: u64,
}

impl StakingEventHistory {
    pub fn new(events: Vec<StakeEvent>) -> Self {
        let last_block = events.iter().map(StakeEvent::block_number).max().unwrap_or(0);
        Self { number_of_events: events.len(), last_block, events }
    }
}

/// Serializes [alloy_primitives::U256] values as base-10 strings, so amounts stay exact and
/// readable in JSON.
pub mod u256_decimal {
    use alloy_primitives::U256;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let s = String::deserialize(deserializer)?;
        U256::from_str_radix(&s, 10).map_err(D::Error::custom)
    }
}
