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

use std::sync::Arc;

use alloy::primitives::Address;
use async_trait::async_trait;
use clash_rewards::{RawEvent, STAKED_EVENT_SIGNATURE, UNSTAKED_EVENT_SIGNATURE};

/// Event signatures of the staking contract that the ledger is built from.
pub const STAKING_EVENT_SIGNATURES: [&str; 2] = [STAKED_EVENT_SIGNATURE, UNSTAKED_EVENT_SIGNATURE];

pub type EventSourceObj = Arc<dyn EventSource + Send + Sync>;

/// Somewhere staking events can be read from.
#[async_trait]
pub trait EventSource {
    /// Short identifier used to name the documents produced from this source.
    fn name(&self) -> &str;

    /// Returns every event emitted by `contract` whose signature is in `signatures`.
    ///
    /// Rows carry the event name in `event_type` and the decoded parameters keyed by their
    /// Solidity names. Ordering is not guaranteed.
    async fn fetch_events(
        &self,
        contract: Address,
        signatures: &[&str],
    ) -> anyhow::Result<Vec<RawEvent>>;
}

/// Name of the event declared by a Solidity signature, e.g. `Staked` for
/// `Staked(uint256,uint256,uint40,address,uint8)`.
pub fn event_name(signature: &str) -> &str {
    signature.split_once('(').map_or(signature, |(name, _)| name)
}
