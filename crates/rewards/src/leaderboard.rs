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

//! Per-staker aggregation and ranking.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{
    ledger::{Ledger, LedgerError},
    scoring::score,
};

/// A ranked staker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staker {
    pub address: Address,
    /// Total amount held in open stakes
    #[serde(with = "crate::u256_decimal")]
    pub amount: U256,
    /// Sum of the scores of open stakes
    #[serde(with = "crate::u256_decimal")]
    pub score: U256,
    /// 1-based position on the leaderboard
    pub rank: u64,
    /// Ids of the staker's open stakes, ascending
    pub transaction_ids: Vec<u64>,
    #[serde(with = "crate::u256_decimal")]
    pub top_staking_reward: U256,
    #[serde(with = "crate::u256_decimal")]
    pub standard_reward: U256,
}

impl Staker {
    fn new(address: Address) -> Self {
        Self {
            address,
            amount: U256::ZERO,
            score: U256::ZERO,
            rank: 0,
            transaction_ids: Vec::new(),
            top_staking_reward: U256::ZERO,
            standard_reward: U256::ZERO,
        }
    }
}

/// Builds the leaderboard of stakers with a positive score as of `as_of`.
///
/// Only open stakes count. Stakers are sorted by score, highest first; stakers with equal scores
/// keep the order in which they first appear when walking transactions by ascending id. Fails if a
/// score or a per-staker total does not fit in 256 bits.
pub fn compute_leaderboard(ledger: &Ledger, as_of: u64) -> Result<Vec<Staker>, LedgerError> {
    let mut order: Vec<Address> = Vec::new();
    let mut stakers: HashMap<Address, Staker> = HashMap::new();

    for transaction in ledger.transactions() {
        let staker = stakers.entry(transaction.sender).or_insert_with(|| {
            order.push(transaction.sender);
            Staker::new(transaction.sender)
        });
        if transaction.is_open() {
            let overflow = || LedgerError::Overflow { transaction_id: transaction.transaction_id };
            let stake_score = score(
                transaction.amount,
                transaction.lock_period,
                transaction.staked_at,
                as_of,
            )
            .map_err(|_| overflow())?;
            staker.score = staker.score.checked_add(stake_score).ok_or_else(overflow)?;
            staker.amount = staker.amount.checked_add(transaction.amount).ok_or_else(overflow)?;
            staker.transaction_ids.push(transaction.transaction_id);
        }
    }

    let mut ranked: Vec<Staker> = order
        .into_iter()
        .filter_map(|address| stakers.remove(&address))
        .filter(|staker| staker.score > U256::ZERO)
        .collect();

    // Stable, so ties keep first-seen order.
    ranked.sort_by(|a, b| b.score.cmp(&a.score));

    for (index, staker) in ranked.iter_mut().enumerate() {
        staker.rank = index as u64 + 1;
    }

    Ok(ranked)
}
