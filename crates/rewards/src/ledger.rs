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

//! Reconciliation of staking events into stake transactions.

use std::collections::{btree_map::Entry, BTreeMap};

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{LockPeriod, StakeEvent, TransactionStatus};

/// The event stream contradicts itself.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Unstaked event at block {block} references unknown transaction {transaction_id}")]
    UnknownTransaction { transaction_id: u64, block: u64 },

    #[error("duplicate Staked event for transaction {transaction_id} at block {block}")]
    DuplicateTransaction { transaction_id: u64, block: u64 },

    #[error("score or stake totals overflow 256 bits at transaction {transaction_id}")]
    Overflow { transaction_id: u64 },
}

/// Current state of a single stake.
///
/// Built from its `Staked` event and updated in place by its `Unstaked` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: u64,
    pub sender: Address,
    #[serde(with = "crate::u256_decimal")]
    pub amount: U256,
    pub staked_at: u64,
    pub lock_period: LockPeriod,
    pub status: TransactionStatus,
    /// Score recorded by the contract when the stake was closed; zero while open.
    #[serde(with = "crate::u256_decimal")]
    pub score: U256,
    pub unstaked_at: u64,
}

impl Transaction {
    pub fn is_open(&self) -> bool {
        self.status == TransactionStatus::Staked
    }
}

/// Stake transactions keyed by transaction id.
///
/// Iteration order is ascending by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    transactions: BTreeMap<u64, Transaction>,
}

impl Ledger {
    /// Folds block-ordered events into a ledger.
    pub fn reconcile<'a>(
        events: impl IntoIterator<Item = &'a StakeEvent>,
    ) -> Result<Self, LedgerError> {
        let mut ledger = Self::default();
        for event in events {
            ledger.apply(event)?;
        }
        Ok(ledger)
    }

    /// Applies one event. Fails without modifying the ledger if the event is inconsistent with it.
    pub fn apply(&mut self, event: &StakeEvent) -> Result<(), LedgerError> {
        match event {
            StakeEvent::Staked(staked) => match self.transactions.entry(staked.transaction_id) {
                Entry::Occupied(_) => Err(LedgerError::DuplicateTransaction {
                    transaction_id: staked.transaction_id,
                    block: staked.block_number,
                }),
                Entry::Vacant(slot) => {
                    slot.insert(Transaction {
                        transaction_id: staked.transaction_id,
                        sender: staked.sender,
                        amount: staked.amount,
                        staked_at: staked.staked_at,
                        lock_period: staked.lock_period,
                        status: TransactionStatus::Staked,
                        score: U256::ZERO,
                        unstaked_at: 0,
                    });
                    Ok(())
                }
            },
            StakeEvent::Unstaked(unstaked) => {
                let transaction = self.transactions.get_mut(&unstaked.transaction_id).ok_or(
                    LedgerError::UnknownTransaction {
                        transaction_id: unstaked.transaction_id,
                        block: unstaked.block_number,
                    },
                )?;
                transaction.status = unstaked.status;
                transaction.score = unstaked.score;
                transaction.unstaked_at = unstaked.unstaked_at;
                Ok(())
            }
        }
    }

    pub fn get(&self, transaction_id: u64) -> Option<&Transaction> {
        self.transactions.get(&transaction_id)
    }

    /// Transactions in ascending id order.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.values()
    }

    pub fn open_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions().filter(|t| t.is_open())
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}
