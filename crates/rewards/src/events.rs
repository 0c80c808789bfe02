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

//! Staking event types and normalization of raw event rows.

use std::{collections::HashMap, str::FromStr};

use alloy_primitives::{Address, U256};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Solidity signature of the `Staked` event.
pub const STAKED_EVENT_SIGNATURE: &str = "Staked(uint256,uint256,uint40,address,uint8)";
/// Solidity signature of the `Unstaked` event.
pub const UNSTAKED_EVENT_SIGNATURE: &str = "Unstaked(uint256,uint8,uint256,uint40)";

/// Errors raised while turning raw rows into typed events.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IngestError {
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("{event} event at block {block} is missing parameter {field}")]
    MissingField { event: &'static str, block: u64, field: &'static str },

    #[error("invalid numeric value for {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid address for {field}: {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("unknown lock period discriminant {0}")]
    UnknownLockPeriod(u8),

    #[error("unknown transaction status discriminant {0}")]
    UnknownStatus(u8),
}

/// Lock tier chosen at stake time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockPeriod {
    NoLock,
    #[serde(rename = "LOCK_30_DAYS")]
    Lock30Days,
    #[serde(rename = "LOCK_60_DAYS")]
    Lock60Days,
    #[serde(rename = "LOCK_90_DAYS")]
    Lock90Days,
}

impl TryFrom<u8> for LockPeriod {
    type Error = IngestError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::NoLock),
            1 => Ok(Self::Lock30Days),
            2 => Ok(Self::Lock60Days),
            3 => Ok(Self::Lock90Days),
            other => Err(IngestError::UnknownLockPeriod(other)),
        }
    }
}

/// Status of a stake transaction as reported by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Staked,
    Cancelled,
    Unstaked,
}

impl TryFrom<u8> for TransactionStatus {
    type Error = IngestError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Staked),
            1 => Ok(Self::Cancelled),
            2 => Ok(Self::Unstaked),
            other => Err(IngestError::UnknownStatus(other)),
        }
    }
}

/// Emitted when a new stake transaction is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staked {
    pub block_number: u64,
    pub timestamp: u64,
    pub transaction_id: u64,
    #[serde(with = "crate::u256_decimal")]
    pub amount: U256,
    pub staked_at: u64,
    pub sender: Address,
    pub lock_period: LockPeriod,
}

/// Emitted when a stake transaction is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unstaked {
    pub block_number: u64,
    pub timestamp: u64,
    pub transaction_id: u64,
    pub status: TransactionStatus,
    #[serde(with = "crate::u256_decimal")]
    pub score: U256,
    pub unstaked_at: u64,
}

/// A decoded staking contract event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StakeEvent {
    Staked(Staked),
    Unstaked(Unstaked),
}

impl StakeEvent {
    pub fn block_number(&self) -> u64 {
        match self {
            Self::Staked(e) => e.block_number,
            Self::Unstaked(e) => e.block_number,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            Self::Staked(e) => e.timestamp,
            Self::Unstaked(e) => e.timestamp,
        }
    }

    pub fn transaction_id(&self) -> u64 {
        match self {
            Self::Staked(e) => e.transaction_id,
            Self::Unstaked(e) => e.transaction_id,
        }
    }
}

/// An event row as delivered by an event source, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    pub event_type: String,
    pub block_number: u64,
    pub block_timestamp: String,
    /// Decoded event parameters keyed by their Solidity name.
    pub parameters: HashMap<String, String>,
}

impl TryFrom<&RawEvent> for StakeEvent {
    type Error = IngestError;

    fn try_from(raw: &RawEvent) -> Result<Self, Self::Error> {
        let timestamp = parse_timestamp(&raw.block_timestamp)?;
        match raw.event_type.as_str() {
            "Staked" => {
                let params = Params { raw, event: "Staked" };
                Ok(StakeEvent::Staked(Staked {
                    block_number: raw.block_number,
                    timestamp,
                    transaction_id: params.number("transactionId")?,
                    amount: params.u256("amount")?,
                    staked_at: params.number("stakedAt")?,
                    sender: params.address("sender")?,
                    lock_period: LockPeriod::try_from(params.number::<u8>("lockPeriod")?)?,
                }))
            }
            "Unstaked" => {
                let params = Params { raw, event: "Unstaked" };
                Ok(StakeEvent::Unstaked(Unstaked {
                    block_number: raw.block_number,
                    timestamp,
                    transaction_id: params.number("transactionId")?,
                    status: TransactionStatus::try_from(params.number::<u8>("status")?)?,
                    score: params.u256("score")?,
                    unstaked_at: params.number("unstakedAt")?,
                }))
            }
            other => Err(IngestError::UnknownEventType(other.to_string())),
        }
    }
}

struct Params<'a> {
    raw: &'a RawEvent,
    event: &'static str,
}

impl Params<'_> {
    fn get(&self, field: &'static str) -> Result<&str, IngestError> {
        self.raw.parameters.get(field).map(|v| v.trim()).ok_or(IngestError::MissingField {
            event: self.event,
            block: self.raw.block_number,
            field,
        })
    }

    fn number<T: FromStr>(&self, field: &'static str) -> Result<T, IngestError> {
        let value = self.get(field)?;
        value
            .parse()
            .map_err(|_| IngestError::InvalidNumber { field, value: value.to_string() })
    }

    fn u256(&self, field: &'static str) -> Result<U256, IngestError> {
        let value = self.get(field)?;
        U256::from_str_radix(value, 10)
            .map_err(|_| IngestError::InvalidNumber { field, value: value.to_string() })
    }

    fn address(&self, field: &'static str) -> Result<Address, IngestError> {
        let value = self.get(field)?;
        value.parse().map_err(|_| IngestError::InvalidAddress { field, value: value.to_string() })
    }
}

/// Parses a block timestamp given either as epoch seconds or as a UTC datetime.
pub fn parse_timestamp(value: &str) -> Result<u64, IngestError> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(secs);
    }
    let secs = if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        dt.timestamp()
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        dt.and_utc().timestamp()
    } else {
        return Err(IngestError::InvalidTimestamp(value.to_string()));
    };
    u64::try_from(secs).map_err(|_| IngestError::InvalidTimestamp(value.to_string()))
}

/// Validates every raw row and returns the events sorted by block number.
///
/// The sort is stable, so rows from the same block keep the order the source delivered them in.
pub fn normalize_events(raw_events: &[RawEvent]) -> Result<Vec<StakeEvent>, IngestError> {
    let mut events =
        raw_events.iter().map(StakeEvent::try_from).collect::<Result<Vec<_>, _>>()?;
    events.sort_by_key(StakeEvent::block_number);
    Ok(events)
}
