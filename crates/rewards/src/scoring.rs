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

//! Time-weighted loyalty score.
//!
//! A stake earns nothing while locked. Once the lock expires it accrues `amount × multiplier`
//! per whole elapsed day.

use alloy_primitives::U256;
use thiserror::Error;

use crate::events::LockPeriod;

pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("score of {amount} over {days} days overflows 256 bits")]
pub struct ScoreOverflow {
    pub amount: U256,
    pub days: u64,
}

impl LockPeriod {
    /// Lock duration in days.
    pub fn days(self) -> u64 {
        match self {
            Self::NoLock => 0,
            Self::Lock30Days => 30,
            Self::Lock60Days => 60,
            Self::Lock90Days => 90,
        }
    }

    pub fn seconds(self) -> u64 {
        self.days() * SECONDS_PER_DAY
    }

    /// Score multiplier as `(numerator, denominator)`.
    pub fn multiplier(self) -> (u64, u64) {
        match self {
            Self::NoLock => (1, 1),
            Self::Lock30Days => (5, 4),
            Self::Lock60Days => (3, 2),
            Self::Lock90Days => (2, 1),
        }
    }
}

/// Whole days between `staked_at` and `as_of`, rounded toward negative infinity.
fn elapsed_whole_days(staked_at: u64, as_of: u64) -> i128 {
    (i128::from(as_of) - i128::from(staked_at)).div_euclid(i128::from(SECONDS_PER_DAY))
}

/// Days of the stake that count toward its score as of `as_of`.
pub fn accrued_days(lock_period: LockPeriod, staked_at: u64, as_of: u64) -> u64 {
    let locked_days = i128::from(lock_period.seconds() / SECONDS_PER_DAY);
    let accrued = (elapsed_whole_days(staked_at, as_of) - locked_days).max(0);
    u64::try_from(accrued).unwrap_or(u64::MAX)
}

/// Score of an open stake as of `as_of`.
///
/// `floor(amount × multiplier × max(0, elapsed_days − locked_days))`, computed exactly.
pub fn score(
    amount: U256,
    lock_period: LockPeriod,
    staked_at: u64,
    as_of: u64,
) -> Result<U256, ScoreOverflow> {
    let days = accrued_days(lock_period, staked_at, as_of);
    if days == 0 {
        return Ok(U256::ZERO);
    }
    let (numerator, denominator) = lock_period.multiplier();
    amount
        .checked_mul(U256::from(numerator))
        .and_then(|scaled| scaled.checked_mul(U256::from(days)))
        .map(|product| product / U256::from(denominator))
        .ok_or(ScoreOverflow { amount, days })
}
