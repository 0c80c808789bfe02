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

//! Point-in-time leaderboards and weekly snapshot boundaries.

use crate::{
    events::StakeEvent,
    leaderboard::{compute_leaderboard, Staker},
    ledger::{Ledger, LedgerError},
    scoring::SECONDS_PER_DAY,
};

pub const SECONDS_PER_WEEK: u64 = 7 * SECONDS_PER_DAY;

/// Reconciles `events` and ranks stakers as of `as_of`.
pub fn compute_standings(events: &[StakeEvent], as_of: u64) -> Result<Vec<Staker>, LedgerError> {
    let ledger = Ledger::reconcile(events)?;
    compute_leaderboard(&ledger, as_of)
}

/// Leaderboard computed only from events with `timestamp <= snapshot_timestamp`, scored as of
/// the snapshot time.
pub fn compute_snapshot(
    events: &[StakeEvent],
    snapshot_timestamp: u64,
) -> Result<Vec<Staker>, LedgerError> {
    let ledger = Ledger::reconcile(events.iter().filter(|e| e.timestamp() <= snapshot_timestamp))?;
    compute_leaderboard(&ledger, snapshot_timestamp)
}

/// Position of `now` relative to the staking program's weekly schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    /// Index of the week `now` falls in, counting from 0 at the program start.
    pub current_week: u64,
    /// End of the last completed week; the timestamp weekly snapshots are taken at.
    pub snapshot_timestamp: u64,
}

impl WeeklySchedule {
    /// Returns `None` if the program has not started yet.
    pub fn at(program_start: u64, now: u64) -> Option<Self> {
        let since_start = now.checked_sub(program_start)?;
        let current_week = since_start / SECONDS_PER_WEEK;
        let snapshot_timestamp = program_start + current_week * SECONDS_PER_WEEK;
        Some(Self { current_week, snapshot_timestamp })
    }

    /// Index of the last completed week, if any.
    pub fn previous_week(&self) -> Option<u64> {
        self.current_week.checked_sub(1)
    }
}
