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

use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clash_rewards::{
    compute_snapshot, compute_standings, normalize_events, StakeEvent, StakingEventHistory,
    WeeklySchedule,
};

use crate::{
    source::{EventSourceObj, STAKING_EVENT_SIGNATURES},
    store::{LedgerDocuments, LedgerStoreObj, Snapshot},
};

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub contract_address: Address,
    /// Start of the staking program. Weekly snapshots are taken at week boundaries counted
    /// from here.
    pub program_start: Option<u64>,
    /// Explicit snapshot time; takes precedence over the weekly schedule.
    pub snapshot_timestamp: Option<u64>,
    /// Time the leaderboard is scored at. Defaults to the wall clock.
    pub as_of: Option<u64>,
    /// Recompute from the stored history instead of fetching events.
    pub from_history: bool,
}

/// Outcome of a sync run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncSummary {
    pub number_of_events: usize,
    pub last_block: u64,
    pub stakers: usize,
    /// Snapshot time and number of stakers in it, when a snapshot was taken.
    pub snapshot: Option<(u64, usize)>,
}

pub struct StakingSyncService {
    store: LedgerStoreObj,
    source: Option<EventSourceObj>,
    config: SyncConfig,
}

impl StakingSyncService {
    pub fn new(store: LedgerStoreObj, config: SyncConfig) -> Self {
        Self { store, source: None, config }
    }

    pub fn with_source(self, source: EventSourceObj) -> Self {
        Self { source: Some(source), ..self }
    }

    /// Fetches the event journal, rebuilds the leaderboard (and snapshot, if due) and commits
    /// every document.
    pub async fn run(&self) -> Result<SyncSummary> {
        let start_time = std::time::Instant::now();
        tracing::info!("Starting staking sync for {:#x}", self.config.contract_address);

        let as_of = match self.config.as_of {
            Some(as_of) => as_of,
            None => u64::try_from(Utc::now().timestamp()).context("system clock is before 1970")?,
        };
        let snapshot_timestamp = self.snapshot_timestamp(as_of);

        let events = if self.config.from_history {
            self.replay_history().await?
        } else {
            self.fetch_events().await?
        };

        let history = StakingEventHistory::new(events);
        tracing::info!(
            "Reconciling {} events up to block {}",
            history.number_of_events,
            history.last_block
        );

        let leaderboard = compute_standings(&history.events, as_of)
            .context("Failed to reconcile staking events")?;
        tracing::info!(
            "Computed leaderboard of {} stakers as of {}",
            leaderboard.len(),
            format_timestamp(as_of)
        );

        let snapshot = match snapshot_timestamp {
            Some(timestamp) => {
                let stakers = compute_snapshot(&history.events, timestamp)
                    .context("Failed to compute snapshot")?;
                tracing::info!(
                    "Computed snapshot of {} stakers at {}",
                    stakers.len(),
                    format_timestamp(timestamp)
                );
                Some(Snapshot { timestamp, stakers })
            }
            None => None,
        };

        let summary = SyncSummary {
            number_of_events: history.number_of_events,
            last_block: history.last_block,
            stakers: leaderboard.len(),
            snapshot: snapshot.as_ref().map(|s| (s.timestamp, s.stakers.len())),
        };

        self.store
            .commit(&LedgerDocuments { history, leaderboard, snapshot })
            .await
            .context("Failed to write staking documents")?;

        tracing::info!(
            "Staking sync completed successfully in {:.2}s",
            start_time.elapsed().as_secs_f64()
        );
        Ok(summary)
    }

    fn snapshot_timestamp(&self, now: u64) -> Option<u64> {
        if let Some(timestamp) = self.config.snapshot_timestamp {
            tracing::info!("Using configured snapshot time {}", format_timestamp(timestamp));
            return Some(timestamp);
        }

        let program_start = self.config.program_start.filter(|start| *start > 0)?;
        let Some(schedule) = WeeklySchedule::at(program_start, now) else {
            tracing::info!(
                "Staking program starts at {}, no snapshot yet",
                format_timestamp(program_start)
            );
            return None;
        };
        let Some(previous_week) = schedule.previous_week() else {
            tracing::info!("First staking week still in progress, no snapshot yet");
            return None;
        };
        tracing::info!(
            "Week {} in progress, snapshot of week {} at {}",
            schedule.current_week,
            previous_week,
            format_timestamp(schedule.snapshot_timestamp)
        );
        Some(schedule.snapshot_timestamp)
    }

    async fn replay_history(&self) -> Result<Vec<StakeEvent>> {
        let Some(history) =
            self.store.load_history().await.context("Failed to load staking history")?
        else {
            bail!("No staking history to recompute from");
        };
        tracing::info!(
            "Recomputing from stored history of {} events up to block {}",
            history.number_of_events,
            history.last_block
        );
        Ok(history.events)
    }

    async fn fetch_events(&self) -> Result<Vec<StakeEvent>> {
        let Some(source) = &self.source else {
            bail!("No event source configured");
        };

        let previous = match self.store.load_history().await {
            Ok(previous) => previous,
            Err(err) => {
                tracing::warn!("Ignoring unreadable staking history: {:?}", err);
                None
            }
        };

        let raw_events = source
            .fetch_events(self.config.contract_address, &STAKING_EVENT_SIGNATURES)
            .await
            .with_context(|| format!("Failed to fetch staking events from {}", source.name()))?;
        let events = normalize_events(&raw_events).context("Failed to decode staking events")?;

        match previous {
            Some(previous) => tracing::info!(
                "History advanced from {} events (block {}) to {} events",
                previous.number_of_events,
                previous.last_block,
                events.len()
            ),
            None => tracing::info!("No previous history, starting with {} events", events.len()),
        }
        Ok(events)
    }
}

fn format_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|date| date.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}
