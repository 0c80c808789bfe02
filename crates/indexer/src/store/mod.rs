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

pub mod json;

use std::sync::Arc;

use async_trait::async_trait;
use clash_rewards::{Staker, StakingEventHistory};
use thiserror::Error;

pub use json::{DocumentNames, JsonFileStore};

pub type LedgerStoreObj = Arc<dyn LedgerStore + Send + Sync>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error {0:?}")]
    Io(#[from] std::io::Error),

    #[error("JSON error {0:?}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to move document into place {0:?}")]
    Persist(#[from] tempfile::PersistError),
}

/// Leaderboard frozen at a snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub timestamp: u64,
    pub stakers: Vec<Staker>,
}

/// Everything a sync run writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerDocuments {
    pub history: StakingEventHistory,
    pub leaderboard: Vec<Staker>,
    pub snapshot: Option<Snapshot>,
}

#[async_trait]
pub trait LedgerStore {
    /// Loads the previously committed event history, if any.
    async fn load_history(&self) -> Result<Option<StakingEventHistory>, StoreError>;

    /// Writes all documents. Either every document is replaced or, if staging fails, none is.
    async fn commit(&self, documents: &LedgerDocuments) -> Result<(), StoreError>;
}
