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

//! Ledger documents stored as pretty-printed JSON files in one directory.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use clash_rewards::StakingEventHistory;
use serde::Serialize;
use tempfile::{Builder, NamedTempFile};

use super::{LedgerDocuments, LedgerStore, StoreError};

/// File names of the documents of one program and event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNames {
    pub program: String,
    pub source: String,
}

impl DocumentNames {
    pub fn new(program: impl Into<String>, source: impl Into<String>) -> Self {
        Self { program: program.into(), source: source.into() }
    }

    pub fn history(&self) -> String {
        format!("{}-history-{}.json", self.program, self.source)
    }

    pub fn leaderboard(&self) -> String {
        format!("{}-stakers-{}.json", self.program, self.source)
    }

    pub fn snapshot(&self, timestamp: u64) -> String {
        format!("{}-stakers-snapshot-{}-{}.json", self.program, timestamp, self.source)
    }
}

pub struct JsonFileStore {
    dir: PathBuf,
    names: DocumentNames,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>, names: DocumentNames) -> Self {
        Self { dir: dir.into(), names }
    }

    fn stage<T: Serialize + ?Sized>(
        &self,
        name: String,
        value: &T,
    ) -> Result<(NamedTempFile, PathBuf), StoreError> {
        let mut file = NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut file, value)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        Ok((file, self.dir.join(name)))
    }

    /// Hard-links the current document at `path`, if any, to a temp name in the same directory.
    fn back_up(&self, path: &Path) -> Result<Option<NamedTempFile<()>>, StoreError> {
        let backup = Builder::new().prefix(".backup").make_in(&self.dir, |link| {
            fs::hard_link(path, link)
        });
        match backup {
            Ok(backup) => Ok(Some(backup)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Puts back the documents replaced so far, newest first.
fn roll_back(replaced: Vec<(PathBuf, Option<NamedTempFile<()>>)>) {
    for (path, backup) in replaced.into_iter().rev() {
        let restored = match backup {
            Some(backup) => backup.persist(&path).map_err(|err| err.error),
            None => fs::remove_file(&path),
        };
        match restored {
            Ok(()) => tracing::warn!("Restored {}", path.display()),
            Err(err) => tracing::error!("Failed to restore {}: {}", path.display(), err),
        }
    }
}

#[async_trait]
impl LedgerStore for JsonFileStore {
    async fn load_history(&self) -> Result<Option<StakingEventHistory>, StoreError> {
        let path = self.dir.join(self.names.history());
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!("No history document at {}", path.display());
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&contents)?))
    }

    async fn commit(&self, documents: &LedgerDocuments) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        // Nothing is renamed until every document has been written out.
        let mut staged = vec![
            self.stage(self.names.history(), &documents.history)?,
            self.stage(self.names.leaderboard(), &documents.leaderboard)?,
        ];
        if let Some(snapshot) = &documents.snapshot {
            staged.push(self.stage(self.names.snapshot(snapshot.timestamp), &snapshot.stakers)?);
        }

        // Replaced documents keep a backup until every rename has gone through.
        let mut replaced = Vec::with_capacity(staged.len());
        for (file, path) in staged {
            let persisted = self
                .back_up(&path)
                .and_then(|backup| Ok((backup, file.persist(&path)?)));
            match persisted {
                Ok((backup, _)) => {
                    tracing::info!("Wrote {}", path.display());
                    replaced.push((path, backup));
                }
                Err(err) => {
                    roll_back(replaced);
                    return Err(err);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Snapshot;
    use alloy::primitives::{Address, U256};
    use clash_rewards::{LockPeriod, StakeEvent, Staked, Staker};

    fn documents(snapshot: Option<u64>) -> LedgerDocuments {
        let history = StakingEventHistory::new(vec![StakeEvent::Staked(Staked {
            block_number: 5,
            timestamp: 100,
            transaction_id: 0,
            amount: U256::from(10),
            staked_at: 100,
            sender: Address::repeat_byte(1),
            lock_period: LockPeriod::NoLock,
        })]);
        let stakers = vec![Staker {
            address: Address::repeat_byte(1),
            amount: U256::from(10),
            score: U256::from(30),
            rank: 1,
            transaction_ids: vec![0],
            top_staking_reward: U256::ZERO,
            standard_reward: U256::ZERO,
        }];
        LedgerDocuments {
            history,
            leaderboard: stakers.clone(),
            snapshot: snapshot.map(|timestamp| Snapshot { timestamp, stakers }),
        }
    }

    #[test]
    fn document_names() {
        let names = DocumentNames::new("clash-staking", "cdp");
        assert_eq!(names.history(), "clash-staking-history-cdp.json");
        assert_eq!(names.leaderboard(), "clash-staking-stakers-cdp.json");
        assert_eq!(
            names.snapshot(1_700_000_000),
            "clash-staking-stakers-snapshot-1700000000-cdp.json"
        );
    }

    #[tokio::test]
    async fn missing_history_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), DocumentNames::new("p", "cdp"));
        assert!(store.load_history().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_writes_all_documents_and_history_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/staking");
        let store = JsonFileStore::new(&target, DocumentNames::new("p", "cdp"));
        let docs = documents(Some(604_800));

        store.commit(&docs).await.unwrap();

        let mut files: Vec<_> = fs::read_dir(&target)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        files.sort();
        assert_eq!(
            files,
            ["p-history-cdp.json", "p-stakers-cdp.json", "p-stakers-snapshot-604800-cdp.json"]
        );

        let leaderboard: serde_json::Value =
            serde_json::from_slice(&fs::read(target.join("p-stakers-cdp.json")).unwrap()).unwrap();
        assert_eq!(leaderboard[0]["score"], "30");
        assert_eq!(leaderboard[0]["transactionIds"], serde_json::json!([0]));

        assert_eq!(store.load_history().await.unwrap(), Some(docs.history));
    }

    #[tokio::test]
    async fn commit_replaces_previous_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), DocumentNames::new("p", "rpc"));
        store.commit(&documents(None)).await.unwrap();

        let mut docs = documents(None);
        docs.leaderboard.clear();
        store.commit(&docs).await.unwrap();

        let contents = fs::read_to_string(dir.path().join("p-stakers-rpc.json")).unwrap();
        assert_eq!(contents.trim(), "[]");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    fn empty_documents() -> LedgerDocuments {
        LedgerDocuments {
            history: StakingEventHistory::new(vec![]),
            leaderboard: vec![],
            snapshot: None,
        }
    }

    fn block_leaderboard(dir: &Path) {
        let blocked = dir.join("p-stakers-cdp.json");
        let _ = fs::remove_file(&blocked);
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("keep"), "x").unwrap();
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn failed_commit_restores_replaced_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), DocumentNames::new("p", "cdp"));
        store.commit(&empty_documents()).await.unwrap();
        let before = fs::read(dir.path().join("p-history-cdp.json")).unwrap();

        // The history is replaced first, then the leaderboard cannot be.
        block_leaderboard(dir.path());
        assert!(store.commit(&documents(None)).await.is_err());

        assert_eq!(fs::read(dir.path().join("p-history-cdp.json")).unwrap(), before);
        assert_eq!(store.load_history().await.unwrap(), Some(empty_documents().history));
        assert_eq!(file_names(dir.path()), ["p-history-cdp.json", "p-stakers-cdp.json"]);
    }

    #[tokio::test]
    async fn failed_first_commit_removes_new_documents() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path(), DocumentNames::new("p", "cdp"));
        block_leaderboard(dir.path());

        assert!(store.commit(&documents(Some(604_800))).await.is_err());

        assert!(store.load_history().await.unwrap().is_none());
        assert_eq!(file_names(dir.path()), ["p-stakers-cdp.json"]);
    }

    #[tokio::test]
    async fn corrupt_history_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("p-history-cdp.json"), "{not json").unwrap();
        let store = JsonFileStore::new(dir.path(), DocumentNames::new("p", "cdp"));
        assert!(matches!(store.load_history().await, Err(StoreError::Json(_))));
    }
}
