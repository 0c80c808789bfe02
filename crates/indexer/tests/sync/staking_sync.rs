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

use clash_staking_indexer::{StakingSyncService, SyncConfig, SyncSummary};
use serde_json::json;
use tracing_test::traced_test;

use super::common::{self, *};

#[tokio::test]
async fn test_sync_writes_history_leaderboard_and_weekly_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let as_of = T0 + 50 * DAY;
    let summary = common::service(dir.path(), config(as_of), fixture_events()).run().await.unwrap();

    let snapshot_at = T0 + 49 * DAY;
    assert_eq!(
        summary,
        SyncSummary {
            number_of_events: 5,
            last_block: 40,
            stakers: 2,
            snapshot: Some((snapshot_at, 2)),
        }
    );
    assert_eq!(
        file_names(dir.path()),
        [
            "clash-staking-history-memory.json".to_string(),
            "clash-staking-stakers-memory.json".to_string(),
            format!("clash-staking-stakers-snapshot-{snapshot_at}-memory.json"),
        ]
    );

    let history = read_document(dir.path(), "clash-staking-history-memory.json");
    assert_eq!(history["numberOfEvents"], 5);
    assert_eq!(history["lastBlock"], 40);
    let blocks: Vec<_> =
        history["events"].as_array().unwrap().iter().map(|e| e["blockNumber"].clone()).collect();
    assert_eq!(blocks, [json!(10), json!(11), json!(20), json!(30), json!(40)]);
    assert_eq!(history["events"][0]["type"], "Staked");
    assert_eq!(history["events"][0]["lockPeriod"], "NO_LOCK");
    assert_eq!(history["events"][3]["type"], "Unstaked");
    assert_eq!(history["events"][3]["status"], "UNSTAKED");

    // alice: 1000 × 50 days; bob: 500 × 1.25 × (49 − 30) days; carol is still locked.
    let leaderboard = read_document(dir.path(), "clash-staking-stakers-memory.json");
    assert_eq!(
        leaderboard,
        json!([
            {
                "address": ALICE,
                "amount": "1000",
                "score": "50000",
                "rank": 1,
                "transactionIds": [0],
                "topStakingReward": "0",
                "standardReward": "0",
            },
            {
                "address": BOB,
                "amount": "500",
                "score": "11875",
                "rank": 2,
                "transactionIds": [1],
                "topStakingReward": "0",
                "standardReward": "0",
            },
        ])
    );

    let snapshot = read_document(
        dir.path(),
        &format!("clash-staking-stakers-snapshot-{snapshot_at}-memory.json"),
    );
    assert_eq!(snapshot[0]["score"], "49000");
    assert_eq!(snapshot[1]["score"], "11250");
}

#[tokio::test]
async fn test_snapshot_ignores_events_after_snapshot_time() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot_at = T0 + 11 * DAY;
    let config = SyncConfig { snapshot_timestamp: Some(snapshot_at), ..config(T0 + 50 * DAY) };
    common::service(dir.path(), config, fixture_events()).run().await.unwrap();

    // The unstake at day 12 has not happened yet and bob is inside his lock.
    let snapshot = read_document(
        dir.path(),
        &format!("clash-staking-stakers-snapshot-{snapshot_at}-memory.json"),
    );
    assert_eq!(snapshot.as_array().unwrap().len(), 1);
    assert_eq!(snapshot[0]["address"], ALICE);
    assert_eq!(snapshot[0]["amount"], "1200");
    assert_eq!(snapshot[0]["score"], "11200");
    assert_eq!(snapshot[0]["transactionIds"], json!([0, 2]));
}

#[tokio::test]
async fn test_no_snapshot_during_first_week() {
    let dir = tempfile::tempdir().unwrap();
    let summary = common::service(dir.path(), config(T0 + 6 * DAY), fixture_events())
        .run()
        .await
        .unwrap();
    assert_eq!(summary.snapshot, None);
    assert_eq!(file_names(dir.path()).len(), 2);
}

#[tokio::test]
async fn test_unknown_transaction_aborts_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let mut events = fixture_events();
    events.push(unstaked(50, 99, 1, 0, T0 + 30 * DAY));

    let err = common::service(dir.path(), config(T0 + 50 * DAY), events).run().await.unwrap_err();
    assert!(format!("{err:?}").contains("unknown transaction 99"));
    assert!(file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn test_malformed_event_aborts_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let mut events = fixture_events();
    events[1].parameters.insert("amount".into(), "12abc".into());

    let err = common::service(dir.path(), config(T0 + 50 * DAY), events).run().await.unwrap_err();
    assert!(format!("{err:?}").contains("Failed to decode staking events"));
    assert!(file_names(dir.path()).is_empty());
}

#[tokio::test]
async fn test_failed_run_keeps_previous_documents() {
    let dir = tempfile::tempdir().unwrap();
    common::service(dir.path(), config(T0 + 50 * DAY), fixture_events()).run().await.unwrap();
    let before = read_document(dir.path(), "clash-staking-stakers-memory.json");

    let mut events = fixture_events();
    events.push(staked(60, 0, CAROL, 5, 0, T0 + 40 * DAY));
    common::service(dir.path(), config(T0 + 51 * DAY), events).run().await.unwrap_err();

    assert_eq!(read_document(dir.path(), "clash-staking-stakers-memory.json"), before);
}

#[tokio::test]
async fn test_from_history_recomputes_without_fetching() {
    let dir = tempfile::tempdir().unwrap();
    common::service(dir.path(), config(T0 + 50 * DAY), fixture_events()).run().await.unwrap();

    let replay = StakingSyncService::new(
        common::store(dir.path()),
        SyncConfig { from_history: true, ..config(T0 + 60 * DAY) },
    );
    let summary = replay.run().await.unwrap();
    assert_eq!(summary.number_of_events, 5);
    assert_eq!(summary.snapshot, Some((T0 + 56 * DAY, 2)));

    let leaderboard = read_document(dir.path(), "clash-staking-stakers-memory.json");
    assert_eq!(leaderboard[0]["score"], "60000");
}

#[tokio::test]
async fn test_from_history_requires_a_history() {
    let dir = tempfile::tempdir().unwrap();
    let replay = StakingSyncService::new(
        common::store(dir.path()),
        SyncConfig { from_history: true, ..config(T0) },
    );
    let err = replay.run().await.unwrap_err();
    assert!(err.to_string().contains("No staking history"));
}

#[tokio::test]
#[traced_test]
async fn test_rerun_logs_history_progress() {
    let dir = tempfile::tempdir().unwrap();
    let mut events = fixture_events();
    let latest = events.remove(0);
    common::service(dir.path(), config(T0 + 50 * DAY), events.clone()).run().await.unwrap();

    events.push(latest);
    common::service(dir.path(), config(T0 + 50 * DAY), events).run().await.unwrap();

    assert!(logs_contain("History advanced from 4 events (block 30) to 5 events"));
}
