// SPDX-License-Identifier: MIT

//! Spec §8 scenario 1 "Happy path": a single-task file using an
//! always-succeeding tool ends up in `done/` with one `ok=true` ledger
//! line and a per-task log containing the tool's output.

use crate::support::{default_policy, wait_for, TestRepo};
use std::time::Duration;

#[test]
fn single_task_file_completes_to_done_with_ledger_and_log() {
    let repo = TestRepo::new();
    repo.write_policy(default_policy());
    repo.drop_inbox_file(
        "s1.jsonl",
        r#"{"id":"t1","tool":"echo","args":["hello"]}"#,
    );

    let mut worker = repo.spawn_worker();
    let done = wait_for(Duration::from_secs(15), || repo.exists(".tasks/done/s1.jsonl"));
    worker.stop(repo.path(), Duration::from_secs(10));

    assert!(done, "expected s1.jsonl to move to done/");
    let ledger = repo.ledger_contents();
    assert_eq!(ledger.lines().count(), 1);
    assert!(ledger.contains("\"ok\":true"));
    assert!(ledger.contains("\"exit\":0"));
    assert!(ledger.contains("\"attempt\":1"));

    let task_log = std::fs::read_to_string(repo.path().join("logs/task_t1.log")).unwrap();
    assert!(task_log.contains("hello"));
}
