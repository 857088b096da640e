// SPDX-License-Identifier: MIT

//! Spec §8 scenario 2 "Safety rejection": a `git checkout -b rollback/...`
//! task is rejected with exit 403 before any child process runs, and the
//! file moves to `failed/`.

use crate::support::{default_policy, wait_for, TestRepo};
use std::time::Duration;

#[test]
fn rollback_branch_creation_is_rejected_with_403_and_no_process() {
    let repo = TestRepo::new();
    repo.write_policy(default_policy());
    repo.drop_inbox_file(
        "b.jsonl",
        r#"{"id":"b","tool":"git","args":["checkout","-b","rollback/main/20250130"]}"#,
    );

    let mut worker = repo.spawn_worker();
    let failed = wait_for(Duration::from_secs(15), || repo.exists(".tasks/failed/b.jsonl"));
    worker.stop(repo.path(), Duration::from_secs(10));

    assert!(failed, "expected b.jsonl to move to failed/");
    let ledger = repo.ledger_contents();
    assert!(ledger.contains("\"id\":\"b\""));
    assert!(ledger.contains("\"exit\":403"));
    assert!(ledger.contains("\"ok\":false"));
    assert!(ledger.to_lowercase().contains("security"));

    // No child process means no per-task log was ever created.
    assert!(!repo.exists("logs/task_b.log"));
}
