// SPDX-License-Identifier: MIT

//! Spec §8 scenario 4 "Circuit breaker opens": after `WindowFailures`
//! single-task files for the same tool all fail, the breaker opens; a
//! file dropped afterwards is quarantined without any child process.

use crate::support::{default_policy, wait_for, TestRepo};
use std::time::Duration;

#[test]
fn breaker_opens_after_window_failures_then_quarantines_next_file() {
    let repo = TestRepo::new();
    repo.write_policy(default_policy()); // window_failures = 3

    for i in 1..=3 {
        repo.drop_inbox_file(
            &format!("f{i}.jsonl"),
            &format!("{{\"id\":\"x{i}\",\"tool\":\"false\",\"args\":[]}}"),
        );
    }

    let mut worker = repo.spawn_worker();
    let all_failed = wait_for(Duration::from_secs(20), || {
        (1..=3).all(|i| repo.exists(&format!(".tasks/failed/f{i}.jsonl")))
    });
    assert!(all_failed, "expected all three single-task files to fail");

    assert!(wait_for(Duration::from_secs(5), || {
        std::fs::read_to_string(repo.path().join(".state/circuit_breakers.json"))
            .map(|s| s.contains("\"open\""))
            .unwrap_or(false)
    }));

    repo.drop_inbox_file("f4.jsonl", r#"{"id":"x4","tool":"false","args":[]}"#);
    let quarantined = wait_for(Duration::from_secs(15), || repo.exists(".tasks/quarantine/f4.jsonl"));
    worker.stop(repo.path(), Duration::from_secs(10));

    assert!(quarantined, "expected f4.jsonl to be quarantined while breaker is open");
    assert!(!repo.exists("logs/task_x4.log"));

    let ledger = repo.ledger_contents();
    assert!(!ledger.contains("\"id\":\"x4\""), "no attempt should ever be recorded for x4");
}
