// SPDX-License-Identifier: MIT

//! Spec §8 scenario 6 "Scheduled future task": a task with `run_at` five
//! seconds out does not attempt until that timestamp, then runs exactly
//! once and succeeds.

use crate::support::{default_policy, wait_for, TestRepo};
use std::time::Duration;

#[test]
fn future_run_at_delays_dispatch_until_due() {
    let repo = TestRepo::new();
    repo.write_policy(default_policy());
    let run_at = (chrono::Utc::now() + chrono::Duration::seconds(5)).to_rfc3339();
    repo.drop_inbox_file(
        "sched.jsonl",
        &format!("{{\"id\":\"t1\",\"tool\":\"echo\",\"args\":[\"go\"],\"run_at\":\"{run_at}\"}}"),
    );

    let mut worker = repo.spawn_worker();

    // For roughly the first four seconds, no attempt should have fired yet.
    std::thread::sleep(Duration::from_secs(4));
    assert!(repo.ledger_contents().is_empty(), "task ran before its run_at");

    let done = wait_for(Duration::from_secs(15), || repo.exists(".tasks/done/sched.jsonl"));
    worker.stop(repo.path(), Duration::from_secs(10));

    assert!(done, "expected sched.jsonl to complete after its run_at elapsed");
    let ledger = repo.ledger_contents();
    assert_eq!(ledger.lines().count(), 1);
    assert!(ledger.contains("\"ok\":true"));
}
