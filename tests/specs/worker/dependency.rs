// SPDX-License-Identifier: MIT

//! Spec §8 scenario 5 "Dependency failure skip": task `b` depends on task
//! `a`; `a` fails, so `b` is recorded as exit 409 without ever launching a
//! process, and the file moves to `failed/`.

use crate::support::{default_policy, wait_for, TestRepo};
use std::time::Duration;

#[test]
fn dependent_task_is_skipped_with_409_when_dependency_fails() {
    let repo = TestRepo::new();
    repo.write_policy(default_policy());
    repo.drop_inbox_file(
        "deps.jsonl",
        "{\"id\":\"a\",\"tool\":\"false\",\"args\":[]}\n\
         {\"id\":\"b\",\"tool\":\"true\",\"depends_on\":[\"a\"],\"args\":[]}\n",
    );

    let mut worker = repo.spawn_worker();
    let done = wait_for(Duration::from_secs(15), || repo.exists(".tasks/failed/deps.jsonl"));
    worker.stop(repo.path(), Duration::from_secs(10));

    assert!(done, "expected deps.jsonl to move to failed/");
    let ledger = repo.ledger_contents();

    let a_line = ledger.lines().find(|l| l.contains("\"id\":\"a\"")).expect("a's ledger line");
    assert!(a_line.contains("\"ok\":false"));

    let b_line = ledger.lines().find(|l| l.contains("\"id\":\"b\"")).expect("b's ledger line");
    assert!(b_line.contains("\"exit\":409"));
    assert!(b_line.contains("\"ok\":false"));

    // `b`'s tool ("true") never ran: only one attempt line exists for
    // a real process (a's), b's is the synchronous 409 skip.
    assert!(!repo.exists("logs/task_b.log"));
}
