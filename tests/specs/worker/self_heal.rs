// SPDX-License-Identifier: MIT

//! Spec §8 scenario 7 "Self-heal stale processing": a file pre-seeded in
//! `processing/` with an old mtime is moved back to `inbox/` on the
//! worker's first loop tick.

use crate::support::{wait_for, TestRepo};
use std::fs::File;
use std::time::Duration;

#[test]
fn stale_processing_file_is_recovered_to_inbox_on_startup() {
    let repo = TestRepo::new();
    repo.write_policy(
        r#"
        [queue]
        recovery_processing_stale_minutes = 10
        "#,
    );

    let stale_path = repo.path().join(".tasks/processing/stale.jsonl");
    std::fs::write(&stale_path, r#"{"id":"s1","tool":"echo","args":["hi"]}"#).unwrap();
    let thirty_minutes_ago = std::time::SystemTime::now() - Duration::from_secs(30 * 60);
    File::open(&stale_path).unwrap().set_modified(thirty_minutes_ago).unwrap();

    let mut worker = repo.spawn_worker();
    let recovered = wait_for(Duration::from_secs(10), || {
        repo.exists(".tasks/inbox/stale.jsonl") && !stale_path.exists()
    });
    worker.stop(repo.path(), Duration::from_secs(10));

    assert!(recovered, "expected stale.jsonl to be recovered to inbox/ within the first tick");
}
