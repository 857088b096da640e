// SPDX-License-Identifier: MIT

//! Task identifiers.
//!
//! Spec: a task `id` is a short 10-character hex identifier, auto-generated
//! if the producer omits it, and unique within a single worker lifetime.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Number of hex characters in a generated task id.
pub const TASK_ID_LEN: usize = 10;

/// Unique identifier for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh random 10-character hex id.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TASK_ID_LEN / 2];
        rand::thread_rng().fill_bytes(&mut bytes);
        let mut s = String::with_capacity(TASK_ID_LEN);
        for b in bytes {
            s.push_str(&format!("{b:02x}"));
        }
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive a recurring-clone id: `<id>-r<HHmmss>` truncated back down to
    /// keeps ids short and greppable in the ledger.
    pub fn recurring_clone(&self, suffix: &str) -> Self {
        Self(format!("{}-{}", self.0, suffix))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for TaskId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_is_ten_hex_chars() {
        let id = TaskId::generate();
        assert_eq!(id.as_str().len(), TASK_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = TaskId::generate();
        let b = TaskId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn recurring_clone_keeps_parent_prefix() {
        let parent = TaskId::from("abc1234567");
        let child = parent.recurring_clone("153045");
        assert_eq!(child.as_str(), "abc1234567-153045");
    }
}
