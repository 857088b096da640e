// SPDX-License-Identifier: MIT

//! Task priority.

use serde::{Deserialize, Serialize};

/// Dispatch priority. Ordered `High > Normal > Low`; `Ord`/`PartialOrd` are
/// derived top-down so `Priority::High > Priority::Normal` holds directly —
/// the scheduler sorts ready entries by `(priority desc, added asc)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

crate::simple_display! {
    Priority {
        Low => "low",
        Normal => "normal",
        High => "high",
    }
}
