// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::unwrap_used))]

//! qr-storage: durable, externally-readable worker state — the ledger,
//! heartbeat file, running-tasks snapshot, circuit breaker state, and log
//! rotation/pruning. All writers use temp-file-plus-rename so an external
//! GUI reading these files never observes a partial write.

pub mod atomic;
pub mod breaker;
pub mod heartbeat;
pub mod ledger;
pub mod prune;
pub mod running_tasks;

pub use breaker::{BreakerState, BreakerStore, ToolBreaker};
pub use heartbeat::Heartbeat;
pub use ledger::{Ledger, LedgerError, LedgerRecord};
pub use running_tasks::{RunningTaskEntry, RunningTasksFile};
