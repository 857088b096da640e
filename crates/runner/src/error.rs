// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("io error launching process: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("child process produced no {0} pipe")]
    MissingPipe(&'static str),
}
