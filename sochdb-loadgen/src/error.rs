// SPDX-License-Identifier: AGPL-3.0-or-later
// SochDB - LLM-Optimized Embedded Database
// Copyright (C) 2026 Sushanth Reddy Vanagala (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Error taxonomy for runs, backends and the worker pool.
//!
//! Every error is `Clone`: a failed run keeps the first error it saw and
//! hands out copies of it on request.

use crate::run::RunState;
use crate::stats::OpKind;

/// Result alias used throughout the orchestrator.
pub type RunResult<T> = std::result::Result<T, RunError>;

/// Item (de)serialization failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("malformed {type_name} payload: {reason}")]
    Malformed {
        type_name: &'static str,
        reason: String,
    },
}

/// Failure raised by a backend collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("backend create failed: {0}")]
    CreateFailed(String),

    #[error("backend write failed: {0}")]
    WriteFailed(String),

    #[error("backend read failed: {0}")]
    ReadFailed(String),

    #[error("backend close failed: {0}")]
    CloseFailed(String),

    #[error("backend '{backend}' does not support {operation}")]
    Unsupported {
        backend: String,
        operation: &'static str,
    },
}

impl BackendError {
    /// Re-labels any error raised inside a writer as a write failure.
    pub fn into_write_failure(self) -> Self {
        match self {
            e @ BackendError::WriteFailed(_) => e,
            other => BackendError::WriteFailed(other.to_string()),
        }
    }

    /// Re-labels any error raised inside a reader as a read failure.
    pub fn into_read_failure(self) -> Self {
        match self {
            e @ BackendError::ReadFailed(_) => e,
            other => BackendError::ReadFailed(other.to_string()),
        }
    }
}

impl From<CodecError> for BackendError {
    fn from(e: CodecError) -> Self {
        BackendError::ReadFailed(e.to_string())
    }
}

/// Worker pool failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool has been shut down")]
    Shutdown,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Failure of a run, either before it starts or as its terminal state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("backend '{backend}' does not support {operation}")]
    UnsupportedOperation {
        backend: String,
        operation: &'static str,
    },

    #[error("stats are only available after the run terminated (state: {0})")]
    NotReady(RunState),

    #[error("cannot {action} a run in state {state}")]
    IllegalState {
        state: RunState,
        action: &'static str,
    },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{kind} worker {index} exited without reporting a result")]
    WorkerPanicked { kind: OpKind, index: usize },

    #[error("interrupted while waiting for workers")]
    Interrupted,

    #[error(transparent)]
    Pool(#[from] PoolError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_failure_relabel() {
        let e = BackendError::CloseFailed("disk gone".into()).into_write_failure();
        assert_eq!(e, BackendError::WriteFailed("backend close failed: disk gone".into()));

        let e = BackendError::WriteFailed("full".into()).into_write_failure();
        assert_eq!(e, BackendError::WriteFailed("full".into()));
    }

    #[test]
    fn test_codec_error_is_read_failure() {
        let codec = CodecError::Malformed {
            type_name: "i64",
            reason: "expected 8 bytes, got 3".into(),
        };
        let e: BackendError = codec.into();
        assert!(matches!(e, BackendError::ReadFailed(msg) if msg.contains("expected 8 bytes")));
    }

    #[test]
    fn test_run_error_display() {
        let e = RunError::NotReady(RunState::Running);
        assert_eq!(
            e.to_string(),
            "stats are only available after the run terminated (state: running)"
        );
        let e = RunError::WorkerPanicked {
            kind: OpKind::Read,
            index: 3,
        };
        assert_eq!(e.to_string(), "read worker 3 exited without reporting a result");
    }
}
