// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Printgate.

use thiserror::Error;

use crate::types::{JobId, JobStatus};

/// Top-level error type for all Printgate operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    // -- Trust material --
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("private key could not be loaded: {0}")]
    KeyLoad(String),

    #[error("signing failed: {0}")]
    Signing(String),

    // -- Agent communication --
    #[error("agent channel error: {0}")]
    Channel(String),

    #[error("agent protocol error: {0}")]
    Protocol(String),

    #[error("agent reported an error: {0}")]
    Agent(String),

    #[error("operation cancelled")]
    Cancelled,

    // -- Caller mistakes --
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // -- Job registry --
    #[error("print job {0} not found")]
    JobNotFound(JobId),

    #[error("print job {0} is already registered")]
    DuplicateJob(JobId),

    #[error("print job {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    // -- Plumbing --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, GatewayError>;
