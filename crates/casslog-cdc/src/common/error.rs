//! Error types for CDC operations
//!
//! One crate-wide error enum with classification helpers. The split that
//! matters operationally is replica unavailability (the only fault class the
//! consistency-downgrade read protocol may retry at a weaker level) versus
//! everything else (surfaced immediately).

use crate::cluster::ConsistencyLevel;
use crate::commitlog::CommitLogPosition;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Error categories for reporting and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Cluster read/query errors (unavailability, timeouts, validation)
    Cluster,
    /// Durability errors (offset persistence, segment disposal)
    Durability,
    /// Configuration errors (invalid settings, bad inputs)
    Configuration,
    /// Network errors (connection loss)
    Network,
    /// Other/unknown errors
    Other,
}

/// CDC-specific errors
#[derive(Error, Debug)]
pub enum CdcError {
    /// Not enough live replicas to satisfy the requested consistency level.
    /// The only error class the read client responds to by downgrading.
    #[error("not enough replicas for {consistency}: required {required}, alive {alive}")]
    Unavailable {
        consistency: ConsistencyLevel,
        required: u32,
        alive: u32,
    },

    /// Cluster-side read timeout
    #[error("read timeout: {0}")]
    ReadTimeout(String),

    /// Query rejected by the cluster (syntax, unknown table, auth)
    #[error("query validation error: {0}")]
    QueryValidation(String),

    /// Connection to the cluster was lost
    #[error("connection closed")]
    ConnectionClosed,

    /// Offset file exists but does not hold a valid position. Fatal at
    /// startup: guessing a replay point risks silent loss or duplication.
    #[error("corrupt offset file {path}: {reason}")]
    OffsetCorrupt { path: PathBuf, reason: String },

    /// A serialized commit-log position could not be parsed
    #[error("invalid commit-log position {input:?}: {reason}")]
    InvalidPosition { input: String, reason: String },

    /// Segment file disposal (move/delete) failed
    #[error("segment disposal failed for {path}: {source}")]
    SegmentDisposal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Segment disposal requested before a covering offset flush
    #[error("segment {segment_id} not covered by flushed position {flushed}")]
    SegmentNotCovered {
        segment_id: i64,
        flushed: CommitLogPosition,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid state (e.g. operating on a closed store)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CdcError {
    /// Create an unavailability error for a consistency level.
    pub fn unavailable(consistency: ConsistencyLevel, required: u32, alive: u32) -> Self {
        Self::Unavailable {
            consistency,
            required,
            alive,
        }
    }

    /// Create a read timeout error
    pub fn read_timeout(msg: impl Into<String>) -> Self {
        Self::ReadTimeout(msg.into())
    }

    /// Create a query validation error
    pub fn query_validation(msg: impl Into<String>) -> Self {
        Self::QueryValidation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// True when the cluster reported insufficient live replicas.
    ///
    /// Downgrading consistency is a valid response only to this class;
    /// retrying a timeout or validation error at a weaker level would mask
    /// bugs and add load to an already-struggling cluster.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Check if this error is retriable at the pipeline level.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::ReadTimeout(_) => true,
            Self::ConnectionClosed => true,
            Self::SegmentDisposal { source, .. } => {
                use std::io::ErrorKind;
                matches!(
                    source.kind(),
                    ErrorKind::WouldBlock | ErrorKind::Interrupted | ErrorKind::TimedOut
                )
            }
            Self::Io(e) => {
                use std::io::ErrorKind;
                matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::TimedOut)
            }
            Self::QueryValidation(_)
            | Self::OffsetCorrupt { .. }
            | Self::InvalidPosition { .. }
            | Self::SegmentNotCovered { .. }
            | Self::Config(_)
            | Self::InvalidState(_)
            | Self::Json(_)
            | Self::Other(_) => false,
        }
    }

    /// Get the error category for reporting.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unavailable { .. } => ErrorCategory::Cluster,
            Self::ReadTimeout(_) => ErrorCategory::Cluster,
            Self::QueryValidation(_) => ErrorCategory::Cluster,
            Self::ConnectionClosed => ErrorCategory::Network,
            Self::OffsetCorrupt { .. } => ErrorCategory::Durability,
            Self::InvalidPosition { .. } => ErrorCategory::Durability,
            Self::SegmentDisposal { .. } => ErrorCategory::Durability,
            Self::SegmentNotCovered { .. } => ErrorCategory::Durability,
            Self::Io(_) => ErrorCategory::Durability,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::InvalidState(_) => ErrorCategory::Other,
            Self::Json(_) => ErrorCategory::Other,
            Self::Other(_) => ErrorCategory::Other,
        }
    }

    /// Get a metric-safe error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "unavailable",
            Self::ReadTimeout(_) => "read_timeout",
            Self::QueryValidation(_) => "query_validation",
            Self::ConnectionClosed => "connection_closed",
            Self::OffsetCorrupt { .. } => "offset_corrupt",
            Self::InvalidPosition { .. } => "invalid_position",
            Self::SegmentDisposal { .. } => "segment_disposal",
            Self::SegmentNotCovered { .. } => "segment_not_covered",
            Self::Config(_) => "config_error",
            Self::InvalidState(_) => "invalid_state",
            Self::Io(_) => "io_error",
            Self::Json(_) => "json_error",
            Self::Other(_) => "unknown",
        }
    }
}

/// Result type for CDC operations
pub type Result<T> = std::result::Result<T, CdcError>;
