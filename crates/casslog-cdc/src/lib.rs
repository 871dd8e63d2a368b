//! # casslog-cdc - Commit-log CDC durability core
//!
//! The durability and consistency subsystem of a change-data-capture
//! producer for Cassandra-style commit logs. The upstream binary log reader
//! and the downstream message-bus publisher are collaborators; this crate
//! owns the pieces that make at-least-once delivery hold across crashes:
//!
//! - **Offset tracking** - how far the pipeline has durably progressed
//!   through the commit log ([`OffsetStore`], gated by an
//!   [`OffsetFlushPolicy`])
//! - **Segment lifecycle** - when a fully-drained segment file may be
//!   archived, quarantined or destroyed ([`CommitLogTransfer`])
//! - **Enrichment reads** - re-fetching a row's current state at the
//!   strongest available consistency level ([`RowReader`])
//!
//! ## Architecture
//!
//! ```text
//! commit log ──► reader (upstream) ──► Mutation { position, pk, ... }
//!                                          │
//!                    ┌─────────────────────┼──────────────────────┐
//!                    ▼                     ▼                      ▼
//!              RowReader            OffsetStore           DisposalQueue
//!         downgrade retry over   mark / policy-gated    happens-after the
//!         the consistency list   flush of the replay    flush covering the
//!         (ALL → LQ → LOCAL_ONE) position               segment's end
//!                    │                     │                      │
//!                    ▼                     ▼                      ▼
//!              ClusterSession      commitlog_offset.dat   CommitLogTransfer
//!              (collaborator)      (one line of text)     relocate/delete/
//!                                                         quarantine
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use casslog_cdc::{AlwaysFlush, CommitLogPosition, OffsetStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> casslog_cdc::Result<()> {
//! let store = OffsetStore::open("/var/lib/cassandra/cdc_raw", Arc::new(AlwaysFlush)).await?;
//!
//! // per observed mutation
//! store.maybe_flush_on_event(CommitLogPosition::new(42, 8192)).await;
//!
//! // resume point after a restart
//! let resume = store.position();
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod commitlog;
pub mod common;

// Core types
pub use common::{CdcError, ErrorCategory, Mutation, Result, SourceInfo};

// Commit-log durability
pub use commitlog::{
    AlwaysFlush, BlackHoleTransfer, CommitLogPosition, CommitLogTransfer, CountWindowedFlush,
    DisposalOutcome, DisposalQueue, DisposalRequest, OffsetFlushPolicy, OffsetStore,
    QuarantineTransfer, SharedCommitLogTransfer, SharedFlushPolicy, TimeWindowedFlush,
    WindowedFlush, OFFSET_FILE_NAME,
};

// Cluster read path
pub use cluster::{
    ClusterSession, ColumnKind, ColumnSchema, ConsistencyLevel, NodeInfo, Row, RowRead,
    RowReadRequest, RowReader, SelectStatement, SharedClusterSession, TableSchema,
};
