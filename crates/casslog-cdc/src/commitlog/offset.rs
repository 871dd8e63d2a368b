//! Durable offset tracking
//!
//! The [`OffsetStore`] is the single source of truth for how far the pipeline
//! has durably progressed through one commit-log stream. It keeps exactly one
//! record - the last safely processed [`CommitLogPosition`] - in a text file
//! inside the stream's working directory.
//!
//! ## Durability contract
//!
//! - Writes go through a temp file followed by an atomic rename, so a reader
//!   (including a restarted process) observes either the old or the new
//!   position, never a torn one.
//! - On startup the file is authoritative: a present-but-unparsable file is
//!   fatal, because guessing a replay point risks silent data loss or
//!   duplication. A missing file initializes the stream at
//!   [`CommitLogPosition::START`] and persists it immediately.
//! - `mark_offset` updates memory only; the in-memory position is always at
//!   or ahead of the last flushed one.
//! - The opportunistic per-event flush swallows I/O failures (the next event
//!   retries); the explicit [`flush`](OffsetStore::flush) and
//!   [`close`](OffsetStore::close) propagate them, because direct callers
//!   expect a durability guarantee.

use crate::commitlog::flush::{FlushTracker, SharedFlushPolicy};
use crate::commitlog::position::CommitLogPosition;
use crate::common::{CdcError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Well-known offset file name inside a stream's working directory.
pub const OFFSET_FILE_NAME: &str = "commitlog_offset.dat";

/// State serialized under the writer lock.
struct FlushState {
    /// Last position known to be durably on disk
    flushed: CommitLogPosition,
    /// Inputs for the flush policy
    tracker: FlushTracker,
    closed: bool,
}

/// Durable, crash-recoverable store of one stream's replay position.
///
/// One instance per physical commit-log stream. Safe to share across the
/// mutation-processing workers of that stream: reads of the in-memory
/// position never touch the filesystem, and all persistence goes through a
/// single writer lock held only for the in-memory update plus the file
/// write, never across a network call.
pub struct OffsetStore {
    path: PathBuf,
    policy: SharedFlushPolicy,
    fsync: bool,
    /// Latest in-memory position; may be ahead of `FlushState::flushed`
    current: RwLock<CommitLogPosition>,
    flush_state: Mutex<FlushState>,
}

impl OffsetStore {
    /// Open the store for a stream working directory, recovering the last
    /// flushed position if an offset file exists.
    pub async fn open(stream_dir: impl AsRef<Path>, policy: SharedFlushPolicy) -> Result<Self> {
        Self::with_options(stream_dir, policy, true).await
    }

    /// Open with explicit fsync behavior. Disabling fsync trades a wider
    /// replay window on power loss for fewer disk syncs.
    pub async fn with_options(
        stream_dir: impl AsRef<Path>,
        policy: SharedFlushPolicy,
        fsync: bool,
    ) -> Result<Self> {
        let stream_dir = stream_dir.as_ref();
        let path = stream_dir.join(OFFSET_FILE_NAME);

        let initial = match fs::read_to_string(&path).await {
            Ok(text) => {
                let position =
                    CommitLogPosition::deserialize(&text).map_err(|e| CdcError::OffsetCorrupt {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                info!(position = %position, file = %path.display(), "recovered commit-log offset");
                position
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(stream_dir).await?;
                persist(&path, CommitLogPosition::START, fsync).await?;
                info!(file = %path.display(), "initialized commit-log offset");
                CommitLogPosition::START
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            policy,
            fsync,
            current: RwLock::new(initial),
            flush_state: Mutex::new(FlushState {
                flushed: initial,
                tracker: FlushTracker::new(),
                closed: false,
            }),
        })
    }

    /// Latest in-memory position. Never blocks on I/O.
    pub fn position(&self) -> CommitLogPosition {
        // A poisoned lock cannot hold a torn Copy value; recover it.
        *self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the in-memory position. Memory only; durable once a flush
    /// completes.
    ///
    /// Callers own ordering. A backward mark is accepted but logged, since
    /// it widens the replay window at best and skips mutations at worst.
    pub fn mark_offset(&self, position: CommitLogPosition) {
        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = *current;
        if position < previous {
            warn!(
                from = %previous,
                to = %position,
                "commit-log offset marked backward"
            );
        }
        *current = position;
    }

    /// Synchronously persist the current in-memory position.
    ///
    /// Propagates I/O failures: a caller invoking this directly expects a
    /// durability guarantee and must know if it was not met.
    pub async fn flush(&self) -> Result<()> {
        let mut state = self.flush_state.lock().await;
        if state.closed {
            return Err(CdcError::invalid_state("offset store is closed"));
        }
        self.flush_locked(&mut state).await
    }

    /// Called once per observed mutation: consult the flush policy and, on a
    /// "flush now" decision, mark `position` and persist it.
    ///
    /// Persistence failures here are logged and swallowed - failing mutation
    /// processing over a transient disk hiccup would be worse than a slightly
    /// larger replay window, and the next event retries.
    pub async fn maybe_flush_on_event(&self, position: CommitLogPosition) {
        let mut state = self.flush_state.lock().await;
        if state.closed {
            debug!("ignoring event on closed offset store");
            return;
        }
        state.tracker.record_event();
        if !self
            .policy
            .should_flush(state.tracker.elapsed(), state.tracker.uncommitted())
        {
            return;
        }

        self.mark_offset(position);
        if let Err(e) = self.flush_locked(&mut state).await {
            warn!(position = %position, error = %e, "opportunistic offset flush failed");
        }
    }

    /// Last position known to be durably on disk.
    pub async fn flushed_position(&self) -> CommitLogPosition {
        self.flush_state.lock().await.flushed
    }

    /// True when the flushed position lies beyond the end of `segment_id`,
    /// i.e. the segment file may be disposed of without risking loss.
    pub async fn covers_segment(&self, segment_id: i64) -> bool {
        self.flushed_position().await.covers_end_of(segment_id)
    }

    /// Final flush and shutdown. The store must not be reused afterwards.
    pub async fn close(&self) -> Result<()> {
        let mut state = self.flush_state.lock().await;
        if state.closed {
            return Ok(());
        }
        let result = self.flush_locked(&mut state).await;
        state.closed = true;
        info!(position = %state.flushed, "offset store closed");
        result
    }

    /// Persist the current position while holding the writer lock.
    async fn flush_locked(&self, state: &mut FlushState) -> Result<()> {
        let snapshot = self.position();
        persist(&self.path, snapshot, self.fsync).await?;
        state.flushed = snapshot;
        state.tracker.reset();
        debug!(position = %snapshot, "offset flushed");
        Ok(())
    }
}

/// Write `position` to `path` atomically: temp file, optional fsync, rename.
async fn persist(path: &Path, position: CommitLogPosition, fsync: bool) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .await?;
    file.write_all(position.serialize().as_bytes()).await?;
    if fsync {
        file.sync_all().await?;
    }
    drop(file);

    fs::rename(&temp_path, path).await?;
    Ok(())
}
