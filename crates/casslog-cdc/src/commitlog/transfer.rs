//! Commit-log segment lifecycle
//!
//! Once the reader has fully drained a segment file and the offset store has
//! durably flushed a position beyond its end, the file must be disposed of:
//! relocated to an archive directory on success, deleted or quarantined on
//! permanent failure. [`CommitLogTransfer`] is the capability trait for that
//! decision; the pipeline depends only on the trait.
//!
//! Disposal is filesystem-only (no network calls) and its failures are
//! propagated, never swallowed: losing track of a segment's fate is itself a
//! durability risk. [`DisposalQueue`] runs disposals on a dedicated worker so
//! a slow filesystem cannot stall log tailing, and refuses to archive a
//! segment the offset store has not yet covered.

use crate::commitlog::offset::OffsetStore;
use crate::common::{CdcError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Decides the fate of a drained commit-log segment file.
#[async_trait]
pub trait CommitLogTransfer: Send + Sync {
    /// Dispose of a segment whose mutations are all durably accounted for.
    async fn on_success_transfer(&self, segment: &Path) -> Result<()>;

    /// Dispose of a segment whose draining or enrichment permanently failed.
    async fn on_error_transfer(&self, segment: &Path) -> Result<()>;

    /// Enumerate segments previously quarantined by error handling, so a
    /// restart can re-attempt or report them.
    async fn error_commit_log_files(&self) -> Result<Vec<PathBuf>>;
}

/// Shared segment lifecycle handle.
pub type SharedCommitLogTransfer = Arc<dyn CommitLogTransfer>;

/// Reference lifecycle: relocate drained segments, delete failed ones.
///
/// Relocation preserves the filename in the archive directory, keeping an
/// audit trail while freeing the active log directory. Deleting on error is
/// an explicit data-loss decision, appropriate only when downstream
/// correctness does not depend on replaying that segment; prefer
/// [`QuarantineTransfer`] otherwise.
pub struct BlackHoleTransfer {
    relocation_dir: PathBuf,
}

impl BlackHoleTransfer {
    pub async fn new(relocation_dir: impl AsRef<Path>) -> Result<Self> {
        let relocation_dir = relocation_dir.as_ref().to_path_buf();
        fs::create_dir_all(&relocation_dir).await?;
        Ok(Self { relocation_dir })
    }
}

#[async_trait]
impl CommitLogTransfer for BlackHoleTransfer {
    async fn on_success_transfer(&self, segment: &Path) -> Result<()> {
        let target = move_segment(segment, &self.relocation_dir).await?;
        info!(from = %segment.display(), to = %target.display(), "relocated commit-log segment");
        Ok(())
    }

    async fn on_error_transfer(&self, segment: &Path) -> Result<()> {
        fs::remove_file(segment)
            .await
            .map_err(|e| CdcError::SegmentDisposal {
                path: segment.to_path_buf(),
                source: e,
            })?;
        warn!(segment = %segment.display(), "deleted failed commit-log segment");
        Ok(())
    }

    async fn error_commit_log_files(&self) -> Result<Vec<PathBuf>> {
        // Failed segments are deleted outright, nothing to enumerate.
        Ok(Vec::new())
    }
}

/// Stricter lifecycle: relocate drained segments, quarantine failed ones for
/// operator inspection.
///
/// The quarantine directory doubles as the durable index backing
/// [`error_commit_log_files`](CommitLogTransfer::error_commit_log_files):
/// enumeration is a directory scan, so it survives restarts without a
/// sidecar file.
pub struct QuarantineTransfer {
    relocation_dir: PathBuf,
    quarantine_dir: PathBuf,
}

impl QuarantineTransfer {
    pub async fn new(
        relocation_dir: impl AsRef<Path>,
        quarantine_dir: impl AsRef<Path>,
    ) -> Result<Self> {
        let relocation_dir = relocation_dir.as_ref().to_path_buf();
        let quarantine_dir = quarantine_dir.as_ref().to_path_buf();
        fs::create_dir_all(&relocation_dir).await?;
        fs::create_dir_all(&quarantine_dir).await?;
        Ok(Self {
            relocation_dir,
            quarantine_dir,
        })
    }
}

#[async_trait]
impl CommitLogTransfer for QuarantineTransfer {
    async fn on_success_transfer(&self, segment: &Path) -> Result<()> {
        let target = move_segment(segment, &self.relocation_dir).await?;
        info!(from = %segment.display(), to = %target.display(), "relocated commit-log segment");
        Ok(())
    }

    async fn on_error_transfer(&self, segment: &Path) -> Result<()> {
        let target = move_segment(segment, &self.quarantine_dir).await?;
        warn!(from = %segment.display(), to = %target.display(), "quarantined failed commit-log segment");
        Ok(())
    }

    async fn error_commit_log_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&self.quarantine_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Move a segment into `dest_dir`, preserving its filename.
///
/// Falls back to copy-then-remove when rename fails, so archive and
/// quarantine directories may live on a different filesystem.
async fn move_segment(segment: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let disposal_err = |e: std::io::Error| CdcError::SegmentDisposal {
        path: segment.to_path_buf(),
        source: e,
    };

    let file_name = segment.file_name().ok_or_else(|| {
        CdcError::config(format!("segment path has no filename: {}", segment.display()))
    })?;
    let target = dest_dir.join(file_name);

    if fs::rename(segment, &target).await.is_err() {
        fs::copy(segment, &target).await.map_err(disposal_err)?;
        fs::remove_file(segment).await.map_err(disposal_err)?;
    }
    Ok(target)
}

/// How a drained segment should be disposed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposalOutcome {
    /// Fully drained and durably accounted for
    Drained,
    /// Draining or enrichment permanently failed
    Failed,
}

/// A pending disposal request.
#[derive(Debug, Clone)]
pub struct DisposalRequest {
    pub segment_id: i64,
    pub path: PathBuf,
    pub outcome: DisposalOutcome,
}

/// Dedicated disposal worker.
///
/// Segment disposal performs blocking filesystem work, so it runs off the
/// mutation-processing path. For `Drained` segments the worker checks the
/// happens-after requirement explicitly: the offset store must have flushed
/// a position beyond the segment's end before the file may leave the active
/// directory. Requests that fail the check, and disposals the transfer
/// reports as failed, are retained in [`failed_segments`] - a segment is
/// never silently dropped from tracking.
///
/// [`failed_segments`]: DisposalQueue::failed_segments
pub struct DisposalQueue {
    tx: mpsc::Sender<DisposalRequest>,
    failed: Arc<Mutex<Vec<PathBuf>>>,
    worker: JoinHandle<()>,
}

impl DisposalQueue {
    /// Spawn the disposal worker.
    pub fn spawn(
        store: Arc<OffsetStore>,
        transfer: SharedCommitLogTransfer,
        capacity: usize,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<DisposalRequest>(capacity);
        let failed: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));

        let worker_failed = Arc::clone(&failed);
        let worker = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let result = dispose(&store, transfer.as_ref(), &request).await;
                if let Err(e) = result {
                    warn!(
                        segment = %request.path.display(),
                        error = %e,
                        "segment disposal failed, retaining for retry"
                    );
                    worker_failed
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .push(request.path);
                }
            }
            debug!("disposal worker stopped");
        });

        Self { tx, failed, worker }
    }

    /// Enqueue a disposal request.
    pub async fn submit(&self, request: DisposalRequest) -> Result<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| CdcError::invalid_state("disposal worker stopped"))
    }

    /// Segments whose disposal failed and remains pending.
    pub fn failed_segments(&self) -> Vec<PathBuf> {
        self.failed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Drain outstanding requests and stop the worker.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "disposal worker join failed");
        }
    }
}

async fn dispose(
    store: &OffsetStore,
    transfer: &dyn CommitLogTransfer,
    request: &DisposalRequest,
) -> Result<()> {
    match request.outcome {
        DisposalOutcome::Drained => {
            if !store.covers_segment(request.segment_id).await {
                return Err(CdcError::SegmentNotCovered {
                    segment_id: request.segment_id,
                    flushed: store.flushed_position().await,
                });
            }
            transfer.on_success_transfer(&request.path).await
        }
        DisposalOutcome::Failed => transfer.on_error_transfer(&request.path).await,
    }
}
