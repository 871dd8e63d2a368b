//! Commit-log durability
//!
//! Everything tied to one physical commit-log stream on disk:
//!
//! - [`CommitLogPosition`] - totally ordered stream coordinate
//! - [`OffsetFlushPolicy`] - pure flush decision ([`AlwaysFlush`],
//!   [`TimeWindowedFlush`], [`CountWindowedFlush`], [`WindowedFlush`])
//! - [`OffsetStore`] - durable, crash-recoverable replay position
//! - [`CommitLogTransfer`] - segment disposal ([`BlackHoleTransfer`],
//!   [`QuarantineTransfer`]) plus the off-path [`DisposalQueue`] worker

mod flush;
mod offset;
mod position;
mod transfer;

pub use flush::*;
pub use offset::*;
pub use position::*;
pub use transfer::*;
