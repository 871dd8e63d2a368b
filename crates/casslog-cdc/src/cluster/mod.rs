//! Cluster read path
//!
//! - [`ClusterSession`] - capability trait the surrounding wiring implements
//!   over a live session
//! - [`RowReader`] - point reads with automatic consistency downgrade

mod read_client;
mod session;

pub use read_client::*;
pub use session::*;
