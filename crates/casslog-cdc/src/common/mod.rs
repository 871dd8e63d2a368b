//! Shared CDC types
//!
//! Database-agnostic pieces used across the crate:
//!
//! - [`CdcError`] / [`Result`] - crate-wide error taxonomy
//! - [`Mutation`] / [`SourceInfo`] - the upstream commit-log reader contract

mod error;
mod event;

pub use error::*;
pub use event::*;
