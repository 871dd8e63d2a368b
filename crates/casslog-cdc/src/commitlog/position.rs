//! Commit-log position
//!
//! A [`CommitLogPosition`] names one location in a commit-log stream:
//! the segment id plus the byte offset inside that segment. Positions are
//! totally ordered (segment first, then offset) and serialize to a single
//! line of text, which is the entire on-disk format of the offset file.
//!
//! The text form uses a fixed `:` delimiter. Borrowing a platform-dependent
//! separator here would make offset files non-portable across hosts.

use crate::common::{CdcError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Field delimiter of the serialized text form.
const FIELD_DELIMITER: char = ':';

/// An immutable coordinate in one commit-log stream.
///
/// Ordering is lexicographic over `(segment_id, offset)`, so a position in a
/// later segment always compares greater than any position in an earlier one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct CommitLogPosition {
    /// Identifier of the segment file
    pub segment_id: i64,
    /// Byte offset within the segment
    pub offset: i32,
}

impl CommitLogPosition {
    /// The position a fresh stream starts from.
    pub const START: Self = Self {
        segment_id: 0,
        offset: 0,
    };

    pub fn new(segment_id: i64, offset: i32) -> Self {
        debug_assert!(segment_id >= 0 && offset >= 0);
        Self { segment_id, offset }
    }

    /// Serialize to the single-line text form `<segment_id>:<offset>`.
    pub fn serialize(&self) -> String {
        format!("{}{}{}", self.segment_id, FIELD_DELIMITER, self.offset)
    }

    /// Parse the text form produced by [`serialize`](Self::serialize).
    ///
    /// Rejects negative fields: they cannot be produced by a healthy writer,
    /// so their presence means the file is corrupt.
    pub fn deserialize(input: &str) -> Result<Self> {
        let invalid = |reason: &str| CdcError::InvalidPosition {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (segment, offset) = input
            .trim()
            .split_once(FIELD_DELIMITER)
            .ok_or_else(|| invalid("missing delimiter"))?;
        let segment_id: i64 = segment
            .parse()
            .map_err(|_| invalid("segment id is not an integer"))?;
        let offset: i32 = offset
            .parse()
            .map_err(|_| invalid("offset is not an integer"))?;
        if segment_id < 0 || offset < 0 {
            return Err(invalid("negative field"));
        }
        Ok(Self { segment_id, offset })
    }

    /// True when this position lies at or beyond the end of `segment_id`,
    /// i.e. a durably flushed position in a later segment proves every
    /// mutation of `segment_id` has been accounted for.
    pub fn covers_end_of(&self, segment_id: i64) -> bool {
        self.segment_id > segment_id
    }
}

impl fmt::Display for CommitLogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.segment_id, FIELD_DELIMITER, self.offset)
    }
}
