//! Mutation event representation
//!
//! One [`Mutation`] per captured commit-log record. The binary reader that
//! decodes raw commit-log segments lives upstream; this crate only consumes
//! its output, so the contract here is deliberately small: every mutation
//! carries the [`CommitLogPosition`] it was read from, enough addressing to
//! re-fetch the row (keyspace, table, primary key), and the origin node so
//! enrichment reads can prefer the replica that produced the mutation.

use crate::commitlog::CommitLogPosition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Provenance of a captured mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Location in the commit-log stream this mutation was read from
    pub position: CommitLogPosition,
    /// Host id of the node that wrote the mutation, when known
    pub node_id: Option<Uuid>,
    /// Write timestamp in microseconds since the Unix epoch
    pub commit_ts_micros: i64,
    /// Keyspace the mutated table belongs to
    pub keyspace: String,
    /// Mutated table name
    pub table: String,
}

impl SourceInfo {
    pub fn new(
        position: CommitLogPosition,
        commit_ts_micros: i64,
        keyspace: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            position,
            node_id: None,
            commit_ts_micros,
            keyspace: keyspace.into(),
            table: table.into(),
        }
    }

    /// Set the origin node id.
    pub fn with_node_id(mut self, node_id: Uuid) -> Self {
        self.node_id = Some(node_id);
        self
    }
}

/// One captured change event derived from the commit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    /// Where and when this mutation originated
    pub source: SourceInfo,
    /// Primary-key column values identifying the mutated row
    pub primary_key: BTreeMap<String, Value>,
    /// Hex digest of the raw mutation, used for downstream deduplication
    pub digest: Option<String>,
}

impl Mutation {
    pub fn new(source: SourceInfo, primary_key: BTreeMap<String, Value>) -> Self {
        Self {
            source,
            primary_key,
            digest: None,
        }
    }

    /// Attach the raw-mutation digest.
    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }

    /// Position this mutation was read from.
    pub fn position(&self) -> CommitLogPosition {
        self.source.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Mutation {
        let source = SourceInfo::new(
            CommitLogPosition::new(12, 4096),
            1_700_000_000_000_000,
            "ks1",
            "table1",
        );
        let mut pk = BTreeMap::new();
        pk.insert("id".to_string(), json!(42));
        Mutation::new(source, pk)
    }

    #[test]
    fn test_mutation_carries_position() {
        let m = sample();
        assert_eq!(m.position(), CommitLogPosition::new(12, 4096));
    }

    #[test]
    fn test_mutation_digest_and_node() {
        let node = Uuid::new_v4();
        let mut m = sample().with_digest("d41d8cd98f00b204e9800998ecf8427e");
        m.source = m.source.clone().with_node_id(node);

        assert_eq!(m.source.node_id, Some(node));
        assert!(m.digest.as_deref().unwrap().starts_with("d41d"));
    }

    #[test]
    fn test_mutation_serde_round_trip() {
        let m = sample();
        let encoded = serde_json::to_string(&m).unwrap();
        let decoded: Mutation = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, m);
    }
}
