//! Cluster session boundary
//!
//! The core never builds its own cluster session; it consumes one through
//! the [`ClusterSession`] capability: execute a parameterized point read at
//! a consistency level, look up node metadata, snapshot a table's schema.
//! Session bootstrapping, TLS and auth all live with the collaborator that
//! provides the implementation.

use crate::common::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// How many replicas must acknowledge a read before it succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyLevel {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalOne,
    LocalQuorum,
    EachQuorum,
    Serial,
    LocalSerial,
}

impl ConsistencyLevel {
    /// Default downgrade ladder for enrichment reads, strongest first.
    pub fn downgrade_defaults() -> Vec<Self> {
        vec![Self::All, Self::LocalQuorum, Self::LocalOne]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::One => "ONE",
            Self::Two => "TWO",
            Self::Three => "THREE",
            Self::Quorum => "QUORUM",
            Self::All => "ALL",
            Self::LocalOne => "LOCAL_ONE",
            Self::LocalQuorum => "LOCAL_QUORUM",
            Self::EachQuorum => "EACH_QUORUM",
            Self::Serial => "SERIAL",
            Self::LocalSerial => "LOCAL_SERIAL",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a column in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    PartitionKey,
    Clustering,
    Regular,
    Static,
}

/// One column of a table schema snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    /// CQL type name, e.g. `bigint`, `text`, `timeuuid`
    pub data_type: String,
    pub kind: ColumnKind,
}

/// Point-in-time schema snapshot of one table, attached to read results so
/// the emitter serializes rows against the schema the read was served with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub keyspace: String,
    pub table: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Partition-key and clustering columns, in declaration order.
    pub fn primary_key_columns(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns
            .iter()
            .filter(|c| matches!(c.kind, ColumnKind::PartitionKey | ColumnKind::Clustering))
    }
}

/// One result row, column name to value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Metadata of one cluster node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub host_id: Uuid,
    pub address: String,
    pub datacenter: String,
    pub is_up: bool,
}

/// A parameterized full-row point read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectStatement {
    pub keyspace: String,
    pub table: String,
    /// Primary-key column name to bound value
    pub primary_key: BTreeMap<String, Value>,
    /// Pinned coordinator, when the caller prefers a specific node
    pub coordinator: Option<Uuid>,
}

impl SelectStatement {
    /// Render the CQL text with one bind marker per primary-key column.
    pub fn cql(&self) -> String {
        let restrictions = self
            .primary_key
            .keys()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(" AND ");
        format!(
            "SELECT * FROM {}.{} WHERE {}",
            self.keyspace, self.table, restrictions
        )
    }

    /// Bound values in bind-marker order.
    pub fn bound_values(&self) -> Vec<&Value> {
        self.primary_key.values().collect()
    }
}

/// A live cluster session capable of executing asynchronous parameterized
/// statements and reporting node and schema metadata.
#[async_trait]
pub trait ClusterSession: Send + Sync {
    /// Execute `statement` at `consistency`, returning the matching rows.
    ///
    /// Implementations report insufficient live replicas as
    /// [`CdcError::Unavailable`](crate::common::CdcError::Unavailable);
    /// every other fault class must use a different variant, since
    /// unavailability is the only error the read client downgrades on.
    async fn execute(
        &self,
        statement: &SelectStatement,
        consistency: ConsistencyLevel,
    ) -> Result<Vec<Row>>;

    /// Node metadata by host id, if the node is known to the session.
    fn node(&self, host_id: Uuid) -> Option<NodeInfo>;

    /// Current schema snapshot for a table.
    fn table_schema(&self, keyspace: &str, table: &str) -> Result<TableSchema>;
}

/// Shared session handle.
pub type SharedClusterSession = Arc<dyn ClusterSession>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_consistency_level_display() {
        assert_eq!(ConsistencyLevel::LocalQuorum.to_string(), "LOCAL_QUORUM");
        assert_eq!(ConsistencyLevel::All.to_string(), "ALL");
    }

    #[test]
    fn test_downgrade_defaults_strongest_first() {
        let levels = ConsistencyLevel::downgrade_defaults();
        assert_eq!(
            levels,
            vec![
                ConsistencyLevel::All,
                ConsistencyLevel::LocalQuorum,
                ConsistencyLevel::LocalOne,
            ]
        );
    }

    #[test]
    fn test_select_statement_cql() {
        let statement = SelectStatement {
            keyspace: "ks1".into(),
            table: "table1".into(),
            primary_key: BTreeMap::from([
                ("id".to_string(), json!(1)),
                ("name".to_string(), json!("a")),
            ]),
            coordinator: None,
        };
        assert_eq!(
            statement.cql(),
            "SELECT * FROM ks1.table1 WHERE id = ? AND name = ?"
        );
        assert_eq!(statement.bound_values(), vec![&json!(1), &json!("a")]);
    }

    #[test]
    fn test_primary_key_columns() {
        let schema = TableSchema {
            keyspace: "ks1".into(),
            table: "table1".into(),
            columns: vec![
                ColumnSchema {
                    name: "id".into(),
                    data_type: "bigint".into(),
                    kind: ColumnKind::PartitionKey,
                },
                ColumnSchema {
                    name: "seq".into(),
                    data_type: "int".into(),
                    kind: ColumnKind::Clustering,
                },
                ColumnSchema {
                    name: "payload".into(),
                    data_type: "text".into(),
                    kind: ColumnKind::Regular,
                },
            ],
        };
        let pk: Vec<_> = schema.primary_key_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(pk, vec!["id", "seq"]);
    }
}
