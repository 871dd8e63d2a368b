//! Consistency-downgrade read client
//!
//! Re-fetches a row's current state to enrich a captured mutation before
//! emission. The read starts at the strongest consistency level the caller
//! accepts and transparently retries at progressively weaker levels when the
//! cluster reports insufficient live replicas, returning the level that
//! actually succeeded so callers can judge freshness.
//!
//! Downgrading is a response to unavailability only. Timeouts, validation
//! errors and connection loss propagate immediately: blind retry-on-anything
//! would mask bugs and add load to an already-unhealthy cluster.
//!
//! Attempts for one read are strictly sequential, and the loop never spawns:
//! dropping the returned future cancels the whole chain without leaving a
//! downgraded attempt running in the background.

use crate::cluster::session::{
    ConsistencyLevel, Row, SelectStatement, SharedClusterSession, TableSchema,
};
use crate::common::{CdcError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// A point-read request for one row by primary key.
#[derive(Debug, Clone)]
pub struct RowReadRequest {
    pub keyspace: String,
    pub table: String,
    pub primary_key: BTreeMap<String, Value>,
    /// Preferred coordinator, typically the node that originated the
    /// mutation being enriched
    pub preferred_node: Option<Uuid>,
    /// Acceptable consistency levels, strongest first. Must be non-empty.
    pub consistency_levels: Vec<ConsistencyLevel>,
}

impl RowReadRequest {
    pub fn new(
        keyspace: impl Into<String>,
        table: impl Into<String>,
        primary_key: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
            primary_key,
            preferred_node: None,
            consistency_levels: ConsistencyLevel::downgrade_defaults(),
        }
    }

    /// Prefer routing through the given coordinator node.
    pub fn with_preferred_node(mut self, host_id: Uuid) -> Self {
        self.preferred_node = Some(host_id);
        self
    }

    /// Replace the downgrade ladder, strongest first.
    pub fn with_consistency_levels(mut self, levels: Vec<ConsistencyLevel>) -> Self {
        self.consistency_levels = levels;
        self
    }
}

/// Result of a downgrading point read.
#[derive(Debug, Clone)]
pub struct RowRead {
    /// The row's current state, or absent when it no longer exists
    pub row: Option<Row>,
    /// The consistency level the read actually succeeded at
    pub consistency_used: ConsistencyLevel,
    /// Schema snapshot taken with the read
    pub schema: TableSchema,
}

/// Executes point reads with automatic consistency downgrade.
///
/// Holds no mutable state; each invocation works on its own copy of the
/// request's level list, so concurrent reads never interfere.
pub struct RowReader {
    session: SharedClusterSession,
}

impl RowReader {
    pub fn new(session: SharedClusterSession) -> Self {
        Self { session }
    }

    /// Read one row, trying each requested consistency level in order.
    ///
    /// Each unavailability failure consumes one level; the last failure is
    /// propagated once no weaker level remains, carrying the level it was
    /// observed at. An unknown or down preferred coordinator falls back to
    /// normal routing rather than failing the read.
    pub async fn select_row(&self, request: RowReadRequest) -> Result<RowRead> {
        if request.consistency_levels.is_empty() {
            return Err(CdcError::config("consistency level list must be non-empty"));
        }

        let schema = self
            .session
            .table_schema(&request.keyspace, &request.table)?;

        let coordinator = request.preferred_node.and_then(|host_id| {
            match self.session.node(host_id) {
                Some(node) if node.is_up => Some(host_id),
                _ => {
                    debug!(%host_id, "preferred coordinator unknown or down, using default routing");
                    None
                }
            }
        });
        let statement = SelectStatement {
            keyspace: request.keyspace,
            table: request.table,
            primary_key: request.primary_key,
            coordinator,
        };

        let levels = request.consistency_levels;
        let mut attempt = 0;
        loop {
            let consistency = levels[attempt];
            debug!(%consistency, attempt, cql = %statement.cql(), "executing enrichment read");
            match self.session.execute(&statement, consistency).await {
                Ok(rows) => {
                    debug!(%consistency, "enrichment read succeeded");
                    return Ok(RowRead {
                        row: rows.into_iter().next(),
                        consistency_used: consistency,
                        schema,
                    });
                }
                Err(e) if e.is_unavailable() && attempt + 1 < levels.len() => {
                    warn!(
                        %consistency,
                        next = %levels[attempt + 1],
                        error = %e,
                        "replicas unavailable, downgrading read consistency"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::session::{ClusterSession, ColumnKind, ColumnSchema, NodeInfo};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct ScriptedSession {
        responses: Mutex<VecDeque<Result<Vec<Row>>>>,
        attempts: Mutex<Vec<ConsistencyLevel>>,
    }

    impl ScriptedSession {
        fn new(responses: Vec<Result<Vec<Row>>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                attempts: Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> Vec<ConsistencyLevel> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ClusterSession for ScriptedSession {
        async fn execute(
            &self,
            _statement: &SelectStatement,
            consistency: ConsistencyLevel,
        ) -> Result<Vec<Row>> {
            self.attempts.lock().unwrap().push(consistency);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        fn node(&self, _host_id: Uuid) -> Option<NodeInfo> {
            None
        }

        fn table_schema(&self, keyspace: &str, table: &str) -> Result<TableSchema> {
            Ok(TableSchema {
                keyspace: keyspace.into(),
                table: table.into(),
                columns: vec![ColumnSchema {
                    name: "id".into(),
                    data_type: "bigint".into(),
                    kind: ColumnKind::PartitionKey,
                }],
            })
        }
    }

    fn request() -> RowReadRequest {
        RowReadRequest::new("ks1", "table1", BTreeMap::from([("id".to_string(), json!(1))]))
    }

    fn unavailable(consistency: ConsistencyLevel) -> CdcError {
        CdcError::unavailable(consistency, 3, 1)
    }

    #[tokio::test]
    async fn test_success_on_first_level_is_single_attempt() {
        let row: Row = [("id".to_string(), json!(1))].into_iter().collect();
        let session = ScriptedSession::new(vec![Ok(vec![row])]);
        let reader = RowReader::new(session.clone());

        let read = reader.select_row(request()).await.unwrap();
        assert_eq!(read.consistency_used, ConsistencyLevel::All);
        assert!(read.row.is_some());
        assert_eq!(session.attempts(), vec![ConsistencyLevel::All]);
    }

    #[tokio::test]
    async fn test_downgrades_only_on_unavailable() {
        let session = ScriptedSession::new(vec![
            Err(unavailable(ConsistencyLevel::All)),
            Err(CdcError::read_timeout("2s")),
        ]);
        let reader = RowReader::new(session.clone());

        let err = reader.select_row(request()).await.unwrap_err();
        assert!(matches!(err, CdcError::ReadTimeout(_)));
        assert_eq!(
            session.attempts(),
            vec![ConsistencyLevel::All, ConsistencyLevel::LocalQuorum]
        );
    }

    #[tokio::test]
    async fn test_empty_level_list_rejected() {
        let session = ScriptedSession::new(vec![]);
        let reader = RowReader::new(session.clone());

        let err = reader
            .select_row(request().with_consistency_levels(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, CdcError::Config(_)));
        assert!(session.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_absent_row_reported_as_none() {
        let session = ScriptedSession::new(vec![Ok(Vec::new())]);
        let reader = RowReader::new(session);

        let read = reader.select_row(request()).await.unwrap();
        assert!(read.row.is_none());
        assert_eq!(read.schema.table, "table1");
    }
}
