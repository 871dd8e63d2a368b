//! Consistency-downgrade read integration tests
//!
//! Drives the read client against a scripted cluster session and checks the
//! downgrade protocol end to end:
//! - exhaustion tries each level exactly once, strongest first
//! - success at a weaker level stops the ladder and reports that level
//! - non-availability faults propagate without a downgraded attempt
//! - coordinator pinning falls back gracefully for unknown or down nodes

use async_trait::async_trait;
use casslog_cdc::{
    CdcError, ClusterSession, ColumnKind, ColumnSchema, ConsistencyLevel, NodeInfo, Result, Row,
    RowReadRequest, RowReader, SelectStatement, TableSchema,
};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// One recorded execution attempt: the level tried and the pinned node.
type Attempt = (ConsistencyLevel, Option<Uuid>);

struct ScriptedCluster {
    responses: Mutex<VecDeque<Result<Vec<Row>>>>,
    attempts: Mutex<Vec<Attempt>>,
    nodes: HashMap<Uuid, NodeInfo>,
}

impl ScriptedCluster {
    fn new(responses: Vec<Result<Vec<Row>>>) -> Arc<Self> {
        Self::with_nodes(responses, HashMap::new())
    }

    fn with_nodes(responses: Vec<Result<Vec<Row>>>, nodes: HashMap<Uuid, NodeInfo>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            attempts: Mutex::new(Vec::new()),
            nodes,
        })
    }

    fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    fn levels_tried(&self) -> Vec<ConsistencyLevel> {
        self.attempts().into_iter().map(|(cl, _)| cl).collect()
    }
}

#[async_trait]
impl ClusterSession for ScriptedCluster {
    async fn execute(
        &self,
        statement: &SelectStatement,
        consistency: ConsistencyLevel,
    ) -> Result<Vec<Row>> {
        self.attempts
            .lock()
            .unwrap()
            .push((consistency, statement.coordinator));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn node(&self, host_id: Uuid) -> Option<NodeInfo> {
        self.nodes.get(&host_id).cloned()
    }

    fn table_schema(&self, keyspace: &str, table: &str) -> Result<TableSchema> {
        Ok(TableSchema {
            keyspace: keyspace.into(),
            table: table.into(),
            columns: vec![
                ColumnSchema {
                    name: "id".into(),
                    data_type: "bigint".into(),
                    kind: ColumnKind::PartitionKey,
                },
                ColumnSchema {
                    name: "payload".into(),
                    data_type: "text".into(),
                    kind: ColumnKind::Regular,
                },
            ],
        })
    }
}

fn request() -> RowReadRequest {
    RowReadRequest::new(
        "ks1",
        "table1",
        BTreeMap::from([("id".to_string(), json!(42))]),
    )
}

fn unavailable(consistency: ConsistencyLevel) -> CdcError {
    CdcError::unavailable(consistency, 3, 1)
}

fn sample_row() -> Row {
    [
        ("id".to_string(), json!(42)),
        ("payload".to_string(), json!("current-state")),
    ]
    .into_iter()
    .collect()
}

#[tokio::test]
async fn test_exhaustion_tries_each_level_once_strongest_first() {
    let cluster = ScriptedCluster::new(vec![
        Err(unavailable(ConsistencyLevel::All)),
        Err(unavailable(ConsistencyLevel::LocalQuorum)),
        Err(unavailable(ConsistencyLevel::LocalOne)),
    ]);
    let reader = RowReader::new(cluster.clone());

    let err = reader.select_row(request()).await.unwrap_err();
    match err {
        CdcError::Unavailable { consistency, .. } => {
            assert_eq!(consistency, ConsistencyLevel::LocalOne, "last level tried");
        }
        other => panic!("expected Unavailable, got {other}"),
    }
    assert_eq!(
        cluster.levels_tried(),
        vec![
            ConsistencyLevel::All,
            ConsistencyLevel::LocalQuorum,
            ConsistencyLevel::LocalOne,
        ]
    );
}

#[tokio::test]
async fn test_success_at_weaker_level_reports_that_level() {
    let cluster = ScriptedCluster::new(vec![
        Err(unavailable(ConsistencyLevel::All)),
        Ok(vec![sample_row()]),
    ]);
    let reader = RowReader::new(cluster.clone());

    let read = reader.select_row(request()).await.unwrap();
    assert_eq!(read.consistency_used, ConsistencyLevel::LocalQuorum);
    assert_eq!(
        read.row.unwrap().get("payload"),
        Some(&json!("current-state"))
    );
    assert_eq!(cluster.attempts().len(), 2);
}

#[tokio::test]
async fn test_timeout_propagates_without_downgrade() {
    let cluster = ScriptedCluster::new(vec![Err(CdcError::read_timeout("2s"))]);
    let reader = RowReader::new(cluster.clone());

    let err = reader.select_row(request()).await.unwrap_err();
    assert!(matches!(err, CdcError::ReadTimeout(_)));
    assert_eq!(cluster.levels_tried(), vec![ConsistencyLevel::All]);
}

#[tokio::test]
async fn test_connection_loss_propagates_without_downgrade() {
    let cluster = ScriptedCluster::new(vec![Err(CdcError::ConnectionClosed)]);
    let reader = RowReader::new(cluster.clone());

    let err = reader.select_row(request()).await.unwrap_err();
    assert!(matches!(err, CdcError::ConnectionClosed));
    assert_eq!(cluster.attempts().len(), 1);
}

#[tokio::test]
async fn test_validation_error_propagates_without_downgrade() {
    let cluster = ScriptedCluster::new(vec![Err(CdcError::query_validation("unknown table"))]);
    let reader = RowReader::new(cluster.clone());

    let err = reader.select_row(request()).await.unwrap_err();
    assert!(matches!(err, CdcError::QueryValidation(_)));
    assert_eq!(cluster.attempts().len(), 1);
}

#[tokio::test]
async fn test_custom_level_ladder_is_honored() {
    let cluster = ScriptedCluster::new(vec![
        Err(unavailable(ConsistencyLevel::Quorum)),
        Err(unavailable(ConsistencyLevel::One)),
    ]);
    let reader = RowReader::new(cluster.clone());

    let err = reader
        .select_row(request().with_consistency_levels(vec![
            ConsistencyLevel::Quorum,
            ConsistencyLevel::One,
        ]))
        .await
        .unwrap_err();
    assert!(err.is_unavailable());
    assert_eq!(
        cluster.levels_tried(),
        vec![ConsistencyLevel::Quorum, ConsistencyLevel::One]
    );
}

#[tokio::test]
async fn test_preferred_coordinator_pinned_when_up() {
    let host_id = Uuid::new_v4();
    let nodes = HashMap::from([(
        host_id,
        NodeInfo {
            host_id,
            address: "10.0.0.7:9042".into(),
            datacenter: "dc1".into(),
            is_up: true,
        },
    )]);
    let cluster = ScriptedCluster::with_nodes(vec![Ok(vec![sample_row()])], nodes);
    let reader = RowReader::new(cluster.clone());

    reader
        .select_row(request().with_preferred_node(host_id))
        .await
        .unwrap();
    assert_eq!(cluster.attempts(), vec![(ConsistencyLevel::All, Some(host_id))]);
}

#[tokio::test]
async fn test_unknown_coordinator_falls_back_to_default_routing() {
    let cluster = ScriptedCluster::new(vec![Ok(vec![sample_row()])]);
    let reader = RowReader::new(cluster.clone());

    let read = reader
        .select_row(request().with_preferred_node(Uuid::new_v4()))
        .await
        .unwrap();
    assert!(read.row.is_some());
    assert_eq!(cluster.attempts(), vec![(ConsistencyLevel::All, None)]);
}

#[tokio::test]
async fn test_down_coordinator_falls_back_to_default_routing() {
    let host_id = Uuid::new_v4();
    let nodes = HashMap::from([(
        host_id,
        NodeInfo {
            host_id,
            address: "10.0.0.8:9042".into(),
            datacenter: "dc1".into(),
            is_up: false,
        },
    )]);
    let cluster = ScriptedCluster::with_nodes(vec![Ok(vec![sample_row()])], nodes);
    let reader = RowReader::new(cluster.clone());

    reader
        .select_row(request().with_preferred_node(host_id))
        .await
        .unwrap();
    assert_eq!(cluster.attempts(), vec![(ConsistencyLevel::All, None)]);
}
