use super::{MetaStore, Table, cluster, not_present, require_active};
use crate::error::{ClusteredError, Result};
use crate::model::{
    ActiveFlag, ClusterRecord, ClusterRef, EntityKind, Listing, NodeRecord, NodeSpec, NodeType,
    ResourceState, normalize_name,
};
use rusqlite::{OptionalExtension, Row, Transaction, params};

pub(crate) const TABLE: Table = Table {
    kind: EntityKind::Node,
    table: "NODE",
    id: "NODE_ID",
    name: "NODE_NAME",
    flag: "NODE_ACTIVE_FLAG",
    scope: Some("NODE_CLUSTER_ID"),
    child: None,
};

const SELECT: &str = "
SELECT n.NODE_ID, n.NODE_NAME, c.CLUSTER_NAME, r.REPO_NAME, n.NODE_TYPE, n.NODE_DESC,
       n.NODE_INSTANCE_TYPE, n.NODE_INSTANCE_ID, n.NODE_KEY_PAIR_NAME,
       n.NODE_BLOCK_DEVICE_MAPPING, n.NODE_STATE, n.NODE_ACTIVE_FLAG
  FROM NODE n
  JOIN CLUSTER c ON c.CLUSTER_ID = n.NODE_CLUSTER_ID
  JOIN REPOSITORY r ON r.REPO_ID = c.CLUSTER_REPO_ID";

fn record(row: &Row<'_>) -> rusqlite::Result<NodeRecord> {
    let mapping: Option<String> = row.get(9)?;
    Ok(NodeRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        cluster: row.get(2)?,
        repository: row.get(3)?,
        node_type: row.get(4)?,
        description: row.get(5)?,
        instance_type: row.get(6)?,
        instance_id: row.get(7)?,
        key_pair_name: row.get(8)?,
        block_device_mapping: mapping.map(|raw| {
            serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw))
        }),
        state: row.get(10)?,
        active: row.get(11)?,
    })
}

fn find(tx: &Transaction<'_>, cluster_id: i64, name: &str) -> Result<Option<NodeRecord>> {
    let sql = format!("{} WHERE n.NODE_CLUSTER_ID = ?1 AND n.NODE_NAME = ?2", SELECT);
    Ok(tx
        .query_row(&sql, params![cluster_id, name], record)
        .optional()?)
}

fn count_active(tx: &Transaction<'_>, cluster_id: i64, node_type: NodeType) -> Result<i64> {
    let count = tx.query_row(
        "SELECT COUNT(*) FROM NODE
          WHERE NODE_CLUSTER_ID = ?1 AND NODE_TYPE = ?2 AND NODE_ACTIVE_FLAG = 'Y'",
        params![cluster_id, node_type],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Nodes join a cluster (by add or recover) only while it is AVAILABLE
fn require_available(cluster: &ClusterRecord) -> Result<()> {
    if cluster.state != ResourceState::Available {
        return Err(ClusteredError::ClusterStateConflict {
            cluster: cluster.name.clone(),
            state: cluster.state.to_string(),
        });
    }
    Ok(())
}

/// A new active node of `node_type` must keep one master and masters before slaves
fn check_cardinality(tx: &Transaction<'_>, cluster: &ClusterRecord, node_type: NodeType) -> Result<()> {
    let masters = count_active(tx, cluster.id, NodeType::Master)?;
    match node_type {
        NodeType::Master if masters > 0 => Err(ClusteredError::MasterNodeAlreadyExists {
            cluster: cluster.name.clone(),
        }),
        NodeType::Slave if masters == 0 => Err(ClusteredError::MasterNodeNotPresent {
            cluster: cluster.name.clone(),
        }),
        _ => Ok(()),
    }
}

fn scope_id(tx: &Transaction<'_>, scope: Option<&ClusterRef>) -> Result<Option<i64>> {
    let Some(target) = scope else {
        return Ok(None);
    };
    let target = cluster::normalize_ref(target)?;
    Ok(Some(cluster::find_existing(tx, &target)?.id))
}

/// Node operations
pub struct Nodes<'a> {
    store: &'a mut MetaStore,
}

impl<'a> Nodes<'a> {
    pub(crate) fn new(store: &'a mut MetaStore) -> Self {
        Self { store }
    }

    /// Create a node in an active, AVAILABLE cluster
    pub fn add(&mut self, spec: &NodeSpec) -> Result<NodeRecord> {
        let name = normalize_name(EntityKind::Node, &spec.name)?;
        let target = cluster::normalize_ref(&spec.cluster)?;
        let mapping = spec
            .block_device_mapping
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.store.session(|tx| {
            let cluster = cluster::find_active(tx, &target)?;
            require_available(&cluster)?;
            check_cardinality(tx, &cluster, spec.node_type)?;

            tx.execute(
                "INSERT INTO NODE (
                    NODE_CLUSTER_ID, NODE_NAME, NODE_DESC, NODE_TYPE, NODE_INSTANCE_TYPE,
                    NODE_KEY_PAIR_NAME, NODE_BLOCK_DEVICE_MAPPING, NODE_STATE, NODE_ACTIVE_FLAG
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    cluster.id,
                    name,
                    spec.description,
                    spec.node_type,
                    spec.instance_type,
                    spec.key_pair_name,
                    mapping,
                    ResourceState::Available,
                    ActiveFlag::Active
                ],
            )
            .map_err(|e| TABLE.duplicate(e, &name))?;
            tracing::info!(node = %name, node_type = %spec.node_type, cluster = %target.cluster, "node added");

            find(tx, cluster.id, &name)?.ok_or_else(|| not_present(EntityKind::Node, &name))
        })
    }

    pub fn describe(&mut self, name: &str, target: &ClusterRef, active_only: bool) -> Result<NodeRecord> {
        let name = normalize_name(EntityKind::Node, name)?;
        let target = cluster::normalize_ref(target)?;
        self.store.session(|tx| {
            let cluster = cluster::find_existing(tx, &target)?;
            let node = find(tx, cluster.id, &name)?.ok_or_else(|| not_present(EntityKind::Node, &name))?;
            require_active(EntityKind::Node, &name, node.active, active_only)?;
            Ok(node)
        })
    }

    /// List nodes, optionally only those of one cluster
    pub fn list(&mut self, scope: Option<&ClusterRef>, active_only: bool) -> Result<Vec<Listing>> {
        self.store.session(|tx| {
            let scope = scope_id(tx, scope)?;
            TABLE.list(tx, scope, active_only)
        })
    }

    /// Soft delete; a master stays while active slaves depend on it
    pub fn delete(&mut self, name: &str, target: &ClusterRef) -> Result<()> {
        let name = normalize_name(EntityKind::Node, name)?;
        let target = cluster::normalize_ref(target)?;
        self.store.session(|tx| {
            let cluster = cluster::find_existing(tx, &target)?;
            let node = find(tx, cluster.id, &name)?.ok_or_else(|| not_present(EntityKind::Node, &name))?;
            TABLE.check_transition(&name, node.active, ActiveFlag::Inactive)?;

            if node.node_type == NodeType::Master && count_active(tx, cluster.id, NodeType::Slave)? > 0 {
                return Err(ClusteredError::ActiveSlavesPresent {
                    cluster: cluster.name,
                });
            }
            TABLE.set_flag(tx, node.id, &name, node.active, ActiveFlag::Inactive)
        })
    }

    /// Recover a node, re-checking the master/slave invariant
    pub fn recover(&mut self, name: &str, target: &ClusterRef) -> Result<()> {
        let name = normalize_name(EntityKind::Node, name)?;
        let target = cluster::normalize_ref(target)?;
        self.store.session(|tx| {
            let cluster = cluster::find_existing(tx, &target)?;
            let node = find(tx, cluster.id, &name)?.ok_or_else(|| not_present(EntityKind::Node, &name))?;
            TABLE.check_transition(&name, node.active, ActiveFlag::Active)?;
            require_active(EntityKind::Cluster, &cluster.name, cluster.active, true)?;
            require_available(&cluster)?;
            check_cardinality(tx, &cluster, node.node_type)?;

            TABLE.set_flag(tx, node.id, &name, node.active, ActiveFlag::Active)
        })
    }

    pub fn flush(&mut self, scope: Option<&ClusterRef>) -> Result<usize> {
        self.store.session(|tx| {
            let scope = scope_id(tx, scope)?;
            TABLE.flush(tx, scope)
        })
    }

    pub fn purge_all(&mut self, scope: Option<&ClusterRef>) -> Result<usize> {
        self.store.session(|tx| {
            let scope = scope_id(tx, scope)?;
            TABLE.purge(tx, scope)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClusterSpec, NewRepository};
    use serde_json::json;

    fn seeded() -> MetaStore {
        let mut store = MetaStore::open_in_memory().unwrap();
        store.encryptors().add("enc1").unwrap();
        store
            .repositories()
            .add(&NewRepository {
                name: "repo1".into(),
                encryptor: "enc1".into(),
                access_key: "a".into(),
                secret_key: "s".into(),
                ..Default::default()
            })
            .unwrap();
        store
            .clusters()
            .add(&ClusterSpec {
                name: "c1".into(),
                repository: "repo1".into(),
                ..Default::default()
            })
            .unwrap();
        store
    }

    fn c1() -> ClusterRef {
        ClusterRef::new("c1", "repo1")
    }

    fn node(name: &str, node_type: NodeType) -> NodeSpec {
        NodeSpec {
            name: name.into(),
            node_type,
            cluster: c1(),
            description: None,
            instance_type: Some("t3.medium".into()),
            key_pair_name: None,
            block_device_mapping: None,
        }
    }

    #[test]
    fn test_slave_needs_master() {
        let mut store = seeded();
        assert!(matches!(
            store.nodes().add(&node("n1", NodeType::Slave)),
            Err(ClusteredError::MasterNodeNotPresent { .. })
        ));
    }

    #[test]
    fn test_single_master() {
        let mut store = seeded();
        store.nodes().add(&node("n1", NodeType::Master)).unwrap();
        let err = store.nodes().add(&node("n2", NodeType::Master)).unwrap_err();
        assert!(matches!(err, ClusteredError::MasterNodeAlreadyExists { .. }));
        assert!(err.to_string().contains("Cluster<'C1'>"));
    }

    #[test]
    fn test_master_delete_guard() {
        let mut store = seeded();
        let mut nodes = store.nodes();
        nodes.add(&node("n1", NodeType::Master)).unwrap();
        nodes.add(&node("n3", NodeType::Slave)).unwrap();

        assert!(matches!(
            nodes.delete("n1", &c1()),
            Err(ClusteredError::ActiveSlavesPresent { .. })
        ));
        nodes.delete("n3", &c1()).unwrap();
        nodes.delete("n1", &c1()).unwrap();
        assert!(nodes.list(Some(&c1()), true).unwrap().is_empty());
    }

    #[test]
    fn test_recover_rechecks_invariants() {
        let mut store = seeded();
        let mut nodes = store.nodes();
        nodes.add(&node("m1", NodeType::Master)).unwrap();
        nodes.add(&node("s1", NodeType::Slave)).unwrap();
        nodes.delete("s1", &c1()).unwrap();
        nodes.delete("m1", &c1()).unwrap();

        // slave cannot come back before its master
        assert!(matches!(
            nodes.recover("s1", &c1()),
            Err(ClusteredError::MasterNodeNotPresent { .. })
        ));

        nodes.add(&node("m2", NodeType::Master)).unwrap();
        assert!(matches!(
            nodes.recover("m1", &c1()),
            Err(ClusteredError::MasterNodeAlreadyExists { .. })
        ));
        nodes.recover("s1", &c1()).unwrap();
        assert!(matches!(
            nodes.recover("s1", &c1()),
            Err(ClusteredError::WrongActionInvocation { .. })
        ));
    }

    #[test]
    fn test_cluster_must_be_available() {
        let mut store = seeded();
        store.nodes().add(&node("n1", NodeType::Master)).unwrap();
        store.clusters().set_state(&c1(), ResourceState::Running).unwrap();

        assert!(matches!(
            store.nodes().add(&node("n2", NodeType::Slave)),
            Err(ClusteredError::ClusterStateConflict { .. })
        ));

        store.clusters().set_state(&c1(), ResourceState::Available).unwrap();
        store.nodes().add(&node("n2", NodeType::Slave)).unwrap();
    }

    #[test]
    fn test_delete_allowed_while_cluster_running() {
        let mut store = seeded();
        store.nodes().add(&node("m1", NodeType::Master)).unwrap();
        store.nodes().add(&node("s1", NodeType::Slave)).unwrap();
        store.nodes().delete("s1", &c1()).unwrap();
        store.clusters().set_state(&c1(), ResourceState::Running).unwrap();

        assert!(matches!(
            store.nodes().add(&node("s2", NodeType::Slave)),
            Err(ClusteredError::ClusterStateConflict { .. })
        ));
        assert!(matches!(
            store.nodes().recover("s1", &c1()),
            Err(ClusteredError::ClusterStateConflict { .. })
        ));
        store.nodes().delete("m1", &c1()).unwrap();
        assert!(store.nodes().list(Some(&c1()), true).unwrap().is_empty());
    }

    #[test]
    fn test_recover_requires_active_cluster() {
        let mut store = seeded();
        store.nodes().add(&node("n1", NodeType::Master)).unwrap();
        store.nodes().delete("n1", &c1()).unwrap();
        store.clusters().delete(&c1()).unwrap();

        assert!(matches!(
            store.nodes().recover("n1", &c1()),
            Err(ClusteredError::NotActive {
                kind: EntityKind::Cluster,
                ..
            })
        ));
        assert!(matches!(
            store.nodes().add(&node("n2", NodeType::Master)),
            Err(ClusteredError::NotPresent {
                kind: EntityKind::Cluster,
                ..
            })
        ));
    }

    #[test]
    fn test_inactive_nodes_ignored_by_invariants() {
        let mut store = seeded();
        store.nodes().add(&node("n1", NodeType::Master)).unwrap();
        store.nodes().delete("n1", &c1()).unwrap();
        store.nodes().add(&node("n2", NodeType::Master)).unwrap();

        assert!(matches!(
            store.nodes().add(&node("n1", NodeType::Master)),
            Err(ClusteredError::AlreadyExists {
                kind: EntityKind::Node,
                ..
            })
        ));
    }

    #[test]
    fn test_describe_full_row() {
        let mut store = seeded();
        let mut spec = node("n1", NodeType::Master);
        spec.block_device_mapping = Some(json!([{"DEVICE": "/dev/sda1", "SIZE": 20}]));
        store.nodes().add(&spec).unwrap();

        let record = store.nodes().describe("N1", &c1(), true).unwrap();
        assert_eq!(record.node_type, NodeType::Master);
        assert_eq!(record.cluster, "C1");
        assert_eq!(record.repository, "REPO1");
        assert_eq!(record.instance_type.as_deref(), Some("t3.medium"));
        assert_eq!(record.state, ResourceState::Available);
        assert_eq!(
            record.block_device_mapping,
            Some(json!([{"DEVICE": "/dev/sda1", "SIZE": 20}]))
        );
    }

    #[test]
    fn test_flush_and_purge_scoped_to_cluster() {
        let mut store = seeded();
        let mut nodes = store.nodes();
        nodes.add(&node("m1", NodeType::Master)).unwrap();
        nodes.add(&node("s1", NodeType::Slave)).unwrap();
        nodes.add(&node("s2", NodeType::Slave)).unwrap();
        nodes.delete("s2", &c1()).unwrap();

        assert_eq!(nodes.flush(Some(&c1())).unwrap(), 1);
        assert!(matches!(
            nodes.describe("s2", &c1(), false),
            Err(ClusteredError::NotPresent { .. })
        ));
        assert_eq!(nodes.purge_all(Some(&c1())).unwrap(), 2);
        assert!(nodes.list(None, false).unwrap().is_empty());
    }

    #[test]
    fn test_cluster_flush_takes_inactive_nodes_along() {
        let mut store = seeded();
        store.nodes().add(&node("m1", NodeType::Master)).unwrap();
        store.nodes().delete("m1", &c1()).unwrap();
        store.clusters().delete(&c1()).unwrap();

        assert_eq!(store.clusters().flush(None).unwrap(), 1);
        assert!(matches!(
            store.clusters().describe(&c1(), false),
            Err(ClusteredError::NotPresent { .. })
        ));
        assert!(store.nodes().list(None, false).unwrap().is_empty());
    }

    #[test]
    fn test_cluster_flush_skips_clusters_with_active_nodes() {
        let mut store = seeded();
        store.nodes().add(&node("m1", NodeType::Master)).unwrap();
        store.clusters().delete(&c1()).unwrap();

        assert_eq!(store.clusters().flush(None).unwrap(), 0);
        assert!(store.clusters().describe(&c1(), false).is_ok());
        assert!(store.nodes().describe("m1", &c1(), true).is_ok());
    }

    #[test]
    fn test_cluster_purge_removes_nodes() {
        let mut store = seeded();
        store.nodes().add(&node("m1", NodeType::Master)).unwrap();
        store.nodes().add(&node("s1", NodeType::Slave)).unwrap();

        assert_eq!(store.clusters().purge_all(None).unwrap(), 1);
        assert!(store.clusters().list(None, false).unwrap().is_empty());
        assert!(store.nodes().list(None, false).unwrap().is_empty());
    }
}
