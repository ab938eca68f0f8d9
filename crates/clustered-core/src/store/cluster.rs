use super::{Child, MetaStore, Table, not_present, repository, require_active};
use crate::error::Result;
use crate::model::{
    ActiveFlag, ClusterRecord, ClusterRef, ClusterSpec, EntityKind, Listing, ResourceState,
    normalize_name,
};
use rusqlite::{OptionalExtension, Row, Transaction, params};

pub(crate) const TABLE: Table = Table {
    kind: EntityKind::Cluster,
    table: "CLUSTER",
    id: "CLUSTER_ID",
    name: "CLUSTER_NAME",
    flag: "CLUSTER_ACTIVE_FLAG",
    scope: Some("CLUSTER_REPO_ID"),
    child: Some(Child {
        table: &super::node::TABLE,
        column: "NODE_CLUSTER_ID",
    }),
};

const SELECT: &str = "
SELECT c.CLUSTER_ID, c.CLUSTER_NAME, r.REPO_NAME, c.CLUSTER_DESC, c.CLUSTER_SECURITY_GROUP_ID,
       c.CLUSTER_WHITELISTED_IP_SET, c.CLUSTER_STATE, c.CLUSTER_ACTIVE_FLAG
  FROM CLUSTER c
  JOIN REPOSITORY r ON r.REPO_ID = c.CLUSTER_REPO_ID";

fn record(row: &Row<'_>) -> rusqlite::Result<ClusterRecord> {
    let ips: String = row.get(5)?;
    Ok(ClusterRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        repository: row.get(2)?,
        description: row.get(3)?,
        security_group_id: row.get(4)?,
        whitelisted_ips: serde_json::from_str(&ips).unwrap_or_default(),
        state: row.get(6)?,
        active: row.get(7)?,
    })
}

/// Normalized `(cluster, repository)` names
pub(crate) fn normalize_ref(target: &ClusterRef) -> Result<ClusterRef> {
    Ok(ClusterRef {
        cluster: normalize_name(EntityKind::Cluster, &target.cluster)?,
        repository: normalize_name(EntityKind::Repository, &target.repository)?,
    })
}

/// Find a cluster by name within a repository of any state
pub(crate) fn find(tx: &Transaction<'_>, target: &ClusterRef) -> Result<Option<ClusterRecord>> {
    let sql = format!("{} WHERE c.CLUSTER_NAME = ?1 AND r.REPO_NAME = ?2", SELECT);
    Ok(tx
        .query_row(&sql, params![target.cluster, target.repository], record)
        .optional()?)
}

/// Find a cluster whose repository exists
pub(crate) fn find_existing(tx: &Transaction<'_>, target: &ClusterRef) -> Result<ClusterRecord> {
    repository::find(tx, &target.repository)?
        .ok_or_else(|| not_present(EntityKind::Repository, &target.repository))?;
    find(tx, target)?.ok_or_else(|| not_present(EntityKind::Cluster, &target.cluster))
}

/// Find an active cluster under an active repository
pub(crate) fn find_active(tx: &Transaction<'_>, target: &ClusterRef) -> Result<ClusterRecord> {
    repository::find_active(tx, &target.repository)?;
    find(tx, target)?
        .filter(|cluster| cluster.active.is_active())
        .ok_or_else(|| not_present(EntityKind::Cluster, &target.cluster))
}

fn scope_id(tx: &Transaction<'_>, repository: Option<&str>) -> Result<Option<i64>> {
    let Some(repository) = repository else {
        return Ok(None);
    };
    let name = normalize_name(EntityKind::Repository, repository)?;
    let repo = repository::find(tx, &name)?.ok_or_else(|| not_present(EntityKind::Repository, &name))?;
    Ok(Some(repo.id))
}

/// Cluster operations
pub struct Clusters<'a> {
    store: &'a mut MetaStore,
}

impl<'a> Clusters<'a> {
    pub(crate) fn new(store: &'a mut MetaStore) -> Self {
        Self { store }
    }

    /// Create a cluster under an active repository
    pub fn add(&mut self, spec: &ClusterSpec) -> Result<ClusterRecord> {
        let target = normalize_ref(&ClusterRef::new(&spec.name, &spec.repository))?;
        let ips = serde_json::to_string(&spec.whitelisted_ips)?;

        self.store.session(|tx| {
            let repo = repository::find_active(tx, &target.repository)?;
            tx.execute(
                "INSERT INTO CLUSTER (
                    CLUSTER_REPO_ID, CLUSTER_NAME, CLUSTER_DESC, CLUSTER_SECURITY_GROUP_ID,
                    CLUSTER_WHITELISTED_IP_SET, CLUSTER_STATE, CLUSTER_ACTIVE_FLAG
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    repo.id,
                    target.cluster,
                    spec.description,
                    spec.security_group_id,
                    ips,
                    ResourceState::Available,
                    ActiveFlag::Active
                ],
            )
            .map_err(|e| TABLE.duplicate(e, &target.cluster))?;
            tracing::info!(cluster = %target.cluster, repository = %target.repository, "cluster added");

            find(tx, &target)?.ok_or_else(|| not_present(EntityKind::Cluster, &target.cluster))
        })
    }

    pub fn describe(&mut self, target: &ClusterRef, active_only: bool) -> Result<ClusterRecord> {
        let target = normalize_ref(target)?;
        self.store.session(|tx| {
            let cluster = find_existing(tx, &target)?;
            require_active(EntityKind::Cluster, &target.cluster, cluster.active, active_only)?;
            Ok(cluster)
        })
    }

    /// List clusters, optionally only those of one repository
    pub fn list(&mut self, repository: Option<&str>, active_only: bool) -> Result<Vec<Listing>> {
        self.store.session(|tx| {
            let scope = scope_id(tx, repository)?;
            TABLE.list(tx, scope, active_only)
        })
    }

    pub fn delete(&mut self, target: &ClusterRef) -> Result<()> {
        self.transition(target, ActiveFlag::Inactive)
    }

    pub fn recover(&mut self, target: &ClusterRef) -> Result<()> {
        self.transition(target, ActiveFlag::Active)
    }

    fn transition(&mut self, target: &ClusterRef, flag: ActiveFlag) -> Result<()> {
        let target = normalize_ref(target)?;
        self.store.session(|tx| {
            let cluster = find_existing(tx, &target)?;
            TABLE.set_flag(tx, cluster.id, &target.cluster, cluster.active, flag)
        })
    }

    /// Record the provisioning state of an active cluster
    pub fn set_state(&mut self, target: &ClusterRef, state: ResourceState) -> Result<()> {
        let target = normalize_ref(target)?;
        self.store.session(|tx| {
            let cluster = find_active(tx, &target)?;
            tx.execute(
                "UPDATE CLUSTER SET CLUSTER_STATE = ?1 WHERE CLUSTER_ID = ?2",
                params![state, cluster.id],
            )?;
            tracing::info!(cluster = %target.cluster, from = %cluster.state, to = %state, "cluster state changed");
            Ok(())
        })
    }

    pub fn flush(&mut self, repository: Option<&str>) -> Result<usize> {
        self.store.session(|tx| {
            let scope = scope_id(tx, repository)?;
            TABLE.flush(tx, scope)
        })
    }

    pub fn purge_all(&mut self, repository: Option<&str>) -> Result<usize> {
        self.store.session(|tx| {
            let scope = scope_id(tx, repository)?;
            TABLE.purge(tx, scope)
        })
    }
}
