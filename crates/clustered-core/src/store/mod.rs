//! SQLite metadata store
//!
//! One [`MetaStore`] owns one connection. Every entity operation runs inside
//! [`MetaStore::session`], so invariant checks and the write they guard share
//! a transaction.

mod cluster;
mod encryptor;
mod node;
mod repository;

pub use cluster::Clusters;
pub use encryptor::Encryptors;
pub use node::Nodes;
pub use repository::Repositories;

use crate::error::{ClusteredError, Result};
use crate::model::{ActiveFlag, EntityKind, Listing};
use rusqlite::{Connection, ErrorCode, OpenFlags, Transaction, params_from_iter};
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS ENCRYPTOR (
    ENC_ID          INTEGER PRIMARY KEY AUTOINCREMENT,
    ENC_NAME        TEXT NOT NULL,
    ENC_KEY         BLOB NOT NULL,
    ENC_ACTIVE_FLAG TEXT NOT NULL DEFAULT 'Y' CHECK (ENC_ACTIVE_FLAG IN ('Y', 'N')),
    UNIQUE (ENC_NAME)
);

CREATE TABLE IF NOT EXISTS REPOSITORY (
    REPO_ID                   INTEGER PRIMARY KEY AUTOINCREMENT,
    REPO_ENC_ID               INTEGER NOT NULL REFERENCES ENCRYPTOR (ENC_ID) ON DELETE CASCADE,
    REPO_NAME                 TEXT NOT NULL,
    REPO_DESC                 TEXT,
    REPO_ACCESS_KEY_ENCRYPTED TEXT NOT NULL,
    REPO_SECRET_KEY_ENCRYPTED TEXT NOT NULL,
    REPO_REGION               TEXT,
    REPO_VPC_ID               TEXT,
    REPO_SUBNET_LIST          TEXT NOT NULL DEFAULT '[]',
    REPO_STATE                TEXT NOT NULL,
    REPO_ACTIVE_FLAG          TEXT NOT NULL DEFAULT 'Y' CHECK (REPO_ACTIVE_FLAG IN ('Y', 'N')),
    UNIQUE (REPO_NAME)
);

CREATE TABLE IF NOT EXISTS CLUSTER (
    CLUSTER_ID                 INTEGER PRIMARY KEY AUTOINCREMENT,
    CLUSTER_REPO_ID            INTEGER NOT NULL REFERENCES REPOSITORY (REPO_ID) ON DELETE CASCADE,
    CLUSTER_NAME               TEXT NOT NULL,
    CLUSTER_DESC               TEXT,
    CLUSTER_SECURITY_GROUP_ID  TEXT,
    CLUSTER_WHITELISTED_IP_SET TEXT NOT NULL DEFAULT '[]',
    CLUSTER_STATE              TEXT NOT NULL,
    CLUSTER_ACTIVE_FLAG        TEXT NOT NULL DEFAULT 'Y' CHECK (CLUSTER_ACTIVE_FLAG IN ('Y', 'N')),
    UNIQUE (CLUSTER_REPO_ID, CLUSTER_NAME)
);

CREATE TABLE IF NOT EXISTS NODE (
    NODE_ID                   INTEGER PRIMARY KEY AUTOINCREMENT,
    NODE_CLUSTER_ID           INTEGER NOT NULL REFERENCES CLUSTER (CLUSTER_ID) ON DELETE CASCADE,
    NODE_NAME                 TEXT NOT NULL,
    NODE_DESC                 TEXT,
    NODE_TYPE                 TEXT NOT NULL CHECK (NODE_TYPE IN ('M', 'S')),
    NODE_INSTANCE_TYPE        TEXT,
    NODE_INSTANCE_ID          TEXT,
    NODE_KEY_PAIR_NAME        TEXT,
    NODE_BLOCK_DEVICE_MAPPING TEXT,
    NODE_STATE                TEXT NOT NULL,
    NODE_ACTIVE_FLAG          TEXT NOT NULL DEFAULT 'Y' CHECK (NODE_ACTIVE_FLAG IN ('Y', 'N')),
    UNIQUE (NODE_CLUSTER_ID, NODE_NAME)
);

CREATE INDEX IF NOT EXISTS IDX_CLUSTER_REPO ON CLUSTER (CLUSTER_REPO_ID);
CREATE INDEX IF NOT EXISTS IDX_NODE_CLUSTER ON NODE (NODE_CLUSTER_ID, NODE_TYPE, NODE_ACTIVE_FLAG);
";

/// Handle on the metadata database
pub struct MetaStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl MetaStore {
    /// Open (creating if needed) the database file and ensure the schema exists
    pub fn create(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self::configure(conn, Some(path.to_path_buf()))?;
        store.create_schema()?;
        tracing::info!(path = %path.display(), "metadata store ready");
        Ok(store)
    }

    /// Open an existing database file
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ClusteredError::StoreMissing(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Self::configure(conn, Some(path.to_path_buf()))
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self::configure(Connection::open_in_memory()?, None)?;
        store.create_schema()?;
        Ok(store)
    }

    fn configure(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self { conn, path })
    }

    pub fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `work` in a transaction: commit on `Ok`, roll back on `Err`
    pub fn session<T>(&mut self, work: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let tx = self.conn.transaction()?;
        match work(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    pub fn encryptors(&mut self) -> Encryptors<'_> {
        Encryptors::new(self)
    }

    pub fn repositories(&mut self) -> Repositories<'_> {
        Repositories::new(self)
    }

    pub fn clusters(&mut self) -> Clusters<'_> {
        Clusters::new(self)
    }

    pub fn nodes(&mut self) -> Nodes<'_> {
        Nodes::new(self)
    }
}

/// Column names shared by the soft-delete helpers
pub(crate) struct Table {
    pub kind: EntityKind,
    pub table: &'static str,
    pub id: &'static str,
    pub name: &'static str,
    pub flag: &'static str,
    /// Foreign key column scoping names to a parent, if any
    pub scope: Option<&'static str>,
    pub child: Option<Child>,
}

/// The table whose rows reference this one, through `column`
pub(crate) struct Child {
    pub table: &'static Table,
    pub column: &'static str,
}

impl Table {
    /// Deleting an inactive row or recovering an active one is rejected
    pub fn check_transition(&self, name: &str, current: ActiveFlag, target: ActiveFlag) -> Result<()> {
        if current == target {
            return Err(ClusteredError::WrongActionInvocation {
                kind: self.kind,
                name: name.to_string(),
                flag: current.as_char(),
            });
        }
        Ok(())
    }

    /// Flip the active flag of one row
    pub fn set_flag(
        &self,
        tx: &Transaction<'_>,
        id: i64,
        name: &str,
        current: ActiveFlag,
        target: ActiveFlag,
    ) -> Result<()> {
        self.check_transition(name, current, target)?;
        let sql = format!(
            "UPDATE {} SET {} = ?1 WHERE {} = ?2",
            self.table, self.flag, self.id
        );
        tx.execute(&sql, rusqlite::params![target, id])?;
        tracing::debug!(kind = %self.kind, name, flag = %target, "active flag updated");
        Ok(())
    }

    pub fn list(
        &self,
        tx: &Transaction<'_>,
        scope: Option<i64>,
        active_only: bool,
    ) -> Result<Vec<Listing>> {
        let (mut clauses, args) = self.scope_clause(scope);
        if active_only {
            clauses.push(format!("{} = 'Y'", self.flag));
        }
        let sql = format!(
            "SELECT {}, {} FROM {}{} ORDER BY {}",
            self.name,
            self.flag,
            self.table,
            where_clause(&clauses),
            self.name
        );

        let mut stmt = tx.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| {
            Ok(Listing {
                name: row.get(0)?,
                active: row.get(1)?,
            })
        })?;
        let listings = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(listings)
    }

    /// Remove inactive rows in scope whose descendants are all inactive too.
    /// Those descendants go with them; rows with live descendants stay.
    pub fn flush(&self, tx: &Transaction<'_>, scope: Option<i64>) -> Result<usize> {
        let (mut clauses, args) = self.scope_clause(scope);
        clauses.push(format!("{}.{} = 'N'", self.table, self.flag));

        if let Some(live) = self.live_descendants(&format!("{}.{}", self.table, self.id)) {
            let mut blocked = clauses.clone();
            blocked.push(live.clone());
            let sql = format!("SELECT COUNT(*) FROM {}{}", self.table, where_clause(&blocked));
            let skipped: i64 = tx.query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))?;
            if skipped > 0 {
                tracing::warn!(kind = %self.kind, skipped, "inactive rows kept while active dependents reference them");
            }
            clauses.push(format!("NOT {}", live));
        }

        let sql = format!("DELETE FROM {}{}", self.table, where_clause(&clauses));
        let removed = tx.execute(&sql, params_from_iter(args))?;
        tracing::info!(kind = %self.kind, removed, "inactive rows flushed");
        Ok(removed)
    }

    /// Remove every row in scope regardless of its flag, cascading to children
    pub fn purge(&self, tx: &Transaction<'_>, scope: Option<i64>) -> Result<usize> {
        let (clauses, args) = self.scope_clause(scope);
        let sql = format!("DELETE FROM {}{}", self.table, where_clause(&clauses));
        let removed = tx.execute(&sql, params_from_iter(args))?;
        tracing::info!(kind = %self.kind, removed, "rows purged");
        Ok(removed)
    }

    fn scope_clause(&self, scope: Option<i64>) -> (Vec<String>, Vec<i64>) {
        match (self.scope, scope) {
            (Some(column), Some(id)) => (vec![format!("{} = ?", column)], vec![id]),
            _ => (Vec::new(), Vec::new()),
        }
    }

    /// `EXISTS` clause matching an active row anywhere below `parent_id`
    fn live_descendants(&self, parent_id: &str) -> Option<String> {
        let child = self.child.as_ref()?;
        let table = child.table;
        let active = format!("{}.{} = 'Y'", table.table, table.flag);
        let live = match table.live_descendants(&format!("{}.{}", table.table, table.id)) {
            Some(nested) => format!("({} OR {})", active, nested),
            None => active,
        };
        Some(format!(
            "EXISTS (SELECT 1 FROM {} WHERE {}.{} = {} AND {})",
            table.table, table.table, child.column, parent_id, live
        ))
    }

    /// Map a unique-constraint violation on insert to `AlreadyExists`
    pub fn duplicate(&self, err: rusqlite::Error, name: &str) -> ClusteredError {
        if constraint_code(&err) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) {
            ClusteredError::AlreadyExists {
                kind: self.kind,
                name: name.to_string(),
            }
        } else {
            ClusteredError::Storage(err)
        }
    }
}

fn where_clause(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

fn constraint_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            Some(e.extended_code)
        }
        _ => None,
    }
}

/// Reject inactive rows when the caller asked for an active-only lookup
pub(crate) fn require_active(
    kind: EntityKind,
    name: &str,
    flag: ActiveFlag,
    active_only: bool,
) -> Result<()> {
    if active_only && !flag.is_active() {
        return Err(ClusteredError::NotActive {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn not_present(kind: EntityKind, name: &str) -> ClusteredError {
    ClusteredError::NotPresent {
        kind,
        name: name.to_string(),
    }
}
