use super::{Child, MetaStore, Table, encryptor, not_present, require_active};
use crate::crypto;
use crate::error::{ClusteredError, Result};
use crate::model::{
    ActiveFlag, Credentials, EntityKind, Listing, NewRepository, RepositoryRecord, ResourceState,
    normalize_name,
};
use rusqlite::{OptionalExtension, Row, Transaction, params};

pub(crate) const TABLE: Table = Table {
    kind: EntityKind::Repository,
    table: "REPOSITORY",
    id: "REPO_ID",
    name: "REPO_NAME",
    flag: "REPO_ACTIVE_FLAG",
    scope: None,
    child: Some(Child {
        table: &super::cluster::TABLE,
        column: "CLUSTER_REPO_ID",
    }),
};

const SELECT: &str = "
SELECT r.REPO_ID, r.REPO_NAME, e.ENC_NAME, r.REPO_DESC, r.REPO_REGION, r.REPO_VPC_ID,
       r.REPO_SUBNET_LIST, r.REPO_STATE, r.REPO_ACTIVE_FLAG
  FROM REPOSITORY r
  JOIN ENCRYPTOR e ON e.ENC_ID = r.REPO_ENC_ID";

fn record(row: &Row<'_>) -> rusqlite::Result<RepositoryRecord> {
    let subnets: String = row.get(6)?;
    Ok(RepositoryRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        encryptor: row.get(2)?,
        description: row.get(3)?,
        region: row.get(4)?,
        vpc_id: row.get(5)?,
        subnets: serde_json::from_str(&subnets).unwrap_or_default(),
        state: row.get(7)?,
        active: row.get(8)?,
    })
}

pub(crate) fn find(tx: &Transaction<'_>, name: &str) -> Result<Option<RepositoryRecord>> {
    let sql = format!("{} WHERE r.REPO_NAME = ?1", SELECT);
    Ok(tx.query_row(&sql, params![name], record).optional()?)
}

/// Look up a repository that must exist and be active
pub(crate) fn find_active(tx: &Transaction<'_>, name: &str) -> Result<RepositoryRecord> {
    find(tx, name)?
        .filter(|repo| repo.active.is_active())
        .ok_or_else(|| not_present(EntityKind::Repository, name))
}

/// Repository operations
pub struct Repositories<'a> {
    store: &'a mut MetaStore,
}

impl<'a> Repositories<'a> {
    pub(crate) fn new(store: &'a mut MetaStore) -> Self {
        Self { store }
    }

    /// Create a repository, encrypting both credentials under its encryptor's key
    pub fn add(&mut self, new: &NewRepository) -> Result<RepositoryRecord> {
        let name = normalize_name(EntityKind::Repository, &new.name)?;
        let encryptor_name = normalize_name(EntityKind::Encryptor, &new.encryptor)?;

        self.store.session(|tx| {
            let enc = encryptor::find(tx, &encryptor_name)?
                .ok_or_else(|| not_present(EntityKind::Encryptor, &encryptor_name))?;
            if !enc.active.is_active() {
                return Err(ClusteredError::NotActive {
                    kind: EntityKind::Encryptor,
                    name: enc.name,
                });
            }

            let access = crypto::encrypt(&enc.key, &new.access_key)?;
            let secret = crypto::encrypt(&enc.key, &new.secret_key)?;

            tx.execute(
                "INSERT INTO REPOSITORY (
                    REPO_ENC_ID, REPO_NAME, REPO_DESC, REPO_ACCESS_KEY_ENCRYPTED,
                    REPO_SECRET_KEY_ENCRYPTED, REPO_REGION, REPO_STATE, REPO_ACTIVE_FLAG
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    enc.id,
                    name,
                    new.description,
                    access,
                    secret,
                    new.region,
                    ResourceState::Available,
                    ActiveFlag::Active
                ],
            )
            .map_err(|e| TABLE.duplicate(e, &name))?;
            tracing::info!(repository = %name, encryptor = %enc.name, "repository added");

            find(tx, &name)?.ok_or_else(|| not_present(EntityKind::Repository, &name))
        })
    }

    pub fn describe(&mut self, name: &str, active_only: bool) -> Result<RepositoryRecord> {
        let name = normalize_name(EntityKind::Repository, name)?;
        self.store.session(|tx| {
            let repo = find(tx, &name)?.ok_or_else(|| not_present(EntityKind::Repository, &name))?;
            require_active(EntityKind::Repository, &name, repo.active, active_only)?;
            Ok(repo)
        })
    }

    pub fn list(&mut self, active_only: bool) -> Result<Vec<Listing>> {
        self.store.session(|tx| TABLE.list(tx, None, active_only))
    }

    /// Decrypted credentials of an active repository
    pub fn credentials(&mut self, name: &str) -> Result<Credentials> {
        let name = normalize_name(EntityKind::Repository, name)?;
        self.store.session(|tx| {
            let repo = find_active(tx, &name)?;
            let (enc_id, access, secret): (i64, String, String) = tx.query_row(
                "SELECT REPO_ENC_ID, REPO_ACCESS_KEY_ENCRYPTED, REPO_SECRET_KEY_ENCRYPTED
                   FROM REPOSITORY WHERE REPO_ID = ?1",
                params![repo.id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;
            let enc = encryptor::find_by_id(tx, enc_id)?;
            Ok(Credentials {
                access_key: crypto::decrypt(&enc.key, &access)?,
                secret_key: crypto::decrypt(&enc.key, &secret)?,
                region: repo.region,
            })
        })
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.transition(name, ActiveFlag::Inactive)
    }

    pub fn recover(&mut self, name: &str) -> Result<()> {
        self.transition(name, ActiveFlag::Active)
    }

    fn transition(&mut self, name: &str, target: ActiveFlag) -> Result<()> {
        let name = normalize_name(EntityKind::Repository, name)?;
        self.store.session(|tx| {
            let repo = find(tx, &name)?.ok_or_else(|| not_present(EntityKind::Repository, &name))?;
            TABLE.set_flag(tx, repo.id, &name, repo.active, target)
        })
    }

    pub fn flush(&mut self) -> Result<usize> {
        self.store.session(|tx| TABLE.flush(tx, None))
    }

    pub fn purge_all(&mut self) -> Result<usize> {
        self.store.session(|tx| TABLE.purge(tx, None))
    }
}
