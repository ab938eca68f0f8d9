use super::{Child, MetaStore, Table, not_present, require_active};
use crate::crypto;
use crate::error::Result;
use crate::model::{ActiveFlag, EncryptorRecord, EntityKind, Listing, normalize_name};
use rusqlite::{OptionalExtension, Transaction, params};

pub(crate) const TABLE: Table = Table {
    kind: EntityKind::Encryptor,
    table: "ENCRYPTOR",
    id: "ENC_ID",
    name: "ENC_NAME",
    flag: "ENC_ACTIVE_FLAG",
    scope: None,
    child: Some(Child {
        table: &super::repository::TABLE,
        column: "REPO_ENC_ID",
    }),
};

/// Row data needed by other entity operations
pub(crate) struct EncryptorRow {
    pub id: i64,
    pub name: String,
    pub key: Vec<u8>,
    pub active: ActiveFlag,
}

pub(crate) fn find(tx: &Transaction<'_>, name: &str) -> Result<Option<EncryptorRow>> {
    let row = tx
        .query_row(
            "SELECT ENC_ID, ENC_NAME, ENC_KEY, ENC_ACTIVE_FLAG FROM ENCRYPTOR WHERE ENC_NAME = ?1",
            params![name],
            |row| {
                Ok(EncryptorRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    key: row.get(2)?,
                    active: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub(crate) fn find_by_id(tx: &Transaction<'_>, id: i64) -> Result<EncryptorRow> {
    let row = tx.query_row(
        "SELECT ENC_ID, ENC_NAME, ENC_KEY, ENC_ACTIVE_FLAG FROM ENCRYPTOR WHERE ENC_ID = ?1",
        params![id],
        |row| {
            Ok(EncryptorRow {
                id: row.get(0)?,
                name: row.get(1)?,
                key: row.get(2)?,
                active: row.get(3)?,
            })
        },
    )?;
    Ok(row)
}

/// Encryptor operations
pub struct Encryptors<'a> {
    store: &'a mut MetaStore,
}

impl<'a> Encryptors<'a> {
    pub(crate) fn new(store: &'a mut MetaStore) -> Self {
        Self { store }
    }

    /// Create an encryptor with fresh key material
    pub fn add(&mut self, name: &str) -> Result<EncryptorRecord> {
        let name = normalize_name(EntityKind::Encryptor, name)?;
        let key = crypto::generate_key();
        self.store.session(|tx| {
            tx.execute(
                "INSERT INTO ENCRYPTOR (ENC_NAME, ENC_KEY, ENC_ACTIVE_FLAG) VALUES (?1, ?2, ?3)",
                params![name, key, ActiveFlag::Active],
            )
            .map_err(|e| TABLE.duplicate(e, &name))?;
            tracing::info!(encryptor = %name, "encryptor added");
            Ok(EncryptorRecord {
                id: tx.last_insert_rowid(),
                name: name.clone(),
                active: ActiveFlag::Active,
            })
        })
    }

    pub fn describe(&mut self, name: &str, active_only: bool) -> Result<EncryptorRecord> {
        let name = normalize_name(EntityKind::Encryptor, name)?;
        self.store.session(|tx| {
            let row = find(tx, &name)?.ok_or_else(|| not_present(EntityKind::Encryptor, &name))?;
            require_active(EntityKind::Encryptor, &name, row.active, active_only)?;
            Ok(EncryptorRecord {
                id: row.id,
                name: row.name,
                active: row.active,
            })
        })
    }

    pub fn list(&mut self, active_only: bool) -> Result<Vec<Listing>> {
        self.store.session(|tx| TABLE.list(tx, None, active_only))
    }

    /// Soft delete
    pub fn delete(&mut self, name: &str) -> Result<()> {
        self.transition(name, ActiveFlag::Inactive)
    }

    pub fn recover(&mut self, name: &str) -> Result<()> {
        self.transition(name, ActiveFlag::Active)
    }

    fn transition(&mut self, name: &str, target: ActiveFlag) -> Result<()> {
        let name = normalize_name(EntityKind::Encryptor, name)?;
        self.store.session(|tx| {
            let row = find(tx, &name)?.ok_or_else(|| not_present(EntityKind::Encryptor, &name))?;
            TABLE.set_flag(tx, row.id, &name, row.active, target)
        })
    }

    /// Hard-remove inactive encryptors
    pub fn flush(&mut self) -> Result<usize> {
        self.store.session(|tx| TABLE.flush(tx, None))
    }

    /// Hard-remove every encryptor
    pub fn purge_all(&mut self) -> Result<usize> {
        self.store.session(|tx| TABLE.purge(tx, None))
    }
}
