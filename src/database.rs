//! Database initialization, table definitions and the service store
//!
//! This module handles the setup of the embedded redb database and every
//! read and write against the service tables. Subdomain uniqueness and the
//! per-owner quota are checked inside the same write transaction that stores
//! the row, so two concurrent writers can never both claim a subdomain.

use std::path::Path;
use std::sync::Arc;

use redb::{
    CommitError, Database, ReadableDatabase, ReadableTable, StorageError, TableDefinition,
    TableError, TransactionError,
};
use thiserror::Error;

use crate::model::ServiceRecord;

/// Main table for storing service records
///
/// Key: Service ID (UUID) as string
/// Value: JSON-serialized ServiceRecord as string
pub const TABLE_SERVICES: TableDefinition<&str, &str> = TableDefinition::new("services_v1");

/// Uniqueness table for subdomains
///
/// Key: Subdomain label (e.g., "alpha")
/// Value: ID of the service that owns it
///
/// A subdomain can only ever map to one service, which makes this table the
/// system-wide uniqueness constraint.
pub const TABLE_SUBDOMAINS: TableDefinition<&str, &str> = TableDefinition::new("subdomains_v1");

/// Index table for listing services by owner
///
/// Key: Composite key in format "{owner_id}:{created_micros:020}:{service_id}"
/// Value: Service ID
///
/// The zero-padded timestamp keeps entries in chronological order, so a
/// reversed range scan yields the newest services first.
pub const TABLE_OWNER_INDEX: TableDefinition<&str, &str> = TableDefinition::new("owner_index_v1");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("subdomain '{0}' is already registered")]
    SubdomainTaken(String),

    #[error("owner already has {0} services")]
    QuotaExceeded(u32),

    #[error("service not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] redb::Error),

    #[error("corrupt service record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

macro_rules! impl_from_redb {
    ($($err:ty),*) => {
        $(impl From<$err> for StoreError {
            fn from(err: $err) -> Self {
                StoreError::Database(err.into())
            }
        })*
    };
}

impl_from_redb!(TransactionError, TableError, StorageError, CommitError);

/// Initializes the embedded database and creates required tables
///
/// # Arguments
///
/// * `db_path` - File path where the database should be stored (e.g., "data.db")
pub fn init_db(db_path: impl AsRef<Path>) -> Result<Database, redb::Error> {
    let db = Database::create(db_path)?;

    let write_txn = db.begin_write()?;
    {
        write_txn.open_table(TABLE_SERVICES)?;
        write_txn.open_table(TABLE_SUBDOMAINS)?;
        write_txn.open_table(TABLE_OWNER_INDEX)?;
    }
    write_txn.commit()?;

    Ok(db)
}

fn owner_key(record: &ServiceRecord) -> String {
    format!(
        "{}:{:020}:{}",
        record.owner_id,
        record.created_at.timestamp_micros(),
        record.id
    )
}

/// Range bounds covering every index entry of one owner
///
/// '{' sorts right after ':', so "{owner}:{" is an exclusive upper bound.
fn owner_range(owner_id: &str) -> (String, String) {
    (format!("{owner_id}:"), format!("{owner_id}:{{"))
}

/// True when an index key belongs exactly to `owner_id`
///
/// Owner IDs may themselves contain ':', so the prefix range alone can also
/// match "{owner_id}:suffix" owners. The key is split from the right, where
/// the timestamp and UUID never contain ':'.
fn key_owned_by(key: &str, owner_id: &str) -> bool {
    key.rsplitn(3, ':').nth(2) == Some(owner_id)
}

/// Thread-safe handle to the service tables
#[derive(Clone)]
pub struct ServiceStore {
    db: Arc<Database>,
}

impl ServiceStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Opens (or creates) the database file and wraps it in a store
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, redb::Error> {
        Ok(Self::new(Arc::new(init_db(db_path)?)))
    }

    /// ID of the service currently holding `subdomain`, if any
    pub fn subdomain_owner(&self, subdomain: &str) -> Result<Option<String>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_SUBDOMAINS)?;
        let owner = table.get(subdomain)?.map(|guard| guard.value().to_string());
        Ok(owner)
    }

    pub fn get(&self, id: &str) -> Result<Option<ServiceRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_SERVICES)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_str(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn count_by_owner(&self, owner_id: &str) -> Result<usize, StoreError> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(TABLE_OWNER_INDEX)?;
        count_owned(&index, owner_id)
    }

    /// Services of one owner, newest first
    pub fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ServiceRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(TABLE_OWNER_INDEX)?;
        let services = read_txn.open_table(TABLE_SERVICES)?;

        let (start, end) = owner_range(owner_id);
        let mut records = Vec::new();
        for entry in index.range(start.as_str()..end.as_str())?.rev() {
            let (key, id) = entry?;
            if !key_owned_by(key.value(), owner_id) {
                continue;
            }
            if let Some(guard) = services.get(id.value())? {
                records.push(serde_json::from_str::<ServiceRecord>(guard.value())?);
            }
        }

        Ok(records)
    }

    /// Every service in the system, newest first
    pub fn list_all(&self) -> Result<Vec<ServiceRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TABLE_SERVICES)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            records.push(serde_json::from_str::<ServiceRecord>(value.value())?);
        }

        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(records)
    }

    /// Stores a new service
    ///
    /// Within a single write transaction this:
    /// 1. Rejects the insert when the owner already has `max_services` rows
    /// 2. Claims the subdomain, failing if another service holds it
    /// 3. Writes the record and its owner index entry
    pub fn insert(
        &self,
        record: &ServiceRecord,
        max_services: Option<u32>,
    ) -> Result<(), StoreError> {
        let record_json = serde_json::to_string(record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut index = write_txn.open_table(TABLE_OWNER_INDEX)?;
            if let Some(limit) = max_services {
                if count_owned(&index, &record.owner_id)? >= limit as usize {
                    return Err(StoreError::QuotaExceeded(limit));
                }
            }

            let mut subdomains = write_txn.open_table(TABLE_SUBDOMAINS)?;
            if subdomains.get(record.subdomain.as_str())?.is_some() {
                // Dropping the transaction without commit aborts it
                return Err(StoreError::SubdomainTaken(record.subdomain.clone()));
            }
            subdomains.insert(record.subdomain.as_str(), record.id.as_str())?;

            let mut services = write_txn.open_table(TABLE_SERVICES)?;
            services.insert(record.id.as_str(), record_json.as_str())?;

            index.insert(owner_key(record).as_str(), record.id.as_str())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    /// Replaces a stored service with `record`
    ///
    /// When the subdomain changed, the new label is claimed and the old one
    /// released in the same transaction.
    pub fn update(&self, record: &ServiceRecord) -> Result<(), StoreError> {
        let record_json = serde_json::to_string(record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut services = write_txn.open_table(TABLE_SERVICES)?;
            let existing = match services.get(record.id.as_str())? {
                Some(guard) => serde_json::from_str::<ServiceRecord>(guard.value())?,
                None => return Err(StoreError::NotFound),
            };

            if existing.subdomain != record.subdomain {
                let mut subdomains = write_txn.open_table(TABLE_SUBDOMAINS)?;
                let holder = subdomains
                    .get(record.subdomain.as_str())?
                    .map(|guard| guard.value().to_string());
                if holder.is_some_and(|id| id != record.id) {
                    return Err(StoreError::SubdomainTaken(record.subdomain.clone()));
                }
                subdomains.remove(existing.subdomain.as_str())?;
                subdomains.insert(record.subdomain.as_str(), record.id.as_str())?;
            }

            services.insert(record.id.as_str(), record_json.as_str())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    /// Removes a service and its subdomain claim, returning the removed record
    pub fn delete(&self, id: &str) -> Result<ServiceRecord, StoreError> {
        let write_txn = self.db.begin_write()?;
        let record = {
            let mut services = write_txn.open_table(TABLE_SERVICES)?;
            let record = match services.remove(id)? {
                Some(guard) => serde_json::from_str::<ServiceRecord>(guard.value())?,
                None => return Err(StoreError::NotFound),
            };

            let mut subdomains = write_txn.open_table(TABLE_SUBDOMAINS)?;
            subdomains.remove(record.subdomain.as_str())?;

            let mut index = write_txn.open_table(TABLE_OWNER_INDEX)?;
            index.remove(owner_key(&record).as_str())?;

            record
        };
        write_txn.commit()?;

        Ok(record)
    }
}

fn count_owned<T>(index: &T, owner_id: &str) -> Result<usize, StoreError>
where
    T: ReadableTable<&'static str, &'static str>,
{
    let (start, end) = owner_range(owner_id);
    let mut count = 0;
    for entry in index.range(start.as_str()..end.as_str())? {
        let (key, _) = entry?;
        if key_owned_by(key.value(), owner_id) {
            count += 1;
        }
    }
    Ok(count)
}
