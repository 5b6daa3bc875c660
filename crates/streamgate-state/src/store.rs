//! Keyed store contract and the redb-backed implementation.
//!
//! The allocation engines consume the narrow [`KeyedStore`] trait: point
//! reads in two consistency modes, secondary-key queries, primary-key prefix
//! queries, and all-or-nothing conditional multi-item writes. [`RedbStore`]
//! implements it over an embedded redb database with on-disk and in-memory
//! backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::tables::{INSTANCE_IPS, INSTANCE_PORTS, INSTANCES, SHOPS, STREAM_NAMES, Index, Table};
use crate::txn::{Condition, TxnOp, WriteTransaction};

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Narrow store interface consumed by the allocation engines.
///
/// Implementations must apply [`transact_write`](KeyedStore::transact_write)
/// atomically: every item's precondition holds and every operation is
/// applied, or nothing is. `query_index` results may be stale relative to
/// `get_consistent`; callers re-validate before committing against them.
pub trait KeyedStore: Send + Sync {
    /// Eventually consistent point read. Used for cheap existence checks
    /// where staleness is tolerable.
    fn get_eventual(&self, table: Table, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Strongly consistent point read.
    fn get_consistent(&self, table: Table, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Secondary-key query returning the matching records.
    fn query_index(&self, index: Index, key: &str) -> StoreResult<Vec<Vec<u8>>>;

    /// Primary-key prefix query returning the matching records.
    fn query_prefix(&self, table: Table, prefix: &str) -> StoreResult<Vec<Vec<u8>>>;

    /// Atomic all-or-nothing multi-item write. Fails with
    /// [`StoreError::ConditionFailed`] if any item's precondition does not
    /// hold, in which case no item is applied.
    fn transact_write(&self, txn: WriteTransaction) -> StoreResult<()>;
}

/// Thread-safe keyed store backed by redb.
///
/// redb serializes writers, so both read modes observe committed state; the
/// two trait methods are kept distinct because the contract allows weaker
/// `get_eventual` implementations (a remote replicated store, for one).
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "keyed store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory keyed store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SHOPS).map_err(map_err!(Table))?;
        txn.open_table(INSTANCES).map_err(map_err!(Table))?;
        txn.open_table(STREAM_NAMES).map_err(map_err!(Table))?;
        txn.open_table(INSTANCE_PORTS).map_err(map_err!(Table))?;
        txn.open_table(INSTANCE_IPS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get(&self, table: Table, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table.definition()).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(guard.value().to_vec())),
            None => Ok(None),
        }
    }
}

/// Extract the `version` field from a stored JSON record.
fn stored_version(bytes: &[u8]) -> StoreResult<Option<String>> {
    let value: serde_json::Value = serde_json::from_slice(bytes).map_err(map_err!(Deserialize))?;
    Ok(value
        .get("version")
        .and_then(|v| v.as_str())
        .map(str::to_string))
}

impl KeyedStore for RedbStore {
    fn get_eventual(&self, table: Table, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.get(table, key)
    }

    fn get_consistent(&self, table: Table, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.get(table, key)
    }

    fn query_index(&self, index: Index, key: &str) -> StoreResult<Vec<Vec<u8>>> {
        let table = match index {
            Index::ShopsByStream => Table::Shops,
            Index::InstancesByStreamCount => Table::Instances,
        };
        let wanted_count = match index {
            Index::InstancesByStreamCount => Some(key.parse::<u64>().map_err(|_| {
                StoreError::Read(format!("non-numeric index key {key:?}"))
            })?),
            Index::ShopsByStream => None,
        };

        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table.definition()).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: serde_json::Value =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            let matches = match index {
                Index::ShopsByStream => record.get("stream").and_then(|v| v.as_str()) == Some(key),
                Index::InstancesByStreamCount => {
                    record.get("streams").and_then(|v| v.as_u64()) == wanted_count
                }
            };
            if matches {
                results.push(value.value().to_vec());
            }
        }
        Ok(results)
    }

    fn query_prefix(&self, table: Table, prefix: &str) -> StoreResult<Vec<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table.definition()).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                results.push(value.value().to_vec());
            }
        }
        Ok(results)
    }

    fn transact_write(&self, write: WriteTransaction) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;

        // Phase one: evaluate every precondition against current state.
        // A single failure rejects the whole item set.
        for item in &write.items {
            let Some(condition) = item.op.condition() else {
                continue;
            };
            let current = {
                let table = txn
                    .open_table(item.table.definition())
                    .map_err(map_err!(Table))?;
                table
                    .get(item.op.key())
                    .map_err(map_err!(Read))?
                    .map(|guard| guard.value().to_vec())
            };
            let holds = match condition {
                Condition::VersionIs(expected) => match current {
                    Some(bytes) => stored_version(&bytes)?.as_deref() == Some(expected.as_str()),
                    None => false,
                },
            };
            if !holds {
                debug!(
                    table = item.table.name(),
                    key = item.op.key(),
                    client_token = %write.client_token,
                    "transaction condition failed"
                );
                txn.abort().map_err(map_err!(Transaction))?;
                return Err(StoreError::ConditionFailed {
                    table: item.table.name(),
                    key: item.op.key().to_string(),
                });
            }
        }

        // Phase two: apply every operation.
        for item in &write.items {
            let mut table = txn
                .open_table(item.table.definition())
                .map_err(map_err!(Table))?;
            match &item.op {
                TxnOp::Put { key, value, .. } => {
                    table
                        .insert(key.as_str(), value.as_slice())
                        .map_err(map_err!(Write))?;
                }
                TxnOp::Delete { key, .. } => {
                    table.remove(key.as_str()).map_err(map_err!(Write))?;
                }
            }
        }

        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            items = write.items.len(),
            client_token = %write.client_token,
            "transaction committed"
        );
        Ok(())
    }
}
