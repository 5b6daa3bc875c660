//! Shared fixtures for engine unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use streamgate_state::{
    Index, InstanceIpRecord, InstanceRecord, KeyedStore, RedbStore, StoreError, StoreResult,
    Table, TxnItem, WriteTransaction,
};

/// Fresh in-memory store with three idle instances and their endpoint rows.
pub(crate) fn seeded_store() -> RedbStore {
    let store = RedbStore::open_in_memory().unwrap();
    let mut items = Vec::new();
    for (name, public_ip, private_ip) in [
        ("instance0", "189.189.189.191", "10.1.1.1"),
        ("instance1", "189.189.189.189", "10.1.1.3"),
        ("instance2", "189.189.189.190", "10.1.1.2"),
    ] {
        let ledger = InstanceRecord {
            instance: name.to_string(),
            streams: 0,
            version: "seed-version".to_string(),
        };
        items.push(TxnItem::put(
            Table::Instances,
            ledger.table_key(),
            serde_json::to_vec(&ledger).unwrap(),
        ));
        let endpoint = InstanceIpRecord {
            instance: name.to_string(),
            public_ip: public_ip.to_string(),
            private_ip: private_ip.to_string(),
        };
        items.push(TxnItem::put(
            Table::InstanceIps,
            endpoint.table_key(),
            serde_json::to_vec(&endpoint).unwrap(),
        ));
    }
    store
        .transact_write(WriteTransaction::new(items, "seed".to_string()))
        .unwrap();
    store
}

/// Store wrapper that makes the next `n` transactions lose their
/// optimistic-concurrency race, for exercising the contention paths.
#[derive(Clone)]
pub(crate) struct RacingStore {
    inner: RedbStore,
    fail_remaining: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl RacingStore {
    pub(crate) fn new(inner: RedbStore, fail_next: usize) -> Self {
        Self {
            inner,
            fail_remaining: Arc::new(AtomicUsize::new(fail_next)),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make the next `n` transactions fail their condition check.
    pub(crate) fn fail_next(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Number of transactions attempted through this wrapper.
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl KeyedStore for RacingStore {
    fn get_eventual(&self, table: Table, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get_eventual(table, key)
    }

    fn get_consistent(&self, table: Table, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.inner.get_consistent(table, key)
    }

    fn query_index(&self, index: Index, key: &str) -> StoreResult<Vec<Vec<u8>>> {
        self.inner.query_index(index, key)
    }

    fn query_prefix(&self, table: Table, prefix: &str) -> StoreResult<Vec<Vec<u8>>> {
        self.inner.query_prefix(table, prefix)
    }

    fn transact_write(&self, txn: WriteTransaction) -> StoreResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
            let item = &txn.items[0];
            return Err(StoreError::ConditionFailed {
                table: item.table.name(),
                key: item.op.key().to_string(),
            });
        }
        self.inner.transact_write(txn)
    }
}
