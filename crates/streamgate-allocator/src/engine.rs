//! The allocator engine: shared state and record access helpers.
//!
//! `Allocator` holds only a store handle and the capacity bounds, with no
//! in-process locks and no shared mutable memory. All serialization between
//! concurrent callers (threads or processes) comes from the store's
//! conditional transactions, so the engine is safe for arbitrary concurrent
//! invocation.

use serde::de::DeserializeOwned;

use streamgate_state::{
    InstanceIpRecord, InstanceRecord, KeyedStore, ShopRecord, StoreError, StoreResult, Table,
};

use crate::config::AllocatorConfig;

/// Public and private addresses of the instance an assignment landed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub public_ip: String,
    pub private_ip: String,
}

/// Stream-to-instance allocation engine over a keyed store.
#[derive(Clone)]
pub struct Allocator<S> {
    pub(crate) store: S,
    pub(crate) config: AllocatorConfig,
}

impl<S: KeyedStore> Allocator<S> {
    /// Create an allocator over the given store with the given bounds.
    pub fn new(store: S, config: AllocatorConfig) -> Self {
        Self { store, config }
    }

    /// Create an allocator with the default 3/3 bounds.
    pub fn with_defaults(store: S) -> Self {
        Self::new(store, AllocatorConfig::default())
    }

    /// The configured capacity bounds.
    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    /// Strongly consistent read of an instance's capacity ledger.
    pub(crate) fn read_instance(&self, instance: &str) -> StoreResult<Option<InstanceRecord>> {
        match self.store.get_consistent(Table::Instances, instance)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Strongly consistent read of a shop assignment row.
    pub(crate) fn read_shop(&self, shop_id: &str) -> StoreResult<Option<ShopRecord>> {
        match self.store.get_consistent(Table::Shops, shop_id)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Look up an instance's static endpoint directory entry.
    pub(crate) fn read_endpoints(&self, instance: &str) -> StoreResult<Option<Endpoints>> {
        match self.store.get_consistent(Table::InstanceIps, instance)? {
            Some(bytes) => {
                let record: InstanceIpRecord = decode(&bytes)?;
                Ok(Some(Endpoints {
                    public_ip: record.public_ip,
                    private_ip: record.private_ip,
                }))
            }
            None => Ok(None),
        }
    }
}

/// Decode a stored JSON record.
pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Deserialize(e.to_string()))
}
