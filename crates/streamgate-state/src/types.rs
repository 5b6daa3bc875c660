//! Record types for the streamgate allocation tables.
//!
//! One struct per table, JSON-serialized into redb's `&[u8]` value columns.
//! `version` fields are opaque tokens regenerated on every mutation and used
//! as optimistic-concurrency preconditions in multi-item transactions.

use serde::{Deserialize, Serialize};

/// Backend instance identifier.
pub type InstanceId = String;

/// Tenant identifier.
pub type ShopId = String;

/// An active assignment: a shop's stream bound to an instance and port.
///
/// Keyed by `shop_id`. At most one row exists per shop and per stream while
/// the assignment is live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShopRecord {
    pub shop_id: ShopId,
    pub stream: String,
    pub instance: InstanceId,
    pub port: u16,
    /// Optimistic-concurrency token; changes on every mutation.
    pub version: String,
}

/// Capacity ledger for a backend instance.
///
/// `streams` is the authoritative count of shop rows referencing this
/// instance and is only ever mutated inside an allocation/release
/// transaction guarded by `version`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceRecord {
    pub instance: InstanceId,
    pub streams: u8,
    pub version: String,
}

/// Uniqueness registry row for a stream name.
///
/// Exists iff a shop row references the stream; created and deleted in
/// lock-step with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamNameRecord {
    pub stream: String,
}

/// One row per (port, instance) pair currently serving traffic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstancePortRecord {
    pub port: u16,
    pub instance: InstanceId,
}

/// Static endpoint directory entry for an instance. Read-only to the
/// allocation engines; assumed pre-populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceIpRecord {
    pub instance: InstanceId,
    pub public_ip: String,
    pub private_ip: String,
}

impl ShopRecord {
    /// Key for the shops table.
    pub fn table_key(&self) -> String {
        self.shop_id.clone()
    }
}

impl InstanceRecord {
    /// Key for the instances table.
    pub fn table_key(&self) -> String {
        self.instance.clone()
    }
}

impl StreamNameRecord {
    /// Key for the stream names table.
    pub fn table_key(&self) -> String {
        self.stream.clone()
    }
}

impl InstancePortRecord {
    /// Composite key for the instance ports table: `{port}/{instance}`.
    pub fn table_key(&self) -> String {
        Self::key_for(self.port, &self.instance)
    }

    /// Build the composite key for a (port, instance) pair.
    pub fn key_for(port: u16, instance: &str) -> String {
        format!("{port}/{instance}")
    }

    /// Prefix matching every reservation row for a port.
    pub fn port_prefix(port: u16) -> String {
        format!("{port}/")
    }
}

impl InstanceIpRecord {
    /// Key for the instance endpoint table.
    pub fn table_key(&self) -> String {
        self.instance.clone()
    }
}
