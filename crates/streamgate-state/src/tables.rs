//! redb table definitions for the streamgate keyed store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized records).
//! The instance ports table uses composite `{port}/{instance}` keys so a
//! `{port}/` prefix scan enumerates the reservations for a port.

use redb::TableDefinition;

/// Active shop assignments keyed by `{shop_id}`.
pub const SHOPS: TableDefinition<&str, &[u8]> = TableDefinition::new("shops");

/// Instance capacity ledger keyed by `{instance}`.
pub const INSTANCES: TableDefinition<&str, &[u8]> = TableDefinition::new("instances");

/// Stream uniqueness registry keyed by `{stream}`.
pub const STREAM_NAMES: TableDefinition<&str, &[u8]> = TableDefinition::new("stream_names");

/// Port reservations keyed by `{port}/{instance}`.
pub const INSTANCE_PORTS: TableDefinition<&str, &[u8]> = TableDefinition::new("instance_ports");

/// Static endpoint directory keyed by `{instance}`.
pub const INSTANCE_IPS: TableDefinition<&str, &[u8]> = TableDefinition::new("instance_ips");

/// Names the tables for store requests (reads, queries, transaction items).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Shops,
    Instances,
    StreamNames,
    InstancePorts,
    InstanceIps,
}

impl Table {
    /// The redb definition backing this table.
    pub fn definition(self) -> TableDefinition<'static, &'static str, &'static [u8]> {
        match self {
            Table::Shops => SHOPS,
            Table::Instances => INSTANCES,
            Table::StreamNames => STREAM_NAMES,
            Table::InstancePorts => INSTANCE_PORTS,
            Table::InstanceIps => INSTANCE_IPS,
        }
    }

    /// Table name, for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Table::Shops => "shops",
            Table::Instances => "instances",
            Table::StreamNames => "stream_names",
            Table::InstancePorts => "instance_ports",
            Table::InstanceIps => "instance_ips",
        }
    }
}

/// Secondary-key lookup paths over the base tables.
///
/// Query results may lag behind `get_consistent`; callers that commit
/// against a queried row must re-validate it first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    /// Shop rows whose `stream` field matches the key.
    ShopsByStream,
    /// Instance rows whose `streams` count equals the numeric key.
    InstancesByStreamCount,
}
