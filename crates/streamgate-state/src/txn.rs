//! Multi-item write transactions with per-item preconditions.
//!
//! A [`WriteTransaction`] is applied all-or-nothing: every item's condition
//! is evaluated against current state first, and only if all hold are the
//! puts and deletes applied. A failed condition rejects the entire set.

use crate::tables::Table;

/// Precondition attached to a single transaction item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The stored record must exist and its `version` field must equal the
    /// given token.
    VersionIs(String),
}

/// A single put or delete within a transaction.
#[derive(Debug, Clone)]
pub enum TxnOp {
    Put {
        key: String,
        value: Vec<u8>,
        condition: Option<Condition>,
    },
    Delete {
        key: String,
        condition: Option<Condition>,
    },
}

impl TxnOp {
    /// Key this operation targets.
    pub fn key(&self) -> &str {
        match self {
            TxnOp::Put { key, .. } | TxnOp::Delete { key, .. } => key,
        }
    }

    /// Precondition, if any.
    pub fn condition(&self) -> Option<&Condition> {
        match self {
            TxnOp::Put { condition, .. } | TxnOp::Delete { condition, .. } => condition.as_ref(),
        }
    }
}

/// One item of a write transaction: an operation against a table.
#[derive(Debug, Clone)]
pub struct TxnItem {
    pub table: Table,
    pub op: TxnOp,
}

impl TxnItem {
    /// Unconditional put of a JSON-serialized record.
    pub fn put(table: Table, key: String, value: Vec<u8>) -> Self {
        Self {
            table,
            op: TxnOp::Put {
                key,
                value,
                condition: None,
            },
        }
    }

    /// Put guarded by a version-token precondition on the existing record.
    pub fn put_if_version(table: Table, key: String, value: Vec<u8>, version: String) -> Self {
        Self {
            table,
            op: TxnOp::Put {
                key,
                value,
                condition: Some(Condition::VersionIs(version)),
            },
        }
    }

    /// Unconditional delete.
    pub fn delete(table: Table, key: String) -> Self {
        Self {
            table,
            op: TxnOp::Delete {
                key,
                condition: None,
            },
        }
    }

    /// Delete guarded by a version-token precondition.
    pub fn delete_if_version(table: Table, key: String, version: String) -> Self {
        Self {
            table,
            op: TxnOp::Delete {
                key,
                condition: Some(Condition::VersionIs(version)),
            },
        }
    }
}

/// An atomic multi-item write.
///
/// `client_token` is an opaque idempotency hint carried for diagnostics; it
/// is not guaranteed unique across all time and must not be relied upon for
/// strict idempotency.
#[derive(Debug, Clone)]
pub struct WriteTransaction {
    pub items: Vec<TxnItem>,
    pub client_token: String,
}

impl WriteTransaction {
    pub fn new(items: Vec<TxnItem>, client_token: String) -> Self {
        Self {
            items,
            client_token,
        }
    }
}
