//! streamgate-state: embedded keyed store for the streamgate allocator.
//!
//! Backed by [redb](https://docs.rs/redb), provides the record schema for
//! stream-to-instance assignments and a keyed store with conditional atomic
//! multi-item transactions.
//!
//! # Architecture
//!
//! Records are JSON-serialized into redb's `&[u8]` value columns across five
//! tables: shops, instances, stream names, instance ports, and the static
//! instance endpoint directory. The [`KeyedStore`] trait is the narrow seam
//! the allocation engines consume; cross-record consistency is enforced
//! solely by [`WriteTransaction`]s whose items carry per-record version
//! preconditions.
//!
//! [`RedbStore`] is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and safe for concurrent use from independent threads.

pub mod error;
pub mod store;
pub mod tables;
pub mod txn;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use store::{KeyedStore, RedbStore};
pub use tables::{Index, Table};
pub use txn::{Condition, TxnItem, TxnOp, WriteTransaction};
pub use types::*;
