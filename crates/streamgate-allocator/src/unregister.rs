//! Unregister: stream lookup and single-shot release.
//!
//! Unlike register there is no candidate loop: exactly one record family
//! can release the stream, so a lost race is surfaced directly instead of
//! retried. Release failures are expected to be rare and masking them
//! would hide real contention.

use tracing::{info, warn};

use streamgate_state::{Index, KeyedStore, ShopRecord};

use crate::engine::{Allocator, decode};
use crate::error::{AllocatorError, AllocatorResult};
use crate::txn::build_release;

impl<S: KeyedStore> Allocator<S> {
    /// Tear down the assignment for `stream`, freeing its instance slot,
    /// port reservation, and shop/stream rows in one atomic transaction.
    pub fn unregister(&self, stream: &str) -> AllocatorResult<()> {
        let matches = self.store.query_index(Index::ShopsByStream, stream)?;
        if matches.is_empty() {
            return Err(AllocatorError::StreamUnknown(stream.to_string()));
        }
        if matches.len() > 1 {
            // Known data-integrity risk; the deletion path is tolerant
            // rather than fatal.
            warn!(%stream, matches = matches.len(), "multiple shop rows for one stream");
        }
        let indexed: ShopRecord = decode(&matches[0])?;

        // The index row may lag the table; the keyed row is authoritative.
        let shop = match self.read_shop(&indexed.shop_id)? {
            Some(shop) => shop,
            None => {
                return Err(AllocatorError::StaleRead(format!(
                    "shop {} vanished between index and read",
                    indexed.shop_id
                )));
            }
        };
        if shop.stream != stream {
            return Err(AllocatorError::StaleRead(format!(
                "stream {stream} may not have been consistently written yet"
            )));
        }

        let instance = self.read_instance(&shop.instance)?.ok_or_else(|| {
            AllocatorError::StaleRead(format!(
                "instance {} referenced by shop {} is absent",
                shop.instance, shop.shop_id
            ))
        })?;
        if instance.streams == 0 {
            return Err(AllocatorError::StaleRead(format!(
                "instance {} ledger is already at zero",
                instance.instance
            )));
        }

        let txn = build_release(&shop, &instance)?;
        match self.store.transact_write(txn) {
            Ok(()) => {
                info!(
                    %stream,
                    shop_id = %shop.shop_id,
                    instance = %shop.instance,
                    port = shop.port,
                    "stream unregistered"
                );
                Ok(())
            }
            Err(streamgate_state::StoreError::ConditionFailed { table, key }) => {
                Err(AllocatorError::Contention { table, key })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RacingStore, seeded_store};
    use streamgate_state::{InstanceRecord, KeyedStore, Table, TxnItem, WriteTransaction};

    #[test]
    fn lost_release_race_surfaces_as_contention() {
        let store = RacingStore::new(seeded_store(), 0);
        let allocator = crate::Allocator::with_defaults(store.clone());
        allocator.register("shop0", "stream0", 11000).unwrap();

        store.fail_next(1);
        let err = allocator.unregister("stream0").unwrap_err();
        assert!(matches!(err, AllocatorError::Contention { .. }));
        assert_eq!(err.status_code(), 500);

        // No retry happened: one register commit plus one release attempt.
        assert_eq!(store.attempts(), 2);
    }

    #[test]
    fn duplicate_shop_rows_release_the_first_match() {
        let store = seeded_store();
        let allocator = crate::Allocator::with_defaults(store.clone());
        allocator.register("shopA", "stream0", 11000).unwrap();

        // Hand-plant a second shop row claiming the same stream.
        let ghost = ShopRecord {
            shop_id: "shopB".to_string(),
            stream: "stream0".to_string(),
            instance: "instance1".to_string(),
            port: 11001,
            version: "ghost".to_string(),
        };
        store
            .transact_write(WriteTransaction::new(
                vec![TxnItem::put(
                    Table::Shops,
                    ghost.table_key(),
                    serde_json::to_vec(&ghost).unwrap(),
                )],
                "corrupt".to_string(),
            ))
            .unwrap();

        // Tolerant path: the first match (shopA, key-ordered) is released.
        allocator.unregister("stream0").unwrap();
        assert!(store.get_consistent(Table::Shops, "shopA").unwrap().is_none());
        assert!(store.get_consistent(Table::Shops, "shopB").unwrap().is_some());
    }

    #[test]
    fn zero_ledger_is_a_stale_read_not_an_underflow() {
        let store = seeded_store();
        let allocator = crate::Allocator::with_defaults(store.clone());
        allocator.register("shop0", "stream0", 11000).unwrap();

        // Force the referenced ledger back to zero behind the engine's back.
        let shop = allocator.read_shop("shop0").unwrap().unwrap();
        let ledger = InstanceRecord {
            instance: shop.instance.clone(),
            streams: 0,
            version: "reset".to_string(),
        };
        store
            .transact_write(WriteTransaction::new(
                vec![TxnItem::put(
                    Table::Instances,
                    ledger.table_key(),
                    serde_json::to_vec(&ledger).unwrap(),
                )],
                "corrupt".to_string(),
            ))
            .unwrap();

        let err = allocator.unregister("stream0").unwrap_err();
        assert!(matches!(err, AllocatorError::StaleRead(_)));
        assert_eq!(err.status_code(), 500);
    }
}
