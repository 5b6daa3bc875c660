//! Register: validation, least-loaded candidate search, and
//! commit-or-next-candidate.
//!
//! The search walks load tiers from idle upward and commits against the
//! first candidate whose conditional transaction lands. A lost race is not
//! an error: the loser simply moves on to the next candidate. Only when
//! every tier is exhausted does the call fail, with 503 if no
//! infrastructure error was seen along the way.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use streamgate_state::{
    Index, InstancePortRecord, InstanceRecord, KeyedStore, StoreError, Table,
};

use crate::engine::{Allocator, Endpoints, decode};
use crate::error::{AllocatorError, AllocatorResult};
use crate::txn::build_allocate;

impl<S: KeyedStore> Allocator<S> {
    /// Assign `stream`, owned by `shop_id`, to an instance with spare
    /// capacity that is not already bound to `port`.
    ///
    /// Returns the chosen instance's endpoints on success. Fails with a
    /// 400-class error when the shop, stream, or port is already taken,
    /// 500 on infrastructure or staleness trouble, and 503 when the full
    /// candidate search finds no instance to commit against.
    ///
    /// # Panics
    ///
    /// Aborts if more than `max_instances_per_port` distinct instances
    /// already hold a reservation for `port`: that invariant can only be
    /// breached by corrupted data, and guess-based repair would compound it.
    pub fn register(
        &self,
        shop_id: &str,
        stream: &str,
        port: u16,
    ) -> AllocatorResult<Endpoints> {
        if self.store.get_eventual(Table::Shops, shop_id)?.is_some() {
            return Err(AllocatorError::ShopInUse(shop_id.to_string()));
        }

        if self.store.get_eventual(Table::StreamNames, stream)?.is_some() {
            return Err(AllocatorError::StreamInUse(stream.to_string()));
        }

        let bound = self.instances_bound_to_port(port)?;
        let max_per_port = usize::from(self.config.max_instances_per_port);
        if bound.len() > max_per_port {
            // Invariant breach: only corrupted data can put more than the
            // bound on one port. Abort rather than guess at a repair.
            panic!(
                "more than {} instances {:?} using port {}",
                self.config.max_instances_per_port, bound, port
            );
        }
        if bound.len() == max_per_port {
            return Err(AllocatorError::PortExhausted(port));
        }

        // Least-loaded-first: walk the load tiers and take the first
        // candidate whose commit lands.
        let mut last_err: Option<StoreError> = None;
        for load in 0..self.config.max_streams_per_instance {
            let candidates = match self
                .store
                .query_index(Index::InstancesByStreamCount, &load.to_string())
            {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(load, %shop_id, %stream, port, error = %e, "tier query failed");
                    last_err = Some(e);
                    continue;
                }
            };

            for bytes in candidates {
                let candidate: InstanceRecord = decode(&bytes)?;
                if bound.contains(&candidate.instance) {
                    continue;
                }

                match self.try_commit(shop_id, stream, port, &candidate.instance) {
                    Ok(Some(endpoints)) => {
                        info!(
                            %shop_id,
                            %stream,
                            port,
                            instance = %candidate.instance,
                            "stream registered"
                        );
                        return Ok(endpoints);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(
                            load,
                            %shop_id,
                            %stream,
                            port,
                            instance = %candidate.instance,
                            error = %e,
                            "candidate failed"
                        );
                        last_err = Some(e);
                    }
                }
            }
        }

        if let Some(e) = last_err {
            return Err(e.into());
        }

        Err(AllocatorError::Exhausted {
            shop_id: shop_id.to_string(),
            stream: stream.to_string(),
            port,
        })
    }

    /// Distinct instances currently holding a reservation for `port`.
    fn instances_bound_to_port(&self, port: u16) -> AllocatorResult<HashSet<String>> {
        let rows = self
            .store
            .query_prefix(Table::InstancePorts, &InstancePortRecord::port_prefix(port))?;
        let mut bound = HashSet::new();
        for bytes in &rows {
            let row: InstancePortRecord = decode(bytes)?;
            bound.insert(row.instance);
        }
        Ok(bound)
    }

    /// Re-validate one candidate and attempt the commit.
    ///
    /// `Ok(None)` means the candidate was unusable or lost the race and the
    /// search should move on; errors are infrastructure failures the caller
    /// may surface after the search.
    fn try_commit(
        &self,
        shop_id: &str,
        stream: &str,
        port: u16,
        instance: &str,
    ) -> Result<Option<Endpoints>, StoreError> {
        // The tier index may be stale; the ledger row is authoritative.
        let record = match self.read_instance(instance)? {
            Some(record) => record,
            None => {
                warn!(%instance, "instance in tier index but absent from ledger");
                return Ok(None);
            }
        };
        if record.streams >= self.config.max_streams_per_instance {
            debug!(%instance, streams = record.streams, "candidate full on re-read");
            return Ok(None);
        }

        let endpoints = self.read_endpoints(instance)?.ok_or_else(|| {
            StoreError::Read(format!("endpoint directory entry for {instance} is absent"))
        })?;

        let txn = build_allocate(shop_id, stream, port, &record)?;
        match self.store.transact_write(txn) {
            Ok(()) => Ok(Some(endpoints)),
            Err(e) if e.is_condition_failed() => {
                debug!(%instance, "lost allocation race, moving to next candidate");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RacingStore, seeded_store};
    use streamgate_state::{RedbStore, TxnItem, WriteTransaction};

    #[test]
    fn lost_race_moves_to_the_next_candidate() {
        // First commit attempt loses its race; the second candidate lands.
        let store = RacingStore::new(seeded_store(), 1);
        let allocator = Allocator::with_defaults(store);

        let endpoints = allocator.register("shop0", "stream0", 11000);
        assert!(endpoints.is_ok(), "second candidate should commit: {endpoints:?}");
    }

    #[test]
    fn losing_every_race_reports_exhaustion_not_contention() {
        // Every candidate loses its race; no tier ever commits.
        let store = RacingStore::new(seeded_store(), 9);
        let allocator = Allocator::with_defaults(store);

        let err = allocator.register("shop0", "stream0", 11000).unwrap_err();
        assert!(matches!(err, AllocatorError::Exhausted { .. }));
        assert_eq!(err.status_code(), 503);
    }

    #[test]
    fn same_candidate_is_not_retried_within_a_call() {
        let store = RacingStore::new(seeded_store(), 1);
        let allocator = Allocator::with_defaults(store.clone());

        allocator.register("shop0", "stream0", 11000).unwrap();
        // One losing attempt plus one winning attempt, nothing replayed.
        assert_eq!(store.attempts(), 2);
    }

    #[test]
    #[should_panic(expected = "using port")]
    fn port_reservation_overrun_aborts() {
        let store = seeded_store();
        // Hand-corrupt the reservations: four distinct instances on one port.
        let items = (0..4)
            .map(|i| {
                let row = InstancePortRecord {
                    port: 11000,
                    instance: format!("instance{i}"),
                };
                TxnItem::put(
                    Table::InstancePorts,
                    row.table_key(),
                    serde_json::to_vec(&row).unwrap(),
                )
            })
            .collect();
        store
            .transact_write(WriteTransaction::new(items, "corrupt".to_string()))
            .unwrap();

        let allocator: Allocator<RedbStore> = Allocator::with_defaults(store);
        let _ = allocator.register("shop0", "stream0", 11000);
    }
}
