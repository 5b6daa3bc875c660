//! Builds the 4-item atomic transactions that commit or reverse an
//! assignment.
//!
//! Every commit touches the same record family: the instance capacity
//! ledger (guarded by its version token), the port reservation, the stream
//! uniqueness row, and the shop assignment. The store applies all four
//! items or none.

use uuid::Uuid;

use streamgate_state::{
    InstancePortRecord, InstanceRecord, ShopRecord, StoreError, StoreResult, StreamNameRecord,
    Table, TxnItem, WriteTransaction,
};

/// Build the allocation transaction: increment the instance's stream count
/// and create the port reservation, stream name, and shop rows.
///
/// The same freshly generated version token labels the instance and shop
/// rows and doubles as the transaction's client token. Equality of the
/// token across tables carries no semantic guarantee; do not rely on it.
pub fn build_allocate(
    shop_id: &str,
    stream: &str,
    port: u16,
    instance: &InstanceRecord,
) -> StoreResult<WriteTransaction> {
    let new_version = Uuid::new_v4().to_string();

    let bumped = InstanceRecord {
        instance: instance.instance.clone(),
        streams: instance.streams + 1,
        version: new_version.clone(),
    };
    let port_row = InstancePortRecord {
        port,
        instance: instance.instance.clone(),
    };
    let stream_row = StreamNameRecord {
        stream: stream.to_string(),
    };
    let shop_row = ShopRecord {
        shop_id: shop_id.to_string(),
        stream: stream.to_string(),
        instance: instance.instance.clone(),
        port,
        version: new_version.clone(),
    };

    let items = vec![
        TxnItem::put_if_version(
            Table::Instances,
            bumped.table_key(),
            to_json(&bumped)?,
            instance.version.clone(),
        ),
        TxnItem::put(Table::InstancePorts, port_row.table_key(), to_json(&port_row)?),
        TxnItem::put(Table::StreamNames, stream_row.table_key(), to_json(&stream_row)?),
        // Shop uniqueness was pre-checked by the engine; the put itself is
        // unconditional.
        TxnItem::put(Table::Shops, shop_row.table_key(), to_json(&shop_row)?),
    ];

    Ok(WriteTransaction::new(items, new_version))
}

/// Build the release transaction: decrement the instance's stream count and
/// delete the port reservation, stream name, and shop rows.
///
/// The shop delete is guarded by the shop row's version token so a
/// concurrently replaced assignment is never torn down by a stale caller.
pub fn build_release(
    shop: &ShopRecord,
    instance: &InstanceRecord,
) -> StoreResult<WriteTransaction> {
    let new_version = Uuid::new_v4().to_string();

    let dropped = InstanceRecord {
        instance: instance.instance.clone(),
        streams: instance.streams - 1,
        version: new_version.clone(),
    };

    let items = vec![
        TxnItem::put_if_version(
            Table::Instances,
            dropped.table_key(),
            to_json(&dropped)?,
            instance.version.clone(),
        ),
        TxnItem::delete(
            Table::InstancePorts,
            InstancePortRecord::key_for(shop.port, &shop.instance),
        ),
        TxnItem::delete(Table::StreamNames, shop.stream.clone()),
        TxnItem::delete_if_version(Table::Shops, shop.table_key(), shop.version.clone()),
    ];

    Ok(WriteTransaction::new(items, new_version))
}

fn to_json<T: serde::Serialize>(record: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| StoreError::Serialize(e.to_string()))
}
