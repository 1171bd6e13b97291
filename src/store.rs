//! Sled tree layout and CBOR codec helpers
//!
//! Two trees: `inventory` keyed by the canonical `(category, type, size)`
//! triple so one category scans as one key range, and `holdings` keyed by
//! member id. Values are minicbor-encoded.

use sled::{Db, Tree};

use crate::error::EngineError;
use crate::holdings::MemberHoldings;
use crate::inventory::InventoryRecord;
use crate::vocab::{Category, fold};

pub const INVENTORY_TREE: &str = "inventory";
pub const HOLDINGS_TREE: &str = "holdings";

// unit separator keeps the segments unambiguous without escaping
const SEP: u8 = 0x1f;

pub fn open_trees(db: &Db) -> anyhow::Result<(Tree, Tree)> {
    let inventory = db.open_tree(INVENTORY_TREE)?;
    let holdings = db.open_tree(HOLDINGS_TREE)?;
    Ok((inventory, holdings))
}

/// Key prefix covering every record of one category.
pub fn category_prefix(category: Category) -> Vec<u8> {
    let mut key = category.key_tag().as_bytes().to_vec();
    key.push(SEP);
    key
}

/// Storage key for one `(category, type, size)` triple. The type segment is
/// folded so spelling drift inside a stored record never splits the range.
pub fn record_key(category: Category, item_type: &str, size: Option<&str>) -> Vec<u8> {
    let mut key = category_prefix(category);
    key.extend_from_slice(fold(item_type).as_bytes());
    key.push(SEP);
    key.extend_from_slice(size.map(str::trim).unwrap_or_default().as_bytes());
    key
}

pub fn decode_record(bytes: &[u8]) -> Result<InventoryRecord, EngineError> {
    minicbor::decode(bytes).map_err(|e| EngineError::Codec(e.to_string()))
}

pub fn decode_holdings(bytes: &[u8]) -> Result<MemberHoldings, EngineError> {
    minicbor::decode(bytes).map_err(|e| EngineError::Codec(e.to_string()))
}

/// Insert or overwrite an inventory record at its canonical key. This is the
/// administrative stock API's write path (and the tests' seeding path); the
/// engine itself only mutates quantities on existing records.
pub fn put_record(tree: &Tree, record: &InventoryRecord) -> anyhow::Result<Vec<u8>> {
    let key = record_key(record.category, &record.item_type, record.size.as_deref());
    tree.insert(key.as_slice(), minicbor::to_vec(record)?)?;
    Ok(key)
}

pub fn get_record(tree: &Tree, key: &[u8]) -> anyhow::Result<Option<InventoryRecord>> {
    match tree.get(key)? {
        Some(bytes) => Ok(Some(decode_record(&bytes)?)),
        None => Ok(None),
    }
}

pub fn load_holdings(tree: &Tree, member_id: &str) -> anyhow::Result<Option<MemberHoldings>> {
    match tree.get(member_id.as_bytes())? {
        Some(bytes) => Ok(Some(decode_holdings(&bytes)?)),
        None => Ok(None),
    }
}
