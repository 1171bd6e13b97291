//! Inventory locator: resolve a canonical (category, type, size) to the one
//! record it names
//!
//! Fetches the requested category as one bounded key-range scan, then
//! filters by type using three strategies in order: canonical-form
//! equality, alias-variant equality (historical type renames), substring
//! containment as last resort. The surviving set is filtered by the size
//! resolver; the first candidate found by the ordered strategies wins.
//! Candidates are expected to be disjoint by construction of the canonical
//! vocabulary; duplicate inventory rows are a data-quality bug upstream and
//! first-match is the accepted weak guarantee there.

use std::time::Instant;

use sled::Tree;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::inventory::InventoryRecord;
use crate::size::{self, SizeClass};
use crate::store;
use crate::vocab::{self, NormalizedItem, fold};

/// A located record together with its storage key, so the transactional
/// apply can re-read it without repeating the scan.
#[derive(Debug, Clone)]
pub struct Located {
    pub key: Vec<u8>,
    pub record: InventoryRecord,
}

fn scan_category(
    inventory: &Tree,
    config: &EngineConfig,
    item: &NormalizedItem,
) -> Result<Vec<(Vec<u8>, InventoryRecord)>, EngineError> {
    let started = Instant::now();
    let mut records = Vec::new();

    for entry in inventory.scan_prefix(store::category_prefix(item.category)) {
        // fail fast with a retryable error instead of holding the request
        // open on a runaway range
        if records.len() >= config.locate_batch_limit
            || started.elapsed() > config.locate_time_budget
        {
            return Err(EngineError::LookupBudget);
        }
        let (key, value) = entry.map_err(|e| EngineError::Store(e.to_string()))?;
        records.push((key.to_vec(), store::decode_record(&value)?));
    }

    Ok(records)
}

/// Find the unique inventory record for a normalized item and size query.
pub fn locate(
    inventory: &Tree,
    config: &EngineConfig,
    item: &NormalizedItem,
    size_query: Option<&str>,
) -> Result<Option<Located>, EngineError> {
    let candidates = scan_category(inventory, config, item)?;
    let class = size::size_class(item);
    let wanted = fold(&item.item_type);

    // canonical-form equality first, then alias-variant equality to catch
    // historical type renames, then substring containment as last resort
    let exact = |rec: &InventoryRecord| fold(&rec.item_type) == wanted;
    let alias = |rec: &InventoryRecord| {
        vocab::canonical_type_key(rec.category, &rec.item_type) == wanted
    };
    let contains = |rec: &InventoryRecord| {
        let stored = fold(&rec.item_type);
        stored.contains(wanted.as_str()) || wanted.contains(stored.as_str())
    };
    let type_strategies: [&dyn Fn(&InventoryRecord) -> bool; 3] = [&exact, &alias, &contains];

    for strategy in type_strategies {
        for (key, record) in &candidates {
            if strategy(record) && size::matches(record.size.as_deref(), size_query, class) {
                return Ok(Some(Located {
                    key: key.clone(),
                    record: record.clone(),
                }));
            }
        }
    }

    debug!(
        category = item.category.canonical_name(),
        item_type = %item.item_type,
        size = size_query.unwrap_or("no size"),
        "no inventory record located"
    );
    Ok(None)
}

/// Price shared across every size of one (category, type) pair. The exact
/// size record wins; any priced sibling of the same type is the fallback.
pub fn shared_price(
    inventory: &Tree,
    config: &EngineConfig,
    item: &NormalizedItem,
    size_query: Option<&str>,
) -> Result<Option<u64>, EngineError> {
    if item.category != crate::vocab::Category::Shirt {
        return Ok(None);
    }
    if let Some(found) = locate(inventory, config, item, size_query)? {
        if found.record.price.is_some() {
            return Ok(found.record.price);
        }
    }
    let wanted = fold(&item.item_type);
    for (_, record) in scan_category(inventory, config, item)? {
        if record.price.is_some() && vocab::canonical_type_key(record.category, &record.item_type) == wanted
        {
            return Ok(record.price);
        }
    }
    Ok(None)
}
