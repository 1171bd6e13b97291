//! The consistency engine: diff old vs new holdings, compute the
//! restore/deduct plan, apply it as one atomic unit of work
//!
//! Restorations are applied before deductions so a pure size change (the
//! same physical unit reshelved then reissued) never spuriously reports
//! insufficient stock. The apply step runs inside a sled transaction that
//! re-reads every touched record, so two concurrent requests contending on
//! one record cannot both decrement a stale quantity: the losing closure
//! re-runs against the committed state.

use std::collections::BTreeMap;

use sled::transaction::{ConflictableTransactionError, TransactionError, abort};
use sled::{Transactional, Tree};
use tracing::warn;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::holdings::{HoldingStatus, MemberHoldings};
use crate::locate;
use crate::store;
use crate::vocab::{Category, NormalizedItem};

/// Whether inventory bookkeeping gaps abort the batch or soft-fail.
///
/// The combined create/update endpoints are lenient so a member's record of
/// physically-held items is never blocked by a missing or under-stocked
/// inventory row; the dedicated deduction endpoint is strict. This is a
/// documented trade-off, not an accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockPolicy {
    Strict,
    Lenient,
}

/// Per-line result of the inventory side-effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum DeductionOutcome {
    Applied,
    SkippedNotFound,
    SkippedInsufficient,
    Rejected,
}

/// One normalized line of either side of a holdings change.
#[derive(Debug, Clone)]
pub struct SideLine {
    pub item: NormalizedItem,
    pub size: Option<String>,
    pub quantity: u32,
    pub status: HoldingStatus,
}

/// Identity of one diffable line within a member's holdings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct HoldingKey {
    pub category: Category,
    pub item_type: String,
    pub size: Option<String>,
}

impl HoldingKey {
    fn of(line: &SideLine) -> Self {
        Self {
            category: line.item.category,
            item_type: line.item.item_type.clone(),
            size: line.size.clone(),
        }
    }
}

impl std::fmt::Display for HoldingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} / {} ({})",
            self.category.canonical_name(),
            self.item_type,
            self.size.as_deref().unwrap_or("no size")
        )
    }
}

struct SideEntry {
    item: NormalizedItem,
    quantity: u32,
    status: HoldingStatus,
}

// duplicate keys within one side sum their quantities; the last status wins
fn fold_side(lines: &[SideLine]) -> BTreeMap<HoldingKey, SideEntry> {
    let mut map: BTreeMap<HoldingKey, SideEntry> = BTreeMap::new();
    for line in lines {
        let key = HoldingKey::of(line);
        match map.get_mut(&key) {
            Some(entry) => {
                entry.quantity += line.quantity;
                entry.status = line.status;
            }
            None => {
                map.insert(
                    key,
                    SideEntry {
                        item: line.item.clone(),
                        quantity: line.quantity,
                        status: line.status,
                    },
                );
            }
        }
    }
    map
}

#[derive(Debug, Clone)]
struct PlannedMove {
    key: HoldingKey,
    record_key: Vec<u8>,
    amount: u32,
}

/// A computed change, ready for the transactional apply.
#[derive(Debug, Default)]
pub struct ChangePlan {
    restorations: Vec<PlannedMove>,
    deductions: Vec<PlannedMove>,
    /// Lines skipped at planning time, with why.
    pub skipped: Vec<(HoldingKey, DeductionOutcome)>,
}

/// Net movement applied to one inventory record.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StockMovement {
    pub category: String,
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    pub amount: u32,
    pub remaining: u32,
}

/// What one committed transaction did.
#[derive(Debug, Default)]
pub struct AppliedChange {
    pub restored: Vec<StockMovement>,
    pub deducted: Vec<StockMovement>,
    pub skipped: Vec<(HoldingKey, DeductionOutcome)>,
}

fn movement(planned: &PlannedMove, record: &crate::inventory::InventoryRecord) -> StockMovement {
    StockMovement {
        category: planned.key.category.canonical_name().to_string(),
        item_type: record.item_type.clone(),
        size: record.size.clone(),
        amount: planned.amount,
        remaining: record.quantity,
    }
}

/// Diff the two sides and locate every record the change will touch.
///
/// Restore when a key left the new side or decreased, gated on the OLD
/// status being Available; deduct when a key is new or increased, gated on
/// the NEW status being Available. NotAvailable and Missing lines never
/// touch inventory on either side: a status-only change moves no stock.
pub fn build_plan(
    inventory: &Tree,
    config: &EngineConfig,
    old_lines: &[SideLine],
    new_lines: &[SideLine],
    policy: StockPolicy,
) -> Result<ChangePlan, EngineError> {
    let old_side = fold_side(old_lines);
    let new_side = fold_side(new_lines);
    let mut plan = ChangePlan::default();

    let keys: std::collections::BTreeSet<&HoldingKey> =
        old_side.keys().chain(new_side.keys()).collect();

    for key in keys {
        let old = old_side.get(key);
        let new = new_side.get(key);

        let restore_amount = match (old, new) {
            (Some(o), _) if o.status != HoldingStatus::Available => 0,
            (Some(o), None) => o.quantity,
            (Some(o), Some(n)) => o.quantity.saturating_sub(n.quantity),
            (None, _) => 0,
        };
        let deduct_amount = match (old, new) {
            (_, Some(n)) if n.status != HoldingStatus::Available => 0,
            (None, Some(n)) => n.quantity,
            (Some(o), Some(n)) => n.quantity.saturating_sub(o.quantity),
            (_, None) => 0,
        };

        if let (Some(entry), true) = (old, restore_amount > 0) {
            match locate::locate(inventory, config, &entry.item, key.size.as_deref())? {
                Some(found) => plan.restorations.push(PlannedMove {
                    key: key.clone(),
                    record_key: found.key,
                    amount: restore_amount,
                }),
                None => {
                    // nothing to reshelve onto; the holdings change still goes
                    // through under either policy
                    warn!(%key, "restoration target not in inventory, skipping");
                    plan.skipped
                        .push((key.clone(), DeductionOutcome::SkippedNotFound));
                }
            }
        }

        if let (Some(entry), true) = (new, deduct_amount > 0) {
            match locate::locate(inventory, config, &entry.item, key.size.as_deref())? {
                Some(found) => plan.deductions.push(PlannedMove {
                    key: key.clone(),
                    record_key: found.key,
                    amount: deduct_amount,
                }),
                None => match policy {
                    StockPolicy::Strict => {
                        return Err(EngineError::InventoryNotFound {
                            category: key.category.canonical_name().to_string(),
                            item_type: key.item_type.clone(),
                            size: key.size.clone().unwrap_or_else(|| "no size".into()),
                        });
                    }
                    StockPolicy::Lenient => {
                        warn!(%key, "no inventory record, recording holding without deduction");
                        plan.skipped
                            .push((key.clone(), DeductionOutcome::SkippedNotFound));
                    }
                },
            }
        }
    }

    Ok(plan)
}

fn encode_abort<T>(value: &T) -> Result<Vec<u8>, ConflictableTransactionError<EngineError>>
where
    T: minicbor::Encode<()>,
{
    minicbor::to_vec(value)
        .map_err(|e| ConflictableTransactionError::Abort(EngineError::Codec(e.to_string())))
}

/// Apply a plan and (optionally) the member's updated holdings record in one
/// transaction: either every touched inventory record changes and the
/// holdings record is saved, or nothing changes.
pub fn apply_plan(
    inventory: &Tree,
    holdings: &Tree,
    plan: &ChangePlan,
    holdings_write: Option<&MemberHoldings>,
    policy: StockPolicy,
) -> Result<AppliedChange, EngineError> {
    let result = (inventory, holdings).transaction(|(inv, hol)| {
        let mut applied = AppliedChange::default();
        applied.skipped.extend(plan.skipped.iter().cloned());

        // restorations first; this ordering is observable
        for planned in &plan.restorations {
            match inv.get(planned.record_key.as_slice())? {
                Some(bytes) => {
                    let mut record = store::decode_record(&bytes)
                        .map_err(ConflictableTransactionError::Abort)?;
                    record.quantity = record.quantity.saturating_add(planned.amount);
                    inv.insert(planned.record_key.as_slice(), encode_abort(&record)?)?;
                    applied.restored.push(movement(planned, &record));
                }
                None => {
                    // vanished between plan and apply (administrative delete)
                    applied
                        .skipped
                        .push((planned.key.clone(), DeductionOutcome::SkippedNotFound));
                }
            }
        }

        for planned in &plan.deductions {
            let outcome = match inv.get(planned.record_key.as_slice())? {
                Some(bytes) => {
                    let mut record = store::decode_record(&bytes)
                        .map_err(ConflictableTransactionError::Abort)?;
                    if record.quantity < planned.amount {
                        match policy {
                            StockPolicy::Strict => DeductionOutcome::Rejected,
                            StockPolicy::Lenient => DeductionOutcome::SkippedInsufficient,
                        }
                    } else {
                        record.quantity -= planned.amount;
                        inv.insert(planned.record_key.as_slice(), encode_abort(&record)?)?;
                        applied.deducted.push(movement(planned, &record));
                        DeductionOutcome::Applied
                    }
                }
                None => match policy {
                    // vanished between plan and apply
                    StockPolicy::Strict => {
                        return abort(EngineError::InventoryNotFound {
                            category: planned.key.category.canonical_name().to_string(),
                            item_type: planned.key.item_type.clone(),
                            size: planned.key.size.clone().unwrap_or_else(|| "no size".into()),
                        });
                    }
                    StockPolicy::Lenient => DeductionOutcome::SkippedNotFound,
                },
            };

            if outcome == DeductionOutcome::Rejected {
                // abort the whole batch; nothing written in this closure
                // run survives
                let available = inv
                    .get(planned.record_key.as_slice())?
                    .and_then(|bytes| store::decode_record(&bytes).ok())
                    .map(|record| record.quantity)
                    .unwrap_or(0);
                return abort(EngineError::InsufficientStock {
                    item_type: planned.key.item_type.clone(),
                    size: planned.key.size.clone().unwrap_or_else(|| "no size".into()),
                    requested: planned.amount,
                    available,
                });
            }
            if outcome != DeductionOutcome::Applied {
                applied.skipped.push((planned.key.clone(), outcome));
            }
        }

        if let Some(record) = holdings_write {
            hol.insert(record.member_id.as_bytes(), encode_abort(record)?)?;
        }

        Ok(applied)
    });

    result.map_err(|e| match e {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => EngineError::Store(err.to_string()),
    })
}
