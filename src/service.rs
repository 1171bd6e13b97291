//! Service layer API for member holdings operations
use std::sync::Arc;

use chrono::Utc;
use sled::Tree;
use tracing::debug;

use crate::config::EngineConfig;
use crate::dedup::{Admission, RequestGuard, content_digest};
use crate::engine::{self, SideLine, StockMovement, StockPolicy};
use crate::error::ValidationError;
use crate::holdings::{
    HeldItem, HeldItemView, HoldingStatus, HoldingsView, MemberHoldings, TimeStamp,
};
use crate::locate;
use crate::size;
use crate::store;
use crate::vocab;

/// One line item as submitted by a member, before normalization.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct HeldItemRequest {
    pub category: String,
    #[serde(alias = "type")]
    pub item_type: String,
    #[serde(default)]
    pub size: Option<String>,
    /// Member-held physical items are quantity 1; omitted means 1.
    #[serde(default)]
    pub quantity: Option<u32>,
    /// Omitted means Available.
    #[serde(default)]
    pub status: Option<HoldingStatus>,
}

/// Receipt for the combined create/update endpoints. `warnings` carries the
/// soft-fail skips; the holdings record is saved regardless.
#[derive(Debug, serde::Serialize)]
pub struct HoldingsChangeReceipt {
    pub deduplicated: bool,
    pub restored: Vec<StockMovement>,
    pub deducted: Vec<StockMovement>,
    pub warnings: Vec<String>,
}

/// Receipt for the dedicated strict deduction endpoint.
#[derive(Debug, serde::Serialize)]
pub struct DeductionReceipt {
    pub restored: Vec<StockMovement>,
    pub deducted: Vec<StockMovement>,
}

enum WriteMode {
    Merge,
    Replace,
}

pub struct HoldingsService {
    instance: Arc<sled::Db>,
    inventory: Tree,
    holdings: Tree,
    config: EngineConfig,
    guard: RequestGuard,
}

impl HoldingsService {
    pub fn new(instance: Arc<sled::Db>) -> anyhow::Result<Self> {
        Self::with_config(instance, EngineConfig::default())
    }

    pub fn with_config(instance: Arc<sled::Db>, config: EngineConfig) -> anyhow::Result<Self> {
        let (inventory, holdings) = store::open_trees(&instance)?;
        let guard = RequestGuard::new(config.dedup_ttl, config.dedup_capacity);
        Ok(Self {
            instance,
            inventory,
            holdings,
            config,
            guard,
        })
    }

    /// The inventory tree, for the administrative stock API's record writes.
    pub fn inventory_tree(&self) -> &Tree {
        &self.inventory
    }

    /// Block until every committed change reached disk.
    pub fn flush(&self) -> anyhow::Result<()> {
        self.instance.flush()?;
        Ok(())
    }

    /// Fetch a member's current holdings, formatted with derived status,
    /// missing-count and the shared Shirt price.
    pub fn get_holdings(&self, member_id: &str) -> anyhow::Result<HoldingsView> {
        let record = store::load_holdings(&self.holdings, member_id)?
            .unwrap_or_else(|| MemberHoldings::new(member_id));

        let mut items = Vec::with_capacity(record.items.len());
        for item in &record.items {
            let normalized = vocab::normalize(item.category.canonical_name(), &item.item_type)?;
            let price = locate::shared_price(
                &self.inventory,
                &self.config,
                &normalized,
                item.size.as_deref(),
            )?;
            items.push(HeldItemView::from_item(item, price));
        }

        Ok(HoldingsView {
            member_id: record.member_id,
            items,
        })
    }

    /// Submit new or additional holdings: requested lines merge over the
    /// member's current items. Inventory bookkeeping gaps soft-fail.
    pub fn submit_holdings(
        &self,
        member_id: &str,
        lines: Vec<HeldItemRequest>,
    ) -> anyhow::Result<HoldingsChangeReceipt> {
        self.change_holdings(member_id, lines, WriteMode::Merge)
    }

    /// Replace the member's holdings with the requested lines, reconciling
    /// inventory against the diff. Inventory bookkeeping gaps soft-fail.
    pub fn replace_holdings(
        &self,
        member_id: &str,
        lines: Vec<HeldItemRequest>,
    ) -> anyhow::Result<HoldingsChangeReceipt> {
        self.change_holdings(member_id, lines, WriteMode::Replace)
    }

    fn change_holdings(
        &self,
        member_id: &str,
        lines: Vec<HeldItemRequest>,
        mode: WriteMode,
    ) -> anyhow::Result<HoldingsChangeReceipt> {
        // reject the whole batch before touching storage
        let requested = normalize_lines(&lines)?;

        let digest_lines: Vec<_> = requested
            .iter()
            .map(|line| (line.item.clone(), line.status, line.quantity))
            .collect();
        let ticket = match self.guard.admit(member_id, &content_digest(&digest_lines))? {
            Admission::Fresh(ticket) => ticket,
            Admission::Replay => {
                return Ok(HoldingsChangeReceipt {
                    deduplicated: true,
                    restored: Vec::new(),
                    deducted: Vec::new(),
                    warnings: Vec::new(),
                });
            }
        };

        match self.apply_change(member_id, &requested, mode) {
            Ok(receipt) => {
                self.guard.complete(&ticket);
                Ok(receipt)
            }
            Err(e) => {
                // let the member retry immediately after a failure
                self.guard.release(&ticket);
                Err(e)
            }
        }
    }

    fn apply_change(
        &self,
        member_id: &str,
        requested: &[SideLine],
        mode: WriteMode,
    ) -> anyhow::Result<HoldingsChangeReceipt> {
        let current = store::load_holdings(&self.holdings, member_id)?
            .unwrap_or_else(|| MemberHoldings::new(member_id));
        let old_side = side_lines(&current)?;

        let now = TimeStamp::new();
        let next = match mode {
            WriteMode::Merge => merge_items(current, requested, &now),
            WriteMode::Replace => replace_items(&current, member_id, requested, &now),
        };
        let new_side = side_lines(&next)?;

        let plan = engine::build_plan(
            &self.inventory,
            &self.config,
            &old_side,
            &new_side,
            StockPolicy::Lenient,
        )?;
        let applied = engine::apply_plan(
            &self.inventory,
            &self.holdings,
            &plan,
            Some(&next),
            StockPolicy::Lenient,
        )?;

        debug!(
            member_id,
            restored = applied.restored.len(),
            deducted = applied.deducted.len(),
            skipped = applied.skipped.len(),
            "holdings change committed"
        );

        Ok(HoldingsChangeReceipt {
            deduplicated: false,
            restored: applied.restored,
            deducted: applied.deducted,
            warnings: applied
                .skipped
                .iter()
                .map(|(key, outcome)| format!("{key}: {outcome:?}"))
                .collect(),
        })
    }

    /// The dedicated deduction endpoint: strict inventory reconciliation of
    /// `lines` against `old_lines` without touching any holdings record.
    /// A missing record or an uncoverable deduction aborts the whole batch.
    pub fn deduct_stock(
        &self,
        lines: Vec<HeldItemRequest>,
        old_lines: Vec<HeldItemRequest>,
    ) -> anyhow::Result<DeductionReceipt> {
        let new_side = normalize_lines(&lines)?;
        let old_side = normalize_lines(&old_lines)?;

        let plan = engine::build_plan(
            &self.inventory,
            &self.config,
            &old_side,
            &new_side,
            StockPolicy::Strict,
        )?;
        let applied = engine::apply_plan(
            &self.inventory,
            &self.holdings,
            &plan,
            None,
            StockPolicy::Strict,
        )?;

        Ok(DeductionReceipt {
            restored: applied.restored,
            deducted: applied.deducted,
        })
    }
}

/// Normalize and validate every requested line; the first bad line rejects
/// the batch.
fn normalize_lines(lines: &[HeldItemRequest]) -> anyhow::Result<Vec<SideLine>> {
    let mut out = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        if line.category.trim().is_empty() {
            return Err(ValidationError::MissingCategory(index).into());
        }
        if line.item_type.trim().is_empty() {
            return Err(ValidationError::MissingType(index).into());
        }
        let quantity = line.quantity.unwrap_or(1);
        if quantity == 0 {
            return Err(ValidationError::BadQuantity(index).into());
        }
        let status = line.status.unwrap_or(HoldingStatus::Available);

        let item = vocab::normalize(&line.category, &line.item_type)?;

        let size = if size::requires_size(&item) {
            line.size
                .as_deref()
                .filter(|s| !size::is_no_size(Some(s)))
                .map(|s| s.trim().to_string())
        } else {
            // accessories never carry a size, whatever the client sent
            None
        };
        if size.is_none() && size::requires_size(&item) && status == HoldingStatus::Available {
            return Err(ValidationError::MissingSize {
                index,
                item_type: item.item_type,
            }
            .into());
        }

        out.push(SideLine {
            item,
            size,
            quantity,
            status,
        });
    }
    Ok(out)
}

fn side_lines(record: &MemberHoldings) -> anyhow::Result<Vec<SideLine>> {
    record
        .items
        .iter()
        .map(|item| {
            let normalized = vocab::normalize(item.category.canonical_name(), &item.item_type)?;
            Ok(SideLine {
                item: normalized,
                size: item.size.clone(),
                quantity: item.quantity,
                status: item.effective_status(),
            })
        })
        .collect()
}

// merge semantics: an identical (category, type, size) triple updates the
// existing entry instead of duplicating it
fn merge_items(
    mut current: MemberHoldings,
    requested: &[SideLine],
    now: &TimeStamp<Utc>,
) -> MemberHoldings {
    for line in requested {
        match current.find_mut(line.item.category, &line.item.item_type, line.size.as_deref()) {
            Some(existing) => {
                existing.quantity = line.quantity;
                existing.apply_status(line.status, now);
            }
            None => current.items.push(HeldItem::new(
                line.item.category,
                line.item.item_type.clone(),
                line.size.clone(),
                line.quantity,
                line.status,
                now,
            )),
        }
    }
    current
}

// replace semantics: the requested lines become the whole collection, but a
// line matching a current item carries that item's history forward
fn replace_items(
    current: &MemberHoldings,
    member_id: &str,
    requested: &[SideLine],
    now: &TimeStamp<Utc>,
) -> MemberHoldings {
    let mut next = MemberHoldings::new(member_id);
    for line in requested {
        if let Some(existing) =
            next.find_mut(line.item.category, &line.item.item_type, line.size.as_deref())
        {
            existing.quantity = line.quantity;
            existing.apply_status(line.status, now);
            continue;
        }
        let carried = current.items.iter().find(|item| {
            item.category == line.item.category
                && item.item_type == line.item.item_type
                && item.size.as_deref() == line.size.as_deref()
        });
        match carried {
            Some(old) => {
                let mut item = old.clone();
                item.quantity = line.quantity;
                item.apply_status(line.status, now);
                next.items.push(item);
            }
            None => next.items.push(HeldItem::new(
                line.item.category,
                line.item.item_type.clone(),
                line.size.clone(),
                line.quantity,
                line.status,
                now,
            )),
        }
    }
    next
}
