//! Inventory stock records and derived stock status

use crate::utils;
use crate::vocab::Category;

/// Stock level bands derived from quantity, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    InStock,
}

/// `status` is a pure function of `quantity`.
pub fn derive_status(quantity: u32) -> StockStatus {
    match quantity {
        0 => StockStatus::OutOfStock,
        1..=10 => StockStatus::LowStock,
        _ => StockStatus::InStock,
    }
}

/// The stock ledger for one purchasable unit. `(category, item_type, size)`
/// uniquely identifies a record; the storage key is built from exactly that
/// triple. Created and deleted only by the administrative stock API; the
/// engine mutates `quantity` alone.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct InventoryRecord {
    #[n(0)]
    pub id: String, // uuid7, bech32-encoded with the inv_ hrp
    #[n(1)]
    pub category: Category,
    #[n(2)]
    pub item_type: String, // canonical
    #[n(3)]
    pub size: Option<String>,
    #[n(4)]
    pub quantity: u32,
    #[n(5)]
    pub price: Option<u64>, // sen; only meaningful for the Shirt category
    #[n(6)]
    pub image: Option<String>, // shared media, keyed by (category, type)
    #[n(7)]
    pub size_chart: Option<String>,
}

impl InventoryRecord {
    pub fn new(
        category: Category,
        item_type: impl Into<String>,
        size: Option<&str>,
        quantity: u32,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            id: utils::new_uuid_to_bech32("inv_")?,
            category,
            item_type: item_type.into(),
            size: size.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            quantity,
            price: None,
            image: None,
            size_chart: None,
        })
    }

    pub fn with_price(mut self, price: u64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn status(&self) -> StockStatus {
        derive_status(self.quantity)
    }
}
