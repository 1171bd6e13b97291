//! Member holdings, the per-item status state machine and read-side views

use chrono::{DateTime, TimeZone, Utc};

use crate::vocab::Category;

/// Availability of one held item. Transitions are driven by the status the
/// member supplies with each submission; there is no independent trigger.
#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum HoldingStatus {
    #[n(0)]
    Available,
    #[n(1)]
    NotAvailable,
    #[n(2)]
    Missing,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(TimeStamp)
            .unwrap_or_else(Self::new)
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// One item a member has been issued or has recorded holding.
///
/// `status` is optional in storage: records written before status tracking
/// existed carry none, and the healing rule in [`HeldItem::effective_status`]
/// applies on read. `missing_count` is monotonically non-decreasing.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct HeldItem {
    #[n(0)]
    pub category: Category,
    #[n(1)]
    pub item_type: String, // canonical
    #[n(2)]
    pub size: Option<String>, // trimmed; None for accessories
    #[n(3)]
    pub quantity: u32,
    #[n(4)]
    pub status: Option<HoldingStatus>,
    #[n(5)]
    pub missing_count: u32,
    #[n(6)]
    pub received_date: Option<TimeStamp<Utc>>,
}

impl HeldItem {
    pub fn new(
        category: Category,
        item_type: String,
        size: Option<String>,
        quantity: u32,
        status: HoldingStatus,
        now: &TimeStamp<Utc>,
    ) -> Self {
        let mut item = Self {
            category,
            item_type,
            size,
            quantity,
            status: None,
            missing_count: 0,
            received_date: None,
        };
        item.apply_status(status, now);
        item
    }

    /// Healing rule: a record with no stored status but a missing history
    /// reads back as Missing; everything else defaults to Available.
    pub fn effective_status(&self) -> HoldingStatus {
        match self.status {
            Some(status) => status,
            None if self.missing_count > 0 => HoldingStatus::Missing,
            None => HoldingStatus::Available,
        }
    }

    /// Drive the state machine with a member-supplied status.
    ///
    /// Entering Missing bumps `missing_count` (minimum 1, even when the item
    /// is created straight into Missing). Leaving Missing preserves the
    /// count so a later relapse re-increments correctly. `received_date` is
    /// set only while Available and only once, and is dropped on any
    /// transition away from Available.
    pub fn apply_status(&mut self, status: HoldingStatus, now: &TimeStamp<Utc>) {
        let was = self.effective_status();
        match status {
            HoldingStatus::Missing => {
                if was != HoldingStatus::Missing || self.missing_count == 0 {
                    self.missing_count += 1;
                }
                self.received_date = None;
            }
            HoldingStatus::Available => {
                if self.received_date.is_none() {
                    self.received_date = Some(now.clone());
                }
            }
            HoldingStatus::NotAvailable => {
                self.received_date = None;
            }
        }
        self.status = Some(status);
    }
}

/// One record per member, owning the ordered held-item collection.
/// `(category, item_type, size)` is de-duplicated within a record: a
/// re-submission of an identical triple updates the existing entry.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Default)]
pub struct MemberHoldings {
    #[n(0)]
    pub member_id: String,
    #[n(1)]
    pub items: Vec<HeldItem>,
}

impl MemberHoldings {
    pub fn new(member_id: impl Into<String>) -> Self {
        Self {
            member_id: member_id.into(),
            items: Vec::new(),
        }
    }

    pub fn find_mut(
        &mut self,
        category: Category,
        item_type: &str,
        size: Option<&str>,
    ) -> Option<&mut HeldItem> {
        self.items.iter_mut().find(|item| {
            item.category == category
                && item.item_type == item_type
                && item.size.as_deref() == size
        })
    }
}

/// Read-side projection of one held item, handed to the surrounding CRUD
/// layer for serialization.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HeldItemView {
    pub category: String,
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    pub quantity: u32,
    pub status: HoldingStatus,
    /// Present once the item has ever been Missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_count: Option<u32>,
    /// Present while Available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received_date: Option<String>,
    /// Present only for Shirt-category items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HoldingsView {
    pub member_id: String,
    pub items: Vec<HeldItemView>,
}

impl HeldItemView {
    pub fn from_item(item: &HeldItem, price: Option<u64>) -> Self {
        let status = item.effective_status();
        Self {
            category: item.category.canonical_name().to_string(),
            item_type: item.item_type.clone(),
            size: item.size.clone(),
            quantity: item.quantity,
            status,
            missing_count: (item.missing_count > 0).then_some(item.missing_count),
            received_date: item
                .received_date
                .as_ref()
                .map(|ts| ts.to_datetime_utc().to_rfc3339()),
            price,
        }
    }
}
