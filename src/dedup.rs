//! Process-local idempotency guard for holdings submissions
//!
//! Network retries arrive as near-identical requests within seconds of each
//! other; without suppression each one would deduct stock again. The guard
//! keys a short-lived cache by (member, content hash) where the hash ignores
//! size, so a retry with a corrected size still counts as the same logical
//! submission attempt. This is a best-effort single-process optimization,
//! not a distributed lock; multi-instance deployments get no cross-instance
//! guarantee from it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::EngineError;
use crate::holdings::HoldingStatus;
use crate::vocab::NormalizedItem;

// what the content hash covers: everything except size
#[derive(minicbor::Encode)]
struct DigestLine<'a> {
    #[n(0)]
    category: &'a str,
    #[n(1)]
    item_type: &'a str,
    #[n(2)]
    status: u8,
    #[n(3)]
    quantity: u32,
}

/// Content hash of a normalized request, size excluded.
pub fn content_digest(lines: &[(NormalizedItem, HoldingStatus, u32)]) -> String {
    let mut encoded: Vec<DigestLine> = lines
        .iter()
        .map(|(item, status, quantity)| DigestLine {
            category: item.category.canonical_name(),
            item_type: &item.item_type,
            status: *status as u8,
            quantity: *quantity,
        })
        .collect();
    // submission order is not part of the identity
    encoded.sort_by(|a, b| (a.category, a.item_type).cmp(&(b.category, b.item_type)));

    // the cbor encoding of a borrowed struct is infallible
    let bytes = minicbor::to_vec(&encoded).unwrap_or_default();
    sha256::digest(&bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardState {
    Processing,
    Completed,
}

struct GuardEntry {
    state: GuardState,
    at: Instant,
}

/// Outcome of admitting a request.
#[derive(Debug)]
pub enum Admission {
    /// Not seen recently; process it and then call `complete` or `release`.
    Fresh(GuardTicket),
    /// Identical to a recently completed request: acknowledge without
    /// reprocessing.
    Replay,
}

/// Handle for settling an admitted request.
#[derive(Debug, Clone)]
pub struct GuardTicket {
    member_id: String,
    digest: String,
}

pub struct RequestGuard {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<(String, String), GuardEntry>>,
}

impl RequestGuard {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Admit a request, rejecting an exact repeat that is still processing.
    pub fn admit(&self, member_id: &str, digest: &str) -> Result<Admission, EngineError> {
        let mut entries = self.entries.lock().expect("guard mutex poisoned");

        let now = Instant::now();
        if entries.len() >= self.capacity {
            entries.retain(|_, entry| now.duration_since(entry.at) < self.ttl);
        }

        let key = (member_id.to_string(), digest.to_string());
        if let Some(entry) = entries.get(&key) {
            if now.duration_since(entry.at) < self.ttl {
                return match entry.state {
                    GuardState::Processing => {
                        debug!(member_id, "rejecting duplicate in-flight request");
                        Err(EngineError::DuplicateRequest(member_id.to_string()))
                    }
                    GuardState::Completed => {
                        debug!(member_id, "acknowledging replay of completed request");
                        Ok(Admission::Replay)
                    }
                };
            }
        }

        entries.insert(
            key,
            GuardEntry {
                state: GuardState::Processing,
                at: now,
            },
        );
        Ok(Admission::Fresh(GuardTicket {
            member_id: member_id.to_string(),
            digest: digest.to_string(),
        }))
    }

    /// Mark an admitted request as done, starting its replay window.
    pub fn complete(&self, ticket: &GuardTicket) {
        let mut entries = self.entries.lock().expect("guard mutex poisoned");
        entries.insert(
            (ticket.member_id.clone(), ticket.digest.clone()),
            GuardEntry {
                state: GuardState::Completed,
                at: Instant::now(),
            },
        );
    }

    /// Drop a failed request so the member can retry immediately.
    pub fn release(&self, ticket: &GuardTicket) {
        let mut entries = self.entries.lock().expect("guard mutex poisoned");
        entries.remove(&(ticket.member_id.clone(), ticket.digest.clone()));
    }
}
