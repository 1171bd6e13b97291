//! Error types surfaced by the inventory engine

/// Field-level problems detected before any storage is touched. The whole
/// batch is rejected on the first bad line.
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("line {0}: category is required")]
    MissingCategory(usize),
    #[error("line {0}: item type is required")]
    MissingType(usize),
    #[error("line {index}: '{item_type}' requires a size while available")]
    MissingSize { index: usize, item_type: String },
    #[error("line {0}: quantity must be at least 1")]
    BadQuantity(usize),
}

/// Engine-level failures. Callers map these onto their transport; the
/// surrounding portal turns validation and vocabulary errors into 400s and
/// retryable ones into 500s.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("unrecognised uniform category '{0}'")]
    InvalidCategory(String),
    #[error("no inventory record for {category} / {item_type} (size {size})")]
    InventoryNotFound {
        category: String,
        item_type: String,
        size: String,
    },
    #[error(
        "insufficient stock for {item_type} (size {size}): requested {requested}, available {available}"
    )]
    InsufficientStock {
        item_type: String,
        size: String,
        requested: u32,
        available: u32,
    },
    #[error("a matching request for member {0} is already processing")]
    DuplicateRequest(String),
    #[error("inventory lookup exceeded its batch or time budget")]
    LookupBudget,
    #[error("stored record failed to decode: {0}")]
    Codec(String),
    #[error("storage failure: {0}")]
    Store(String),
}

impl EngineError {
    /// Whether a caller may safely retry the same request. A failed
    /// transaction rolls back every change, so retrying it is always safe.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::LookupBudget | EngineError::Store(_))
    }
}
