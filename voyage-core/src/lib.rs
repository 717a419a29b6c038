pub mod accumulator;
pub mod conversation;
pub mod filter;
pub mod repository;
pub mod retry;

pub use accumulator::{merge_fragments, merge_raw, FilterDraft};
pub use filter::{FilterFragment, FilterSpec, REQUIRED_KEYS};
pub use retry::RetryPolicy;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Store unreachable, timed out or asked us to retry. Safe to retry.
    #[error("Transient store error: {0}")]
    TransientStore(String),
    #[error("Incomplete filter specification, missing: {}", .missing.join(", "))]
    IncompleteSpecification { missing: Vec<&'static str> },
    #[error("Malformed event: {0}")]
    MalformedEvent(String),
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Invalid page request: {0}")]
    InvalidPage(String),
    /// Store refused the operation for a reason retrying will not fix.
    #[error("Store rejected operation: {0}")]
    StoreRejected(String),
}

impl CoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::TransientStore(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
