//! Allocator error taxonomy and status-code mapping.

use streamgate_state::StoreError;
use thiserror::Error;

/// Result type alias for allocator operations.
pub type AllocatorResult<T> = Result<T, AllocatorError>;

/// Errors surfaced by the register/unregister engines.
///
/// Each variant maps onto an HTTP-like status code via
/// [`status_code`](AllocatorError::status_code): validation conflicts are
/// 400, infrastructure and staleness failures are 500, and capacity
/// exhaustion is 503 so callers can tell "try elsewhere" apart from "fix
/// your request" and "backend broke".
#[derive(Debug, Error)]
pub enum AllocatorError {
    #[error("shop {0} in use")]
    ShopInUse(String),

    #[error("stream {0} in use")]
    StreamInUse(String),

    #[error("port {0} in use")]
    PortExhausted(u16),

    #[error("stream {0} does not exist")]
    StreamUnknown(String),

    /// An index read and the authoritative record disagree; the caller's
    /// view was stale. Not retried here.
    #[error("stale read: {0}")]
    StaleRead(String),

    /// A conditional transaction lost an optimistic-concurrency race.
    #[error("lost write race on {table}/{key}")]
    Contention { table: &'static str, key: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("config error: {0}")]
    Config(String),

    /// No eligible instance remained after the full candidate search.
    #[error("unable to allocate for {shop_id}, {stream} and {port}")]
    Exhausted {
        shop_id: String,
        stream: String,
        port: u16,
    },
}

impl AllocatorError {
    /// HTTP-like status code for this error. Success is 200 by convention.
    pub fn status_code(&self) -> u16 {
        match self {
            AllocatorError::ShopInUse(_)
            | AllocatorError::StreamInUse(_)
            | AllocatorError::PortExhausted(_)
            | AllocatorError::StreamUnknown(_) => 400,
            AllocatorError::StaleRead(_)
            | AllocatorError::Contention { .. }
            | AllocatorError::Store(_)
            | AllocatorError::Config(_) => 500,
            AllocatorError::Exhausted { .. } => 503,
        }
    }
}
