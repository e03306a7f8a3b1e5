/// Error taxonomy for the sidebar
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SidebarError {
    /// Tab URL is disallowed or the content script could not be injected.
    #[error("page info skipped for tab {tab_id}: {reason}")]
    ExtractionSkipped { tab_id: i32, reason: String },

    /// A message round-trip to an injected script failed.
    #[error("message delivery failed: {0}")]
    MessageDelivery(String),

    /// A persisted record had an unexpected shape.
    #[error("stored data is malformed: {0}")]
    StorageCorruption(String),

    /// A recorded tab handle no longer maps to a live tab.
    #[error("tab {tab_id} is no longer open")]
    StaleReference { tab_id: i32 },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SidebarError {
    fn from(err: serde_json::Error) -> Self {
        SidebarError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SidebarError>;
