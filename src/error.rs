use thiserror::Error;

use crate::construct::Thing;

#[derive(Error, Debug)]
pub enum SlotbaseError {
    #[error("Size exceeded: expected at most {expected}, given {given}")]
    SizeExceeded { expected: usize, given: usize },
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    #[error("Representation failed: {0}")]
    RepresentationFailed(String),
    #[error("Broken reference: {0}")]
    BrokenReference(String),
    #[error("Not implemented: {0}")]
    Unimplemented(String),
    #[error("Permission denied: '{user}' requires any of {required:?}")]
    PermissionDenied { user: String, required: Vec<String> },
    #[error("Duplicate path: {0}")]
    DuplicatePath(String),
    #[error("Unknown type: {0}")]
    UnknownType(String),
    #[error("Duplicate type: {0}")]
    DuplicateType(String),
    #[error("Unknown key: {0}")]
    UnknownKey(String),
    #[error("No {kind} with identity {id}")]
    NotFound { kind: &'static str, id: Thing },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Data corruption: {message}")]
    DataCorruption { message: String },
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, SlotbaseError>;

// Helper conversions
impl From<rusqlite::Error> for SlotbaseError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<serde_json::Error> for SlotbaseError {
    fn from(e: serde_json::Error) -> Self { Self::DataCorruption { message: e.to_string() } }
}
impl From<reqwest::Error> for SlotbaseError {
    fn from(e: reqwest::Error) -> Self { Self::Transport(e.to_string()) }
}
impl From<config::ConfigError> for SlotbaseError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl<T> From<std::sync::PoisonError<T>> for SlotbaseError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}
