use std::io;

use thiserror::Error;

use crate::cursor::CursorState;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("RowTypes not of same shape: {left} ({left_fields}), {right} ({right_fields})")]
    ShapeMismatch {
        left: String,
        left_fields: String,
        right: String,
        right_fields: String,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{cursor}: {operation}() called while {state}")]
    Lifecycle {
        cursor: &'static str,
        operation: &'static str,
        state: CursorState,
    },
    #[error("{cursor}: no bindings delivered before use")]
    NoBindings { cursor: &'static str },
    #[error("{cursor}: bindings out of sync, expected {expected} but a child returned {found}")]
    BindingsMismatch {
        cursor: &'static str,
        expected: String,
        found: String,
    },
    #[error("{row}: expected row type {expected} but was {actual}")]
    WrongRowType {
        row: String,
        expected: String,
        actual: String,
    },
    #[error("binding {index} not set at depth {depth}")]
    UnboundSlot { index: usize, depth: u32 },
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error("cannot write configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
    #[error("cannot serialize: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Errors raised because the executor or a plan misused the cursor
    /// contract. These abort the whole cursor tree and are never retried.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Error::Lifecycle { .. }
                | Error::NoBindings { .. }
                | Error::BindingsMismatch { .. }
                | Error::WrongRowType { .. }
        )
    }
}
