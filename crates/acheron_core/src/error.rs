//! Error types for the sequencer core.

use thiserror::Error;

use crate::types::{ControlId, ControlKind};

/// Errors raised while building or resolving controls.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlError {
    #[error("control {0} is not registered")]
    UnknownControl(ControlId),
    #[error("control `{key}` has value source {source_kind} but no inherit path")]
    MissingInherit { key: String, source_kind: &'static str },
    #[error("malformed inherit path `{0}` (expected `global.<key>` or `layer.<key>`)")]
    MalformedInherit(String),
    #[error("inherit path `{0}` does not resolve to a control")]
    UnresolvedInherit(String),
    #[error("inherit chain starting at `{0}` is too deep or cyclic")]
    InheritCycle(String),
    #[error("select control `{0}` has no options")]
    MissingOptions(String),
    #[error("select control `{key}` has no option `{value}`")]
    UnknownOption { key: String, value: String },
    #[error("control `{key}` holds {expected} values, not {found}")]
    WrongKind {
        key: String,
        expected: ControlKind,
        found: ControlKind,
    },
}

/// Errors returned by token callbacks.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TokenError {
    #[error("token has no control `{0}`")]
    MissingControl(String),
    #[error("control `{key}` is not a {expected} control")]
    WrongKind { key: String, expected: ControlKind },
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error("{0}")]
    Behavior(String),
}

/// Top-level error for engine operations.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error("token `{uid}` failed: {source}")]
    Token {
        uid: String,
        #[source]
        source: TokenError,
    },
    #[error("unknown token type `{0}`")]
    UnknownTokenType(String),
    #[error("unknown token instance {0}")]
    UnknownToken(crate::types::TokenId),
    #[error("layer {0} does not exist")]
    LayerOutOfRange(usize),
    #[error("hex {0} is outside the grid")]
    HexOutOfRange(usize),
    #[error("cannot remove the last layer")]
    LastLayer,
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SequencerError {
    pub(crate) fn token(uid: &str, source: TokenError) -> Self {
        SequencerError::Token {
            uid: uid.to_string(),
            source,
        }
    }
}

pub type Result<T, E = SequencerError> = std::result::Result<T, E>;
