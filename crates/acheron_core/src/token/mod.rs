//! Token types and the callback contract they implement.
//!
//! A token type pairs a control schema with a [`TokenBehavior`]. Types are
//! registered once in a [`TokenRegistry`]; placed instances refer to their
//! type by uid.

pub mod builtin;
mod helpers;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::control::{ControlDefinition, ControlSchema};
use crate::error::TokenError;
use crate::session::{Playhead, TokenStore};
use crate::types::{ControlKind, ControlValue, Direction};

pub use builtin::builtin_registry;
pub use helpers::{Helpers, NoteLength, OtherInstance};

/// What a token callback sees of a playhead on its hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayheadView {
    pub age: u32,
    pub lifespan: u32,
    pub direction: Direction,
}

impl From<&Playhead> for PlayheadView {
    fn from(playhead: &Playhead) -> Self {
        Self {
            age: playhead.age,
            lifespan: playhead.lifespan,
            direction: playhead.direction,
        }
    }
}

/// Attributes overwritten by [`Helpers::modify_playhead`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayheadPatch {
    pub age: Option<u32>,
    pub lifespan: Option<u32>,
    pub direction: Option<Direction>,
}

/// Resolved values of a token's controls, keyed by control key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlValues(BTreeMap<String, ControlValue>);

impl ControlValues {
    pub fn new(values: BTreeMap<String, ControlValue>) -> Self {
        Self(values)
    }

    pub fn get(&self, key: &str) -> Result<&ControlValue, TokenError> {
        self.0
            .get(key)
            .ok_or_else(|| TokenError::MissingControl(key.to_string()))
    }

    fn typed<T>(
        &self,
        key: &str,
        expected: ControlKind,
        view: impl FnOnce(&ControlValue) -> Option<T>,
    ) -> Result<T, TokenError> {
        view(self.get(key)?).ok_or_else(|| TokenError::WrongKind {
            key: key.to_string(),
            expected,
        })
    }

    pub fn int(&self, key: &str) -> Result<i64, TokenError> {
        self.typed(key, ControlKind::Int, ControlValue::as_int)
    }

    pub fn decimal(&self, key: &str) -> Result<f64, TokenError> {
        self.typed(key, ControlKind::Decimal, ControlValue::as_decimal)
    }

    pub fn bool(&self, key: &str) -> Result<bool, TokenError> {
        self.typed(key, ControlKind::Bool, ControlValue::as_bool)
    }

    pub fn direction(&self, key: &str) -> Result<Direction, TokenError> {
        self.typed(key, ControlKind::Direction, ControlValue::as_direction)
    }

    pub fn triad(&self, key: &str) -> Result<u8, TokenError> {
        self.typed(key, ControlKind::Triad, ControlValue::as_triad)
    }

    pub fn select(&self, key: &str) -> Result<&str, TokenError> {
        let value = self.get(key)?;
        value.as_select().ok_or_else(|| TokenError::WrongKind {
            key: key.to_string(),
            expected: ControlKind::Select,
        })
    }
}

/// Lifecycle callbacks of a token type.
///
/// Callbacks run synchronously inside a tick. Returning an error aborts the
/// whole tick.
pub trait TokenBehavior: Send + Sync {
    fn on_start(&self, _store: &mut TokenStore, _helpers: &mut Helpers) -> Result<(), TokenError> {
        Ok(())
    }

    fn on_stop(&self, _store: &mut TokenStore, _helpers: &mut Helpers) -> Result<(), TokenError> {
        Ok(())
    }

    fn on_tick(
        &self,
        store: &mut TokenStore,
        helpers: &mut Helpers,
        playheads: &[PlayheadView],
    ) -> Result<(), TokenError>;
}

#[derive(Clone)]
pub struct TokenType {
    pub uid: String,
    pub label: String,
    pub symbol: String,
    pub schema: ControlSchema,
    pub behavior: Arc<dyn TokenBehavior>,
}

impl TokenType {
    pub fn new(
        uid: &str,
        label: &str,
        symbol: &str,
        schema: Vec<(&str, ControlDefinition)>,
        behavior: impl TokenBehavior + 'static,
    ) -> Self {
        Self {
            uid: uid.to_string(),
            label: label.to_string(),
            symbol: symbol.to_string(),
            schema: schema
                .into_iter()
                .map(|(key, def)| (key.to_string(), def))
                .collect(),
            behavior: Arc::new(behavior),
        }
    }
}

impl fmt::Debug for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenType")
            .field("uid", &self.uid)
            .field("label", &self.label)
            .field("symbol", &self.symbol)
            .field("controls", &self.schema.len())
            .finish()
    }
}

/// Token types in registration order, looked up by uid.
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    types: Vec<Arc<TokenType>>,
    by_uid: HashMap<String, usize>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a type; a type with the same uid is replaced in place.
    pub fn register(&mut self, token_type: TokenType) {
        let token_type = Arc::new(token_type);
        match self.by_uid.get(&token_type.uid) {
            Some(&index) => self.types[index] = token_type,
            None => {
                self.by_uid
                    .insert(token_type.uid.clone(), self.types.len());
                self.types.push(token_type);
            }
        }
    }

    pub fn get(&self, uid: &str) -> Option<&TokenType> {
        self.by_uid.get(uid).map(|&index| self.types[index].as_ref())
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.by_uid.contains_key(uid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenType> {
        self.types.iter().map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
