//! Token types shipped with the engine.

mod generate;
mod motion;
mod note;
mod wormhole;

use serde_json::Value;

use super::{ControlValues, Helpers, TokenRegistry};
use crate::control::ControlDefinition;
use crate::error::TokenError;
use crate::session::TokenStore;

const GATE_COUNTER: &str = "gateCounter";

/// Registry holding every built-in type.
pub fn builtin_registry() -> TokenRegistry {
    let mut registry = TokenRegistry::new();
    registry.register(generate::token_type());
    registry.register(note::token_type());
    for token_type in motion::token_types() {
        registry.register(token_type);
    }
    registry.register(wormhole::token_type());
    registry
}

/// Probability plus the gate counters every playhead-triggered type carries.
fn gated(
    mut controls: Vec<(&'static str, ControlDefinition)>,
) -> Vec<(&'static str, ControlDefinition)> {
    let mut schema = vec![(
        "probability",
        ControlDefinition::int("Probability", 0, 100, 100),
    )];
    schema.append(&mut controls);
    schema.extend([
        ("gateOffset", ControlDefinition::int("Gate Offset", 0, 128, 0)),
        ("gateOff", ControlDefinition::int("Gate-Off", 0, 128, 0)),
        ("gateOn", ControlDefinition::int("Gate-On", 0, 128, 0)),
    ]);
    schema
}

pub(crate) fn store_int(store: &TokenStore, key: &str) -> i64 {
    store.get(key).and_then(Value::as_i64).unwrap_or(0)
}

/// Negative values become 0 and values past `u32::MAX` saturate.
pub(crate) fn saturating_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

pub(crate) fn init_counter(store: &mut TokenStore, key: &str) {
    store.entry(key).or_insert(Value::from(0));
}

/// Counts playheads so a token can act on `on` of every `off + on` hits,
/// after skipping nothing for the first `offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Gate {
    probability: f64,
    offset: i64,
    off: i64,
    on: i64,
}

impl Gate {
    pub(crate) fn from_values(values: &ControlValues) -> Result<Self, TokenError> {
        Ok(Self {
            probability: values.decimal("probability")?,
            offset: values.int("gateOffset")?,
            off: values.int("gateOff")?,
            on: values.int("gateOn")?,
        })
    }

    /// Advances the counter by one hit and reports whether the gate was open
    /// for it.
    pub(crate) fn open(&self, store: &mut TokenStore) -> bool {
        if self.on + self.off == 0 {
            return true;
        }
        let counter = store_int(store, GATE_COUNTER);
        let open = counter >= self.offset + self.off || counter < self.offset;
        let mut next = counter + 1;
        if next >= self.offset + self.off + self.on {
            next = 0;
        }
        store.insert(GATE_COUNTER.to_string(), Value::from(next));
        open
    }

    /// Gate, then probability.
    pub(crate) fn fires(&self, store: &mut TokenStore, helpers: &mut Helpers) -> bool {
        self.open(store) && helpers.chance(self.probability)
    }
}

/// `on_start` shared by the gated types.
pub(crate) fn start_gate(store: &mut TokenStore) -> Result<(), TokenError> {
    init_counter(store, GATE_COUNTER);
    Ok(())
}
