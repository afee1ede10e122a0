use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque handle into the control arena.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct ControlId(pub Uuid);

impl ControlId {
    pub fn new() -> Self {
        ControlId(Uuid::new_v4())
    }
}

impl Default for ControlId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one placed token instance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct TokenId(pub Uuid);

impl TokenId {
    pub fn new() -> Self {
        TokenId(Uuid::new_v4())
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the six hex bearings, clockwise from "up".
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    JsonSchema,
)]
#[serde(transparent)]
pub struct Direction(u8);

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        i64::deserialize(deserializer).map(Direction::new)
    }
}

impl Direction {
    pub const COUNT: u8 = 6;

    pub fn new(value: i64) -> Self {
        Direction(value.rem_euclid(Self::COUNT as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn opposite(self) -> Self {
        Direction((self.0 + 3) % Self::COUNT)
    }

    /// Rotates clockwise by `steps` (negative turns counter-clockwise).
    pub fn rotate(self, steps: i64) -> Self {
        Direction::new(self.0 as i64 + steps)
    }

    pub fn all() -> impl Iterator<Item = Direction> {
        (0..Self::COUNT).map(Direction)
    }
}

impl From<u8> for Direction {
    fn from(value: u8) -> Self {
        Direction::new(value as i64)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The native data kind of a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ControlKind {
    Bool,
    Int,
    Decimal,
    Direction,
    Select,
    Triad,
}

impl ControlKind {
    pub fn name(self) -> &'static str {
        match self {
            ControlKind::Bool => "bool",
            ControlKind::Int => "int",
            ControlKind::Decimal => "decimal",
            ControlKind::Direction => "direction",
            ControlKind::Select => "select",
            ControlKind::Triad => "triad",
        }
    }

    /// Range used when a definition does not supply one.
    pub fn default_range(self, options: Option<&[String]>) -> (f64, f64) {
        match self {
            ControlKind::Bool => (0.0, 1.0),
            ControlKind::Int | ControlKind::Decimal => (0.0, 16.0),
            ControlKind::Direction => (0.0, 5.0),
            ControlKind::Triad => (0.0, 6.0),
            ControlKind::Select => {
                let len = options.map_or(0, |o| o.len());
                (0.0, len.saturating_sub(1) as f64)
            }
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed control value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ControlValue {
    Bool(bool),
    Int(i64),
    Decimal(f64),
    Direction(Direction),
    Select(String),
    Triad(u8),
}

impl ControlValue {
    pub fn kind(&self) -> ControlKind {
        match self {
            ControlValue::Bool(_) => ControlKind::Bool,
            ControlValue::Int(_) => ControlKind::Int,
            ControlValue::Decimal(_) => ControlKind::Decimal,
            ControlValue::Direction(_) => ControlKind::Direction,
            ControlValue::Select(_) => ControlKind::Select,
            ControlValue::Triad(_) => ControlKind::Triad,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ControlValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view of any numeric value (decimals are floored).
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ControlValue::Int(n) => Some(*n),
            ControlValue::Decimal(n) => Some(n.floor() as i64),
            ControlValue::Direction(d) => Some(d.value() as i64),
            ControlValue::Triad(t) => Some(*t as i64),
            ControlValue::Bool(_) | ControlValue::Select(_) => None,
        }
    }

    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            ControlValue::Decimal(n) => Some(*n),
            ControlValue::Int(n) => Some(*n as f64),
            ControlValue::Direction(d) => Some(d.value() as f64),
            ControlValue::Triad(t) => Some(*t as f64),
            ControlValue::Bool(_) | ControlValue::Select(_) => None,
        }
    }

    pub fn as_direction(&self) -> Option<Direction> {
        match self {
            ControlValue::Direction(d) => Some(*d),
            ControlValue::Int(n) => Some(Direction::new(*n)),
            _ => None,
        }
    }

    pub fn as_select(&self) -> Option<&str> {
        match self {
            ControlValue::Select(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_triad(&self) -> Option<u8> {
        match self {
            ControlValue::Triad(t) => Some(*t),
            ControlValue::Int(n) => Some(n.rem_euclid(7) as u8),
            _ => None,
        }
    }
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlValue::Bool(b) => write!(f, "{}", b),
            ControlValue::Int(n) => write!(f, "{}", n),
            ControlValue::Decimal(n) => write!(f, "{}", n),
            ControlValue::Direction(d) => write!(f, "{}", d),
            ControlValue::Select(s) => f.write_str(s),
            ControlValue::Triad(t) => write!(f, "{}", t),
        }
    }
}

/// How a control obtains its effective value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ValueSource {
    #[default]
    Fixed,
    Inherit,
    Add,
    Multiply,
    Modulate,
}

impl ValueSource {
    pub fn name(self) -> &'static str {
        match self {
            ValueSource::Fixed => "fixed",
            ValueSource::Inherit => "inherit",
            ValueSource::Add => "add",
            ValueSource::Multiply => "multiply",
            ValueSource::Modulate => "modulate",
        }
    }
}

/// Clock a modulated control samples its oscillator against.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum TimeBase {
    /// Continuous layer time in milliseconds.
    Milliseconds,
    /// Layer time quantized to whole beats.
    #[default]
    Beats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_wraps_negative_values() {
        assert_eq!(Direction::new(-1).value(), 5);
        assert_eq!(Direction::new(13).value(), 1);
        assert_eq!(Direction::new(4).opposite().value(), 1);
        assert_eq!(Direction::new(5).rotate(2).value(), 1);
        assert_eq!(Direction::new(0).rotate(-3).value(), 3);
    }

    #[test]
    fn control_value_numeric_views() {
        assert_eq!(ControlValue::Decimal(2.7).as_int(), Some(2));
        assert_eq!(ControlValue::Int(8).as_direction(), Some(Direction::new(2)));
        assert_eq!(ControlValue::Select("x".into()).as_int(), None);
        assert_eq!(ControlValue::Triad(3).as_decimal(), Some(3.0));
    }

    #[test]
    fn control_value_serializes_tagged() {
        let json = serde_json::to_value(ControlValue::Int(4)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "int", "value": 4}));
        let back: ControlValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, ControlValue::Int(4));
    }
}
