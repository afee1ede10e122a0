//! Controls: typed parameters stored in a flat arena and referenced by id.
//!
//! A token or layer never embeds its controls. It keeps `(key, ControlId)`
//! pairs, and the effective value is computed on demand by [`resolve`]
//! following the control's [`ValueSource`].

pub mod oscillator;
pub mod resolve;

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ControlError;
use crate::music::key_names;
use crate::types::{ControlId, ControlKind, ControlValue, Direction, TimeBase, ValueSource};

pub use oscillator::{Oscillator, Waveform};
pub use resolve::{
    Clock, ResolveContext, Scope, from_number, parse_inherit_path, resolve, resolve_id, to_number,
};

/// Ordered `(key, definition)` pairs describing a set of controls.
pub type ControlSchema = Vec<(String, ControlDefinition)>;

/// Literal default as written in a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// Declarative description of one control, as found in a token schema or a
/// default table. Everything is optional so malformed entries can be skipped
/// rather than rejected wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ControlDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ControlKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Literal>,
    /// `global.<key>` or `layer.<key>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_base: Option<TimeBase>,
}

impl ControlDefinition {
    fn primitive(label: &str, kind: ControlKind) -> Self {
        Self {
            label: Some(label.to_string()),
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn int(label: &str, min: i64, max: i64, default: i64) -> Self {
        Self {
            min: Some(min as f64),
            max: Some(max as f64),
            default_value: Some(Literal::Number(default as f64)),
            ..Self::primitive(label, ControlKind::Int)
        }
    }

    pub fn decimal(label: &str, min: f64, max: f64, default: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            default_value: Some(Literal::Number(default)),
            ..Self::primitive(label, ControlKind::Decimal)
        }
    }

    pub fn bool(label: &str, default: bool) -> Self {
        Self {
            default_value: Some(Literal::Bool(default)),
            ..Self::primitive(label, ControlKind::Bool)
        }
    }

    pub fn direction(label: &str, default: u8) -> Self {
        Self {
            default_value: Some(Literal::Number(default as f64)),
            ..Self::primitive(label, ControlKind::Direction)
        }
    }

    pub fn triad(label: &str, default: u8) -> Self {
        Self {
            default_value: Some(Literal::Number(default as f64)),
            ..Self::primitive(label, ControlKind::Triad)
        }
    }

    pub fn select(label: &str, options: &[&str], default: &str) -> Self {
        Self {
            options: Some(options.iter().map(|o| o.to_string()).collect()),
            default_value: Some(Literal::Text(default.to_string())),
            ..Self::primitive(label, ControlKind::Select)
        }
    }

    pub fn inherit(path: &str) -> Self {
        Self {
            inherit: Some(path.to_string()),
            ..Default::default()
        }
    }

    pub fn with_step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    pub fn with_time_base(mut self, time_base: TimeBase) -> Self {
        self.time_base = Some(time_base);
        self
    }
}

/// A registered control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ControlState {
    pub id: ControlId,
    pub key: String,
    pub label: String,
    pub kind: ControlKind,
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub value_source: ValueSource,
    pub fixed_value: ControlValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherit: Option<String>,
    pub oscillator: Oscillator,
    #[serde(default)]
    pub time_base: TimeBase,
}

impl ControlState {
    /// Copy of this control under a fresh id.
    pub fn duplicate(&self) -> Self {
        Self {
            id: ControlId::new(),
            ..self.clone()
        }
    }
}

/// Arena of every control in a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ControlRegistry(BTreeMap<ControlId, ControlState>);

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &ControlId) -> Option<&ControlState> {
        self.0.get(id)
    }

    pub fn get_mut(&mut self, id: &ControlId) -> Option<&mut ControlState> {
        self.0.get_mut(id)
    }

    pub fn insert(&mut self, control: ControlState) -> ControlId {
        let id = control.id;
        self.0.insert(id, control);
        id
    }

    pub fn remove(&mut self, id: &ControlId) -> Option<ControlState> {
        self.0.remove(id)
    }

    pub fn contains(&self, id: &ControlId) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ControlState> {
        self.0.values()
    }

    /// Registers a copy of `id` under a new id and returns it.
    pub fn duplicate(&mut self, id: &ControlId) -> Result<ControlId, ControlError> {
        let copy = self
            .get(id)
            .ok_or(ControlError::UnknownControl(*id))?
            .duplicate();
        Ok(self.insert(copy))
    }
}

const MAX_DEFINITION_DEPTH: usize = 8;

lazy_static! {
    static ref PLAYER_DEFINITIONS: ControlSchema = {
        let keys = key_names();
        let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        vec![
            ("key".into(), ControlDefinition::select("Key", &keys, "None")),
            ("transpose".into(), ControlDefinition::int("Transpose", -36, 36, 0)),
            ("barLength".into(), ControlDefinition::int("Bar Length", 1, 128, 4)),
            (
                "tempo".into(),
                ControlDefinition::decimal("Tempo", 1.0, 960.0, 120.0)
                    .with_time_base(TimeBase::Milliseconds),
            ),
            ("velocity".into(), ControlDefinition::int("Velocity", 0, 127, 90)),
            ("emphasis".into(), ControlDefinition::int("Emphasis", 1, 127, 120)),
            ("tempoSync".into(), ControlDefinition::bool("Tempo Sync", true)),
            (
                "noteLength".into(),
                ControlDefinition::decimal("Note Length", 0.1, 10.0, 0.5).with_step(0.1),
            ),
            ("timeToLive".into(), ControlDefinition::int("Time To Live", 1, 256, 16)),
            ("pulseEvery".into(), ControlDefinition::int("Pulse Every", 1, 256, 16)),
        ]
    };
    static ref LAYER_DEFINITIONS: ControlSchema = {
        let mut defs: ControlSchema = vec![
            ("enabled".into(), ControlDefinition::bool("Enabled", true)),
            ("midiChannel".into(), ControlDefinition::int("MIDI Channel", 1, 16, 1)),
        ];
        defs.extend(PLAYER_DEFINITIONS.iter().map(|(key, _)| {
            (key.clone(), ControlDefinition::inherit(&format!("global.{}", key)))
        }));
        defs
    };
}

/// Controls owned by the session as a whole.
pub fn player_definitions() -> &'static ControlSchema {
    &PLAYER_DEFINITIONS
}

/// Controls every layer owns; most inherit from the player.
pub fn layer_definitions() -> &'static ControlSchema {
    &LAYER_DEFINITIONS
}

/// Follows an inherit path through the default tables to a primitive
/// definition.
fn inherited_definition(path: &str) -> Result<ControlDefinition, ControlError> {
    let mut current = path.to_string();
    for _ in 0..MAX_DEFINITION_DEPTH {
        let (scope, key) = parse_inherit_path(&current)?;
        let table = match scope {
            Scope::Global => player_definitions(),
            Scope::Layer => layer_definitions(),
        };
        let def = table
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, def)| def.clone())
            .ok_or_else(|| ControlError::UnresolvedInherit(current.clone()))?;
        match def.inherit {
            Some(next) => current = next,
            None => return Ok(def),
        }
    }
    Err(ControlError::InheritCycle(path.to_string()))
}

fn literal_value(
    kind: ControlKind,
    literal: Option<&Literal>,
    options: Option<&[String]>,
) -> ControlValue {
    match (kind, literal) {
        (ControlKind::Bool, Some(Literal::Bool(b))) => ControlValue::Bool(*b),
        (ControlKind::Bool, Some(Literal::Number(n))) => ControlValue::Bool(*n != 0.0),
        (ControlKind::Bool, _) => ControlValue::Bool(false),
        (ControlKind::Int, Some(Literal::Number(n))) => ControlValue::Int(n.floor() as i64),
        (ControlKind::Int, _) => ControlValue::Int(0),
        (ControlKind::Decimal, Some(Literal::Number(n))) => ControlValue::Decimal(*n),
        (ControlKind::Decimal, _) => ControlValue::Decimal(0.0),
        (ControlKind::Direction, Some(Literal::Number(n))) => {
            ControlValue::Direction(Direction::new(n.floor() as i64))
        }
        (ControlKind::Direction, _) => ControlValue::Direction(Direction::default()),
        (ControlKind::Triad, Some(Literal::Number(n))) => {
            ControlValue::Triad((n.floor() as i64).rem_euclid(7) as u8)
        }
        (ControlKind::Triad, _) => ControlValue::Triad(0),
        (ControlKind::Select, literal) => {
            let options = options.unwrap_or_default();
            let chosen = match literal {
                Some(Literal::Text(t)) if options.contains(t) => Some(t.clone()),
                _ => None,
            };
            ControlValue::Select(
                chosen
                    .or_else(|| options.first().cloned())
                    .unwrap_or_default(),
            )
        }
    }
}

/// Builds one control from its definition.
///
/// Returns `Ok(None)` when the definition lacks a label or kind; those are
/// logged and skipped. A select without options is an error.
pub fn build_control(key: &str, def: &ControlDefinition) -> Result<Option<ControlState>, ControlError> {
    let (base, value_source) = match &def.inherit {
        Some(path) => (inherited_definition(path)?, ValueSource::Inherit),
        None => (def.clone(), ValueSource::Fixed),
    };

    let label = def.label.clone().or(base.label.clone());
    let (Some(label), Some(kind)) = (label, base.kind) else {
        tracing::warn!(key, "skipping control definition without label or type");
        return Ok(None);
    };

    let options = base.options.clone();
    if kind == ControlKind::Select && options.as_ref().is_none_or(|o| o.is_empty()) {
        return Err(ControlError::MissingOptions(key.to_string()));
    }

    let (default_min, default_max) = kind.default_range(options.as_deref());
    let min = base.min.unwrap_or(default_min);
    let max = base.max.unwrap_or(default_max);
    let fixed_value = literal_value(kind, base.default_value.as_ref(), options.as_deref());

    Ok(Some(ControlState {
        id: ControlId::new(),
        key: key.to_string(),
        label,
        kind,
        min,
        max,
        step: base.step,
        options,
        value_source,
        fixed_value,
        inherit: def.inherit.clone(),
        oscillator: Oscillator::for_range(kind, min, max),
        time_base: base.time_base.unwrap_or_default(),
    }))
}

/// Registers every buildable control of `schema`, returning the keyed ids in
/// schema order.
pub fn build_controls(
    schema: &[(String, ControlDefinition)],
    registry: &mut ControlRegistry,
) -> Result<Vec<(String, ControlId)>, ControlError> {
    let mut ids = Vec::with_capacity(schema.len());
    for (key, def) in schema {
        if let Some(control) = build_control(key, def)? {
            ids.push((key.clone(), registry.insert(control)));
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_tempo_inherits_global_metadata() {
        let control = build_control("tempo", &ControlDefinition::inherit("global.tempo"))
            .unwrap()
            .unwrap();
        assert_eq!(control.kind, ControlKind::Decimal);
        assert_eq!(control.value_source, ValueSource::Inherit);
        assert_eq!((control.min, control.max), (1.0, 960.0));
        assert_eq!(control.fixed_value, ControlValue::Decimal(120.0));
        assert_eq!(control.time_base, TimeBase::Milliseconds);
    }

    #[test]
    fn token_inherit_follows_layer_chain() {
        let control = build_control("lifespan", &ControlDefinition::inherit("layer.timeToLive"))
            .unwrap()
            .unwrap();
        assert_eq!(control.label, "Time To Live");
        assert_eq!(control.kind, ControlKind::Int);
        assert_eq!(control.inherit.as_deref(), Some("layer.timeToLive"));
    }

    #[test]
    fn unknown_inherit_is_fatal() {
        let err = build_control("x", &ControlDefinition::inherit("global.nothing")).unwrap_err();
        assert_eq!(err, ControlError::UnresolvedInherit("global.nothing".into()));
    }

    #[test]
    fn definition_without_kind_is_skipped() {
        let def = ControlDefinition {
            label: Some("Nameless".into()),
            ..Default::default()
        };
        let mut registry = ControlRegistry::new();
        let ids = build_controls(
            &[
                ("broken".into(), def),
                ("ok".into(), ControlDefinition::bool("Ok", true)),
            ],
            &mut registry,
        )
        .unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].0, "ok");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn select_without_options_is_fatal() {
        let def = ControlDefinition {
            label: Some("Mode".into()),
            kind: Some(ControlKind::Select),
            ..Default::default()
        };
        assert_eq!(
            build_control("mode", &def).unwrap_err(),
            ControlError::MissingOptions("mode".into())
        );
    }

    #[test]
    fn defaults_by_kind() {
        let dir = build_control("d", &ControlDefinition::primitive("D", ControlKind::Direction))
            .unwrap()
            .unwrap();
        assert_eq!((dir.min, dir.max), (0.0, 5.0));
        assert_eq!(dir.fixed_value, ControlValue::Direction(Direction::new(0)));

        let select = build_control("s", &ControlDefinition::select("S", &["a", "b", "c"], "zzz"))
            .unwrap()
            .unwrap();
        assert_eq!((select.min, select.max), (0.0, 2.0));
        assert_eq!(select.fixed_value, ControlValue::Select("a".into()));
    }

    #[test]
    fn definitions_parse_from_json() {
        let json = serde_json::json!({
            "label": "Probability",
            "type": "int",
            "min": 0,
            "max": 100,
            "default": 75
        });
        let def: ControlDefinition = serde_json::from_value(json).unwrap();
        let control = build_control("probability", &def).unwrap().unwrap();
        assert_eq!(control.fixed_value, ControlValue::Int(75));
        assert_eq!(control.oscillator.period_ms, 101_000.0);
    }

    #[test]
    fn duplicate_gets_fresh_id() {
        let mut registry = ControlRegistry::new();
        let ids = build_controls(player_definitions(), &mut registry).unwrap();
        let (_, tempo) = ids.iter().find(|(k, _)| k == "tempo").unwrap();
        let copy = registry.duplicate(tempo).unwrap();
        assert_ne!(copy, *tempo);
        assert_eq!(registry.get(&copy).unwrap().key, "tempo");
    }
}
