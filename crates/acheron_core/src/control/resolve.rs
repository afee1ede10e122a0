//! Effective-value resolution for controls.

use std::collections::BTreeMap;

use regex::Regex;

use super::{ControlRegistry, ControlState};
use crate::error::ControlError;
use crate::midi::CcTable;
use crate::types::{ControlId, ControlKind, ControlValue, Direction, TimeBase, ValueSource};

/// Longest inherit chain followed before assuming a cycle.
pub const MAX_INHERIT_DEPTH: usize = 32;

lazy_static! {
    static ref RE_INHERIT: Regex = Regex::new(r"^(global|layer)\.(\w+)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Layer,
}

pub fn parse_inherit_path(path: &str) -> Result<(Scope, &str), ControlError> {
    let caps = RE_INHERIT
        .captures(path)
        .ok_or_else(|| ControlError::MalformedInherit(path.to_string()))?;
    let scope = match caps.get(1).map(|m| m.as_str()) {
        Some("global") => Scope::Global,
        _ => Scope::Layer,
    };
    let key = caps
        .get(2)
        .map(|m| m.as_str())
        .ok_or_else(|| ControlError::MalformedInherit(path.to_string()))?;
    Ok((scope, key))
}

/// Time of the layer a control is resolved for.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Clock {
    pub elapsed_ms: f64,
    pub current_beat: f64,
    /// Known once the layer tempo has been resolved.
    pub ms_per_beat: Option<f64>,
}

impl Clock {
    fn phase_time(&self, time_base: TimeBase) -> f64 {
        match (time_base, self.ms_per_beat) {
            (TimeBase::Beats, Some(ms_per_beat)) => self.current_beat.floor() * ms_per_beat,
            _ => self.elapsed_ms,
        }
    }
}

/// Everything needed to follow inheritance from one control.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub controls: &'a ControlRegistry,
    pub globals: &'a BTreeMap<String, ControlId>,
    pub layer: Option<&'a BTreeMap<String, ControlId>>,
    pub clock: Clock,
    pub cc: &'a CcTable,
}

impl<'a> ResolveContext<'a> {
    fn lookup(&self, path: &str) -> Result<&'a ControlState, ControlError> {
        let (scope, key) = parse_inherit_path(path)?;
        let scope_map = match scope {
            Scope::Global => Some(self.globals),
            Scope::Layer => self.layer,
        };
        scope_map
            .and_then(|m| m.get(key))
            .and_then(|id| self.controls.get(id))
            .ok_or_else(|| ControlError::UnresolvedInherit(path.to_string()))
    }
}

/// Numeric view of a value for arithmetic and clamping.
pub fn to_number(control: &ControlState, value: &ControlValue) -> Result<f64, ControlError> {
    Ok(match value {
        ControlValue::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        ControlValue::Int(n) => *n as f64,
        ControlValue::Decimal(n) => *n,
        ControlValue::Direction(d) => d.value() as f64,
        ControlValue::Triad(t) => *t as f64,
        ControlValue::Select(s) => control
            .options
            .as_deref()
            .unwrap_or_default()
            .iter()
            .position(|o| o == s)
            .ok_or_else(|| ControlError::UnknownOption {
                key: control.key.clone(),
                value: s.clone(),
            })? as f64,
    })
}

/// Coerces a number into the control's native kind.
pub fn from_number(control: &ControlState, n: f64) -> Result<ControlValue, ControlError> {
    Ok(match control.kind {
        ControlKind::Bool => ControlValue::Bool(n != 0.0),
        ControlKind::Int => ControlValue::Int(n.floor() as i64),
        ControlKind::Decimal => ControlValue::Decimal(n),
        ControlKind::Direction => ControlValue::Direction(Direction::new(n.floor() as i64)),
        ControlKind::Triad => ControlValue::Triad((n.floor() as i64).rem_euclid(7) as u8),
        ControlKind::Select => {
            let options = control
                .options
                .as_deref()
                .filter(|o| !o.is_empty())
                .ok_or_else(|| ControlError::MissingOptions(control.key.clone()))?;
            let index = (n.floor() as i64).rem_euclid(options.len() as i64) as usize;
            ControlValue::Select(options[index].clone())
        }
    })
}

pub fn resolve(control: &ControlState, ctx: &ResolveContext) -> Result<ControlValue, ControlError> {
    profiling::scope!("resolve");
    resolve_at_depth(control, ctx, 0)
}

pub fn resolve_id(id: &ControlId, ctx: &ResolveContext) -> Result<ControlValue, ControlError> {
    let control = ctx
        .controls
        .get(id)
        .ok_or(ControlError::UnknownControl(*id))?;
    resolve(control, ctx)
}

fn resolve_at_depth(
    control: &ControlState,
    ctx: &ResolveContext,
    depth: usize,
) -> Result<ControlValue, ControlError> {
    match control.value_source {
        ValueSource::Fixed => Ok(control.fixed_value.clone()),
        ValueSource::Modulate => {
            let t = ctx.clock.phase_time(control.time_base);
            from_number(control, control.oscillator.evaluate(t, ctx.cc))
        }
        source @ (ValueSource::Inherit | ValueSource::Add | ValueSource::Multiply) => {
            if depth >= MAX_INHERIT_DEPTH {
                return Err(ControlError::InheritCycle(control.key.clone()));
            }
            let path = control
                .inherit
                .as_deref()
                .ok_or_else(|| ControlError::MissingInherit {
                    key: control.key.clone(),
                    source_kind: source.name(),
                })?;
            let parent = ctx.lookup(path)?;
            let base = to_number(parent, &resolve_at_depth(parent, ctx, depth + 1)?)?;
            let combined = match source {
                ValueSource::Add => base + to_number(control, &control.fixed_value)?,
                ValueSource::Multiply => base * to_number(control, &control.fixed_value)?,
                _ => base,
            };
            from_number(control, combined.clamp(control.min, control.max.max(control.min)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ControlDefinition, build_control};

    struct Fixture {
        controls: ControlRegistry,
        globals: BTreeMap<String, ControlId>,
        layer: BTreeMap<String, ControlId>,
        cc: CcTable,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                controls: ControlRegistry::new(),
                globals: BTreeMap::new(),
                layer: BTreeMap::new(),
                cc: CcTable::default(),
            }
        }

        fn add(&mut self, scope: Scope, key: &str, def: ControlDefinition) -> ControlId {
            let control = build_control(key, &def).unwrap().unwrap();
            let id = self.controls.insert(control);
            match scope {
                Scope::Global => self.globals.insert(key.into(), id),
                Scope::Layer => self.layer.insert(key.into(), id),
            };
            id
        }

        fn ctx(&self) -> ResolveContext<'_> {
            ResolveContext {
                controls: &self.controls,
                globals: &self.globals,
                layer: Some(&self.layer),
                clock: Clock::default(),
                cc: &self.cc,
            }
        }
    }

    #[test]
    fn parses_paths() {
        assert_eq!(parse_inherit_path("global.tempo").unwrap(), (Scope::Global, "tempo"));
        assert_eq!(parse_inherit_path("layer.midiChannel").unwrap(), (Scope::Layer, "midiChannel"));
        assert!(parse_inherit_path("token.x").is_err());
        assert!(parse_inherit_path("global.").is_err());
    }

    #[test]
    fn add_clamps_to_max() {
        let mut f = Fixture::new();
        f.add(Scope::Global, "base", ControlDefinition::int("Base", 0, 100, 10));
        let mut control = build_control("sum", &ControlDefinition::int("Sum", 0, 20, 15))
            .unwrap()
            .unwrap();
        control.value_source = ValueSource::Add;
        control.inherit = Some("global.base".into());
        assert_eq!(resolve(&control, &f.ctx()).unwrap(), ControlValue::Int(20));
    }

    #[test]
    fn multiply_uses_own_value() {
        let mut f = Fixture::new();
        f.add(Scope::Global, "base", ControlDefinition::decimal("Base", 0.0, 100.0, 2.5));
        let mut control = build_control("m", &ControlDefinition::decimal("M", 0.0, 100.0, 4.0))
            .unwrap()
            .unwrap();
        control.value_source = ValueSource::Multiply;
        control.inherit = Some("global.base".into());
        assert_eq!(resolve(&control, &f.ctx()).unwrap(), ControlValue::Decimal(10.0));
    }

    #[test]
    fn inherit_chain_through_layer() {
        let mut f = Fixture::new();
        let tempo = f.add(Scope::Global, "tempo", ControlDefinition::decimal("Tempo", 1.0, 960.0, 90.0));
        f.add(Scope::Layer, "tempo", ControlDefinition::inherit("global.tempo"));
        let token = build_control("t", &ControlDefinition::inherit("layer.tempo"))
            .unwrap()
            .unwrap();
        assert_eq!(resolve(&token, &f.ctx()).unwrap(), ControlValue::Decimal(90.0));

        f.controls.get_mut(&tempo).unwrap().fixed_value = ControlValue::Decimal(5000.0);
        assert_eq!(resolve(&token, &f.ctx()).unwrap(), ControlValue::Decimal(960.0));
    }

    #[test]
    fn inherit_coerces_to_own_kind() {
        let mut f = Fixture::new();
        f.add(Scope::Global, "amount", ControlDefinition::decimal("Amount", 0.0, 16.0, 7.9));
        let mut control = build_control("dir", &ControlDefinition::direction("Dir", 0))
            .unwrap()
            .unwrap();
        control.value_source = ValueSource::Inherit;
        control.inherit = Some("global.amount".into());
        control.max = 16.0;
        assert_eq!(
            resolve(&control, &f.ctx()).unwrap(),
            ControlValue::Direction(Direction::new(1))
        );
    }

    #[test]
    fn unresolved_path_is_an_error() {
        let f = Fixture::new();
        let mut control = build_control("x", &ControlDefinition::int("X", 0, 10, 1))
            .unwrap()
            .unwrap();
        control.value_source = ValueSource::Inherit;
        control.inherit = Some("layer.missing".into());
        assert_eq!(
            resolve(&control, &f.ctx()).unwrap_err(),
            ControlError::UnresolvedInherit("layer.missing".into())
        );
        control.inherit = None;
        assert!(matches!(
            resolve(&control, &f.ctx()).unwrap_err(),
            ControlError::MissingInherit { .. }
        ));
    }

    #[test]
    fn cycles_are_detected() {
        let mut f = Fixture::new();
        let a = f.add(Scope::Global, "a", ControlDefinition::int("A", 0, 10, 1));
        let b = f.add(Scope::Global, "b", ControlDefinition::int("B", 0, 10, 1));
        for (id, path) in [(a, "global.b"), (b, "global.a")] {
            let c = f.controls.get_mut(&id).unwrap();
            c.value_source = ValueSource::Inherit;
            c.inherit = Some(path.into());
        }
        let err = resolve_id(&a, &f.ctx()).unwrap_err();
        assert!(matches!(err, ControlError::InheritCycle(_)));
    }

    #[test]
    fn modulate_uses_beat_quantized_time() {
        let f = Fixture::new();
        let mut control = build_control("n", &ControlDefinition::int("N", 0, 7, 0))
            .unwrap()
            .unwrap();
        control.value_source = ValueSource::Modulate;
        // sweeps 0..8 over 8 s
        let mut ctx = f.ctx();
        ctx.clock = Clock {
            elapsed_ms: 99_999.0,
            current_beat: 3.7,
            ms_per_beat: Some(500.0),
        };
        assert_eq!(resolve(&control, &ctx).unwrap(), ControlValue::Int(1));

        control.time_base = TimeBase::Milliseconds;
        ctx.clock.elapsed_ms = 2500.0;
        assert_eq!(resolve(&control, &ctx).unwrap(), ControlValue::Int(2));
    }

    #[test]
    fn select_coercion_wraps() {
        let control = build_control("s", &ControlDefinition::select("S", &["a", "b", "c"], "a"))
            .unwrap()
            .unwrap();
        assert_eq!(from_number(&control, 4.2).unwrap(), ControlValue::Select("b".into()));
        assert_eq!(from_number(&control, -1.0).unwrap(), ControlValue::Select("c".into()));
        assert_eq!(to_number(&control, &ControlValue::Select("c".into())).unwrap(), 2.0);
        assert!(to_number(&control, &ControlValue::Select("z".into())).is_err());
    }

    #[test]
    fn triad_and_bool_coercion() {
        let triad = build_control("t", &ControlDefinition::triad("T", 0)).unwrap().unwrap();
        assert_eq!(from_number(&triad, 9.5).unwrap(), ControlValue::Triad(2));
        let flag = build_control("b", &ControlDefinition::bool("B", false)).unwrap().unwrap();
        assert_eq!(from_number(&flag, 0.3).unwrap(), ControlValue::Bool(true));
        assert_eq!(from_number(&flag, 0.0).unwrap(), ControlValue::Bool(false));
    }
}
