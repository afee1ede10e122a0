//! The complete mutable state of a composition and the edits applied to it.
//!
//! Edits never mutate a [`Session`] in place. Each one reads the current
//! state and returns a [`SessionPatch`] that the store merges, so user edits,
//! deferred token moves and beat-steps all go through the same queue.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::control::{
    Clock, ControlRegistry, ControlState, Oscillator, ResolveContext, build_controls,
    layer_definitions, player_definitions, resolve_id,
};
use crate::error::{ControlError, Result, SequencerError};
use crate::hex::{HEX_COUNT, HexIndex};
use crate::midi::{CcTable, InputNote};
use crate::store::Merge;
use crate::token::TokenType;
use crate::types::{ControlId, ControlValue, Direction, TokenId, ValueSource};

/// Free-form scratch space owned by a token instance or a playhead.
pub type TokenStore = serde_json::Map<String, Value>;

/// One list per hex, always `HEX_COUNT` long.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct HexGrid<T>(Vec<Vec<T>>);

impl<T> HexGrid<T> {
    pub fn empty() -> Self {
        Self((0..HEX_COUNT).map(|_| Vec::new()).collect())
    }

    pub fn at(&self, hex: HexIndex) -> &[T] {
        &self.0[hex % HEX_COUNT]
    }

    pub fn at_mut(&mut self, hex: HexIndex) -> &mut Vec<T> {
        &mut self.0[hex % HEX_COUNT]
    }

    pub fn push(&mut self, hex: HexIndex, item: T) {
        self.at_mut(hex).push(item);
    }

    /// Non-empty cells with their index.
    pub fn occupied(&self) -> impl Iterator<Item = (HexIndex, &[T])> {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, cell)| !cell.is_empty())
            .map(|(hex, cell)| (hex, cell.as_slice()))
    }

    pub fn count(&self) -> usize {
        self.0.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Vec::is_empty)
    }
}

impl<T> Default for HexGrid<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for HexGrid<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut cells = Vec::<Vec<T>>::deserialize(deserializer)?;
        if cells.len() > HEX_COUNT {
            return Err(serde::de::Error::invalid_length(
                cells.len(),
                &"at most one cell per hex",
            ));
        }
        cells.resize_with(HEX_COUNT, Vec::new);
        Ok(HexGrid(cells))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Playhead {
    pub age: u32,
    pub lifespan: u32,
    pub direction: Direction,
    #[serde(default)]
    pub store: TokenStore,
}

impl Playhead {
    pub fn new(lifespan: u32, direction: Direction) -> Self {
        Self {
            age: 0,
            lifespan,
            direction,
            store: TokenStore::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.age < self.lifespan
    }
}

pub type PlayheadGrid = HexGrid<Playhead>;
pub type TokenGrid = HexGrid<TokenId>;

/// Relocation requested by a token, applied at the next beat-step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledMove {
    pub src_hex: HexIndex,
    pub index: usize,
    pub dest_hex: HexIndex,
    pub dest_layer: usize,
}

/// Playhead travelling to another layer, delivered on that layer's next tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LayerTransfer {
    pub layer: usize,
    pub hex: HexIndex,
    pub playhead: Playhead,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenInstance {
    pub id: TokenId,
    pub uid: String,
    pub label: String,
    pub symbol: String,
    /// Owned controls in schema order.
    pub controls: Vec<(String, ControlId)>,
    #[serde(default)]
    pub store: TokenStore,
}

impl TokenInstance {
    pub fn control_id(&self, key: &str) -> Option<ControlId> {
        self.controls
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, id)| *id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub name: String,
    #[serde(default)]
    pub current_beat: f64,
    #[serde(default)]
    pub current_time_ms: f64,
    pub controls: BTreeMap<String, ControlId>,
    #[serde(default)]
    pub tokens: TokenGrid,
    #[serde(default)]
    pub playheads: PlayheadGrid,
    #[serde(default)]
    pub pending_moves: Vec<ScheduledMove>,
    #[serde(default)]
    pub midi_buffer: Vec<InputNote>,
}

impl Layer {
    /// New layer whose controls are registered in `registry`.
    pub fn new(name: &str, registry: &mut ControlRegistry) -> Result<Self, ControlError> {
        let controls = build_controls(layer_definitions(), registry)?
            .into_iter()
            .collect();
        Ok(Self {
            name: name.to_string(),
            current_beat: 0.0,
            current_time_ms: 0.0,
            controls,
            tokens: TokenGrid::empty(),
            playheads: PlayheadGrid::empty(),
            pending_moves: Vec::new(),
            midi_buffer: Vec::new(),
        })
    }
}

/// Partial update of a [`Session`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub controls: Option<ControlRegistry>,
    pub tokens: Option<BTreeMap<TokenId, TokenInstance>>,
    pub globals: Option<BTreeMap<String, ControlId>>,
    pub layers: Option<Vec<Layer>>,
    pub is_playing: Option<bool>,
    pub pending_transfers: Option<Vec<LayerTransfer>>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self.controls.is_none()
            && self.tokens.is_none()
            && self.globals.is_none()
            && self.layers.is_none()
            && self.is_playing.is_none()
            && self.pending_transfers.is_none()
    }
}

/// Changes to one control's sourcing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ControlUpdate {
    #[serde(default)]
    pub value_source: Option<ValueSource>,
    #[serde(default)]
    pub fixed_value: Option<ControlValue>,
    #[serde(default)]
    pub inherit: Option<String>,
    #[serde(default)]
    pub oscillator: Option<Oscillator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub controls: ControlRegistry,
    pub tokens: BTreeMap<TokenId, TokenInstance>,
    pub globals: BTreeMap<String, ControlId>,
    pub layers: Vec<Layer>,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub pending_transfers: Vec<LayerTransfer>,
}

impl Merge for Session {
    type Patch = SessionPatch;

    fn merge(&mut self, patch: SessionPatch) {
        if let Some(controls) = patch.controls {
            self.controls = controls;
        }
        if let Some(tokens) = patch.tokens {
            self.tokens = tokens;
        }
        if let Some(globals) = patch.globals {
            self.globals = globals;
        }
        if let Some(layers) = patch.layers {
            self.layers = layers;
        }
        if let Some(is_playing) = patch.is_playing {
            self.is_playing = is_playing;
        }
        if let Some(pending_transfers) = patch.pending_transfers {
            self.pending_transfers = pending_transfers;
        }
    }
}

impl Session {
    /// Default globals and a single layer.
    pub fn new() -> Result<Self, ControlError> {
        let mut controls = ControlRegistry::new();
        let globals = build_controls(player_definitions(), &mut controls)?
            .into_iter()
            .collect();
        let layer = Layer::new("Layer 1", &mut controls)?;
        Ok(Self {
            controls,
            tokens: BTreeMap::new(),
            globals,
            layers: vec![layer],
            is_playing: false,
            pending_transfers: Vec::new(),
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JSON Schema of a saved composition.
    pub fn schema() -> schemars::Schema {
        schemars::schema_for!(Session)
    }

    pub fn layer(&self, index: usize) -> Result<&Layer> {
        self.layers
            .get(index)
            .ok_or(SequencerError::LayerOutOfRange(index))
    }

    pub fn token(&self, id: &TokenId) -> Result<&TokenInstance> {
        self.tokens.get(id).ok_or(SequencerError::UnknownToken(*id))
    }

    /// Resolution context for a layer at `clock`.
    pub fn resolve_context<'a>(
        &'a self,
        layer: usize,
        clock: Clock,
        cc: &'a CcTable,
    ) -> ResolveContext<'a> {
        ResolveContext {
            controls: &self.controls,
            globals: &self.globals,
            layer: self.layers.get(layer).map(|l| &l.controls),
            clock,
            cc,
        }
    }

    /// Resolves a layer control by key at `clock`.
    pub fn layer_value(
        &self,
        layer: usize,
        key: &str,
        clock: Clock,
        cc: &CcTable,
    ) -> Result<ControlValue> {
        let id = self
            .layer(layer)?
            .controls
            .get(key)
            .ok_or_else(|| ControlError::UnresolvedInherit(format!("layer.{}", key)))?;
        Ok(resolve_id(id, &self.resolve_context(layer, clock, cc))?)
    }

    /// Every placed instance of a token type as `(layer, hex, instance)`.
    pub fn instances_of<'a>(
        &'a self,
        uid: &'a str,
    ) -> impl Iterator<Item = (usize, HexIndex, &'a TokenInstance)> + 'a {
        self.layers.iter().enumerate().flat_map(move |(layer_index, layer)| {
            layer.tokens.occupied().flat_map(move |(hex, ids)| {
                ids.iter()
                    .filter_map(move |id| self.tokens.get(id))
                    .filter(move |token| token.uid == uid)
                    .map(move |token| (layer_index, hex, token))
            })
        })
    }

    fn check_hex(hex: HexIndex) -> Result<()> {
        if hex >= HEX_COUNT {
            return Err(SequencerError::HexOutOfRange(hex));
        }
        Ok(())
    }

    pub fn with_layer_added(&self, name: &str) -> Result<SessionPatch> {
        let mut controls = self.controls.clone();
        let mut layers = self.layers.clone();
        layers.push(Layer::new(name, &mut controls)?);
        tracing::debug!(name, layers = layers.len(), "layer added");
        Ok(SessionPatch {
            controls: Some(controls),
            layers: Some(layers),
            ..Default::default()
        })
    }

    /// Removes a layer with its tokens and controls. Moves and transfers
    /// aimed at later layers are re-indexed.
    pub fn with_layer_removed(&self, index: usize) -> Result<SessionPatch> {
        self.layer(index)?;
        if self.layers.len() == 1 {
            return Err(SequencerError::LastLayer);
        }
        let mut controls = self.controls.clone();
        let mut tokens = self.tokens.clone();
        let mut layers = self.layers.clone();
        let removed = layers.remove(index);

        for id in removed.controls.values() {
            controls.remove(id);
        }
        for (_, ids) in removed.tokens.occupied() {
            for id in ids {
                if let Some(token) = tokens.remove(id) {
                    for (_, control) in &token.controls {
                        controls.remove(control);
                    }
                }
            }
        }

        let reindex = |target: usize| match target.cmp(&index) {
            std::cmp::Ordering::Less => Some(target),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(target - 1),
        };
        for layer in layers.iter_mut() {
            layer.pending_moves = layer
                .pending_moves
                .iter()
                .filter_map(|m| {
                    reindex(m.dest_layer).map(|dest_layer| ScheduledMove { dest_layer, ..*m })
                })
                .collect();
        }
        let pending_transfers = self
            .pending_transfers
            .iter()
            .filter_map(|t| {
                reindex(t.layer).map(|layer| LayerTransfer {
                    layer,
                    ..t.clone()
                })
            })
            .collect();

        tracing::debug!(index, "layer removed");
        Ok(SessionPatch {
            controls: Some(controls),
            tokens: Some(tokens),
            layers: Some(layers),
            pending_transfers: Some(pending_transfers),
            ..Default::default()
        })
    }

    /// Places a new instance of `token_type` on a hex. Returns the patch and
    /// the new instance id.
    pub fn with_token_placed(
        &self,
        token_type: &TokenType,
        layer: usize,
        hex: HexIndex,
    ) -> Result<(SessionPatch, TokenId)> {
        self.layer(layer)?;
        Self::check_hex(hex)?;
        let mut controls = self.controls.clone();
        let instance = TokenInstance {
            id: TokenId::new(),
            uid: token_type.uid.clone(),
            label: token_type.label.clone(),
            symbol: token_type.symbol.clone(),
            controls: build_controls(&token_type.schema, &mut controls)?,
            store: TokenStore::new(),
        };
        let id = instance.id;
        let mut tokens = self.tokens.clone();
        tokens.insert(id, instance);
        let mut layers = self.layers.clone();
        layers[layer].tokens.push(hex, id);
        Ok((
            SessionPatch {
                controls: Some(controls),
                tokens: Some(tokens),
                layers: Some(layers),
                ..Default::default()
            },
            id,
        ))
    }

    /// Removes one instance and the controls it owns.
    pub fn with_token_removed(&self, layer: usize, hex: HexIndex, id: TokenId) -> Result<SessionPatch> {
        self.layer(layer)?;
        Self::check_hex(hex)?;
        let mut layers = self.layers.clone();
        let cell = layers[layer].tokens.at_mut(hex);
        let before = cell.len();
        cell.retain(|t| *t != id);
        if cell.len() == before {
            return Err(SequencerError::UnknownToken(id));
        }
        let mut tokens = self.tokens.clone();
        let mut controls = self.controls.clone();
        if let Some(token) = tokens.remove(&id) {
            for (_, control) in &token.controls {
                controls.remove(control);
            }
        }
        Ok(SessionPatch {
            controls: Some(controls),
            tokens: Some(tokens),
            layers: Some(layers),
            ..Default::default()
        })
    }

    pub fn with_hex_cleared(&self, layer: usize, hex: HexIndex) -> Result<SessionPatch> {
        self.layer(layer)?;
        Self::check_hex(hex)?;
        let mut layers = self.layers.clone();
        let removed = std::mem::take(layers[layer].tokens.at_mut(hex));
        let mut tokens = self.tokens.clone();
        let mut controls = self.controls.clone();
        for id in removed {
            if let Some(token) = tokens.remove(&id) {
                for (_, control) in &token.controls {
                    controls.remove(control);
                }
            }
        }
        Ok(SessionPatch {
            controls: Some(controls),
            tokens: Some(tokens),
            layers: Some(layers),
            ..Default::default()
        })
    }

    /// Copies every token on `from` onto `to` with independent controls.
    pub fn with_hex_copied(&self, layer: usize, from: HexIndex, to: HexIndex) -> Result<SessionPatch> {
        self.layer(layer)?;
        Self::check_hex(from)?;
        Self::check_hex(to)?;
        let mut layers = self.layers.clone();
        let mut tokens = self.tokens.clone();
        let mut controls = self.controls.clone();
        for id in self.layers[layer].tokens.at(from) {
            let source = self.token(id)?;
            let mut copied = Vec::with_capacity(source.controls.len());
            for (key, control) in &source.controls {
                copied.push((key.clone(), controls.duplicate(control)?));
            }
            let copy = TokenInstance {
                id: TokenId::new(),
                controls: copied,
                ..source.clone()
            };
            layers[layer].tokens.push(to, copy.id);
            tokens.insert(copy.id, copy);
        }
        Ok(SessionPatch {
            controls: Some(controls),
            tokens: Some(tokens),
            layers: Some(layers),
            ..Default::default()
        })
    }

    /// Moves every token from `from` to `to`, keeping ids and controls.
    pub fn with_hex_moved(&self, layer: usize, from: HexIndex, to: HexIndex) -> Result<SessionPatch> {
        self.layer(layer)?;
        Self::check_hex(from)?;
        Self::check_hex(to)?;
        if from == to {
            return Ok(SessionPatch::default());
        }
        let mut layers = self.layers.clone();
        let moving = std::mem::take(layers[layer].tokens.at_mut(from));
        layers[layer].tokens.at_mut(to).extend(moving);
        Ok(SessionPatch {
            layers: Some(layers),
            ..Default::default()
        })
    }

    pub fn with_control_updated(&self, id: ControlId, update: ControlUpdate) -> Result<SessionPatch> {
        let mut controls = self.controls.clone();
        let control = controls
            .get_mut(&id)
            .ok_or(ControlError::UnknownControl(id))?;
        if let Some(source) = update.value_source {
            control.value_source = source;
        }
        if let Some(value) = update.fixed_value {
            check_fixed_value(control, &value)?;
            control.fixed_value = value;
        }
        if let Some(path) = update.inherit {
            crate::control::parse_inherit_path(&path)?;
            control.inherit = Some(path);
        }
        if let Some(oscillator) = update.oscillator {
            control.oscillator = oscillator;
        }
        Ok(SessionPatch {
            controls: Some(controls),
            ..Default::default()
        })
    }

    /// Buffers an incoming note for a layer's next beat-step.
    pub fn with_input_note(&self, layer: usize, note: InputNote) -> Result<SessionPatch> {
        self.layer(layer)?;
        let mut layers = self.layers.clone();
        layers[layer].midi_buffer.push(note);
        Ok(SessionPatch {
            layers: Some(layers),
            ..Default::default()
        })
    }
}

/// A fixed value must match the control's kind, and a select value must be
/// one of its options.
fn check_fixed_value(control: &ControlState, value: &ControlValue) -> Result<(), ControlError> {
    if value.kind() != control.kind {
        return Err(ControlError::WrongKind {
            key: control.key.clone(),
            expected: control.kind,
            found: value.kind(),
        });
    }
    if let ControlValue::Select(option) = value {
        let known = control
            .options
            .as_deref()
            .is_some_and(|options| options.iter().any(|o| o == option));
        if !known {
            return Err(ControlError::UnknownOption {
                key: control.key.clone(),
                value: option.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StateStore;
    use crate::token::builtin_registry;
    use crate::types::ControlKind;

    fn place(session: &mut Session, uid: &str, hex: HexIndex) -> TokenId {
        let registry = builtin_registry();
        let token_type = registry.get(uid).unwrap();
        let (patch, id) = session.with_token_placed(token_type, 0, hex).unwrap();
        session.merge(patch);
        id
    }

    #[test]
    fn new_session_has_globals_and_one_layer() {
        let session = Session::new().unwrap();
        assert_eq!(session.layers.len(), 1);
        assert_eq!(session.globals.len(), player_definitions().len());
        assert_eq!(session.layers[0].controls.len(), layer_definitions().len());
        assert_eq!(
            session.controls.len(),
            player_definitions().len() + layer_definitions().len()
        );
        let tempo = session
            .layer_value(0, "tempo", Clock::default(), &CcTable::default())
            .unwrap();
        assert_eq!(tempo, ControlValue::Decimal(120.0));
    }

    #[test]
    fn placing_and_removing_cascades_controls() {
        let mut session = Session::new().unwrap();
        let base = session.controls.len();
        let id = place(&mut session, "note", 40);
        let owned = session.tokens[&id].controls.len();
        assert!(owned > 0);
        assert_eq!(session.controls.len(), base + owned);
        assert_eq!(session.layers[0].tokens.at(40), &[id]);

        let patch = session.with_token_removed(0, 40, id).unwrap();
        session.merge(patch);
        assert!(session.tokens.is_empty());
        assert_eq!(session.controls.len(), base);
        assert!(session.with_token_removed(0, 40, id).is_err());
    }

    #[test]
    fn copy_duplicates_controls() {
        let mut session = Session::new().unwrap();
        let id = place(&mut session, "rebound", 3);
        let patch = session.with_hex_copied(0, 3, 4).unwrap();
        session.merge(patch);
        let copy = session.layers[0].tokens.at(4)[0];
        assert_ne!(copy, id);
        let original_controls: Vec<_> = session.tokens[&id].controls.iter().map(|c| c.1).collect();
        for (_, control) in &session.tokens[&copy].controls {
            assert!(!original_controls.contains(control));
        }
    }

    #[test]
    fn move_and_clear() {
        let mut session = Session::new().unwrap();
        let id = place(&mut session, "absorb", 10);
        let patch = session.with_hex_moved(0, 10, 11).unwrap();
        session.merge(patch);
        assert!(session.layers[0].tokens.at(10).is_empty());
        assert_eq!(session.layers[0].tokens.at(11), &[id]);
        let patch = session.with_hex_cleared(0, 11).unwrap();
        session.merge(patch);
        assert!(session.tokens.is_empty());
    }

    #[test]
    fn removing_a_layer_drops_its_tokens() {
        let mut session = Session::new().unwrap();
        assert!(matches!(session.with_layer_removed(0), Err(SequencerError::LastLayer)));
        let patch = session.with_layer_added("Layer 2").unwrap();
        session.merge(patch);
        place(&mut session, "note", 0);
        let patch = session.with_layer_removed(0).unwrap();
        session.merge(patch);
        assert_eq!(session.layers.len(), 1);
        assert_eq!(session.layers[0].name, "Layer 2");
        assert!(session.tokens.is_empty());
        assert_eq!(
            session.controls.len(),
            player_definitions().len() + layer_definitions().len()
        );
    }

    #[test]
    fn out_of_range_edits_are_rejected() {
        let session = Session::new().unwrap();
        assert!(matches!(
            session.with_hex_cleared(3, 0),
            Err(SequencerError::LayerOutOfRange(3))
        ));
        assert!(matches!(
            session.with_hex_cleared(0, HEX_COUNT),
            Err(SequencerError::HexOutOfRange(_))
        ));
    }

    #[test]
    fn control_update_through_store() {
        let session = Session::new().unwrap();
        let tempo = session.globals["tempo"];
        let mut store = StateStore::new(session);
        let changed = store
            .try_set("tempo", |s| {
                s.with_control_updated(
                    tempo,
                    ControlUpdate {
                        fixed_value: Some(ControlValue::Decimal(90.0)),
                        ..Default::default()
                    },
                )
            })
            .unwrap();
        assert!(changed);
        let value = store
            .state()
            .layer_value(0, "tempo", Clock::default(), &CcTable::default())
            .unwrap();
        assert_eq!(value, ControlValue::Decimal(90.0));
    }

    #[test]
    fn fixed_values_must_match_the_control() {
        let session = Session::new().unwrap();
        let tempo = session.globals["tempo"];
        let update = |value| ControlUpdate {
            fixed_value: Some(value),
            ..Default::default()
        };
        assert!(matches!(
            session.with_control_updated(tempo, update(ControlValue::Select("fast".into()))),
            Err(SequencerError::Control(ControlError::WrongKind {
                expected: ControlKind::Decimal,
                found: ControlKind::Select,
                ..
            }))
        ));

        let key = session.globals["key"];
        assert!(matches!(
            session.with_control_updated(key, update(ControlValue::Select("H minor".into()))),
            Err(SequencerError::Control(ControlError::UnknownOption { .. }))
        ));
        assert!(
            session
                .with_control_updated(key, update(ControlValue::Select("None".into())))
                .is_ok()
        );
    }

    #[test]
    fn session_round_trips_through_json() {
        let mut session = Session::new().unwrap();
        place(&mut session, "generate", 5);
        session.layers[0].playheads.push(6, Playhead::new(4, Direction::new(2)));
        let json = session.to_json_string().unwrap();
        let back = Session::from_json_str(&json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn short_grids_are_padded() {
        let grid: PlayheadGrid = serde_json::from_str("[[]]").unwrap();
        assert_eq!(grid.at(HEX_COUNT - 1).len(), 0);
        assert!(grid.is_empty());
    }
}
