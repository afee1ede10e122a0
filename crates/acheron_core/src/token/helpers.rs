//! The only surface a token callback can act through.

use std::collections::BTreeMap;

use rand::Rng;
use rand::rngs::StdRng;

use super::{ControlValues, PlayheadPatch};
use crate::automaton::layer_clock;
use crate::control::{Clock, ResolveContext, resolve_id};
use crate::error::TokenError;
use crate::hex::{self, HEX_COUNT, HexIndex};
use crate::midi::{CcTable, InputNote, NoteEvent};
use crate::music;
use crate::session::{Playhead, PlayheadGrid, ScheduledMove, Session, TokenInstance, TokenStore};
use crate::types::{ControlKind, ControlValue, Direction, TokenId};

const DEFAULT_MS_PER_BEAT: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteLength {
    Beats(f64),
    Millis(f64),
}

/// Another placed instance of the calling token's type.
#[derive(Debug, Clone, PartialEq)]
pub struct OtherInstance {
    pub id: TokenId,
    pub layer: usize,
    pub hex: HexIndex,
    pub values: ControlValues,
}

/// Bound to one token instance on one hex for the duration of a callback.
///
/// Reads come from the session as it was before the tick. Writes land in the
/// grid being built for the next beat, in the move list consumed by the
/// following beat-step, or in the outgoing note list.
pub struct Helpers<'a> {
    pub(crate) session: &'a Session,
    pub(crate) layer: usize,
    pub(crate) hex: HexIndex,
    pub(crate) token: &'a TokenInstance,
    pub(crate) clock: Clock,
    pub(crate) cc: &'a CcTable,
    pub(crate) outputs: &'a [String],
    pub(crate) playheads: &'a mut PlayheadGrid,
    pub(crate) moves: &'a mut Vec<ScheduledMove>,
    pub(crate) notes: &'a mut Vec<NoteEvent>,
    pub(crate) rng: &'a mut StdRng,
}

impl<'a> Helpers<'a> {
    fn context(&self) -> ResolveContext<'a> {
        self.session.resolve_context(self.layer, self.clock, self.cc)
    }

    pub fn hex_index(&self) -> HexIndex {
        self.hex
    }

    pub fn layer_index(&self) -> usize {
        self.layer
    }

    pub fn layer_count(&self) -> usize {
        self.session.layers.len()
    }

    /// Beat position after this tick's advance.
    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn control_value(&self, key: &str) -> Result<ControlValue, TokenError> {
        let id = self
            .token
            .control_id(key)
            .ok_or_else(|| TokenError::MissingControl(key.to_string()))?;
        Ok(resolve_id(&id, &self.context())?)
    }

    pub fn control_values(&self) -> Result<ControlValues, TokenError> {
        let ctx = self.context();
        let mut values = BTreeMap::new();
        for (key, id) in &self.token.controls {
            values.insert(key.clone(), resolve_id(id, &ctx)?);
        }
        Ok(ControlValues::new(values))
    }

    /// Resolves one of the current layer's controls.
    pub fn layer_value(&self, key: &str) -> Result<ControlValue, TokenError> {
        let id = self
            .session
            .layers
            .get(self.layer)
            .and_then(|layer| layer.controls.get(key))
            .ok_or_else(|| TokenError::MissingControl(format!("layer.{}", key)))?;
        Ok(resolve_id(id, &self.context())?)
    }

    fn layer_int(&self, key: &str) -> Result<i64, TokenError> {
        let value = self.layer_value(key)?;
        value.as_int().ok_or_else(|| TokenError::WrongKind {
            key: key.to_string(),
            expected: ControlKind::Int,
        })
    }

    /// Every other instance of the same type, with control values resolved
    /// against the layer that instance sits on.
    pub fn other_instances(&self) -> Result<Vec<OtherInstance>, TokenError> {
        let mut found = Vec::new();
        for (layer, hex, instance) in self.session.instances_of(&self.token.uid) {
            if instance.id == self.token.id {
                continue;
            }
            let state = &self.session.layers[layer];
            let clock = layer_clock(
                self.session,
                layer,
                state.current_beat,
                state.current_time_ms,
                self.cc,
            )?;
            let ctx = self.session.resolve_context(layer, clock, self.cc);
            let mut values = BTreeMap::new();
            for (key, id) in &instance.controls {
                values.insert(key.clone(), resolve_id(id, &ctx)?);
            }
            found.push(OtherInstance {
                id: instance.id,
                layer,
                hex,
                values: ControlValues::new(values),
            });
        }
        Ok(found)
    }

    pub fn spawn_playhead(&mut self, hex: HexIndex, lifespan: u32, direction: Direction, offset: i64) {
        let target = hex::adjacent(hex % HEX_COUNT, direction, offset);
        self.playheads.push(target, Playhead::new(lifespan, direction));
    }

    fn has_playhead(&self, index: usize) -> bool {
        index < self.playheads.at(self.hex).len()
    }

    /// Overwrites attributes of a playhead on this hex. Unknown indices are
    /// ignored.
    pub fn modify_playhead(&mut self, index: usize, patch: PlayheadPatch) {
        let Some(playhead) = self.playheads.at_mut(self.hex).get_mut(index) else {
            return;
        };
        if let Some(age) = patch.age {
            playhead.age = age;
        }
        if let Some(lifespan) = patch.lifespan {
            playhead.lifespan = lifespan;
        }
        if let Some(direction) = patch.direction {
            playhead.direction = direction;
        }
    }

    pub fn playhead_store(&mut self, index: usize) -> Option<&mut TokenStore> {
        self.playheads
            .at_mut(self.hex)
            .get_mut(index)
            .map(|playhead| &mut playhead.store)
    }

    fn schedule(&mut self, next: ScheduledMove) {
        match self
            .moves
            .iter_mut()
            .find(|m| m.src_hex == next.src_hex && m.index == next.index)
        {
            Some(existing) => *existing = next,
            None => self.moves.push(next),
        }
    }

    /// Relocates a playhead at the next beat-step instead of letting it
    /// advance. `layer` defaults to the current one.
    pub fn warp_playhead(&mut self, index: usize, dest_hex: HexIndex, layer: Option<usize>) {
        let dest_layer = layer.unwrap_or(self.layer);
        if !self.has_playhead(index) || dest_layer >= self.layer_count() {
            tracing::trace!(index, dest_layer, "warp ignored");
            return;
        }
        self.schedule(ScheduledMove {
            src_hex: self.hex,
            index,
            dest_hex: dest_hex % HEX_COUNT,
            dest_layer,
        });
    }

    pub fn skip_playhead(&mut self, index: usize, direction: Direction, amount: i64) {
        if !self.has_playhead(index) {
            return;
        }
        self.schedule(ScheduledMove {
            src_hex: self.hex,
            index,
            dest_hex: hex::adjacent(self.hex, direction, amount),
            dest_layer: self.layer,
        });
    }

    pub fn opposite_direction(&self, direction: Direction) -> Direction {
        hex::opposite(direction)
    }

    pub fn bar_length(&self) -> Result<i64, TokenError> {
        self.layer_int("barLength")
    }

    /// Whole beats elapsed, optionally folded into the current bar.
    pub fn current_beat(&self, within_bar: bool) -> Result<i64, TokenError> {
        let beat = self.clock.current_beat.floor() as i64;
        if within_bar {
            Ok(beat.rem_euclid(self.bar_length()?.max(1)))
        } else {
            Ok(beat)
        }
    }

    pub fn input_notes(&self) -> &[InputNote] {
        self.session
            .layers
            .get(self.layer)
            .map(|layer| layer.midi_buffer.as_slice())
            .unwrap_or(&[])
    }

    /// True when a buffered input note has this hex's pitch.
    pub fn is_midi_playing(&self) -> bool {
        let pitch = music::hex_pitch(self.hex);
        self.input_notes().iter().any(|note| note.pitch == pitch)
    }

    /// Plays the root of `hex` and, for triads 1 to 6, the two neighbours on
    /// either side of direction `triad - 1`. Pitches outside the layer key are
    /// dropped before transposing.
    pub fn play_triad(
        &mut self,
        hex: HexIndex,
        triad: i64,
        length: NoteLength,
        velocity: i64,
        transpose: i64,
    ) -> Result<(), TokenError> {
        let hex = hex % HEX_COUNT;
        let triad = triad.rem_euclid(7);
        let mut hexes = vec![hex];
        if triad > 0 {
            hexes.push(hex::adjacent(hex, Direction::new(triad - 1), 1));
            hexes.push(hex::adjacent(hex, Direction::new(triad), 1));
        }

        let key = self.layer_value("key")?;
        let key = key.as_select().unwrap_or(music::CHROMATIC_KEY);
        let classes = music::key_pitch_classes(key).unwrap_or_else(|| {
            tracing::warn!(key, "unknown key, playing chromatically");
            (0..12).collect()
        });
        let semitones = self.layer_int("transpose")? + transpose;
        let pitches: Vec<u8> = hexes
            .into_iter()
            .map(music::hex_pitch)
            .filter(|pitch| classes.contains(&(pitch % 12)))
            .filter_map(|pitch| music::transpose(pitch, semitones))
            .collect();
        if pitches.is_empty() {
            return Ok(());
        }

        let channel = self.layer_int("midiChannel")?.clamp(1, 16) as u8;
        let duration_ms = match length {
            NoteLength::Millis(ms) => ms,
            NoteLength::Beats(beats) => {
                beats * self.clock.ms_per_beat.unwrap_or(DEFAULT_MS_PER_BEAT)
            }
        };
        self.notes.push(NoteEvent {
            layer: self.layer,
            beat: self.clock.current_beat,
            pitches,
            outputs: self.outputs.to_vec(),
            channel,
            velocity: velocity.clamp(0, 127) as u8,
            duration_ms,
        });
        Ok(())
    }

    /// True with probability `percent / 100`.
    pub fn chance(&mut self, percent: f64) -> bool {
        percent / 100.0 > self.rng.random::<f64>()
    }

    pub fn random_index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.rng.random_range(0..len)
    }

    pub fn random_direction(&mut self) -> Direction {
        Direction::new(self.rng.random_range(0..Direction::COUNT as i64))
    }
}
