//! Beat-stepping of layers.
//!
//! Every function here reads a [`Session`] and returns a [`SessionPatch`];
//! nothing is written until the caller commits. A token error therefore
//! leaves the session exactly as it was.

use std::collections::{BTreeMap, HashSet};

use rand::rngs::StdRng;

use crate::config::SequencerConfig;
use crate::control::{Clock, resolve_id};
use crate::error::{ControlError, Result, SequencerError};
use crate::hex::{self, HexIndex};
use crate::midi::{CcTable, NoteEvent};
use crate::session::{
    Layer, LayerTransfer, PlayheadGrid, ScheduledMove, Session, SessionPatch, TokenInstance,
};
use crate::token::{Helpers, PlayheadView, TokenRegistry, TokenType};
use crate::types::TokenId;

/// Everything outside the session a beat-step reads or writes.
pub(crate) struct Runtime<'a> {
    pub registry: &'a TokenRegistry,
    pub config: &'a SequencerConfig,
    pub cc: &'a CcTable,
    pub rng: &'a mut StdRng,
    /// Instances whose start callback already ran this run.
    pub started: &'a HashSet<TokenId>,
    pub newly_started: Vec<TokenId>,
    pub notes: Vec<NoteEvent>,
    pub stepped: Vec<usize>,
}

/// True when a layer at `current_beat` should beat-step after advancing by
/// `beat_delta`: on the very first tick, or when a whole beat is crossed.
pub fn should_step(current_beat: f64, beat_delta: f64) -> bool {
    current_beat == 0.0 || (current_beat + beat_delta).floor() > current_beat.floor()
}

pub fn ms_per_beat(tempo: f64) -> f64 {
    60_000.0 / tempo.max(f64::MIN_POSITIVE)
}

/// Clock of `layer` at `beat`/`elapsed_ms`, with the tempo resolved at that
/// time.
pub(crate) fn layer_clock(
    session: &Session,
    layer: usize,
    beat: f64,
    elapsed_ms: f64,
    cc: &CcTable,
) -> Result<Clock, ControlError> {
    let mut clock = Clock {
        elapsed_ms,
        current_beat: beat,
        ms_per_beat: None,
    };
    let id = session
        .layers
        .get(layer)
        .and_then(|l| l.controls.get("tempo"))
        .ok_or_else(|| ControlError::UnresolvedInherit("layer.tempo".to_string()))?;
    let tempo = resolve_id(id, &session.resolve_context(layer, clock, cc))?
        .as_decimal()
        .unwrap_or(120.0);
    clock.ms_per_beat = Some(ms_per_beat(tempo));
    Ok(clock)
}

fn layer_enabled(session: &Session, layer: usize, clock: Clock, cc: &CcTable) -> Result<bool> {
    Ok(session
        .layer_value(layer, "enabled", clock, cc)?
        .as_bool()
        .unwrap_or(true))
}

/// Token instances a layer runs, in hex order, skipping types that are
/// unknown or switched off.
fn runnable<'s>(
    session: &'s Session,
    layer: usize,
    registry: &'s TokenRegistry,
    config: &SequencerConfig,
) -> Result<Vec<(HexIndex, &'s TokenInstance, &'s TokenType)>> {
    let mut found = Vec::new();
    for (hex, ids) in session.layer(layer)?.tokens.occupied() {
        for id in ids {
            let token = session.token(id)?;
            if !config.token_enabled(&token.uid) {
                continue;
            }
            let Some(token_type) = registry.get(&token.uid) else {
                tracing::trace!(uid = %token.uid, "no behavior registered");
                continue;
            };
            found.push((hex, token, token_type));
        }
    }
    Ok(found)
}

/// Scratch state a beat-step writes into.
struct StepTarget<'w> {
    tokens: &'w mut BTreeMap<TokenId, TokenInstance>,
    playheads: &'w mut PlayheadGrid,
    moves: &'w mut Vec<ScheduledMove>,
}

#[derive(Clone, Copy)]
enum Phase {
    Start,
    Tick,
    Stop,
}

/// Runs one callback for every runnable token on a layer.
fn run_tokens(
    session: &Session,
    layer: usize,
    clock: Clock,
    phase: Phase,
    target: StepTarget,
    rt: &mut Runtime,
) -> Result<()> {
    let StepTarget {
        tokens,
        playheads,
        moves,
    } = target;
    for (hex, token, token_type) in runnable(session, layer, rt.registry, rt.config)? {
        let mut store = tokens
            .get(&token.id)
            .map(|t| t.store.clone())
            .unwrap_or_default();
        let views: Vec<PlayheadView> = playheads.at(hex).iter().map(PlayheadView::from).collect();
        let needs_start = !rt.started.contains(&token.id) && !rt.newly_started.contains(&token.id);
        let mut helpers = Helpers {
            session,
            layer,
            hex,
            token,
            clock,
            cc: rt.cc,
            outputs: &rt.config.midi_outputs,
            playheads: &mut *playheads,
            moves: &mut *moves,
            notes: &mut rt.notes,
            rng: &mut *rt.rng,
        };
        let behavior = &token_type.behavior;
        let outcome = match phase {
            Phase::Start => behavior.on_start(&mut store, &mut helpers),
            Phase::Stop => behavior.on_stop(&mut store, &mut helpers),
            Phase::Tick if needs_start => behavior
                .on_start(&mut store, &mut helpers)
                .and_then(|_| behavior.on_tick(&mut store, &mut helpers, &views)),
            Phase::Tick => behavior.on_tick(&mut store, &mut helpers, &views),
        };
        outcome.map_err(|e| SequencerError::token(&token.uid, e))?;
        let started = match phase {
            Phase::Start => true,
            Phase::Tick => needs_start,
            Phase::Stop => false,
        };
        if started {
            rt.newly_started.push(token.id);
        }
        if let Some(instance) = tokens.get_mut(&token.id) {
            instance.store = store;
        }
    }
    Ok(())
}

/// Moves every live playhead of `layer` one step, ages it, and hands it to
/// its scheduled destination if a token asked for one. Cross-layer moves are
/// pushed onto `transfers`.
fn advance_playheads(
    layer_index: usize,
    layer: &Layer,
    wrap: bool,
    transfers: &mut Vec<LayerTransfer>,
) -> PlayheadGrid {
    let mut next = PlayheadGrid::empty();
    for (hex, cell) in layer.playheads.occupied() {
        for (index, playhead) in cell.iter().enumerate() {
            if !playhead.is_alive() {
                continue;
            }
            let mut aged = playhead.clone();
            aged.age += 1;
            let scheduled = layer
                .pending_moves
                .iter()
                .find(|m| m.src_hex == hex && m.index == index);
            match scheduled {
                Some(m) if m.dest_layer == layer_index => next.push(m.dest_hex, aged),
                Some(m) => transfers.push(LayerTransfer {
                    layer: m.dest_layer,
                    hex: m.dest_hex,
                    playhead: aged,
                }),
                None => {
                    if !wrap && hex::crosses_edge(hex, playhead.direction) {
                        tracing::trace!(hex, direction = %playhead.direction, "playhead left the grid");
                        continue;
                    }
                    next.push(hex::adjacent(hex, playhead.direction, 1), aged);
                }
            }
        }
    }
    next
}

/// Advances every layer by `elapsed_ms`, beat-stepping those that cross a
/// beat.
pub(crate) fn advance(session: &Session, elapsed_ms: f64, rt: &mut Runtime) -> Result<SessionPatch> {
    profiling::scope!("advance");
    if !session.is_playing {
        return Ok(SessionPatch::default());
    }
    let mut layers = session.layers.clone();
    let mut tokens = session.tokens.clone();
    let mut transfers = session.pending_transfers.clone();

    for index in 0..layers.len() {
        let (arrived, waiting): (Vec<_>, Vec<_>) =
            transfers.into_iter().partition(|t| t.layer == index);
        transfers = waiting;
        for transfer in arrived {
            layers[index].playheads.push(transfer.hex, transfer.playhead);
        }

        let before = &session.layers[index];
        let now = layer_clock(session, index, before.current_beat, before.current_time_ms, rt.cc)?;
        let beat_delta = elapsed_ms / now.ms_per_beat.unwrap_or(500.0);
        let after = Clock {
            elapsed_ms: before.current_time_ms + elapsed_ms,
            current_beat: before.current_beat + beat_delta,
            ms_per_beat: now.ms_per_beat,
        };

        if layer_enabled(session, index, now, rt.cc)? && should_step(before.current_beat, beat_delta) {
            profiling::scope!("beat_step");
            let layer = &mut layers[index];
            let mut playheads =
                advance_playheads(index, layer, rt.config.wrap_playheads, &mut transfers);
            let mut moves = Vec::new();
            run_tokens(
                session,
                index,
                after,
                Phase::Tick,
                StepTarget {
                    tokens: &mut tokens,
                    playheads: &mut playheads,
                    moves: &mut moves,
                },
                rt,
            )?;
            tracing::trace!(
                layer = index,
                beat = after.current_beat,
                playheads = playheads.count(),
                "beat-step"
            );
            layer.playheads = playheads;
            layer.pending_moves = moves;
            layer.midi_buffer.clear();
            rt.stepped.push(index);
        }

        layers[index].current_beat = after.current_beat;
        layers[index].current_time_ms = after.elapsed_ms;
    }

    Ok(SessionPatch {
        tokens: Some(tokens),
        layers: Some(layers),
        pending_transfers: Some(transfers),
        ..Default::default()
    })
}

/// Resets every layer to beat zero and runs every start callback. Playheads
/// spawned by start callbacks are kept.
pub(crate) fn start(session: &Session, rt: &mut Runtime) -> Result<SessionPatch> {
    let mut layers = session.layers.clone();
    let mut tokens = session.tokens.clone();
    for (index, layer) in layers.iter_mut().enumerate() {
        let clock = layer_clock(session, index, 0.0, 0.0, rt.cc)?;
        let mut playheads = PlayheadGrid::empty();
        let mut moves = Vec::new();
        run_tokens(
            session,
            index,
            clock,
            Phase::Start,
            StepTarget {
                tokens: &mut tokens,
                playheads: &mut playheads,
                moves: &mut moves,
            },
            rt,
        )?;
        layer.current_beat = 0.0;
        layer.current_time_ms = 0.0;
        layer.playheads = playheads;
        layer.pending_moves = moves;
    }
    tracing::debug!(layers = layers.len(), tokens = rt.newly_started.len(), "started");
    Ok(SessionPatch {
        tokens: Some(tokens),
        layers: Some(layers),
        is_playing: Some(true),
        pending_transfers: Some(Vec::new()),
        ..Default::default()
    })
}

/// Runs every stop callback and clears all playheads.
pub(crate) fn stop(session: &Session, rt: &mut Runtime) -> Result<SessionPatch> {
    let mut layers = session.layers.clone();
    let mut tokens = session.tokens.clone();
    for (index, layer) in layers.iter_mut().enumerate() {
        let clock = layer_clock(session, index, layer.current_beat, layer.current_time_ms, rt.cc)?;
        let mut scratch = PlayheadGrid::empty();
        let mut moves = Vec::new();
        run_tokens(
            session,
            index,
            clock,
            Phase::Stop,
            StepTarget {
                tokens: &mut tokens,
                playheads: &mut scratch,
                moves: &mut moves,
            },
            rt,
        )?;
        layer.playheads = PlayheadGrid::empty();
        layer.pending_moves.clear();
    }
    tracing::debug!("stopped");
    Ok(SessionPatch {
        tokens: Some(tokens),
        layers: Some(layers),
        is_playing: Some(false),
        pending_transfers: Some(Vec::new()),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Playhead;
    use crate::types::Direction;

    #[test]
    fn beat_crossings() {
        assert!(should_step(0.0, 0.8));
        assert!(should_step(0.8, 0.8));
        assert!(!should_step(0.4, 0.4));
        assert!(should_step(2.4, 0.8));
        assert!(!should_step(1.6, 0.2));
    }

    #[test]
    fn tempo_to_beat_length() {
        assert_eq!(ms_per_beat(120.0), 500.0);
        assert_eq!(ms_per_beat(60.0), 1000.0);
    }

    fn layer_with(hex: HexIndex, playhead: Playhead) -> Layer {
        let mut controls = crate::control::ControlRegistry::new();
        let mut layer = Layer::new("test", &mut controls).unwrap();
        layer.playheads.push(hex, playhead);
        layer
    }

    #[test]
    fn playheads_move_and_age() {
        let layer = layer_with(29, Playhead::new(4, Direction::new(1)));
        let mut transfers = Vec::new();
        let next = advance_playheads(0, &layer, true, &mut transfers);
        assert_eq!(next.at(41).len(), 1);
        assert_eq!(next.at(41)[0].age, 1);
        assert!(transfers.is_empty());
    }

    #[test]
    fn dead_playheads_are_dropped() {
        let mut playhead = Playhead::new(2, Direction::new(0));
        playhead.age = 2;
        let layer = layer_with(29, playhead);
        let next = advance_playheads(0, &layer, true, &mut Vec::new());
        assert!(next.is_empty());
    }

    #[test]
    fn edge_crossing_respects_wrap_setting() {
        let layer = layer_with(0, Playhead::new(4, Direction::new(0)));
        assert_eq!(advance_playheads(0, &layer, true, &mut Vec::new()).at(11).len(), 1);
        assert!(advance_playheads(0, &layer, false, &mut Vec::new()).is_empty());
    }

    #[test]
    fn scheduled_moves_take_precedence() {
        let mut layer = layer_with(29, Playhead::new(4, Direction::new(1)));
        layer.pending_moves.push(ScheduledMove {
            src_hex: 29,
            index: 0,
            dest_hex: 100,
            dest_layer: 0,
        });
        let next = advance_playheads(0, &layer, false, &mut Vec::new());
        assert_eq!(next.at(100).len(), 1);

        layer.pending_moves[0].dest_layer = 1;
        let mut transfers = Vec::new();
        let next = advance_playheads(0, &layer, true, &mut transfers);
        assert!(next.is_empty());
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].layer, 1);
        assert_eq!(transfers[0].hex, 100);
        assert_eq!(transfers[0].playhead.age, 1);
    }
}
