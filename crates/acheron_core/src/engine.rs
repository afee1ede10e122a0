//! The running sequencer: a session store, the token types it can run and
//! the collaborators notes go out to.

use std::collections::HashSet;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::automaton::{self, Runtime};
use crate::config::SequencerConfig;
use crate::error::{Result, SequencerError};
use crate::hex::HexIndex;
use crate::midi::{CcTable, InputNote, NoteEvent, NoteSink};
use crate::session::{ControlUpdate, Session, SessionPatch};
use crate::store::{StateStore, SubscriptionId};
use crate::token::TokenRegistry;
use crate::types::{ControlId, TokenId};

/// What one call to [`Engine::tick`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Layers that beat-stepped, in order.
    pub stepped: Vec<usize>,
    pub notes: Vec<NoteEvent>,
}

/// State that only exists while the sequencer runs.
#[derive(Debug, Default)]
struct PlaybackSession {
    started: HashSet<TokenId>,
}

pub struct Engine {
    store: StateStore<Session>,
    registry: TokenRegistry,
    config: SequencerConfig,
    playback: Option<PlaybackSession>,
    sink: Box<dyn NoteSink>,
    cc: CcTable,
    rng: StdRng,
}

impl Engine {
    /// Engine over a fresh session.
    pub fn new(
        registry: TokenRegistry,
        config: SequencerConfig,
        sink: impl NoteSink + 'static,
    ) -> Result<Self> {
        Ok(Self::with_session(Session::new()?, registry, config, sink))
    }

    pub fn with_session(
        session: Session,
        registry: TokenRegistry,
        config: SequencerConfig,
        sink: impl NoteSink + 'static,
    ) -> Self {
        for token in session.tokens.values() {
            if !registry.contains(&token.uid) {
                tracing::warn!(uid = %token.uid, id = %token.id, "token type not registered, it will be skipped");
            }
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let playback = session.is_playing.then(PlaybackSession::default);
        Self {
            store: StateStore::new(session),
            registry,
            config,
            playback,
            sink: Box::new(sink),
            cc: CcTable::default(),
            rng,
        }
    }

    pub fn session(&self) -> &Session {
        self.store.state()
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Controller values read by `midiCC` oscillators. Clones share storage,
    /// so an input thread can hold one.
    pub fn cc_table(&self) -> CcTable {
        self.cc.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.session().is_playing
    }

    /// Queues an edit; it is applied before the next tick or synchronous
    /// edit.
    pub fn submit<F>(&mut self, why: &str, producer: F)
    where
        F: FnOnce(&Session) -> SessionPatch + Send + 'static,
    {
        self.store.submit(why, producer);
    }

    /// Applies every queued edit.
    pub fn flush(&mut self) -> usize {
        self.store.flush()
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&str, &Session, &Session) + Send + 'static,
    {
        self.store.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    fn edit<F>(&mut self, why: &str, producer: F) -> Result<bool>
    where
        F: FnOnce(&Session) -> Result<SessionPatch>,
    {
        self.store.try_set(why, producer)
    }

    pub fn place_token(&mut self, uid: &str, layer: usize, hex: HexIndex) -> Result<TokenId> {
        let token_type = self
            .registry
            .get(uid)
            .ok_or_else(|| SequencerError::UnknownTokenType(uid.to_string()))?;
        let mut placed = None;
        self.store.try_set("place token", |session| {
            let (patch, id) = session.with_token_placed(token_type, layer, hex)?;
            placed = Some(id);
            Ok::<_, SequencerError>(patch)
        })?;
        let id = placed.ok_or_else(|| SequencerError::UnknownTokenType(uid.to_string()))?;
        tracing::debug!(uid, layer, hex, %id, "token placed");
        Ok(id)
    }

    pub fn remove_token(&mut self, layer: usize, hex: HexIndex, id: TokenId) -> Result<()> {
        self.edit("remove token", |s| s.with_token_removed(layer, hex, id))?;
        if let Some(playback) = self.playback.as_mut() {
            playback.started.remove(&id);
        }
        Ok(())
    }

    pub fn clear_hex(&mut self, layer: usize, hex: HexIndex) -> Result<()> {
        self.edit("clear hex", |s| s.with_hex_cleared(layer, hex))?;
        Ok(())
    }

    pub fn copy_hex(&mut self, layer: usize, from: HexIndex, to: HexIndex) -> Result<()> {
        self.edit("copy hex", |s| s.with_hex_copied(layer, from, to))?;
        Ok(())
    }

    pub fn move_hex(&mut self, layer: usize, from: HexIndex, to: HexIndex) -> Result<()> {
        self.edit("move hex", |s| s.with_hex_moved(layer, from, to))?;
        Ok(())
    }

    /// Appends a layer and returns its index.
    pub fn add_layer(&mut self, name: &str) -> Result<usize> {
        self.edit("add layer", |s| s.with_layer_added(name))?;
        Ok(self.session().layers.len() - 1)
    }

    pub fn remove_layer(&mut self, index: usize) -> Result<()> {
        self.edit("remove layer", |s| s.with_layer_removed(index))?;
        Ok(())
    }

    pub fn update_control(&mut self, id: ControlId, update: ControlUpdate) -> Result<()> {
        self.edit("update control", |s| s.with_control_updated(id, update))?;
        Ok(())
    }

    /// Buffers a note from an input device for the layer's next beat-step.
    pub fn note_on(&mut self, layer: usize, note: InputNote) -> Result<()> {
        self.edit("note on", |s| s.with_input_note(layer, note))?;
        Ok(())
    }

    /// Rewinds every layer, runs every start callback and starts playing.
    /// Notes played by start callbacks are dispatched immediately. Does
    /// nothing while already playing.
    pub fn start(&mut self) -> Result<()> {
        if self.is_playing() {
            return Ok(());
        }
        let mut playback = PlaybackSession::default();
        let Self {
            store,
            registry,
            config,
            sink,
            cc,
            rng,
            ..
        } = self;
        let mut rt = Runtime {
            registry,
            config,
            cc,
            rng,
            started: &playback.started,
            newly_started: Vec::new(),
            notes: Vec::new(),
            stepped: Vec::new(),
        };
        store.try_set("start", |session| automaton::start(session, &mut rt))?;
        let Runtime {
            newly_started,
            notes,
            ..
        } = rt;
        playback.started.extend(newly_started);
        for event in &notes {
            sink.play_notes(event);
        }
        self.playback = Some(playback);
        tracing::info!("playback started");
        Ok(())
    }

    /// Runs every stop callback, clears all playheads and stops playing.
    pub fn stop(&mut self) -> Result<()> {
        if !self.is_playing() {
            return Ok(());
        }
        let started = self
            .playback
            .as_ref()
            .map(|p| p.started.clone())
            .unwrap_or_default();
        let Self {
            store,
            registry,
            config,
            sink,
            cc,
            rng,
            ..
        } = self;
        let mut rt = Runtime {
            registry,
            config,
            cc,
            rng,
            started: &started,
            newly_started: Vec::new(),
            notes: Vec::new(),
            stepped: Vec::new(),
        };
        store.try_set("stop", |session| automaton::stop(session, &mut rt))?;
        for event in &rt.notes {
            sink.play_notes(event);
        }
        self.playback = None;
        tracing::info!("playback stopped");
        Ok(())
    }

    pub fn toggle_playing(&mut self) -> Result<()> {
        if self.is_playing() {
            self.stop()
        } else {
            self.start()
        }
    }

    /// Applies queued edits, then advances every layer by `elapsed_ms`.
    ///
    /// On error the session keeps its pre-tick state and no notes are sent.
    pub fn tick(&mut self, elapsed_ms: f64) -> Result<TickReport> {
        profiling::scope!("tick");
        self.store.flush();
        if !self.is_playing() {
            return Ok(TickReport::default());
        }
        let Self {
            store,
            registry,
            config,
            playback,
            sink,
            cc,
            rng,
        } = self;
        let playback = playback.get_or_insert_with(PlaybackSession::default);
        let mut rt = Runtime {
            registry,
            config,
            cc,
            rng,
            started: &playback.started,
            newly_started: Vec::new(),
            notes: Vec::new(),
            stepped: Vec::new(),
        };
        let result = store.try_set("tick", |session| automaton::advance(session, elapsed_ms, &mut rt));
        if let Err(err) = &result {
            tracing::error!(error = %err, "tick failed");
        }
        result?;

        let Runtime {
            newly_started,
            notes,
            stepped,
            ..
        } = rt;
        playback.started.extend(newly_started);
        for event in &notes {
            sink.play_notes(event);
        }
        if !stepped.is_empty() {
            tracing::debug!(?stepped, notes = notes.len(), "tick");
        }
        Ok(TickReport { stepped, notes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{NoteRecorder, Silence};
    use crate::token::builtin_registry;

    fn engine() -> Engine {
        let config = SequencerConfig {
            seed: Some(1),
            ..Default::default()
        };
        Engine::new(builtin_registry(), config, Silence).unwrap()
    }

    #[test]
    fn idle_engine_does_not_step() {
        let mut engine = engine();
        let report = engine.tick(1000.0).unwrap();
        assert!(report.stepped.is_empty());
        assert_eq!(engine.session().layers[0].current_beat, 0.0);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut engine = engine();
        assert!(matches!(
            engine.place_token("nope", 0, 0),
            Err(SequencerError::UnknownTokenType(_))
        ));
    }

    #[test]
    fn queued_edits_apply_before_tick() {
        let mut engine = engine();
        engine.submit("add layer", |s| s.with_layer_added("queued").unwrap_or_default());
        assert_eq!(engine.session().layers.len(), 1);
        engine.tick(10.0).unwrap();
        assert_eq!(engine.session().layers.len(), 2);
    }

    #[test]
    fn notes_reach_the_sink() {
        let recorder = NoteRecorder::new();
        let config = SequencerConfig {
            seed: Some(3),
            ..Default::default()
        };
        let mut engine = Engine::new(builtin_registry(), config, recorder.clone()).unwrap();
        engine.place_token("generate", 0, 29).unwrap();
        // generate fires on beat 16 heading up into 28
        engine.place_token("note", 0, 28).unwrap();
        engine.start().unwrap();
        for _ in 0..20 {
            engine.tick(500.0).unwrap();
        }
        assert!(!recorder.events().is_empty());
    }
}
