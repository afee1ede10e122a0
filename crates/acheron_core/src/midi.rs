//! Seams to the MIDI world.
//!
//! The core never touches a device. Outgoing notes go to a [`NoteSink`],
//! incoming controller values are read from a shared [`CcTable`], and incoming
//! notes are buffered per layer until the next beat-step.

use parking_lot::{Mutex, RwLock};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Latest value of every controller number, shared with an input thread.
#[derive(Debug, Clone)]
pub struct CcTable {
    values: Arc<RwLock<[u8; 128]>>,
}

impl Default for CcTable {
    fn default() -> Self {
        Self {
            values: Arc::new(RwLock::new([0; 128])),
        }
    }
}

impl CcTable {
    pub fn get(&self, cc: u8) -> u8 {
        self.values.read()[(cc & 0x7f) as usize]
    }

    pub fn set(&self, cc: u8, value: u8) {
        self.values.write()[(cc & 0x7f) as usize] = value.min(127);
    }
}

/// A note received from an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InputNote {
    pub pitch: u8,
    pub velocity: u8,
    pub channel: u8,
}

/// One chord handed to the output collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteEvent {
    pub layer: usize,
    pub beat: f64,
    pub pitches: Vec<u8>,
    pub outputs: Vec<String>,
    pub channel: u8,
    pub velocity: u8,
    pub duration_ms: f64,
}

pub trait NoteSink: Send {
    fn play_notes(&mut self, event: &NoteEvent);
}

/// Sink that keeps every event, shareable so a caller can inspect what an
/// engine played.
#[derive(Debug, Clone, Default)]
pub struct NoteRecorder {
    events: Arc<Mutex<Vec<NoteEvent>>>,
}

impl NoteRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NoteEvent> {
        self.events.lock().clone()
    }

    /// Removes and returns the events recorded so far.
    pub fn drain(&self) -> Vec<NoteEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl NoteSink for NoteRecorder {
    fn play_notes(&mut self, event: &NoteEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silence;

impl NoteSink for Silence {
    fn play_notes(&mut self, _event: &NoteEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cc_table_is_shared_between_clones() {
        let table = CcTable::default();
        let reader = table.clone();
        table.set(74, 100);
        assert_eq!(reader.get(74), 100);
        table.set(200, 255);
        assert_eq!(reader.get(72), 127);
    }

    #[test]
    fn recorder_drains() {
        let recorder = NoteRecorder::new();
        let mut sink = recorder.clone();
        sink.play_notes(&NoteEvent {
            layer: 0,
            beat: 0.0,
            pitches: vec![60],
            outputs: vec![],
            channel: 1,
            velocity: 90,
            duration_ms: 250.0,
        });
        assert_eq!(recorder.drain().len(), 1);
        assert!(recorder.events().is_empty());
    }
}
