//! Generative hex-grid sequencer core
//!
//! Tokens placed on a 17×12 hex field react to playheads travelling across
//! it, emitting notes, spawning, redirecting and relocating playheads. This
//! crate holds the session model, the control resolver, the token runtime and
//! the beat-stepping automaton. It never talks to a device; notes go out
//! through a [`midi::NoteSink`].

#[macro_use]
extern crate lazy_static;

pub mod automaton;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod hex;
pub mod midi;
pub mod music;
pub mod session;
pub mod store;
pub mod token;
pub mod types;

// Re-export commonly used items
pub use config::SequencerConfig;
pub use engine::{Engine, TickReport};
pub use error::{ControlError, Result, SequencerError, TokenError};
pub use session::{Session, SessionPatch};
pub use token::{TokenRegistry, builtin_registry};
pub use types::{ControlId, ControlKind, ControlValue, Direction, TokenId, ValueSource};
