use super::{Gate, gated, start_gate};
use crate::control::ControlDefinition;
use crate::error::TokenError;
use crate::session::TokenStore;
use crate::token::{Helpers, NoteLength, PlayheadView, TokenBehavior, TokenType};

pub(super) fn token_type() -> TokenType {
    TokenType::new(
        "note",
        "Note",
        "♪",
        gated(vec![
            ("triad", ControlDefinition::triad("Triad", 0)),
            ("transpose", ControlDefinition::int("Transpose", -36, 36, 0)),
            ("velocity", ControlDefinition::inherit("layer.velocity")),
            ("emphasis", ControlDefinition::inherit("layer.emphasis")),
            ("noteLength", ControlDefinition::inherit("layer.noteLength")),
        ]),
        Note,
    )
}

/// Plays the hex's triad when struck, at most once per tick.
struct Note;

impl TokenBehavior for Note {
    fn on_start(&self, store: &mut TokenStore, _helpers: &mut Helpers) -> Result<(), TokenError> {
        start_gate(store)
    }

    fn on_tick(
        &self,
        store: &mut TokenStore,
        helpers: &mut Helpers,
        playheads: &[PlayheadView],
    ) -> Result<(), TokenError> {
        let values = helpers.control_values()?;
        let gate = Gate::from_values(&values)?;

        for playhead in playheads {
            if playhead.age == 0 {
                continue;
            }
            if !gate.fires(store, helpers) {
                continue;
            }

            let tempo_sync = helpers
                .layer_value("tempoSync")?
                .as_bool()
                .unwrap_or(true);
            let note_length = values.decimal("noteLength")?;
            let length = if tempo_sync {
                NoteLength::Beats(note_length)
            } else {
                NoteLength::Millis(note_length * 1000.0)
            };
            let velocity = if helpers.current_beat(true)? == 0 {
                values.int("emphasis")?
            } else {
                values.int("velocity")?
            };
            let hex = helpers.hex_index();
            helpers.play_triad(
                hex,
                values.triad("triad")? as i64,
                length,
                velocity,
                values.int("transpose")?,
            )?;
            break;
        }
        Ok(())
    }
}
