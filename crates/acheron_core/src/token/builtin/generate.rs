use super::saturating_u32;
use crate::control::ControlDefinition;
use crate::error::TokenError;
use crate::session::TokenStore;
use crate::token::{Helpers, PlayheadView, TokenBehavior, TokenType};

pub(super) fn token_type() -> TokenType {
    TokenType::new(
        "generate",
        "Generate",
        "G",
        vec![
            (
                "triggerMode",
                ControlDefinition::select("Trigger Mode", &["beat", "impact", "midi"], "beat"),
            ),
            ("probability", ControlDefinition::int("Probability", 0, 100, 100)),
            ("direction", ControlDefinition::direction("Direction", 0)),
            ("timeToLive", ControlDefinition::inherit("layer.timeToLive")),
            ("pulseEvery", ControlDefinition::inherit("layer.pulseEvery")),
            ("offset", ControlDefinition::int("Offset", 0, 64, 0)),
        ],
        Generate,
    )
}

/// Emits new playheads from its own hex.
struct Generate;

impl TokenBehavior for Generate {
    fn on_tick(
        &self,
        _store: &mut TokenStore,
        helpers: &mut Helpers,
        playheads: &[PlayheadView],
    ) -> Result<(), TokenError> {
        let values = helpers.control_values()?;
        let probability = values.decimal("probability")?;
        let direction = values.direction("direction")?;
        let lifespan = saturating_u32(values.int("timeToLive")?);
        let period = values.int("pulseEvery")? + values.int("offset")?;

        let attempts = match values.select("triggerMode")? {
            "beat" => {
                let beat = helpers.current_beat(false)?;
                usize::from(period > 0 && beat.rem_euclid(period) == 0)
            }
            "impact" => playheads.len(),
            "midi" => usize::from(helpers.is_midi_playing()),
            other => {
                return Err(TokenError::Behavior(format!(
                    "unknown trigger mode {}",
                    other
                )));
            }
        };

        let hex = helpers.hex_index();
        for _ in 0..attempts {
            if helpers.chance(probability) {
                helpers.spawn_playhead(hex, lifespan, direction, 0);
            }
        }
        Ok(())
    }
}
