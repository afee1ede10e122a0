//! Types that redirect, relocate or end the playheads striking them.

use super::{Gate, gated, saturating_u32, start_gate};
use crate::control::ControlDefinition;
use crate::error::TokenError;
use crate::hex::HEX_COUNT;
use crate::session::TokenStore;
use crate::token::{ControlValues, Helpers, PlayheadPatch, PlayheadView, TokenBehavior, TokenType};
use crate::types::Direction;

/// Applied to each struck playhead the gate lets through.
type Action = fn(&ControlValues, &mut Helpers, usize, PlayheadView) -> Result<(), TokenError>;

struct Motion(Action);

impl TokenBehavior for Motion {
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
        for (index, playhead) in playheads.iter().enumerate() {
            if playhead.age == 0 {
                continue;
            }
            if gate.fires(store, helpers) {
                (self.0)(&values, helpers, index, *playhead)?;
            }
        }
        Ok(())
    }
}

fn motion(
    uid: &str,
    label: &str,
    symbol: &str,
    controls: Vec<(&'static str, ControlDefinition)>,
    action: Action,
) -> TokenType {
    TokenType::new(uid, label, symbol, gated(controls), Motion(action))
}

pub(super) fn token_types() -> Vec<TokenType> {
    vec![
        motion("absorb", "Absorb", "x", vec![], absorb),
        motion(
            "rebound",
            "Rebound",
            ">",
            vec![("direction", ControlDefinition::direction("Direction", 0))],
            rebound,
        ),
        motion(
            "twist",
            "Twist",
            "T",
            vec![("twistAmount", ControlDefinition::int("Twist Amount", -3, 3, 1))],
            twist,
        ),
        motion(
            "lifespan",
            "Lifespan",
            "L",
            vec![("amount", ControlDefinition::int("Amount", -32, 32, 0))],
            lifespan,
        ),
        motion(
            "skip",
            "Skip",
            "K",
            vec![("skipAmount", ControlDefinition::int("Skip Amount", -16, 16, 2))],
            skip,
        ),
        motion(
            "shift",
            "Shift",
            "<",
            vec![("shift", ControlDefinition::int("Shift", -8, 8, 1))],
            shift,
        ),
        motion(
            "randomize",
            "Randomize",
            "*",
            vec![
                ("randomLocation", ControlDefinition::bool("Random Location", true)),
                ("randomDirection", ControlDefinition::bool("Random Direction", false)),
                ("randomLayer", ControlDefinition::bool("Random Layer", false)),
            ],
            randomize,
        ),
        motion(
            "split",
            "Split",
            "Y",
            vec![("bounceback", ControlDefinition::bool("Bounceback", false))],
            split,
        ),
    ]
}

fn absorb(
    _values: &ControlValues,
    helpers: &mut Helpers,
    index: usize,
    playhead: PlayheadView,
) -> Result<(), TokenError> {
    helpers.modify_playhead(
        index,
        PlayheadPatch {
            age: Some(playhead.lifespan),
            ..Default::default()
        },
    );
    Ok(())
}

fn rebound(
    values: &ControlValues,
    helpers: &mut Helpers,
    index: usize,
    _playhead: PlayheadView,
) -> Result<(), TokenError> {
    helpers.modify_playhead(
        index,
        PlayheadPatch {
            direction: Some(values.direction("direction")?),
            ..Default::default()
        },
    );
    Ok(())
}

fn twist(
    values: &ControlValues,
    helpers: &mut Helpers,
    index: usize,
    playhead: PlayheadView,
) -> Result<(), TokenError> {
    let direction = playhead.direction.rotate(values.int("twistAmount")?);
    helpers.modify_playhead(
        index,
        PlayheadPatch {
            direction: Some(direction),
            ..Default::default()
        },
    );
    Ok(())
}

fn lifespan(
    values: &ControlValues,
    helpers: &mut Helpers,
    index: usize,
    playhead: PlayheadView,
) -> Result<(), TokenError> {
    let lifespan = saturating_u32(i64::from(playhead.lifespan) + values.int("amount")?);
    helpers.modify_playhead(
        index,
        PlayheadPatch {
            lifespan: Some(lifespan),
            ..Default::default()
        },
    );
    Ok(())
}

fn skip(
    values: &ControlValues,
    helpers: &mut Helpers,
    index: usize,
    playhead: PlayheadView,
) -> Result<(), TokenError> {
    helpers.skip_playhead(index, playhead.direction, values.int("skipAmount")?);
    Ok(())
}

fn shift(
    values: &ControlValues,
    helpers: &mut Helpers,
    index: usize,
    _playhead: PlayheadView,
) -> Result<(), TokenError> {
    let target = helpers.hex_index() as i64 + values.int("shift")? * 24;
    let target = target.clamp(0, HEX_COUNT as i64 - 1) as usize;
    let layer = helpers.layer_index();
    helpers.warp_playhead(index, target, Some(layer));
    Ok(())
}

fn randomize(
    values: &ControlValues,
    helpers: &mut Helpers,
    index: usize,
    _playhead: PlayheadView,
) -> Result<(), TokenError> {
    let random_location = values.bool("randomLocation")?;
    let random_layer = values.bool("randomLayer")?;
    if random_location || random_layer {
        let layer = if random_layer {
            let count = helpers.layer_count();
            helpers.random_index(count)
        } else {
            helpers.layer_index()
        };
        let hex = if random_location {
            helpers.random_index(HEX_COUNT)
        } else {
            helpers.hex_index()
        };
        helpers.warp_playhead(index, hex, Some(layer));
    }
    if values.bool("randomDirection")? {
        let direction = helpers.random_direction();
        helpers.modify_playhead(
            index,
            PlayheadPatch {
                direction: Some(direction),
                ..Default::default()
            },
        );
    }
    Ok(())
}

fn split(
    values: &ControlValues,
    helpers: &mut Helpers,
    _index: usize,
    playhead: PlayheadView,
) -> Result<(), TokenError> {
    let bounceback = values.bool("bounceback")?;
    let opposite = helpers.opposite_direction(playhead.direction);
    let remaining = playhead.lifespan.saturating_sub(playhead.age);
    let hex = helpers.hex_index();
    for direction in Direction::all() {
        if direction == playhead.direction || (!bounceback && direction == opposite) {
            continue;
        }
        helpers.spawn_playhead(hex, remaining, direction, 0);
    }
    Ok(())
}
