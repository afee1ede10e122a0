use serde_json::Value;

use super::{Gate, gated, init_counter, start_gate, store_int};
use crate::control::ControlDefinition;
use crate::error::TokenError;
use crate::session::TokenStore;
use crate::token::{ControlValues, Helpers, OtherInstance, PlayheadView, TokenBehavior, TokenType};

const SEQUENCE_COUNTER: &str = "sequenceCounter";
const LAST_WARPED_AT: &str = "lastWarpedAt";

pub(super) fn token_type() -> TokenType {
    TokenType::new(
        "wormhole",
        "Wormhole",
        "W",
        gated(vec![
            ("syncChannels", ControlDefinition::bool("Sync Channel I/O", true)),
            ("channel", ControlDefinition::int("Channel", 0, 999, 0)),
            ("sendToChannel", ControlDefinition::int("Send to Channel", 0, 999, 0)),
            (
                "receiveFromChannel",
                ControlDefinition::int("Receive from Channel", 0, 999, 0),
            ),
            (
                "behavior",
                ControlDefinition::select("Send Behavior", &["sequence", "random"], "sequence"),
            ),
            ("priority", ControlDefinition::int("Priority", -999, 999, 0)),
        ]),
        Wormhole,
    )
}

/// Channel settings of one wormhole.
struct Channels {
    channel: i64,
    send: i64,
    receive: i64,
}

impl Channels {
    fn from_values(values: &ControlValues) -> Result<Self, TokenError> {
        let channel = values.int("channel")?;
        if values.bool("syncChannels")? {
            return Ok(Self {
                channel,
                send: channel,
                receive: channel,
            });
        }
        Ok(Self {
            channel,
            send: values.int("sendToChannel")?,
            receive: values.int("receiveFromChannel")?,
        })
    }

    fn can_send_to(&self, other: &Channels) -> bool {
        self.send == other.channel && other.receive == self.channel
    }
}

/// Warps struck playheads to another wormhole that listens on this one's
/// channel.
struct Wormhole;

impl Wormhole {
    fn targets(helpers: &Helpers, ours: &Channels) -> Result<Vec<OtherInstance>, TokenError> {
        let mut targets = Vec::new();
        for other in helpers.other_instances()? {
            if ours.can_send_to(&Channels::from_values(&other.values)?) {
                targets.push(other);
            }
        }
        let mut keyed = Vec::with_capacity(targets.len());
        for target in targets {
            keyed.push((target.values.int("priority")?, target));
        }
        keyed.sort_by_key(|(priority, _)| *priority);
        Ok(keyed.into_iter().map(|(_, target)| target).collect())
    }
}

impl TokenBehavior for Wormhole {
    fn on_start(&self, store: &mut TokenStore, _helpers: &mut Helpers) -> Result<(), TokenError> {
        init_counter(store, SEQUENCE_COUNTER);
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
        let ours = Channels::from_values(&values)?;
        let beat = helpers.current_beat(false)?;

        for (index, playhead) in playheads.iter().enumerate() {
            // a playhead that just came out of a wormhole is not sent back
            let arrived = helpers
                .playhead_store(index)
                .and_then(|s| s.get(LAST_WARPED_AT))
                .and_then(Value::as_i64)
                == Some(beat - 1);
            if arrived || playhead.age == 0 {
                continue;
            }
            if !gate.fires(store, helpers) {
                continue;
            }

            let targets = Self::targets(helpers, &ours)?;
            if targets.is_empty() {
                continue;
            }
            let choice = match values.select("behavior")? {
                "random" => helpers.random_index(targets.len()),
                _ => {
                    let counter = store_int(store, SEQUENCE_COUNTER) + 1;
                    store.insert(SEQUENCE_COUNTER.to_string(), Value::from(counter));
                    counter.rem_euclid(targets.len() as i64) as usize
                }
            };
            let target = &targets[choice];
            helpers.warp_playhead(index, target.hex, Some(target.layer));
            if let Some(playhead_store) = helpers.playhead_store(index) {
                playhead_store.insert(LAST_WARPED_AT.to_string(), Value::from(beat));
            }
        }
        Ok(())
    }
}
