//! Engine settings.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Per-token-type switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenSettings {
    #[serde(default = "TokenSettings::default_enabled")]
    pub enabled: bool,
}

impl TokenSettings {
    fn default_enabled() -> bool {
        true
    }
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SequencerConfig {
    /// Playheads leaving one edge re-enter on the other; otherwise they are
    /// dropped.
    #[serde(default = "SequencerConfig::default_wrap_playheads")]
    pub wrap_playheads: bool,
    /// Output names attached to every note event.
    #[serde(default)]
    pub midi_outputs: Vec<String>,
    /// Keyed by token uid. Types missing here are enabled.
    #[serde(default)]
    pub tokens: BTreeMap<String, TokenSettings>,
    /// Seed for token randomness; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Cadence a driving timer should tick at.
    #[serde(default = "SequencerConfig::default_tick_interval_ms")]
    pub tick_interval_ms: f64,
}

impl SequencerConfig {
    fn default_wrap_playheads() -> bool {
        true
    }

    fn default_tick_interval_ms() -> f64 {
        10.0
    }

    pub fn token_enabled(&self, uid: &str) -> bool {
        self.tokens.get(uid).is_none_or(|t| t.enabled)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn schema() -> schemars::Schema {
        schemars::schema_for!(SequencerConfig)
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            wrap_playheads: Self::default_wrap_playheads(),
            midi_outputs: Vec::new(),
            tokens: BTreeMap::new(),
            seed: None,
            tick_interval_ms: Self::default_tick_interval_ms(),
        }
    }
}
