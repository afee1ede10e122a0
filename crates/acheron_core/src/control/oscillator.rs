//! Low-frequency oscillators driving `modulate` controls.

use std::f64::consts::TAU;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::midi::CcTable;
use crate::types::ControlKind;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    #[default]
    Sawtooth,
    ReverseSawtooth,
    Random,
    Sequence,
    #[serde(rename = "midiCC")]
    MidiCc,
}

fn default_period_ms() -> f64 {
    1000.0
}

/// Periods are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Oscillator {
    #[serde(default)]
    pub waveform: Waveform,
    pub min: f64,
    pub max: f64,
    #[serde(default = "default_period_ms")]
    pub period_ms: f64,
    #[serde(default = "default_period_ms")]
    pub low_period_ms: f64,
    #[serde(default = "default_period_ms")]
    pub hi_period_ms: f64,
    #[serde(default)]
    pub sequence: Vec<f64>,
    #[serde(default)]
    pub cc_number: u8,
}

impl Oscillator {
    pub fn new(waveform: Waveform, min: f64, max: f64, period_ms: f64) -> Self {
        Self {
            waveform,
            min,
            max,
            period_ms,
            low_period_ms: default_period_ms(),
            hi_period_ms: default_period_ms(),
            sequence: Vec::new(),
            cc_number: 0,
        }
    }

    /// Sawtooth sweeping a control's whole range, one second per integer
    /// step. Integral kinds sweep one past `max` so flooring reaches it.
    pub fn for_range(kind: ControlKind, min: f64, max: f64) -> Self {
        let extra = if kind == ControlKind::Decimal { 0.0 } else { 1.0 };
        Self::new(
            Waveform::Sawtooth,
            min,
            max + extra,
            (max - min + extra) * 1000.0,
        )
    }

    pub fn effective_period_ms(&self) -> f64 {
        match self.waveform {
            Waveform::Square => self.low_period_ms + self.hi_period_ms,
            _ => self.period_ms,
        }
    }

    /// Value at `elapsed_ms`, wrapped into the current period.
    pub fn evaluate(&self, elapsed_ms: f64, cc: &CcTable) -> f64 {
        let period = self.effective_period_ms();
        let t = if period > 0.0 {
            elapsed_ms.rem_euclid(period)
        } else {
            0.0
        };
        let range = self.max - self.min;
        let phase = if period > 0.0 { t / period } else { 0.0 };

        match self.waveform {
            Waveform::Sine => {
                let amp = range / 2.0;
                self.min + amp + amp * (phase * TAU).sin()
            }
            Waveform::Sawtooth => self.min + phase * range,
            Waveform::ReverseSawtooth => self.max - phase * range,
            Waveform::Triangle => {
                if phase < 0.5 {
                    self.min + range * phase * 2.0
                } else {
                    self.max - range * (phase - 0.5) * 2.0
                }
            }
            Waveform::Square => {
                if t < self.low_period_ms {
                    self.min
                } else {
                    self.max
                }
            }
            Waveform::Random => self.min + rand::random::<f64>() * range,
            Waveform::Sequence => {
                let index = (phase * self.sequence.len() as f64).floor() as usize;
                self.sequence.get(index).copied().unwrap_or(0.0)
            }
            Waveform::MidiCc => self.min + (cc.get(self.cc_number) as f64 / 127.0) * range,
        }
    }
}
