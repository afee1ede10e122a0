//! Pitch layout of the field and the musical key table.

use regex::Regex;

use crate::hex::{HEX_COUNT, HexIndex};

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const MAJOR: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];

/// Note names of the harmonic table, one string per column, top row first.
const FIELD_NOTES: [&str; 17] = [
    "D#7 G#6 C#6 F#5 B4 E4 A3 D3 G2 C2 F1 A#1",
    "G7 C7 F6 A#5 D#5 G#4 C#4 F#3 B2 E2 A1 D1",
    "E7 A6 D6 G5 C5 F4 A#3 D#3 G#2 C#2 F#1 B1",
    "G#7 C#7 F#6 B5 E5 A4 D4 G3 C3 F2 A#1 D#1",
    "F7 A#6 D#6 G#5 C#5 F#4 B3 E3 A2 D2 G1 C1",
    "A7 D7 G6 C6 F5 A#4 D#4 G#3 C#3 F#2 B1 E1",
    "F#7 B6 E6 A5 D5 G4 C4 F3 A#2 D#2 G#1 C#1",
    "A#7 D#7 G#6 C#6 F#5 B4 E4 A3 D3 G2 C2 F1",
    "G7 C7 F6 A#5 D#5 G#4 C#4 F#3 B2 E2 A1 D1",
    "B7 E7 A6 D6 G5 C5 F4 A#3 D#3 G#2 C#2 F#1",
    "G#7 C#7 F#6 B5 E5 A4 D4 G3 C3 F2 A#1 D#1",
    "C8 F7 A#6 D#6 G#5 C#5 F#4 B3 E3 A2 D2 G1",
    "A7 D7 G6 C6 F5 A#4 D#4 G#3 C#3 F#2 B1 E1",
    "C#6 F#7 B6 E6 A5 D5 G4 C4 F3 A#2 D#2 G#1",
    "A#7 D#7 G#6 C#6 F#5 B4 E4 A3 D3 G2 C2 F1",
    "D8 G7 C7 F6 A#5 D#5 G#4 C#4 F#3 B2 E2 A1",
    "B7 E7 A6 D6 G5 C5 F4 A#3 D#3 G#2 C#2 F#1",
];

/// `(name, root pitch class, is_major)` in menu order. "None" is chromatic.
const KEYS: [(&str, u8, bool); 32] = [
    ("A major", 9, true),
    ("A minor", 9, false),
    ("A flat major", 8, true),
    ("A flat minor", 8, false),
    ("A sharp minor", 10, false),
    ("B major", 11, true),
    ("B minor", 11, false),
    ("B flat major", 10, true),
    ("B flat minor", 10, false),
    ("C major", 0, true),
    ("C minor", 0, false),
    ("C flat major", 11, true),
    ("C sharp major", 1, true),
    ("C sharp minor", 1, false),
    ("D major", 2, true),
    ("D minor", 2, false),
    ("D flat major", 1, true),
    ("D flat minor", 1, false),
    ("D sharp minor", 3, false),
    ("E major", 4, true),
    ("E minor", 4, false),
    ("E flat major", 3, true),
    ("E flat minor", 3, false),
    ("F major", 5, true),
    ("F minor", 5, false),
    ("F flat major", 4, true),
    ("F sharp major", 6, true),
    ("F sharp minor", 6, false),
    ("G major", 7, true),
    ("G minor", 7, false),
    ("G flat minor", 6, false),
    ("G sharp minor", 8, false),
];

pub const CHROMATIC_KEY: &str = "None";

lazy_static! {
    static ref RE_NOTE: Regex = Regex::new(r"^([A-G])(#?)(-?\d+)$").unwrap();
    static ref FIELD_PITCHES: Vec<u8> = FIELD_NOTES
        .iter()
        .flat_map(|column| column.split_whitespace())
        .map(|name| parse_note(name).unwrap_or_default())
        .collect();
}

/// Parses a note such as `C#4` into a MIDI note number (C4 = 60).
pub fn parse_note(name: &str) -> Option<u8> {
    let caps = RE_NOTE.captures(name)?;
    let letter = NOTE_NAMES.iter().position(|n| *n == &caps[1])? as i64;
    let sharp = if caps[2].is_empty() { 0 } else { 1 };
    let octave: i64 = caps[3].parse().ok()?;
    let midi = 12 * (octave + 1) + letter + sharp;
    u8::try_from(midi).ok().filter(|m| *m <= 127)
}

pub fn note_name(pitch: u8) -> String {
    let octave = pitch as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[pitch as usize % 12], octave)
}

/// MIDI pitch sounded by a hex.
pub fn hex_pitch(hex: HexIndex) -> u8 {
    let hex = hex % HEX_COUNT;
    FIELD_PITCHES.get(hex).copied().unwrap_or(60)
}

/// Names selectable by a `key` control, chromatic first.
pub fn key_names() -> Vec<String> {
    std::iter::once(CHROMATIC_KEY)
        .chain(KEYS.iter().map(|(name, _, _)| *name))
        .map(String::from)
        .collect()
}

/// Pitch classes admitted by a key, or `None` if the name is unknown.
pub fn key_pitch_classes(key: &str) -> Option<Vec<u8>> {
    if key == CHROMATIC_KEY {
        return Some((0..12).collect());
    }
    KEYS.iter().find(|(name, _, _)| *name == key).map(|(_, root, major)| {
        let intervals = if *major { &MAJOR } else { &MINOR };
        intervals.iter().map(|i| (root + i) % 12).collect()
    })
}

/// Shifts a pitch, dropping results outside the MIDI range.
pub fn transpose(pitch: u8, semitones: i64) -> Option<u8> {
    u8::try_from(pitch as i64 + semitones)
        .ok()
        .filter(|p| *p <= 127)
}
