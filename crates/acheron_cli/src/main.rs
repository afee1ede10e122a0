//! acheron: headless runner for the hex sequencer
//!
//! - `run`: play a saved composition and print every note it produces
//! - `demo`: write a small composition to start from
//! - `schema`: print the JSON Schema of compositions or engine settings
//! - `tokens`: list the built-in token types and their controls

use acheron_core::control::ControlDefinition;
use acheron_core::midi::{NoteEvent, NoteSink, Silence};
use acheron_core::music;
use acheron_core::session::ControlUpdate;
use acheron_core::{
    ControlValue, Direction, Engine, SequencerConfig, Session, TokenId, ValueSource,
    builtin_registry,
};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const DEFAULT_BEATS: f64 = 32.0;
/// Upper bound on ticks when running until a beat count.
const MAX_TICKS: u64 = 10_000_000;

/// Headless runner for the acheron hex sequencer
#[derive(Parser)]
#[command(name = "acheron")]
#[command(about = "Run generative hex-grid compositions without a device")]
#[command(version)]
struct Cli {
    /// Log more (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum SchemaKind {
    Session,
    Config,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a composition and print the notes it produces
    Run {
        /// Path to the composition JSON file
        composition: PathBuf,

        /// Path to an engine settings JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stop once the first layer reaches this beat
        #[arg(short, long, conflicts_with = "ticks")]
        beats: Option<f64>,

        /// Stop after this many ticks
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Milliseconds per tick (default: from the settings)
        #[arg(short, long)]
        interval_ms: Option<f64>,

        /// Sleep the tick interval between ticks
        #[arg(long)]
        realtime: bool,
    },

    /// Write a small starter composition
    Demo {
        /// Where to write it (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a JSON Schema
    Schema {
        #[arg(value_enum, default_value = "session")]
        kind: SchemaKind,
    },

    /// List the built-in token types
    Tokens,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NoteLine<'a> {
    at: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a NoteEvent,
}

/// Prints every note as it is dispatched.
struct ConsoleSink {
    format: OutputFormat,
}

impl NoteSink for ConsoleSink {
    fn play_notes(&mut self, event: &NoteEvent) {
        match self.format {
            OutputFormat::Table => print_note_table(event),
            OutputFormat::Json => print_note_json(event),
        }
    }
}

fn print_note_table(event: &NoteEvent) {
    let time = Local::now().format("%H:%M:%S%.3f");
    let names: Vec<String> = event.pitches.iter().map(|&p| music::note_name(p)).collect();
    let layer = format!("layer {}", event.layer).cyan();
    let beat = format!("{:.2}", event.beat).yellow();
    let notes = names.join(" ").green();
    let detail = format!(
        "ch={} vel={} len={:.0}ms",
        event.channel, event.velocity, event.duration_ms
    )
    .dimmed();

    println!(
        "{} {:>10} beat={:>8} {:<14} {}",
        time, layer, beat, notes, detail
    );
}

fn print_note_json(event: &NoteEvent) {
    let line = NoteLine {
        at: Utc::now(),
        event,
    };
    if let Ok(json) = serde_json::to_string(&line) {
        println!("{}", json);
    }
}

fn load_config(path: Option<&Path>) -> Result<SequencerConfig> {
    match path {
        Some(path) => SequencerConfig::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => Ok(SequencerConfig::default()),
    }
}

fn load_session(path: &Path) -> Result<Session> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Session::from_json_str(&json)
        .with_context(|| format!("failed to parse composition {}", path.display()))
}

fn first_layer_beat(engine: &Engine) -> f64 {
    engine
        .session()
        .layers
        .first()
        .map_or(0.0, |layer| layer.current_beat)
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    composition: &Path,
    config: Option<&Path>,
    beats: Option<f64>,
    ticks: Option<u64>,
    interval_ms: Option<f64>,
    realtime: bool,
    format: OutputFormat,
) -> Result<()> {
    let config = load_config(config)?;
    let session = load_session(composition)?;
    let interval = interval_ms.unwrap_or(config.tick_interval_ms);
    if interval.is_nan() || interval <= 0.0 {
        bail!("tick interval must be positive, got {}", interval);
    }

    let mut engine = Engine::with_session(session, builtin_registry(), config, ConsoleSink { format });
    if format == OutputFormat::Table {
        println!(
            "Playing {} ({} layers, {} tokens)",
            composition.display(),
            engine.session().layers.len(),
            engine.session().tokens.len()
        );
        println!("{}", "-".repeat(90));
    }
    tracing::info!(interval, "starting playback");

    engine.start().context("start callbacks failed")?;
    let target_beat = beats.unwrap_or(DEFAULT_BEATS);
    let limit = ticks.unwrap_or(MAX_TICKS);
    let mut count = 0u64;
    let mut played = 0usize;
    while count < limit {
        if ticks.is_none() && first_layer_beat(&engine) >= target_beat {
            break;
        }
        let report = engine
            .tick(interval)
            .with_context(|| format!("tick {} failed", count))?;
        played += report.notes.len();
        count += 1;
        if realtime {
            thread::sleep(Duration::from_secs_f64(interval / 1000.0));
        }
    }
    engine.stop().context("stop callbacks failed")?;

    if format == OutputFormat::Table {
        println!("{}", "-".repeat(90));
        println!(
            "{} ticks, {} note events, beat {:.2}",
            count,
            played,
            first_layer_beat(&engine)
        );
    }
    Ok(())
}

fn set_fixed(engine: &mut Engine, token: TokenId, key: &str, value: ControlValue) -> Result<()> {
    let id = engine
        .session()
        .token(&token)?
        .control_id(key)
        .with_context(|| format!("token has no control {}", key))?;
    engine.update_control(
        id,
        ControlUpdate {
            value_source: Some(ValueSource::Fixed),
            fixed_value: Some(value),
            ..Default::default()
        },
    )?;
    Ok(())
}

/// A generator sending playheads up a column of notes, bounced back by a
/// rebound at the top.
fn demo_session() -> Result<Session> {
    let mut engine = Engine::new(builtin_registry(), SequencerConfig::default(), Silence)?;
    let generate = engine.place_token("generate", 0, 29)?;
    set_fixed(&mut engine, generate, "pulseEvery", ControlValue::Int(8))?;
    set_fixed(&mut engine, generate, "timeToLive", ControlValue::Int(12))?;

    engine.place_token("note", 0, 28)?;
    let chord = engine.place_token("note", 0, 26)?;
    set_fixed(&mut engine, chord, "triad", ControlValue::Triad(2))?;
    engine.place_token("twist", 0, 25)?;

    let rebound = engine.place_token("rebound", 0, 24)?;
    set_fixed(&mut engine, rebound, "direction", ControlValue::Direction(Direction::new(3)))?;
    set_fixed(&mut engine, rebound, "probability", ControlValue::Int(75))?;
    Ok(engine.session().clone())
}

fn cmd_demo(output: Option<&Path>) -> Result<()> {
    let json = demo_session()?.to_json_string()?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn cmd_schema(kind: SchemaKind) -> Result<()> {
    let schema = match kind {
        SchemaKind::Session => Session::schema(),
        SchemaKind::Config => SequencerConfig::schema(),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn describe_control(def: &ControlDefinition) -> String {
    if let Some(path) = &def.inherit {
        return format!("inherit {}", path);
    }
    let kind = def.kind.map(|k| k.name()).unwrap_or("?");
    match (def.min, def.max, &def.options) {
        (_, _, Some(options)) => format!("{} [{}]", kind, options.join(", ")),
        (Some(min), Some(max), None) => format!("{} {}..{}", kind, min, max),
        _ => kind.to_string(),
    }
}

fn cmd_tokens(format: OutputFormat) -> Result<()> {
    let registry = builtin_registry();
    match format {
        OutputFormat::Table => {
            println!("{:<4} {:<12} {:<12} {}", "", "UID", "LABEL", "CONTROLS");
            println!("{}", "-".repeat(90));
            for token in registry.iter() {
                let keys: Vec<&str> = token.schema.iter().map(|(key, _)| key.as_str()).collect();
                println!(
                    "{:<4} {:<12} {:<12} {}",
                    token.symbol,
                    token.uid.cyan(),
                    token.label,
                    keys.join(", ").dimmed()
                );
            }
            println!("{}", "-".repeat(90));
            println!("{} token types", registry.len());
        }
        OutputFormat::Json => {
            for token in registry.iter() {
                let controls: serde_json::Map<String, serde_json::Value> = token
                    .schema
                    .iter()
                    .map(|(key, def)| (key.clone(), describe_control(def).into()))
                    .collect();
                let obj = serde_json::json!({
                    "uid": token.uid,
                    "label": token.label,
                    "symbol": token.symbol,
                    "controls": controls,
                });
                println!("{}", obj);
            }
        }
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    #[cfg(feature = "profile")]
    let registry = registry.with(tracing_tracy::TracyLayer::default());
    registry.init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            composition,
            config,
            beats,
            ticks,
            interval_ms,
            realtime,
        } => cmd_run(
            &composition,
            config.as_deref(),
            beats,
            ticks,
            interval_ms,
            realtime,
            cli.format,
        ),
        Commands::Demo { output } => cmd_demo(output.as_deref()),
        Commands::Schema { kind } => cmd_schema(kind),
        Commands::Tokens => cmd_tokens(cli.format),
    }
}
