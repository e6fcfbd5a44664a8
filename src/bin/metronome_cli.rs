//! Headless CLI exercising the metronome engine without a UI layer —
//! grounded on the teacher's `beatbox_cli` (clap-derive subcommands,
//! `anyhow`-wrapped `run()`, JSON report to stdout), with the
//! fixture-classification harness replaced by metronome control-plane
//! operations (start/stop/tap/bpm/time-signature/subdivision/preset).

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use metronome_core::audio::backend::{AudioOutputBackend, StubOutputBackend};
use metronome_core::clock::ClockSource;
use metronome_core::config::AppConfig;
use metronome_core::haptic::NullHapticBackend;
use metronome_core::orchestrator::Orchestrator;
use metronome_core::sync::peer_sync::InMemoryPeerChannel;
use metronome_core::sync::PeerChannel;
use metronome_core::timing::{AccentPreset, Subdivision, TimeSignature};

#[derive(Parser, Debug)]
#[command(
    name = "metronome_cli",
    about = "Headless driver for the metronome/tuner real-time core"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the engine and let it run for a fixed duration, then stop.
    Start {
        #[arg(long, default_value_t = 2.0)]
        duration_secs: f64,
    },
    /// Simulate a sequence of evenly-spaced taps and report the estimated BPM.
    Tap {
        #[arg(long, default_value_t = 4)]
        count: u32,
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },
    /// Set the BPM on a fresh engine and print the resulting snapshot.
    SetBpm { bpm: u32 },
    /// Set the time signature on a fresh engine.
    SetTimeSignature {
        beats_per_bar: u32,
        beat_unit: u32,
    },
    /// Set the subdivision on a fresh engine.
    SetSubdivision {
        #[arg(value_enum)]
        subdivision: SubdivisionArg,
    },
    /// Apply an accent preset on a fresh engine.
    ApplyPreset {
        #[arg(value_enum)]
        preset: PresetArg,
    },
    /// Print the default engine snapshot (no mutation).
    Status,
    /// Start the microphone tuner pipeline for a fixed duration, printing
    /// each valid pitch reading as it arrives.
    Tune {
        #[arg(long, default_value_t = 5.0)]
        duration_secs: f64,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SubdivisionArg {
    None,
    Eighth,
    Triplet,
    Sixteenth,
}

impl From<SubdivisionArg> for Subdivision {
    fn from(value: SubdivisionArg) -> Self {
        match value {
            SubdivisionArg::None => Subdivision::None,
            SubdivisionArg::Eighth => Subdivision::Eighth,
            SubdivisionArg::Triplet => Subdivision::Triplet,
            SubdivisionArg::Sixteenth => Subdivision::Sixteenth,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum PresetArg {
    Standard,
    Backbeat,
    AllAccent,
    Djent,
}

impl From<PresetArg> for AccentPreset {
    fn from(value: PresetArg) -> Self {
        match value {
            PresetArg::Standard => AccentPreset::Standard,
            PresetArg::Backbeat => AccentPreset::Backbeat,
            PresetArg::AllAccent => AccentPreset::AllAccent,
            PresetArg::Djent => AccentPreset::Djent,
        }
    }
}

#[derive(Debug, Serialize)]
struct EngineSnapshot {
    bpm: u32,
    beats_per_bar: u32,
    beat_unit: u32,
    accent_pattern: Vec<bool>,
    subdivision: String,
    revision: u64,
    playing: bool,
}

fn snapshot_of<AB, HB, PC>(engine: &Orchestrator<AB, HB, PC>) -> EngineSnapshot
where
    AB: AudioOutputBackend + 'static,
    HB: metronome_core::haptic::HapticBackend + 'static,
    PC: PeerChannel,
{
    let config = engine.config();
    EngineSnapshot {
        bpm: config.bpm(),
        beats_per_bar: config.time_signature().beats_per_bar(),
        beat_unit: config.time_signature().beat_unit(),
        accent_pattern: config.accent_pattern().as_slice().to_vec(),
        subdivision: format!("{:?}", config.subdivision()),
        revision: config.revision(),
        playing: engine.is_playing(),
    }
}

fn new_engine() -> Orchestrator<StubOutputBackend, NullHapticBackend, Arc<InMemoryPeerChannel>> {
    new_engine_with_config().0
}

/// Like `new_engine`, but also hands back the loaded `AppConfig` so the
/// caller's driving loop can honor the configured lookahead cadence instead
/// of a hardcoded guess.
fn new_engine_with_config() -> (Orchestrator<StubOutputBackend, NullHapticBackend, Arc<InMemoryPeerChannel>>, AppConfig) {
    let app_config = AppConfig::load();
    let engine = Orchestrator::new(
        &app_config,
        StubOutputBackend::new(),
        NullHapticBackend,
        None,
        Arc::new(ClockSource),
    );
    (engine, app_config)
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    metronome_core::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { duration_secs } => run_start(duration_secs),
        Commands::Tap { count, interval_ms } => run_tap(count, interval_ms),
        Commands::SetBpm { bpm } => run_mutation(|engine| engine.set_bpm(bpm)),
        Commands::SetTimeSignature { beats_per_bar, beat_unit } => {
            run_mutation(|engine| engine.set_time_signature(TimeSignature::new(beats_per_bar, beat_unit)))
        }
        Commands::SetSubdivision { subdivision } => {
            run_mutation(|engine| engine.set_subdivision(subdivision.into()))
        }
        Commands::ApplyPreset { preset } => run_mutation(|engine| engine.apply_preset(preset.into())),
        Commands::Status => run_mutation(|_engine| {}),
        Commands::Tune { duration_secs } => run_tune(duration_secs),
    }
}

fn run_mutation(f: impl FnOnce(&Orchestrator<StubOutputBackend, NullHapticBackend, Arc<InMemoryPeerChannel>>)) -> Result<ExitCode> {
    let engine = new_engine();
    f(&engine);
    println!("{}", serde_json::to_string_pretty(&snapshot_of(&engine))?);
    Ok(ExitCode::from(0))
}

fn run_start(duration_secs: f64) -> Result<ExitCode> {
    let (engine, app_config) = new_engine_with_config();
    let lookahead_interval = Duration::from_millis(app_config.audio.lookahead_interval_ms);
    engine.start();

    let deadline = Instant::now() + Duration::from_secs_f64(duration_secs.max(0.0));
    while Instant::now() < deadline {
        let now = Instant::now();
        // Pre-commit upcoming clicks to the audio device ahead of time,
        // distinct from the observer beat dispatch below (spec §4.3).
        engine.run_lookahead(now);
        engine.process_tick(now);
        thread::sleep(lookahead_interval);
    }

    engine.stop();
    println!("{}", serde_json::to_string_pretty(&snapshot_of(&engine))?);
    Ok(ExitCode::from(0))
}

fn run_tap(count: u32, interval_ms: u64) -> Result<ExitCode> {
    let engine = new_engine();
    let mut last_estimate = None;

    for i in 0..count {
        if i > 0 {
            thread::sleep(Duration::from_millis(interval_ms));
        }
        last_estimate = engine.tap(Instant::now());
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "estimated_bpm": last_estimate,
            "snapshot": snapshot_of(&engine),
        }))?
    );
    Ok(ExitCode::from(0))
}

/// Run the microphone tuner pipeline headlessly, printing each valid pitch
/// reading as it arrives. Degrades gracefully per spec §7: if the
/// microphone can't be acquired, the tuner reports a reason code rather
/// than failing the whole process.
fn run_tune(duration_secs: f64) -> Result<ExitCode> {
    let engine = new_engine();

    if let Err(err) = engine.start_tuner() {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "status": "idle",
                "reason": err.to_string(),
            }))?
        );
        return Ok(ExitCode::from(0));
    }

    let mut pitch_rx = engine.broadcasts().subscribe_pitch();
    let deadline = Instant::now() + Duration::from_secs_f64(duration_secs.max(0.0));
    let mut readings = Vec::new();

    while Instant::now() < deadline {
        match pitch_rx.try_recv() {
            Ok(event) => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "note": event.hypothesis.name,
                        "octave": event.hypothesis.octave,
                        "frequency_hz": event.reading.frequency_hz,
                        "cents": event.cents,
                        "classification": format!("{:?}", event.classification),
                    }))?
                );
                readings.push(event.hypothesis.name.clone());
            }
            Err(_) => thread::sleep(Duration::from_millis(20)),
        }
    }

    engine.stop_tuner();
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "readings_captured": readings.len() }))?
    );
    Ok(ExitCode::from(0))
}
