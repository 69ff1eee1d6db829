//! Intent Sentinel - single-camera behavioral intent scoring
//!
//! Replays observation logs through the tick pipeline and manages the clip
//! store, operator feedback and configuration.

use intent_sentinel::app::cli::{Cli, Commands, ConfigAction};
use intent_sentinel::app::config::Config;
use intent_sentinel::capture::ClipStore;
use intent_sentinel::feedback::{FeedbackAnalyzer, FeedbackOutcome, Verdict};
use intent_sentinel::pipeline::{
    ReplayScript, ReplaySource, ScriptedPose, ScriptedViolence, ScriptedWeapons, Sentinel, REPLAY_WORKER_TIMEOUT,
};
use intent_sentinel::time::ManualClock;
use intent_sentinel::workers::boxed_factory;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut config = if let Some(path) = &cli.config {
        Config::load(path)?
    } else {
        Config::load_default()?
    };
    config.apply_env();
    config.validate()?;

    match cli.command {
        Commands::Replay {
            input,
            width,
            height,
            realtime,
        } => {
            run_replay(&input, width, height, realtime, &config)?;
        }
        Commands::Events { detailed } => {
            run_events(detailed, &config)?;
        }
        Commands::Feedback { event_id, verdict } => {
            run_feedback(&event_id, verdict.into(), &config)?;
        }
        Commands::Init { force } => {
            run_init(force, &config)?;
        }
        Commands::Config { action } => {
            run_config(action, &config)?;
        }
    }

    Ok(())
}

fn run_replay(input: &Path, width: u32, height: u32, realtime: bool, config: &Config) -> anyhow::Result<()> {
    if !input.exists() {
        anyhow::bail!("Replay file not found: {:?}", input);
    }
    if width == 0 || height == 0 {
        anyhow::bail!("Frame size must be non-zero, got {}x{}", width, height);
    }

    let script = Arc::new(ReplayScript::load(input)?);
    if script.is_empty() {
        warn!("Replay file has no tick records");
        return Ok(());
    }
    info!(
        ticks = script.len(),
        duration_s = script.duration_s(),
        log_dir = %config.capture.log_dir.display(),
        "Starting replay"
    );

    let violence_script = Arc::clone(&script);
    let weapon_script = Arc::clone(&script);
    let mut sentinel = Sentinel::builder(config)
        .pose(Box::new(ScriptedPose::new(Arc::clone(&script))))
        .violence(boxed_factory(move || Ok(ScriptedViolence::new(Arc::clone(&violence_script)))))
        .weapons(boxed_factory(move || Ok(ScriptedWeapons::new(Arc::clone(&weapon_script)))))
        .lockstep(REPLAY_WORKER_TIMEOUT)
        .build()?;

    let clock = ManualClock::new(0.0);
    let mut source = ReplaySource::new(Arc::clone(&script), width, height, clock.clone())
        .with_doorbell(sentinel.doorbell());

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_handler = Arc::clone(&stop_flag);
    ctrlc::set_handler(move || {
        stop_flag_handler.store(true, Ordering::SeqCst);
    })?;

    let summary = sentinel.run(&mut source, &clock, &stop_flag, realtime);
    sentinel.shutdown();

    println!("Replayed {} ticks{}", summary.ticks, if summary.interrupted { " (interrupted)" } else { "" });
    println!("  Peak score: {:.3}", summary.max_score);
    println!("  Peak level: {}", summary.max_level);
    println!("  Clips:      {}", summary.clips);
    for (name, health) in sentinel.worker_health() {
        println!("  Worker {}: {:?}", name, health);
    }

    Ok(())
}

fn run_events(detailed: bool, config: &Config) -> anyhow::Result<()> {
    let store = ClipStore::new(&config.capture.log_dir);
    let records = store.list()?;

    if records.is_empty() {
        println!("No events found in {}", store.metadata_dir().display());
        println!("Record some with: sentinel replay --input <FILE>");
        return Ok(());
    }

    println!("Events in {:?}:", store.root());
    for record in &records {
        let m = &record.metadata;
        if detailed {
            println!(
                "  {}  {}  {} -> {}  max {:.2}  mean {:.2}  {} frames{}",
                m.clip_id,
                m.started_at.format("%Y-%m-%d %H:%M:%S"),
                m.trigger_level,
                m.final_level,
                m.max_intent,
                m.mean_intent,
                m.frame_count,
                if m.weapon_detected { "  WEAPON" } else { "" }
            );
            if let Some(video) = &record.artifacts.video {
                println!("      video: {}", video);
            }
            if let Some(summary) = &record.artifacts.summary {
                println!("      summary: {}", summary);
            }
        } else {
            println!("  {}  {}  {}", m.clip_id, m.started_at.format("%Y-%m-%d %H:%M:%S"), m.final_level);
        }
    }

    Ok(())
}

fn run_feedback(event_id: &str, verdict: Verdict, config: &Config) -> anyhow::Result<()> {
    let store = ClipStore::new(&config.capture.log_dir);
    let mut analyzer = FeedbackAnalyzer::new(&config.fusion, store);

    match analyzer.process(event_id, verdict)? {
        FeedbackOutcome::Report(report) => {
            println!("Feedback '{}' recorded for {}", report.verdict, report.event_id);
            println!("  Prediction: {:.3}", report.prediction);
            println!("  Target:     {:.1}", report.target);
            println!("  Error:      {:+.3}", report.error);
            for line in &report.credit_assignment {
                println!("  - {}", line);
            }
            println!("  {}", report.conclusion);
        }
        FeedbackOutcome::NotFound { event_id } => {
            anyhow::bail!("Event '{}' not found", event_id);
        }
    }

    Ok(())
}

fn run_init(force: bool, config: &Config) -> anyhow::Result<()> {
    let config_path = Config::default_path();

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    config.save_default()?;
    println!("Created config at {:?}", config_path);
    println!("\nConfig content:\n{}", config.to_toml()?);

    let store = ClipStore::new(&config.capture.log_dir);
    store.ensure_dirs()?;
    println!("\nCreated directories:");
    println!("  Clips:    {:?}", store.clips_dir());
    println!("  Metadata: {:?}", store.metadata_dir());

    Ok(())
}

fn run_config(action: ConfigAction, config: &Config) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("Configuration ({:?}):\n", Config::default_path());
            println!("{}", config.to_toml()?);
        }
        ConfigAction::Get { key } => match config.get_value(&key)? {
            Some(value) => println!("{} = {}", key, value),
            None => anyhow::bail!("Configuration key '{}' not found", key),
        },
        ConfigAction::Reset { force } => {
            let config_path = Config::default_path();

            if config_path.exists() && !force {
                println!("Config exists at {:?}", config_path);
                println!("Use --force to reset to defaults");
                return Ok(());
            }

            Config::default().save_default()?;
            println!("Configuration reset to defaults at {:?}", config_path);
        }
    }

    Ok(())
}
