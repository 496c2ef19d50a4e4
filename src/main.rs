use telly::cli::Args;
use telly::engine::EngineEventSender;
use telly::paths;
use telly::session::{Session, SessionState};
use telly::session_events::{SessionEvent, SessionEventSender};
use telly::settings::SettingsStore;
use telly::sim_engine::SimEngine;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Pump interval of the session thread
const PUMP_INTERVAL: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    let args = Args::parse();
    let path_config = paths::PathConfig::from_env_and_cli(args.config_dir.clone());

    // Determine log level based on verbosity flags
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    // Initialize logger based on --log flag
    if let Some(log_path_opt) = &args.log_file {
        // File logging with specified verbosity level
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| paths::data_file("telly.log", &path_config));

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!(
            "Logging to file: {} (level: {:?})",
            log_path.display(),
            log_level
        );
    } else {
        // Console logging with specified verbosity level (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }

    debug!("Command-line args: {:?}", args);
    paths::ensure_dirs(&path_config)?;

    let store = Arc::new(SettingsStore::new(paths::config_root(&path_config)));

    if args.clear_settings {
        let removed = store.clear_all();
        println!("Removed {removed} folder settings record(s)");
        return Ok(());
    }

    if let Some(speed) = args.speed {
        let global = store.update_global(|g| g.speed = speed.clamp(0.25, 3.0));
        info!("Global speed set to {}x", global.speed);
    }

    let Some(path) = args.path.as_deref() else {
        bail!("Nothing to play: pass a video file or a folder (see --help)");
    };
    if !path.exists() {
        bail!("No such file or folder: {}", path.display());
    }

    // Engine events arrive from the engine's clock thread; the session
    // drains them on this thread only.
    let (engine_tx, engine_rx) = crossbeam_channel::unbounded();
    let engine = SimEngine::spawn_realtime(EngineEventSender::new(engine_tx))
        .context("Failed to start media engine")?;

    let (notice_tx, notice_rx) = crossbeam_channel::unbounded();
    let mut session = Session::new(
        Box::new(engine),
        engine_rx,
        store,
        SessionEventSender::new(notice_tx),
    );

    if path.is_dir() {
        let count = session.open_folder(path)?;
        println!("Playing folder {} ({count} files)", path.display());
    } else {
        session.open(path);
        println!("Playing {}", path.display());
    }

    loop {
        session.pump();

        for notice in notice_rx.try_iter() {
            match notice {
                SessionEvent::StateChanged(state) => info!("Session state: {state:?}"),
                SessionEvent::FileChanged { path, index } => match index {
                    Some(i) => println!("Now playing [{}] {}", i + 1, path.display()),
                    None => println!("Now playing {}", path.display()),
                },
                SessionEvent::PositionChanged { position, duration } => {
                    print!("\r{position:7.1}s / {duration:.1}s");
                    use std::io::Write;
                    let _ = std::io::stdout().flush();
                }
                SessionEvent::DurationChanged(duration) => debug!("Duration: {duration:.1}s"),
                SessionEvent::ProgressRestored { percent } => {
                    println!("Resumed at {percent:.0}%");
                }
                SessionEvent::AtPlaylistStart => println!("Already at the first video"),
                SessionEvent::AtPlaylistEnd => println!("Already at the last video"),
                SessionEvent::PlaylistFinished => println!("\nFinished the last video"),
            }
        }

        if session.state() == SessionState::Ended {
            println!();
            break;
        }
        thread::sleep(PUMP_INTERVAL);
    }

    Ok(())
}
