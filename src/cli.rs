use clap::Parser;
use std::path::PathBuf;

// Build version with engine backend info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Engine: simulated clock (native backends attach via the MediaEngine trait)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Folder-based video playback session driver
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Video file or folder to play (a folder plays all videos inside, sorted by name)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Playback speed override (0.25-3.0), persisted as the global default
    #[arg(short = 's', long = "speed", value_name = "X")]
    pub speed: Option<f64>,

    /// Clear all per-folder playback settings and exit
    #[arg(long = "clear-settings")]
    pub clear_settings: bool,

    /// Enable debug logging to file (default: telly.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
