use std::path::PathBuf;

use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};

#[derive(Debug, ClapParser)]
#[command(
    name         = env!("CARGO_PKG_NAME"),
    version      = env!("CARGO_PKG_VERSION"),
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        "\ntpm2 ", env!("TPM2_VERSION"),
        "\nbuilt ", env!("BUILD_TIMESTAMP"),
    ),
    author       = env!("CARGO_PKG_AUTHORS"),
    about        = "Tools for inspecting and playing TPM2 LED recordings",
    long_about   = None,
)]
pub struct Cli {
    /// Set the log level
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub loglevel: LogLevel,

    /// Treat warnings as fatal errors (fail on first malformed packet).
    #[arg(long, global = true)]
    pub strict: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Show progress bars during operations.
    #[arg(long, global = true)]
    pub progress: bool,

    /// YAML file describing the strip, segments, storage and playback defaults.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Choose an operation to perform.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Play a recording onto the strip.
    Play(PlayArgs),

    /// Run a JSON control message.
    Apply(ApplyArgs),

    /// Print recording information
    Info(InfoArgs),
}

#[derive(Debug, Args)]
pub struct PlayArgs {
    /// Recording path, resolved through the configured storage.
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Segment id to play on (default: whole strip).
    #[arg(long, value_name = "ID")]
    pub seg: Option<usize>,

    /// Extra passes after the first one; negative loops forever.
    #[arg(long, value_name = "N", allow_negative_numbers = true, conflicts_with = "looping")]
    pub repeat: Option<i64>,

    /// Loop until interrupted or --max-seconds elapses.
    #[arg(long = "loop")]
    pub looping: bool,

    /// Frame rate (default: playback.frame_delay_ms from the config).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f64>,

    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Control message: inline JSON, @FILE, or "-" for stdin.
    #[arg(value_name = "MESSAGE")]
    pub message: String,

    #[command(flatten)]
    pub session: SessionArgs,
}

/// Options shared by every command that drives a playback session.
#[derive(Debug, Args)]
pub struct SessionArgs {
    /// Draw the strip in the terminal after each frame.
    #[arg(long)]
    pub preview: bool,

    /// Stop playback after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub max_seconds: Option<f64>,

    /// Strip length, overriding strip.length from the config.
    #[arg(long, value_name = "COUNT")]
    pub leds: Option<usize>,
}

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Recording file (use "-" for stdin).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Print every packet as hex, one packet per line.
    #[arg(long)]
    pub dump: bool,

    /// Frame rate used for the nominal duration.
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    /// Disable logging output.
    Off,
    /// No output except errors.
    Error,
    /// Show warnings and errors.
    Warn,
    /// Show info, warnings and errors (default).
    Info,
    /// Show debug, info, warnings and errors.
    Debug,
    /// Show all log messages including trace.
    Trace,
}

impl LogLevel {
    /// Convert LogLevel to log::LevelFilter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogFormat {
    /// Colorized human-readable text.
    Plain,
    /// Structured JSON per log record.
    Json,
}

impl Cli {
    /// Failure level handed to the library: strict mode fails on warnings.
    pub fn fail_level(&self) -> log::Level {
        if self.strict {
            log::Level::Warn
        } else {
            log::Level::Error
        }
    }
}
