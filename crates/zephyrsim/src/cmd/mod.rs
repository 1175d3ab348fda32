use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use zephyr_command::InstrumentMode;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod monitor;
pub mod ports;
pub mod replay;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch an instrument's ports, answering acks and sending GPS.
    Monitor(MonitorArgs),
    /// Feed capture files through the parser and print what it finds.
    Replay(ReplayArgs),
    /// Send a single gondola message.
    Send(SendArgs),
    /// List serial ports.
    Ports,
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    match command {
        Command::Monitor(args) => monitor::run(args, format, config),
        Command::Replay(args) => replay::run(args, format, config),
        Command::Send(args) => send::run(args, format, config),
        Command::Ports => ports::run(format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug, Default)]
pub struct MonitorArgs {
    /// Port carrying the Zephyr stream.
    #[arg(long, value_name = "PORT")]
    pub port: Option<String>,
    /// Port carrying the log stream. Omit when both share one port.
    #[arg(long, value_name = "PORT")]
    pub log_port: Option<String>,
    /// Treat log and Zephyr content as one stream.
    #[arg(long)]
    pub shared: bool,
    #[arg(long)]
    pub baud: Option<u32>,
    /// Instrument name used in outbound messages.
    #[arg(long)]
    pub instrument: Option<String>,
    /// Directory for session files.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
    /// Do not answer TM, S and RA messages.
    #[arg(long)]
    pub no_auto_ack: bool,
    /// Send a GPS message every --gps-interval.
    #[arg(long)]
    pub auto_gps: bool,
    /// Seconds between GPS messages.
    #[arg(long, value_name = "SECS")]
    pub gps_interval: Option<u64>,
    /// Solar zenith angle for GPS messages, 0 to 180 degrees.
    #[arg(long)]
    pub sza: Option<f64>,
    /// Only print these envelope kinds (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "KIND")]
    pub only: Option<Vec<String>>,
    /// Warn after this long without a message (e.g. 30s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub stall_warning: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Capture of the Zephyr stream (or of the shared stream with --shared).
    pub zephyr_file: PathBuf,
    /// Capture of the separate log stream.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
    /// Parse the capture as one stream mixing log lines and frames.
    #[arg(long)]
    pub shared: bool,
    /// Bytes delivered per read.
    #[arg(long, default_value_t = zephyr_transport::DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,
    /// Only print these envelope kinds (comma-separated).
    #[arg(long, value_delimiter = ',', value_name = "KIND")]
    pub only: Option<Vec<String>>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Port carrying the Zephyr stream.
    pub port: String,
    #[command(subcommand)]
    pub message: Outbound,
    /// Instrument name used in the message.
    #[arg(long, global = true)]
    pub instrument: Option<String>,
    /// Print the encoded message instead of opening the port.
    #[arg(long, global = true)]
    pub dry_run: bool,
    /// After sending, wait for an envelope of this kind (e.g. IMAck).
    #[arg(long, value_name = "KIND", global = true)]
    pub expect: Option<String>,
    /// How long to wait for --expect (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", global = true)]
    pub timeout: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Outbound {
    /// Instrument mode (SB, FL, LP, SA, EF).
    Im { mode: InstrumentMode },
    /// GPS fix stamped with the current time.
    Gps {
        #[arg(long)]
        sza: Option<f64>,
    },
    /// Telecommand text.
    Tc { text: String },
    /// Shutdown warning.
    Sw,
    /// Safety acknowledgement.
    Sack {
        #[arg(long)]
        nak: bool,
    },
    /// Return-action acknowledgement.
    Raack {
        #[arg(long)]
        nak: bool,
    },
    /// Telemetry acknowledgement.
    Tmack {
        #[arg(long)]
        nak: bool,
    },
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub(crate) fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration(" ").is_err());
    }
}
