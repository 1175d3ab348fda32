mod cmd;
mod config;
mod exit;
mod logging;
mod output;
mod session;
mod sink;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "zephyrsim",
    version,
    about = "Zephyr gondola simulator for balloon instruments"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// JSON settings file; flags override its values.
    #[arg(long, value_name = "PATH", global = true, env = "ZEPHYRSIM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format, cli.config.as_deref());

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use zephyr_command::InstrumentMode;

    use super::*;
    use crate::cmd::Outbound;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "zephyrsim",
            "send",
            "/dev/ttyUSB0",
            "im",
            "fl",
            "--instrument",
            "LPC",
            "--dry-run",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert!(args.dry_run);
        assert_eq!(args.instrument.as_deref(), Some("LPC"));
        assert!(matches!(
            args.message,
            Outbound::Im {
                mode: InstrumentMode::Flight
            }
        ));
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = Cli::try_parse_from(["zephyrsim", "send", "/dev/ttyUSB0", "im", "XX"])
            .expect_err("bad mode should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_replay_with_only_list() {
        let cli = Cli::try_parse_from([
            "zephyrsim",
            "replay",
            "capture.bin",
            "--shared",
            "--chunk-size",
            "1",
            "--only",
            "TM,IMR",
        ])
        .expect("replay args should parse");

        let Command::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        assert!(args.shared);
        assert_eq!(args.chunk_size, 1);
        assert_eq!(args.only, Some(vec!["TM".to_string(), "IMR".to_string()]));
    }

    #[test]
    fn parses_monitor_flags() {
        let cli = Cli::try_parse_from([
            "zephyrsim",
            "monitor",
            "--port",
            "/dev/ttyUSB0",
            "--no-auto-ack",
            "--stall-warning",
            "30s",
        ])
        .expect("monitor args should parse");
        assert!(matches!(cli.command, Command::Monitor(ref args) if args.no_auto_ack));
    }
}
