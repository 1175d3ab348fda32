use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};

use zephyr_command::{Ack, Command, CommandWriter, GpsFix};
use zephyr_frame::{Channel, DemuxConfig, Envelope, Event, Message, ProtocolDemux};
use zephyr_transport::{ByteSource, ReadOutcome, SerialSettings, SerialStream};

use crate::cmd::{parse_duration, Outbound, SendArgs};
use crate::config::SimConfig;
use crate::exit::{command_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_event, print_raw, print_sent, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    let config = SimConfig::load_or_default(config)?;
    let instrument = args
        .instrument
        .clone()
        .unwrap_or_else(|| config.instrument.clone());
    let command = build_command(&args.message, config.sza)?;

    if args.dry_run {
        if args.expect.is_some() {
            tracing::warn!("--expect is ignored with --dry-run");
        }
        let mut writer = CommandWriter::new(Vec::new(), instrument);
        let sent = writer
            .send(&command)
            .map_err(|err| command_error("encode failed", err))?;
        match format {
            OutputFormat::Json | OutputFormat::Table => print_sent(&sent, format),
            OutputFormat::Pretty | OutputFormat::Raw => print_raw(&sent.wire),
        }
        return Ok(SUCCESS);
    }

    let timeout = parse_duration(&args.timeout)?;
    let settings = SerialSettings {
        baud_rate: config.baud_rate,
        ..SerialSettings::default()
    };
    let mut port = SerialStream::open(&args.port, &settings)
        .map_err(|err| transport_error(&format!("failed opening {}", args.port), err))?;
    let outbound = port
        .try_clone()
        .map_err(|err| transport_error("failed cloning port", err))?;

    let mut writer = CommandWriter::new(outbound, instrument);
    let sent = writer
        .send(&command)
        .map_err(|err| command_error("send failed", err))?;
    print_sent(&sent, format);

    if let Some(kind) = &args.expect {
        match wait_for(&mut port, config.demux_config(), kind, timeout)? {
            Some(envelope) => print_event(&Event::Message(Message::Envelope(envelope)), format),
            None => {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("no {kind} received within {timeout:?}"),
                ))
            }
        }
    }

    Ok(SUCCESS)
}

fn build_command(message: &Outbound, default_sza: f64) -> CliResult<Command> {
    let ack = |nak: bool| if nak { Ack::Nak } else { Ack::Ack };
    Ok(match message {
        Outbound::Im { mode } => Command::Mode(*mode),
        Outbound::Gps { sza } => Command::Gps(
            GpsFix::now(sza.unwrap_or(default_sza))
                .map_err(|err| command_error("invalid GPS fix", err))?,
        ),
        Outbound::Tc { text } => Command::Telecommand(text.clone()),
        Outbound::Sw => Command::ShutdownWarning,
        Outbound::Sack { nak } => Command::SafetyAck(ack(*nak)),
        Outbound::Raack { nak } => Command::ReturnActionAck(ack(*nak)),
        Outbound::Tmack { nak } => Command::TelemetryAck(ack(*nak)),
    })
}

/// Parse the reply stream until an envelope of `kind` arrives or time runs out.
fn wait_for<S: ByteSource>(
    source: &mut S,
    config: DemuxConfig,
    kind: &str,
    timeout: Duration,
) -> CliResult<Option<Envelope>> {
    let deadline = Instant::now() + timeout;
    let mut demux = ProtocolDemux::with_config(config, VecDeque::<Event>::new());
    let mut buf = [0u8; 1024];

    while Instant::now() < deadline {
        match source
            .read_available(&mut buf)
            .map_err(|err| transport_error("receive failed", err))?
        {
            ReadOutcome::Data(n) => demux.on_bytes_available(Channel::Zephyr, &buf[..n]),
            ReadOutcome::Idle => continue,
            ReadOutcome::Closed => break,
        }

        while let Some(event) = demux.sink_mut().pop_front() {
            if let Event::Message(Message::Envelope(envelope)) = event {
                if envelope.kind.eq_ignore_ascii_case(kind) {
                    return Ok(Some(envelope));
                }
            }
        }
    }
    Ok(None)
}
