use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};
use zephyr_command::{Ack, Command, CommandWriter, GpsFix};
use zephyr_frame::{Channel, ProtocolDemux};
use zephyr_transport::{ByteSource, ReadOutcome, SerialSettings, SerialStream};

use crate::cmd::{install_ctrlc_handler, parse_duration, MonitorArgs};
use crate::config::SimConfig;
use crate::exit::{command_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_stats, OutputFormat};
use crate::session::SessionFiles;
use crate::sink::{DisplayFilter, MonitorSink};

const READ_BUFFER_SIZE: usize = 4096;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

type Chunk = (Channel, Vec<u8>);

pub fn run(args: MonitorArgs, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    let mut config = SimConfig::load_or_default(config)?;
    let only = apply_overrides(&mut config, &args)?;
    let stall_after = match &args.stall_warning {
        Some(text) => Some(parse_duration(text)?),
        None => config.stall_warning.map(Duration::from_secs),
    };

    let zephyr_path = config
        .zephyr_port
        .clone()
        .ok_or_else(|| CliError::new(USAGE, "no Zephyr port given (use --port or zephyr_port)"))?;
    let settings = SerialSettings {
        baud_rate: config.baud_rate,
        ..SerialSettings::default()
    };

    let zephyr = SerialStream::open(&zephyr_path, &settings)
        .map_err(|err| transport_error(&format!("failed opening {zephyr_path}"), err))?;
    let outbound = zephyr
        .try_clone()
        .map_err(|err| transport_error("failed cloning Zephyr port", err))?;
    let mut writer = CommandWriter::new(outbound, config.instrument.clone());

    let log = match (&config.log_port, config.is_shared()) {
        (Some(path), false) => Some(
            SerialStream::open(path, &settings)
                .map_err(|err| transport_error(&format!("failed opening {path}"), err))?,
        ),
        _ => None,
    };

    let session = config
        .data_directory
        .as_deref()
        .map(|dir| SessionFiles::create(dir, &config.instrument, chrono::Local::now()))
        .transpose()?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (tx, rx) = mpsc::channel::<Chunk>();
    let mut readers = vec![spawn_reader(Channel::Zephyr, zephyr, tx.clone(), running.clone())];
    if let Some(log) = log {
        readers.push(spawn_reader(Channel::Log, log, tx.clone(), running.clone()));
    }
    drop(tx);

    let sink = MonitorSink::new(
        format,
        DisplayFilter::new(only, config.message_display_filters.clone()),
    )
    .with_session(session)
    .with_auto_ack(config.auto_ack);
    let mut demux = ProtocolDemux::with_config(config.demux_config(), sink);

    let gps_every = config
        .auto_gps
        .then(|| Duration::from_secs(config.gps_interval.max(1)));
    let mut next_gps = gps_every.map(|every| Instant::now() + every);
    let mut stalled = false;

    info!(
        zephyr = %zephyr_path,
        mode = ?demux.mode(),
        instrument = %config.instrument,
        auto_ack = config.auto_ack,
        "monitoring"
    );

    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok((channel, bytes)) => demux.on_bytes_available(channel, &bytes),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("all ports closed");
                break;
            }
        }

        for event in demux.sink_mut().take_pending() {
            send(&mut writer, demux.sink_mut(), &Command::reply_to(event, Ack::Ack));
        }

        if let (Some(every), Some(due)) = (gps_every, next_gps) {
            if Instant::now() >= due {
                match GpsFix::now(config.sza) {
                    Ok(fix) => send(&mut writer, demux.sink_mut(), &Command::Gps(fix)),
                    Err(err) => warn!(error = %err, "GPS fix rejected"),
                }
                next_gps = Some(due + every);
            }
        }

        if let Some(limit) = stall_after {
            let idle = demux.sink().idle_for();
            if idle >= limit && !stalled {
                warn!(idle_secs = idle.as_secs(), "no messages received");
                stalled = true;
            } else if idle < limit {
                stalled = false;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    for reader in readers {
        if reader.join().is_err() {
            error!("reader thread panicked");
        }
    }
    info!(messages = demux.stats().messages(), "monitor stopped");
    if !matches!(format, OutputFormat::Raw) {
        print_stats(demux.stats(), format);
    }

    Ok(SUCCESS)
}

/// Fold command-line flags into the loaded config. Returns the `--only` list.
fn apply_overrides(config: &mut SimConfig, args: &MonitorArgs) -> CliResult<Option<Vec<String>>> {
    if let Some(port) = &args.port {
        config.zephyr_port = Some(port.clone());
    }
    if let Some(port) = &args.log_port {
        config.log_port = Some(port.clone());
    }
    if args.shared {
        config.shared_ports = true;
    }
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }
    if let Some(instrument) = &args.instrument {
        config.instrument = instrument.clone();
    }
    if let Some(dir) = &args.data_dir {
        config.data_directory = Some(dir.clone());
    }
    if args.no_auto_ack {
        config.auto_ack = false;
    }
    if args.auto_gps {
        config.auto_gps = true;
    }
    if let Some(interval) = args.gps_interval {
        config.gps_interval = interval;
    }
    if let Some(sza) = args.sza {
        config.sza = sza;
    }
    config.validate()?;
    Ok(args.only.clone())
}

fn send<W: Write>(writer: &mut CommandWriter<W>, sink: &mut MonitorSink, command: &Command) {
    match writer.send(command) {
        Ok(sent) => sink.sent(&sent),
        Err(err) => {
            let err = command_error("send failed", err);
            error!(kind = command.kind(), "{err}");
        }
    }
}

fn spawn_reader<S>(
    channel: Channel,
    mut source: S,
    tx: Sender<Chunk>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    S: ByteSource + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        while running.load(Ordering::SeqCst) {
            match source.read_available(&mut buf) {
                Ok(ReadOutcome::Data(n)) => {
                    if tx.send((channel, buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Ok(ReadOutcome::Idle) => {}
                Ok(ReadOutcome::Closed) => {
                    info!(port = source.name(), "port closed");
                    break;
                }
                Err(err) => {
                    error!(port = source.name(), error = %err, "read failed");
                    break;
                }
            }
        }
    })
}
