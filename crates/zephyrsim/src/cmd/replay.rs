use std::path::Path;

use tracing::info;
use zephyr_frame::{Channel, ChannelMode, DemuxConfig, MessageSink, ProtocolDemux};
use zephyr_transport::{ByteSource, ReadOutcome, ReplaySource};

use crate::cmd::ReplayArgs;
use crate::config::SimConfig;
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_stats, OutputFormat};
use crate::sink::{DisplayFilter, MonitorSink};

pub fn run(args: ReplayArgs, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    let config = SimConfig::load_or_default(config)?;

    let zephyr = ReplaySource::open(&args.zephyr_file, args.chunk_size)
        .map_err(|err| transport_error("replay failed", err))?;
    let log = args
        .log_file
        .as_ref()
        .map(|path| ReplaySource::open(path, args.chunk_size))
        .transpose()
        .map_err(|err| transport_error("replay failed", err))?;

    let mode = if args.shared {
        ChannelMode::Shared
    } else {
        ChannelMode::Separate
    };
    let demux_config = DemuxConfig {
        mode,
        ..config.demux.clone()
    };
    let sink = MonitorSink::new(
        format,
        DisplayFilter::new(args.only, config.message_display_filters.clone()),
    );
    let mut demux = ProtocolDemux::with_config(demux_config, sink);

    let mut sources: Vec<(Channel, Box<dyn ByteSource>)> =
        vec![(Channel::Zephyr, Box::new(zephyr))];
    if let Some(log) = log {
        sources.push((Channel::Log, Box::new(log)));
    }
    feed(&mut demux, &mut sources).map_err(|err| transport_error("replay failed", err))?;

    info!(
        messages = demux.stats().messages(),
        zephyr_buffered = demux.buffered(Channel::Zephyr),
        "replay finished"
    );
    if !matches!(format, OutputFormat::Raw) {
        print_stats(demux.stats(), format);
    }
    Ok(SUCCESS)
}

/// Read one chunk from each source in turn until all are exhausted.
fn feed<S: MessageSink>(
    demux: &mut ProtocolDemux<S>,
    sources: &mut Vec<(Channel, Box<dyn ByteSource>)>,
) -> zephyr_transport::Result<()> {
    let mut buf = vec![0u8; 4096];
    while !sources.is_empty() {
        let mut index = 0;
        while index < sources.len() {
            let channel = sources[index].0;
            match sources[index].1.read_available(&mut buf)? {
                ReadOutcome::Data(n) => {
                    demux.on_bytes_available(channel, &buf[..n]);
                    index += 1;
                }
                ReadOutcome::Idle => index += 1,
                ReadOutcome::Closed => {
                    sources.remove(index);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use zephyr_frame::{Event, Message};

    use super::*;

    fn source(data: &'static [u8], chunk: usize, name: &str) -> Box<dyn ByteSource> {
        Box::new(ReplaySource::from_reader(data, chunk, name))
    }

    #[test]
    fn interleaves_separate_captures() {
        let mut demux = ProtocolDemux::new(ChannelMode::Separate, Vec::<Event>::new());
        let mut sources = vec![
            (
                Channel::Zephyr,
                source(b"<IMR>\n\t<Msg>1</Msg>\n</IMR>\n<CRC>9</CRC>\r\n", 5, "zephyr"),
            ),
            (Channel::Log, source(b"boot ok\r\nwarming\r\n", 4, "log")),
        ];

        feed(&mut demux, &mut sources).unwrap();

        let events = demux.into_sink();
        let kinds: Vec<&str> = events
            .iter()
            .filter_map(|event| match event {
                Event::Message(message) => Some(message.kind()),
                _ => None,
            })
            .collect();
        assert_eq!(kinds.iter().filter(|k| **k == "LOG").count(), 2);
        assert!(kinds.contains(&"IMR"));
        assert!(events.contains(&Event::Message(Message::LogLine("warming".to_string()))));
    }

    #[test]
    fn empty_capture_finishes() {
        let mut demux = ProtocolDemux::new(ChannelMode::Shared, Vec::<Event>::new());
        let mut sources = vec![(Channel::Zephyr, source(b"", 8, "empty"))];
        feed(&mut demux, &mut sources).unwrap();
        assert!(sources.is_empty());
        assert!(demux.sink().is_empty());
    }
}
