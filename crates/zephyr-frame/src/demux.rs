use serde::Serialize;

use crate::accumulator::ByteAccumulator;
use crate::classify::{Action, Classified, MessageClassifier};
use crate::config::{ChannelMode, DemuxConfig};
use crate::error::{Diagnostic, Result};
use crate::message::CommandEvent;
use crate::scanner::{self, Decoded};
use crate::sink::MessageSink;
use crate::telemetry::{Step, TelemetryAssembler};

/// Logical source of an arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Free-text diagnostic lines from the instrument.
    Log,
    /// Structured Zephyr frames and telemetry.
    Zephyr,
}

/// Observable state of one channel buffer between passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing buffered, nothing pending.
    Idle,
    /// Part of a frame or line is buffered.
    ScanningText,
    /// A telemetry binary section is still `missing` bytes short.
    AwaitingBinary { missing: usize },
}

/// Running counts of everything the engine has emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DemuxStats {
    pub log_lines: u64,
    pub envelopes: u64,
    pub telemetry: u64,
    pub command_events: u64,
    pub malformed_envelopes: u64,
    pub invalid_length_fields: u64,
    pub non_ascii_bytes: u64,
}

impl DemuxStats {
    /// Log lines, envelopes and telemetry captures emitted so far.
    pub fn messages(&self) -> u64 {
        self.log_lines + self.envelopes + self.telemetry
    }
}

/// Buffer and capture state of the structured sub-stream.
#[derive(Debug)]
struct StructuredStream {
    buf: ByteAccumulator,
    telemetry: TelemetryAssembler,
}

enum Flow {
    /// Telemetry consumed; run the loop again.
    Continue,
    /// Binary section incomplete; wait for more bytes.
    Wait,
    /// Nothing pending; scan for text.
    Scan,
}

/// Turns raw channel bytes into sink calls.
///
/// Each call to [`on_bytes_available`](Self::on_bytes_available) drains every
/// complete unit from the affected buffer and returns without blocking;
/// partial frames, lines and binary sections stay buffered for the next call.
pub struct ProtocolDemux<S> {
    config: DemuxConfig,
    classifier: MessageClassifier,
    /// Zephyr buffer in separate mode, the only buffer in shared mode.
    zephyr: StructuredStream,
    log: ByteAccumulator,
    sink: S,
    stats: DemuxStats,
}

impl<S: MessageSink> ProtocolDemux<S> {
    /// Create an engine with default limits.
    pub fn new(mode: ChannelMode, sink: S) -> Self {
        Self::with_config(
            DemuxConfig {
                mode,
                ..DemuxConfig::default()
            },
            sink,
        )
    }

    /// Create an engine with explicit configuration.
    pub fn with_config(config: DemuxConfig, sink: S) -> Self {
        let log_capacity = match config.mode {
            ChannelMode::Separate => config.initial_buffer_capacity,
            ChannelMode::Shared => 0,
        };
        Self {
            classifier: MessageClassifier::new(config.max_declared_length),
            zephyr: StructuredStream {
                buf: ByteAccumulator::with_capacity(config.initial_buffer_capacity),
                telemetry: TelemetryAssembler::new(),
            },
            log: ByteAccumulator::with_capacity(log_capacity),
            config,
            sink,
            stats: DemuxStats::default(),
        }
    }

    /// Feed newly read bytes and process everything now complete.
    ///
    /// In shared mode `channel` is ignored: there is one physical channel and
    /// one buffer.
    pub fn on_bytes_available(&mut self, channel: Channel, bytes: &[u8]) {
        let result = match (self.config.mode, channel) {
            (ChannelMode::Separate, Channel::Log) => {
                self.log.append(bytes);
                self.drain_log()
            }
            (ChannelMode::Separate, Channel::Zephyr) => {
                self.zephyr.buf.append(bytes);
                self.drain_zephyr()
            }
            (ChannelMode::Shared, _) => {
                self.zephyr.buf.append(bytes);
                self.drain_shared()
            }
        };

        if let Err(err) = result {
            tracing::error!(error = %err, ?channel, "stream pass stopped early");
        }
    }

    /// Drop buffered bytes and any pending capture (port flushed or reopened).
    pub fn clear(&mut self, channel: Channel) {
        match (self.config.mode, channel) {
            (ChannelMode::Separate, Channel::Log) => self.log.clear(),
            _ => {
                self.zephyr.buf.clear();
                self.zephyr.telemetry.reset();
            }
        }
        tracing::debug!(?channel, "channel buffer cleared");
    }

    /// Where `channel` stands after the last pass.
    pub fn state(&self, channel: Channel) -> StreamState {
        let (buf, telemetry) = match (self.config.mode, channel) {
            (ChannelMode::Separate, Channel::Log) => (&self.log, None),
            _ => (&self.zephyr.buf, Some(&self.zephyr.telemetry)),
        };

        if let Some(remaining) = telemetry.and_then(TelemetryAssembler::remaining) {
            StreamState::AwaitingBinary {
                missing: remaining.saturating_sub(buf.len()),
            }
        } else if buf.is_empty() {
            StreamState::Idle
        } else {
            StreamState::ScanningText
        }
    }

    /// Bytes received on `channel` but not yet emitted.
    pub fn buffered(&self, channel: Channel) -> usize {
        match (self.config.mode, channel) {
            (ChannelMode::Separate, Channel::Log) => self.log.len(),
            _ => self.zephyr.buf.len(),
        }
    }

    pub fn mode(&self) -> ChannelMode {
        self.config.mode
    }

    pub fn config(&self) -> &DemuxConfig {
        &self.config
    }

    pub fn stats(&self) -> &DemuxStats {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn drain_log(&mut self) -> Result<()> {
        while let Some(line) = scanner::next_line(&mut self.log)? {
            self.emit_line(line);
        }
        Ok(())
    }

    fn drain_zephyr(&mut self) -> Result<()> {
        loop {
            match self.advance_telemetry()? {
                Flow::Continue => continue,
                Flow::Wait => return Ok(()),
                Flow::Scan => {}
            }

            match scanner::next_text_frame(&mut self.zephyr.buf)? {
                Some(frame) => self.handle_frame(frame),
                None => return Ok(()),
            }
        }
    }

    fn drain_shared(&mut self) -> Result<()> {
        loop {
            match self.advance_telemetry()? {
                Flow::Continue => continue,
                Flow::Wait => return Ok(()),
                Flow::Scan => {}
            }

            let Some(first) = self.zephyr.buf.first() else {
                return Ok(());
            };

            if scanner::is_padding(first) {
                self.zephyr.buf.consume_prefix(1)?;
            } else if first == b'<' {
                match scanner::next_text_frame(&mut self.zephyr.buf)? {
                    Some(frame) => self.handle_frame(frame),
                    None => return Ok(()),
                }
            } else {
                match scanner::next_line(&mut self.zephyr.buf)? {
                    Some(line) => self.emit_line(line),
                    None => return Ok(()),
                }
            }
        }
    }

    /// Binary sections always win over text scanning.
    fn advance_telemetry(&mut self) -> Result<Flow> {
        match self.zephyr.telemetry.try_consume(&mut self.zephyr.buf)? {
            Step::NothingPending => Ok(Flow::Scan),
            Step::Waiting { needed } => {
                tracing::trace!(needed, "waiting for telemetry bytes");
                Ok(Flow::Wait)
            }
            Step::Completed(telemetry) => {
                self.stats.telemetry += 1;
                self.sink.telemetry(&telemetry);
                self.emit_command(CommandEvent::TelemetryAckNeeded);
                Ok(Flow::Continue)
            }
        }
    }

    fn handle_frame(&mut self, frame: Decoded) {
        self.note_dropped(frame.dropped);

        let Classified { envelope, action } = match self.classifier.classify(&frame.text) {
            Ok(classified) => classified,
            Err(error) => {
                tracing::warn!(%error, frame = %frame.text, "discarding malformed envelope");
                self.stats.malformed_envelopes += 1;
                self.sink.diagnostic(&Diagnostic::MalformedEnvelope {
                    text: frame.text,
                    error,
                });
                return;
            }
        };

        match action {
            Action::None => {}
            Action::BeginTelemetry { remaining } => {
                self.zephyr.telemetry.begin(envelope.text.clone(), remaining);
            }
            Action::InvalidLength(error) => {
                tracing::warn!(%error, "telemetry header without usable length; no capture");
                self.stats.invalid_length_fields += 1;
                self.sink.diagnostic(&Diagnostic::InvalidLengthField {
                    header: envelope.text.clone(),
                    error,
                });
            }
            Action::Command(event) => self.emit_command(event),
        }

        tracing::debug!(kind = %envelope.kind, "envelope");
        self.stats.envelopes += 1;
        self.sink.envelope(&envelope);
    }

    fn emit_line(&mut self, line: Decoded) {
        self.note_dropped(line.dropped);
        self.stats.log_lines += 1;
        self.sink.log_line(line.text.trim_end());
    }

    fn emit_command(&mut self, event: CommandEvent) {
        tracing::debug!(%event, "command event");
        self.stats.command_events += 1;
        self.sink.command_event(event);
    }

    fn note_dropped(&mut self, dropped: usize) {
        if dropped == 0 {
            return;
        }
        tracing::warn!(dropped, "dropped non-ASCII bytes");
        self.stats.non_ascii_bytes += dropped as u64;
        self.sink.diagnostic(&Diagnostic::NonAsciiBytes { dropped });
    }
}
