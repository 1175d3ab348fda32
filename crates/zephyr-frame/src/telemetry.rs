use bytes::BytesMut;

use crate::accumulator::ByteAccumulator;
use crate::error::Result;
use crate::message::Telemetry;
use crate::scanner::strip_leading_padding;

/// In-progress binary capture after a telemetry header.
#[derive(Debug)]
struct PendingTelemetry {
    header: String,
    remaining: usize,
    payload: BytesMut,
}

/// Outcome of [`TelemetryAssembler::try_consume`].
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// No capture in progress; the caller may scan for frames.
    NothingPending,
    /// A capture is in progress and `needed` more bytes must arrive first.
    Waiting { needed: usize },
    /// The binary section was captured and the pending record cleared.
    Completed(Telemetry),
}

/// Captures the fixed-size binary section that follows a `TM` header.
///
/// While a capture is pending the buffer's bytes are payload, never protocol
/// syntax, even if they happen to contain `</CRC>` or line feeds.
#[derive(Debug, Default)]
pub struct TelemetryAssembler {
    pending: Option<PendingTelemetry>,
}

impl TelemetryAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start capturing `remaining` bytes for `header`.
    pub fn begin(&mut self, header: impl Into<String>, remaining: usize) {
        let header = header.into();
        tracing::debug!(remaining, "telemetry capture started");
        self.pending = Some(PendingTelemetry {
            header,
            remaining,
            payload: BytesMut::with_capacity(remaining),
        });
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Bytes still owed to the pending capture.
    pub fn remaining(&self) -> Option<usize> {
        self.pending.as_ref().map(|pending| pending.remaining)
    }

    /// Header text of the pending capture.
    pub fn header(&self) -> Option<&str> {
        self.pending.as_ref().map(|pending| pending.header.as_str())
    }

    /// Abandon any capture in progress.
    pub fn reset(&mut self) {
        self.pending = None;
    }

    /// Take the binary section from `buf` once it is fully buffered.
    ///
    /// The section opens with `START`, so CR/LF at the front of `buf` is the
    /// header's trailing padding delivered in a later read and is dropped.
    pub fn try_consume(&mut self, buf: &mut ByteAccumulator) -> Result<Step> {
        let Some(pending) = self.pending.as_mut() else {
            return Ok(Step::NothingPending);
        };
        strip_leading_padding(buf)?;

        if buf.len() < pending.remaining {
            return Ok(Step::Waiting {
                needed: pending.remaining - buf.len(),
            });
        }

        let section = buf.consume_prefix(pending.remaining)?;
        pending.payload.extend_from_slice(&section);
        pending.remaining = 0;

        let Some(done) = self.pending.take() else {
            return Ok(Step::NothingPending);
        };
        tracing::debug!(bytes = done.payload.len(), "telemetry capture complete");
        Ok(Step::Completed(Telemetry {
            header: done.header,
            payload: done.payload.freeze(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_pending_leaves_buffer_alone() {
        let mut assembler = TelemetryAssembler::new();
        let mut buf = ByteAccumulator::new();
        buf.append(b"<TM>");

        assert_eq!(assembler.try_consume(&mut buf).unwrap(), Step::NothingPending);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn waits_until_section_is_complete() {
        let mut assembler = TelemetryAssembler::new();
        let mut buf = ByteAccumulator::new();
        assembler.begin("<TM><Length>2</Length></TM>", 12);

        buf.append(b"STARTx");
        assert_eq!(
            assembler.try_consume(&mut buf).unwrap(),
            Step::Waiting { needed: 6 }
        );
        assert_eq!(buf.len(), 6);
        assert!(assembler.is_pending());

        buf.append(b"y\x00\x01END<IMR/>");
        let Step::Completed(tm) = assembler.try_consume(&mut buf).unwrap() else {
            panic!("capture should complete");
        };
        assert_eq!(tm.header, "<TM><Length>2</Length></TM>");
        assert_eq!(tm.payload.as_ref(), b"STARTxy\x00\x01END");
        assert_eq!(buf.as_slice(), b"<IMR/>");
        assert!(!assembler.is_pending());
    }

    #[test]
    fn payload_may_contain_frame_markers() {
        let mut assembler = TelemetryAssembler::new();
        let mut buf = ByteAccumulator::new();
        assembler.begin("h", 17);
        buf.append(b"START</CRC>\n\x00\x00END");

        let Step::Completed(tm) = assembler.try_consume(&mut buf).unwrap() else {
            panic!("capture should complete");
        };
        assert_eq!(tm.payload.len(), 17);
        assert!(buf.is_empty());
    }

    #[test]
    fn late_header_padding_is_not_payload() {
        let mut assembler = TelemetryAssembler::new();
        let mut buf = ByteAccumulator::new();
        assembler.begin("h", 11);

        buf.append(b"\r");
        assert_eq!(
            assembler.try_consume(&mut buf).unwrap(),
            Step::Waiting { needed: 11 }
        );
        buf.append(b"\nSTARTz\r\nEND");
        let Step::Completed(tm) = assembler.try_consume(&mut buf).unwrap() else {
            panic!("capture should complete");
        };
        assert_eq!(tm.payload.as_ref(), b"STARTz\r\nEND");
    }

    #[test]
    fn reset_abandons_capture() {
        let mut assembler = TelemetryAssembler::new();
        assembler.begin("h", 10);
        assert_eq!(assembler.remaining(), Some(10));
        assert_eq!(assembler.header(), Some("h"));

        assembler.reset();
        assert_eq!(assembler.remaining(), None);
    }
}
