use bytes::Bytes;
use serde::Serialize;

use crate::error::Diagnostic;
use crate::tags::{
    BINARY_END_MARKER, BINARY_START_MARKER, RETURN_ACTION_ACK, SAFETY_ACK, TELEMETRY_ACK,
};

/// A structured Zephyr frame after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Name of the first top-level element (`TM`, `S`, `RA`, ...).
    pub kind: String,
    /// Compact JSON rendering of the parsed frame.
    pub rendered: String,
    /// Decoded frame text, without trailing padding.
    pub text: String,
}

/// A telemetry header together with its captured binary section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Telemetry {
    pub header: String,
    /// `START` + data + 2-byte CRC + `END`, exactly as received.
    pub payload: Bytes,
}

impl Telemetry {
    /// The data between the `START` marker and the trailing CRC.
    ///
    /// Returns `None` if the section does not carry the expected markers.
    pub fn data(&self) -> Option<&[u8]> {
        let body = self.payload.strip_prefix(BINARY_START_MARKER)?;
        let body = body.strip_suffix(BINARY_END_MARKER)?;
        body.len().checked_sub(2).map(|len| &body[..len])
    }

    /// The 2-byte big-endian CRC preceding `END`, if the markers are present.
    pub fn trailing_crc(&self) -> Option<u16> {
        let body = self.payload.strip_prefix(BINARY_START_MARKER)?;
        let body = body.strip_suffix(BINARY_END_MARKER)?;
        let crc = body.get(body.len().checked_sub(2)?..)?;
        Some(u16::from_be_bytes([crc[0], crc[1]]))
    }
}

/// A complete unit reconstructed from the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    LogLine(String),
    Envelope(Envelope),
    Telemetry(Telemetry),
}

impl Message {
    /// Short label used for display and filtering.
    pub fn kind(&self) -> &str {
        match self {
            Message::LogLine(_) => "LOG",
            Message::Envelope(envelope) => &envelope.kind,
            Message::Telemetry(_) => "TM-DATA",
        }
    }
}

/// Something the operator (or the auto-ack logic) must answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandEvent {
    TelemetryAckNeeded,
    SafetyAckNeeded,
    ReturnAckNeeded,
}

impl CommandEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandEvent::TelemetryAckNeeded => "telemetry-ack-needed",
            CommandEvent::SafetyAckNeeded => "safety-ack-needed",
            CommandEvent::ReturnAckNeeded => "return-ack-needed",
        }
    }

    /// Element name of the message that answers this event.
    pub fn reply_kind(self) -> &'static str {
        match self {
            CommandEvent::TelemetryAckNeeded => TELEMETRY_ACK,
            CommandEvent::SafetyAckNeeded => SAFETY_ACK,
            CommandEvent::ReturnAckNeeded => RETURN_ACTION_ACK,
        }
    }
}

impl std::fmt::Display for CommandEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sink call, recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Message(Message),
    Command(CommandEvent),
    Diagnostic(Diagnostic),
}
