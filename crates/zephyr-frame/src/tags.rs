//! Top-level element names of the Zephyr protocol.
//!
//! Instrument to gondola: `TM`, `S`, `RA`, `IMR`, `TCAck`, `IMAck`.
//! Gondola to instrument: `IM`, `GPS`, `TC`, `SW`, `SAck`, `RAAck`, `TMAck`.

/// Telemetry header; announces a trailing binary section.
pub const TELEMETRY: &str = "TM";

/// Safety event; must be answered with [`SAFETY_ACK`].
pub const SAFETY: &str = "S";

/// Return-action request; must be answered with [`RETURN_ACTION_ACK`].
pub const RETURN_ACTION: &str = "RA";

/// Instrument-mode request from the instrument.
pub const MODE_REQUEST: &str = "IMR";

/// Instrument acknowledgement of a telecommand.
pub const TELECOMMAND_ACK: &str = "TCAck";

/// Instrument acknowledgement of a mode change.
pub const MODE_ACK: &str = "IMAck";

/// Instrument mode command.
pub const MODE: &str = "IM";

/// GPS report.
pub const GPS: &str = "GPS";

/// Telecommand with a binary section.
pub const TELECOMMAND: &str = "TC";

/// Shutdown warning.
pub const SHUTDOWN_WARNING: &str = "SW";

pub const SAFETY_ACK: &str = "SAck";
pub const RETURN_ACTION_ACK: &str = "RAAck";
pub const TELEMETRY_ACK: &str = "TMAck";

/// Trailer element carrying the frame checksum.
pub const CRC: &str = "CRC";

/// Literal end marker of every text frame.
pub const FRAME_END_MARKER: &[u8] = b"</CRC>";

/// `START` (5) + trailing CRC (2) + `END` (3) around a binary section.
pub const BINARY_OVERHEAD: usize = 10;

/// Opening marker of a binary section.
pub const BINARY_START_MARKER: &[u8] = b"START";

/// Closing marker of a binary section.
pub const BINARY_END_MARKER: &[u8] = b"END";

/// Human-readable description of a message kind.
pub fn describe(kind: &str) -> &'static str {
    match kind {
        TELEMETRY => "telemetry",
        SAFETY => "safety event",
        RETURN_ACTION => "return action",
        MODE_REQUEST => "mode request",
        TELECOMMAND_ACK => "telecommand ack",
        MODE_ACK => "mode ack",
        MODE => "instrument mode",
        GPS => "gps",
        TELECOMMAND => "telecommand",
        SHUTDOWN_WARNING => "shutdown warning",
        SAFETY_ACK => "safety ack",
        RETURN_ACTION_ACK => "return action ack",
        TELEMETRY_ACK => "telemetry ack",
        _ => "unknown",
    }
}

/// Returns true for any kind defined by the protocol.
pub fn is_known(kind: &str) -> bool {
    describe(kind) != "unknown"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_overhead_matches_markers() {
        assert_eq!(
            BINARY_START_MARKER.len() + 2 + BINARY_END_MARKER.len(),
            BINARY_OVERHEAD
        );
    }

    #[test]
    fn describes_known_and_unknown_kinds() {
        assert_eq!(describe("TM"), "telemetry");
        assert!(is_known("RAAck"));
        assert!(!is_known("XYZ"));
    }
}
