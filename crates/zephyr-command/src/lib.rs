//! Outbound messages on the Zephyr link.
//!
//! Every message is a tab-indented element followed by a `<CRC>` line whose
//! value covers the element text. Telecommands and telemetry reports append a
//! `START` + data + CRC + `END` binary section.

pub mod crc;
pub mod error;
pub mod message;
pub mod writer;

pub use crc::{crc16_ccitt, zephyr_crc, CRC_SEED};
pub use error::{CommandError, Result};
pub use message::{
    binary_section, seal, validate_zenith, Ack, Command, GpsFix, InstrumentMode,
    TelemetryBuilder, DEFAULT_ZENITH,
};
pub use writer::{CommandWriter, Sent, FIRST_MESSAGE_ID};
