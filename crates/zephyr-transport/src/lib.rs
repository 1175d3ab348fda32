//! Byte sources for Zephyr instrument links.
//!
//! Provides one interface over the places protocol bytes come from:
//! - live serial ports (115200 8N1, no flow control)
//! - capture files replayed in fixed-size chunks
//!
//! Reads never block longer than the source's timeout; an empty read is
//! reported as [`ReadOutcome::Idle`] rather than an error.

pub mod error;
pub mod replay;
pub mod serial;
pub mod source;

pub use error::{Result, TransportError};
pub use replay::{ReplaySource, DEFAULT_CHUNK_SIZE};
pub use serial::{
    available_ports, PortInfo, SerialSettings, SerialStream, DEFAULT_BAUD_RATE,
    DEFAULT_READ_TIMEOUT,
};
pub use source::{ByteSource, ReadOutcome};
