//! Ground-side simulator for the Zephyr balloon gondola link.
//!
//! zephyrsim talks to a flight instrument the way the gondola does: it
//! parses the instrument's log and Zephyr streams, answers acknowledgements,
//! and sends modes, GPS fixes and telecommands.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial ports and capture-file replay
//! - [`frame`]: incremental framing and classification of inbound bytes
//! - [`command`]: outbound message construction and numbering
//!
//! # Example
//!
//! ```
//! use zephyrsim::command::{Command, InstrumentMode};
//! use zephyrsim::frame::{Channel, ChannelMode, Event, ProtocolDemux};
//!
//! let wire = Command::Mode(InstrumentMode::Flight).encode("LPC", 1).unwrap();
//!
//! let mut demux = ProtocolDemux::new(ChannelMode::Shared, Vec::<Event>::new());
//! demux.on_bytes_available(Channel::Zephyr, b"boot ok\r\n");
//! demux.on_bytes_available(Channel::Zephyr, &wire);
//!
//! assert_eq!(demux.stats().log_lines, 1);
//! assert_eq!(demux.stats().envelopes, 1);
//! ```

/// Re-export transport types.
pub mod transport {
    pub use zephyr_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use zephyr_frame::*;
}

/// Re-export command types.
pub mod command {
    pub use zephyr_command::*;
}
