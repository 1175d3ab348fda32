//! Incremental framing for the Zephyr instrument protocol.
//!
//! Bytes arrive from the transport in arbitrary chunks. The engine buffers
//! them per channel and emits complete units to a [`MessageSink`]:
//! - free-text log lines terminated by `\n`
//! - structured frames terminated by `</CRC>`, classified by their top-level tag
//! - fixed-size telemetry binary sections that follow a `TM` header
//!
//! While a telemetry capture is pending, buffered bytes are payload and are
//! never scanned for frame markers.

pub mod accumulator;
pub mod classify;
pub mod config;
pub mod demux;
pub mod error;
pub mod markup;
pub mod message;
pub mod scanner;
pub mod sink;
pub mod tags;
pub mod telemetry;

#[cfg(feature = "async")]
pub mod codec;

pub use accumulator::ByteAccumulator;
pub use classify::MessageClassifier;
pub use config::{ChannelMode, DemuxConfig, DEFAULT_MAX_DECLARED_LENGTH};
pub use demux::{Channel, DemuxStats, ProtocolDemux, StreamState};
pub use error::{Diagnostic, FrameError, Result};
pub use markup::{Element, MarkupError, Node};
pub use message::{CommandEvent, Envelope, Event, Message, Telemetry};
pub use sink::MessageSink;

#[cfg(feature = "async")]
pub use codec::ZephyrCodec;
