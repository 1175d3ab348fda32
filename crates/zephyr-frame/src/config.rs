use serde::{Deserialize, Serialize};

use crate::accumulator::DEFAULT_BUFFER_CAPACITY;

/// Default upper bound on a declared telemetry `Length`: 16 MiB.
pub const DEFAULT_MAX_DECLARED_LENGTH: usize = 16 * 1024 * 1024;

/// How the log and Zephyr sub-streams reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// Two physical channels, one per sub-stream.
    #[default]
    Separate,
    /// One physical channel carrying both, told apart by content.
    Shared,
}

/// Configuration for the stream demultiplexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemuxConfig {
    /// Fixed for the lifetime of the engine.
    pub mode: ChannelMode,
    /// Declared lengths above this are treated as invalid length fields.
    pub max_declared_length: usize,
    /// Starting capacity of each channel buffer.
    pub initial_buffer_capacity: usize,
}

impl Default for DemuxConfig {
    fn default() -> Self {
        Self {
            mode: ChannelMode::Separate,
            max_declared_length: DEFAULT_MAX_DECLARED_LENGTH,
            initial_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl DemuxConfig {
    pub fn shared() -> Self {
        Self {
            mode: ChannelMode::Shared,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let cfg: DemuxConfig = serde_json::from_str(r#"{"mode":"shared"}"#).unwrap();
        assert_eq!(cfg.mode, ChannelMode::Shared);
        assert_eq!(cfg.max_declared_length, DEFAULT_MAX_DECLARED_LENGTH);
        assert_eq!(cfg.initial_buffer_capacity, DEFAULT_BUFFER_CAPACITY);
    }
}
