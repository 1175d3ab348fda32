use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zephyr_command::{validate_zenith, DEFAULT_ZENITH};
use zephyr_frame::{ChannelMode, DemuxConfig};
use zephyr_transport::DEFAULT_BAUD_RATE;

use crate::exit::{command_error, config_error, io_error, CliResult};

pub const DEFAULT_INSTRUMENT: &str = "RATS";
pub const DEFAULT_GPS_INTERVAL_SECS: u64 = 60;

/// Settings for a simulator session, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    pub instrument: String,
    pub zephyr_port: Option<String>,
    /// Unset or equal to `zephyr_port` means both streams share one port.
    pub log_port: Option<String>,
    pub shared_ports: bool,
    pub baud_rate: u32,
    pub auto_ack: bool,
    pub auto_gps: bool,
    pub gps_interval: u64,
    pub sza: f64,
    /// Where session files are written; no files when unset.
    pub data_directory: Option<PathBuf>,
    /// Envelope kinds mapped to `false` are not displayed.
    pub message_display_filters: BTreeMap<String, bool>,
    /// Warn when nothing has been received for this many seconds.
    pub stall_warning: Option<u64>,
    pub demux: DemuxConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            instrument: DEFAULT_INSTRUMENT.to_string(),
            zephyr_port: None,
            log_port: None,
            shared_ports: false,
            baud_rate: DEFAULT_BAUD_RATE,
            auto_ack: true,
            auto_gps: false,
            gps_interval: DEFAULT_GPS_INTERVAL_SECS,
            sza: DEFAULT_ZENITH,
            data_directory: None,
            message_display_filters: BTreeMap::new(),
            stall_warning: None,
            demux: DemuxConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        let config: SimConfig = serde_json::from_str(&text)
            .map_err(|err| config_error(&format!("invalid config {}", path.display()), err))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> CliResult<()> {
        validate_zenith(self.sza).map_err(|err| command_error("invalid sza", err))?;
        Ok(())
    }

    /// Whether log and Zephyr content arrive on the same port.
    pub fn is_shared(&self) -> bool {
        self.shared_ports
            || match (&self.log_port, &self.zephyr_port) {
                (None, _) => true,
                (Some(log), Some(zephyr)) => log == zephyr,
                (Some(_), None) => false,
            }
    }

    pub fn channel_mode(&self) -> ChannelMode {
        if self.is_shared() {
            ChannelMode::Shared
        } else {
            ChannelMode::Separate
        }
    }

    pub fn demux_config(&self) -> DemuxConfig {
        DemuxConfig {
            mode: self.channel_mode(),
            ..self.demux.clone()
        }
    }
}
