use std::path::PathBuf;

/// Errors that can occur opening or using a byte source.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the named serial port.
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        source: serialport::Error,
    },

    /// Failed to open a capture file for replay.
    #[error("failed to open capture file {path}: {source}")]
    Replay {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The serial driver reported an error (port enumeration, settings).
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// An I/O error occurred on an open source.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether the error means the device or file is missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            TransportError::Open { source, .. } | TransportError::Serial(source) => {
                source.kind() == serialport::ErrorKind::NoDevice
                    || matches!(
                        source.kind(),
                        serialport::ErrorKind::Io(std::io::ErrorKind::NotFound)
                    )
            }
            TransportError::Replay { source, .. } | TransportError::Io(source) => {
                source.kind() == std::io::ErrorKind::NotFound
            }
        }
    }

    /// Whether the error is a permissions failure.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            TransportError::Open { source, .. } | TransportError::Serial(source) => matches!(
                source.kind(),
                serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied)
            ),
            TransportError::Replay { source, .. } | TransportError::Io(source) => {
                source.kind() == std::io::ErrorKind::PermissionDenied
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
