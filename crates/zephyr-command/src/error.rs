/// Errors that can occur building or writing outbound messages.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Unknown instrument mode name.
    #[error("invalid instrument mode {0:?} (expected SB, FL, LP, SA or EF)")]
    InvalidMode(String),

    /// Unknown acknowledgement value.
    #[error("invalid acknowledgement {0:?} (expected ACK or NAK)")]
    InvalidAck(String),

    /// Solar zenith angle outside the physical range.
    #[error("solar zenith angle {0} outside 0..=180")]
    InvalidZenith(f64),

    /// Telecommand text must be ASCII so its length and CRC are well defined.
    #[error("telecommand contains non-ASCII text")]
    NonAsciiTelecommand,

    /// The instrument name is empty.
    #[error("instrument name must not be empty")]
    EmptyInstrument,

    /// The port accepted zero bytes.
    #[error("connection closed while writing")]
    ConnectionClosed,

    /// An I/O error occurred while writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CommandError>;
