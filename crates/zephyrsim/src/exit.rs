use std::fmt;
use std::io;

use zephyr_command::CommandError;
use zephyr_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    if err.is_permission_denied() {
        return CliError::new(PERMISSION_DENIED, format!("{context}: {err}"));
    }
    if err.is_not_found() {
        return CliError::new(FAILURE, format!("{context}: {err}"));
    }
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::Replay { .. } => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn command_error(context: &str, err: CommandError) -> CliError {
    match err {
        CommandError::Io(source) => io_error(context, source),
        CommandError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        CommandError::InvalidMode(_)
        | CommandError::InvalidAck(_)
        | CommandError::InvalidZenith(_)
        | CommandError::NonAsciiTelecommand
        | CommandError::EmptyInstrument => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

pub fn config_error(context: &str, err: serde_json::Error) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_permission_denied() {
        let err = io_error("open", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(err.code, PERMISSION_DENIED);
        assert!(err.to_string().starts_with("open: "));
    }

    #[test]
    fn invalid_command_input_is_usage() {
        let err = command_error("build", CommandError::InvalidZenith(200.0));
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn missing_capture_is_failure() {
        let err = transport_error(
            "replay",
            TransportError::Replay {
                path: "/nope".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, FAILURE);
    }
}
