use crate::markup::MarkupError;

/// Errors raised by the framing layer.
///
/// None of these terminate stream processing: the demultiplexer converts them
/// into [`Diagnostic`]s and moves on to the next frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A prefix longer than the buffered data was requested.
    #[error("insufficient data ({requested} bytes requested, {available} available)")]
    InsufficientData { requested: usize, available: usize },

    /// The frame could not be parsed as markup.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] MarkupError),

    /// The frame parsed but carries no element to classify.
    #[error("envelope has no top-level element")]
    EmptyEnvelope,

    /// A telemetry header carried no usable `Length` field.
    #[error("missing or invalid length field: {0}")]
    InvalidLengthField(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// A recovered condition, reported to the sink for operability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A frame was discarded because it did not parse.
    MalformedEnvelope { text: String, error: FrameError },
    /// A telemetry header was displayed but no binary capture was started.
    InvalidLengthField { header: String, error: FrameError },
    /// Bytes outside the ASCII range were dropped while decoding.
    NonAsciiBytes { dropped: usize },
}

impl Diagnostic {
    /// Short stable name of the condition class.
    pub fn class(&self) -> &'static str {
        match self {
            Diagnostic::MalformedEnvelope { .. } => "malformed-envelope",
            Diagnostic::InvalidLengthField { .. } => "invalid-length-field",
            Diagnostic::NonAsciiBytes { .. } => "non-ascii-bytes",
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::MalformedEnvelope { text, error } => {
                write!(f, "{error} (frame: {text:?})")
            }
            Diagnostic::InvalidLengthField { error, .. } => write!(f, "{error}"),
            Diagnostic::NonAsciiBytes { dropped } => {
                write!(f, "dropped {dropped} non-ASCII byte(s)")
            }
        }
    }
}
