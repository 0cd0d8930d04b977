/// Result alias that carries the custom [`ThrorganError`] type.
pub type Result<T> = std::result::Result<T, ThrorganError>;

/// Common error type for the core crate.
///
/// Variants up to [`ThrorganError::MissingTempo`] describe configuration
/// problems in the score or the render settings. They abort compilation of
/// the current file before any output is written.
#[derive(Debug, thiserror::Error)]
pub enum ThrorganError {
    #[error("invalid tempo {0}: beats per minute must be a positive number")]
    InvalidTempo(f64),
    #[error("invalid render configuration: {0}")]
    InvalidConfig(String),
    #[error("line {line}: unknown instrument type `{name}`")]
    UnknownInstrument { line: usize, name: String },
    #[error("line {line}: invalid instrument declaration: {reason}")]
    InvalidInstrument { line: usize, reason: String },
    #[error("instrument index {index} is out of range ({count} instruments declared)")]
    InstrumentIndex { index: usize, count: usize },
    #[error("line {line}: malformed header: {reason}")]
    MalformedHeader { line: usize, reason: String },
    #[error("line {line}: malformed note: {reason}")]
    MalformedNote { line: usize, reason: String },
    #[error("line {line}: a tempo must be declared in the header before {section}")]
    MissingTempo { line: usize, section: &'static str },
    /// Free-form message for callers that do not fit another variant.
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("wav output failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("could not read configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("spectrum analysis failed: {0}")]
    Fft(#[from] realfft::FftError),
}

impl ThrorganError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Returns `true` for errors caused by invalid input rather than by the
    /// environment (filesystem, encoder).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidTempo(_)
                | Self::InvalidConfig(_)
                | Self::UnknownInstrument { .. }
                | Self::InvalidInstrument { .. }
                | Self::InstrumentIndex { .. }
                | Self::MalformedHeader { .. }
                | Self::MalformedNote { .. }
                | Self::MissingTempo { .. }
        )
    }

    /// Attaches a source line to errors raised without one.
    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            Self::InstrumentIndex { index, count } => Self::MalformedNote {
                line,
                reason: format!(
                    "instrument index {index} is out of range ({count} instruments declared)"
                ),
            },
            Self::InvalidTempo(bpm) => Self::MalformedHeader {
                line,
                reason: format!("tempo must be a positive number, got {bpm}"),
            },
            other => other,
        }
    }
}

impl From<&str> for ThrorganError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for ThrorganError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
