use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error("could not parse value '{value}' to enum variant of '{enum_name}'")]
    StringToEnumParseError { enum_name: String, value: String },
    #[error("Error while deserializing")]
    SerdeError(#[from] serde_json::Error),
}

/// Failures while reading or writing framed DAP messages.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error")]
    IoError(#[from] std::io::Error),

    #[error("Unknown header: {header}")]
    UnknownHeader { header: String },

    #[error("Parse error")]
    ParseError(#[from] DeserializationError),

    #[error("Could not parse header line '{line}'")]
    HeaderParseError { line: String },

    #[error("Protocol error. {reason}")]
    ProtocolError { reason: String },
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::ParseError(err.into())
    }
}

impl TransportError {
    /// Returns `true` if the peer closed the stream.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            TransportError::IoError(err) if matches!(
                err.kind(),
                std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::UnexpectedEof
            )
        )
    }
}

/// Failures of a [`SnapshotCollector`](crate::collector::SnapshotCollector) while fetching
/// frames, locals or watch results.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("Transport error")]
    Transport(#[from] TransportError),

    #[error("Request '{command}' failed: {message}")]
    RequestFailed { command: String, message: String },

    #[error("No thread to inspect")]
    NoThread,

    #[error("Response to '{command}' has an invalid body")]
    InvalidBody {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Operation '{operation}' is not supported by this collector")]
    Unsupported { operation: &'static str },
}

impl CollectError {
    /// Returns `true` if the connection to the debugger can't be used anymore.
    ///
    /// Failed requests and messages that didn't decode only affect a single stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CollectError::Transport(err) if !matches!(err, TransportError::ParseError(_))
        )
    }
}

/// Contract violations detected by the diff engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Variable names must not be empty (frame '{frame}')")]
    EmptyVariableName { frame: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Collecting the stop snapshot failed")]
    Collect(#[from] CollectError),

    #[error("The diff engine rejected a variable")]
    Engine(#[from] EngineError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read configuration file")]
    IoError(#[from] std::io::Error),

    #[error("Could not parse configuration")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("Unknown log level '{level}'")]
    InvalidLogLevel { level: String },
}
