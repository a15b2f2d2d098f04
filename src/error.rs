//! Error types for runtime lookup, process transport and result decoding.

use thiserror::Error;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while evaluating JavaScript through an external engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The engine's executable could not be found on this machine.
    #[error("{0} runtime is not available on this machine")]
    RuntimeUnavailable(String),

    /// No runtime is registered under this name.
    #[error("unknown runtime: {0}")]
    UnknownRuntime(String),

    /// The engine process exited with a non-zero status.
    #[error("process exited with status {status}: {}", .stderr.trim())]
    ProcessExitedWithNonZeroStatus {
        status: i32,
        stdout: String,
        stderr: String,
    },

    /// The evaluated program threw; carries whatever the engine reported.
    #[error("program error: {}", describe_value(.0))]
    ProgramError(serde_json::Value),

    /// The engine produced no decodable `[status, value]` line.
    #[error("malformed engine output: {reason}")]
    MalformedOutput { reason: String, output: String },

    /// The interactive session has exited or was closed.
    #[error("session closed")]
    SessionClosed,

    /// A previous statement never finished reading its response.
    #[error("session is still awaiting a response to an earlier statement")]
    SessionBusy,

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for failures raised by the evaluated program itself rather than
    /// by the transport or the wrapper.
    pub fn is_program_error(&self) -> bool {
        matches!(self, Error::ProgramError(_))
    }
}

fn describe_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
