use thiserror::Error;

/// Faults a single relay invocation can surface to its caller.
///
/// Everything here is a request-level error: it becomes an HTTP response or
/// a terminal stream event, never a crash of the serving process.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to spawn engine process: {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("io error while streaming: {stream}")]
    StreamIo {
        stream: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Query timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The event consumer went away (client disconnect). Handled silently.
    #[error("event sink disconnected")]
    Disconnected,
}

impl RelayError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RelayError::Timeout { .. })
    }
}
