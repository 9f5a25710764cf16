use thiserror::Error;

/// Failures reported by a radio backend
#[derive(Debug, Error)]
pub enum RadioError {
    /// The caller lacks the capability to scan. Raised when authorization is
    /// revoked between the check and the trigger.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },
}

/// Failures of a scan cycle that are not ordinary outcomes
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("a scan is already waiting for results")]
    Busy,

    #[error("no scan is waiting for results")]
    NotScanning,

    #[error("scan completion signal source closed")]
    SignalLost,

    #[error("could not trigger scan: {0}")]
    Trigger(#[from] RadioError),
}
