//! Error taxonomy for the watchdog core and its collaborators.
//!
//! Only infrastructure failures are errors. A service that is down, or that
//! could not be brought back within the retry budget, is reported through
//! notifications and never surfaces here.

/// Raw configuration fields are malformed or out of range.
///
/// Raised while building a [`crate::context::WatchdogContext`], never at
/// engine runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field is absent from the raw settings.
    #[error("missing required field `{field}`")]
    MissingField {
        /// Raw field name.
        field: &'static str,
    },
    /// A field holds a value of the wrong type.
    #[error("field `{field}` must be {expected}")]
    InvalidType {
        /// Raw field name.
        field: &'static str,
        /// Human-readable description of the accepted type.
        expected: &'static str,
    },
    /// A numeric field is negative.
    #[error("field `{field}` can't be negative (got {value})")]
    Negative {
        /// Raw field name.
        field: &'static str,
        /// Offending value as given.
        value: String,
    },
    /// A numeric field has a fractional part.
    #[error("field `{field}` must be a whole number (got {value})")]
    NotInteger {
        /// Raw field name.
        field: &'static str,
        /// Offending value as given.
        value: String,
    },
    /// A numeric field does not fit the target integer type.
    #[error("field `{field}` is out of range (got {value})")]
    OutOfRange {
        /// Raw field name.
        field: &'static str,
        /// Offending value as given.
        value: String,
    },
    /// An entry of the service list is blank.
    #[error("service name at index {index} is empty")]
    EmptyServiceName {
        /// Position in the service list.
        index: usize,
    },
}

/// The service-control mechanism could not be invoked at all.
///
/// A clean non-zero exit status is a normal `false` result, not this error.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The control program could not be spawned (missing binary, permissions).
    #[error("failed to run `{program}`: {source}")]
    Spawn {
        /// Program that was being invoked.
        program: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The control program did not finish within its time bound.
    #[error("`{program}` timed out after {seconds}s for {unit}")]
    Timeout {
        /// Program that was being invoked.
        program: String,
        /// Unit the call was about.
        unit: String,
        /// Time bound in seconds.
        seconds: u64,
    },
}

/// Failure of a [`crate::engine::Watchdog::watch`] call.
///
/// Always fatal to the current `watch()` invocation; the driver decides
/// whether to start over or terminate.
#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    /// `watch()` was called before any `setup()`.
    #[error("watchdog is not configured; call setup() with a context first")]
    NotConfigured,
    /// A per-service check could not reach the control capability.
    #[error("service control failed: {0}")]
    Execution(#[from] ExecutionError),
    /// A per-service check task terminated abnormally.
    #[error("check task for {service} aborted: {detail}")]
    CheckPanicked {
        /// Unit name of the service being checked.
        service: String,
        /// Join failure description.
        detail: String,
    },
}

/// Errors produced by a settings store.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Database access failed.
    #[error("settings database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Settings file could not be read or written.
    #[error("settings file {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// Stored document could not be decoded or encoded.
    #[error("malformed settings document: {0}")]
    Malformed(String),
    /// Document decoded but is not a usable watchdog configuration.
    #[error("invalid settings document: {0}")]
    Invalid(#[from] ValidationError),
}

/// Errors produced by a notification sink.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Transport-level failure talking to the sink.
    #[error("notification transport failed: {0}")]
    Transport(String),
    /// The sink answered but refused the message.
    #[error("notification rejected: {0}")]
    Rejected(String),
}
