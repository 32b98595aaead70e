use crate::store::Stage;
use thiserror::Error;

/// Failure taxonomy for capture, upload and reconciliation.
///
/// Every variant carries enough structure (kind + stage + identity) for a
/// caller to render a specific, actionable message instead of a generic one.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input device could not be opened (missing, busy, no permission).
    #[error("input device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Capture was interrupted mid-stream. Terminal for the session.
    #[error("capture failed on '{device}': {reason}")]
    DeviceError { device: String, reason: String },

    /// A capture session is already holding the device. Not queued.
    #[error("a capture session is already active")]
    SessionBusy,

    /// Requested duration outside the accepted 1..=300 second range.
    #[error("recording duration must be between 1 and 300 seconds, got {0}")]
    InvalidDuration(u32),

    /// Structurally invalid encoder input (empty buffer, zero sample rate).
    #[error("cannot encode artifact: {0}")]
    Encoding(String),

    /// Upload to a stage partition failed. Transient failures may be retried
    /// with the same identity; keys are deterministic so a retry overwrites.
    #[error("upload of '{identity}' to {stage} failed: {reason}")]
    Upload {
        stage: Stage,
        identity: String,
        transient: bool,
        reason: String,
    },

    /// The bucket does not exist. Aborts any refresh touching it.
    #[error("bucket '{0}' not found")]
    BucketNotFound(String),

    /// The caller is not allowed to read the bucket. Aborts any refresh.
    #[error("access denied to bucket '{0}'")]
    AccessDenied(String),

    /// The object was missing at call time. For access-URL generation this
    /// signals either a not-yet-processed stage or a race with an external
    /// deletion, distinguishable by the stage that raised it.
    #[error("no {stage} object for '{key}'")]
    ObjectNotFound { stage: Stage, key: String },

    /// A single partition listing failed. Refresh degrades the stage to
    /// Unknown rather than surfacing this directly.
    #[error("listing {stage} failed: {reason}")]
    ListFailure { stage: Stage, reason: String },

    /// A non-listing gateway call (presign, existence check, object read)
    /// failed at the transport or request level.
    #[error("storage gateway call for {stage} failed: {reason}")]
    Transport { stage: Stage, reason: String },
}

impl PipelineError {
    /// Stable machine-readable kind for structured error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeviceUnavailable(_) => "device_unavailable",
            Self::DeviceError { .. } => "device_error",
            Self::SessionBusy => "session_busy",
            Self::InvalidDuration(_) => "invalid_duration",
            Self::Encoding(_) => "encoding_error",
            Self::Upload { .. } => "upload_error",
            Self::BucketNotFound(_) => "bucket_not_found",
            Self::AccessDenied(_) => "access_denied",
            Self::ObjectNotFound { .. } => "object_not_found",
            Self::ListFailure { .. } => "list_failure",
            Self::Transport { .. } => "transport_error",
        }
    }

    /// Stage the failure is scoped to, when there is one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Upload { stage, .. }
            | Self::ObjectNotFound { stage, .. }
            | Self::ListFailure { stage, .. }
            | Self::Transport { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Recording identity or object key involved, when there is one.
    pub fn identity(&self) -> Option<&str> {
        match self {
            Self::Upload { identity, .. } => Some(identity),
            Self::ObjectNotFound { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Whether retrying the same call with the same arguments can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Upload { transient: true, .. })
    }
}
