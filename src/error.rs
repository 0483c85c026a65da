use thiserror::Error;

/// Result type for large object operations
pub type SloResult<T> = Result<T, SloError>;

/// Errors that can occur during large object operations
#[derive(Error, Debug)]
pub enum SloError {
    /// Network or server-side failure (5xx). Safe to retry.
    #[error("transport failure: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The storage service rejected the request (4xx). Not retryable.
    #[error("request rejected (status {status}): {message}")]
    Request { status: u16, message: String },

    /// The service-reported etag does not match the locally computed hash.
    /// Signals corruption in transit; never retried.
    #[error("integrity mismatch for {path}: sent {expected}, service reported {actual}")]
    IntegrityMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// A static manifest publish was attempted with no segments.
    #[error("static manifest requires at least one segment")]
    EmptyManifest,

    /// One or more segment uploads failed; no manifest was published.
    /// Already-written segments remain in storage and must be cleaned up
    /// by the caller.
    #[error("upload of {object} aborted after a segment failure ({total} segments planned)")]
    PartialUpload {
        object: String,
        total: usize,
        #[source]
        source: Box<SloError>,
    },

    #[error("invalid request: {message}")]
    Invalid { message: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl SloError {
    /// Create a transport error without a status code (connection-level failure)
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Create a transport error carrying the server status
    pub fn transport_status<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a request rejection error
    pub fn request<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Request {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create an integrity mismatch error
    pub fn integrity_mismatch<S: Into<String>>(path: S, expected: S, actual: S) -> Self {
        Self::IntegrityMismatch {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Wrap a segment failure as a whole-upload abort
    pub fn partial_upload<S: Into<String>>(object: S, total: usize, source: SloError) -> Self {
        Self::PartialUpload {
            object: object.into(),
            total,
            source: Box::new(source),
        }
    }

    /// Whether the operation that produced this error may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
