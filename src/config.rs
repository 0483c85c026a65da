use std::collections::BTreeMap;
use std::time::Duration;

/// Which manifest variant an upload publishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// Explicit ordered segment list, server-verified aggregate etag
    #[default]
    Static,
    /// Prefix-based manifest, assembled by the service at read time
    Dynamic,
}

/// Configuration for one large object upload.
///
/// Immutable once constructed; every upload operation takes its own value.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Manifest variant to publish
    pub mode: UploadMode,

    /// Threshold for splitting: segments are at most this many bytes
    pub segment_size_bytes: u64,

    /// Max simultaneous part uploads
    pub concurrency: usize,

    /// Verify each segment's reported etag against a locally computed hash
    pub verify_integrity: bool,

    /// Bounded retry contract for segment and manifest writes
    pub retry: RetryPolicy,

    /// User metadata, attached as prefixed headers on every write
    pub metadata: BTreeMap<String, String>,

    /// Verbatim transport headers. Never override the computed
    /// content-length or manifest markers.
    pub headers: BTreeMap<String, String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            mode: UploadMode::Static,
            segment_size_bytes: 8 * 1024 * 1024, // 8MB
            concurrency: 4,
            verify_integrity: false,
            retry: RetryPolicy::default(),
            metadata: BTreeMap::new(),
            headers: BTreeMap::new(),
        }
    }
}

impl UploadOptions {
    /// Create options with defaults (static manifest, 8MB segments)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the manifest variant
    pub fn with_mode(mut self, mode: UploadMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the segment size threshold
    pub fn with_segment_size(mut self, bytes: u64) -> Self {
        self.segment_size_bytes = bytes;
        self
    }

    /// Set the max number of simultaneous part uploads
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Verify reported etags against locally computed hashes
    pub fn with_verification(mut self) -> Self {
        self.verify_integrity = true;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Add one user metadata entry
    pub fn with_metadata<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Add one verbatim transport header
    pub fn with_header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Bounded retry with exponential backoff for transient transport failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per write, including the first
    pub max_attempts: u32,

    /// Delay before the first retry; doubles each subsequent retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// No retries: a single attempt per write
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff.saturating_mul(1u32 << exponent)
    }
}
