use bytes::Bytes;
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::transport::{self, ObjectTransport, Response};
use crate::{RetryPolicy, Segment, SloError, SloResult};

/// Uploads one segment's bytes and returns its descriptor.
///
/// Retryable transport failures are retried up to the policy's bound with
/// exponential backoff; integrity mismatches and request rejections are
/// surfaced immediately.
pub struct PartUploader {
    transport: Arc<dyn ObjectTransport>,
    retry: RetryPolicy,
    verify_integrity: bool,
}

impl PartUploader {
    pub fn new(transport: Arc<dyn ObjectTransport>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            verify_integrity: false,
        }
    }

    /// Verify the service-reported etag against a locally computed MD5
    pub fn with_verification(mut self) -> Self {
        self.verify_integrity = true;
        self
    }

    /// Upload one segment. The returned descriptor carries the path the
    /// segment was written to, the etag the service reported for exactly
    /// the bytes sent, and the transmitted byte length.
    #[instrument(skip(self, bytes, metadata, headers), fields(size = bytes.len()))]
    pub async fn upload(
        &self,
        container: &str,
        segment_name: &str,
        bytes: Bytes,
        metadata: &BTreeMap<String, String>,
        headers: &BTreeMap<String, String>,
    ) -> SloResult<Segment> {
        let path = transport::object_path(container, segment_name);
        let size_bytes = bytes.len() as u64;

        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            let request =
                transport::put_object_request(container, segment_name, bytes.clone(), metadata, headers);
            match self
                .transport
                .execute(request)
                .await
                .and_then(Response::error_for_status)
            {
                Ok(response) => break response,
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(%path, attempt, error = %err, "segment upload failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        };

        let etag = response
            .etag
            .ok_or_else(|| SloError::invalid(format!("storage response for {} carried no etag", path)))?;

        if self.verify_integrity {
            let local = hex::encode(Md5::digest(&bytes));
            if !etag.eq_ignore_ascii_case(&local) {
                return Err(SloError::integrity_mismatch(
                    path.as_str(),
                    local.as_str(),
                    etag.as_str(),
                ));
            }
        }

        debug!(%path, size_bytes, %etag, "segment uploaded");
        Ok(Segment::new(path, etag, size_bytes))
    }
}
