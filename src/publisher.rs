use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::transport::{self, ObjectTransport, Request, Response};
use crate::{Manifest, RetryPolicy, SloError, SloResult};

/// Serializes and transmits manifests.
///
/// The container is fixed at construction; every publish targets an object
/// within it. Publishing never mutates an existing manifest in place: the
/// service creates a new object version from the transmitted body.
pub struct ManifestPublisher {
    transport: Arc<dyn ObjectTransport>,
    container: String,
    retry: RetryPolicy,
}

impl ManifestPublisher {
    pub fn new<S: Into<String>>(transport: Arc<dyn ObjectTransport>, container: S) -> Self {
        Self {
            transport,
            container: container.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Publish a static manifest: the explicit ordered segment list is the
    /// object body, and the transmitted content-length is its encoded byte
    /// count. Returns the service's aggregate etag over the segment etags,
    /// unmodified.
    #[instrument(skip(self, manifest), fields(container = %self.container))]
    pub async fn publish_static(&self, object_name: &str, manifest: &Manifest) -> SloResult<String> {
        let body = manifest.static_body()?;
        debug!(
            segments = manifest.segments.len(),
            body_bytes = body.len(),
            "publishing static manifest"
        );
        let request = transport::put_static_manifest_request(
            &self.container,
            object_name,
            body,
            &manifest.metadata,
            &manifest.headers,
        );
        self.send(object_name, request).await
    }

    /// Publish a dynamic manifest: a zero-byte object whose marker header
    /// names the segment path prefix the service concatenates at read time.
    /// Returns the etag of the zero-sized manifest object.
    #[instrument(skip(self, metadata, headers), fields(container = %self.container))]
    pub async fn publish_dynamic(
        &self,
        object_name: &str,
        metadata: &BTreeMap<String, String>,
        headers: &BTreeMap<String, String>,
    ) -> SloResult<String> {
        debug!("publishing dynamic manifest");
        let request =
            transport::put_dynamic_manifest_request(&self.container, object_name, metadata, headers);
        self.send(object_name, request).await
    }

    async fn send(&self, object_name: &str, request: Request) -> SloResult<String> {
        let mut attempt = 0;
        let response = loop {
            attempt += 1;
            match self
                .transport
                .execute(request.clone())
                .await
                .and_then(Response::error_for_status)
            {
                Ok(response) => break response,
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(object_name, attempt, error = %err, "manifest publish failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        };
        response.etag.ok_or_else(|| {
            SloError::invalid(format!(
                "manifest publish response for {} carried no etag",
                object_name
            ))
        })
    }
}
