use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::plan::SegmentPlanner;
use crate::transport::ObjectTransport;
use crate::{
    ManifestBuilder, ManifestPublisher, PartUploader, Segment, SloError, SloResult, UploadMode,
    UploadOptions, UploadReceipt,
};

/// Orchestrates one large object upload: plan the segments, upload them
/// with bounded concurrency, build the manifest, publish it.
///
/// All segments must succeed before a manifest is built; a single failure
/// aborts the whole operation and no manifest referencing failed or
/// missing segments is ever published. Already-written segments are left
/// in storage for the caller to clean up.
///
/// Read-after-write visibility of published objects is the storage
/// service's guarantee, not this client's: callers that need it poll the
/// read path themselves.
pub struct UploadCoordinator {
    transport: Arc<dyn ObjectTransport>,
    container: String,
}

impl UploadCoordinator {
    pub fn new<T, S>(transport: T, container: S) -> Self
    where
        T: ObjectTransport + 'static,
        S: Into<String>,
    {
        Self {
            transport: Arc::new(transport),
            container: container.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Upload a payload as a large object and publish its manifest.
    ///
    /// Returns the published manifest's etag and the aggregate size of the
    /// uploaded segments. Success is all-or-nothing: a failed upload never
    /// returns a partial receipt.
    #[instrument(skip(self, payload, options), fields(container = %self.container, size = payload.len()))]
    pub async fn upload(
        &self,
        object_name: &str,
        payload: Bytes,
        options: UploadOptions,
    ) -> SloResult<UploadReceipt> {
        // Planning
        let planner =
            SegmentPlanner::new(object_name, options.mode, options.segment_size_bytes)?;
        let planned: Vec<_> = planner.plan(payload.len() as u64).collect();
        let total = planned.len();
        debug!(total, "segments planned");

        // Uploading: completion order is unconstrained, manifest order is
        // the plan order. Results land in slots keyed by plan index.
        let mut uploader = PartUploader::new(self.transport.clone(), options.retry.clone());
        if options.verify_integrity {
            uploader = uploader.with_verification();
        }

        let mut slots: Vec<Option<Segment>> = vec![None; total];
        {
            let mut uploads = stream::iter(planned.iter().map(|segment| {
                let bytes = payload
                    .slice(segment.offset as usize..(segment.offset + segment.len) as usize);
                let uploader = &uploader;
                let container = self.container.as_str();
                let metadata = &options.metadata;
                let headers = &options.headers;
                async move {
                    let descriptor = uploader
                        .upload(container, &segment.name, bytes, metadata, headers)
                        .await?;
                    Ok::<_, SloError>((segment.index, descriptor))
                }
            }))
            .buffer_unordered(options.concurrency.max(1));

            while let Some(result) = uploads.next().await {
                match result {
                    Ok((index, descriptor)) => slots[index] = Some(descriptor),
                    Err(err) => {
                        warn!(object_name, error = %err, "segment upload failed, aborting");
                        // dropping the stream cancels in-flight siblings
                        return Err(SloError::partial_upload(object_name, total, err));
                    }
                }
            }
        }

        let segments = slots
            .into_iter()
            .map(|slot| slot.ok_or_else(|| SloError::invalid("segment upload produced no descriptor")))
            .collect::<SloResult<Vec<Segment>>>()?;
        let size_bytes = segments.iter().map(|s| s.size_bytes).sum();

        // Building and publishing
        let builder = ManifestBuilder::new(options.mode);
        let publisher = ManifestPublisher::new(self.transport.clone(), self.container.clone())
            .with_retry(options.retry.clone());

        let etag = match options.mode {
            UploadMode::Dynamic => {
                publisher
                    .publish_dynamic(object_name, &options.metadata, &options.headers)
                    .await?
            }
            UploadMode::Static => {
                // an empty plan is a legal zero-sized object, published as
                // an explicit truncation
                let manifest = if segments.is_empty() {
                    builder.build_truncated(options.metadata.clone(), options.headers.clone())
                } else {
                    builder.build(segments, options.metadata.clone(), options.headers.clone())?
                };
                publisher.publish_static(object_name, &manifest).await?
            }
        };

        debug!(object_name, size_bytes, %etag, "large object upload complete");
        Ok(UploadReceipt { etag, size_bytes })
    }
}
