use std::collections::{BTreeMap, BTreeSet};

use crate::{Manifest, Segment, SloError, SloResult, UploadMode};

/// Assembles an ordered segment list plus user metadata into a manifest.
///
/// Pure and deterministic: the same input sequence and metadata always
/// produce a bit-identical manifest body. Input order is preserved exactly;
/// segments are never sorted, deduped, or reordered by path.
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    mode: UploadMode,
}

impl ManifestBuilder {
    pub fn new(mode: UploadMode) -> Self {
        Self { mode }
    }

    /// Build a manifest from descriptors in the given order.
    ///
    /// An empty descriptor sequence in static mode fails with
    /// [`SloError::EmptyManifest`]; deliberate truncation goes through
    /// [`ManifestBuilder::build_truncated`] instead.
    pub fn build(
        &self,
        segments: Vec<Segment>,
        metadata: BTreeMap<String, String>,
        headers: BTreeMap<String, String>,
    ) -> SloResult<Manifest> {
        if segments.is_empty() && self.mode == UploadMode::Static {
            return Err(SloError::EmptyManifest);
        }
        let mut seen = BTreeSet::new();
        for segment in &segments {
            if !seen.insert(segment.path.as_str()) {
                return Err(SloError::invalid(format!(
                    "segment path {} appears more than once",
                    segment.path
                )));
            }
        }
        Ok(Manifest {
            segments,
            metadata,
            headers,
        })
    }

    /// Build an explicitly empty manifest, truncating the object to zero
    /// bytes on publish
    pub fn build_truncated(
        &self,
        metadata: BTreeMap<String, String>,
        headers: BTreeMap<String, String>,
    ) -> Manifest {
        Manifest {
            segments: Vec::new(),
            metadata,
            headers,
        }
    }
}
