use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::SloResult;

/// One independently stored chunk of a logically larger object.
///
/// The field names are the wire format of a static manifest element and
/// must not change: the storage service expects exactly
/// `{"path", "etag", "size_bytes"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Storage location of the segment (`container/objectName`)
    pub path: String,
    /// Content hash the service reported when the segment was written
    pub etag: String,
    /// Exact byte length of the segment payload as transmitted
    pub size_bytes: u64,
}

impl Segment {
    pub fn new<P, E>(path: P, etag: E, size_bytes: u64) -> Self
    where
        P: Into<String>,
        E: Into<String>,
    {
        Self {
            path: path.into(),
            etag: etag.into(),
            size_bytes,
        }
    }
}

/// Assembly instructions for a large object: an ordered segment list plus
/// the metadata and transport headers to attach when publishing.
///
/// Segment order is the byte order of the reconstructed object and is
/// preserved exactly through serialization. A manifest exists only in
/// memory during one upload; the durable representation is the object the
/// service creates from the published body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub segments: Vec<Segment>,
    pub metadata: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
}

impl Manifest {
    /// Sum of the segment sizes (the logical object size)
    pub fn total_size_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.size_bytes).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Serialize the segment list as the static manifest wire body.
    ///
    /// Returns encoded UTF-8 bytes, not a string: the transmitted
    /// content-length must be the byte count, which differs from the
    /// character count whenever a path contains multi-byte characters.
    pub fn static_body(&self) -> SloResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.segments)?)
    }
}

/// Receipt returned after a successful large object upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Etag of the published manifest. For static manifests this is the
    /// service-computed aggregate hash over the segment etags, surfaced
    /// unmodified.
    pub etag: String,
    /// Aggregate byte length of all uploaded segments
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_serializes_with_fixed_field_names() {
        let segment = Segment::new("/mycontainer/objseg1", "0228c7926b8b642dfb29554cd1f00963", 1468006);
        let json = serde_json::to_string(&segment).unwrap();
        assert_eq!(
            json,
            "{\"path\":\"/mycontainer/objseg1\",\"etag\":\"0228c7926b8b642dfb29554cd1f00963\",\"size_bytes\":1468006}"
        );
    }

    #[test]
    fn total_size_sums_all_segments() {
        let manifest = Manifest {
            segments: vec![
                Segment::new("c/a", "aa", 100),
                Segment::new("c/b", "bb", 250),
            ],
            metadata: BTreeMap::new(),
            headers: BTreeMap::new(),
        };
        assert_eq!(manifest.total_size_bytes(), 350);
    }
}
