use async_trait::async_trait;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::transport::{
    ObjectTransport, Request, Response, CONTENT_LENGTH_HEADER, OBJECT_MANIFEST_HEADER,
    OBJECT_METADATA_PREFIX,
};
use crate::{Segment, SloResult};

/// A request the transport has seen, kept for test assertions
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body_len: u64,
    pub is_manifest: bool,
}

#[derive(Debug, Clone)]
struct StoredObject {
    body_len: u64,
    etag: String,
    metadata: BTreeMap<String, String>,
    manifest: Option<ManifestKind>,
}

#[derive(Debug, Clone)]
enum ManifestKind {
    Static(Vec<Segment>),
    Dynamic(String),
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    requests: Vec<RecordedRequest>,
    fail_puts: Vec<(String, u32)>,
    corrupt_etags: Vec<String>,
}

/// In-memory Swift-alike storage backend.
///
/// Implements the write-side semantics the upload protocol relies on:
/// MD5 etags, static manifest verification with an aggregate etag over the
/// referenced segment etags, and prefix-based dynamic manifest assembly.
/// Cloning shares the underlying store, so tests can hand one clone to a
/// coordinator and inspect the other.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<State>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the next `times` PUTs whose path contains `fragment` to fail
    /// with a retryable server error
    pub fn fail_puts_matching<S: Into<String>>(&self, fragment: S, times: u32) {
        self.state.lock().fail_puts.push((fragment.into(), times));
    }

    /// Report a wrong etag for PUTs whose path contains `fragment`,
    /// simulating corruption in transit
    pub fn corrupt_etag_for<S: Into<String>>(&self, fragment: S) {
        self.state.lock().corrupt_etags.push(fragment.into());
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.state.lock().objects.contains_key(path)
    }

    pub fn object_etag(&self, path: &str) -> Option<String> {
        self.state.lock().objects.get(path).map(|o| o.etag.clone())
    }

    pub fn object_metadata(&self, path: &str) -> Option<BTreeMap<String, String>> {
        self.state.lock().objects.get(path).map(|o| o.metadata.clone())
    }

    /// Logical size of an object. Manifests resolve to the assembled size:
    /// the segment list sum for static, the prefix match sum for dynamic.
    pub fn object_size(&self, path: &str) -> Option<u64> {
        let state = self.state.lock();
        let object = state.objects.get(path)?;
        Some(match &object.manifest {
            None => object.body_len,
            Some(ManifestKind::Static(segments)) => segments.iter().map(|s| s.size_bytes).sum(),
            Some(ManifestKind::Dynamic(prefix)) => state
                .objects
                .iter()
                .filter(|(key, _)| key.starts_with(prefix.as_str()))
                .map(|(_, o)| o.body_len)
                .sum(),
        })
    }

    /// Segment list a static manifest object was published with
    pub fn manifest_segments(&self, path: &str) -> Option<Vec<Segment>> {
        match self.state.lock().objects.get(path)?.manifest.clone()? {
            ManifestKind::Static(segments) => Some(segments),
            ManifestKind::Dynamic(_) => None,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    pub fn manifest_put_count(&self) -> usize {
        self.state.lock().requests.iter().filter(|r| r.is_manifest).count()
    }

    pub fn put_count_for(&self, path: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    fn rejection(status: u16, message: &str) -> Response {
        let mut headers = BTreeMap::new();
        headers.insert("X-Storage-Error".to_string(), message.to_string());
        Response {
            status,
            etag: None,
            headers,
        }
    }

    fn created(etag: String) -> Response {
        let mut headers = BTreeMap::new();
        headers.insert(crate::transport::ETAG_HEADER.to_string(), etag.clone());
        Response {
            status: 201,
            etag: Some(etag),
            headers,
        }
    }
}

fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

fn extract_metadata(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(OBJECT_METADATA_PREFIX)
                .map(|name| (name.to_string(), value.clone()))
        })
        .collect()
}

#[async_trait]
impl ObjectTransport for MemoryTransport {
    async fn execute(&self, request: Request) -> SloResult<Response> {
        let mut state = self.state.lock();
        state.requests.push(RecordedRequest {
            path: request.path.clone(),
            query: request.query.clone(),
            headers: request.headers.clone(),
            body_len: request.body.len() as u64,
            is_manifest: request.is_manifest_put(),
        });

        if let Some(entry) = state
            .fail_puts
            .iter_mut()
            .find(|(fragment, times)| *times > 0 && request.path.contains(fragment.as_str()))
        {
            entry.1 -= 1;
            return Ok(Self::rejection(503, "injected failure"));
        }

        // A declared length that does not match the transmitted bytes is
        // exactly the corruption the byte-length invariant guards against.
        let declared = request
            .headers
            .get(CONTENT_LENGTH_HEADER)
            .and_then(|v| v.parse::<u64>().ok());
        if declared != Some(request.body.len() as u64) {
            return Ok(Self::rejection(
                400,
                "content-length does not match transmitted body",
            ));
        }

        let metadata = extract_metadata(&request.headers);

        if let Some(prefix) = request.headers.get(OBJECT_MANIFEST_HEADER).cloned() {
            let etag = md5_hex(&request.body);
            state.objects.insert(
                request.path.clone(),
                StoredObject {
                    body_len: request.body.len() as u64,
                    etag: etag.clone(),
                    metadata,
                    manifest: Some(ManifestKind::Dynamic(prefix)),
                },
            );
            return Ok(Self::created(etag));
        }

        if request.is_manifest_put() {
            let segments: Vec<Segment> = match serde_json::from_slice(&request.body) {
                Ok(segments) => segments,
                Err(_) => return Ok(Self::rejection(400, "manifest body is not a segment list")),
            };
            let mut concatenated = String::new();
            for segment in &segments {
                let key = segment.path.trim_start_matches('/');
                match state.objects.get(key) {
                    None => {
                        return Ok(Self::rejection(400, "manifest references a missing segment"))
                    }
                    Some(stored) => {
                        if !stored.etag.eq_ignore_ascii_case(&segment.etag)
                            || stored.body_len != segment.size_bytes
                        {
                            return Ok(Self::rejection(
                                400,
                                "manifest segment etag or size does not match stored object",
                            ));
                        }
                        concatenated.push_str(&stored.etag);
                    }
                }
            }
            let etag = md5_hex(concatenated.as_bytes());
            state.objects.insert(
                request.path.clone(),
                StoredObject {
                    body_len: request.body.len() as u64,
                    etag: etag.clone(),
                    metadata,
                    manifest: Some(ManifestKind::Static(segments)),
                },
            );
            return Ok(Self::created(etag));
        }

        let reported = if state
            .corrupt_etags
            .iter()
            .any(|fragment| request.path.contains(fragment.as_str()))
        {
            md5_hex(b"corrupted in transit")
        } else {
            md5_hex(&request.body)
        };
        state.objects.insert(
            request.path.clone(),
            StoredObject {
                body_len: request.body.len() as u64,
                etag: reported.clone(),
                metadata,
                manifest: None,
            },
        );
        Ok(Self::created(reported))
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("objects", &self.object_count())
            .finish()
    }
}
