use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;

use crate::{SloError, SloResult};

/// Marker header naming the segment path prefix of a dynamic large object
pub const OBJECT_MANIFEST_HEADER: &str = "X-Object-Manifest";

/// Namespace prefix for user object metadata headers
pub const OBJECT_METADATA_PREFIX: &str = "X-Object-Meta-";

/// Query parameter marking a PUT body as a static large object manifest
pub const STATIC_MANIFEST_QUERY: (&str, &str) = ("multipart-manifest", "put");

/// Header carrying the service-reported content hash
pub const ETAG_HEADER: &str = "ETag";

/// Header carrying the transmitted body length in bytes
pub const CONTENT_LENGTH_HEADER: &str = "Content-Length";

/// HTTP method of a storage request. The protocol core only ever writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Put => "PUT",
        }
    }
}

/// One storage request, fully described before any transport is involved
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// `container/objectName` path within the storage account
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl Request {
    /// Whether this request publishes a manifest (either variant)
    pub fn is_manifest_put(&self) -> bool {
        self.headers.contains_key(OBJECT_MANIFEST_HEADER)
            || self
                .query
                .iter()
                .any(|(k, v)| k == STATIC_MANIFEST_QUERY.0 && v == STATIC_MANIFEST_QUERY.1)
    }
}

/// Response to a storage request
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Service-reported content hash of the bytes written
    pub etag: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Convert a non-2xx status into the matching error: 5xx is a
    /// retryable transport failure, anything else a request rejection.
    pub fn error_for_status(self) -> SloResult<Response> {
        if self.is_success() {
            return Ok(self);
        }
        let message = self
            .headers
            .get("X-Storage-Error")
            .cloned()
            .unwrap_or_else(|| "storage service returned an error status".to_string());
        if self.status >= 500 {
            Err(SloError::transport_status(self.status, message))
        } else {
            Err(SloError::request(self.status, message))
        }
    }
}

/// Narrow write-side contract the protocol depends on: send bytes plus
/// headers, get back a status and the service's content hash. Connection
/// failures surface as [`SloError::Transport`].
#[async_trait]
pub trait ObjectTransport: Send + Sync {
    async fn execute(&self, request: Request) -> SloResult<Response>;
}

/// Join a container and object name into a storage path
pub fn object_path(container: &str, object_name: &str) -> String {
    format!("{}/{}", container, object_name)
}

/// Build a plain object PUT (used for individual segments)
pub fn put_object_request(
    container: &str,
    object_name: &str,
    body: Bytes,
    metadata: &BTreeMap<String, String>,
    headers: &BTreeMap<String, String>,
) -> Request {
    let mut all = BTreeMap::new();
    apply_metadata(&mut all, metadata);
    apply_user_headers(&mut all, headers);
    all.insert(CONTENT_LENGTH_HEADER.to_string(), body.len().to_string());
    Request {
        method: Method::Put,
        path: object_path(container, object_name),
        query: Vec::new(),
        headers: all,
        body,
    }
}

/// Build a static manifest PUT. The body is the serialized segment list;
/// content-length is its encoded byte count.
pub fn put_static_manifest_request(
    container: &str,
    object_name: &str,
    body: Vec<u8>,
    metadata: &BTreeMap<String, String>,
    headers: &BTreeMap<String, String>,
) -> Request {
    let mut all = BTreeMap::new();
    apply_metadata(&mut all, metadata);
    apply_user_headers(&mut all, headers);
    all.insert(CONTENT_LENGTH_HEADER.to_string(), body.len().to_string());
    Request {
        method: Method::Put,
        path: object_path(container, object_name),
        query: vec![(
            STATIC_MANIFEST_QUERY.0.to_string(),
            STATIC_MANIFEST_QUERY.1.to_string(),
        )],
        headers: all,
        body: Bytes::from(body),
    }
}

/// Build a dynamic manifest PUT: zero-byte body, marker header pointing at
/// the segment path prefix (trailing slash required, the service matches
/// it as a prefix).
pub fn put_dynamic_manifest_request(
    container: &str,
    object_name: &str,
    metadata: &BTreeMap<String, String>,
    headers: &BTreeMap<String, String>,
) -> Request {
    let mut all = BTreeMap::new();
    apply_metadata(&mut all, metadata);
    apply_user_headers(&mut all, headers);
    all.insert(
        OBJECT_MANIFEST_HEADER.to_string(),
        format!("{}/{}/", container, object_name),
    );
    all.insert(CONTENT_LENGTH_HEADER.to_string(), "0".to_string());
    Request {
        method: Method::Put,
        path: object_path(container, object_name),
        query: Vec::new(),
        headers: all,
        body: Bytes::new(),
    }
}

/// Metadata keys are case-insensitive at the transport layer; lowercase
/// them under the prefix so the logical key set round-trips.
fn apply_metadata(target: &mut BTreeMap<String, String>, metadata: &BTreeMap<String, String>) {
    for (key, value) in metadata {
        target.insert(
            format!("{}{}", OBJECT_METADATA_PREFIX, key.to_ascii_lowercase()),
            value.clone(),
        );
    }
}

/// User headers go through verbatim, except the ones the builders compute
/// themselves.
fn apply_user_headers(target: &mut BTreeMap<String, String>, headers: &BTreeMap<String, String>) {
    for (key, value) in headers {
        if key.eq_ignore_ascii_case(CONTENT_LENGTH_HEADER)
            || key.eq_ignore_ascii_case(OBJECT_MANIFEST_HEADER)
        {
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}
