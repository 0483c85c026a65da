//! # swift-slo: client-side large object uploads for Swift-style object storage
//!
//! `swift-slo` implements the client half of the segmented-upload protocol:
//! payloads too large for a single PUT are split into named segments,
//! uploaded independently (in parallel), and tied together by a published
//! manifest that tells the storage service how to reassemble the logical
//! object.
//!
//! ## Key features
//!
//! - **Two manifest variants**: static (explicit ordered segment list with a
//!   server-verified aggregate etag) and dynamic (path-prefix marker,
//!   assembled by the service at read time)
//! - **Byte-accurate accounting**: manifest bodies are transmitted with
//!   their encoded byte length, so segment paths containing multi-byte
//!   characters never corrupt the request
//! - **All-or-nothing uploads**: a single failed segment aborts the whole
//!   operation before any manifest is published
//! - **Transport agnostic**: the protocol depends only on a narrow
//!   "send bytes, get back an etag" contract
//!
//! ## Quick start
//!
//! ```rust
//! use swift_slo::prelude::*;
//! use bytes::Bytes;
//!
//! # #[tokio::main]
//! # async fn main() -> SloResult<()> {
//! let transport = MemoryTransport::new();
//! let coordinator = UploadCoordinator::new(transport, "my-container");
//!
//! let options = UploadOptions::new()
//!     .with_segment_size(1024 * 1024)
//!     .with_concurrency(4)
//!     .with_metadata("myfoo", "Bar");
//!
//! let payload = Bytes::from(vec![7u8; 3 * 1024 * 1024]);
//! let receipt = coordinator.upload("big-object", payload, options).await?;
//!
//! assert_eq!(receipt.size_bytes, 3 * 1024 * 1024);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │ UploadCoordinator │  ← plan → upload → build → publish
//! ├───────────────────┤
//! │ SegmentPlanner    │  ← names and byte ranges
//! │ PartUploader      │  ← one segment write + integrity check
//! │ ManifestBuilder   │  ← ordered descriptors → manifest body
//! │ ManifestPublisher │  ← manifest PUT, byte-accurate length
//! ├───────────────────┤
//! │ ObjectTransport   │  ← narrow write contract (PUT + etag)
//! └───────────────────┘
//! ```
//!
//! Authentication, container administration, and the HTTP stack itself are
//! external collaborators behind [`ObjectTransport`].

mod config;
mod coordinator;
mod error;
mod manifest;
mod memory;
mod part;
pub mod plan;
mod publisher;
pub mod transport;
mod types;

// Re-export main types for clean API
pub use config::{RetryPolicy, UploadMode, UploadOptions};
pub use coordinator::UploadCoordinator;
pub use error::{SloError, SloResult};
pub use manifest::ManifestBuilder;
pub use memory::{MemoryTransport, RecordedRequest};
pub use part::PartUploader;
pub use plan::{PlannedSegment, SegmentPlan, SegmentPlanner};
pub use publisher::ManifestPublisher;
pub use transport::{ObjectTransport, Request, Response};
pub use types::{Manifest, Segment, UploadReceipt};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        MemoryTransport, ObjectTransport, Segment, SloError, SloResult, UploadCoordinator,
        UploadMode, UploadOptions, UploadReceipt,
    };
}
