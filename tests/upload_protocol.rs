use bytes::Bytes;
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use swift_slo::transport::CONTENT_LENGTH_HEADER;
use swift_slo::{
    ManifestBuilder, ManifestPublisher, MemoryTransport, PartUploader, RetryPolicy, SloError,
    UploadCoordinator, UploadMode, UploadOptions,
};

const MEGABYTE: usize = 1024 * 1024;

/// Test factory functions
fn test_metadata() -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("myfoo".to_string(), "Bar".to_string());
    metadata
}

fn megabyte_of(fill: u8) -> Bytes {
    Bytes::from(vec![fill; MEGABYTE])
}

fn md5_hex(bytes: &[u8]) -> String {
    hex::encode(Md5::digest(bytes))
}

fn part_uploader(transport: &MemoryTransport) -> PartUploader {
    PartUploader::new(Arc::new(transport.clone()), RetryPolicy::none())
}

/// A1. Two one-megabyte segments plus a static manifest reconstruct an
/// object whose reported length is the sum and whose metadata round-trips
/// exactly.
#[tokio::test]
async fn test_static_manifest_reports_sum_and_metadata() {
    let transport = MemoryTransport::new();
    let uploader = part_uploader(&transport);

    // Arrange: upload the segments individually
    let seg1 = uploader
        .upload("cont", "name/1", megabyte_of(1), &BTreeMap::new(), &BTreeMap::new())
        .await
        .unwrap();
    let seg2 = uploader
        .upload("cont", "name/2", megabyte_of(2), &BTreeMap::new(), &BTreeMap::new())
        .await
        .unwrap();
    assert_eq!(seg1.size_bytes, MEGABYTE as u64);

    // Act: publish the static manifest referencing both
    let manifest = ManifestBuilder::new(UploadMode::Static)
        .build(vec![seg1.clone(), seg2.clone()], test_metadata(), BTreeMap::new())
        .unwrap();
    let publisher = ManifestPublisher::new(Arc::new(transport.clone()), "cont");
    let etag_of_etags = publisher.publish_static("name", &manifest).await.unwrap();

    // Assert: aggregate size, aggregate etag, metadata, object count
    assert_eq!(transport.object_size("cont/name"), Some(2 * MEGABYTE as u64));
    let expected = md5_hex(format!("{}{}", seg1.etag, seg2.etag).as_bytes());
    assert_eq!(etag_of_etags, expected);
    assert_eq!(transport.object_metadata("cont/name"), Some(test_metadata()));
    assert_eq!(transport.object_count(), 3);
}

/// A2. The manifest body's array order equals planner order regardless of
/// upload completion order under concurrency.
#[tokio::test]
async fn test_manifest_order_matches_plan_under_concurrency() {
    let transport = MemoryTransport::new();
    let coordinator = UploadCoordinator::new(transport.clone(), "cont");

    // 16 distinguishable segments uploaded 8 at a time
    let mut payload = Vec::new();
    for fill in 0u8..16 {
        payload.extend_from_slice(&vec![fill; 1024]);
    }
    let options = UploadOptions::new()
        .with_segment_size(1024)
        .with_concurrency(8);

    let receipt = coordinator
        .upload("ordered", Bytes::from(payload), options)
        .await
        .unwrap();

    assert_eq!(receipt.size_bytes, 16 * 1024);
    let segments = transport.manifest_segments("cont/ordered").unwrap();
    let names: Vec<_> = segments.iter().map(|s| s.path.clone()).collect();
    let expected: Vec<_> = (1..=16)
        .map(|n| format!("cont/ordered/{:08}", n))
        .collect();
    assert_eq!(names, expected);

    // each descriptor carries the etag of exactly the bytes sent
    for (index, segment) in segments.iter().enumerate() {
        assert_eq!(segment.etag, md5_hex(&vec![index as u8; 1024]));
        assert_eq!(segment.size_bytes, 1024);
    }
}

/// A3. One failing segment among N concurrent uploads aborts the whole
/// operation; no manifest PUT is ever issued.
#[tokio::test]
async fn test_segment_failure_aborts_without_manifest() {
    let transport = MemoryTransport::new();
    transport.fail_puts_matching("big/00000003", u32::MAX);
    let coordinator = UploadCoordinator::new(transport.clone(), "cont");

    let options = UploadOptions::new()
        .with_segment_size(1024)
        .with_concurrency(4)
        .with_retry(RetryPolicy::new(2, Duration::from_millis(1)));

    let err = coordinator
        .upload("big", Bytes::from(vec![0u8; 6 * 1024]), options)
        .await
        .unwrap_err();

    assert!(matches!(err, SloError::PartialUpload { total: 6, .. }));
    assert_eq!(transport.manifest_put_count(), 0);
    assert!(!transport.contains("cont/big"));
}

/// A4. Static manifest bodies with multi-byte paths are transmitted with
/// their byte length, not their character count.
#[tokio::test]
async fn test_unicode_paths_use_byte_length() {
    let transport = MemoryTransport::new();
    let uploader = part_uploader(&transport);

    let mut segments = Vec::new();
    for n in 1..=3 {
        let segment = uploader
            .upload(
                "cont",
                &format!("unic₪de/{}", n),
                Bytes::from_static(b"data-data"),
                &BTreeMap::new(),
                &BTreeMap::new(),
            )
            .await
            .unwrap();
        segments.push(segment);
    }

    let manifest = ManifestBuilder::new(UploadMode::Static)
        .build(segments, test_metadata(), BTreeMap::new())
        .unwrap();
    let body = manifest.static_body().unwrap();
    let char_count = String::from_utf8(body.clone()).unwrap().chars().count();
    assert_ne!(char_count, body.len());

    let publisher = ManifestPublisher::new(Arc::new(transport.clone()), "cont");
    publisher.publish_static("unic₪de", &manifest).await.unwrap();

    let manifest_put = transport
        .requests()
        .into_iter()
        .find(|r| r.is_manifest)
        .unwrap();
    assert_eq!(
        manifest_put
            .headers
            .get(CONTENT_LENGTH_HEADER)
            .map(String::as_str),
        Some(body.len().to_string().as_str())
    );
    assert_eq!(transport.object_size("cont/unic₪de"), Some(27));
}

/// A5. Dynamic uploads publish a prefix marker; the service assembles the
/// object from every segment under the prefix in lexical order.
#[tokio::test]
async fn test_dynamic_upload_assembles_by_prefix() {
    let transport = MemoryTransport::new();
    let coordinator = UploadCoordinator::new(transport.clone(), "cont");

    let options = UploadOptions::new()
        .with_mode(UploadMode::Dynamic)
        .with_segment_size(1024)
        .with_metadata("myfoo", "Bar");

    let receipt = coordinator
        .upload("video", Bytes::from(vec![9u8; 2500]), options)
        .await
        .unwrap();

    assert_eq!(receipt.size_bytes, 2500);
    // marker object is zero bytes; logical size resolves over the prefix
    assert_eq!(transport.object_size("cont/video"), Some(2500));
    assert!(transport.contains("cont/video/dlo/00000001"));
    assert!(transport.contains("cont/video/dlo/00000003"));
    assert_eq!(transport.object_metadata("cont/video"), Some(test_metadata()));
}

/// A6. Empty payloads: static mode publishes an explicit truncation, and a
/// dynamic publish with no parts yields a zero-size object.
#[tokio::test]
async fn test_empty_payload_publishes_zero_size_object() {
    let transport = MemoryTransport::new();
    let coordinator = UploadCoordinator::new(transport.clone(), "cont");

    let receipt = coordinator
        .upload("empty-static", Bytes::new(), UploadOptions::new())
        .await
        .unwrap();
    assert_eq!(receipt.size_bytes, 0);
    assert_eq!(transport.object_size("cont/empty-static"), Some(0));

    let receipt = coordinator
        .upload(
            "empty-dynamic",
            Bytes::new(),
            UploadOptions::new().with_mode(UploadMode::Dynamic),
        )
        .await
        .unwrap();
    assert_eq!(receipt.size_bytes, 0);
    assert_eq!(transport.object_size("cont/empty-dynamic"), Some(0));
}

/// A7. Transient segment failures are retried up to the bound and the
/// upload still succeeds.
#[tokio::test]
async fn test_transient_failures_recover_within_retry_budget() {
    let transport = MemoryTransport::new();
    transport.fail_puts_matching("resilient/00000002", 1);
    let coordinator = UploadCoordinator::new(transport.clone(), "cont");

    let options = UploadOptions::new()
        .with_segment_size(1024)
        .with_retry(RetryPolicy::new(3, Duration::from_millis(1)));

    let receipt = coordinator
        .upload("resilient", Bytes::from(vec![5u8; 3 * 1024]), options)
        .await
        .unwrap();

    assert_eq!(receipt.size_bytes, 3 * 1024);
    assert_eq!(transport.put_count_for("cont/resilient/00000002"), 2);
    assert_eq!(transport.manifest_put_count(), 1);
}

/// A8. End-to-end verification mode: corrupted segments abort the upload
/// before any manifest is published.
#[tokio::test]
async fn test_integrity_mismatch_aborts_upload() {
    let transport = MemoryTransport::new();
    transport.corrupt_etag_for("strict/00000001");
    let coordinator = UploadCoordinator::new(transport.clone(), "cont");

    let options = UploadOptions::new()
        .with_segment_size(1024)
        .with_verification();

    let err = coordinator
        .upload("strict", Bytes::from(vec![1u8; 2048]), options)
        .await
        .unwrap_err();

    match err {
        SloError::PartialUpload { source, .. } => {
            assert!(matches!(*source, SloError::IntegrityMismatch { .. }));
        }
        other => panic!("expected PartialUpload, got {other}"),
    }
    assert_eq!(transport.manifest_put_count(), 0);
}

/// A9. The receipt's etag equals the service-reported aggregate for the
/// whole coordinated upload.
#[tokio::test]
async fn test_receipt_surfaces_aggregate_etag_unmodified() {
    let transport = MemoryTransport::new();
    let coordinator = UploadCoordinator::new(transport.clone(), "cont");

    let receipt = coordinator
        .upload(
            "agg",
            Bytes::from(vec![3u8; 2048]),
            UploadOptions::new().with_segment_size(1024),
        )
        .await
        .unwrap();

    assert_eq!(Some(receipt.etag.as_str()), transport.object_etag("cont/agg").as_deref());
}
