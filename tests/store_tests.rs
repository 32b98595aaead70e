// Tests for the object store gateway contract, exercised through the
// in-memory implementation: key convention, idempotent uploads, access URL
// existence checks, and bucket-level failures.

use recap::{Artifact, MemoryStore, ObjectStore, PipelineError, Stage};
use std::time::Duration;

fn wav_artifact(bytes: &[u8]) -> Artifact {
    Artifact {
        bytes: bytes.to_vec(),
        content_type: "audio/wav".to_string(),
        extension: "wav".to_string(),
    }
}

#[tokio::test]
async fn upload_uses_deterministic_key() {
    let store = MemoryStore::new();
    store.create_bucket("demo").await;

    store
        .upload("demo", Stage::Source, "rec1", &wav_artifact(b"abc"))
        .await
        .expect("upload should succeed");

    assert_eq!(
        store.object_bytes("demo", "source/rec1.wav").await,
        Some(b"abc".to_vec())
    );
}

#[tokio::test]
async fn repeated_upload_overwrites_instead_of_duplicating() {
    let store = MemoryStore::new();
    store.create_bucket("demo").await;

    store
        .upload("demo", Stage::Source, "rec1", &wav_artifact(b"first"))
        .await
        .expect("first upload");
    store
        .upload("demo", Stage::Source, "rec1", &wav_artifact(b"second"))
        .await
        .expect("retried upload");

    assert_eq!(store.partition_len("demo", Stage::Source).await, 1);
    assert_eq!(
        store.object_bytes("demo", "source/rec1.wav").await,
        Some(b"second".to_vec())
    );
}

#[tokio::test]
async fn failed_upload_carries_transience_and_writes_nothing() {
    let store = MemoryStore::new();
    store.create_bucket("demo").await;
    store.set_upload_failure(Stage::Source, true, true).await;

    let err = store
        .upload("demo", Stage::Source, "rec1", &wav_artifact(b"abc"))
        .await
        .expect_err("injected failure should surface");
    match &err {
        PipelineError::Upload {
            stage,
            identity,
            transient,
            ..
        } => {
            assert_eq!(*stage, Stage::Source);
            assert_eq!(identity, "rec1");
            assert!(*transient);
        }
        other => panic!("expected Upload, got {other:?}"),
    }
    assert!(err.is_transient());
    assert_eq!(err.kind(), "upload_error");

    // A failed upload leaves no partial object behind.
    assert_eq!(store.partition_len("demo", Stage::Source).await, 0);

    // Keys are deterministic, so a retry with the same identity lands at
    // the same key instead of duplicating.
    store.set_upload_failure(Stage::Source, false, false).await;
    store
        .upload("demo", Stage::Source, "rec1", &wav_artifact(b"abc"))
        .await
        .expect("retry should succeed");
    assert_eq!(store.partition_len("demo", Stage::Source).await, 1);
    assert_eq!(
        store.object_bytes("demo", "source/rec1.wav").await,
        Some(b"abc".to_vec())
    );
}

#[tokio::test]
async fn non_transient_upload_failure_is_not_retryable() {
    let store = MemoryStore::new();
    store.create_bucket("demo").await;
    store.set_upload_failure(Stage::Source, true, false).await;

    let err = store
        .upload("demo", Stage::Source, "rec1", &wav_artifact(b"abc"))
        .await
        .expect_err("injected failure should surface");
    assert!(matches!(
        err,
        PipelineError::Upload {
            transient: false,
            ..
        }
    ));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn listing_is_fresh_per_call() {
    let store = MemoryStore::new();
    store.create_bucket("demo").await;
    store.put_raw("demo", "source/rec1.wav", b"x".to_vec()).await;

    let first = store
        .list_partition("demo", Stage::Source)
        .await
        .expect("first listing");
    assert_eq!(first.len(), 1);

    store.delete("demo", "source/rec1.wav").await;

    // No caching between calls: the deletion is visible immediately.
    let second = store
        .list_partition("demo", Stage::Source)
        .await
        .expect("second listing");
    assert!(second.is_empty());
}

#[tokio::test]
async fn listing_skips_bare_partition_markers() {
    let store = MemoryStore::new();
    store.create_bucket("demo").await;
    // Console-created buckets carry a zero-byte object at the bare prefix.
    store.put_raw("demo", "source/", Vec::new()).await;
    store.put_raw("demo", "source/rec1.wav", b"x".to_vec()).await;

    let objects = store
        .list_partition("demo", Stage::Source)
        .await
        .expect("listing should succeed");
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].key, "source/rec1.wav");
}

#[tokio::test]
async fn access_url_requires_existing_object() {
    let store = MemoryStore::new();
    store.create_bucket("demo").await;
    store.put_raw("demo", "source/rec1.wav", b"x".to_vec()).await;
    let ttl = Duration::from_secs(60);

    let url = store
        .access_url("demo", Stage::Source, "source/rec1.wav", ttl)
        .await
        .expect("existing key should yield a URL");
    assert!(url.contains("source/rec1.wav"));

    match store
        .access_url("demo", Stage::Source, "source/rec2.wav", ttl)
        .await
    {
        Err(PipelineError::ObjectNotFound { stage, key }) => {
            assert_eq!(stage, Stage::Source);
            assert_eq!(key, "source/rec2.wav");
        }
        other => panic!("expected ObjectNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn read_text_returns_body_or_object_not_found() {
    let store = MemoryStore::new();
    store.create_bucket("demo").await;
    store
        .put_raw("demo", "transcription/rec1.txt", b"hello world".to_vec())
        .await;

    let content = store
        .read_text("demo", Stage::Transcription, "transcription/rec1.txt")
        .await
        .expect("read should succeed");
    assert_eq!(content, "hello world");

    let missing = store
        .read_text("demo", Stage::Processed, "processed/rec1.txt")
        .await;
    assert!(matches!(missing, Err(PipelineError::ObjectNotFound { .. })));
}

#[tokio::test]
async fn unknown_bucket_is_surfaced() {
    let store = MemoryStore::new();

    match store.list_partition("nope", Stage::Source).await {
        Err(PipelineError::BucketNotFound(bucket)) => assert_eq!(bucket, "nope"),
        other => panic!("expected BucketNotFound, got {other:?}"),
    }

    let upload = store
        .upload("nope", Stage::Source, "rec1", &wav_artifact(b"x"))
        .await;
    assert!(matches!(upload, Err(PipelineError::BucketNotFound(_))));
}

#[tokio::test]
async fn denied_bucket_is_surfaced() {
    let store = MemoryStore::new();
    store.create_bucket("locked").await;
    store.deny_bucket("locked").await;

    match store.list_partition("locked", Stage::Source).await {
        Err(PipelineError::AccessDenied(bucket)) => assert_eq!(bucket, "locked"),
        other => panic!("expected AccessDenied, got {other:?}"),
    }
}

#[test]
fn gateway_call_failures_report_their_own_kind() {
    let transport = PipelineError::Transport {
        stage: Stage::Processed,
        reason: "connection reset".to_string(),
    };
    assert_eq!(transport.kind(), "transport_error");
    assert_eq!(transport.stage(), Some(Stage::Processed));

    // Listing failures keep a distinct kind; they only ever come from
    // partition listings.
    let listing = PipelineError::ListFailure {
        stage: Stage::Source,
        reason: "connection reset".to_string(),
    };
    assert_eq!(listing.kind(), "list_failure");
}

#[test]
fn stage_prefixes_and_parsing_agree() {
    for stage in Stage::ALL {
        assert!(stage.prefix().ends_with('/'));
        assert_eq!(stage.name().parse::<Stage>().ok(), Some(stage));
    }
    assert!("summary".parse::<Stage>().is_err());
}
