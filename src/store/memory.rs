use super::{object_key, Artifact, ObjectDescriptor, ObjectStore, Stage};
use crate::error::PipelineError;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    last_modified: chrono::DateTime<Utc>,
}

/// In-process object store for tests and offline development.
///
/// Mirrors the gateway contract exactly, including bucket-level failures and
/// injectable per-stage listing and upload failures so partial-refresh and
/// retry behavior can be exercised without a network.
#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, BTreeMap<String, StoredObject>>>,
    failed_listings: Mutex<HashSet<Stage>>,
    // stage -> whether the injected failure reads as transient
    failed_uploads: Mutex<HashMap<Stage, bool>>,
    denied_buckets: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the bucket (empty partitions; partitions themselves are
    /// implicit, matching S3 prefixes).
    pub async fn create_bucket(&self, bucket: &str) {
        self.buckets
            .lock()
            .await
            .entry(bucket.to_string())
            .or_default();
    }

    /// Seed an object directly, bypassing the upload path. Used to simulate
    /// the external pipeline writing transcription/processed outputs.
    pub async fn put_raw(&self, bucket: &str, key: &str, bytes: Vec<u8>) {
        self.buckets
            .lock()
            .await
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                StoredObject {
                    bytes,
                    last_modified: Utc::now(),
                },
            );
    }

    /// Remove an object, simulating an out-of-band deletion.
    pub async fn delete(&self, bucket: &str, key: &str) {
        if let Some(objects) = self.buckets.lock().await.get_mut(bucket) {
            objects.remove(key);
        }
    }

    /// Toggle listing failure for one stage.
    pub async fn set_listing_failure(&self, stage: Stage, failing: bool) {
        let mut failed = self.failed_listings.lock().await;
        if failing {
            failed.insert(stage);
        } else {
            failed.remove(&stage);
        }
    }

    /// Toggle upload failure for one stage. While set, uploads fail with
    /// the given transience and the object is never written.
    pub async fn set_upload_failure(&self, stage: Stage, failing: bool, transient: bool) {
        let mut failed = self.failed_uploads.lock().await;
        if failing {
            failed.insert(stage, transient);
        } else {
            failed.remove(&stage);
        }
    }

    /// Mark a bucket as access-denied.
    pub async fn deny_bucket(&self, bucket: &str) {
        self.denied_buckets.lock().await.insert(bucket.to_string());
    }

    /// Raw object bytes, if present. Test inspection helper.
    pub async fn object_bytes(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets
            .lock()
            .await
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|o| o.bytes.clone())
    }

    /// Number of objects under a stage's partition. Test inspection helper.
    pub async fn partition_len(&self, bucket: &str, stage: Stage) -> usize {
        self.buckets
            .lock()
            .await
            .get(bucket)
            .map(|objects| {
                objects
                    .keys()
                    .filter(|k| k.starts_with(stage.prefix()))
                    .count()
            })
            .unwrap_or(0)
    }

    async fn check_bucket(&self, bucket: &str) -> Result<(), PipelineError> {
        if self.denied_buckets.lock().await.contains(bucket) {
            return Err(PipelineError::AccessDenied(bucket.to_string()));
        }
        if !self.buckets.lock().await.contains_key(bucket) {
            return Err(PipelineError::BucketNotFound(bucket.to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryStore {
    async fn list_partition(
        &self,
        bucket: &str,
        stage: Stage,
    ) -> Result<Vec<ObjectDescriptor>, PipelineError> {
        self.check_bucket(bucket).await?;

        if self.failed_listings.lock().await.contains(&stage) {
            return Err(PipelineError::ListFailure {
                stage,
                reason: "injected listing failure".to_string(),
            });
        }

        let buckets = self.buckets.lock().await;
        let objects = buckets.get(bucket).map(|o| {
            o.iter()
                .filter(|(key, _)| key.starts_with(stage.prefix()) && key.as_str() != stage.prefix())
                .map(|(key, obj)| ObjectDescriptor {
                    key: key.clone(),
                    size: obj.bytes.len() as u64,
                    last_modified: Some(obj.last_modified),
                })
                .collect()
        });
        Ok(objects.unwrap_or_default())
    }

    async fn upload(
        &self,
        bucket: &str,
        stage: Stage,
        identity: &str,
        artifact: &Artifact,
    ) -> Result<(), PipelineError> {
        self.check_bucket(bucket).await?;

        if let Some(&transient) = self.failed_uploads.lock().await.get(&stage) {
            return Err(PipelineError::Upload {
                stage,
                identity: identity.to_string(),
                transient,
                reason: "injected upload failure".to_string(),
            });
        }

        let key = object_key(stage, identity, &artifact.extension);
        self.put_raw(bucket, &key, artifact.bytes.clone()).await;
        Ok(())
    }

    async fn access_url(
        &self,
        bucket: &str,
        stage: Stage,
        key: &str,
        ttl: Duration,
    ) -> Result<String, PipelineError> {
        self.check_bucket(bucket).await?;
        let buckets = self.buckets.lock().await;
        let exists = buckets
            .get(bucket)
            .map_or(false, |objects| objects.contains_key(key));
        if !exists {
            return Err(PipelineError::ObjectNotFound {
                stage,
                key: key.to_string(),
            });
        }
        Ok(format!("memory://{bucket}/{key}?expires={}", ttl.as_secs()))
    }

    async fn read_text(
        &self,
        bucket: &str,
        stage: Stage,
        key: &str,
    ) -> Result<String, PipelineError> {
        self.check_bucket(bucket).await?;
        let buckets = self.buckets.lock().await;
        match buckets.get(bucket).and_then(|objects| objects.get(key)) {
            Some(obj) => Ok(String::from_utf8_lossy(&obj.bytes).into_owned()),
            None => Err(PipelineError::ObjectNotFound {
                stage,
                key: key.to_string(),
            }),
        }
    }
}
