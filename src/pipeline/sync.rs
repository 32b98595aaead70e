use super::view::{PipelineView, StageListing};
use crate::error::PipelineError;
use crate::store::{object_key, Artifact, ObjectStore, Stage};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{info, warn};

/// Where the synchronizer is in its refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Listing,
    Reconciled,
}

/// Reconciles the three stage partitions into per-recording views.
///
/// Refresh is caller-driven; the external pipeline gives no push
/// notifications and no completion deadline, so the only honest model is
/// polling the bucket, which is the single source of truth. Nothing is
/// persisted locally across restarts.
pub struct PipelineSynchronizer {
    store: Arc<dyn ObjectStore>,
    /// Per-partition listing deadline; a slow partition degrades to Unknown
    /// instead of stalling the whole refresh.
    list_timeout: Duration,
    snapshot: RwLock<Option<Arc<PipelineView>>>,
    state: RwLock<SyncState>,
}

impl PipelineSynchronizer {
    pub fn new(store: Arc<dyn ObjectStore>, list_timeout: Duration) -> Self {
        Self {
            store,
            list_timeout,
            snapshot: RwLock::new(None),
            state: RwLock::new(SyncState::Idle),
        }
    }

    pub async fn state(&self) -> SyncState {
        *self.state.read().await
    }

    /// Most recent reconciled snapshot, if any refresh has completed.
    /// Safe for concurrent read; replaced wholesale by `refresh`.
    pub async fn snapshot(&self) -> Option<Arc<PipelineView>> {
        self.snapshot.read().await.clone()
    }

    /// List all three partitions concurrently and rebuild the view.
    ///
    /// Partial failure degrades: a failed or timed-out partition marks its
    /// presence flags `Unknown` and the refresh still succeeds. Only
    /// `BucketNotFound` and `AccessDenied` abort outright, since then no
    /// partition is trustworthy.
    pub async fn refresh(&self, bucket: &str) -> Result<Arc<PipelineView>, PipelineError> {
        *self.state.write().await = SyncState::Listing;

        let (source, transcription, processed) = tokio::join!(
            self.list_stage(bucket, Stage::Source),
            self.list_stage(bucket, Stage::Transcription),
            self.list_stage(bucket, Stage::Processed),
        );

        let source = self.fail_idle(source).await?;
        let transcription = self.fail_idle(transcription).await?;
        let processed = self.fail_idle(processed).await?;

        let view = Arc::new(PipelineView::build(source, transcription, processed));
        info!(
            bucket,
            entries = view.entries.len(),
            failed_stages = view.failures.len(),
            "pipeline view reconciled"
        );

        *self.snapshot.write().await = Some(Arc::clone(&view));
        *self.state.write().await = SyncState::Reconciled;
        Ok(view)
    }

    /// Bucket-level failures abort the refresh; drop back to Idle on the way
    /// out so the state machine reflects that nothing was reconciled.
    async fn fail_idle<T>(&self, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
        if result.is_err() {
            *self.state.write().await = SyncState::Idle;
        }
        result
    }

    async fn list_stage(&self, bucket: &str, stage: Stage) -> Result<StageListing, PipelineError> {
        match timeout(self.list_timeout, self.store.list_partition(bucket, stage)).await {
            Ok(Ok(objects)) => Ok(StageListing::Listed(objects)),
            Ok(Err(e @ PipelineError::BucketNotFound(_)))
            | Ok(Err(e @ PipelineError::AccessDenied(_))) => Err(e),
            Ok(Err(e)) => {
                warn!(%stage, bucket, error = %e, "partition listing failed");
                Ok(StageListing::Failed(e.to_string()))
            }
            Err(_) => {
                warn!(%stage, bucket, timeout_ms = self.list_timeout.as_millis() as u64,
                    "partition listing timed out");
                Ok(StageListing::Failed(format!(
                    "timed out after {}ms",
                    self.list_timeout.as_millis()
                )))
            }
        }
    }

    /// Upload a source artifact under a fresh (or sanitized user-supplied)
    /// identity. The identity is eligible for the next refresh immediately,
    /// but no refresh is triggered here; staleness until the next explicit
    /// refresh is accepted.
    pub async fn submit_recording(
        &self,
        bucket: &str,
        artifact: &Artifact,
        requested_name: Option<&str>,
    ) -> Result<String, PipelineError> {
        let identity = generate_identity(requested_name);
        self.store
            .upload(bucket, Stage::Source, &identity, artifact)
            .await?;
        info!(bucket, identity, "recording submitted to source partition");
        Ok(identity)
    }

    /// Time-limited read URL for one stage output of a recording.
    pub async fn access_url(
        &self,
        bucket: &str,
        stage: Stage,
        identity: &str,
        ttl: Duration,
    ) -> Result<String, PipelineError> {
        let key = self.resolve_key(bucket, stage, identity).await?;
        self.store.access_url(bucket, stage, &key, ttl).await
    }

    /// Body of a text stage output (transcript or summary).
    pub async fn read_text(
        &self,
        bucket: &str,
        stage: Stage,
        identity: &str,
    ) -> Result<String, PipelineError> {
        let key = self.resolve_key(bucket, stage, identity).await?;
        self.store.read_text(bucket, stage, &key).await
    }

    /// Resolve an identity to its object key within a stage.
    ///
    /// The snapshot answers when it has the entry; otherwise source keys are
    /// deterministic, and the text stages (whose extension is chosen by the
    /// external pipeline) fall back to a fresh listing.
    async fn resolve_key(
        &self,
        bucket: &str,
        stage: Stage,
        identity: &str,
    ) -> Result<String, PipelineError> {
        if let Some(view) = self.snapshot().await {
            if let Some(key) = view.entry(identity).and_then(|e| e.stage(stage).key()) {
                return Ok(key.to_string());
            }
        }

        if stage == Stage::Source {
            return Ok(object_key(stage, identity, "wav"));
        }

        let objects = self.store.list_partition(bucket, stage).await?;
        objects
            .into_iter()
            .find(|o| super::view::identity_from_key(&o.key, stage).as_deref() == Some(identity))
            .map(|o| o.key)
            .ok_or_else(|| PipelineError::ObjectNotFound {
                stage,
                key: identity.to_string(),
            })
    }
}

/// Derive a recording identity.
///
/// A user-supplied name is sanitized and used verbatim; otherwise the name is
/// `recording-<YYYYmmdd-HHMMSS>-<uuid8>`, which is unique for all practical
/// purposes and stays deterministic as a key (retried uploads overwrite the
/// same object).
pub fn generate_identity(requested_name: Option<&str>) -> String {
    if let Some(name) = requested_name.and_then(sanitize_name) {
        return name;
    }
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "recording-{}-{}",
        Utc::now().format("%Y%m%d-%H%M%S"),
        &uuid[..8]
    )
}

/// Make a user-supplied name safe as a key stem: strip a typed `.wav`
/// extension, replace separators and whitespace with dashes. Empty results
/// fall through to an auto-generated name.
fn sanitize_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    let stem = trimmed.strip_suffix(".wav").unwrap_or(trimmed);
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_whitespace() {
                '-'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('-').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
