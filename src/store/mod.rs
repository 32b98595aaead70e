//! Object store gateway
//!
//! Uniform access to the bucket's three stage partitions:
//! - `source/`: uploaded recordings (the only partition this service writes)
//! - `transcription/`: written by the external pipeline
//! - `processed/`: written by the external pipeline
//!
//! Object keys follow `<stage>/<identity>.<ext>`; the identity (file stem) is
//! the join key across all three partitions.

mod memory;
mod s3;

pub use memory::MemoryStore;
pub use s3::S3Store;

use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Pipeline stage, doubling as the bucket partition it lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Source,
    Transcription,
    Processed,
}

impl Stage {
    /// All stages in pipeline order.
    pub const ALL: [Stage; 3] = [Stage::Source, Stage::Transcription, Stage::Processed];

    /// Partition prefix inside the bucket, trailing slash included.
    pub fn prefix(&self) -> &'static str {
        match self {
            Stage::Source => "source/",
            Stage::Transcription => "transcription/",
            Stage::Processed => "processed/",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Source => "source",
            Stage::Transcription => "transcription",
            Stage::Processed => "processed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source" => Ok(Stage::Source),
            "transcription" => Ok(Stage::Transcription),
            "processed" => Ok(Stage::Processed),
            other => Err(format!("unknown stage '{other}'")),
        }
    }
}

/// One listed object, as reported by the store at listing time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectDescriptor {
    /// Full object key, partition prefix included.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last-modified timestamp, when the store reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// An immutable encoded blob ready for upload.
///
/// Created once at encode time for source artifacts; the other two stages are
/// produced externally and only ever read through the gateway.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    /// MIME type recorded on the stored object.
    pub content_type: String,
    /// Key extension, without the dot ("wav" for source audio).
    pub extension: String,
}

/// Deterministic object key for an identity within a stage.
pub fn object_key(stage: Stage, identity: &str, extension: &str) -> String {
    format!("{}{}.{}", stage.prefix(), identity, extension)
}

/// Gateway to the stage-partitioned bucket namespace.
///
/// Implementations never leak transport detail; failures map onto the
/// [`PipelineError`] taxonomy. Listings are fresh per call, nothing is
/// cached between invocations.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object under the stage's partition. Re-invocable; each call
    /// performs a fresh (internally paginated) listing.
    async fn list_partition(
        &self,
        bucket: &str,
        stage: Stage,
    ) -> Result<Vec<ObjectDescriptor>, PipelineError>;

    /// Upload an artifact under its deterministic key. Idempotent: a retry
    /// with the same identity overwrites rather than duplicates. Object
    /// creation is all-or-nothing: a cancelled or failed upload leaves no
    /// partial object visible at the key.
    async fn upload(
        &self,
        bucket: &str,
        stage: Stage,
        identity: &str,
        artifact: &Artifact,
    ) -> Result<(), PipelineError>;

    /// Generate a time-limited read-only URL for an existing object.
    async fn access_url(
        &self,
        bucket: &str,
        stage: Stage,
        key: &str,
        ttl: Duration,
    ) -> Result<String, PipelineError>;

    /// Read a text object's body (transcripts, summaries).
    async fn read_text(
        &self,
        bucket: &str,
        stage: Stage,
        key: &str,
    ) -> Result<String, PipelineError>;
}
