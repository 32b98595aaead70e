use super::{object_key, Artifact, ObjectDescriptor, ObjectStore, Stage};
use crate::error::PipelineError;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

/// S3-backed gateway to the stage-partitioned bucket.
///
/// Credentials and region come from the SDK's default provider chain
/// (environment, shared config, instance metadata).
pub struct S3Store {
    client: Client,
}

impl S3Store {
    /// Build a store from the ambient AWS configuration.
    pub async fn connect() -> Self {
        let cfg = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            client: Client::new(&cfg),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    async fn list_partition(
        &self,
        bucket: &str,
        stage: Stage,
    ) -> Result<Vec<ObjectDescriptor>, PipelineError> {
        let prefix = stage.prefix();
        let mut objects = Vec::new();

        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                classify(bucket, &e).unwrap_or_else(|| PipelineError::ListFailure {
                    stage,
                    reason: describe(&e),
                })
            })?;

            for obj in page.contents() {
                let Some(key) = obj.key() else { continue };
                // Buckets created via the console carry a zero-byte marker
                // object at the bare prefix; it is not a recording.
                if key == prefix {
                    continue;
                }
                objects.push(ObjectDescriptor {
                    key: key.to_string(),
                    size: obj.size().unwrap_or(0).max(0) as u64,
                    last_modified: obj
                        .last_modified()
                        .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
                });
            }
        }

        debug!(%stage, bucket, count = objects.len(), "listed partition");
        Ok(objects)
    }

    async fn upload(
        &self,
        bucket: &str,
        stage: Stage,
        identity: &str,
        artifact: &Artifact,
    ) -> Result<(), PipelineError> {
        let key = object_key(stage, identity, &artifact.extension);

        self.client
            .put_object()
            .bucket(bucket)
            .key(&key)
            .content_type(&artifact.content_type)
            .body(ByteStream::from(artifact.bytes.clone()))
            .send()
            .await
            .map_err(|e| {
                classify(bucket, &e).unwrap_or_else(|| PipelineError::Upload {
                    stage,
                    identity: identity.to_string(),
                    transient: is_transient(&e),
                    reason: describe(&e),
                })
            })?;

        info!(bucket, %stage, identity, bytes = artifact.bytes.len(), "uploaded artifact");
        Ok(())
    }

    async fn access_url(
        &self,
        bucket: &str,
        stage: Stage,
        key: &str,
        ttl: Duration,
    ) -> Result<String, PipelineError> {
        // Presigning never touches the object, so confirm existence first;
        // a deletion racing us after this check still yields a URL that 404s,
        // which the caller sees as the same ObjectNotFound condition later.
        if let Err(e) = self.client.head_object().bucket(bucket).key(key).send().await {
            if e.as_service_error().map_or(false, |se| se.is_not_found()) {
                return Err(PipelineError::ObjectNotFound {
                    stage,
                    key: key.to_string(),
                });
            }
            return Err(classify(bucket, &e).unwrap_or_else(|| PipelineError::Transport {
                stage,
                reason: describe(&e),
            }));
        }

        let presign_cfg = PresigningConfig::expires_in(ttl).map_err(|e| {
            PipelineError::Transport {
                stage,
                reason: format!("invalid presign ttl: {e}"),
            }
        })?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presign_cfg)
            .await
            .map_err(|e| {
                classify(bucket, &e).unwrap_or_else(|| PipelineError::Transport {
                    stage,
                    reason: describe(&e),
                })
            })?;

        Ok(request.uri().to_string())
    }

    async fn read_text(
        &self,
        bucket: &str,
        stage: Stage,
        key: &str,
    ) -> Result<String, PipelineError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map_or(false, |se| se.is_no_such_key()) {
                    PipelineError::ObjectNotFound {
                        stage,
                        key: key.to_string(),
                    }
                } else {
                    classify(bucket, &e).unwrap_or_else(|| PipelineError::Transport {
                        stage,
                        reason: describe(&e),
                    })
                }
            })?;

        let body = output.body.collect().await.map_err(|e| PipelineError::Transport {
            stage,
            reason: format!("reading object body: {e}"),
        })?;

        Ok(String::from_utf8_lossy(&body.into_bytes()).into_owned())
    }
}

/// Map bucket-level failures that invalidate every partition.
fn classify<E, R>(bucket: &str, err: &SdkError<E, R>) -> Option<PipelineError>
where
    E: ProvideErrorMetadata,
{
    match err.code() {
        Some("NoSuchBucket") => Some(PipelineError::BucketNotFound(bucket.to_string())),
        Some("AccessDenied") | Some("Forbidden") | Some("AllAccessDisabled") => {
            Some(PipelineError::AccessDenied(bucket.to_string()))
        }
        _ => None,
    }
}

/// Network-level failures are worth retrying; service rejections are not.
fn is_transient<E, R>(err: &SdkError<E, R>) -> bool {
    matches!(
        err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_)
    )
}

fn describe<E, R>(err: &SdkError<E, R>) -> String
where
    E: fmt::Display + fmt::Debug,
    R: fmt::Debug,
{
    match err.as_service_error() {
        Some(service) => service.to_string(),
        None => format!("{err:?}"),
    }
}
