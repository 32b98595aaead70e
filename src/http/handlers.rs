use super::state::AppState;
use crate::audio::{encode_wav, SessionOutcome};
use crate::error::PipelineError;
use crate::store::Stage;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SubmitRecordingRequest {
    /// Bucket to upload into; falls back to the configured default.
    pub bucket: Option<String>,

    /// Capture length in seconds (1..=300).
    pub duration_secs: u32,

    /// Optional recording name; auto-generated when omitted.
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitRecordingResponse {
    pub identity: Option<String>,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AccessUrlResponse {
    pub identity: String,
    pub stage: Stage,
    pub url: String,
    pub ttl_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct ContentResponse {
    pub identity: String,
    pub stage: Stage,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct AccessUrlQuery {
    /// URL lifetime in seconds; server default when omitted.
    pub ttl: Option<u64>,
}

/// Structured failure body: kind + stage + identity let the caller render a
/// specific message instead of a generic one.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

fn error_response(e: &PipelineError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match e {
        PipelineError::InvalidDuration(_) => StatusCode::BAD_REQUEST,
        PipelineError::SessionBusy => StatusCode::CONFLICT,
        PipelineError::DeviceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        PipelineError::AccessDenied(_) => StatusCode::FORBIDDEN,
        PipelineError::BucketNotFound(_) | PipelineError::ObjectNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        PipelineError::Upload { .. }
        | PipelineError::ListFailure { .. }
        | PipelineError::Transport { .. } => StatusCode::BAD_GATEWAY,
        PipelineError::DeviceError { .. } | PipelineError::Encoding(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
            kind: e.kind().to_string(),
            stage: e.stage(),
            identity: e.identity().map(str::to_string),
        }),
    )
}

fn missing_bucket() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: "no bucket named in the request and no default configured".to_string(),
            kind: "missing_bucket".to_string(),
            stage: None,
            identity: None,
        }),
    )
}

fn bad_stage(raw: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: format!("unknown stage '{raw}'; expected source, transcription or processed"),
            kind: "unknown_stage".to_string(),
            stage: None,
            identity: None,
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /recordings
/// Capture for the requested duration, encode, and upload to `source/`.
/// Blocks until the capture reaches a terminal state.
pub async fn submit_recording(
    State(state): State<AppState>,
    Json(req): Json<SubmitRecordingRequest>,
) -> impl IntoResponse {
    let Some(bucket) = state.bucket(req.bucket.as_deref()).map(str::to_string) else {
        return missing_bucket().into_response();
    };

    info!(bucket, duration_secs = req.duration_secs, "recording requested");

    let session = match state.engine.start(req.duration_secs, state.channels) {
        Ok(session) => session,
        Err(e) => {
            error!("failed to start capture: {e}");
            return error_response(&e).into_response();
        }
    };

    let outcome = match session.wait().await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("capture task failed: {e}");
            return error_response(&e).into_response();
        }
    };

    let buffer = match outcome {
        SessionOutcome::Completed(buffer) => buffer,
        SessionOutcome::Aborted => {
            return (
                StatusCode::OK,
                Json(SubmitRecordingResponse {
                    identity: None,
                    status: "aborted".to_string(),
                    message: "capture cancelled before completion; nothing uploaded".to_string(),
                }),
            )
                .into_response();
        }
        SessionOutcome::DeviceError(e) => {
            error!("capture failed: {e}");
            return error_response(&e).into_response();
        }
    };

    let artifact = match encode_wav(&buffer) {
        Ok(artifact) => artifact,
        Err(e) => {
            error!("encoding failed: {e}");
            return error_response(&e).into_response();
        }
    };

    match state
        .synchronizer
        .submit_recording(&bucket, &artifact, req.name.as_deref())
        .await
    {
        Ok(identity) => (
            StatusCode::OK,
            Json(SubmitRecordingResponse {
                identity: Some(identity.clone()),
                status: "uploaded".to_string(),
                message: format!("recording saved as {identity}"),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("upload failed: {e}");
            error_response(&e).into_response()
        }
    }
}

/// GET /recordings/active
/// Progress of the active capture, if one is running.
pub async fn capture_progress(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.progress() {
        Some(progress) => (StatusCode::OK, Json(progress)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no capture session is active".to_string(),
                kind: "no_active_session".to_string(),
                stage: None,
                identity: None,
            }),
        )
            .into_response(),
    }
}

/// POST /recordings/cancel
/// Abort the active capture; its partial buffer is discarded.
pub async fn cancel_capture(State(state): State<AppState>) -> impl IntoResponse {
    if state.engine.cancel_active() {
        (StatusCode::OK, Json(serde_json::json!({ "status": "cancelling" }))).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no capture session is active".to_string(),
                kind: "no_active_session".to_string(),
                stage: None,
                identity: None,
            }),
        )
            .into_response()
    }
}

/// GET /pipeline/:bucket
/// Fresh reconciliation pass over all three partitions.
pub async fn refresh_pipeline(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> impl IntoResponse {
    match state.synchronizer.refresh(&bucket).await {
        Ok(view) => (StatusCode::OK, Json(view.as_ref().clone())).into_response(),
        Err(e) => {
            error!("refresh failed for bucket {bucket}: {e}");
            error_response(&e).into_response()
        }
    }
}

/// GET /pipeline/:bucket/:stage/:identity/url
/// Time-limited read URL for one stage output.
pub async fn access_url(
    State(state): State<AppState>,
    Path((bucket, stage, identity)): Path<(String, String, String)>,
    Query(query): Query<AccessUrlQuery>,
) -> impl IntoResponse {
    let stage = match stage.parse::<Stage>() {
        Ok(stage) => stage,
        Err(_) => return bad_stage(&stage).into_response(),
    };
    let ttl = Duration::from_secs(query.ttl.unwrap_or(state.url_ttl.as_secs()));

    match state
        .synchronizer
        .access_url(&bucket, stage, &identity, ttl)
        .await
    {
        Ok(url) => (
            StatusCode::OK,
            Json(AccessUrlResponse {
                identity,
                stage,
                url,
                ttl_secs: ttl.as_secs(),
            }),
        )
            .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// GET /pipeline/:bucket/:stage/:identity/content
/// Body of a text stage output (transcript or summary).
pub async fn read_content(
    State(state): State<AppState>,
    Path((bucket, stage, identity)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let stage = match stage.parse::<Stage>() {
        Ok(stage) => stage,
        Err(_) => return bad_stage(&stage).into_response(),
    };

    match state.synchronizer.read_text(&bucket, stage, &identity).await {
        Ok(content) => (
            StatusCode::OK,
            Json(ContentResponse {
                identity,
                stage,
                content,
            }),
        )
            .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
