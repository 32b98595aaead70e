//! HTTP API server exposed to the dashboard UI
//!
//! This module provides a REST API over the capture engine and pipeline
//! synchronizer:
//! - POST /recordings - capture, encode and upload a recording
//! - GET  /recordings/active - progress of the active capture
//! - POST /recordings/cancel - abort the active capture
//! - GET  /pipeline/:bucket - fresh reconciled pipeline view
//! - GET  /pipeline/:bucket/:stage/:identity/url - presigned read URL
//! - GET  /pipeline/:bucket/:stage/:identity/content - text artifact body
//! - GET  /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
