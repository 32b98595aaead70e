pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod store;

pub use audio::{
    encode_wav, CaptureBuffer, CaptureEngine, CaptureProgress, CaptureSession, CpalDevice,
    InputDevice, SessionOutcome, SyntheticDevice,
};
pub use config::Config;
pub use error::PipelineError;
pub use http::{create_router, AppState};
pub use pipeline::{PipelineSynchronizer, PipelineView, StagePresence, SyncState, ViewEntry};
pub use store::{Artifact, MemoryStore, ObjectDescriptor, ObjectStore, S3Store, Stage};
