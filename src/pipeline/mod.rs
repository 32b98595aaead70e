//! Pipeline synchronizer
//!
//! Correlates a recording's identity across the three stage partitions and
//! produces immutable, fully-rebuilt snapshots of what exists where. The
//! external transcribe/summarize pipeline runs out of band with unbounded
//! timing; this module only ever reflects what the bucket currently holds.

mod sync;
mod view;

pub use sync::{generate_identity, PipelineSynchronizer, SyncState};
pub use view::{
    identity_from_key, PipelineView, StageFailure, StageListing, StagePresence, ViewEntry,
};
