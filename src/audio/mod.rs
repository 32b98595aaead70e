//! Capture engine and artifact encoder
//!
//! Bounded-duration microphone capture behind the `InputDevice` seam, plus
//! the pure WAV encoder that turns a finalized buffer into an uploadable
//! artifact. One capture session may be active per process; the device is
//! held exclusively for the session's lifetime.

pub mod backend;
pub mod device;
pub mod engine;
pub mod wav;

pub use backend::{
    CaptureBuffer, CaptureControl, CaptureFailure, CaptureRequest, InputDevice, SyntheticDevice,
};
pub use device::CpalDevice;
pub use engine::{
    CaptureEngine, CaptureProgress, CaptureSession, SessionOutcome, MAX_DURATION_SECS,
    MIN_DURATION_SECS,
};
pub use wav::encode_wav;
