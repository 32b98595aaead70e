use super::backend::{
    CaptureBuffer, CaptureControl, CaptureFailure, CaptureRequest, InputDevice,
};
use crate::error::PipelineError;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Accepted capture durations, in seconds.
pub const MIN_DURATION_SECS: u32 = 1;
pub const MAX_DURATION_SECS: u32 = 300;

/// How a capture session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Full-duration capture with a finalized buffer. The only outcome that
    /// may be uploaded.
    Completed(CaptureBuffer),
    /// Cancelled before the deadline; the partial buffer was discarded.
    Aborted,
    /// The stream failed mid-capture; nothing usable was retained.
    DeviceError(PipelineError),
}

/// Progress of the currently active capture.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureProgress {
    pub elapsed_ms: u64,
    pub requested_secs: u32,
}

struct ActiveProbe {
    control: CaptureControl,
    requested_secs: u32,
}

/// Clears the active probe when the capture task exits, including by panic.
struct ProbeGuard {
    active: Arc<Mutex<Option<ActiveProbe>>>,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.active.lock() {
            *slot = None;
        }
    }
}

/// Drives bounded-duration captures against a single exclusively-held input
/// device.
///
/// The device slot is a one-permit semaphore: a second `start` while a
/// session is active fails fast with `SessionBusy` rather than queueing, and
/// the permit travels into the capture task so it is released on every exit
/// path: completion, abort, stream failure, even panic.
pub struct CaptureEngine {
    device: Arc<dyn InputDevice>,
    slot: Arc<Semaphore>,
    active: Arc<Mutex<Option<ActiveProbe>>>,
}

impl CaptureEngine {
    pub fn new(device: Arc<dyn InputDevice>) -> Self {
        Self {
            device,
            slot: Arc::new(Semaphore::new(1)),
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Begin a capture of `duration_secs` (1..=300) seconds.
    ///
    /// Returns the session handle immediately; the capture itself runs on a
    /// blocking thread. Await [`CaptureSession::wait`] for the outcome.
    pub fn start(&self, duration_secs: u32, channels: u16) -> Result<CaptureSession, PipelineError> {
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&duration_secs) {
            return Err(PipelineError::InvalidDuration(duration_secs));
        }

        let permit = self
            .slot
            .clone()
            .try_acquire_owned()
            .map_err(|_| PipelineError::SessionBusy)?;

        let control = CaptureControl::new();
        let request = CaptureRequest {
            duration: Duration::from_secs(u64::from(duration_secs)),
            channels,
        };

        if let Ok(mut active) = self.active.lock() {
            *active = Some(ActiveProbe {
                control: control.clone(),
                requested_secs: duration_secs,
            });
        }

        let device = Arc::clone(&self.device);
        let device_name = device.name();
        let task_control = control.clone();
        let active = Arc::clone(&self.active);

        info!(device = %device_name, duration_secs, "starting capture");

        let task: JoinHandle<SessionOutcome> = tokio::task::spawn_blocking(move || {
            // The permit lives (and the probe stays registered) exactly as
            // long as the capture, on every path out of this closure,
            // panics included.
            let _permit = permit;
            let _probe = ProbeGuard { active };
            let result = device.capture(&request, &task_control);
            match result {
                Ok(buffer) => {
                    info!(
                        samples = buffer.samples.len(),
                        sample_rate = buffer.sample_rate,
                        "capture completed"
                    );
                    SessionOutcome::Completed(buffer)
                }
                Err(CaptureFailure::Aborted) => {
                    info!("capture aborted, partial buffer discarded");
                    SessionOutcome::Aborted
                }
                Err(failure) => {
                    warn!(device = %device_name, "capture failed");
                    SessionOutcome::DeviceError(failure.into_error(&device_name))
                }
            }
        });

        Ok(CaptureSession { control, task })
    }

    /// Progress of the active capture, if one is running.
    pub fn progress(&self) -> Option<CaptureProgress> {
        let active = self.active.lock().ok()?;
        active.as_ref().map(|probe| CaptureProgress {
            elapsed_ms: probe.control.elapsed_ms(),
            requested_secs: probe.requested_secs,
        })
    }

    /// Request cancellation of the active capture. Returns whether there was
    /// one to cancel.
    pub fn cancel_active(&self) -> bool {
        match self.active.lock() {
            Ok(active) => match active.as_ref() {
                Some(probe) => {
                    probe.control.request_abort();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}

/// Handle to one in-flight capture. Ephemeral: consumed by `wait`, never
/// reused.
pub struct CaptureSession {
    control: CaptureControl,
    task: JoinHandle<SessionOutcome>,
}

impl CaptureSession {
    /// Milliseconds of audio captured so far; monotonically increasing.
    pub fn elapsed_ms(&self) -> u64 {
        self.control.elapsed_ms()
    }

    /// Request cancellation; the session will resolve to `Aborted`.
    pub fn cancel(&self) {
        self.control.request_abort();
    }

    /// Wait for the session to reach a terminal state.
    pub async fn wait(self) -> Result<SessionOutcome, PipelineError> {
        self.task.await.map_err(|e| PipelineError::DeviceError {
            device: "capture task".to_string(),
            reason: format!("capture task failed: {e}"),
        })
    }
}
