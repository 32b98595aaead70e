use crate::error::PipelineError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Parameters for one bounded capture.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    /// Requested capture length. The engine validates the 1..=300s bound
    /// before this ever reaches a device.
    pub duration: Duration,
    /// Target channel count (1 = mono, 2 = stereo).
    pub channels: u16,
}

/// Finalized, immutable samples from a completed capture.
#[derive(Debug, Clone)]
pub struct CaptureBuffer {
    /// Raw audio samples (i16 PCM, interleaved).
    pub samples: Vec<i16>,
    /// Sample rate in Hz, as delivered by the device.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u16,
}

impl CaptureBuffer {
    /// Capture length implied by the sample count.
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// Shared observation and cancellation handles for an in-flight capture.
///
/// The device updates `elapsed_ms` monotonically; the caller flips `abort`
/// to request cancellation before the duration elapses.
#[derive(Debug, Clone, Default)]
pub struct CaptureControl {
    elapsed_ms: Arc<AtomicU64>,
    abort: Arc<AtomicBool>,
}

impl CaptureControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms.load(Ordering::SeqCst)
    }

    pub(crate) fn advance_to(&self, elapsed_ms: u64) {
        // Progress stays monotone even if a device reports out of order.
        self.elapsed_ms.fetch_max(elapsed_ms, Ordering::SeqCst);
    }

    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }
}

/// Audio input device seam.
///
/// Implementations:
/// - `CpalDevice`: the system microphone via cpal
/// - `SyntheticDevice`: deterministic generated audio (for tests)
///
/// `capture` runs on a blocking thread (cpal streams are not `Send`) and must
/// honor `control.abort_requested()` promptly. On abort the partial buffer is
/// discarded; it never escapes as a completed capture.
pub trait InputDevice: Send + Sync {
    /// Human-readable device name for logging and error messages.
    fn name(&self) -> String;

    fn capture(
        &self,
        request: &CaptureRequest,
        control: &CaptureControl,
    ) -> Result<CaptureBuffer, CaptureFailure>;
}

/// Why a capture ended without a completed buffer.
#[derive(Debug)]
pub enum CaptureFailure {
    /// The caller cancelled before the duration elapsed.
    Aborted,
    /// The device could not be opened.
    Unavailable(String),
    /// The stream failed mid-capture.
    Stream(String),
}

impl CaptureFailure {
    pub(crate) fn into_error(self, device: &str) -> PipelineError {
        match self {
            // Aborted is a terminal status, not an error; callers observe it
            // through SessionOutcome. This arm only exists for completeness.
            CaptureFailure::Aborted => PipelineError::DeviceError {
                device: device.to_string(),
                reason: "capture aborted".to_string(),
            },
            CaptureFailure::Unavailable(reason) => PipelineError::DeviceUnavailable(reason),
            CaptureFailure::Stream(reason) => PipelineError::DeviceError {
                device: device.to_string(),
                reason,
            },
        }
    }
}

/// Deterministic device generating silence at a fixed rate. The tick interval
/// controls how often abort is checked; tests keep it small.
pub struct SyntheticDevice {
    pub sample_rate: u32,
    pub tick: Duration,
}

impl Default for SyntheticDevice {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            tick: Duration::from_millis(10),
        }
    }
}

impl InputDevice for SyntheticDevice {
    fn name(&self) -> String {
        "synthetic".to_string()
    }

    fn capture(
        &self,
        request: &CaptureRequest,
        control: &CaptureControl,
    ) -> Result<CaptureBuffer, CaptureFailure> {
        let total_ms = request.duration.as_millis() as u64;
        let mut elapsed = Duration::ZERO;

        while (elapsed.as_millis() as u64) < total_ms {
            if control.abort_requested() {
                return Err(CaptureFailure::Aborted);
            }
            std::thread::sleep(self.tick);
            elapsed += self.tick;
            control.advance_to((elapsed.as_millis() as u64).min(total_ms));
        }

        let frames = (request.duration.as_secs_f64() * self.sample_rate as f64) as usize;
        Ok(CaptureBuffer {
            samples: vec![0i16; frames * request.channels as usize],
            sample_rate: self.sample_rate,
            channels: request.channels,
        })
    }
}
