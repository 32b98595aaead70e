use super::backend::{CaptureBuffer, CaptureControl, CaptureFailure, CaptureRequest, InputDevice};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

const TICK: Duration = Duration::from_millis(100);

/// System microphone via cpal.
///
/// The device is resolved fresh on every capture, so a microphone that was
/// unplugged between sessions fails that session instead of the whole
/// service. Samples are collected at the device's native rate and converted
/// to i16; multi-channel input is downmixed when a mono capture is requested.
pub struct CpalDevice {
    preferred: Option<String>,
}

impl CpalDevice {
    /// Use a specific input device by name, or the host default.
    pub fn new(preferred: Option<&str>) -> Self {
        Self {
            preferred: preferred.map(str::to_string),
        }
    }

    /// Input device names, for configuration hints.
    pub fn list_devices() -> Vec<String> {
        let host = cpal::default_host();
        let Ok(devices) = host.input_devices() else {
            return Vec::new();
        };
        devices.filter_map(|d| d.name().ok()).collect()
    }

    fn resolve(&self) -> Result<cpal::Device, CaptureFailure> {
        let host = cpal::default_host();
        match &self.preferred {
            Some(name) => {
                let devices = host
                    .input_devices()
                    .map_err(|e| CaptureFailure::Unavailable(e.to_string()))?;
                for device in devices {
                    if device.name().map(|n| &n == name).unwrap_or(false) {
                        return Ok(device);
                    }
                }
                Err(CaptureFailure::Unavailable(format!(
                    "input device '{name}' not found"
                )))
            }
            None => host
                .default_input_device()
                .ok_or_else(|| CaptureFailure::Unavailable("no default input device".to_string())),
        }
    }
}

impl InputDevice for CpalDevice {
    fn name(&self) -> String {
        self.preferred
            .clone()
            .unwrap_or_else(|| "default input".to_string())
    }

    fn capture(
        &self,
        request: &CaptureRequest,
        control: &CaptureControl,
    ) -> Result<CaptureBuffer, CaptureFailure> {
        let device = self.resolve()?;
        let default_config = device
            .default_input_config()
            .map_err(|e| CaptureFailure::Unavailable(e.to_string()))?;
        let format = default_config.sample_format();
        let device_config: StreamConfig = default_config.into();
        let sample_rate = device_config.sample_rate.0;
        let device_channels = usize::from(device_config.channels.max(1));

        debug!(
            ?format,
            sample_rate, device_channels, "opening input stream"
        );

        let expected = (request.duration.as_secs_f64() * sample_rate as f64).ceil() as usize
            * device_channels;
        let buffer = Arc::new(Mutex::new(Vec::<i16>::with_capacity(expected)));
        let failed = Arc::new(AtomicBool::new(false));
        let failure_reason = Arc::new(Mutex::new(None::<String>));

        let err_failed = Arc::clone(&failed);
        let err_reason = Arc::clone(&failure_reason);
        let err_fn = move |err: cpal::StreamError| {
            warn!("input stream error: {err}");
            if let Ok(mut reason) = err_reason.lock() {
                reason.get_or_insert_with(|| err.to_string());
            }
            err_failed.store(true, Ordering::SeqCst);
        };

        // cpal delivers samples on a callback thread; every supported format
        // is converted to i16 up front so the rest of the pipeline stays
        // format-agnostic.
        let stream = match format {
            SampleFormat::I16 => {
                let buf = Arc::clone(&buffer);
                device.build_input_stream(
                    &device_config,
                    move |data: &[i16], _| {
                        if let Ok(mut buf) = buf.lock() {
                            buf.extend_from_slice(data);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::F32 => {
                let buf = Arc::clone(&buffer);
                device.build_input_stream(
                    &device_config,
                    move |data: &[f32], _| {
                        if let Ok(mut buf) = buf.lock() {
                            buf.extend(
                                data.iter()
                                    .map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                            );
                        }
                    },
                    err_fn,
                    None,
                )
            }
            SampleFormat::U16 => {
                let buf = Arc::clone(&buffer);
                device.build_input_stream(
                    &device_config,
                    move |data: &[u16], _| {
                        if let Ok(mut buf) = buf.lock() {
                            buf.extend(data.iter().map(|s| (*s as i32 - 32_768) as i16));
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(CaptureFailure::Unavailable(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        }
        .map_err(|e| CaptureFailure::Unavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureFailure::Stream(e.to_string()))?;

        // Drive the bounded capture: sleep in short ticks so aborts and
        // stream failures are noticed promptly, publishing elapsed progress.
        let total_ms = request.duration.as_millis() as u64;
        let mut elapsed_ms = 0u64;
        while elapsed_ms < total_ms {
            if control.abort_requested() {
                drop(stream);
                return Err(CaptureFailure::Aborted);
            }
            if failed.load(Ordering::SeqCst) {
                drop(stream);
                let reason = failure_reason
                    .lock()
                    .ok()
                    .and_then(|r| r.clone())
                    .unwrap_or_else(|| "input stream failed".to_string());
                return Err(CaptureFailure::Stream(reason));
            }
            let step = TICK.min(Duration::from_millis(total_ms - elapsed_ms));
            std::thread::sleep(step);
            elapsed_ms += step.as_millis() as u64;
            control.advance_to(elapsed_ms);
        }

        if let Err(err) = stream.pause() {
            warn!("failed to pause input stream: {err}");
        }
        drop(stream);

        let samples = buffer
            .lock()
            .map_err(|_| CaptureFailure::Stream("audio buffer lock poisoned".to_string()))?
            .clone();

        if samples.is_empty() {
            return Err(CaptureFailure::Stream(
                "no samples captured; check microphone permissions and availability".to_string(),
            ));
        }

        if request.channels == 1 && device_channels > 1 {
            return Ok(CaptureBuffer {
                samples: downmix_to_mono(&samples, device_channels),
                sample_rate,
                channels: 1,
            });
        }

        Ok(CaptureBuffer {
            samples,
            sample_rate,
            channels: device_channels as u16,
        })
    }
}

/// Sum channels per frame with clamping, preserving volume.
fn downmix_to_mono(samples: &[i16], channels: usize) -> Vec<i16> {
    let mut mono = Vec::with_capacity(samples.len() / channels);
    for frame in samples.chunks_exact(channels) {
        let sum: i32 = frame.iter().map(|&s| s as i32).sum();
        mono.push(sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16);
    }
    mono
}
