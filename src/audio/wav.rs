use super::backend::CaptureBuffer;
use crate::error::PipelineError;
use crate::store::Artifact;
use std::io::Cursor;

/// Encode a finalized capture buffer as a self-contained WAV artifact.
///
/// Deterministic for identical input, and the result plays anywhere: the
/// 16-bit PCM header carries the buffer's own sample rate and channel count.
/// Fails only on structurally invalid input, never on content.
pub fn encode_wav(buffer: &CaptureBuffer) -> Result<Artifact, PipelineError> {
    if buffer.samples.is_empty() {
        return Err(PipelineError::Encoding("empty sample buffer".to_string()));
    }
    if buffer.sample_rate == 0 {
        return Err(PipelineError::Encoding("sample rate must be positive".to_string()));
    }
    if buffer.channels == 0 {
        return Err(PipelineError::Encoding("channel count must be positive".to_string()));
    }

    let spec = hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| PipelineError::Encoding(format!("creating WAV writer: {e}")))?;
        for &sample in &buffer.samples {
            writer
                .write_sample(sample)
                .map_err(|e| PipelineError::Encoding(format!("writing sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| PipelineError::Encoding(format!("finalizing WAV: {e}")))?;
    }

    Ok(Artifact {
        bytes: cursor.into_inner(),
        content_type: "audio/wav".to_string(),
        extension: "wav".to_string(),
    })
}
