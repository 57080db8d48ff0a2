//! WAV file I/O for Speedcut
//!
//! Decodes a source file into the 16-bit stereo layout the reconstruction
//! engine works on, and writes finished buffers back out. Mono input is
//! duplicated onto both channels; anything wider than stereo is rejected.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::engine::buffer::{f32_to_i16, ChannelLayout, PcmBuffer};
use crate::error::{Result, SpeedcutError};

/// Decode a WAV file into interleaved 16-bit stereo PCM
///
/// # Errors
/// * `FileNotFound` - If the file does not exist
/// * `InvalidAudio` - If the file is not a valid WAV file or has no samples
/// * `UnsupportedFormat` - More than 2 channels, or an unusual bit depth
pub fn import_pcm(path: &Path) -> Result<PcmBuffer> {
    if !path.exists() {
        return Err(SpeedcutError::FileNotFound {
            path: path.display().to_string(),
            source: None,
        });
    }

    let reader = WavReader::open(path).map_err(|e| SpeedcutError::InvalidAudio {
        reason: format!("Failed to open WAV file: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = usize::from(spec.channels);
    if channels == 0 || channels > 2 {
        return Err(SpeedcutError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channels),
        });
    }
    if spec.sample_rate == 0 {
        return Err(SpeedcutError::InvalidAudio {
            reason: "WAV header reports a sample rate of 0".to_string(),
            source: None,
        });
    }

    let samples = read_samples_as_i16(reader, spec.bits_per_sample, spec.sample_format)?;
    if samples.is_empty() {
        return Err(SpeedcutError::InvalidAudio {
            reason: "Audio contains no samples".to_string(),
            source: None,
        });
    }

    let stereo = if channels == 1 {
        samples.iter().flat_map(|&s| [s, s]).collect()
    } else {
        samples
    };

    PcmBuffer::from_interleaved(stereo, ChannelLayout::Stereo, spec.sample_rate)
}

/// Write a buffer as a 16-bit PCM WAV file
///
/// The target must carry a `.wav` extension: raw `pcm_s16le` audio has no
/// place in containers such as m4a.
pub fn export_pcm(buffer: &PcmBuffer, path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if extension != "wav" {
        return Err(SpeedcutError::UnsupportedFormat {
            format: format!(
                "Codec: pcm_s16le is not supported in the '{}' container",
                extension
            ),
        });
    }

    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(wav_io_error)?;
    for &sample in buffer.as_interleaved() {
        writer.write_sample(sample).map_err(wav_io_error)?;
    }
    writer.finalize().map_err(wav_io_error)?;

    Ok(())
}

/// Generate a stereo test tone with different frequencies per channel
///
/// Amplitude is half of full scale. Useful for exercising the engine
/// without a source file.
pub fn generate_stereo_test_tone(
    freq_left: f32,
    freq_right: f32,
    duration_secs: f32,
    sample_rate: u32,
) -> PcmBuffer {
    let num_frames = (duration_secs * sample_rate as f32) as usize;
    let angular_l = 2.0 * std::f32::consts::PI * freq_left / sample_rate as f32;
    let angular_r = 2.0 * std::f32::consts::PI * freq_right / sample_rate as f32;

    let samples = (0..num_frames)
        .flat_map(|i| {
            let t = i as f32;
            [
                f32_to_i16(0.5 * (angular_l * t).sin()),
                f32_to_i16(0.5 * (angular_r * t).sin()),
            ]
        })
        .collect();

    PcmBuffer::from_interleaved(samples, ChannelLayout::Stereo, sample_rate).unwrap_or_default()
}

// ============================================================================
// Internal helper functions
// ============================================================================

fn wav_io_error(e: hound::Error) -> SpeedcutError {
    match e {
        hound::Error::IoError(io) => SpeedcutError::Io(io),
        other => SpeedcutError::Io(std::io::Error::other(other.to_string())),
    }
}

/// Read samples from a WAV reader and convert to i16
fn read_samples_as_i16<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<i16>> {
    let invalid = |bits: &str, e: hound::Error| SpeedcutError::InvalidAudio {
        reason: format!("Failed to read {} samples: {}", bits, e),
        source: Some(Box::new(e)),
    };

    match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .map(|s| s.map(f32_to_i16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| invalid("float", e)),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| i16::from(v) << 8))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| invalid("8-bit", e)),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| invalid("16-bit", e)),
        // 24-bit is stored as i32 in hound
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| (v >> 8) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| invalid("24-bit", e)),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| (v >> 16) as i16))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| invalid("32-bit", e)),
        (SampleFormat::Int, bits) => Err(SpeedcutError::UnsupportedFormat {
            format: format!("{}-bit integer audio", bits),
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================
