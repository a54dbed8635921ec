//! Audio file I/O
//!
//! WAV files are read and written with hound. MP3, FLAC and OGG are decoded
//! with symphonia; only WAV is ever encoded. Every decoded file is reduced to
//! mono by averaging its channels and keeps its native sampling rate.
//!
//! Sample rate conversion uses linear interpolation.

use std::fs::File;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};
use symphonia::core::audio::SampleBuffer as DecodedSamples;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{AugmentError, Result};

/// Extensions (lowercase) recognised as audio inputs
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "flac"];

/// Whether `path` has a supported audio extension (case-insensitive)
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// Output bit depth for encoded WAV files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum BitDepth {
    Int16,
    Int24,
    /// 32-bit IEEE float
    #[default]
    Float32,
}

impl BitDepth {
    pub fn bits(self) -> u16 {
        match self {
            BitDepth::Int16 => 16,
            BitDepth::Int24 => 24,
            BitDepth::Float32 => 32,
        }
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = AugmentError;

    fn try_from(bits: u16) -> Result<Self> {
        match bits {
            16 => Ok(BitDepth::Int16),
            24 => Ok(BitDepth::Int24),
            32 => Ok(BitDepth::Float32),
            other => Err(AugmentError::Config {
                reason: format!("{}-bit output is not supported (use 16, 24 or 32)", other),
            }),
        }
    }
}

impl From<BitDepth> for u16 {
    fn from(depth: BitDepth) -> u16 {
        depth.bits()
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode an audio file into mono samples and its native sampling rate
pub fn decode_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    if !path.exists() {
        return Err(AugmentError::Decode {
            path: path.display().to_string(),
            reason: "file not found".to_string(),
            source: None,
        });
    }
    if is_wav(path) {
        decode_wav(path)
    } else {
        decode_compressed(path)
    }
}

fn decode_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let reader = WavReader::open(path).map_err(|e| AugmentError::Decode {
        path: path.display().to_string(),
        reason: format!("Failed to open WAV file: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)
        .map_err(|reason| AugmentError::Decode {
            path: path.display().to_string(),
            reason,
            source: None,
        })?;

    Ok((downmix(&interleaved, channels), spec.sample_rate))
}

fn decode_compressed(path: &Path) -> Result<(Vec<f32>, u32)> {
    let decode_err = |reason: String, e: SymphoniaError| AugmentError::Decode {
        path: path.display().to_string(),
        reason,
        source: Some(Box::new(e)),
    };

    let src = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_err("unrecognised container".to_string(), e))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AugmentError::Decode {
            path: path.display().to_string(),
            reason: "no audio track".to_string(),
            source: None,
        })?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.ok_or_else(|| AugmentError::Decode {
        path: path.display().to_string(),
        reason: "unknown sampling rate".to_string(),
        source: None,
    })?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_err("unsupported codec".to_string(), e))?;

    let mut mono = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(e) => return Err(decode_err("corrupt stream".to_string(), e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count();
                let mut block = DecodedSamples::<f32>::new(decoded.capacity() as u64, spec);
                block.copy_interleaved_ref(decoded);
                mono.extend(downmix(block.samples(), channels));
            }
            // Corrupted packets are skipped
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(decode_err("decoder failure".to_string(), e)),
        }
    }

    Ok((mono, sample_rate))
}

/// Read samples from WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> std::result::Result<Vec<f32>, String> {
    let scaled = |reader: &mut WavReader<R>, scale: f32| {
        reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / scale))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| format!("Failed to read {}-bit samples: {}", bits_per_sample, e))
    };
    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| format!("Failed to read float samples: {}", e)),
        SampleFormat::Int => match bits_per_sample {
            8 => scaled(&mut reader, 128.0),
            16 => scaled(&mut reader, 32768.0),
            24 => scaled(&mut reader, 8388608.0),
            32 => scaled(&mut reader, 2147483648.0),
            other => Err(format!("{}-bit integer audio is not supported", other)),
        },
    }
}

/// Average interleaved frames down to one channel
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

// ============================================================================
// Encoding
// ============================================================================

/// Write mono samples to a WAV file
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32, depth: BitDepth) -> Result<()> {
    let encode_err = |e: hound::Error| AugmentError::Encode {
        path: path.display().to_string(),
        source: e,
    };

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: depth.bits(),
        sample_format: match depth {
            BitDepth::Float32 => SampleFormat::Float,
            _ => SampleFormat::Int,
        },
    };

    let mut writer = WavWriter::create(path, spec).map_err(encode_err)?;
    match depth {
        BitDepth::Int16 => {
            for &sample in samples {
                let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
                writer.write_sample(scaled).map_err(encode_err)?;
            }
        }
        BitDepth::Int24 => {
            for &sample in samples {
                // 24-bit stored as i32 in hound
                let scaled = (sample * 8388607.0).clamp(-8388608.0, 8388607.0) as i32;
                writer.write_sample(scaled).map_err(encode_err)?;
            }
        }
        BitDepth::Float32 => {
            for &sample in samples {
                writer.write_sample(sample).map_err(encode_err)?;
            }
        }
    }
    writer.finalize().map_err(encode_err)?;

    Ok(())
}

// ============================================================================
// Rate conversion
// ============================================================================

/// Linear interpolation resampling
///
/// Output length is `ceil(len * ratio)`. Linear interpolation aliases when
/// downsampling; acceptable for augmentation noise beds and speech.
pub fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        // Map output index to source position
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else if src_idx < source_len {
            samples[src_idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

/// Sine wave test signal
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> Vec<f32> {
    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let angular_freq = 2.0 * std::f32::consts::PI * frequency / sample_rate as f32;
    (0..num_samples)
        .map(|i| (angular_freq * i as f32).sin())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_stereo_16(path: &Path, frames: &[(i16, i16)], rate: u32) {
        let spec = WavSpec {
            channels: 2,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &(l, r) in frames {
            writer.write_sample(l).unwrap();
            writer.write_sample(r).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_audio_extension_matching() {
        assert!(is_audio_file(Path::new("a/b.WAV")));
        assert!(is_audio_file(Path::new("b.Mp3")));
        assert!(is_audio_file(Path::new("b.flac")));
        assert!(!is_audio_file(Path::new("b.txt")));
        assert!(!is_audio_file(Path::new("wav")));
    }

    #[test]
    fn test_stereo_is_averaged_to_mono() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_stereo_16(&path, &[(16384, 0), (-16384, -16384)], 8000);

        let (samples, rate) = decode_mono(&path).unwrap();
        assert_eq!(rate, 8000);
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.25).abs() < 1e-4);
        assert!((samples[1] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_round_trip_float32() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let original = generate_test_tone(440.0, 0.2, 16000);

        write_wav(&path, &original, 16000, BitDepth::Float32).unwrap();
        let (decoded, rate) = decode_mono(&path).unwrap();

        assert_eq!(rate, 16000);
        assert_eq!(decoded.len(), original.len());
        for (orig, dec) in original.iter().zip(decoded.iter()) {
            assert!((orig - dec).abs() < 1e-6);
        }
    }

    #[test]
    fn test_round_trip_16bit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone16.wav");
        let original = generate_test_tone(1000.0, 0.1, 8000);

        write_wav(&path, &original, 8000, BitDepth::Int16).unwrap();
        let (decoded, _) = decode_mono(&path).unwrap();

        for (orig, dec) in original.iter().zip(decoded.iter()) {
            assert!((orig - dec).abs() < 0.01, "Sample mismatch: {} vs {}", orig, dec);
        }
    }

    #[test]
    fn test_round_trip_24bit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone24.wav");
        let original = generate_test_tone(1000.0, 0.1, 8000);

        write_wav(&path, &original, 8000, BitDepth::Int24).unwrap();
        let (decoded, _) = decode_mono(&path).unwrap();
        for (orig, dec) in original.iter().zip(decoded.iter()) {
            assert!((orig - dec).abs() < 0.001);
        }
    }

    #[test]
    fn test_decode_missing_file() {
        let result = decode_mono(Path::new("/nonexistent/path/audio.wav"));
        match result {
            Err(AugmentError::Decode { path, .. }) => assert!(path.contains("nonexistent")),
            other => panic!("Expected Decode error, got: {:?}", other),
        }
    }

    #[test]
    fn test_decode_garbage_mp3_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"definitely not an mp3").unwrap();
        assert!(matches!(decode_mono(&path), Err(AugmentError::Decode { .. })));
    }

    #[test]
    fn test_resample_linear_upsample() {
        let samples = vec![0.0, 1.0, 0.0];
        let resampled = resample_linear(&samples, 2.0);
        assert_eq!(resampled.len(), 6);
        assert!((resampled[1] - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_resample_linear_downsample() {
        let samples = vec![0.0, 0.5, 1.0, 0.5, 0.0, -0.5, -1.0, -0.5];
        let resampled = resample_linear(&samples, 0.5);
        assert_eq!(resampled.len(), 4);
    }

    #[test]
    fn test_bit_depth_conversion() {
        assert_eq!(BitDepth::try_from(24).unwrap(), BitDepth::Int24);
        assert!(BitDepth::try_from(8).is_err());
        assert_eq!(BitDepth::default().bits(), 32);
    }
}
