//! Error handling for Augmenta
//!
//! Every failure in the crate is an `AugmentError`. Per-file errors are
//! recoverable: the corpus drivers log them and move on to the next file.

use thiserror::Error;

/// Result type alias for Augmenta operations
pub type Result<T> = std::result::Result<T, AugmentError>;

/// Main error type for Augmenta operations
#[derive(Error, Debug)]
pub enum AugmentError {
    // Decode / encode
    #[error("Cannot decode audio file {path}: {reason}")]
    Decode {
        path: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Cannot encode audio file {path}")]
    Encode {
        path: String,
        #[source]
        source: hound::Error,
    },

    // Signal errors
    #[error("Cannot normalize a silent signal (peak amplitude is zero)")]
    SilentSignal,

    #[error("Invalid sampling rate: {rate}")]
    InvalidSampleRate { rate: u32 },

    #[error("Sampling rate mismatch: expected {expected} Hz, got {actual} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },

    // Segment misuse
    #[error("Segment [{begin:.3}s, {end:.3}s) exceeds buffer duration {duration:.3}s")]
    SegmentOutOfBounds { begin: f64, end: f64, duration: f64 },

    #[error("Segment [{begin:.3}s, {end:.3}s) is empty")]
    EmptySegment { begin: f64, end: f64 },

    #[error("Mixing takes one or two segments, got {count}")]
    InvalidSegmentCount { count: usize },

    // Effect requests
    #[error("Effect '{effect}' requires parameter '{param}'")]
    MissingParameter { effect: String, param: String },

    #[error("Effect '{effect}' parameter '{param}' is invalid: {reason}")]
    InvalidParameter {
        effect: String,
        param: String,
        reason: String,
    },

    #[error("Unsupported effect: {kind}")]
    UnsupportedEffect { kind: String },

    #[error("Effect '{effect}' failed: {reason}")]
    Dsp { effect: String, reason: String },

    // Orchestration
    #[error("Injection percentage must be within 0..=100, got {percentage}")]
    InvalidPercentage { percentage: f64 },

    #[error("No decodable noise sources under {path}")]
    NoNoiseSources { path: String },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AugmentError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            AugmentError::Decode { .. } => "DECODE_ERROR",
            AugmentError::Encode { .. } => "ENCODE_ERROR",
            AugmentError::SilentSignal => "SILENT_SIGNAL",
            AugmentError::InvalidSampleRate { .. } => "INVALID_SAMPLE_RATE",
            AugmentError::SampleRateMismatch { .. } => "SAMPLE_RATE_MISMATCH",
            AugmentError::SegmentOutOfBounds { .. } => "SEGMENT_OUT_OF_BOUNDS",
            AugmentError::EmptySegment { .. } => "EMPTY_SEGMENT",
            AugmentError::InvalidSegmentCount { .. } => "INVALID_SEGMENT_COUNT",
            AugmentError::MissingParameter { .. } => "MISSING_PARAMETER",
            AugmentError::InvalidParameter { .. } => "INVALID_PARAMETER",
            AugmentError::UnsupportedEffect { .. } => "UNSUPPORTED_EFFECT",
            AugmentError::Dsp { .. } => "DSP_ERROR",
            AugmentError::InvalidPercentage { .. } => "INVALID_PERCENTAGE",
            AugmentError::NoNoiseSources { .. } => "NO_NOISE_SOURCES",
            AugmentError::Config { .. } => "CONFIG_ERROR",
            AugmentError::Cancelled => "CANCELLED",
            AugmentError::Io(_) => "IO_ERROR",
            AugmentError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether a corpus run may skip the offending file and continue
    ///
    /// Run-level failures (bad percentage, missing noise corpus, bad
    /// configuration, cancellation) abort the whole invocation.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            AugmentError::InvalidPercentage { .. }
                | AugmentError::NoNoiseSources { .. }
                | AugmentError::Config { .. }
                | AugmentError::Cancelled
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            AugmentError::Decode { .. } => vec![
                "Check that the file plays in another application",
                "Supported inputs: WAV, MP3, FLAC",
                "The file may be truncated - try re-exporting it",
            ],
            AugmentError::SilentSignal => vec![
                "The recording contains only digital silence",
                "Remove the file from the corpus or trim it",
            ],
            AugmentError::MissingParameter { .. } | AugmentError::InvalidParameter { .. } => {
                vec!["Check the effect parameter table in the documentation"]
            }
            AugmentError::UnsupportedEffect { .. } => vec![
                "Supported effects: Equalizer, BandPass, BandReject, LowShelf, HighShelf,",
                "HighPass, LowPass, Limiter, Compressor, Delay, Overdrive, Phaser, Pitch, Reverb",
            ],
            AugmentError::InvalidPercentage { .. } => {
                vec!["Pass a percentage between 0 and 100"]
            }
            AugmentError::NoNoiseSources { .. } => vec![
                "Put .wav, .mp3 or .flac files directly inside the noise directory",
                "Subdirectories of the noise directory are not scanned",
            ],
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AugmentError::UnsupportedEffect {
            kind: "Flanger".to_string(),
        };
        assert_eq!(err.error_code(), "UNSUPPORTED_EFFECT");
        assert!(err.to_string().contains("Flanger"));
    }

    #[test]
    fn test_run_level_errors_are_not_recoverable() {
        assert!(!AugmentError::InvalidPercentage { percentage: 150.0 }.is_recoverable());
        assert!(!AugmentError::Cancelled.is_recoverable());
        assert!(AugmentError::SilentSignal.is_recoverable());
        assert!(AugmentError::Decode {
            path: "a.wav".to_string(),
            reason: "truncated".to_string(),
            source: None,
        }
        .is_recoverable());
    }

    #[test]
    fn test_recovery_suggestions() {
        let err = AugmentError::NoNoiseSources {
            path: "/noise".to_string(),
        };
        assert!(!err.recovery_suggestions().is_empty());
    }
}
