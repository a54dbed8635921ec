//! Audio Engine Module
//!
//! Core audio representation:
//! - Mono sample buffers with copy-on-write storage
//! - Time segments
//! - File I/O and rate conversion

pub mod buffer;
pub mod io;
pub mod segment;

pub use buffer::{db_to_linear, linear_to_db, SampleBuffer};
pub use io::{decode_mono, is_audio_file, resample_linear, write_wav, BitDepth};
pub use segment::{SegmentEnd, TimeSegment};
