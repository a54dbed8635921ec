//! Augmenta - speech dataset augmentation
//!
//! Augmenta turns a speech corpus into augmented training data and records,
//! next to every output file, the exact recipe that produced it.
//!
//! # Architecture
//!
//! - `engine`: sample buffers, time segments and audio file I/O
//! - `dsp`: offline mono effects behind one `Effect` trait
//! - `pipeline`: the `Audio` value with its recipe, mixing and effect stage
//! - `injection`: noise reservoirs and the corpus-wide noise injector
//! - `batch`: corpus-wide pitch shifting

pub mod batch;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod injection;
pub mod pipeline;

pub use config::InjectionConfig;
pub use dsp::EffectSpec;
pub use engine::{SampleBuffer, SegmentEnd, TimeSegment};
pub use error::{AugmentError, Result};
pub use injection::{inject_corpus, InjectionReport, NoiseInjector};
pub use pipeline::{Audio, FittingMethod, MixOptions, Recipe, StepKind, WriteOptions};
