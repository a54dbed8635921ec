//! Augmentation pipeline
//!
//! The `Audio` value, its recipe, mixing and the effect stage.

mod audio;
mod effect;
mod mix;
mod recipe;

pub use audio::{Audio, FittingMethod, OverwritePolicy, WriteOptions, WrittenFiles};
pub use mix::MixOptions;
pub use recipe::{Recipe, StepKind, StepParams, StepRecord};
