//! Noise injection
//!
//! Shared noise reservoirs and the corpus driver that mixes them into speech.

mod orchestrator;
mod reservoir;

pub use orchestrator::{inject_corpus, FileReport, InjectionReport, NoiseInjector};
pub use reservoir::{NoiseReservoir, NoiseWindow, ReservoirRegistry};
