//! Provenance recipes
//!
//! A recipe is the ordered, append-only log of augmentation steps applied
//! to a pipeline value. It is written next to every output as
//! `{"Steps": [[source, tag, {params}], ...]}`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Augmentation step tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    Raw,
    Mix,
    Equalizer,
    BandPass,
    BandReject,
    LowShelf,
    HighShelf,
    HighPass,
    LowPass,
    Limiter,
    Compressor,
    Delay,
    Overdrive,
    Phaser,
    Pitch,
    Reverb,
    WhiteNoise,
    Reverse,
    Speed,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Raw => "Raw",
            StepKind::Mix => "Mix",
            StepKind::Equalizer => "Equalizer",
            StepKind::BandPass => "BandPass",
            StepKind::BandReject => "BandReject",
            StepKind::LowShelf => "LowShelf",
            StepKind::HighShelf => "HighShelf",
            StepKind::HighPass => "HighPass",
            StepKind::LowPass => "LowPass",
            StepKind::Limiter => "Limiter",
            StepKind::Compressor => "Compressor",
            StepKind::Delay => "Delay",
            StepKind::Overdrive => "Overdrive",
            StepKind::Phaser => "Phaser",
            StepKind::Pitch => "Pitch",
            StepKind::Reverb => "Reverb",
            StepKind::WhiteNoise => "WhiteNoise",
            StepKind::Reverse => "Reverse",
            StepKind::Speed => "Speed",
        }
    }

    /// Parse a tag; matching is exact
    pub fn from_tag(tag: &str) -> Option<Self> {
        const ALL: [StepKind; 19] = [
            StepKind::Raw,
            StepKind::Mix,
            StepKind::Equalizer,
            StepKind::BandPass,
            StepKind::BandReject,
            StepKind::LowShelf,
            StepKind::HighShelf,
            StepKind::HighPass,
            StepKind::LowPass,
            StepKind::Limiter,
            StepKind::Compressor,
            StepKind::Delay,
            StepKind::Overdrive,
            StepKind::Phaser,
            StepKind::Pitch,
            StepKind::Reverb,
            StepKind::WhiteNoise,
            StepKind::Reverse,
            StepKind::Speed,
        ];
        ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully-resolved parameters of one step
pub type StepParams = BTreeMap<String, Value>;

/// One recipe entry, serialized as `[source, tag, params]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    into = "(String, StepKind, StepParams)",
    from = "(String, StepKind, StepParams)"
)]
pub struct StepRecord {
    /// Path of the contributing audio, or `<memory>`
    pub source: String,
    pub kind: StepKind,
    pub params: StepParams,
}

impl From<StepRecord> for (String, StepKind, StepParams) {
    fn from(record: StepRecord) -> Self {
        (record.source, record.kind, record.params)
    }
}

impl From<(String, StepKind, StepParams)> for StepRecord {
    fn from((source, kind, params): (String, StepKind, StepParams)) -> Self {
        Self {
            source,
            kind,
            params,
        }
    }
}

/// Ordered step log
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(rename = "Steps")]
    steps: Vec<StepRecord>,
}

impl Recipe {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step tags in order
    pub fn kinds(&self) -> Vec<StepKind> {
        self.steps.iter().map(|s| s.kind).collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(kind: StepKind) -> StepRecord {
        let mut params = StepParams::new();
        params.insert("gain".to_string(), json!(3.0));
        StepRecord {
            source: "/data/p1/a.wav".to_string(),
            kind,
            params,
        }
    }

    #[test]
    fn test_sidecar_layout() {
        let mut recipe = Recipe::new();
        recipe.push(record(StepKind::Limiter));

        let value: Value = serde_json::from_str(&recipe.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"Steps": [["/data/p1/a.wav", "Limiter", {"gain": 3.0}]]})
        );
    }

    #[test]
    fn test_recipe_reads_back() {
        let mut recipe = Recipe::new();
        recipe.push(record(StepKind::Mix));
        recipe.push(record(StepKind::HighShelf));

        let parsed = Recipe::from_json(&recipe.to_json().unwrap()).unwrap();
        assert_eq!(parsed, recipe);
        assert_eq!(parsed.kinds(), vec![StepKind::Mix, StepKind::HighShelf]);
    }

    #[test]
    fn test_high_shelf_has_its_own_tag() {
        assert_eq!(StepKind::HighShelf.as_str(), "HighShelf");
        assert_ne!(StepKind::HighShelf.as_str(), StepKind::LowShelf.as_str());
        assert_eq!(StepKind::from_tag("HighShelf"), Some(StepKind::HighShelf));
        assert_eq!(StepKind::from_tag("Flanger"), None);
    }

    #[test]
    fn test_noise_and_time_tags() {
        for kind in [StepKind::WhiteNoise, StepKind::Reverse, StepKind::Speed] {
            assert_eq!(StepKind::from_tag(kind.as_str()), Some(kind));
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }
}
