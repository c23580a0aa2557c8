//! Voice selection for the repeat-back utterance
//!
//! Picks a named voice whose name suggests the detected range, or falls back
//! to pitch/rate parameters applied to whatever default voice the synthesis
//! engine has.

use serde::{Deserialize, Serialize};

use crate::classify::VoiceCategory;
use crate::{Error, Result};

/// Name fragments that suggest a low-range voice
pub const DEFAULT_LOW_PATTERNS: &[&str] = &[
    "male", "masculin", "hombre", "jorge", "diego", "carlos", "pablo",
];

/// Name fragments that suggest a high-range voice
pub const DEFAULT_HIGH_PATTERNS: &[&str] = &[
    "female", "femenin", "mujer", "maria", "carmen", "lucia", "helena", "laura", "paulina",
];

/// A voice offered by the synthesis engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    /// Display name, e.g. "Microsoft Pablo - Spanish (Spain)"
    pub name: String,
    /// BCP 47 language tag, e.g. "es-ES"
    #[serde(rename = "lang")]
    pub language_tag: String,
    /// Rendered on-device rather than by a remote service
    #[serde(default)]
    pub local: bool,
}

impl VoiceDescriptor {
    /// Convenience constructor
    #[must_use]
    pub fn new(name: impl Into<String>, language_tag: impl Into<String>, local: bool) -> Self {
        Self {
            name: name.into(),
            language_tag: language_tag.into(),
            local,
        }
    }
}

/// Pitch and rate multipliers for the engine's default voice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallbackParams {
    /// Pitch multiplier, 1.0 is unchanged
    pub pitch: f32,
    /// Speaking rate multiplier, 1.0 is unchanged
    pub rate: f32,
}

impl FallbackParams {
    /// Build a parameter pair
    #[must_use]
    pub const fn new(pitch: f32, rate: f32) -> Self {
        Self { pitch, rate }
    }
}

/// Fallback parameters per category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackTable {
    /// Used for `LowRange`
    pub low: FallbackParams,
    /// Used for `HighRange`
    pub high: FallbackParams,
    /// Used for `Undetermined`
    pub neutral: FallbackParams,
}

impl FallbackTable {
    /// Parameters for a category
    #[must_use]
    pub const fn for_category(&self, category: VoiceCategory) -> FallbackParams {
        match category {
            VoiceCategory::LowRange => self.low,
            VoiceCategory::HighRange => self.high,
            VoiceCategory::Undetermined => self.neutral,
        }
    }
}

impl FallbackTable {
    /// Check every pair is positive and low/high sit on their side of 1.0
    ///
    /// # Errors
    ///
    /// Returns error on a non-finite or non-positive multiplier, a low pair
    /// not below 1.0, or a high pair not above it
    pub fn validate(&self) -> Result<()> {
        for (label, params) in [
            ("low", self.low),
            ("high", self.high),
            ("neutral", self.neutral),
        ] {
            let FallbackParams { pitch, rate } = params;
            if !pitch.is_finite() || !rate.is_finite() || pitch <= 0.0 || rate <= 0.0 {
                return Err(Error::Config(format!(
                    "fallback.{label} multipliers must be positive, got pitch={pitch} rate={rate}"
                )));
            }
        }

        if self.low.pitch >= 1.0 || self.low.rate >= 1.0 {
            return Err(Error::Config(format!(
                "fallback.low must lower pitch and rate, got pitch={} rate={}",
                self.low.pitch, self.low.rate
            )));
        }
        if self.high.pitch <= 1.0 || self.high.rate < 1.0 {
            return Err(Error::Config(format!(
                "fallback.high must raise pitch and keep rate at or above 1, got pitch={} rate={}",
                self.high.pitch, self.high.rate
            )));
        }

        Ok(())
    }
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self {
            low: FallbackParams::new(0.5, 0.85),
            high: FallbackParams::new(1.7, 1.1),
            neutral: FallbackParams::new(1.0, 0.9),
        }
    }
}

/// What to do when candidates exist but none matches the category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnmatchedPolicy {
    /// Use the first candidate voice
    #[default]
    FirstAvailable,
    /// Ignore the candidates and synthesize with fallback parameters
    Parameters,
}

impl std::str::FromStr for UnmatchedPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first-available" | "first" => Ok(Self::FirstAvailable),
            "parameters" | "params" => Ok(Self::Parameters),
            other => Err(Error::Config(format!("unknown unmatched policy: {other}"))),
        }
    }
}

/// The voice handed to the synthesis sink
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoiceChoice {
    /// Speak with this catalog voice
    Named {
        /// The chosen voice
        voice: VoiceDescriptor,
    },
    /// Speak with the default voice, adjusted
    Parameters {
        /// Multipliers to apply
        params: FallbackParams,
    },
}

impl VoiceChoice {
    /// The named voice, if one was chosen
    #[must_use]
    pub const fn voice(&self) -> Option<&VoiceDescriptor> {
        match self {
            Self::Named { voice } => Some(voice),
            Self::Parameters { .. } => None,
        }
    }

    /// The fallback parameters, if no voice was chosen
    #[must_use]
    pub const fn params(&self) -> Option<FallbackParams> {
        match self {
            Self::Named { .. } => None,
            Self::Parameters { params } => Some(*params),
        }
    }
}

/// Case-insensitive substring patterns, tried in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<String>,
}

impl PatternSet {
    /// Normalize a pattern list; an empty list matches nothing
    #[must_use]
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        Self { patterns }
    }

    /// Whether any pattern occurs in `name` other than inside a match of `mask`
    #[must_use]
    pub fn matches_unmasked(&self, name: &str, mask: &Self) -> bool {
        let name = name.to_lowercase();
        let masked: Vec<(usize, usize)> = mask
            .patterns
            .iter()
            .flat_map(|q| name.match_indices(q.as_str()).map(|(i, m)| (i, i + m.len())))
            .collect();

        self.patterns.iter().any(|p| {
            name.match_indices(p.as_str()).any(|(start, m)| {
                let end = start + m.len();
                !masked.iter().any(|&(s, e)| s <= start && end <= e)
            })
        })
    }

}

/// Maps a category and the available voices onto a [`VoiceChoice`]
#[derive(Debug, Clone)]
pub struct VoiceProfileSelector {
    low: PatternSet,
    high: PatternSet,
    fallback: FallbackTable,
    unmatched: UnmatchedPolicy,
}

impl VoiceProfileSelector {
    /// Create a selector from pattern tables and fallback parameters
    #[must_use]
    pub const fn new(
        low: PatternSet,
        high: PatternSet,
        fallback: FallbackTable,
        unmatched: UnmatchedPolicy,
    ) -> Self {
        Self {
            low,
            high,
            fallback,
            unmatched,
        }
    }

    /// Unmatched-pool policy in use
    #[must_use]
    pub const fn unmatched(&self) -> UnmatchedPolicy {
        self.unmatched
    }

    /// Fallback parameters in use
    #[must_use]
    pub const fn fallback(&self) -> &FallbackTable {
        &self.fallback
    }

    /// Choose the output voice for one utterance
    #[must_use]
    pub fn select(
        &self,
        category: VoiceCategory,
        descriptors: &[VoiceDescriptor],
        language_prefix: &str,
    ) -> VoiceChoice {
        let pool = candidate_pool(descriptors, language_prefix);

        let Some(first) = pool.first() else {
            tracing::warn!(
                %category,
                language_prefix,
                available = descriptors.len(),
                "no voice for language, using fallback parameters"
            );
            return self.parameters(category);
        };

        if let Some(voice) = self.find_match(category, &pool) {
            tracing::debug!(%category, voice = %voice.name, "matched voice by name");
            return VoiceChoice::Named {
                voice: voice.clone(),
            };
        }

        match self.unmatched {
            UnmatchedPolicy::FirstAvailable => {
                tracing::debug!(%category, voice = %first.name, "no name match, using first voice");
                VoiceChoice::Named {
                    voice: (*first).clone(),
                }
            }
            UnmatchedPolicy::Parameters => {
                tracing::debug!(%category, "no name match, using fallback parameters");
                self.parameters(category)
            }
        }
    }

    fn find_match<'a>(
        &self,
        category: VoiceCategory,
        pool: &[&'a VoiceDescriptor],
    ) -> Option<&'a VoiceDescriptor> {
        let (wanted, opposite) = match category {
            VoiceCategory::LowRange => (&self.low, &self.high),
            VoiceCategory::HighRange => (&self.high, &self.low),
            VoiceCategory::Undetermined => return None,
        };

        // "female" contains "male"
        pool.iter()
            .copied()
            .find(|v| wanted.matches_unmasked(&v.name, opposite))
    }

    fn parameters(&self, category: VoiceCategory) -> VoiceChoice {
        VoiceChoice::Parameters {
            params: self.fallback.for_category(category),
        }
    }
}

impl Default for VoiceProfileSelector {
    fn default() -> Self {
        Self {
            low: PatternSet::new(DEFAULT_LOW_PATTERNS),
            high: PatternSet::new(DEFAULT_HIGH_PATTERNS),
            fallback: FallbackTable::default(),
            unmatched: UnmatchedPolicy::default(),
        }
    }
}

/// Local voices for the language, or any voice for it when none is local
fn candidate_pool<'a>(
    descriptors: &'a [VoiceDescriptor],
    language_prefix: &str,
) -> Vec<&'a VoiceDescriptor> {
    let in_language: Vec<&VoiceDescriptor> = descriptors
        .iter()
        .filter(|v| v.language_tag.starts_with(language_prefix))
        .collect();

    let local: Vec<&VoiceDescriptor> = in_language.iter().copied().filter(|v| v.local).collect();

    if local.is_empty() { in_language } else { local }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<VoiceDescriptor> {
        vec![
            VoiceDescriptor::new("Google US English", "en-US", true),
            VoiceDescriptor::new("Microsoft Helena - Spanish (Spain)", "es-ES", true),
            VoiceDescriptor::new("Microsoft Pablo - Spanish (Spain)", "es-ES", true),
            VoiceDescriptor::new("Google español", "es-ES", false),
        ]
    }

    #[test]
    fn test_fallback_table_validation() {
        assert!(FallbackTable::default().validate().is_ok());

        let mut table = FallbackTable::default();
        table.low = FallbackParams::new(1.2, 0.85);
        assert!(matches!(table.validate(), Err(Error::Config(_))));

        let mut table = FallbackTable::default();
        table.high.rate = 0.9;
        assert!(table.validate().is_err());

        let mut table = FallbackTable::default();
        table.neutral.pitch = f32::NAN;
        assert!(table.validate().is_err());
    }

    #[test]
    fn test_low_matches_masculine_name() {
        let selector = VoiceProfileSelector::default();
        let choice = selector.select(VoiceCategory::LowRange, &catalog(), "es");
        assert_eq!(choice.voice().unwrap().name, "Microsoft Pablo - Spanish (Spain)");
    }

    #[test]
    fn test_high_matches_feminine_name() {
        let selector = VoiceProfileSelector::default();
        let choice = selector.select(VoiceCategory::HighRange, &catalog(), "es");
        assert_eq!(choice.voice().unwrap().name, "Microsoft Helena - Spanish (Spain)");
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let selector = VoiceProfileSelector::default();
        let voices = vec![VoiceDescriptor::new("DIEGO", "es-MX", true)];
        let choice = selector.select(VoiceCategory::LowRange, &voices, "es");
        assert_eq!(choice.voice().unwrap().name, "DIEGO");
    }

    #[test]
    fn test_female_is_not_male() {
        let selector = VoiceProfileSelector::default();
        let voices = vec![
            VoiceDescriptor::new("Spanish Female", "es-ES", true),
            VoiceDescriptor::new("Spanish Male", "es-ES", true),
        ];
        let choice = selector.select(VoiceCategory::LowRange, &voices, "es");
        assert_eq!(choice.voice().unwrap().name, "Spanish Male");

        let choice = selector.select(VoiceCategory::HighRange, &voices, "es");
        assert_eq!(choice.voice().unwrap().name, "Spanish Female");
    }

    #[test]
    fn test_masked_matches() {
        let low = PatternSet::new(&["male"]);
        let high = PatternSet::new(&["female"]);
        assert!(!low.matches_unmasked("Female voice", &high));
        assert!(low.matches_unmasked("Female and male duet", &high));
        assert!(high.matches_unmasked("Female voice", &low));
    }

    #[test]
    fn test_local_pool_preferred() {
        let selector = VoiceProfileSelector::default();
        let voices = vec![
            VoiceDescriptor::new("Remote Carlos", "es-ES", false),
            VoiceDescriptor::new("Local Jorge", "es-ES", true),
        ];
        let choice = selector.select(VoiceCategory::LowRange, &voices, "es");
        assert_eq!(choice.voice().unwrap().name, "Local Jorge");
    }

    #[test]
    fn test_remote_pool_when_no_local() {
        let selector = VoiceProfileSelector::default();
        let voices = vec![
            VoiceDescriptor::new("Local Samantha", "en-US", true),
            VoiceDescriptor::new("Remote Lucia", "es-ES", false),
        ];
        let choice = selector.select(VoiceCategory::HighRange, &voices, "es");
        assert_eq!(choice.voice().unwrap().name, "Remote Lucia");
    }

    #[test]
    fn test_unmatched_first_available() {
        let selector = VoiceProfileSelector::default();
        let voices = vec![
            VoiceDescriptor::new("Monica", "es-ES", true),
            VoiceDescriptor::new("Paco", "es-ES", true),
        ];
        let choice = selector.select(VoiceCategory::HighRange, &voices, "es");
        assert_eq!(choice.voice().unwrap().name, "Monica");

        let choice = selector.select(VoiceCategory::Undetermined, &voices, "es");
        assert_eq!(choice.voice().unwrap().name, "Monica");
    }

    #[test]
    fn test_unmatched_parameters() {
        let selector = VoiceProfileSelector::new(
            PatternSet::new(DEFAULT_LOW_PATTERNS),
            PatternSet::new(DEFAULT_HIGH_PATTERNS),
            FallbackTable::default(),
            UnmatchedPolicy::Parameters,
        );
        let voices = vec![VoiceDescriptor::new("Monica", "es-ES", true)];

        let choice = selector.select(VoiceCategory::HighRange, &voices, "es");
        assert_eq!(choice, VoiceChoice::Parameters {
            params: FallbackParams::new(1.7, 1.1)
        });
    }

    #[test]
    fn test_no_spanish_voice_high_range() {
        let selector = VoiceProfileSelector::default();
        let voices = vec![
            VoiceDescriptor::new("Samantha (female)", "en-US", true),
            VoiceDescriptor::new("Amelie", "fr-FR", true),
        ];

        let params = selector
            .select(VoiceCategory::HighRange, &voices, "es")
            .params()
            .expect("no named voice should be chosen");
        assert!(params.pitch > 1.0);
        assert!(params.rate >= 1.0);
    }

    #[test]
    fn test_empty_catalog_falls_back() {
        let selector = VoiceProfileSelector::default();

        let low = selector.select(VoiceCategory::LowRange, &[], "es").params().unwrap();
        assert!(low.pitch < 1.0 && low.rate < 1.0);

        let neutral = selector
            .select(VoiceCategory::Undetermined, &[], "es")
            .params()
            .unwrap();
        assert_eq!(neutral, FallbackParams::new(1.0, 0.9));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let selector = VoiceProfileSelector::default();
        let voices = catalog();
        let first = selector.select(VoiceCategory::HighRange, &voices, "es");
        let second = selector.select(VoiceCategory::HighRange, &voices, "es");
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_pattern_set_matches_nothing() {
        let none = PatternSet::default();
        let set = PatternSet::new::<&str>(&[]);
        assert!(!set.matches_unmasked("anything", &none));

        let set = PatternSet::new(&["  ", "A.b"]);
        assert_eq!(set, PatternSet::new(&["a.b"]));
        assert!(set.matches_unmasked("xA.Bx", &none));
        assert!(!set.matches_unmasked("axb", &none));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "parameters".parse::<UnmatchedPolicy>().unwrap(),
            UnmatchedPolicy::Parameters
        );
        assert!("random".parse::<UnmatchedPolicy>().is_err());
    }
}
