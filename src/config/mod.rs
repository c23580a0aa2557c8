//! Configuration management for voice mirror

pub mod file;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::classify::{
    ClassifierThresholds, DEFAULT_HIGH_HZ, DEFAULT_LOW_HZ, DEFAULT_MIN_SAMPLES,
};
use crate::pitch::{AnalyserSettings, EstimatorSettings, PitchEstimator};
use crate::voice::{
    DEFAULT_HIGH_PATTERNS, DEFAULT_LOW_PATTERNS, DEFAULT_SAMPLE_RATE, FallbackTable, PatternSet,
    UnmatchedPolicy, VoiceProfileSelector,
};
use crate::{Error, Result};

/// Default milliseconds between spectrum snapshots
pub const DEFAULT_TICK_MS: u32 = 16;

/// Voice mirror configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Spectrum analysis configuration
    pub analysis: AnalysisConfig,

    /// Pitch estimator tunables
    pub estimator: EstimatorSettings,

    /// Range classifier configuration
    pub classifier: ClassifierConfig,

    /// Voice selection configuration
    pub voice: VoiceConfig,
}

/// Spectrum analysis configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisConfig {
    /// FFT, smoothing and decibel range
    pub analyser: AnalyserSettings,

    /// Capture rate requested from the input device
    pub preferred_sample_rate: u32,

    /// Milliseconds between snapshots
    pub tick_ms: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            analyser: AnalyserSettings::default(),
            preferred_sample_rate: DEFAULT_SAMPLE_RATE,
            tick_ms: DEFAULT_TICK_MS,
        }
    }
}

/// Range classifier configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierConfig {
    /// Averages below this are low range
    pub low_hz: f32,

    /// Averages above this are high range
    pub high_hz: f32,

    /// Voiced samples that must be exceeded before classifying
    pub min_samples: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            low_hz: DEFAULT_LOW_HZ,
            high_hz: DEFAULT_HIGH_HZ,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

impl ClassifierConfig {
    /// Validated thresholds
    ///
    /// # Errors
    ///
    /// Returns error if the thresholds are not finite or not ordered
    pub fn thresholds(&self) -> Result<ClassifierThresholds> {
        ClassifierThresholds::new(self.low_hz, self.high_hz, self.min_samples)
    }
}

/// Voice selection configuration
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    /// Language prefix candidate voices must carry
    pub language_prefix: String,

    /// BCP 47 tag attached to speech requests
    pub language_tag: String,

    /// Behavior when candidates exist but none matches
    pub unmatched: UnmatchedPolicy,

    /// Rate multiplier for named voices
    pub named_rate: f32,

    /// Name fragments suggesting a low-range voice
    pub low_patterns: Vec<String>,

    /// Name fragments suggesting a high-range voice
    pub high_patterns: Vec<String>,

    /// Pitch/rate pairs used without a named voice
    pub fallback: FallbackTable,

    /// Voice catalog file
    pub catalog: Option<PathBuf>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language_prefix: "es".to_string(),
            language_tag: "es-ES".to_string(),
            unmatched: UnmatchedPolicy::default(),
            named_rate: 0.9,
            low_patterns: DEFAULT_LOW_PATTERNS.iter().map(ToString::to_string).collect(),
            high_patterns: DEFAULT_HIGH_PATTERNS.iter().map(ToString::to_string).collect(),
            fallback: FallbackTable::default(),
            catalog: None,
        }
    }
}

impl VoiceConfig {
    /// Build the selector described by this configuration
    #[must_use]
    pub fn selector(&self) -> VoiceProfileSelector {
        VoiceProfileSelector::new(
            PatternSet::new(&self.low_patterns),
            PatternSet::new(&self.high_patterns),
            self.fallback,
            self.unmatched,
        )
    }
}

impl Config {
    /// Load configuration
    ///
    /// `explicit` must exist and parse. Without it the standard path is
    /// tried and silently skipped when absent.
    ///
    /// # Errors
    ///
    /// Returns error if an explicit file cannot be loaded, an environment
    /// override cannot be parsed, or the result fails validation
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        // env > toml > default
        let fc = match explicit {
            Some(path) => file::load_config_file_from(path)?,
            None => file::load_config_file(),
        };

        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Layer environment values over a parsed file and validate
    ///
    /// # Errors
    ///
    /// Returns error if an override cannot be parsed or validation fails
    pub fn from_sources<F>(fc: file::MirrorConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let analysis = {
            let d = defaults.analysis;
            let a = fc.analysis;
            AnalysisConfig {
                analyser: AnalyserSettings {
                    fft_size: a.fft_size.unwrap_or(d.analyser.fft_size),
                    smoothing: a.smoothing.unwrap_or(d.analyser.smoothing),
                    min_decibels: a.min_decibels.unwrap_or(d.analyser.min_decibels),
                    max_decibels: a.max_decibels.unwrap_or(d.analyser.max_decibels),
                },
                preferred_sample_rate: a.preferred_sample_rate.unwrap_or(d.preferred_sample_rate),
                tick_ms: a.tick_ms.unwrap_or(d.tick_ms),
            }
        };

        let estimator = EstimatorSettings {
            threshold: parse_env(&env, "VOICE_MIRROR_THRESHOLD")?
                .or(fc.estimator.threshold)
                .unwrap_or(defaults.estimator.threshold),
            min_hz: fc.estimator.min_hz.unwrap_or(defaults.estimator.min_hz),
            max_hz: fc.estimator.max_hz.unwrap_or(defaults.estimator.max_hz),
        };

        let classifier = ClassifierConfig {
            low_hz: parse_env(&env, "VOICE_MIRROR_LOW_HZ")?
                .or(fc.classifier.low_hz)
                .unwrap_or(defaults.classifier.low_hz),
            high_hz: parse_env(&env, "VOICE_MIRROR_HIGH_HZ")?
                .or(fc.classifier.high_hz)
                .unwrap_or(defaults.classifier.high_hz),
            min_samples: parse_env(&env, "VOICE_MIRROR_MIN_SAMPLES")?
                .or(fc.classifier.min_samples)
                .unwrap_or(defaults.classifier.min_samples),
        };

        let voice = {
            let d = defaults.voice;
            let v = fc.voice;

            // "es-MX" sets both the prefix and the tag
            let language = env("VOICE_MIRROR_LANGUAGE");
            let language_prefix = language
                .as_deref()
                .map(|tag| tag.split(['-', '_']).next().unwrap_or(tag).to_lowercase())
                .or(v.language_prefix)
                .unwrap_or(d.language_prefix);
            let language_tag = language.or(v.language_tag).unwrap_or(d.language_tag);

            VoiceConfig {
                language_prefix,
                language_tag,
                unmatched: parse_env(&env, "VOICE_MIRROR_UNMATCHED")?
                    .or(v.unmatched)
                    .unwrap_or(d.unmatched),
                named_rate: v.named_rate.unwrap_or(d.named_rate),
                low_patterns: v.low_patterns.unwrap_or(d.low_patterns),
                high_patterns: v.high_patterns.unwrap_or(d.high_patterns),
                fallback: FallbackTable {
                    low: v.fallback.low.unwrap_or(d.fallback.low),
                    high: v.fallback.high.unwrap_or(d.fallback.high),
                    neutral: v.fallback.neutral.unwrap_or(d.fallback.neutral),
                },
                catalog: env("VOICE_MIRROR_CATALOG")
                    .or(v.catalog)
                    .map(PathBuf::from),
            }
        };

        let config = Self {
            analysis,
            estimator,
            classifier,
            voice,
        };
        config.validate()?;

        tracing::debug!(
            threshold = config.estimator.threshold,
            low_hz = config.classifier.low_hz,
            high_hz = config.classifier.high_hz,
            min_samples = config.classifier.min_samples,
            language = %config.voice.language_tag,
            "configuration loaded"
        );

        Ok(config)
    }

    /// Check every section describes a usable pipeline
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found
    pub fn validate(&self) -> Result<()> {
        self.analysis.analyser.validate()?;
        if self.analysis.tick_ms == 0 {
            return Err(Error::Config("tick_ms must be positive".to_string()));
        }
        if self.analysis.preferred_sample_rate == 0 {
            return Err(Error::Config(
                "preferred_sample_rate must be positive".to_string(),
            ));
        }

        PitchEstimator::new(self.estimator)?;
        self.classifier.thresholds()?;

        let rate = self.voice.named_rate;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(Error::Config(format!("named_rate must be positive, got {rate}")));
        }
        self.voice.fallback.validate()?;
        if self.voice.language_prefix.trim().is_empty() {
            return Err(Error::Config("language_prefix must not be empty".to_string()));
        }

        Ok(())
    }
}

fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key}={raw}: {e}")))
        })
        .transpose()
}
