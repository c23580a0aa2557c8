//! Voice range classification with hysteresis
//!
//! Voiced pitch samples accumulate for the length of one utterance. Once
//! enough have arrived, every new sample recomputes the running average and
//! checks it against two thresholds. Averages between the thresholds never
//! change the category, so a speaker hovering near a single cutoff does not
//! flap between ranges.

use serde::Serialize;

use crate::pitch::PitchSample;
use crate::{Error, Result};

/// Default upper bound of the low range in Hz
pub const DEFAULT_LOW_HZ: f32 = 155.0;

/// Default lower bound of the high range in Hz
pub const DEFAULT_HIGH_HZ: f32 = 190.0;

/// Default number of voiced samples that must be exceeded before classifying
pub const DEFAULT_MIN_SAMPLES: usize = 15;

/// Classified voice range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceCategory {
    /// Not enough evidence yet
    #[default]
    Undetermined,
    /// Average pitch below the low threshold
    LowRange,
    /// Average pitch above the high threshold
    HighRange,
}

impl VoiceCategory {
    /// Short human-readable label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Undetermined => "undetermined",
            Self::LowRange => "low",
            Self::HighRange => "high",
        }
    }
}

impl std::fmt::Display for VoiceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for VoiceCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "undetermined" | "neutral" => Ok(Self::Undetermined),
            "low" | "low-range" | "male" => Ok(Self::LowRange),
            "high" | "high-range" | "female" => Ok(Self::HighRange),
            other => Err(Error::Config(format!("unknown voice category: {other}"))),
        }
    }
}

/// Emitted when the held category changes
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CategoryChange {
    /// Category held before this sample
    pub from: VoiceCategory,
    /// Category held from now on
    pub to: VoiceCategory,
    /// Running average that triggered the change
    pub average_hz: f32,
    /// Voiced samples in the window at the time of the change
    pub samples: usize,
}

/// Hysteresis band and warm-up length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierThresholds {
    low_hz: f32,
    high_hz: f32,
    min_samples: usize,
}

impl ClassifierThresholds {
    /// Build a threshold set
    ///
    /// # Errors
    ///
    /// Returns error unless `low_hz < high_hz` and both are finite
    pub fn new(low_hz: f32, high_hz: f32, min_samples: usize) -> Result<Self> {
        if !low_hz.is_finite() || !high_hz.is_finite() {
            return Err(Error::Config(
                "classifier thresholds must be finite".to_string(),
            ));
        }
        if low_hz >= high_hz {
            return Err(Error::Config(format!(
                "low threshold ({low_hz} Hz) must be below high threshold ({high_hz} Hz)"
            )));
        }

        Ok(Self {
            low_hz,
            high_hz,
            min_samples,
        })
    }

    /// Upper bound of the low range
    #[must_use]
    pub const fn low_hz(&self) -> f32 {
        self.low_hz
    }

    /// Lower bound of the high range
    #[must_use]
    pub const fn high_hz(&self) -> f32 {
        self.high_hz
    }

    /// Window size that must be exceeded before classifying
    #[must_use]
    pub const fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// Category an average points to, `None` inside the dead zone
    #[must_use]
    pub fn candidate(&self, average_hz: f32) -> Option<VoiceCategory> {
        if average_hz < self.low_hz {
            Some(VoiceCategory::LowRange)
        } else if average_hz > self.high_hz {
            Some(VoiceCategory::HighRange)
        } else {
            None
        }
    }
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        Self {
            low_hz: DEFAULT_LOW_HZ,
            high_hz: DEFAULT_HIGH_HZ,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

/// Accumulates pitch samples for one utterance and holds the category
#[derive(Debug, Clone)]
pub struct ClassificationAggregator {
    thresholds: ClassifierThresholds,
    window: Vec<f32>,
    sum: f64,
    category: VoiceCategory,
}

impl ClassificationAggregator {
    /// Create an empty aggregator
    #[must_use]
    pub const fn new(thresholds: ClassifierThresholds) -> Self {
        Self {
            thresholds,
            window: Vec::new(),
            sum: 0.0,
            category: VoiceCategory::Undetermined,
        }
    }

    /// Feed the next sample in temporal order
    ///
    /// Unvoiced samples are dropped without touching the window.
    pub fn observe(&mut self, sample: PitchSample) -> Option<CategoryChange> {
        let hz = sample.hz()?;

        self.window.push(hz);
        self.sum += f64::from(hz);

        if self.window.len() <= self.thresholds.min_samples {
            return None;
        }

        let average_hz = self.average_hz()?;
        let candidate = self.thresholds.candidate(average_hz)?;
        if candidate == self.category {
            return None;
        }

        let change = CategoryChange {
            from: self.category,
            to: candidate,
            average_hz,
            samples: self.window.len(),
        };
        self.category = candidate;

        tracing::info!(
            from = %change.from,
            to = %change.to,
            average_hz = change.average_hz,
            samples = change.samples,
            "voice category changed"
        );

        Some(change)
    }

    /// Clear the window and return to `Undetermined`
    pub fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
        self.category = VoiceCategory::Undetermined;
    }

    /// Currently held category
    #[must_use]
    pub const fn category(&self) -> VoiceCategory {
        self.category
    }

    /// Number of voiced samples observed since the last reset
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Whether no voiced sample has been observed since the last reset
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Mean of the window, `None` when empty
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn average_hz(&self) -> Option<f32> {
        if self.window.is_empty() {
            return None;
        }
        Some((self.sum / self.window.len() as f64) as f32)
    }
}

impl Default for ClassificationAggregator {
    fn default() -> Self {
        Self::new(ClassifierThresholds::default())
    }
}
