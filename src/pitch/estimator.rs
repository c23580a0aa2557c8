//! Lowest-strong-bin pitch estimation
//!
//! Scans the human voice band from low to high frequency and takes the first
//! bin above the energy threshold as the fundamental. Harmonics also clear
//! the threshold but always sit at higher bins, so an ascending scan meets
//! the fundamental first.

use super::{PitchSample, SpectrumFrame};
use crate::{Error, Result};

/// Default energy threshold on the 0-255 amplitude scale
pub const DEFAULT_THRESHOLD: f32 = 140.0;

/// Lower edge of the voice search band
pub const DEFAULT_MIN_HZ: f32 = 80.0;

/// Upper edge of the voice search band (exclusive)
pub const DEFAULT_MAX_HZ: f32 = 400.0;

/// Tunables for [`PitchEstimator`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    /// A bin must be strictly above this amplitude to count
    pub threshold: f32,
    /// Lower edge of the search band in Hz
    pub min_hz: f32,
    /// Upper edge of the search band in Hz
    pub max_hz: f32,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_hz: DEFAULT_MIN_HZ,
            max_hz: DEFAULT_MAX_HZ,
        }
    }
}

/// Per-frame fundamental frequency estimator
#[derive(Debug, Clone)]
pub struct PitchEstimator {
    settings: EstimatorSettings,
}

impl PitchEstimator {
    /// Create an estimator
    ///
    /// # Errors
    ///
    /// Returns error if the band is empty or a value is not finite
    pub fn new(settings: EstimatorSettings) -> Result<Self> {
        let EstimatorSettings {
            threshold,
            min_hz,
            max_hz,
        } = settings;

        if !threshold.is_finite() || !min_hz.is_finite() || !max_hz.is_finite() {
            return Err(Error::Config(
                "estimator settings must be finite".to_string(),
            ));
        }
        if min_hz < 0.0 || min_hz >= max_hz {
            return Err(Error::Config(format!(
                "estimator band is empty: min_hz={min_hz} max_hz={max_hz}"
            )));
        }

        Ok(Self { settings })
    }

    /// Bin range `[start, end)` searched for a frame of `bin_count` bins
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn search_range(&self, bin_count: usize, sample_rate: f32) -> (usize, usize) {
        let nyquist = sample_rate / 2.0;
        let n = bin_count as f32;
        let start = (self.settings.min_hz * n / nyquist).floor() as usize;
        let end = (self.settings.max_hz * n / nyquist).floor() as usize;
        (start.min(bin_count), end.min(bin_count))
    }

    /// Estimate the fundamental frequency of one frame
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate(&self, frame: &SpectrumFrame) -> PitchSample {
        let sample_rate = frame.sample_rate();
        if frame.is_empty() || !sample_rate.is_finite() || sample_rate <= 0.0 {
            tracing::trace!(
                bins = frame.len(),
                sample_rate,
                "malformed frame, treating as unvoiced"
            );
            return PitchSample::Unvoiced;
        }

        let bins = frame.bins();
        let nyquist = frame.nyquist();
        let (start, end) = self.search_range(bins.len(), sample_rate);

        bins[start..end.max(start)]
            .iter()
            .position(|&amplitude| amplitude > self.settings.threshold)
            .map(|offset| (start + offset) as f32 * nyquist / bins.len() as f32)
            .filter(|&hz| hz > 0.0)
            .map_or(PitchSample::Unvoiced, PitchSample::Voiced)
    }
}

impl Default for PitchEstimator {
    fn default() -> Self {
        Self {
            settings: EstimatorSettings::default(),
        }
    }
}
