//! Fundamental frequency extraction
//!
//! A spectrum snapshot comes in, one pitch sample goes out. Snapshots are
//! produced by a [`SpectrumSource`] once per analysis tick.

mod analyser;
mod estimator;

use std::collections::VecDeque;

use serde::Serialize;

pub use analyser::{AnalyserSettings, SpectrumAnalyser};
pub use estimator::{EstimatorSettings, PitchEstimator};

/// One frequency-domain snapshot on a 0-255 amplitude scale
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    bins: Vec<f32>,
    sample_rate: f32,
}

impl SpectrumFrame {
    /// Wrap captured bins and the sample rate they were taken at
    #[must_use]
    pub const fn new(bins: Vec<f32>, sample_rate: f32) -> Self {
        Self { bins, sample_rate }
    }

    /// Amplitude per bin, low frequency first
    #[must_use]
    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    /// Number of bins
    #[must_use]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Whether the frame carries no bins
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Sample rate of the audio the spectrum was computed from
    #[must_use]
    pub const fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Highest representable frequency
    #[must_use]
    pub fn nyquist(&self) -> f32 {
        self.sample_rate / 2.0
    }
}

/// Result of estimating one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "hz", rename_all = "snake_case")]
pub enum PitchSample {
    /// A fundamental frequency in Hz
    Voiced(f32),
    /// Nothing strong enough in the voice band
    Unvoiced,
}

impl PitchSample {
    /// Frequency in Hz for voiced samples
    #[must_use]
    pub const fn hz(self) -> Option<f32> {
        match self {
            Self::Voiced(hz) => Some(hz),
            Self::Unvoiced => None,
        }
    }
}

/// Supplies spectrum snapshots on demand
///
/// `None` means there is nothing to analyse on this tick.
pub trait SpectrumSource {
    /// Take the current snapshot
    fn snapshot(&mut self) -> Option<SpectrumFrame>;
}

/// Scripted frames, consumed front to back
impl SpectrumSource for VecDeque<SpectrumFrame> {
    fn snapshot(&mut self) -> Option<SpectrumFrame> {
        self.pop_front()
    }
}
