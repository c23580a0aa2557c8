//! Byte-scale spectrum analyser
//!
//! Turns a running PCM stream into [`SpectrumFrame`]s on the 0-255 scale the
//! estimator thresholds against: Blackman window, FFT, per-bin exponential
//! smoothing across snapshots, then a linear map of a decibel range onto
//! 0-255.

use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::SpectrumFrame;
use crate::{Error, Result};

type Complex32 = Complex<f32>;

/// Analyser tunables
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserSettings {
    /// FFT length in samples; yields `fft_size / 2` bins
    pub fft_size: usize,
    /// Weight of the previous snapshot in `[0, 1)`
    pub smoothing: f32,
    /// Level mapped to 0
    pub min_decibels: f32,
    /// Level mapped to 255
    pub max_decibels: f32,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AnalyserSettings {
    /// Check the settings describe a usable analyser
    ///
    /// # Errors
    ///
    /// Returns error on a bad FFT size, decibel range or smoothing factor
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || !(32..=32_768).contains(&self.fft_size) {
            return Err(Error::Config(format!(
                "fft_size must be a power of two in [32, 32768], got {}",
                self.fft_size
            )));
        }
        if self.min_decibels.is_nan()
            || self.max_decibels.is_nan()
            || self.min_decibels >= self.max_decibels
        {
            return Err(Error::Config(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            )));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(Error::Config(format!(
                "smoothing must be in [0, 1), got {}",
                self.smoothing
            )));
        }
        Ok(())
    }
}

/// Rolling FFT over the most recent `fft_size` samples
pub struct SpectrumAnalyser {
    settings: AnalyserSettings,
    sample_rate: u32,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    history: VecDeque<f32>,
    smoothed: Vec<f32>,
    buffer: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectrumAnalyser {
    /// Create an analyser for audio at `sample_rate`
    ///
    /// # Errors
    ///
    /// Returns error if the settings are invalid or the sample rate is zero
    pub fn new(settings: AnalyserSettings, sample_rate: u32) -> Result<Self> {
        settings.validate()?;
        if sample_rate == 0 {
            return Err(Error::Config("sample rate must be positive".to_string()));
        }

        let size = settings.fft_size;
        let fft = FftPlanner::<f32>::new().plan_fft_forward(size);
        let scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        tracing::debug!(fft_size = size, sample_rate, "spectrum analyser initialized");

        Ok(Self {
            settings,
            sample_rate,
            fft,
            window: blackman_window(size),
            history: VecDeque::from(vec![0.0; size]),
            smoothed: vec![0.0; size / 2],
            buffer: vec![Complex32::new(0.0, 0.0); size],
            scratch,
        })
    }

    /// Sample rate the analyser was built for
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Append PCM samples, keeping only the newest `fft_size`
    pub fn push_samples(&mut self, samples: &[f32]) {
        let size = self.settings.fft_size;
        let tail = &samples[samples.len().saturating_sub(size)..];
        let overflow = (self.history.len() + tail.len()).saturating_sub(size);
        self.history.drain(..overflow);
        self.history.extend(tail.iter().copied());
    }

    /// Forget all audio and smoothing state
    pub fn reset(&mut self) {
        self.history.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
    }

    /// Compute the byte-scale spectrum of the current window
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&mut self) -> SpectrumFrame {
        let size = self.settings.fft_size;

        for ((slot, &sample), &w) in self
            .buffer
            .iter_mut()
            .zip(self.history.iter())
            .zip(self.window.iter())
        {
            *slot = Complex32::new(sample * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let tau = self.settings.smoothing;
        let min_db = self.settings.min_decibels;
        let range_db = self.settings.max_decibels - min_db;
        let scale = size as f32;

        let bins = self
            .smoothed
            .iter_mut()
            .zip(self.buffer.iter())
            .map(|(prev, value)| {
                *prev = tau.mul_add(*prev, (1.0 - tau) * value.norm() / scale);
                let db = 20.0 * prev.max(f32::MIN_POSITIVE).log10();
                (255.0 * (db - min_db) / range_db).clamp(0.0, 255.0).floor()
            })
            .collect();

        SpectrumFrame::new(bins, self.sample_rate as f32)
    }
}

impl std::fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("settings", &self.settings)
            .field("sample_rate", &self.sample_rate)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::cast_precision_loss)]
fn blackman_window(n: usize) -> Vec<f32> {
    let len = n as f32;
    (0..n)
        .map(|i| {
            let x = i as f32 / len;
            0.08f32.mul_add((4.0 * PI * x).cos(), 0.5f32.mul_add(-(2.0 * PI * x).cos(), 0.42))
        })
        .collect()
}
