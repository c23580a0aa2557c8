//! Offline analysis of recorded audio
//!
//! Plays a WAV file through the analyser one tick at a time so a recording
//! drives a session exactly like a live microphone would.

use std::path::Path;

use crate::pitch::{AnalyserSettings, SpectrumAnalyser, SpectrumFrame, SpectrumSource};
use crate::{Error, Result};

/// Spectrum source backed by a decoded WAV file
#[derive(Debug)]
pub struct WavReplay {
    samples: Vec<f32>,
    position: usize,
    hop: usize,
    analyser: SpectrumAnalyser,
}

impl WavReplay {
    /// Decode a WAV file, mixing all channels down to mono
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be decoded or the settings are invalid
    pub fn open(path: &Path, settings: AnalyserSettings, tick_ms: u32) -> Result<Self> {
        let reader = hound::WavReader::open(path)
            .map_err(|e| Error::Audio(format!("failed to open {}: {e}", path.display())))?;
        let (samples, sample_rate) = decode(reader)?;

        tracing::debug!(
            path = %path.display(),
            samples = samples.len(),
            sample_rate,
            "decoded recording"
        );

        Self::from_samples(samples, sample_rate, settings, tick_ms)
    }

    /// Replay mono samples already in memory
    ///
    /// # Errors
    ///
    /// Returns error if the analyser settings are invalid or `tick_ms` is zero
    pub fn from_samples(
        samples: Vec<f32>,
        sample_rate: u32,
        settings: AnalyserSettings,
        tick_ms: u32,
    ) -> Result<Self> {
        if tick_ms == 0 {
            return Err(Error::Config("tick_ms must be positive".to_string()));
        }

        let analyser = SpectrumAnalyser::new(settings, sample_rate)?;
        let hop = usize::try_from(u64::from(sample_rate) * u64::from(tick_ms) / 1000)
            .map_err(|e| Error::Config(e.to_string()))?
            .max(1);

        Ok(Self {
            samples,
            position: 0,
            hop,
            analyser,
        })
    }

    /// Samples fed to the analyser per tick
    #[must_use]
    pub const fn hop(&self) -> usize {
        self.hop
    }

    /// Sample rate of the recording
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.analyser.sample_rate()
    }

    /// The whole decoded recording
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Whether every sample has been fed
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.position >= self.samples.len()
    }
}

impl SpectrumSource for WavReplay {
    fn snapshot(&mut self) -> Option<SpectrumFrame> {
        if self.is_finished() {
            return None;
        }

        let end = (self.position + self.hop).min(self.samples.len());
        self.analyser.push_samples(&self.samples[self.position..end]);
        self.position = end;

        Some(self.analyser.snapshot())
    }
}

#[allow(clippy::cast_precision_loss)]
fn decode<R: std::io::Read>(reader: hound::WavReader<R>) -> Result<(Vec<f32>, u32)> {
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(e.to_string()))?
        }
    };

    let mono = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok((mono, spec.sample_rate))
}
