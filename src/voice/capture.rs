//! Audio capture from microphone

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    Device, SampleFormat, SampleRate, Stream, StreamConfig, SupportedStreamConfig,
    SupportedStreamConfigRange,
};

use crate::pitch::{AnalyserSettings, SpectrumAnalyser, SpectrumFrame, SpectrumSource};
use crate::{Error, Result};

/// Preferred capture rate when the device supports it
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Captures mono audio from the default input device
pub struct AudioCapture {
    device: Device,
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device
    ///
    /// Uses `preferred_rate` when an f32 config supports it, otherwise the
    /// nearest rate any f32 config offers.
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened or offers no f32 format
    pub fn new(preferred_rate: u32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let ranges: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .collect();

        let config = match choose_input_config(&ranges, preferred_rate) {
            Some(supported) => supported.config(),
            None => {
                let default = device
                    .default_input_config()
                    .map_err(|e| Error::Audio(e.to_string()))?;
                if default.sample_format() != SampleFormat::F32 {
                    return Err(Error::Audio(format!(
                        "input device offers no f32 stream format (default is {:?})",
                        default.sample_format()
                    )));
                }
                default.config()
            }
        };

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start capturing audio
    ///
    /// # Errors
    ///
    /// Returns error if capture fails
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let channels = usize::from(self.config.channels.max(1));

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        if channels == 1 {
                            buf.extend_from_slice(data);
                        } else {
                            buf.extend(data.chunks(channels).map(downmix));
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Get captured audio buffer and clear it
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Clear the audio buffer
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }
}

#[allow(clippy::cast_precision_loss)]
fn downmix(frame: &[f32]) -> f32 {
    frame.iter().sum::<f32>() / frame.len() as f32
}

/// Pick the f32 config whose rate lands nearest `preferred_rate`
///
/// Ranges covering the preferred rate win outright; ties go to fewer channels.
fn choose_input_config(
    ranges: &[SupportedStreamConfigRange],
    preferred_rate: u32,
) -> Option<SupportedStreamConfig> {
    ranges
        .iter()
        .filter(|range| {
            range.sample_format() == SampleFormat::F32
                && range.min_sample_rate() <= range.max_sample_rate()
        })
        .map(|range| {
            let rate = preferred_rate.clamp(range.min_sample_rate().0, range.max_sample_rate().0);
            (range, rate)
        })
        .min_by_key(|(range, rate)| (rate.abs_diff(preferred_rate), range.channels()))
        .map(|(range, rate)| range.clone().with_sample_rate(SampleRate(rate)))
}

/// Live spectrum of the microphone
///
/// Every snapshot drains what the device captured since the previous one
/// into the analyser. Captured audio is also kept for the utterance.
pub struct MicrophoneSpectrum {
    capture: AudioCapture,
    analyser: SpectrumAnalyser,
    recording: Vec<f32>,
}

impl MicrophoneSpectrum {
    /// Open the microphone and build an analyser for its sample rate
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened or the settings are invalid
    pub fn open(preferred_rate: u32, settings: AnalyserSettings) -> Result<Self> {
        let capture = AudioCapture::new(preferred_rate)?;
        let analyser = SpectrumAnalyser::new(settings, capture.sample_rate())?;

        Ok(Self {
            capture,
            analyser,
            recording: Vec::new(),
        })
    }

    /// Start the device, dropping stale audio and analyser state
    ///
    /// # Errors
    ///
    /// Returns error if capture fails
    pub fn start(&mut self) -> Result<()> {
        self.capture.clear_buffer();
        self.analyser.reset();
        self.recording.clear();
        self.capture.start()
    }

    /// Stop the device
    pub fn stop(&mut self) {
        self.capture.stop();
    }

    /// Sample rate of the captured audio
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.capture.sample_rate()
    }

    /// Take the audio captured since `start`
    pub fn take_recording(&mut self) -> Vec<f32> {
        let rest = self.capture.take_buffer();
        self.recording.extend_from_slice(&rest);
        std::mem::take(&mut self.recording)
    }
}

impl SpectrumSource for MicrophoneSpectrum {
    fn snapshot(&mut self) -> Option<SpectrumFrame> {
        if !self.capture.is_capturing() {
            return None;
        }

        let samples = self.capture.take_buffer();
        self.analyser.push_samples(&samples);
        self.recording.extend_from_slice(&samples);
        Some(self.analyser.snapshot())
    }
}

/// Convert f32 samples to 16-bit mono WAV bytes
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
