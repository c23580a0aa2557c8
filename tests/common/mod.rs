//! Shared test utilities

use std::path::{Path, PathBuf};

use voice_mirror::SpectrumFrame;

/// Sample rate used by generated audio
pub const SAMPLE_RATE: u32 = 44_100;

/// Generate sine wave audio samples
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Write mono samples as a 16-bit WAV file in `dir`
pub fn write_wav(dir: &Path, name: &str, samples: &[f32]) -> PathBuf {
    let path = dir.join(name);
    let bytes = voice_mirror::voice::samples_to_wav(samples, SAMPLE_RATE)
        .expect("failed to encode test wav");
    std::fs::write(&path, bytes).expect("failed to write test wav");
    path
}

/// Write a text file in `dir`
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("failed to write test file");
    path
}

/// A 1024-bin frame at 44.1 kHz with one loud bin
#[allow(clippy::cast_precision_loss)]
pub fn peak_frame(index: usize) -> SpectrumFrame {
    let mut bins = vec![0.0; 1024];
    bins[index] = 220.0;
    SpectrumFrame::new(bins, SAMPLE_RATE as f32)
}
