//! TOML configuration file loading
//!
//! Supports `~/.config/voice-mirror/config.toml` as a persistent config source.
//! All fields are optional, the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::voice::{FallbackParams, UnmatchedPolicy};
use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MirrorConfigFile {
    /// Spectrum analysis
    #[serde(default)]
    pub analysis: AnalysisFileConfig,

    /// Per-frame pitch estimation
    #[serde(default)]
    pub estimator: EstimatorFileConfig,

    /// Range classification
    #[serde(default)]
    pub classifier: ClassifierFileConfig,

    /// Voice selection and synthesis
    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// Spectrum analysis configuration
#[derive(Debug, Default, Deserialize)]
pub struct AnalysisFileConfig {
    pub fft_size: Option<usize>,
    pub smoothing: Option<f32>,
    pub min_decibels: Option<f32>,
    pub max_decibels: Option<f32>,

    /// Capture rate requested from the input device
    pub preferred_sample_rate: Option<u32>,

    /// Milliseconds between snapshots
    pub tick_ms: Option<u32>,
}

/// Pitch estimator configuration
#[derive(Debug, Default, Deserialize)]
pub struct EstimatorFileConfig {
    pub threshold: Option<f32>,
    pub min_hz: Option<f32>,
    pub max_hz: Option<f32>,
}

/// Classifier configuration
#[derive(Debug, Default, Deserialize)]
pub struct ClassifierFileConfig {
    pub low_hz: Option<f32>,
    pub high_hz: Option<f32>,
    pub min_samples: Option<usize>,
}

/// Voice selection configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Language prefix voices must carry (e.g. "es")
    pub language_prefix: Option<String>,

    /// Tag attached to speech requests (e.g. "es-ES")
    pub language_tag: Option<String>,

    /// Behavior when no candidate name matches
    pub unmatched: Option<UnmatchedPolicy>,

    /// Rate for named voices
    pub named_rate: Option<f32>,

    pub low_patterns: Option<Vec<String>>,
    pub high_patterns: Option<Vec<String>>,

    /// Path to a voice catalog file
    pub catalog: Option<String>,

    #[serde(default)]
    pub fallback: FallbackFileConfig,
}

/// Fallback parameter overrides
#[derive(Debug, Default, Deserialize)]
pub struct FallbackFileConfig {
    pub low: Option<FallbackParams>,
    pub high: Option<FallbackParams>,
    pub neutral: Option<FallbackParams>,
}

/// Load the TOML config file from the standard path
///
/// Returns `MirrorConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> MirrorConfigFile {
    let Some(path) = config_file_path() else {
        return MirrorConfigFile::default();
    };

    if !path.exists() {
        return MirrorConfigFile::default();
    }

    match load_config_file_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            MirrorConfigFile::default()
        }
    }
}

/// Load a config file the user asked for by path
///
/// # Errors
///
/// Returns error if the file is missing, unreadable or malformed
pub fn load_config_file_from(path: &Path) -> Result<MirrorConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    let config = toml::from_str(&content)?;

    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/voice-mirror/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-mirror").join("config.toml"))
}
