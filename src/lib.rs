//! Voice Mirror - answer a speaker in a voice from their own range
//!
//! This library provides the pieces behind the `mirror` binary:
//! - Spectrum analysis and per-frame pitch estimation
//! - Low/high range classification with hysteresis
//! - Voice selection from a catalog, with pitch/rate fallbacks
//! - Live microphone sessions and offline WAV replay
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Spectrum sources                    │
//! │   Microphone  │  WAV replay  │  Scripted frames     │
//! └────────────────────┬────────────────────────────────┘
//!                      │ one snapshot per tick
//! ┌────────────────────▼────────────────────────────────┐
//! │                Listening session                     │
//! │   Pitch estimator  →  Classification aggregator     │
//! └────────────────────┬────────────────────────────────┘
//!                      │ category
//! ┌────────────────────▼────────────────────────────────┐
//! │     Voice selector  →  Synthesis sink (external)    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod pitch;
pub mod replay;
pub mod session;
pub mod voice;

pub use classify::{
    CategoryChange, ClassificationAggregator, ClassifierThresholds, VoiceCategory,
};
pub use config::Config;
pub use error::{Error, Result};
pub use pitch::{
    AnalyserSettings, EstimatorSettings, PitchEstimator, PitchSample, SpectrumAnalyser,
    SpectrumFrame, SpectrumSource,
};
pub use replay::WavReplay;
pub use session::{ListeningSession, SessionSummary};
pub use voice::{
    JsonSink, SpeechRequest, SynthesisSink, VoiceCatalog, VoiceChoice, VoiceDescriptor,
    VoiceProfileSelector,
};
