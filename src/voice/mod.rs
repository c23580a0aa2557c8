//! Voice input and output
//!
//! Microphone capture on one side. On the other, catalog lookup, voice
//! selection and the hand-off to an external synthesis engine.

mod capture;
mod catalog;
mod selector;
mod synthesis;

pub use capture::{AudioCapture, DEFAULT_SAMPLE_RATE, MicrophoneSpectrum, samples_to_wav};
pub use catalog::{SharedCatalog, StaticCatalog, VoiceCatalog};
pub use selector::{
    DEFAULT_HIGH_PATTERNS, DEFAULT_LOW_PATTERNS, FallbackParams, FallbackTable, PatternSet,
    UnmatchedPolicy, VoiceChoice, VoiceDescriptor, VoiceProfileSelector,
};
pub use synthesis::{JsonSink, SpeechRequest, SynthesisSink};
