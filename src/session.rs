//! Listening sessions
//!
//! One session per recording. It owns the estimator and the aggregator, so
//! nothing about a previous recording leaks into the next one. The caller
//! drives it with [`ListeningSession::tick`] at whatever cadence it likes.

use serde::Serialize;

use crate::classify::{CategoryChange, ClassificationAggregator, VoiceCategory};
use crate::config::VoiceConfig;
use crate::pitch::{PitchEstimator, PitchSample, SpectrumFrame, SpectrumSource};
use crate::voice::{SpeechRequest, VoiceCatalog, VoiceChoice, VoiceProfileSelector};
use crate::{Config, Result};

/// Snapshot of a session's state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Held category
    pub category: VoiceCategory,
    /// Running average of voiced samples
    pub average_hz: Option<f32>,
    /// Most recent voiced estimate
    pub last_pitch_hz: Option<f32>,
    /// Voiced samples in the window
    pub voiced_samples: usize,
    /// Frames analysed while listening
    pub frames: u64,
    /// Category changes, oldest first
    pub changes: Vec<CategoryChange>,
}

/// Pitch tracking for one recording
#[derive(Debug, Clone)]
pub struct ListeningSession {
    estimator: PitchEstimator,
    aggregator: ClassificationAggregator,
    listening: bool,
    last_pitch: Option<f32>,
    frames: u64,
    changes: Vec<CategoryChange>,
}

impl ListeningSession {
    /// Create an idle session
    #[must_use]
    pub const fn new(estimator: PitchEstimator, aggregator: ClassificationAggregator) -> Self {
        Self {
            estimator,
            aggregator,
            listening: false,
            last_pitch: None,
            frames: 0,
            changes: Vec::new(),
        }
    }

    /// Create an idle session from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the estimator or classifier settings are invalid
    pub fn from_config(config: &Config) -> Result<Self> {
        let estimator = PitchEstimator::new(config.estimator)?;
        let aggregator = ClassificationAggregator::new(config.classifier.thresholds()?);
        Ok(Self::new(estimator, aggregator))
    }

    /// Begin a recording with an empty window
    pub fn start(&mut self) {
        self.aggregator.reset();
        self.last_pitch = None;
        self.frames = 0;
        self.changes.clear();
        self.listening = true;
        tracing::debug!("listening session started");
    }

    /// End the recording; later ticks observe nothing
    pub fn stop(&mut self) {
        if self.listening {
            self.listening = false;
            tracing::debug!(
                category = %self.aggregator.category(),
                voiced = self.aggregator.len(),
                frames = self.frames,
                "listening session stopped"
            );
        }
    }

    /// Whether ticks are currently observed
    #[must_use]
    pub const fn is_listening(&self) -> bool {
        self.listening
    }

    /// Pull one snapshot from `source` and process it
    pub fn tick<S: SpectrumSource + ?Sized>(&mut self, source: &mut S) -> Option<CategoryChange> {
        if !self.listening {
            return None;
        }
        let frame = source.snapshot()?;
        self.process_frame(&frame)
    }

    /// Process a frame pushed by the caller
    pub fn process_frame(&mut self, frame: &SpectrumFrame) -> Option<CategoryChange> {
        if !self.listening {
            tracing::trace!("frame after stop ignored");
            return None;
        }

        self.frames += 1;
        let sample = self.estimator.estimate(frame);
        if let PitchSample::Voiced(hz) = sample {
            self.last_pitch = Some(hz);
            tracing::trace!(hz, frame = self.frames, "voiced frame");
        }

        let change = self.aggregator.observe(sample)?;
        self.changes.push(change);
        Some(change)
    }

    /// Held category
    #[must_use]
    pub const fn category(&self) -> VoiceCategory {
        self.aggregator.category()
    }

    /// Most recent voiced estimate
    #[must_use]
    pub const fn last_pitch(&self) -> Option<f32> {
        self.last_pitch
    }

    /// Voiced samples in the window
    #[must_use]
    pub fn voiced_samples(&self) -> usize {
        self.aggregator.len()
    }

    /// Running average of the window
    #[must_use]
    pub fn average_hz(&self) -> Option<f32> {
        self.aggregator.average_hz()
    }

    /// Frames analysed while listening
    #[must_use]
    pub const fn frames_seen(&self) -> u64 {
        self.frames
    }

    /// Category changes since `start`
    #[must_use]
    pub fn changes(&self) -> &[CategoryChange] {
        &self.changes
    }

    /// Serializable view of the session
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            category: self.category(),
            average_hz: self.average_hz(),
            last_pitch_hz: self.last_pitch,
            voiced_samples: self.voiced_samples(),
            frames: self.frames,
            changes: self.changes.clone(),
        }
    }

    /// Choose a voice for `text` and build the request for the synthesis sink
    ///
    /// The catalog is queried afresh on every call.
    pub fn utterance<C: VoiceCatalog + ?Sized>(
        &self,
        text: &str,
        catalog: &C,
        selector: &VoiceProfileSelector,
        settings: &VoiceConfig,
    ) -> SpeechRequest {
        let voices = catalog.voices();
        let choice = selector.select(self.category(), &voices, &settings.language_prefix);

        match &choice {
            VoiceChoice::Named { voice } => {
                tracing::info!(category = %self.category(), voice = %voice.name, "voice selected");
            }
            VoiceChoice::Parameters { params } => {
                tracing::info!(
                    category = %self.category(),
                    pitch = params.pitch,
                    rate = params.rate,
                    "using fallback voice parameters"
                );
            }
        }

        SpeechRequest::new(
            text,
            settings.language_tag.clone(),
            choice,
            settings.named_rate,
        )
    }
}

impl Default for ListeningSession {
    fn default() -> Self {
        Self::new(PitchEstimator::default(), ClassificationAggregator::default())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::classify::ClassifierThresholds;
    use crate::voice::{SharedCatalog, StaticCatalog, VoiceDescriptor};

    const SAMPLE_RATE: f32 = 44_100.0;

    fn peak_frame(index: usize) -> SpectrumFrame {
        let mut bins = vec![0.0; 1024];
        bins[index] = 200.0;
        SpectrumFrame::new(bins, SAMPLE_RATE)
    }

    fn silent_frame() -> SpectrumFrame {
        SpectrumFrame::new(vec![0.0; 1024], SAMPLE_RATE)
    }

    fn session(min_samples: usize) -> ListeningSession {
        ListeningSession::new(
            PitchEstimator::default(),
            ClassificationAggregator::new(
                ClassifierThresholds::new(155.0, 190.0, min_samples).unwrap(),
            ),
        )
    }

    #[test]
    fn test_idle_session_ignores_frames() {
        let mut session = session(2);
        assert!(!session.is_listening());
        assert!(session.process_frame(&peak_frame(5)).is_none());
        assert_eq!(session.frames_seen(), 0);
    }

    #[test]
    fn test_tick_pulls_and_classifies() {
        let mut session = session(3);
        // bin 5 is ~107.7 Hz
        let mut source: VecDeque<SpectrumFrame> = (0..4).map(|_| peak_frame(5)).collect();

        session.start();
        let events: Vec<_> = std::iter::from_fn(|| Some(session.tick(&mut source)))
            .take(4)
            .flatten()
            .collect();

        assert_eq!(events.len(), 1);
        assert_eq!(session.category(), VoiceCategory::LowRange);
        assert_eq!(session.frames_seen(), 4);
        assert_eq!(session.changes().len(), 1);
    }

    #[test]
    fn test_silence_counts_frames_not_samples() {
        let mut session = session(3);
        session.start();
        session.process_frame(&silent_frame());
        session.process_frame(&peak_frame(12));

        assert_eq!(session.frames_seen(), 2);
        assert_eq!(session.voiced_samples(), 1);
        assert_eq!(session.last_pitch(), Some(12.0 * 22_050.0 / 1024.0));
    }

    #[test]
    fn test_stop_blocks_observation() {
        let mut session = session(1);
        session.start();
        session.process_frame(&peak_frame(5));
        session.stop();

        let mut source: VecDeque<SpectrumFrame> = VecDeque::from(vec![peak_frame(5)]);
        assert!(session.tick(&mut source).is_none());
        assert_eq!(source.len(), 1);
        assert_eq!(session.voiced_samples(), 1);
    }

    #[test]
    fn test_restart_resets_window() {
        let mut session = session(1);
        session.start();
        for _ in 0..3 {
            session.process_frame(&peak_frame(5));
        }
        assert_eq!(session.category(), VoiceCategory::LowRange);
        session.stop();

        session.start();
        assert_eq!(session.category(), VoiceCategory::Undetermined);
        assert_eq!(session.voiced_samples(), 0);
        assert!(session.changes().is_empty());
        assert_eq!(session.last_pitch(), None);
    }

    #[test]
    fn test_utterance_requeries_catalog() {
        let mut session = session(1);
        session.start();
        for _ in 0..3 {
            session.process_frame(&peak_frame(12));
        }
        assert_eq!(session.category(), VoiceCategory::HighRange);

        let selector = VoiceProfileSelector::default();
        let voice = VoiceConfig::default();
        let catalog = SharedCatalog::new();

        let before = session.utterance("hola", &catalog, &selector, &voice);
        assert!(before.choice.params().is_some());

        catalog.replace(vec![VoiceDescriptor::new("Microsoft Laura", "es-ES", true)]);
        let after = session.utterance("hola", &catalog, &selector, &voice);
        assert_eq!(after.choice.voice().unwrap().name, "Microsoft Laura");
        assert_eq!(after.language_tag, "es-ES");
    }

    #[test]
    fn test_summary_serializes() {
        let mut session = session(1);
        session.start();
        session.process_frame(&peak_frame(5));
        session.process_frame(&peak_frame(5));

        let json = serde_json::to_value(session.summary()).unwrap();
        assert_eq!(json["category"], "low_range");
        assert_eq!(json["voiced_samples"], 2);
        assert_eq!(json["changes"].as_array().unwrap().len(), 1);

        let empty = StaticCatalog::default();
        let selector = VoiceProfileSelector::default();
        let request = session.utterance("hola", &empty, &selector, &VoiceConfig::default());
        assert!(request.pitch() < 1.0);
    }
}
