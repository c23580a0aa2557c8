//! Hand-off to the synthesis engine
//!
//! The engine itself lives outside this crate. It receives the text, the
//! language tag and the chosen voice or parameters.

use std::io::Write;

use serde::Serialize;

use super::VoiceChoice;
use crate::Result;

/// Everything the synthesis engine needs for one utterance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechRequest {
    /// Text to speak
    pub text: String,
    /// BCP 47 language tag
    pub language_tag: String,
    /// Voice or fallback parameters
    pub choice: VoiceChoice,
    /// Speaking rate multiplier
    pub rate: f32,
}

impl SpeechRequest {
    /// Build a request; named voices speak at `named_rate`, fallback
    /// parameters carry their own rate
    #[must_use]
    pub fn new(
        text: impl Into<String>,
        language_tag: impl Into<String>,
        choice: VoiceChoice,
        named_rate: f32,
    ) -> Self {
        let rate = choice.params().map_or(named_rate, |p| p.rate);
        Self {
            text: text.into(),
            language_tag: language_tag.into(),
            choice,
            rate,
        }
    }

    /// Pitch multiplier to apply, 1.0 for named voices
    #[must_use]
    pub fn pitch(&self) -> f32 {
        self.choice.params().map_or(1.0, |p| p.pitch)
    }
}

/// Receives finished speech requests
pub trait SynthesisSink {
    /// Speak one utterance
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be delivered
    fn speak(&mut self, request: &SpeechRequest) -> Result<()>;
}

/// Writes each request as one JSON line
#[derive(Debug)]
pub struct JsonSink<W> {
    writer: W,
}

impl<W: Write> JsonSink<W> {
    /// Wrap a writer
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Recover the writer
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> SynthesisSink for JsonSink<W> {
    fn speak(&mut self, request: &SpeechRequest) -> Result<()> {
        serde_json::to_writer(&mut self.writer, request)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;

        tracing::debug!(
            chars = request.text.len(),
            language = %request.language_tag,
            "speech request written"
        );
        Ok(())
    }
}
