//! Voice mirror integration tests
//!
//! Drives whole sessions from generated recordings and scripted frames,
//! without requiring audio hardware

use std::collections::VecDeque;

use voice_mirror::voice::{StaticCatalog, samples_to_wav};
use voice_mirror::{
    Config, JsonSink, ListeningSession, SpectrumFrame, SpectrumSource, SynthesisSink,
    VoiceCategory, VoiceChoice, WavReplay,
};

mod common;

use common::{
    SAMPLE_RATE, generate_silence, generate_sine_samples, peak_frame, write_file, write_wav,
};

const CATALOG: &str = r#"
[[voices]]
name = "Microsoft Helena - Spanish (Spain)"
lang = "es-ES"
local = true

[[voices]]
name = "Microsoft Pablo - Spanish (Spain)"
lang = "es-ES"
local = true

[[voices]]
name = "Google US English"
lang = "en-US"
local = false
"#;

/// Replay `samples` through a fresh default session
fn replay_session(samples: &[f32]) -> ListeningSession {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "take.wav", samples);
    let config = Config::default();

    let mut replay =
        WavReplay::open(&path, config.analysis.analyser, config.analysis.tick_ms).unwrap();
    let mut session = ListeningSession::from_config(&config).unwrap();

    session.start();
    while !replay.is_finished() {
        session.tick(&mut replay);
    }
    session.stop();
    session
}

#[test]
fn test_low_voice_recording() {
    let session = replay_session(&generate_sine_samples(110.0, 2.0, 0.02));

    assert_eq!(session.category(), VoiceCategory::LowRange);
    assert!(session.voiced_samples() > 15);
    assert!(session.average_hz().unwrap() < 155.0);
    assert_eq!(session.changes().len(), 1);
}

#[test]
fn test_high_voice_recording() {
    let session = replay_session(&generate_sine_samples(260.0, 2.0, 0.02));

    assert_eq!(session.category(), VoiceCategory::HighRange);
    assert!(session.average_hz().unwrap() > 190.0);
}

#[test]
fn test_silent_recording_stays_undetermined() {
    let session = replay_session(&generate_silence(1.0));

    assert_eq!(session.category(), VoiceCategory::Undetermined);
    assert_eq!(session.voiced_samples(), 0);
    assert!(session.frames_seen() > 0);
    assert!(session.average_hz().is_none());
}

#[test]
fn test_scripted_frames_with_configured_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(
        dir.path(),
        "config.toml",
        "[classifier]\nlow_hz = 120.0\nhigh_hz = 160.0\nmin_samples = 10\n",
    );
    let config = Config::load(Some(&path)).unwrap();
    let mut session = ListeningSession::from_config(&config).unwrap();

    // bin 5 is ~107.7 Hz, bin 14 is ~301.5 Hz
    let mut frames: VecDeque<SpectrumFrame> = (0..11).map(|_| peak_frame(5)).collect();
    frames.extend((0..5).map(|_| peak_frame(14)));

    session.start();
    let mut changes = Vec::new();
    while !frames.is_empty() {
        if let Some(change) = session.tick(&mut frames) {
            changes.push((session.frames_seen(), change));
        }
    }

    assert_eq!(changes.len(), 2);

    let (frame, first) = changes[0];
    assert_eq!(frame, 11);
    assert_eq!(first.from, VoiceCategory::Undetermined);
    assert_eq!(first.to, VoiceCategory::LowRange);

    // four high frames only reach the dead zone
    let (frame, second) = changes[1];
    assert_eq!(frame, 16);
    assert_eq!(second.to, VoiceCategory::HighRange);
    assert!(second.average_hz > 160.0);
}

#[test]
fn test_unvoiced_frames_do_not_count() {
    let mut session = ListeningSession::default();
    let silent = SpectrumFrame::new(vec![0.0; 1024], 44_100.0);

    let mut frames: VecDeque<SpectrumFrame> = VecDeque::new();
    for _ in 0..16 {
        frames.push_back(peak_frame(5));
        frames.push_back(silent.clone());
    }

    session.start();
    while !frames.is_empty() {
        session.tick(&mut frames);
    }

    assert_eq!(session.frames_seen(), 32);
    assert_eq!(session.voiced_samples(), 16);
    assert_eq!(session.category(), VoiceCategory::LowRange);
}

#[test]
fn test_stopped_session_leaves_source_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_wav(dir.path(), "take.wav", &generate_sine_samples(110.0, 0.5, 0.02));
    let config = Config::default();
    let mut replay =
        WavReplay::open(&path, config.analysis.analyser, config.analysis.tick_ms).unwrap();

    let mut session = ListeningSession::from_config(&config).unwrap();
    session.start();
    session.tick(&mut replay);
    session.stop();

    for _ in 0..10 {
        assert!(session.tick(&mut replay).is_none());
    }
    assert_eq!(session.frames_seen(), 1);
    assert!(!replay.is_finished());
}

#[test]
fn test_low_speaker_gets_low_named_voice() {
    let session = replay_session(&generate_sine_samples(110.0, 2.0, 0.02));
    let catalog = StaticCatalog::from_toml(CATALOG).unwrap();
    let config = Config::default();

    let request = session.utterance("hola", &catalog, &config.voice.selector(), &config.voice);

    assert_eq!(
        request.choice.voice().unwrap().name,
        "Microsoft Pablo - Spanish (Spain)"
    );
    assert!((request.rate - 0.9).abs() < f32::EPSILON);
    assert_eq!(request.language_tag, "es-ES");
}

#[test]
fn test_high_speaker_without_spanish_voices_gets_parameters() {
    let session = replay_session(&generate_sine_samples(260.0, 2.0, 0.02));
    let catalog = StaticCatalog::from_toml(
        "[[voices]]\nname = \"Google US English\"\nlang = \"en-US\"\n",
    )
    .unwrap();
    let config = Config::default();

    let request = session.utterance("hola", &catalog, &config.voice.selector(), &config.voice);

    let VoiceChoice::Parameters { params } = request.choice else {
        panic!("expected fallback parameters");
    };
    assert!(params.pitch > 1.0);
    assert!(params.rate >= 1.0);
    assert!((request.rate - params.rate).abs() < f32::EPSILON);
}

#[test]
fn test_speech_request_reaches_sink() {
    let session = replay_session(&generate_sine_samples(260.0, 2.0, 0.02));
    let catalog = StaticCatalog::from_toml(CATALOG).unwrap();
    let config = Config::default();

    let request = session.utterance("hola", &catalog, &config.voice.selector(), &config.voice);
    let mut sink = JsonSink::new(Vec::new());
    sink.speak(&request).unwrap();

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let value: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
    assert_eq!(value["text"], "hola");
    assert_eq!(value["choice"]["kind"], "named");
    assert_eq!(
        value["choice"]["voice"]["name"],
        "Microsoft Helena - Spanish (Spain)"
    );
}

#[test]
fn test_summary_json() {
    let session = replay_session(&generate_sine_samples(110.0, 1.0, 0.02));
    let json = serde_json::to_value(session.summary()).unwrap();

    assert_eq!(json["category"], "low_range");
    assert!(json["average_hz"].as_f64().unwrap() < 155.0);
    assert_eq!(json["changes"][0]["to"], "low_range");
}

#[test]
fn test_wav_encoding_roundtrip_through_replay() {
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roundtrip.wav");
    std::fs::write(&path, wav).unwrap();

    let config = Config::default();
    let mut replay =
        WavReplay::open(&path, config.analysis.analyser, config.analysis.tick_ms).unwrap();

    assert_eq!(replay.sample_rate(), SAMPLE_RATE);
    assert_eq!(replay.samples().len(), samples.len());
    for (decoded, original) in replay.samples().iter().zip(&samples) {
        assert!((decoded - original).abs() < 1e-3);
    }

    let frame = replay.snapshot().unwrap();
    assert_eq!(frame.len(), 1024);
}

#[test]
fn test_missing_wav_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default();
    let result = WavReplay::open(
        &dir.path().join("missing.wav"),
        config.analysis.analyser,
        config.analysis.tick_ms,
    );
    assert!(matches!(result, Err(voice_mirror::Error::Audio(_))));
}
