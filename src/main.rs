use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voice_mirror::voice::{MicrophoneSpectrum, SharedCatalog, StaticCatalog, samples_to_wav};
use voice_mirror::{
    CategoryChange, Config, JsonSink, ListeningSession, SynthesisSink, VoiceCatalog,
    VoiceCategory, WavReplay,
};

/// Mirror - answer a speaker in a voice from their own range
#[derive(Parser)]
#[command(name = "mirror", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to ~/.config/voice-mirror/config.toml)
    #[arg(long, global = true, env = "VOICE_MIRROR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Listen to the microphone, then answer in a matching voice
    Listen {
        /// Recording length in seconds
        #[arg(short, long, default_value = "5")]
        seconds: u64,

        /// Text to speak back
        #[arg(short, long, default_value = "Hola, así suena tu voz.")]
        text: String,

        /// Keep the recording as a WAV file
        #[arg(long)]
        save_wav: Option<PathBuf>,
    },
    /// Classify a recorded WAV file
    Analyze {
        /// WAV file to replay
        wav: PathBuf,

        /// Text to speak back
        #[arg(short, long, default_value = "Hola, así suena tu voz.")]
        text: String,

        /// Print the session summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the voice chosen for a category
    Voices {
        /// low, high or undetermined
        #[arg(short, long, default_value = "undetermined")]
        category: VoiceCategory,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voice_mirror=info",
        1 => "info,voice_mirror=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Listen {
            seconds,
            text,
            save_wav,
        } => listen(&config, seconds, &text, save_wav.as_deref()).await,
        Command::Analyze { wav, text, json } => analyze(&config, &wav, &text, json).await,
        Command::Voices { category } => voices(&config, category).await,
    }
}

/// Record from the microphone for `seconds`, then speak `text` back
#[allow(clippy::future_not_send)]
async fn listen(
    config: &Config,
    seconds: u64,
    text: &str,
    save_wav: Option<&Path>,
) -> anyhow::Result<()> {
    // Voices may arrive while we are still listening
    let catalog = SharedCatalog::new();
    let loader = spawn_catalog_load(config, catalog.clone());

    let mut mic =
        MicrophoneSpectrum::open(config.analysis.preferred_sample_rate, config.analysis.analyser)?;
    let mut session = ListeningSession::from_config(config)?;

    println!("Listening for {seconds} seconds at {} Hz...", mic.sample_rate());
    println!("Speak into your microphone!\n");

    mic.start()?;
    session.start();

    let mut interval =
        tokio::time::interval(Duration::from_millis(u64::from(config.analysis.tick_ms)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(deadline);
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            () = &mut deadline => break,
            _ = &mut interrupt => {
                tracing::info!("interrupted, stopping early");
                break;
            }
            _ = interval.tick() => {
                if let Some(change) = session.tick(&mut mic) {
                    print_change(&change);
                }
            }
        }
    }

    session.stop();
    mic.stop();

    let recording = mic.take_recording();
    println!(
        "\nRecorded {:.1}s | RMS: {:.4}",
        duration_secs(recording.len(), mic.sample_rate()),
        calculate_rms(&recording)
    );
    print_summary(&session);

    if let Some(path) = save_wav {
        std::fs::write(path, samples_to_wav(&recording, mic.sample_rate())?)?;
        println!("Saved recording to {}", path.display());
    }

    loader.await?;
    speak(config, &session, text, &catalog)
}

/// Replay a WAV file through a session
#[allow(clippy::future_not_send)]
async fn analyze(config: &Config, wav: &Path, text: &str, json: bool) -> anyhow::Result<()> {
    let catalog = SharedCatalog::new();
    let loader = spawn_catalog_load(config, catalog.clone());

    let mut replay = WavReplay::open(wav, config.analysis.analyser, config.analysis.tick_ms)?;
    let mut session = ListeningSession::from_config(config)?;

    session.start();
    while !replay.is_finished() {
        if let Some(change) = session.tick(&mut replay)
            && !json
        {
            print_change(&change);
        }
    }
    session.stop();

    if json {
        println!("{}", serde_json::to_string_pretty(&session.summary())?);
    } else {
        println!(
            "{}: {:.1}s at {} Hz",
            wav.display(),
            duration_secs(replay.samples().len(), replay.sample_rate()),
            replay.sample_rate()
        );
        print_summary(&session);
    }

    loader.await?;
    speak(config, &session, text, &catalog)
}

/// Print the selector's choice for `category`
async fn voices(config: &Config, category: VoiceCategory) -> anyhow::Result<()> {
    let catalog = SharedCatalog::new();
    spawn_catalog_load(config, catalog.clone()).await?;

    let available = catalog.voices();
    println!("{} voices in catalog", available.len());
    for voice in &available {
        let origin = if voice.local { "local" } else { "remote" };
        println!("  {} [{}] {origin}", voice.name, voice.language_tag);
    }

    let selector = config.voice.selector();
    let fallback = selector.fallback().for_category(category);
    println!(
        "\nUnmatched policy: {:?} | Fallback for {category}: pitch {:.2}, rate {:.2}",
        selector.unmatched(),
        fallback.pitch,
        fallback.rate
    );

    let choice = selector.select(category, &available, &config.voice.language_prefix);
    println!("\nChoice for {category}:");
    println!("{}", serde_json::to_string_pretty(&choice)?);

    Ok(())
}

/// Load the configured catalog off the runtime threads
fn spawn_catalog_load(config: &Config, catalog: SharedCatalog) -> tokio::task::JoinHandle<()> {
    let path = config.voice.catalog.clone();

    tokio::task::spawn_blocking(move || {
        let Some(path) = path else {
            tracing::debug!("no voice catalog configured");
            return;
        };

        match StaticCatalog::load(&path) {
            Ok(loaded) => catalog.replace(loaded.voices()),
            Err(e) => {
                tracing::warn!(error = %e, "voice catalog unavailable");
            }
        }
    })
}

fn speak(
    config: &Config,
    session: &ListeningSession,
    text: &str,
    catalog: &SharedCatalog,
) -> anyhow::Result<()> {
    let selector = config.voice.selector();
    let request = session.utterance(text, catalog, &selector, &config.voice);

    let mut sink = JsonSink::new(std::io::stdout().lock());
    sink.speak(&request)?;
    Ok(())
}

fn print_change(change: &CategoryChange) {
    println!(
        "[{:3} samples] {} -> {} (avg {:.1} Hz)",
        change.samples, change.from, change.to, change.average_hz
    );
}

fn print_summary(session: &ListeningSession) {
    let average = session
        .average_hz()
        .map_or_else(|| "-".to_string(), |hz| format!("{hz:.1} Hz"));
    println!(
        "Category: {} | Average: {average} | Voiced: {}/{} frames",
        session.category(),
        session.voiced_samples(),
        session.frames_seen()
    );
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[allow(clippy::cast_precision_loss)]
fn duration_secs(samples: usize, sample_rate: u32) -> f32 {
    if sample_rate == 0 {
        return 0.0;
    }
    samples as f32 / sample_rate as f32
}
