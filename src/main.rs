use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use dendrite::voice::{
    AudioCapture, AudioPlayback, SpeechOutput, SpeechToText, TextToSpeech, VoiceInput,
    calculate_energy,
};
use dendrite::{Assistant, AssistantOptions, ChatClient, Config, HistoryStore, KeyboardInput, Opening};

/// Dendrite - talk to a chat model by voice or keyboard
#[derive(Parser)]
#[command(name = "dendrite", version, about)]
struct Cli {
    /// Listen on the microphone instead of reading from stdin
    #[arg(long, env = "DENDRITE_VOICE")]
    voice: bool,

    /// Conversation history file (defaults to ./conversation_history.json)
    #[arg(long)]
    history: Option<PathBuf>,

    /// How the assistant opens the session
    #[arg(long, value_enum, default_value_t = OpeningArg::Primed)]
    opening: OpeningArg,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OpeningArg {
    /// Send the persona instruction and speak the reply
    Primed,
    /// Speak a canned greeting
    Greeting,
    /// Start listening straight away
    Silent,
}

impl From<OpeningArg> for Opening {
    fn from(arg: OpeningArg) -> Self {
        match arg {
            OpeningArg::Primed => Self::Primed,
            OpeningArg::Greeting => Self::Greeting,
            OpeningArg::Silent => Self::Silent,
        }
    }
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "warn,dendrite=debug",
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

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => {
                tokio::task::spawn_blocking(move || test_mic(duration)).await?
            }
            Command::TestSpeaker => tokio::task::spawn_blocking(test_speaker).await?,
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    let mut config = Config::from_env()?;
    if let Some(path) = cli.history {
        config.history_path = path;
    }

    tracing::info!(
        voice = cli.voice,
        model = %config.llm_model,
        history = %config.history_path.display(),
        "starting dendrite"
    );

    let model = ChatClient::new(&config);
    let store = HistoryStore::new(&config.history_path);
    let speech = build_speech_output(&config);
    let options = AssistantOptions {
        voice: cli.voice,
        opening: cli.opening.into(),
    };

    if cli.voice {
        let input = VoiceInput::new(SpeechToText::new(&config));
        Assistant::new(model, input, store, speech, options)
            .run()
            .await?;
    } else {
        Assistant::new(model, KeyboardInput::stdin(), store, speech, options)
            .run()
            .await?;
    }

    Ok(())
}

/// Build speech output, or `None` when TTS or an output device is unavailable
fn build_speech_output(config: &Config) -> Option<SpeechOutput> {
    let tts_config = config.tts.as_ref()?;

    let tts = match TextToSpeech::new(tts_config) {
        Ok(tts) => tts,
        Err(e) => {
            tracing::warn!(error = %e, "speech output disabled");
            return None;
        }
    };

    let playback = match AudioPlayback::new() {
        Ok(playback) => playback,
        Err(e) => {
            tracing::warn!(error = %e, "no audio output, replies will not be spoken");
            return None;
        }
    };

    tracing::debug!(device = playback.device_name(), "speech output ready");
    Some(SpeechOutput::new(tts, Arc::new(playback), &config.scratch_dir))
}

/// Test microphone input
fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Device: {}", capture.device_name());
    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    for i in 0..duration {
        let samples = capture.collect(Duration::from_secs(1));
        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    let num_samples = sample_rate as usize * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!(
        "Playing {} samples at {} Hz on {}...",
        samples.len(),
        sample_rate,
        playback.device_name()
    );

    playback.play_samples(&samples, sample_rate)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl list sinks short");
    println!("  2. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test TTS output via `ElevenLabs`
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::from_env()?;
    let tts_config = config
        .tts
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("ELEVEN_LABS_KEY and ELEVEN_LABS_VOICE_ID must be set"))?;
    let tts = TextToSpeech::new(tts_config)?;

    println!("Synthesizing speech...");
    let mp3_data = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    if mp3_data.len() > 3 {
        println!(
            "First 4 bytes: {:02x} {:02x} {:02x} {:02x}",
            mp3_data[0], mp3_data[1], mp3_data[2], mp3_data[3]
        );
    }

    println!("Playing audio...");
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        AudioPlayback::new()?.play_mp3(&mp3_data)?;
        Ok(())
    })
    .await??;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
