use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use qwen_voice_console::config::{CONFIG_ENV, SERVER_ENV};
use qwen_voice_console::generation::BaseTabInput;
use qwen_voice_console::personality::{
    ManualBuild, PersonalityBuilder, ScriptBuffer, SmartBuild, DEFAULT_CROSSFADE_MS,
};
use qwen_voice_console::terminal::{StaticWaveform, TerminalSurface};
use qwen_voice_console::{
    ApiClient, AudioFormat, Console, ConsoleConfig, ConsoleSurface, GenerationForm,
    GenerationMode, ModelKind, OutputOptions, Region,
};

type TerminalConsole = Console<TerminalSurface, StaticWaveform>;

/// Command-line controller for a Qwen3-TTS server
#[derive(Parser, Debug)]
#[command(name = "qwen-console")]
#[command(version)]
struct Cli {
    /// Server root URL
    #[arg(long, global = true, env = SERVER_ENV)]
    server: Option<String>,

    /// Config file (TOML)
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Answer yes to confirmations
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the loaded model and VRAM usage
    Status,
    /// List preset speakers
    Speakers,
    /// Load a model into the GPU
    Switch { model: ModelKind },
    /// Upload a reference audio and optionally transcribe it
    Upload(ClipArgs),
    /// Synthesize speech
    Generate {
        #[command(subcommand)]
        target: GenerateCommand,
    },
    /// Manage personalities
    Personality {
        #[command(subcommand)]
        action: PersonalityCommand,
    },
}

#[derive(Args, Debug)]
struct ClipArgs {
    /// Reference audio file
    audio: PathBuf,

    /// Length of the audio in seconds; enables the default clip
    #[arg(long)]
    duration: Option<f64>,

    /// Clip start in seconds
    #[arg(long, requires = "end")]
    start: Option<f64>,

    /// Clip end in seconds
    #[arg(long, requires = "start")]
    end: Option<f64>,

    /// Transcribe the clip into the reference text
    #[arg(long)]
    transcribe: bool,
}

#[derive(Args, Debug)]
struct OutputArgs {
    #[arg(long)]
    language: Option<String>,

    /// wav or mp3
    #[arg(long)]
    format: Option<AudioFormat>,
}

impl OutputArgs {
    fn resolve(self, config: &ConsoleConfig) -> OutputOptions {
        let defaults = OutputOptions::from(&config.generation);
        OutputOptions {
            language: self.language.unwrap_or(defaults.language),
            format: self.format.unwrap_or(defaults.format),
        }
    }
}

#[derive(Subcommand, Debug)]
enum GenerateCommand {
    /// Clone the voice of a reference clip
    Manual {
        #[command(flatten)]
        clip: ClipArgs,
        #[arg(long)]
        text: String,
        /// Transcript of the clip; transcribed when omitted
        #[arg(long)]
        ref_text: Option<String>,
        #[arg(long)]
        temperature: Option<f32>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Speak with a saved personality
    Personality {
        #[arg(long)]
        personality: String,
        #[arg(long)]
        text: String,
        /// Emotion tag inserted at the start of the text
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        temperature: Option<f32>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Use a preset speaker
    Custom {
        #[arg(long)]
        speaker: String,
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "")]
        instruct: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Design a voice from a description
    Design {
        #[arg(long)]
        instruct: String,
        #[arg(long)]
        text: String,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Subcommand, Debug)]
enum PersonalityCommand {
    List,
    /// Show the emotion tags of a personality
    Show { name: String },
    /// Build from one clip per emotion
    Create {
        name: String,
        /// TAG=AUDIO=TRANSCRIPT, repeatable
        #[arg(long = "emotion", required = true, value_parser = parse_emotion)]
        emotions: Vec<(String, PathBuf, String)>,
    },
    /// Build from a neutral clip and a voice description
    CreateSmart {
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        neutral: PathBuf,
        /// Offered emotion tag, repeatable
        #[arg(long = "emotion", required = true)]
        emotions: Vec<String>,
        #[arg(long, default_value_t = DEFAULT_CROSSFADE_MS)]
        crossfade_ms: i64,
    },
    Delete { name: String },
}

fn parse_emotion(raw: &str) -> std::result::Result<(String, PathBuf, String), String> {
    let mut parts = raw.splitn(3, '=');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(tag), Some(audio), Some(text)) if !tag.is_empty() && !audio.is_empty() => {
            Ok((tag.to_string(), PathBuf::from(audio), text.to_string()))
        }
        _ => Err(format!("expected TAG=AUDIO=TRANSCRIPT, got '{raw}'")),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = ConsoleConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_server(cli.server);
    init_logging(&config)?;
    debug!(server = %config.server.base_url, "Configuration resolved");

    let api = ApiClient::new(&config.server, config.stream.framing())
        .context("Failed to create HTTP client")?;
    let surface = TerminalSurface::new(api.base_url().clone(), cli.yes);
    let duration = match &cli.command {
        Command::Upload(clip) | Command::Generate { target: GenerateCommand::Manual { clip, .. } } => {
            clip.duration.unwrap_or_default()
        }
        _ => 0.0,
    };
    let mut console = Console::start(api, surface, StaticWaveform::new(duration)).await;

    // Failures below were already reported through the surface.
    let succeeded = match cli.command {
        Command::Status => console.session().status().is_some(),
        Command::Speakers => !console.speakers().is_empty(),
        Command::Switch { model } => console.switch_tab(model).await.is_ok(),
        Command::Upload(clip) => prepare_clip(&mut console, clip).await?,
        Command::Generate { target } => generate(&mut console, target, &config).await?,
        Command::Personality { action } => personality(&mut console, action).await,
    };
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_logging(config: &ConsoleConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.logging.filter)
            .with_context(|| format!("Invalid log filter '{}'", config.logging.filter))?,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to install log subscriber")?;
    Ok(())
}

async fn prepare_clip(console: &mut TerminalConsole, clip: ClipArgs) -> Result<bool> {
    if console.load_asset(&clip.audio).await.is_err() {
        return Ok(false);
    }
    if let (Some(start), Some(end)) = (clip.start, clip.end) {
        let Some(region) = Region::new(start, end) else {
            bail!("Invalid clip {start}s - {end}s");
        };
        if console.adjust_region(region).is_none() {
            bail!("Clip {start}s - {end}s is outside the audio");
        }
    }
    if clip.transcribe {
        return Ok(console.extract_text().await.is_ok());
    }
    Ok(true)
}

async fn generate(console: &mut TerminalConsole, target: GenerateCommand, config: &ConsoleConfig) -> Result<bool> {
    let form = match target {
        GenerateCommand::Manual {
            mut clip,
            text,
            ref_text,
            temperature,
            output,
        } => {
            clip.transcribe = ref_text.is_none();
            if !prepare_clip(console, clip).await? {
                return Ok(false);
            }
            if let Some(ref_text) = ref_text {
                console.set_reference_text(ref_text);
            }
            console.set_mode(GenerationMode::Manual);
            BaseTabInput {
                text,
                ref_text: console.session().reference_text().to_string(),
                options: output.resolve(config),
                temperature,
                ..BaseTabInput::default()
            }
            .into_form(console.session().mode())
        }
        GenerateCommand::Personality {
            personality,
            text,
            tag,
            temperature,
            output,
        } => {
            let mut script = ScriptBuffer::new(text);
            if let Some(tag) = tag {
                let Ok(tags) = console.select_personality(&personality).await else {
                    return Ok(false);
                };
                if !tags.contains(&tag) {
                    bail!("Personality '{personality}' has no emotion '{tag}'");
                }
                script.set_cursor(0);
                script.insert_tag(&tag);
            }
            console.set_mode(GenerationMode::Personality);
            BaseTabInput {
                text: script.into_text(),
                personality,
                options: output.resolve(config),
                temperature,
                ..BaseTabInput::default()
            }
            .into_form(console.session().mode())
        }
        GenerateCommand::Custom {
            speaker,
            text,
            instruct,
            output,
        } => GenerationForm::Custom {
            text,
            speaker_id: speaker,
            instruction: instruct,
            options: output.resolve(config),
        },
        GenerateCommand::Design {
            instruct,
            text,
            output,
        } => GenerationForm::Design {
            text,
            instruction: instruct,
            options: output.resolve(config),
        },
    };
    Ok(console.generate(form).await.is_ok())
}

async fn personality(console: &mut TerminalConsole, action: PersonalityCommand) -> bool {
    let result = match action {
        PersonalityCommand::List => console.refresh_personalities().await,
        PersonalityCommand::Show { name } => console.select_personality(&name).await.map(|_| ()),
        PersonalityCommand::Create { name, emotions } => {
            let mut build = ManualBuild::new(name);
            for (tag, audio, text) in emotions {
                build.add_filled_row(&tag, audio, &text);
            }
            console
                .create_personality(&PersonalityBuilder::manual(build))
                .await
        }
        PersonalityCommand::CreateSmart {
            name,
            description,
            neutral,
            emotions,
            crossfade_ms,
        } => {
            let mut build = SmartBuild::new(name, description, neutral);
            build.crossfade_ms = Some(crossfade_ms);
            for tag in &emotions {
                if let Err(err) = build.toggle_emotion(tag) {
                    console.surface().alert(&err.to_string());
                    return false;
                }
            }
            console
                .create_personality(&PersonalityBuilder::smart(build))
                .await
        }
        PersonalityCommand::Delete { name } => console.delete_personality(&name).await.map(|_| ()),
    };
    result.is_ok()
}
