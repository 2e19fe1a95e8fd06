//! Generation requests and the per-submission state machine.
//!
//! A submission runs `Idle -> Validating -> AwaitingModel -> Streaming` and ends in
//! `Succeeded` or `Failed`. Validation issues no network call; the model switch
//! completes before the generation request is sent.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::api::ApiClient;
use crate::config::GenerationDefaults;
use crate::error::{ConsoleError, Result};
use crate::model::ensure_model;
use crate::segment::Region;
use crate::session::{GenerationMode, ModelKind, Session};
use crate::surface::{ActionsGuard, BusyGuard, ConsoleSurface};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = ConsoleError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wav" => Ok(Self::Wav),
            "mp3" => Ok(Self::Mp3),
            other => Err(ConsoleError::validation(format!("Unsupported audio format: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputOptions {
    pub language: String,
    pub format: AudioFormat,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self::from(&GenerationDefaults::default())
    }
}

impl From<&GenerationDefaults> for OutputOptions {
    fn from(defaults: &GenerationDefaults) -> Self {
        Self {
            language: defaults.language.clone(),
            format: defaults.format,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationForm {
    Manual {
        text: String,
        ref_text: String,
        options: OutputOptions,
        temperature: Option<f32>,
    },
    Personality {
        text: String,
        personality: String,
        options: OutputOptions,
        temperature: Option<f32>,
    },
    Custom {
        text: String,
        speaker_id: String,
        instruction: String,
        options: OutputOptions,
    },
    Design {
        text: String,
        instruction: String,
        options: OutputOptions,
    },
}

#[derive(Debug, Clone, Default)]
pub struct BaseTabInput {
    pub text: String,
    pub ref_text: String,
    pub personality: String,
    pub options: OutputOptions,
    pub temperature: Option<f32>,
}

impl BaseTabInput {
    pub fn into_form(self, mode: GenerationMode) -> GenerationForm {
        match mode {
            GenerationMode::Manual => GenerationForm::Manual {
                text: self.text,
                ref_text: self.ref_text,
                options: self.options,
                temperature: self.temperature,
            },
            GenerationMode::Personality => GenerationForm::Personality {
                text: self.text,
                personality: self.personality,
                options: self.options,
                temperature: self.temperature,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationRequest {
    Manual {
        text: String,
        ref_text: String,
        ref_asset_path: String,
        region: Option<Region>,
        options: OutputOptions,
        temperature: Option<f32>,
    },
    PersonalityBased {
        text: String,
        personality_name: String,
        options: OutputOptions,
        temperature: Option<f32>,
    },
    CustomSpeaker {
        text: String,
        speaker_id: String,
        instruction: String,
        options: OutputOptions,
    },
    DesignedVoice {
        text: String,
        instruction: String,
        options: OutputOptions,
    },
}

fn required(value: &str, message: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        Err(ConsoleError::validation(message))
    } else {
        Ok(value.to_string())
    }
}

fn check_temperature(temperature: Option<f32>) -> Result<Option<f32>> {
    match temperature {
        Some(value) if !(value.is_finite() && value > 0.0) => Err(ConsoleError::validation(
            "Temperature must be a positive number",
        )),
        other => Ok(other),
    }
}

impl GenerationRequest {
    /// Checks the mode-specific required fields. The manual form also needs an
    /// uploaded reference asset; the current region is attached when one exists.
    pub fn validate(form: GenerationForm, session: &Session) -> Result<Self> {
        match form {
            GenerationForm::Manual {
                text,
                ref_text,
                options,
                temperature,
            } => {
                let text = required(&text, "Enter the text to synthesize")?;
                let ref_text = required(&ref_text, "Enter the transcript of the reference audio")?;
                let asset = session
                    .uploaded_asset()
                    .ok_or_else(|| ConsoleError::validation("Upload a reference audio first"))?;
                Ok(Self::Manual {
                    text,
                    ref_text,
                    ref_asset_path: asset.server_path.clone(),
                    region: session.selected_region(),
                    options,
                    temperature: check_temperature(temperature)?,
                })
            }
            GenerationForm::Personality {
                text,
                personality,
                options,
                temperature,
            } => Ok(Self::PersonalityBased {
                text: required(&text, "Enter the text to synthesize")?,
                personality_name: required(&personality, "Select a personality first")?,
                options,
                temperature: check_temperature(temperature)?,
            }),
            GenerationForm::Custom {
                text,
                speaker_id,
                instruction,
                options,
            } => Ok(Self::CustomSpeaker {
                text: required(&text, "Enter the text to synthesize")?,
                speaker_id: required(&speaker_id, "Select a speaker")?,
                instruction: instruction.trim().to_string(),
                options,
            }),
            GenerationForm::Design {
                text,
                instruction,
                options,
            } => Ok(Self::DesignedVoice {
                text: required(&text, "Enter the text to synthesize")?,
                instruction: required(&instruction, "Enter both the voice description and the text")?,
                options,
            }),
        }
    }

    pub fn expected_model(&self) -> ModelKind {
        match self {
            Self::Manual { .. } | Self::PersonalityBased { .. } => ModelKind::Base,
            Self::CustomSpeaker { .. } => ModelKind::Custom,
            Self::DesignedVoice { .. } => ModelKind::Design,
        }
    }

    pub fn options(&self) -> &OutputOptions {
        match self {
            Self::Manual { options, .. }
            | Self::PersonalityBased { options, .. }
            | Self::CustomSpeaker { options, .. }
            | Self::DesignedVoice { options, .. } => options,
        }
    }

    pub fn to_payload(&self) -> Value {
        let options = self.options();
        let mut map = Map::new();
        map.insert("expected_model".into(), json!(self.expected_model().as_str()));
        map.insert("language".into(), json!(options.language));
        map.insert("format".into(), json!(options.format.extension()));

        match self {
            Self::Manual {
                text,
                ref_text,
                ref_asset_path,
                region,
                temperature,
                ..
            } => {
                map.insert("text".into(), json!(text));
                map.insert("ref_text".into(), json!(ref_text));
                map.insert("ref_audio".into(), json!(ref_asset_path));
                if let Some(region) = region {
                    map.insert("start_time".into(), json!(region.start()));
                    map.insert("end_time".into(), json!(region.end()));
                }
                insert_temperature(&mut map, *temperature);
            }
            Self::PersonalityBased {
                text,
                personality_name,
                temperature,
                ..
            } => {
                map.insert("mode".into(), json!("personality"));
                map.insert("text".into(), json!(text));
                map.insert("personality".into(), json!(personality_name));
                insert_temperature(&mut map, *temperature);
            }
            Self::CustomSpeaker {
                text,
                speaker_id,
                instruction,
                ..
            } => {
                map.insert("text".into(), json!(text));
                map.insert("speaker".into(), json!(speaker_id));
                map.insert("instruct".into(), json!(instruction));
            }
            Self::DesignedVoice {
                text, instruction, ..
            } => {
                map.insert("text".into(), json!(text));
                map.insert("instruct".into(), json!(instruction));
            }
        }
        Value::Object(map)
    }
}

fn insert_temperature(map: &mut Map<String, Value>, temperature: Option<f32>) {
    if let Some(value) = temperature {
        map.insert("temperature".into(), json!(value));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutput {
    pub audio_url: String,
    pub file_name: String,
    pub download_name: String,
}

impl GenerationOutput {
    pub fn new(audio_url: impl Into<String>, format: AudioFormat) -> Self {
        let audio_url = audio_url.into();
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or_default();
        Self {
            file_name: file_name_of(&audio_url),
            download_name: format!("qwen-tts-{millis}.{}", format.extension()),
            audio_url,
        }
    }
}

fn file_name_of(reference: &str) -> String {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(path)
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum GenerationPhase {
    #[default]
    Idle,
    Validating,
    AwaitingModel,
    Streaming,
    Succeeded(GenerationOutput),
    Failed(String),
}

#[derive(Debug, Default)]
pub struct GenerationOrchestrator {
    phase: GenerationPhase,
}

impl GenerationOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &GenerationPhase {
        &self.phase
    }

    pub async fn submit<S: ConsoleSurface + ?Sized>(
        &mut self,
        api: &ApiClient,
        session: &mut Session,
        surface: &S,
        form: GenerationForm,
    ) -> Result<GenerationOutput> {
        let _actions = ActionsGuard::disable(surface);
        let result = self.run(api, session, surface, form).await;
        match &result {
            Ok(output) => {
                info!(audio = %output.audio_url, "Generation finished");
                self.phase = GenerationPhase::Succeeded(output.clone());
                surface.present_output(output);
            }
            Err(err) => {
                self.phase = GenerationPhase::Failed(err.to_string());
                surface.alert(&err.to_string());
            }
        }
        result
    }

    async fn run<S: ConsoleSurface + ?Sized>(
        &mut self,
        api: &ApiClient,
        session: &mut Session,
        surface: &S,
        form: GenerationForm,
    ) -> Result<GenerationOutput> {
        self.phase = GenerationPhase::Validating;
        let request = GenerationRequest::validate(form, session)?;

        let _busy = BusyGuard::show(surface, "Initializing...", true);
        self.phase = GenerationPhase::AwaitingModel;
        if ensure_model(api, session, request.expected_model()).await? {
            if let Some(status) = session.status() {
                surface.show_status(status);
            }
        }

        self.phase = GenerationPhase::Streaming;
        info!(model = %request.expected_model(), "Starting generation");
        let stream = api.generate_stream(&request.to_payload()).await?;
        let result_ref = stream
            .run_to_completion(|progress| surface.show_progress(progress))
            .await?;
        let audio_url = result_ref.ok_or_else(|| {
            ConsoleError::Stream("Generation finished without an audio file".to_string())
        })?;
        Ok(GenerationOutput::new(audio_url, request.options().format))
    }
}
