//! Typed HTTP boundary to the synthesis backend.
//!
//! Every endpoint gets an explicit request/response shape; nothing outside this module
//! touches raw JSON from the server except the stream decoder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::{ConsoleError, Result};
use crate::session::ModelKind;
use crate::stream::{EventStream, Framing};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    #[serde(default)]
    pub model_loaded: Option<String>,
    #[serde(default)]
    pub vram_used_gb: f64,
}

impl StatusSummary {
    pub fn model_label(&self) -> String {
        match self.model_loaded.as_deref() {
            Some(model) if !model.is_empty() => format!("Model: {model}"),
            _ => "No model".to_string(),
        }
    }

    pub fn vram_label(&self) -> String {
        format!("VRAM: {} GB", self.vram_used_gb)
    }
}

impl fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.model_label(), self.vram_label())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Speaker {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub lang: String,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.gender, self.lang)
    }
}

#[derive(Debug, Deserialize)]
pub struct SwitchModelResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub status: Option<StatusSummary>,
}

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscribeRequest<'a> {
    pub filename: &'a str,
    pub start: f64,
    pub end: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct TranscribeResponse {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PersonalitySummary {
    pub name: String,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub emotion_count: usize,
}

impl PersonalitySummary {
    pub fn display_name(&self) -> &str {
        self.original_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Deserialize)]
struct PersonalityListResponse {
    #[serde(default)]
    personalities: Vec<PersonalitySummary>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmotionEntry {
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub ref_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PersonalityDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub emotions: BTreeMap<String, EmotionEntry>,
}

impl PersonalityDetails {
    pub fn tags(&self) -> Vec<String> {
        self.emotions.keys().cloned().collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePersonalityResponse {
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    framing: Framing,
}

impl ApiClient {
    pub fn new(config: &ServerConfig, framing: Framing) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim())
            .map_err(|err| ConsoleError::Config(format!("Invalid server URL {}: {err}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ConsoleError::Config(format!(
                "Server URL cannot be used as a base: {base_url}"
            )));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url,
            framing,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn status(&self) -> Result<StatusSummary> {
        self.request_json(Method::GET, &["status"], None).await
    }

    pub async fn speakers(&self) -> Result<Vec<Speaker>> {
        self.request_json(Method::GET, &["speakers"], None).await
    }

    pub async fn switch_model(&self, model: ModelKind) -> Result<SwitchModelResponse> {
        let body = serde_json::json!({ "model_type": model.as_str() });
        self.request_json(Method::POST, &["switch_model"], Some(&body)).await
    }

    pub async fn upload_temp(&self, asset: &Path) -> Result<UploadResponse> {
        let form = Form::new().part("file", audio_part(asset).await?);
        self.send_multipart(&["upload_temp"], form).await
    }

    pub async fn transcribe(&self, request: &TranscribeRequest<'_>) -> Result<TranscribeResponse> {
        let body = serde_json::to_value(request)
            .map_err(|err| ConsoleError::Server(format!("Failed to encode transcription request: {err}")))?;
        self.request_json(Method::POST, &["transcribe"], Some(&body)).await
    }

    pub async fn generate_stream(&self, body: &Value) -> Result<EventStream> {
        let url = self.endpoint(&["generate_stream"])?;
        debug!(%url, "Opening generation stream");
        let response = self.http.post(url.clone()).json(body).send().await?;
        self.open_stream(url, response).await
    }

    pub async fn list_personalities(&self) -> Result<Vec<PersonalitySummary>> {
        let response: PersonalityListResponse = self
            .request_json(Method::GET, &["personality", "list"], None)
            .await?;
        Ok(response.personalities)
    }

    pub async fn personality_details(&self, name: &str) -> Result<PersonalityDetails> {
        self.request_json(Method::GET, &["personality", name], None).await
    }

    pub async fn delete_personality(&self, name: &str) -> Result<()> {
        let _: Value = self
            .request_json(Method::DELETE, &["personality", name], None)
            .await?;
        Ok(())
    }

    pub async fn create_personality(&self, form: Form) -> Result<CreatePersonalityResponse> {
        self.send_multipart(&["personality", "create"], form).await
    }

    pub async fn create_smart_personality(&self, form: Form) -> Result<EventStream> {
        let url = self.endpoint(&["personality", "create_smart"])?;
        debug!(%url, "Opening smart-build stream");
        let response = self.http.post(url.clone()).multipart(form).send().await?;
        self.open_stream(url, response).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConsoleError::Config(format!("Server URL cannot be used as a base: {}", self.base_url)))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&Value>,
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        let mut request = self.http.request(method, url.clone());
        if let Some(payload) = body {
            request = request.json(payload);
        }
        let response = request.send().await?;
        read_json(url, response).await
    }

    async fn send_multipart<T: DeserializeOwned>(&self, segments: &[&str], form: Form) -> Result<T> {
        let url = self.endpoint(segments)?;
        let response = self.http.post(url.clone()).multipart(form).send().await?;
        read_json(url, response).await
    }

    async fn open_stream(&self, url: Url, response: Response) -> Result<EventStream> {
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(server_failure(&url, status, &body_text));
        }
        Ok(EventStream::from_response(response, self.framing))
    }
}

/// Backend failures usually carry an `error` field even on non-2xx statuses; that
/// message wins over the bare HTTP status.
async fn read_json<T: DeserializeOwned>(url: Url, response: Response) -> Result<T> {
    let status = response.status();
    let body_text = response.text().await?;
    if !status.is_success() {
        return Err(server_failure(&url, status, &body_text));
    }
    let value: Value = serde_json::from_str(&body_text)
        .map_err(|err| ConsoleError::Server(format!("Failed to decode JSON response for {url}: {err}")))?;
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(ConsoleError::Server(message.to_string()));
    }
    serde_json::from_value(value)
        .map_err(|err| ConsoleError::Server(format!("Unexpected response shape from {url}: {err}")))
}

fn server_failure(url: &Url, status: reqwest::StatusCode, body_text: &str) -> ConsoleError {
    let message = serde_json::from_str::<Value>(body_text)
        .ok()
        .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_string));
    match message {
        Some(message) => ConsoleError::Server(message),
        None => ConsoleError::Server(format!("Request to {url} failed with status {status}: {body_text}")),
    }
}

pub(crate) async fn audio_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("audio.wav")
        .to_string();
    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(audio_mime(path))?;
    Ok(part)
}

fn audio_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        Some("m4a") => "audio/mp4",
        _ => "application/octet-stream",
    }
}
