//! Shared fixtures for the integration tests: a recording surface, a fake waveform
//! and a client bound to a mock server.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::io::Write;
use std::path::Path;

use qwen_voice_console::api::{PersonalitySummary, StatusSummary};
use qwen_voice_console::config::ServerConfig;
use qwen_voice_console::segment::{RegionId, RegionSummary};
use qwen_voice_console::stream::{Framing, Progress};
use qwen_voice_console::{ApiClient, ConsoleSurface, GenerationOutput, ModelKind, Region, WaveformWidget};
use tempfile::NamedTempFile;
use wiremock::MockServer;

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Busy(String),
    HideBusy,
    Progress(u8, String),
    Actions(bool),
    Alert(String),
    Confirm(String),
    Status(String),
    ActiveTab(ModelKind),
    ExtractEnabled(bool),
    RegionInfo(String),
    ReferenceText(String),
    Output(GenerationOutput),
    Personalities(Vec<String>),
    Toolbar(Vec<String>),
    BuilderProgress(u8, String),
    BuilderSave(bool),
    CloseBuilder,
}

/// Records every call; confirmations are answered with a preset value.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    events: RefCell<Vec<UiEvent>>,
    confirm_answer: Cell<bool>,
}

impl RecordingSurface {
    pub fn answering(confirm: bool) -> Self {
        let surface = Self::default();
        surface.confirm_answer.set(confirm);
        surface
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.borrow().clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                UiEvent::Alert(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn progress_values(&self) -> Vec<u8> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                UiEvent::Progress(percent, _) => Some(*percent),
                _ => None,
            })
            .collect()
    }

    /// Every busy overlay shown was hidden again.
    pub fn busy_balanced(&self) -> bool {
        let events = self.events.borrow();
        let shown = events.iter().filter(|e| matches!(e, UiEvent::Busy(_))).count();
        let hidden = events.iter().filter(|e| matches!(e, UiEvent::HideBusy)).count();
        shown == hidden
    }

    pub fn last_actions_state(&self) -> Option<bool> {
        self.events.borrow().iter().rev().find_map(|event| match event {
            UiEvent::Actions(enabled) => Some(*enabled),
            _ => None,
        })
    }

    pub fn last_builder_progress(&self) -> Option<(u8, String)> {
        self.events.borrow().iter().rev().find_map(|event| match event {
            UiEvent::BuilderProgress(percent, stage) => Some((*percent, stage.clone())),
            _ => None,
        })
    }

    pub fn last_builder_save(&self) -> Option<bool> {
        self.events.borrow().iter().rev().find_map(|event| match event {
            UiEvent::BuilderSave(enabled) => Some(*enabled),
            _ => None,
        })
    }

    pub fn contains(&self, wanted: &UiEvent) -> bool {
        self.events.borrow().iter().any(|event| event == wanted)
    }

    fn push(&self, event: UiEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl ConsoleSurface for RecordingSurface {
    fn show_busy(&self, label: &str, _with_progress: bool) {
        self.push(UiEvent::Busy(label.to_string()));
    }

    fn hide_busy(&self) {
        self.push(UiEvent::HideBusy);
    }

    fn show_progress(&self, progress: &Progress) {
        self.push(UiEvent::Progress(progress.percent, progress.stage.clone()));
    }

    fn set_actions_enabled(&self, enabled: bool) {
        self.push(UiEvent::Actions(enabled));
    }

    fn alert(&self, message: &str) {
        self.push(UiEvent::Alert(message.to_string()));
    }

    fn confirm(&self, prompt: &str) -> bool {
        self.push(UiEvent::Confirm(prompt.to_string()));
        self.confirm_answer.get()
    }

    fn show_status(&self, status: &StatusSummary) {
        self.push(UiEvent::Status(status.to_string()));
    }

    fn show_active_tab(&self, model: ModelKind) {
        self.push(UiEvent::ActiveTab(model));
    }

    fn set_extract_enabled(&self, enabled: bool) {
        self.push(UiEvent::ExtractEnabled(enabled));
    }

    fn show_region_info(&self, summary: &RegionSummary) {
        self.push(UiEvent::RegionInfo(summary.to_string()));
    }

    fn set_reference_text(&self, text: &str) {
        self.push(UiEvent::ReferenceText(text.to_string()));
    }

    fn present_output(&self, output: &GenerationOutput) {
        self.push(UiEvent::Output(output.clone()));
    }

    fn show_personalities(&self, personalities: &[PersonalitySummary]) {
        self.push(UiEvent::Personalities(
            personalities.iter().map(|p| p.name.clone()).collect(),
        ));
    }

    fn show_tag_toolbar(&self, tags: &[String]) {
        self.push(UiEvent::Toolbar(tags.to_vec()));
    }

    fn show_builder_progress(&self, percent: u8, stage: &str) {
        self.push(UiEvent::BuilderProgress(percent, stage.to_string()));
    }

    fn set_builder_save_enabled(&self, enabled: bool) {
        self.push(UiEvent::BuilderSave(enabled));
    }

    fn close_builder(&self) {
        self.push(UiEvent::CloseBuilder);
    }
}

/// Waveform with a fixed duration that tracks live region ids.
#[derive(Debug, Default)]
pub struct FakeWaveform {
    pub duration: f64,
    pub loaded: Option<String>,
    pub live: Vec<RegionId>,
    pub redrawn: Vec<(RegionId, Region)>,
    next_id: RegionId,
}

impl FakeWaveform {
    pub fn with_duration(duration: f64) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }
}

impl WaveformWidget for FakeWaveform {
    fn load(&mut self, asset: &Path) {
        self.loaded = Some(asset.display().to_string());
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn add_region(&mut self, _region: Region) -> RegionId {
        self.next_id += 1;
        self.live.push(self.next_id);
        self.next_id
    }

    fn update_region(&mut self, id: RegionId, region: Region) {
        self.redrawn.push((id, region));
    }

    fn remove_region(&mut self, id: RegionId) {
        self.live.retain(|known| *known != id);
    }

    fn clear_regions(&mut self) {
        self.live.clear();
    }
}

pub fn api_for(server: &MockServer) -> ApiClient {
    let config = ServerConfig {
        base_url: server.uri(),
        request_timeout_secs: 10,
        connect_timeout_secs: 5,
    };
    ApiClient::new(&config, Framing::Buffered).unwrap()
}

/// Small on-disk file with an audio extension.
pub fn audio_file(name_hint: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix(name_hint)
        .suffix(".wav")
        .tempfile()
        .unwrap();
    file.write_all(b"RIFF\x24\x00\x00\x00WAVEfmt ").unwrap();
    file.flush().unwrap();
    file
}

/// Joins `data: <json>` records the way the backend streams them.
pub fn event_stream(records: &[serde_json::Value]) -> String {
    records
        .iter()
        .map(|record| format!("data: {record}\n\n"))
        .collect()
}

pub async fn requests_to(server: &MockServer, wanted_path: &str) -> Vec<wiremock::Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == wanted_path)
        .collect()
}
