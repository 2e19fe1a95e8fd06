//! Line-oriented surface for the command-line front end.

use std::io::{self, BufRead, Write};
use std::path::Path;

use reqwest::Url;

use crate::api::{PersonalitySummary, Speaker, StatusSummary};
use crate::generation::GenerationOutput;
use crate::segment::{Region, RegionId, RegionSummary, WaveformWidget};
use crate::session::ModelKind;
use crate::stream::Progress;
use crate::surface::ConsoleSurface;

#[derive(Debug)]
pub struct TerminalSurface {
    assume_yes: bool,
    base_url: Url,
}

impl TerminalSurface {
    pub fn new(base_url: Url, assume_yes: bool) -> Self {
        Self {
            assume_yes,
            base_url,
        }
    }

    /// Server-relative result references resolve against the server root.
    fn audio_location(&self, reference: &str) -> String {
        match self.base_url.join(reference) {
            Ok(url) => url.to_string(),
            Err(_) => reference.to_string(),
        }
    }
}

impl ConsoleSurface for TerminalSurface {
    fn show_busy(&self, label: &str, _with_progress: bool) {
        println!("... {label}");
    }

    fn hide_busy(&self) {}

    fn show_progress(&self, progress: &Progress) {
        println!(
            "[{:>3}%] {} ({})",
            progress.percent,
            progress.stage,
            progress.eta_label()
        );
    }

    fn set_actions_enabled(&self, _enabled: bool) {}

    fn alert(&self, message: &str) {
        eprintln!("Error: {message}");
    }

    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{prompt} [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }

    fn show_status(&self, status: &StatusSummary) {
        println!("{status}");
    }

    fn show_speakers(&self, speakers: &[Speaker]) {
        for speaker in speakers {
            println!("{:<12} {speaker}", speaker.id);
        }
    }

    fn show_active_tab(&self, model: ModelKind) {
        println!("Active model: {model}");
    }

    fn show_region_info(&self, summary: &RegionSummary) {
        println!("Selected clip: {summary}");
    }

    fn set_reference_text(&self, text: &str) {
        if !text.is_empty() {
            println!("Reference text: {text}");
        }
    }

    fn present_output(&self, output: &GenerationOutput) {
        println!("Audio: {}", self.audio_location(&output.audio_url));
        println!("File: {}", output.file_name);
        println!("Save as: {}", output.download_name);
    }

    fn show_personalities(&self, personalities: &[PersonalitySummary]) {
        if personalities.is_empty() {
            println!("No personalities");
        }
        for personality in personalities {
            println!(
                "{:<24} {:<24} {} emotions",
                personality.name,
                personality.display_name(),
                personality.emotion_count
            );
        }
    }

    fn show_tag_toolbar(&self, tags: &[String]) {
        if !tags.is_empty() {
            let markers: Vec<String> = tags.iter().map(|tag| format!("[{tag}]")).collect();
            println!("Tags: {}", markers.join(" "));
        }
    }

    fn show_builder_progress(&self, percent: u8, stage: &str) {
        if !stage.is_empty() {
            println!("[{percent:>3}%] {stage}");
        }
    }

    fn set_builder_save_enabled(&self, _enabled: bool) {}
}

#[derive(Debug, Default)]
pub struct StaticWaveform {
    duration: f64,
    next_id: RegionId,
}

impl StaticWaveform {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            next_id: 0,
        }
    }
}

impl WaveformWidget for StaticWaveform {
    fn load(&mut self, _asset: &Path) {}

    fn duration(&self) -> f64 {
        self.duration
    }

    fn add_region(&mut self, _region: Region) -> RegionId {
        self.next_id += 1;
        self.next_id
    }

    fn update_region(&mut self, _id: RegionId, _region: Region) {}

    fn remove_region(&mut self, _id: RegionId) {}

    fn clear_regions(&mut self) {}
}
