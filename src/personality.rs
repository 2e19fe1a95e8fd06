//! Personality lifecycle: manual and smart builds, listing, selection, tag insertion
//! and deletion.

use std::path::PathBuf;

use reqwest::multipart::Form;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{audio_part, ApiClient, PersonalitySummary};
use crate::error::{ConsoleError, Result};
use crate::surface::{BuilderGuard, BusyGuard, ConsoleSurface};

pub const OFFERED_EMOTIONS: [&str; 8] = [
    "happy",
    "sad",
    "angry",
    "surprised",
    "fearful",
    "calm",
    "excited",
    "whispering",
];

/// The hybrid reference is built from fixed 5 s segments; the crossfade must be
/// shorter than one segment.
pub const MAX_CROSSFADE_MS: i64 = 5000;

pub const DEFAULT_CROSSFADE_MS: i64 = 250;

#[derive(Debug, Clone, PartialEq)]
pub struct EmotionRow {
    id: Uuid,
    pub tag: String,
    pub audio: Option<PathBuf>,
    pub ref_text: String,
}

impl EmotionRow {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManualBuild {
    pub name: String,
    rows: Vec<EmotionRow>,
}

impl ManualBuild {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.rows.push(EmotionRow {
            id,
            tag: String::new(),
            audio: None,
            ref_text: String::new(),
        });
        id
    }

    pub fn add_filled_row(&mut self, tag: &str, audio: PathBuf, ref_text: &str) -> Uuid {
        let id = self.add_row();
        if let Some(row) = self.row_mut(id) {
            row.tag = tag.to_string();
            row.audio = Some(audio);
            row.ref_text = ref_text.to_string();
        }
        id
    }

    pub fn row_mut(&mut self, id: Uuid) -> Option<&mut EmotionRow> {
        self.rows.iter_mut().find(|row| row.id == id)
    }

    pub fn remove_row(&mut self, id: Uuid) -> bool {
        let before = self.rows.len();
        self.rows.retain(|row| row.id != id);
        self.rows.len() != before
    }

    pub fn rows(&self) -> &[EmotionRow] {
        &self.rows
    }

    /// Checks every row before anything is sent; the first bad row aborts the build.
    fn validate(&self) -> Result<(String, Vec<(String, PathBuf, String)>)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ConsoleError::validation("Enter a personality name"));
        }
        if self.rows.is_empty() {
            return Err(ConsoleError::validation("Add at least one emotion"));
        }

        let mut entries: Vec<(String, PathBuf, String)> = Vec::with_capacity(self.rows.len());
        for (index, row) in self.rows.iter().enumerate() {
            let number = index + 1;
            let tag = row.tag.trim();
            if tag.is_empty() {
                return Err(ConsoleError::validation(format!("Emotion #{number}: tag is missing")));
            }
            if entries.iter().any(|(known, _, _)| known == tag) {
                return Err(ConsoleError::validation(format!(
                    "Emotion #{number}: tag '{tag}' is used twice"
                )));
            }
            let Some(audio) = row.audio.clone() else {
                return Err(ConsoleError::validation(format!(
                    "Emotion #{number} ({tag}): audio file is missing"
                )));
            };
            let ref_text = row.ref_text.trim();
            if ref_text.is_empty() {
                return Err(ConsoleError::validation(format!(
                    "Emotion #{number} ({tag}): reference text is missing"
                )));
            }
            entries.push((tag.to_string(), audio, ref_text.to_string()));
        }
        Ok((name.to_string(), entries))
    }

    async fn into_form(&self) -> Result<Form> {
        let (name, entries) = self.validate()?;
        let manifest: Vec<_> = entries
            .iter()
            .map(|(tag, _, ref_text)| json!({ "tag": tag, "ref_text": ref_text }))
            .collect();

        let mut form = Form::new()
            .text("name", name)
            .text("emotions", serde_json::Value::Array(manifest).to_string());
        for (tag, audio, _) in &entries {
            form = form.part(format!("audio_{tag}"), audio_part(audio).await?);
        }
        Ok(form)
    }
}

#[derive(Debug, Clone)]
pub struct SmartBuild {
    pub name: String,
    pub voice_description: String,
    pub neutral_audio: Option<PathBuf>,
    emotions: Vec<String>,
    pub crossfade_ms: Option<i64>,
}

impl Default for SmartBuild {
    fn default() -> Self {
        Self {
            name: String::new(),
            voice_description: String::new(),
            neutral_audio: None,
            emotions: Vec::new(),
            crossfade_ms: Some(DEFAULT_CROSSFADE_MS),
        }
    }
}

impl SmartBuild {
    pub fn new(name: impl Into<String>, voice_description: impl Into<String>, neutral_audio: PathBuf) -> Self {
        Self {
            name: name.into(),
            voice_description: voice_description.into(),
            neutral_audio: Some(neutral_audio),
            ..Self::default()
        }
    }

    pub fn toggle_emotion(&mut self, tag: &str) -> Result<bool> {
        if !OFFERED_EMOTIONS.contains(&tag) {
            return Err(ConsoleError::validation(format!("Unknown emotion: {tag}")));
        }
        if let Some(index) = self.emotions.iter().position(|known| known == tag) {
            self.emotions.remove(index);
            Ok(false)
        } else {
            self.emotions.push(tag.to_string());
            Ok(true)
        }
    }

    pub fn emotions(&self) -> &[String] {
        &self.emotions
    }

    async fn into_form(&self) -> Result<Form> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ConsoleError::validation("Enter a personality name"));
        }
        let description = self.voice_description.trim();
        if description.is_empty() {
            return Err(ConsoleError::validation("Enter a voice description"));
        }
        let Some(neutral) = &self.neutral_audio else {
            return Err(ConsoleError::validation("Choose a neutral reference audio"));
        };
        if self.emotions.is_empty() {
            return Err(ConsoleError::validation("Select at least one emotion"));
        }
        let crossfade = match self.crossfade_ms {
            Some(value) if (0..MAX_CROSSFADE_MS).contains(&value) => value,
            Some(_) => {
                return Err(ConsoleError::validation(format!(
                    "Crossfade must be between 0 and {} ms",
                    MAX_CROSSFADE_MS - 1
                )))
            }
            None => return Err(ConsoleError::validation("Enter a crossfade duration")),
        };

        Ok(Form::new()
            .text("name", name.to_string())
            .text("voice_description", description.to_string())
            .part("audio_neutro", audio_part(neutral).await?)
            .text("emotions", json!(self.emotions).to_string())
            .text("crossfade_ms", crossfade.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuilderMode {
    #[default]
    Manual,
    Smart,
}

#[derive(Debug, Clone, Default)]
pub struct PersonalityBuilder {
    pub mode: BuilderMode,
    pub manual: ManualBuild,
    pub smart: SmartBuild,
}

impl PersonalityBuilder {
    pub fn manual(build: ManualBuild) -> Self {
        Self {
            mode: BuilderMode::Manual,
            manual: build,
            ..Self::default()
        }
    }

    pub fn smart(build: SmartBuild) -> Self {
        Self {
            mode: BuilderMode::Smart,
            smart: build,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptBuffer {
    text: String,
    cursor: usize,
}

impl ScriptBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.chars().count();
        Self { text, cursor }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, position: usize) {
        self.cursor = position.min(self.text.chars().count());
    }

    /// Writes `[tag] ` at the cursor and leaves the cursor right after it.
    pub fn insert_tag(&mut self, tag: &str) {
        let marker = format!("[{tag}] ");
        let offset = self
            .text
            .char_indices()
            .nth(self.cursor)
            .map(|(byte, _)| byte)
            .unwrap_or(self.text.len());
        self.text.insert_str(offset, &marker);
        self.cursor += marker.chars().count();
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[derive(Debug, Default)]
pub struct PersonalityWorkflow {
    personalities: Vec<PersonalitySummary>,
    selected: Option<String>,
    tags: Vec<String>,
}

impl PersonalityWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn personalities(&self) -> &[PersonalitySummary] {
        &self.personalities
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub async fn refresh<S: ConsoleSurface + ?Sized>(&mut self, api: &ApiClient, surface: &S) -> Result<()> {
        match api.list_personalities().await {
            Ok(mut personalities) => {
                personalities.sort_by(|a, b| a.name.cmp(&b.name));
                self.personalities = personalities;
                surface.show_personalities(&self.personalities);
                Ok(())
            }
            Err(err) => {
                surface.alert(&err.to_string());
                Err(err)
            }
        }
    }

    pub async fn create<S: ConsoleSurface + ?Sized>(
        &mut self,
        api: &ApiClient,
        surface: &S,
        builder: &PersonalityBuilder,
    ) -> Result<()> {
        let result = match builder.mode {
            BuilderMode::Manual => create_manual(api, surface, &builder.manual).await,
            BuilderMode::Smart => create_smart(api, surface, &builder.smart).await,
        };
        if let Err(err) = &result {
            surface.alert(&err.to_string());
            return result;
        }

        surface.close_builder();
        if let Err(err) = self.refresh(api, surface).await {
            warn!(error = %err, "Personality created but the list could not be reloaded");
        }
        Ok(())
    }

    pub async fn select<S: ConsoleSurface + ?Sized>(
        &mut self,
        api: &ApiClient,
        surface: &S,
        name: &str,
    ) -> Result<Vec<String>> {
        let details = match api.personality_details(name).await {
            Ok(details) => details,
            Err(err) => {
                surface.alert(&err.to_string());
                return Err(err);
            }
        };
        self.selected = Some(name.to_string());
        self.tags = details.tags();
        surface.show_tag_toolbar(&self.tags);
        Ok(self.tags.clone())
    }

    pub fn clear_selection<S: ConsoleSurface + ?Sized>(&mut self, surface: &S) {
        self.selected = None;
        self.tags.clear();
        surface.show_tag_toolbar(&[]);
    }

    /// Deletes after an explicit confirmation. `Ok(false)` means the operator declined
    /// and nothing was sent.
    pub async fn delete<S: ConsoleSurface + ?Sized>(
        &mut self,
        api: &ApiClient,
        surface: &S,
        name: &str,
    ) -> Result<bool> {
        if !surface.confirm(&format!("Delete personality '{name}'?")) {
            return Ok(false);
        }

        if let Err(err) = api.delete_personality(name).await {
            let err = ConsoleError::Delete(err.message());
            surface.alert(&err.message());
            return Err(err);
        }
        info!(personality = name, "Deleted personality");

        self.clear_selection(surface);
        if let Err(err) = self.refresh(api, surface).await {
            warn!(error = %err, "Personality deleted but the list could not be reloaded");
        }
        Ok(true)
    }
}

async fn create_manual<S: ConsoleSurface + ?Sized>(
    api: &ApiClient,
    surface: &S,
    build: &ManualBuild,
) -> Result<()> {
    let form = build.into_form().await?;
    let save = BuilderGuard::start(surface, "Saving...");
    let _busy = BusyGuard::show(surface, "Creating personality...", false);

    let response = api.create_personality(form).await?;
    if !response.success {
        return Err(ConsoleError::Server("Personality was not created".to_string()));
    }
    save.complete();
    info!(personality = build.name.trim(), emotions = build.rows().len(), "Created personality");
    Ok(())
}

async fn create_smart<S: ConsoleSurface + ?Sized>(
    api: &ApiClient,
    surface: &S,
    build: &SmartBuild,
) -> Result<()> {
    let form = build.into_form().await?;
    let guard = BuilderGuard::start(surface, "Starting...");

    let stream = api.create_smart_personality(form).await?;
    stream
        .run_to_completion(|progress| surface.show_builder_progress(progress.percent, &progress.stage))
        .await?;
    surface.show_builder_progress(100, "Completed");
    guard.complete();
    info!(personality = build.name.trim(), emotions = build.emotions().len(), "Smart build finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_tag_at_cursor_moves_cursor_after_marker() {
        let mut script = ScriptBuffer::new("Hello world");
        script.set_cursor(6);
        script.insert_tag("happy");
        assert_eq!(script.text(), "Hello [happy] world");
        assert_eq!(script.cursor(), 14);

        script.insert_tag("sad");
        assert_eq!(script.text(), "Hello [happy] [sad] world");
    }

    #[test]
    fn insert_tag_counts_characters_not_bytes() {
        let mut script = ScriptBuffer::new("perché sì");
        script.set_cursor(7);
        script.insert_tag("calm");
        assert_eq!(script.text(), "perché [calm] sì");
        assert_eq!(script.cursor(), 14);
    }

    #[test]
    fn insert_tag_into_empty_script() {
        let mut script = ScriptBuffer::default();
        script.insert_tag("angry");
        assert_eq!(script.into_text(), "[angry] ");
    }

    #[test]
    fn rows_are_removable_independently() {
        let mut build = ManualBuild::new("Marco");
        let first = build.add_row();
        let second = build.add_row();
        let third = build.add_row();

        assert!(build.remove_row(second));
        assert!(!build.remove_row(second));
        let ids: Vec<_> = build.rows().iter().map(EmotionRow::id).collect();
        assert_eq!(ids, vec![first, third]);
    }

    #[test]
    fn one_bad_row_fails_the_manual_build() {
        let mut build = ManualBuild::new("Marco");
        build.add_filled_row("happy", PathBuf::from("happy.wav"), "Che bello!");
        let id = build.add_row();
        if let Some(row) = build.row_mut(id) {
            row.tag = "sad".to_string();
            row.audio = Some(PathBuf::from("sad.wav"));
        }

        let err = build.validate().unwrap_err();
        assert_eq!(err.to_string(), "Emotion #2 (sad): reference text is missing");
    }

    #[test]
    fn manual_build_needs_name_and_rows() {
        assert!(ManualBuild::new("  ").validate().is_err());
        assert_eq!(
            ManualBuild::new("Marco").validate().unwrap_err().to_string(),
            "Add at least one emotion"
        );
    }

    #[test]
    fn duplicate_tags_are_rejected() {
        let mut build = ManualBuild::new("Marco");
        build.add_filled_row("happy", PathBuf::from("a.wav"), "one");
        build.add_filled_row("happy", PathBuf::from("b.wav"), "two");
        assert!(build.validate().unwrap_err().to_string().contains("used twice"));
    }

    #[test]
    fn toggle_only_accepts_offered_emotions() {
        let mut build = SmartBuild::default();
        assert!(build.toggle_emotion("happy").unwrap());
        assert!(build.toggle_emotion("sad").unwrap());
        assert!(!build.toggle_emotion("happy").unwrap());
        assert_eq!(build.emotions(), ["sad".to_string()]);
        assert!(build.toggle_emotion("bored").is_err());
    }

    #[tokio::test]
    async fn smart_build_rejects_out_of_range_crossfade() {
        let mut build = SmartBuild {
            name: "Marco".to_string(),
            voice_description: "warm baritone".to_string(),
            neutral_audio: Some(PathBuf::from("neutral.wav")),
            crossfade_ms: Some(MAX_CROSSFADE_MS),
            ..SmartBuild::default()
        };
        build.toggle_emotion("happy").unwrap();
        assert!(build.into_form().await.unwrap_err().is_validation());

        build.crossfade_ms = Some(-1);
        assert!(build.into_form().await.unwrap_err().is_validation());

        build.crossfade_ms = None;
        assert!(build.into_form().await.unwrap_err().is_validation());
    }
}
