use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::api::StatusSummary;
use crate::error::ConsoleError;
use crate::segment::Region;

const MODEL_BASE: &str = "base";
const MODEL_CUSTOM: &str = "custom";
const MODEL_DESIGN: &str = "design";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Base,
    Custom,
    Design,
}

impl ModelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => MODEL_BASE,
            Self::Custom => MODEL_CUSTOM,
            Self::Design => MODEL_DESIGN,
        }
    }

    /// Maps the server's `model_loaded` value. Anything that is not a synthesis
    /// model (transcription model, null, unknown) means no synthesis model is active.
    pub fn from_loaded(value: Option<&str>) -> Option<Self> {
        value.and_then(|raw| raw.parse().ok())
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            MODEL_BASE => Ok(Self::Base),
            MODEL_CUSTOM => Ok(Self::Custom),
            MODEL_DESIGN => Ok(Self::Design),
            other => Err(ConsoleError::validation(format!("Unknown model type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub server_filename: String,
    pub server_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationMode {
    #[default]
    Manual,
    Personality,
}

#[derive(Debug, Default)]
pub struct Session {
    active_model: Option<ModelKind>,
    uploaded_asset: Option<UploadedAsset>,
    selected_region: Option<Region>,
    mode: GenerationMode,
    reference_text: String,
    status: Option<StatusSummary>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_status(status: StatusSummary) -> Self {
        let mut session = Self::new();
        session.apply_status(status);
        session
    }

    pub fn active_model(&self) -> Option<ModelKind> {
        self.active_model
    }

    pub fn uploaded_asset(&self) -> Option<&UploadedAsset> {
        self.uploaded_asset.as_ref()
    }

    pub fn selected_region(&self) -> Option<Region> {
        self.selected_region
    }

    pub fn mode(&self) -> GenerationMode {
        self.mode
    }

    pub fn reference_text(&self) -> &str {
        &self.reference_text
    }

    pub fn status(&self) -> Option<&StatusSummary> {
        self.status.as_ref()
    }

    pub fn set_mode(&mut self, mode: GenerationMode) {
        self.mode = mode;
    }

    pub fn set_reference_text(&mut self, text: impl Into<String>) {
        self.reference_text = text.into();
    }

    pub fn set_selected_region(&mut self, region: Option<Region>) {
        self.selected_region = region;
    }

    pub(crate) fn commit_model(&mut self, model: ModelKind, status: Option<StatusSummary>) {
        self.active_model = Some(model);
        if let Some(status) = status {
            self.status = Some(status);
        }
    }

    pub(crate) fn invalidate_model(&mut self) {
        self.active_model = None;
    }

    pub(crate) fn apply_status(&mut self, status: StatusSummary) {
        self.active_model = ModelKind::from_loaded(status.model_loaded.as_deref());
        self.status = Some(status);
    }

    pub(crate) fn store_upload(&mut self, asset: UploadedAsset) {
        self.uploaded_asset = Some(asset);
        self.reference_text.clear();
        self.selected_region = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loaded_model_mapping_ignores_non_synthesis_models() {
        assert_eq!(ModelKind::from_loaded(Some("base")), Some(ModelKind::Base));
        assert_eq!(ModelKind::from_loaded(Some("design")), Some(ModelKind::Design));
        assert_eq!(ModelKind::from_loaded(Some("whisper")), None);
        assert_eq!(ModelKind::from_loaded(None), None);
    }

    #[test]
    fn store_upload_clears_reference_text_and_region() {
        let mut session = Session::new();
        session.set_reference_text("old transcript");
        session.set_selected_region(Region::new(0.0, 5.0));
        session.store_upload(UploadedAsset {
            server_filename: "abc_voice.wav".to_string(),
            server_path: "/srv/output/abc_voice.wav".to_string(),
        });

        assert_eq!(session.reference_text(), "");
        assert!(session.selected_region().is_none());
        assert_eq!(
            session.uploaded_asset().map(|a| a.server_filename.as_str()),
            Some("abc_voice.wav")
        );
    }

    #[test]
    fn commit_model_keeps_previous_status_when_none_returned() {
        let mut session = Session::from_status(StatusSummary {
            model_loaded: Some("custom".to_string()),
            vram_used_gb: 2.5,
        });
        assert_eq!(session.active_model(), Some(ModelKind::Custom));

        session.commit_model(ModelKind::Design, None);
        assert_eq!(session.active_model(), Some(ModelKind::Design));
        assert_eq!(session.status().map(|s| s.vram_used_gb), Some(2.5));
    }

    #[test]
    fn model_kind_parses_case_insensitively() {
        assert_eq!("Custom".parse::<ModelKind>().ok(), Some(ModelKind::Custom));
        assert!("whisper".parse::<ModelKind>().is_err());
    }
}
