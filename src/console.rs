use std::path::Path;

use tracing::{info, warn};

use crate::api::{ApiClient, Speaker};
use crate::error::Result;
use crate::generation::{GenerationForm, GenerationOrchestrator, GenerationOutput, GenerationPhase};
use crate::model::ensure_model;
use crate::personality::{PersonalityBuilder, PersonalityWorkflow};
use crate::segment::{Region, RegionId, RegionSummary, SegmentSelector, WaveformWidget};
use crate::session::{GenerationMode, ModelKind, Session, UploadedAsset};
use crate::surface::{BusyGuard, ConsoleSurface};
use crate::upload;

pub struct Console<S, W> {
    api: ApiClient,
    session: Session,
    surface: S,
    segments: SegmentSelector<W>,
    generator: GenerationOrchestrator,
    personalities: PersonalityWorkflow,
    speakers: Vec<Speaker>,
}

impl<S: ConsoleSurface, W: WaveformWidget> Console<S, W> {
    pub fn new(api: ApiClient, surface: S, widget: W) -> Self {
        Self {
            api,
            session: Session::new(),
            surface,
            segments: SegmentSelector::new(widget),
            generator: GenerationOrchestrator::new(),
            personalities: PersonalityWorkflow::new(),
            speakers: Vec::new(),
        }
    }

    pub async fn start(api: ApiClient, surface: S, widget: W) -> Self {
        let mut console = Self::new(api, surface, widget);
        console.bootstrap().await;
        console
    }

    async fn bootstrap(&mut self) {
        match self.api.status().await {
            Ok(status) => {
                self.surface.show_status(&status);
                self.session = Session::from_status(status);
            }
            Err(err) => {
                warn!(error = %err, "Could not load server status");
                self.surface.alert(&err.to_string());
            }
        }

        match self.api.speakers().await {
            Ok(speakers) => {
                self.surface.show_speakers(&speakers);
                self.speakers = speakers;
            }
            Err(err) => {
                warn!(error = %err, "Could not load speakers");
                self.surface.alert(&err.to_string());
            }
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn segments(&self) -> &SegmentSelector<W> {
        &self.segments
    }

    pub fn personalities(&self) -> &PersonalityWorkflow {
        &self.personalities
    }

    pub fn speakers(&self) -> &[Speaker] {
        &self.speakers
    }

    pub fn generation_phase(&self) -> &GenerationPhase {
        self.generator.phase()
    }

    pub fn set_mode(&mut self, mode: GenerationMode) {
        self.session.set_mode(mode);
    }

    pub fn set_reference_text(&mut self, text: impl Into<String>) {
        self.session.set_reference_text(text);
    }

    pub async fn switch_tab(&mut self, model: ModelKind) -> Result<()> {
        let label = format!("Loading model {model} into GPU...");
        let busy = BusyGuard::show(&self.surface, &label, false);
        let result = ensure_model(&self.api, &mut self.session, model).await;
        drop(busy);

        match result {
            Ok(_) => {
                if let Some(status) = self.session.status() {
                    self.surface.show_status(status);
                }
                self.surface.show_active_tab(model);
                Ok(())
            }
            Err(err) => {
                self.surface.alert(&err.to_string());
                Err(err)
            }
        }
    }

    /// A new reference asset was picked: reset the region, render and upload it, then
    /// offer the default clip.
    pub async fn load_asset(&mut self, path: &Path) -> Result<UploadedAsset> {
        self.segments.set_asset();
        self.session.set_selected_region(None);
        self.surface.set_extract_enabled(false);
        self.segments.widget_mut().load(path);

        let uploaded = match upload::upload(&self.api, &mut self.session, &self.surface, path).await {
            Ok(uploaded) => {
                info!(asset = %path.display(), "Reference asset ready");
                uploaded
            }
            Err(err) => {
                self.surface.alert(&err.to_string());
                return Err(err);
            }
        };

        self.segments.mark_loaded();
        self.surface.set_extract_enabled(true);
        let duration = self.segments.widget().duration();
        let region = self.segments.create_default_region(duration);
        self.sync_region(region);
        Ok(uploaded)
    }

    pub fn on_region_created(&mut self, id: RegionId, region: Region) -> Option<Region> {
        let kept = self.segments.on_region_created(id, region);
        self.sync_region(kept);
        kept
    }

    pub fn on_region_updated(&mut self, id: RegionId, region: Region) -> Option<RegionSummary> {
        let summary = self.segments.on_region_updated(id, region)?;
        self.session.set_selected_region(self.segments.current_region());
        self.surface.show_region_info(&summary);
        Some(summary)
    }

    pub fn adjust_region(&mut self, region: Region) -> Option<Region> {
        match self.segments.current_id() {
            Some(id) => {
                self.on_region_updated(id, region)?;
                self.segments.current_region()
            }
            None => {
                let id = self.segments.widget_mut().add_region(region);
                self.on_region_created(id, region)
            }
        }
    }

    fn sync_region(&mut self, region: Option<Region>) {
        self.session.set_selected_region(region);
        if let Some(region) = region {
            self.surface.show_region_info(&RegionSummary::from(region));
        }
    }

    pub async fn extract_text(&mut self) -> Result<Option<String>> {
        if !self.segments.is_loaded() {
            return Ok(None);
        }
        match upload::extract_text(&self.api, &mut self.session, &self.surface).await {
            Ok(text) => Ok(text),
            Err(err) => {
                self.surface.alert(&err.to_string());
                Err(err)
            }
        }
    }

    pub async fn generate(&mut self, form: GenerationForm) -> Result<GenerationOutput> {
        self.generator
            .submit(&self.api, &mut self.session, &self.surface, form)
            .await
    }

    pub async fn refresh_personalities(&mut self) -> Result<()> {
        self.personalities.refresh(&self.api, &self.surface).await
    }

    pub async fn create_personality(&mut self, builder: &PersonalityBuilder) -> Result<()> {
        self.personalities
            .create(&self.api, &self.surface, builder)
            .await
    }

    pub async fn select_personality(&mut self, name: &str) -> Result<Vec<String>> {
        self.personalities
            .select(&self.api, &self.surface, name)
            .await
    }

    pub async fn delete_personality(&mut self, name: &str) -> Result<bool> {
        self.personalities
            .delete(&self.api, &self.surface, name)
            .await
    }
}
