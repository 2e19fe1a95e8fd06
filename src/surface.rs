//! Capability interface of the rendering surface.
//!
//! The controller never touches widgets directly. Whatever renders the console
//! (terminal, desktop shell, test recorder) implements [`ConsoleSurface`]; methods take
//! `&self` so a surface can be shared by the components of one single-threaded session.

use crate::api::{PersonalitySummary, Speaker, StatusSummary};
use crate::generation::GenerationOutput;
use crate::segment::RegionSummary;
use crate::session::ModelKind;
use crate::stream::Progress;

pub trait ConsoleSurface {
    /// Blocking overlay with a label, optionally with the progress bar reset to 0%.
    fn show_busy(&self, label: &str, with_progress: bool);
    fn hide_busy(&self);
    fn show_progress(&self, progress: &Progress);

    /// Enables or disables every generate control.
    fn set_actions_enabled(&self, enabled: bool);

    /// One user-visible message per failure.
    fn alert(&self, message: &str);

    /// Explicit yes/no step; `false` must abort the guarded action.
    fn confirm(&self, prompt: &str) -> bool;

    fn show_status(&self, status: &StatusSummary);
    fn show_speakers(&self, _speakers: &[Speaker]) {}
    fn show_active_tab(&self, _model: ModelKind) {}

    fn set_extract_enabled(&self, _enabled: bool) {}
    fn show_region_info(&self, _summary: &RegionSummary) {}
    fn set_reference_text(&self, text: &str);

    fn present_output(&self, output: &GenerationOutput);

    fn show_personalities(&self, personalities: &[PersonalitySummary]);
    /// One quick-insert control per tag; an empty slice clears the toolbar.
    fn show_tag_toolbar(&self, tags: &[String]);

    /// Progress surface of the personality builder, separate from the main one.
    fn show_builder_progress(&self, percent: u8, stage: &str);
    fn set_builder_save_enabled(&self, enabled: bool);
    fn close_builder(&self) {}
}

/// Busy overlay held for the duration of a call; hidden on drop.
pub struct BusyGuard<'a, S: ConsoleSurface + ?Sized> {
    surface: &'a S,
}

impl<'a, S: ConsoleSurface + ?Sized> BusyGuard<'a, S> {
    pub fn show(surface: &'a S, label: &str, with_progress: bool) -> Self {
        surface.show_busy(label, with_progress);
        Self { surface }
    }
}

impl<S: ConsoleSurface + ?Sized> Drop for BusyGuard<'_, S> {
    fn drop(&mut self) {
        self.surface.hide_busy();
    }
}

/// Generate controls stay disabled while held; re-enabled on drop.
pub struct ActionsGuard<'a, S: ConsoleSurface + ?Sized> {
    surface: &'a S,
}

impl<'a, S: ConsoleSurface + ?Sized> ActionsGuard<'a, S> {
    pub fn disable(surface: &'a S) -> Self {
        surface.set_actions_enabled(false);
        Self { surface }
    }
}

impl<S: ConsoleSurface + ?Sized> Drop for ActionsGuard<'_, S> {
    fn drop(&mut self) {
        self.surface.set_actions_enabled(true);
    }
}

/// Builder save control stays disabled while held; on drop it is re-enabled and,
/// unless the build completed, the builder progress is reset.
pub struct BuilderGuard<'a, S: ConsoleSurface + ?Sized> {
    surface: &'a S,
    completed: bool,
}

impl<'a, S: ConsoleSurface + ?Sized> BuilderGuard<'a, S> {
    pub fn start(surface: &'a S, stage: &str) -> Self {
        surface.set_builder_save_enabled(false);
        surface.show_builder_progress(0, stage);
        Self {
            surface,
            completed: false,
        }
    }

    pub fn complete(mut self) {
        self.completed = true;
    }
}

impl<S: ConsoleSurface + ?Sized> Drop for BuilderGuard<'_, S> {
    fn drop(&mut self) {
        if !self.completed {
            self.surface.show_builder_progress(0, "");
        }
        self.surface.set_builder_save_enabled(true);
    }
}
