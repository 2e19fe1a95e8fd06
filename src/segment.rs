//! Reference-clip selection over the loaded waveform.
//!
//! The waveform widget itself is an external collaborator; the selector only relies on
//! [`WaveformWidget`] to add, remove and clear regions and to report the asset duration.
//! The widget forwards user-created regions to [`SegmentSelector::on_region_created`]
//! and edits to [`SegmentSelector::on_region_updated`]. Regions added through
//! [`SegmentSelector::create_default_region`] are registered directly and are not
//! echoed back by the widget.

use std::fmt;
use std::path::Path;

use tracing::debug;

pub const DEFAULT_REGION_SECONDS: f64 = 10.0;

pub type RegionId = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    start: f64,
    end: f64,
}

impl Region {
    /// `None` unless `0 <= start < end` and both are finite.
    pub fn new(start: f64, end: f64) -> Option<Self> {
        if start.is_finite() && end.is_finite() && start >= 0.0 && end > start {
            Some(Self { start, end })
        } else {
            None
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    fn clamped_to(self, duration: f64) -> Option<Self> {
        if duration.is_finite() && duration > 0.0 && self.end > duration {
            Self::new(self.start, duration)
        } else {
            Some(self)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionSummary {
    pub duration: f64,
    pub start: f64,
    pub end: f64,
}

impl From<Region> for RegionSummary {
    fn from(region: Region) -> Self {
        Self {
            duration: region.duration(),
            start: region.start,
            end: region.end,
        }
    }
}

impl fmt::Display for RegionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}s ({:.2}s - {:.2}s)",
            self.duration, self.start, self.end
        )
    }
}

pub trait WaveformWidget {
    fn load(&mut self, asset: &Path);
    /// Duration in seconds of the visually loaded asset, `0.0` when nothing is loaded.
    fn duration(&self) -> f64;
    fn add_region(&mut self, region: Region) -> RegionId;
    /// Redraws an existing region with new bounds.
    fn update_region(&mut self, id: RegionId, region: Region);
    fn remove_region(&mut self, id: RegionId);
    fn clear_regions(&mut self);
}

pub struct SegmentSelector<W> {
    widget: W,
    // Creation order; index 0 is the earliest surviving region.
    regions: Vec<(RegionId, Region)>,
    loaded: bool,
}

impl<W: WaveformWidget> SegmentSelector<W> {
    pub fn new(widget: W) -> Self {
        Self {
            widget,
            regions: Vec::new(),
            loaded: false,
        }
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    pub fn widget_mut(&mut self) -> &mut W {
        &mut self.widget
    }

    /// A new asset was picked: drop the region and block extraction until the
    /// widget finished loading it.
    pub fn set_asset(&mut self) {
        self.widget.clear_regions();
        self.regions.clear();
        self.loaded = false;
    }

    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Adds `[0, min(10, duration)]`. Returns the region that survives, which is
    /// the existing one if a region was already present.
    pub fn create_default_region(&mut self, duration: f64) -> Option<Region> {
        let region = Region::new(0.0, duration.min(DEFAULT_REGION_SECONDS))?;
        let id = self.widget.add_region(region);
        self.on_region_created(id, region)
    }

    pub fn on_region_created(&mut self, id: RegionId, region: Region) -> Option<Region> {
        match region.clamped_to(self.widget.duration()) {
            Some(clamped) => {
                if clamped != region {
                    self.widget.update_region(id, clamped);
                }
                self.regions.push((id, clamped));
            }
            None => {
                debug!(id, "Discarding region outside the loaded asset");
                self.widget.remove_region(id);
            }
        }

        if self.regions.len() > 1 {
            for (extra, _) in self.regions.split_off(1) {
                debug!(id = extra, "Discarding extra region");
                self.widget.remove_region(extra);
            }
        }

        self.current_region()
    }

    pub fn on_region_updated(&mut self, id: RegionId, region: Region) -> Option<RegionSummary> {
        let slot = self.regions.iter_mut().find(|(known, _)| *known == id)?;
        slot.1 = region;
        Some(RegionSummary::from(region))
    }

    pub fn current_region(&self) -> Option<Region> {
        self.regions.first().map(|(_, region)| *region)
    }

    pub fn current_id(&self) -> Option<RegionId> {
        self.regions.first().map(|(id, _)| *id)
    }
}
