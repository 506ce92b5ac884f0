use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use opencv::core::Mat;
use serde_derive::Serialize;
use tracing::{debug, info};

use crate::compositor::{Compositor, Overlays};
use crate::config::{RenderOptions, Settings};
use crate::detection::{parse_detections, DetectionSet};
use crate::export::ExportJob;
use crate::history::TrailHistory;
use crate::mask::RoiMask;
use crate::probe::{probe_metadata, VideoMetadata};
use crate::shoe::{parse_shoe_labels, ShoeLabelSet, ShoeSummary, StaticShoeLabel};
use crate::text::Typeface;
use crate::track::{parse_tracks, TrackSet};
use crate::video;

/// Per-frame numbers shown next to the viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameStats {
    pub frame: u64,
    pub detections: usize,
    pub tracks: usize,
    pub avg_detections_per_frame: f64,
    pub shoes: ShoeSummary,
}

/// Everything loaded for one review: sidecars parsed once, masks and font
/// loaded once, frames read on demand.
pub struct Session {
    settings: Settings,
    metadata: VideoMetadata,
    detections: DetectionSet,
    tracks: TrackSet,
    shoes: ShoeLabelSet,
    statics: HashMap<i64, StaticShoeLabel>,
    masks: Vec<RoiMask>,
    compositor: Compositor,
}

impl Session {
    pub fn load(settings: &Settings) -> Self {
        let paths = &settings.paths;

        let metadata = probe_metadata(&paths.video);
        let detections = parse_detections(&paths.detections);
        let tracks = parse_tracks(&paths.tracks);
        let shoes = parse_shoe_labels(&paths.shoes);
        let statics = shoes.static_labels();
        let masks: Vec<RoiMask> = settings.masks.iter().map(RoiMask::load).collect();

        info!(
            "session for {}: {} detection frames, {} track points, {} shoe labels, {}/{} masks",
            paths.video.display(),
            detections.results.len(),
            tracks.tracks.len(),
            shoes.labels.len(),
            masks.iter().filter(|m| m.is_loaded()).count(),
            masks.len(),
        );

        Self {
            settings: settings.clone(),
            metadata,
            detections,
            tracks,
            shoes,
            statics,
            masks,
            compositor: Compositor::new(Typeface::load(&paths.font)),
        }
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[inline]
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    #[inline]
    pub fn detections(&self) -> &DetectionSet {
        &self.detections
    }

    #[inline]
    pub fn tracks(&self) -> &TrackSet {
        &self.tracks
    }

    #[inline]
    pub fn shoes(&self) -> &ShoeLabelSet {
        &self.shoes
    }

    #[inline]
    pub fn static_labels(&self) -> &HashMap<i64, StaticShoeLabel> {
        &self.statics
    }

    /// Container frame count, else the count declared by the detections file.
    pub fn frame_count(&self) -> u64 {
        if self.metadata.frame_count > 0 {
            self.metadata.frame_count
        } else {
            self.detections.frame_count_hint()
        }
    }

    /// Frame `idx` with the selected overlays. Trails are rebuilt from the
    /// frames leading up to `idx`, so any frame can be shown out of order.
    pub fn render_frame(&mut self, idx: u64, opts: &RenderOptions) -> Option<Mat> {
        let frame = video::read_frame(&self.settings.paths.video, idx)?;

        let detections = self.detections.detections_for_frame(idx, opts.min_confidence);
        let tracks = self.tracks.tracks_for_frame(idx);

        let capacity = self.settings.history.capacity;
        let history = opts
            .trails
            .then(|| TrailHistory::rebuild(&self.tracks, idx, capacity, capacity));
        let summary = opts
            .shoe_legend
            .then(|| self.shoes.summarize_by_class(Some(idx)));

        debug!(
            "frame {}: {} detections, {} tracks",
            idx,
            detections.len(),
            tracks.len()
        );

        let layers = Overlays {
            masks: &self.masks,
            detections: &detections,
            tracks: &tracks,
            history: history.as_ref(),
            shoes: Some(&self.statics),
            summary: summary.as_ref(),
        };

        Some(self.compositor.render(&frame, &layers, opts))
    }

    pub fn frame_stats(&self, idx: u64, min_confidence: Option<f32>) -> FrameStats {
        FrameStats {
            frame: idx,
            detections: self.detections.detections_for_frame(idx, min_confidence).len(),
            tracks: self.tracks.tracks_for_frame(idx).len(),
            avg_detections_per_frame: self.detections.average_count_per_frame(min_confidence),
            shoes: self.shoes.summarize_by_class(Some(idx)),
        }
    }

    /// Export job preloaded with this session's sidecars, masks and settings.
    pub fn export_job<P: AsRef<Path>>(&self, output: P, roi_enabled: bool) -> ExportJob<'_> {
        ExportJob::new(&self.settings.paths.video, output)
            .detections(Some(&self.detections))
            .tracks(Some(&self.tracks))
            .shoes(Some(&self.shoes))
            .masks(&self.masks, roi_enabled)
            .options(self.settings.render.clone())
            .fourcc(&self.settings.export.fourcc)
            .trail_capacity(self.settings.history.capacity)
            .typeface(Typeface::load(&self.settings.paths.font))
    }

    pub fn export<P, F>(&self, output: P, roi_enabled: bool, cancel: Arc<AtomicBool>, on_progress: F) -> bool
    where
        P: AsRef<Path>,
        F: FnMut(u64, u64),
    {
        self.export_job(output, roi_enabled)
            .cancel_flag(cancel)
            .run(on_progress)
    }
}
