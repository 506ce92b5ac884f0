use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::compositor::{Compositor, Overlays};
use crate::config::{MaskConfig, RenderOptions};
use crate::detection::DetectionSet;
use crate::error::Error;
use crate::history::{TrailHistory, DEFAULT_TRAIL_CAPACITY};
use crate::mask::RoiMask;
use crate::shoe::ShoeLabelSet;
use crate::text::Typeface;
use crate::track::TrackSet;
use crate::video::{FrameSink, VideoSource};

/// Burns overlays into every frame of a video, frame 0 first.
pub struct ExportJob<'a> {
    input: PathBuf,
    output: PathBuf,
    detections: Option<&'a DetectionSet>,
    tracks: Option<&'a TrackSet>,
    shoes: Option<&'a ShoeLabelSet>,
    masks: &'a [RoiMask],
    roi_enabled: bool,
    options: RenderOptions,
    fourcc: String,
    trail_capacity: usize,
    typeface: Option<Typeface>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> ExportJob<'a> {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            detections: None,
            tracks: None,
            shoes: None,
            masks: &[],
            roi_enabled: true,
            options: RenderOptions::default(),
            fourcc: "mp4v".into(),
            trail_capacity: DEFAULT_TRAIL_CAPACITY,
            typeface: None,
            cancel: None,
        }
    }

    pub fn detections(mut self, set: Option<&'a DetectionSet>) -> Self {
        self.detections = set;
        self
    }

    pub fn tracks(mut self, set: Option<&'a TrackSet>) -> Self {
        self.tracks = set;
        self
    }

    pub fn shoes(mut self, set: Option<&'a ShoeLabelSet>) -> Self {
        self.shoes = set;
        self
    }

    pub fn masks(mut self, masks: &'a [RoiMask], enabled: bool) -> Self {
        self.masks = masks;
        self.roi_enabled = enabled;
        self
    }

    /// Pass toggles and styling. The ROI switch and the legend are decided by
    /// the job itself.
    pub fn options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn fourcc(mut self, fourcc: &str) -> Self {
        self.fourcc = fourcc.to_string();
        self
    }

    pub fn trail_capacity(mut self, capacity: usize) -> Self {
        self.trail_capacity = capacity;
        self
    }

    pub fn typeface(mut self, typeface: Typeface) -> Self {
        self.typeface = Some(typeface);
        self
    }

    /// Flag checked before every frame; setting it stops the run.
    pub fn cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Runs to completion. `on_progress(idx, total)` is called after each
    /// written frame, `total` being the container frame count. Every failure,
    /// cancellation included, comes back as `false`.
    pub fn run<F: FnMut(u64, u64)>(self, on_progress: F) -> bool {
        let input = self.input.clone();
        match self.try_run(on_progress) {
            Ok(finished) => finished,
            Err(err) => {
                warn!("export of {} failed: {}", input.display(), err);
                false
            }
        }
    }

    fn try_run<F: FnMut(u64, u64)>(mut self, mut on_progress: F) -> Result<bool, Error> {
        let mut src = VideoSource::open(&self.input)?;
        let total = src.frame_count();
        let mut sink = FrameSink::new(self.output.to_string_lossy(), &self.fourcc, src.fps());

        let opts = RenderOptions {
            roi: self.roi_enabled,
            shoe_legend: false,
            ..self.options.clone()
        };
        let statics = self.shoes.map(ShoeLabelSet::static_labels).unwrap_or_default();
        let mut history = TrailHistory::with_capacity(self.trail_capacity);
        let mut compositor = Compositor::new(self.typeface.take().unwrap_or_default());

        info!(
            "exporting {} -> {} ({} frames)",
            self.input.display(),
            self.output.display(),
            total
        );
        let started = Instant::now();

        let mut idx = 0u64;
        loop {
            if self.is_cancelled() {
                info!("export cancelled at frame {}", idx);
                return Ok(false);
            }

            let frame = match src.read()? {
                Some(frame) => frame,
                None => break,
            };

            let detections = self
                .detections
                .map(|d| d.detections_for_frame(idx, opts.min_confidence))
                .unwrap_or_default();
            let tracks = self
                .tracks
                .map(|t| t.tracks_for_frame(idx))
                .unwrap_or_default();

            history.update(&tracks);

            let layers = Overlays {
                masks: self.masks,
                detections: &detections,
                tracks: &tracks,
                history: Some(&history),
                shoes: Some(&statics),
                summary: None,
            };
            let out = compositor.try_render(&frame, &layers, &opts)?;
            sink.write(&out)?;

            on_progress(idx, total);
            idx += 1;
        }

        sink.release();
        info!(
            "exported {} frames to {} in {:.1?}",
            sink.written(),
            self.output.display(),
            started.elapsed()
        );

        Ok(true)
    }

    #[inline]
    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }
}

/// One-call export with the stock floor and window masks.
pub fn export_with_overlays<P, Q, F>(
    input: P,
    detections: Option<&DetectionSet>,
    tracks: Option<&TrackSet>,
    shoes: Option<&ShoeLabelSet>,
    roi_enabled: bool,
    output: Q,
    on_progress: F,
) -> bool
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    F: FnMut(u64, u64),
{
    let masks: Vec<RoiMask> = if roi_enabled {
        MaskConfig::defaults().iter().map(RoiMask::load).collect()
    } else {
        debug!("ROI tint disabled for export");
        Vec::new()
    };

    ExportJob::new(input, output)
        .detections(detections)
        .tracks(tracks)
        .shoes(shoes)
        .masks(&masks, roi_enabled)
        .run(on_progress)
}
