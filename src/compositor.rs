use std::collections::{HashMap, HashSet};

use opencv::{
    core::{Mat, Point, Vector},
    imgproc,
    prelude::*,
};
use tracing::warn;

use crate::config::RenderOptions;
use crate::detection::Detection;
use crate::error::Error;
use crate::history::TrailHistory;
use crate::mask::RoiMask;
use crate::math;
use crate::palette::{detection_color, scalar, track_color, Bgr};
use crate::raster;
use crate::shoe::{ShoeSummary, StaticShoeLabel};
use crate::text::{TextStyle, Typeface};
use crate::track::TrackPoint;

const DETECTION_TEXT: TextStyle = TextStyle::new(0.5, 1);
const DETECTION_INK: Bgr = [20, 20, 20];

const TRACK_TEXT_METRIC: TextStyle = TextStyle::new(0.6, 1);
const TRACK_TEXT: TextStyle = TextStyle::new(0.6, 2);
const TRACK_INK: Bgr = [220, 20, 60];
const TRACK_PAD: i32 = 4;

const SHOE_TEXT: TextStyle = TextStyle::new(0.5, 1);
const SHOE_INK: Bgr = [255, 255, 255];
const SHOE_PAD: i32 = 3;

const LEGEND_ORIGIN: (i32, i32) = (10, 10);
const LEGEND_TITLE: &str = "Shoes";
const LEGEND_TITLE_TEXT: TextStyle = TextStyle::new(0.7, 2);
const LEGEND_LINE_METRIC: TextStyle = TextStyle::new(0.6, 1);
const LEGEND_LINE_TEXT: TextStyle = TextStyle::new(0.6, 2);
const LEGEND_BACKGROUND: Bgr = [40, 40, 40];
const LEGEND_PAD: i32 = 8;
const LEGEND_LINE_GAP: i32 = 6;
const LEGEND_TITLE_GAP: i32 = 10;

const PATCH_ALPHA: f64 = 0.25;
const LEGEND_ALPHA: f64 = 0.35;

/// Everything that can be drawn over one frame. Empty layers draw nothing.
#[derive(Default, Clone, Copy)]
pub struct Overlays<'a> {
    pub masks: &'a [RoiMask],
    pub detections: &'a [Detection],
    pub tracks: &'a [TrackPoint],
    pub history: Option<&'a TrailHistory>,
    pub shoes: Option<&'a HashMap<i64, StaticShoeLabel>>,
    pub summary: Option<&'a ShoeSummary>,
}

pub struct Compositor {
    typeface: Typeface,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(Typeface::hershey())
    }
}

impl Compositor {
    pub fn new(typeface: Typeface) -> Self {
        Self { typeface }
    }

    /// Draws the enabled layers over a copy of `frame`. The input is never
    /// touched; if drawing fails the copy is returned as is.
    pub fn render(&mut self, frame: &Mat, layers: &Overlays<'_>, opts: &RenderOptions) -> Mat {
        match self.try_render(frame, layers, opts) {
            Ok(out) => out,
            Err(err) => {
                warn!("overlay compositing failed, passing frame through: {}", err);
                frame.try_clone().unwrap_or_default()
            }
        }
    }

    pub fn try_render(&mut self, frame: &Mat, layers: &Overlays<'_>, opts: &RenderOptions) -> Result<Mat, Error> {
        let mut out = raster::to_bgr(frame)?;

        if opts.roi {
            for mask in layers.masks {
                mask.apply(&mut out)?;
            }
        }

        if opts.detections {
            for (i, det) in layers.detections.iter().enumerate() {
                self.draw_detection(&mut out, det, detection_color(i), opts.box_thickness)?;
            }
        }

        if opts.tracks {
            for t in layers.tracks {
                self.draw_track(&mut out, t, opts.box_thickness)?;
            }
        }

        if opts.shoe_labels {
            if let Some(shoes) = layers.shoes {
                for t in layers.tracks {
                    if let Some(label) = shoes.get(&t.id) {
                        self.draw_shoe_label(&mut out, t, label)?;
                    }
                }
            }
        }

        if opts.trails {
            if let Some(history) = layers.history {
                draw_trails(&mut out, layers.tracks, history, opts)?;
            }
        }

        if opts.shoe_legend {
            if let Some(summary) = layers.summary {
                self.draw_legend(&mut out, summary)?;
            }
        }

        Ok(out)
    }

    fn draw_detection(&mut self, img: &mut Mat, det: &Detection, color: Bgr, thickness: i32) -> Result<(), Error> {
        let b = det.bbox.to_pixels();
        imgproc::rectangle_points(
            img,
            Point::new(b.x1, b.y1),
            Point::new(b.x2, b.y2),
            scalar(color),
            thickness,
            imgproc::LINE_8,
            0,
        )?;

        let label = det.label();
        let (size, baseline) = self.typeface.measure(&label, DETECTION_TEXT)?;
        let th = size.height + baseline;

        let patch_end = (
            b.x1.saturating_add(size.width + 6),
            b.y1.saturating_add(th + 4),
        );
        raster::blend_rect(img, (b.x1, b.y1), patch_end, color, PATCH_ALPHA)?;
        self.typeface.draw(
            img,
            &label,
            Point::new(b.x1.saturating_add(3), b.y1.saturating_add(th)),
            DETECTION_TEXT,
            scalar(DETECTION_INK),
        )
    }

    fn draw_track(&mut self, img: &mut Mat, t: &TrackPoint, thickness: i32) -> Result<(), Error> {
        let color = track_color(t.id);
        let b = t.bbox;
        imgproc::rectangle_points(
            img,
            Point::new(b.x1, b.y1),
            Point::new(b.x2, b.y2),
            scalar(color),
            thickness,
            imgproc::LINE_8,
            0,
        )?;

        let label = format!("ID {}", t.id);
        let (size, baseline) = self.typeface.measure(&label, TRACK_TEXT_METRIC)?;
        let th = size.height + baseline;

        let (x1, y1) = (b.x1, b.y1.saturating_sub(th + TRACK_PAD + 2).max(0));
        let (x2, y2) = (b.x1.saturating_add(size.width + 2 * TRACK_PAD), b.y1.saturating_sub(2));

        raster::blend_rect(img, (x1, y1), (x2, y2), color, PATCH_ALPHA)?;
        self.typeface.draw(
            img,
            &label,
            Point::new(x1.saturating_add(TRACK_PAD), y2.saturating_sub(TRACK_PAD)),
            TRACK_TEXT,
            scalar(TRACK_INK),
        )
    }

    /// Caption just under the box, shifted left when it would cross the
    /// right edge of the frame.
    fn draw_shoe_label(&mut self, img: &mut Mat, t: &TrackPoint, label: &StaticShoeLabel) -> Result<(), Error> {
        let caption = label.caption();
        let (size, baseline) = self.typeface.measure(&caption, SHOE_TEXT)?;
        let w = size.width + 2 * SHOE_PAD;
        let h = size.height + baseline + 2 * SHOE_PAD;

        let x1 = t.bbox.x1.min(img.cols() - w).max(0);
        let y1 = t.bbox.y2.saturating_add(2);

        raster::blend_rect(img, (x1, y1), (x1 + w, y1.saturating_add(h)), track_color(t.id), PATCH_ALPHA)?;
        self.typeface.draw(
            img,
            &caption,
            Point::new(x1 + SHOE_PAD, y1.saturating_add(SHOE_PAD + size.height)),
            SHOE_TEXT,
            scalar(SHOE_INK),
        )
    }

    fn draw_legend(&mut self, img: &mut Mat, summary: &ShoeSummary) -> Result<(), Error> {
        let lines = summary.lines();
        if lines.is_empty() {
            return Ok(());
        }

        let (title, _) = self.typeface.measure(LEGEND_TITLE, LEGEND_TITLE_TEXT)?;
        let mut sizes = Vec::with_capacity(lines.len());
        for line in &lines {
            sizes.push(self.typeface.measure(line, LEGEND_LINE_METRIC)?.0);
        }

        let max_w = sizes.iter().map(|s| s.width).max().unwrap_or(0).max(title.width);
        let lines_h: i32 = sizes.iter().map(|s| s.height).sum();
        let box_w = max_w + 2 * LEGEND_PAD;
        let box_h = title.height
            + LEGEND_TITLE_GAP
            + lines_h
            + (lines.len() as i32 - 1) * LEGEND_LINE_GAP
            + 2 * LEGEND_PAD;

        let (x1, y1) = LEGEND_ORIGIN;
        raster::blend_rect(img, (x1, y1), (x1 + box_w, y1 + box_h), LEGEND_BACKGROUND, LEGEND_ALPHA)?;

        self.typeface.draw(
            img,
            LEGEND_TITLE,
            Point::new(x1 + LEGEND_PAD, y1 + LEGEND_PAD + title.height),
            LEGEND_TITLE_TEXT,
            scalar([255, 255, 255]),
        )?;

        let mut y = y1 + LEGEND_PAD + title.height + LEGEND_TITLE_GAP;
        for (line, size) in lines.iter().zip(&sizes) {
            self.typeface.draw(
                img,
                line,
                Point::new(x1 + LEGEND_PAD, y + size.height),
                LEGEND_LINE_TEXT,
                scalar([230, 230, 230]),
            )?;
            y += size.height + LEGEND_LINE_GAP;
        }

        Ok(())
    }
}

/// Trails for identities present in `tracks`, each drawn once.
fn draw_trails(img: &mut Mat, tracks: &[TrackPoint], history: &TrailHistory, opts: &RenderOptions) -> Result<(), Error> {
    let mut seen = HashSet::new();

    for t in tracks {
        if !seen.insert(t.id) {
            continue;
        }

        let points = history.trail(t.id);
        if points.len() < 2 {
            continue;
        }

        let poly: Vector<Point> = math::smooth_trail(&points, opts.smooth_iterations)
            .iter()
            .map(|p| Point::new(p.x, p.y))
            .collect();

        let mut polys = Vector::<Vector<Point>>::new();
        polys.push(poly);

        imgproc::polylines(
            img,
            &polys,
            false,
            scalar(track_color(t.id)),
            opts.trail_thickness,
            imgproc::LINE_AA,
            0,
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::{BBox, PixelBox};
    use crate::raster::{pixel, solid};
    use std::collections::BTreeMap;

    fn track(frame: u64, id: i64, b: (i32, i32, i32, i32)) -> TrackPoint {
        TrackPoint {
            frame,
            id,
            bbox: PixelBox::new(b.0, b.1, b.2, b.3),
            confidence: None,
        }
    }

    fn all_off() -> RenderOptions {
        RenderOptions {
            roi: false,
            detections: false,
            tracks: false,
            trails: false,
            shoe_labels: false,
            shoe_legend: false,
            ..Default::default()
        }
    }

    #[test]
    fn input_is_not_mutated() {
        let frame = solid(120, 160, [50, 50, 50]);
        let dets = vec![Detection {
            frame: 0,
            class: "player".into(),
            confidence: Some(0.9),
            bbox: BBox::ltrb(10.0, 10.0, 80.0, 90.0),
        }];
        let tracks = vec![track(0, 3, (20, 30, 70, 100))];

        let mut compositor = Compositor::default();
        let out = compositor.render(
            &frame,
            &Overlays {
                detections: &dets,
                tracks: &tracks,
                ..Default::default()
            },
            &RenderOptions::default(),
        );

        for y in 0..120 {
            for x in 0..160 {
                assert_eq!(pixel(&frame, x, y), [50, 50, 50]);
            }
        }
        assert_ne!(pixel(&out, 10, 50), [50, 50, 50]);
    }

    #[test]
    fn disabled_passes_draw_nothing() {
        let frame = solid(60, 60, [0, 0, 0]);
        let tracks = vec![track(0, 1, (5, 20, 40, 50))];

        let mut compositor = Compositor::default();
        let out = compositor.render(
            &frame,
            &Overlays {
                tracks: &tracks,
                ..Default::default()
            },
            &all_off(),
        );

        for y in 0..60 {
            for x in 0..60 {
                assert_eq!(pixel(&out, x, y), [0, 0, 0]);
            }
        }
    }

    #[test]
    fn track_box_uses_identity_color() {
        let frame = solid(100, 100, [0, 0, 0]);
        let tracks = vec![track(0, 13, (20, 40, 60, 90))];

        let mut compositor = Compositor::default();
        let out = compositor.render(
            &frame,
            &Overlays {
                tracks: &tracks,
                ..Default::default()
            },
            &RenderOptions {
                tracks: true,
                ..all_off()
            },
        );

        assert_eq!(pixel(&out, 40, 90), track_color(13));
        assert_eq!(pixel(&out, 60, 70), track_color(3));
    }

    #[test]
    fn trail_is_drawn_for_present_identity_only() {
        let frame = solid(100, 100, [0, 0, 0]);
        let mut history = TrailHistory::default();
        history.update(&[track(0, 2, (10, 10, 30, 50))]);
        history.update(&[track(1, 2, (50, 10, 70, 50))]);

        let opts = RenderOptions {
            trails: true,
            smooth_iterations: 0,
            ..all_off()
        };

        let mut compositor = Compositor::default();
        let absent = compositor.render(
            &frame,
            &Overlays {
                history: Some(&history),
                ..Default::default()
            },
            &opts,
        );
        assert_eq!(pixel(&absent, 40, 50), [0, 0, 0]);

        let current = vec![track(1, 2, (50, 10, 70, 50))];
        let drawn = compositor.render(
            &frame,
            &Overlays {
                tracks: &current,
                history: Some(&history),
                ..Default::default()
            },
            &opts,
        );
        assert_ne!(pixel(&drawn, 40, 50), [0, 0, 0]);
    }

    #[test]
    fn shoe_label_is_clamped_to_right_edge() {
        let frame = solid(120, 100, [0, 0, 0]);
        let tracks = vec![track(0, 4, (90, 10, 99, 40))];
        let mut shoes = HashMap::new();
        shoes.insert(
            4,
            StaticShoeLabel {
                class: "sneaker".into(),
                confidence: 0.91,
                frame: 0,
            },
        );

        let mut compositor = Compositor::default();
        let out = compositor.render(
            &frame,
            &Overlays {
                tracks: &tracks,
                shoes: Some(&shoes),
                ..Default::default()
            },
            &RenderOptions {
                shoe_labels: true,
                ..all_off()
            },
        );

        // the patch starts left of the box so it fits in the frame
        let touched = (0..90).any(|x| pixel(&out, x, 44) != [0, 0, 0]);
        assert!(touched);
    }

    #[test]
    fn boxes_at_the_integer_limits_still_render() {
        let frame = solid(80, 80, [0, 0, 0]);
        let dets = vec![Detection {
            frame: 0,
            class: "player".into(),
            confidence: Some(0.5),
            bbox: BBox::ltrb(3.0e9, 3.0e9, 3.1e9, 3.1e9),
        }];
        let tracks = vec![
            track(0, 1, (i32::MAX - 1, i32::MAX - 1, i32::MAX, i32::MAX)),
            track(0, 2, (i32::MIN, i32::MIN, i32::MIN + 1, i32::MIN + 1)),
        ];
        let mut shoes = HashMap::new();
        for id in [1, 2] {
            shoes.insert(
                id,
                StaticShoeLabel {
                    class: "boot".into(),
                    confidence: 0.7,
                    frame: 0,
                },
            );
        }
        let mut history = TrailHistory::default();
        history.update(&tracks);
        history.update(&tracks);

        let mut compositor = Compositor::default();
        let out = compositor
            .try_render(
                &frame,
                &Overlays {
                    detections: &dets,
                    tracks: &tracks,
                    history: Some(&history),
                    shoes: Some(&shoes),
                    ..Default::default()
                },
                &RenderOptions::default(),
            )
            .unwrap();

        assert_eq!((out.rows(), out.cols()), (80, 80));
    }

    #[test]
    fn legend_panel_is_drawn_at_top_left() {
        let frame = solid(200, 300, [200, 200, 200]);
        let summary = ShoeSummary {
            counts: BTreeMap::from([("boot".to_string(), 2)]),
            avg_confidence: BTreeMap::from([("boot".to_string(), 0.75)]),
        };

        let mut compositor = Compositor::default();
        let out = compositor.render(
            &frame,
            &Overlays {
                summary: Some(&summary),
                ..Default::default()
            },
            &RenderOptions {
                shoe_legend: true,
                ..all_off()
            },
        );

        // 200 * 0.65 + 40 * 0.35 = 144
        assert_eq!(pixel(&out, 11, 11), [144, 144, 144]);
        assert_eq!(pixel(&out, 5, 5), [200, 200, 200]);
    }
}
