use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::bbox::{BBox, Ltrb};
use crate::error::Error;
use crate::value;

/// One object instance reported by the upstream detector for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub frame: u64,
    pub class: String,
    pub confidence: Option<f32>,
    pub bbox: BBox<Ltrb>,
}

impl Detection {
    #[inline]
    fn passes(&self, min_confidence: Option<f32>) -> bool {
        match min_confidence {
            Some(min) => self.confidence.unwrap_or(0.0) >= min,
            None => true,
        }
    }

    /// `"class 0.87"`, or just the class when no confidence was reported.
    pub fn label(&self) -> String {
        match self.confidence {
            Some(conf) => format!("{} {:.2}", self.class, conf),
            None => self.class.clone(),
        }
    }
}

/// One element of the `results` array. `frame` is `None` when the exporter
/// wrote something that is not an integer; such entries still count towards
/// averages but never match a frame lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameEntry {
    pub frame: Option<i64>,
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSet {
    pub video_info: Map<String, Value>,
    pub detection_info: Map<String, Value>,
    pub results: Vec<FrameEntry>,
    /// Result entries and detection records rejected while parsing.
    pub skipped: usize,
}

/// Reads a detections JSON document. A missing or malformed file yields an
/// empty set.
pub fn parse_detections<P: AsRef<Path>>(path: P) -> DetectionSet {
    let path = path.as_ref();
    if !path.exists() {
        debug!("detections file {} not found", path.display());
        return DetectionSet::default();
    }

    match load(path) {
        Ok(set) => {
            debug!(
                "loaded {} detection frames from {} ({} skipped)",
                set.results.len(),
                path.display(),
                set.skipped
            );
            set
        }
        Err(err) => {
            warn!("unable to read detections {}: {}", path.display(), err);
            DetectionSet::default()
        }
    }
}

fn load(path: &Path) -> Result<DetectionSet, Error> {
    let text = fs::read_to_string(path)?;
    let root: Value = serde_json::from_str(&text)?;

    Ok(DetectionSet::from_value(&root))
}

fn parse_bbox(v: Option<&Value>) -> BBox<Ltrb> {
    let coord = |key: &str| {
        v.and_then(|b| b.get(key))
            .and_then(value::as_float)
            .unwrap_or(0.0) as f32
    };

    BBox::ltrb(coord("x1"), coord("y1"), coord("x2"), coord("y2"))
}

impl DetectionSet {
    pub fn from_value(root: &Value) -> Self {
        let mut set = Self::default();
        let root = match root.as_object() {
            Some(root) => root,
            None => return set,
        };

        let section = |key: &str| {
            root.get(key)
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default()
        };
        set.video_info = section("video_info");
        set.detection_info = section("detection_info");

        let results = match root.get("results").and_then(Value::as_array) {
            Some(results) => results,
            None => return set,
        };

        for item in results {
            let item = match item.as_object() {
                Some(item) => item,
                None => {
                    set.skipped += 1;
                    continue;
                }
            };

            let frame = item.get("frame").and_then(value::as_int);
            let raw = match item.get("detections") {
                None => &[][..],
                Some(Value::Array(dets)) => dets.as_slice(),
                Some(_) => {
                    set.skipped += 1;
                    continue;
                }
            };

            let frame_idx = frame.and_then(|f| u64::try_from(f).ok()).unwrap_or(0);
            let mut detections = Vec::with_capacity(raw.len());
            for det in raw {
                if !det.is_object() {
                    set.skipped += 1;
                    continue;
                }

                detections.push(Detection {
                    frame: frame_idx,
                    class: det
                        .get("class")
                        .and_then(value::as_label)
                        .unwrap_or_else(|| "obj".to_string()),
                    confidence: det
                        .get("confidence")
                        .and_then(value::as_float)
                        .map(|c| c as f32),
                    bbox: parse_bbox(det.get("bbox")),
                });
            }

            set.results.push(FrameEntry { frame, detections });
        }

        set
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    fn entry(&self, idx: u64) -> Option<&FrameEntry> {
        let wanted = i64::try_from(idx).ok()?;

        // exporters usually write frames contiguously from 0
        if let Some(entry) = usize::try_from(idx).ok().and_then(|i| self.results.get(i)) {
            if entry.frame == Some(wanted) {
                return Some(entry);
            }
        }

        self.results.iter().find(|e| e.frame == Some(wanted))
    }

    /// Detections of frame `idx` whose confidence is at least `min_confidence`.
    pub fn detections_for_frame(&self, idx: u64, min_confidence: Option<f32>) -> Vec<Detection> {
        self.entry(idx)
            .map(|e| {
                e.detections
                    .iter()
                    .filter(|d| d.passes(min_confidence))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Mean number of (filtered) detections over the frames present in the file.
    pub fn average_count_per_frame(&self, min_confidence: Option<f32>) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }

        let total: usize = self
            .results
            .iter()
            .map(|e| e.detections.iter().filter(|d| d.passes(min_confidence)).count())
            .sum();

        total as f64 / self.results.len() as f64
    }

    /// Frame count declared by the exporter, else the number of result entries.
    pub fn frame_count_hint(&self) -> u64 {
        self.video_info
            .get("total_frames")
            .and_then(value::as_int)
            .and_then(|n| u64::try_from(n).ok())
            .filter(|&n| n > 0)
            .unwrap_or(self.results.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn det(class: &str, conf: f64) -> Value {
        json!({"class": class, "confidence": conf, "bbox": {"x1": 0, "y1": 0, "x2": 5, "y2": 5}})
    }

    #[test]
    fn single_frame_threshold() {
        let set = DetectionSet::from_value(&json!({
            "video_info": {"fps": 25},
            "results": [{
                "frame": 0,
                "detections": [{
                    "class": "person",
                    "confidence": 0.9,
                    "bbox": {"x1": 10, "y1": 10, "x2": 50, "y2": 100}
                }]
            }]
        }));

        let dets = set.detections_for_frame(0, Some(0.5));
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class, "person");
        assert_eq!(dets[0].bbox.to_pixels(), crate::bbox::PixelBox::new(10, 10, 50, 100));
        assert!(set.detections_for_frame(0, Some(0.95)).is_empty());
    }

    #[test]
    fn non_contiguous_frames_use_scan() {
        let set = DetectionSet::from_value(&json!({
            "results": [
                {"frame": 5, "detections": [det("a", 0.5)]},
                {"frame": 0, "detections": [det("b", 0.5), det("c", 0.5)]},
                {"frame": "7", "detections": [det("d", 0.5)]},
            ]
        }));

        assert_eq!(set.detections_for_frame(0, None).len(), 2);
        assert_eq!(set.detections_for_frame(5, None)[0].class, "a");
        assert_eq!(set.detections_for_frame(7, None)[0].class, "d");
        assert!(set.detections_for_frame(1, None).is_empty());
        assert!(set.detections_for_frame(100, None).is_empty());
    }

    #[test]
    fn threshold_is_monotonic() {
        let set = DetectionSet::from_value(&json!({
            "results": [{"frame": 0, "detections": [
                det("a", 0.1), det("b", 0.4), det("c", 0.4), det("d", 0.8), det("e", 1.0)
            ]}]
        }));

        let thresholds = [0.0, 0.1, 0.3, 0.4, 0.5, 0.8, 0.99, 1.0];
        for w in thresholds.windows(2) {
            let lo = set.detections_for_frame(0, Some(w[0])).len();
            let hi = set.detections_for_frame(0, Some(w[1])).len();
            assert!(hi <= lo, "{} -> {}, {} -> {}", w[0], lo, w[1], hi);
        }
    }

    #[test]
    fn average_detections() {
        let set = DetectionSet::from_value(&json!({
            "results": [
                {"frame": 0, "detections": [det("a", 0.9), det("b", 0.2)]},
                {"frame": 1, "detections": []},
                {"frame": 2, "detections": [det("a", 0.9), det("b", 0.9), det("c", 0.9), det("d", 0.3)]},
            ]
        }));

        assert_eq!(set.average_count_per_frame(None), 2.0);
        assert_eq!(set.average_count_per_frame(Some(0.5)), 4.0 / 3.0);
        assert_eq!(DetectionSet::default().average_count_per_frame(None), 0.0);
    }

    #[test]
    fn malformed_entries_are_counted() {
        let set = DetectionSet::from_value(&json!({
            "results": [
                42,
                {"frame": 0, "detections": "oops"},
                {"frame": 1, "detections": [det("a", 0.9), "junk"]},
                {"frame": 2},
            ]
        }));

        assert_eq!(set.results.len(), 2);
        assert_eq!(set.skipped, 3);
        assert_eq!(set.detections_for_frame(1, None).len(), 1);
        assert!(set.detections_for_frame(2, None).is_empty());
    }

    #[test]
    fn null_detections_are_left_out_of_the_average() {
        let set = DetectionSet::from_value(&json!({
            "results": [
                {"frame": 0, "detections": [det("a", 0.9), det("b", 0.9)]},
                {"frame": 1, "detections": null},
                {"frame": 2},
            ]
        }));

        assert_eq!(set.results.len(), 2);
        assert_eq!(set.skipped, 1);
        assert_eq!(set.average_count_per_frame(None), 1.0);
        assert!(set.detections_for_frame(1, None).is_empty());
    }

    #[test]
    fn non_object_root_is_empty() {
        assert_eq!(DetectionSet::from_value(&json!([1, 2])), DetectionSet::default());
        assert_eq!(
            DetectionSet::from_value(&json!({"results": {"frame": 0}})).results.len(),
            0
        );
    }

    #[test]
    fn missing_fields_fall_back() {
        let set = DetectionSet::from_value(&json!({
            "results": [{"frame": 0, "detections": [{"bbox": {"x1": 3}}]}]
        }));
        let d = &set.detections_for_frame(0, None)[0];
        assert_eq!(d.class, "obj");
        assert_eq!(d.confidence, None);
        assert_eq!(d.label(), "obj");
        assert_eq!(d.bbox.as_slice(), &[3.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn frame_count_hint_prefers_video_info() {
        let set = DetectionSet::from_value(&json!({
            "video_info": {"total_frames": 300},
            "results": [{"frame": 0, "detections": []}]
        }));
        assert_eq!(set.frame_count_hint(), 300);

        let set = DetectionSet::from_value(&json!({
            "results": [{"frame": 0}, {"frame": 1}]
        }));
        assert_eq!(set.frame_count_hint(), 2);
    }
}
