use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde_derive::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Error;
use crate::value;

/// Class written by the classifier when the crop was too small to judge.
pub const SMALL_BBOX_CLASS: &str = "small_bbox";

/// One shoe classification attached to a track identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ShoeLabel {
    pub track_id: i64,
    pub frame: u64,
    pub class: String,
    pub confidence: Option<f64>,
    /// Fields such as `area` or `crop_size` kept verbatim.
    pub extra: Map<String, Value>,
}

/// Track-lifetime label: the most confident record seen for an identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticShoeLabel {
    pub class: String,
    pub confidence: f64,
    pub frame: u64,
}

impl StaticShoeLabel {
    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.class, self.confidence)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ShoeSummary {
    pub counts: BTreeMap<String, usize>,
    pub avg_confidence: BTreeMap<String, f64>,
}

impl ShoeSummary {
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Legend lines, sorted by class.
    pub fn lines(&self) -> Vec<String> {
        self.counts
            .iter()
            .map(|(class, count)| match self.avg_confidence.get(class) {
                Some(avg) => format!("{}: {} (avg {:.2})", class, count, avg),
                None => format!("{}: {}", class, count),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShoeLabelSet {
    pub labels: Vec<ShoeLabel>,
    /// Entries rejected for a bad key, frame or shape. Small-crop entries
    /// are dropped by policy and not counted here.
    pub skipped: usize,
}

/// Reads a shoe-label JSON object keyed by track id. A missing or malformed
/// file yields an empty set.
pub fn parse_shoe_labels<P: AsRef<Path>>(path: P) -> ShoeLabelSet {
    let path = path.as_ref();
    if !path.exists() {
        debug!("shoe labels file {} not found", path.display());
        return ShoeLabelSet::default();
    }

    match load(path) {
        Ok(set) => {
            debug!(
                "loaded {} shoe labels from {} ({} skipped)",
                set.labels.len(),
                path.display(),
                set.skipped
            );
            set
        }
        Err(err) => {
            warn!("unable to read shoe labels {}: {}", path.display(), err);
            ShoeLabelSet::default()
        }
    }
}

fn load(path: &Path) -> Result<ShoeLabelSet, Error> {
    let text = fs::read_to_string(path)?;
    let root: Value = serde_json::from_str(&text)?;

    Ok(ShoeLabelSet::from_value(&root))
}

impl ShoeLabelSet {
    pub fn from_value(root: &Value) -> Self {
        let mut set = Self::default();
        let root = match root.as_object() {
            Some(root) => root,
            None => return set,
        };

        for (key, item) in root {
            let item = match item.as_object() {
                Some(item) => item,
                None => {
                    set.skipped += 1;
                    continue;
                }
            };

            let class = item.get("class").and_then(value::as_label);
            let is_small = class
                .as_deref()
                .unwrap_or("None")
                .eq_ignore_ascii_case(SMALL_BBOX_CLASS);
            if is_small {
                continue;
            }

            let frame = item.get("frame").map_or(Some(-1), value::as_int);
            let track_id = key.trim().parse::<i64>().ok();
            let (frame, track_id) = match (frame, track_id) {
                (Some(frame), Some(id)) if frame >= 0 => (frame as u64, id),
                _ => {
                    set.skipped += 1;
                    continue;
                }
            };

            let extra = item
                .iter()
                .filter(|(k, _)| !matches!(k.as_str(), "class" | "confidence" | "frame"))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            set.labels.push(ShoeLabel {
                track_id,
                frame,
                class: class.unwrap_or_else(|| "Unknown".to_string()),
                confidence: item.get("confidence").and_then(value::as_float),
                extra,
            });
        }

        set
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels_for_frame(&self, idx: u64) -> impl Iterator<Item = &ShoeLabel> {
        self.labels.iter().filter(move |l| l.frame == idx)
    }

    /// Highest-confidence record per track identity, independent of frame.
    /// A missing confidence ranks as 0.0; ties keep the earlier record.
    pub fn static_labels(&self) -> HashMap<i64, StaticShoeLabel> {
        let mut out: HashMap<i64, StaticShoeLabel> = HashMap::new();

        for label in &self.labels {
            let confidence = label.confidence.unwrap_or(0.0);
            let better = out
                .get(&label.track_id)
                .map_or(true, |prev| confidence > prev.confidence);

            if better {
                out.insert(
                    label.track_id,
                    StaticShoeLabel {
                        class: label.class.clone(),
                        confidence,
                        frame: label.frame,
                    },
                );
            }
        }

        out
    }

    /// Per-class counts and mean confidence, for one frame or the whole set.
    pub fn summarize_by_class(&self, frame: Option<u64>) -> ShoeSummary {
        let mut counts = BTreeMap::new();
        let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();

        let labels = self
            .labels
            .iter()
            .filter(|l| frame.map_or(true, |f| l.frame == f));

        for label in labels {
            *counts.entry(label.class.clone()).or_insert(0) += 1;

            if let Some(conf) = label.confidence {
                let slot = sums.entry(label.class.clone()).or_insert((0.0, 0));
                slot.0 += conf;
                slot.1 += 1;
            }
        }

        let avg_confidence = sums
            .into_iter()
            .map(|(class, (sum, n))| (class, sum / n as f64))
            .collect();

        ShoeSummary {
            counts,
            avg_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ShoeLabelSet {
        ShoeLabelSet::from_value(&json!({
            "1": {"class": "Sneakers", "confidence": 0.659, "frame": 1313, "area": 3650.5, "crop_size": "64x64"},
            "2": {"class": "small_bbox", "confidence": 0.99, "frame": 10},
            "3": {"class": "SMALL_BBOX", "frame": 11},
            "4": {"class": "Boots", "confidence": "0.5", "frame": "20"},
            "5": {"class": "Sneakers", "frame": 20},
            "x": {"class": "Boots", "confidence": 0.9, "frame": 1},
            "6": {"class": "Boots", "confidence": 0.9, "frame": -4},
            "7": {"class": "Boots", "confidence": 0.9},
            "8": "not an object",
        }))
    }

    #[test]
    fn drops_small_bbox_and_bad_entries() {
        let set = sample();
        assert!(set.labels.iter().all(|l| !l.class.eq_ignore_ascii_case("small_bbox")));

        let mut ids: Vec<i64> = set.labels.iter().map(|l| l.track_id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 4, 5]);
        assert_eq!(set.skipped, 4);
    }

    #[test]
    fn keeps_passthrough_fields() {
        let set = sample();
        let first = set.labels.iter().find(|l| l.track_id == 1).unwrap();
        assert_eq!(first.extra.get("crop_size"), Some(&json!("64x64")));
        assert!(!first.extra.contains_key("class"));

        let coerced = set.labels.iter().find(|l| l.track_id == 4).unwrap();
        assert_eq!(coerced.frame, 20);
        assert_eq!(coerced.confidence, Some(0.5));
    }

    #[test]
    fn labels_by_frame() {
        let set = sample();
        let mut ids: Vec<i64> = set.labels_for_frame(20).map(|l| l.track_id).collect();
        ids.sort();
        assert_eq!(ids, vec![4, 5]);
        assert_eq!(set.labels_for_frame(0).count(), 0);
    }

    #[test]
    fn static_labels_take_max_confidence() {
        let set = ShoeLabelSet {
            labels: vec![
                ShoeLabel {
                    track_id: 1,
                    frame: 3,
                    class: "Boots".into(),
                    confidence: Some(0.4),
                    extra: Map::new(),
                },
                ShoeLabel {
                    track_id: 1,
                    frame: 9,
                    class: "Sneakers".into(),
                    confidence: Some(0.8),
                    extra: Map::new(),
                },
                ShoeLabel {
                    track_id: 2,
                    frame: 4,
                    class: "Sandals".into(),
                    confidence: None,
                    extra: Map::new(),
                },
            ],
            skipped: 0,
        };

        let labels = set.static_labels();
        assert_eq!(labels[&1].class, "Sneakers");
        assert_eq!(labels[&1].frame, 9);
        assert_eq!(labels[&2].confidence, 0.0);
        assert_eq!(labels[&1].caption(), "Sneakers 0.80");
    }

    #[test]
    fn summary_by_frame_and_total() {
        let set = sample();

        let frame = set.summarize_by_class(Some(20));
        assert_eq!(frame.counts.get("Boots"), Some(&1));
        assert_eq!(frame.counts.get("Sneakers"), Some(&1));
        assert_eq!(frame.avg_confidence.get("Boots"), Some(&0.5));
        assert!(!frame.avg_confidence.contains_key("Sneakers"));
        assert_eq!(frame.lines(), vec!["Boots: 1 (avg 0.50)", "Sneakers: 1"]);

        let all = set.summarize_by_class(None);
        assert_eq!(all.counts.get("Sneakers"), Some(&2));
        assert_eq!(all.avg_confidence.get("Sneakers"), Some(&0.659));

        assert!(set.summarize_by_class(Some(999)).is_empty());
    }
}
