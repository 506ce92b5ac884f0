use std::path::PathBuf;

use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::history::DEFAULT_TRAIL_CAPACITY;
use crate::palette::Bgr;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathsConfig,
    pub render: RenderOptions,
    pub history: HistoryConfig,
    pub export: ExportConfig,
    pub masks: Vec<MaskConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub video: PathBuf,
    pub detections: PathBuf,
    pub tracks: PathBuf,
    pub shoes: PathBuf,
    /// TTF face with broad glyph coverage, used with the `freetype` feature.
    pub font: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            video: "data/raw/basketball_000.mp4".into(),
            detections: "assets/yolo_det/basketball_000.json".into(),
            tracks: "assets/tracks/basketball_000.txt".into(),
            shoes: "assets/shoes/basketball_000.json".into(),
            font: "assets/DejaVuSans.ttf".into(),
        }
    }
}

/// Selects which overlay passes run and how they look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub roi: bool,
    pub detections: bool,
    pub tracks: bool,
    pub trails: bool,
    pub shoe_labels: bool,
    pub shoe_legend: bool,
    pub min_confidence: Option<f32>,
    /// Chaikin passes applied to trails; 0 draws the raw polyline.
    pub smooth_iterations: usize,
    pub trail_thickness: i32,
    pub box_thickness: i32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            roi: true,
            detections: true,
            tracks: true,
            trails: true,
            shoe_labels: true,
            shoe_legend: false,
            min_confidence: None,
            smooth_iterations: 2,
            trail_thickness: 2,
            box_thickness: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_TRAIL_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub fourcc: String,
    /// Frames between two progress log lines in the CLI.
    pub log_every: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            fourcc: "mp4v".into(),
            log_every: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskConfig {
    pub name: String,
    pub path: PathBuf,
    /// Tint in BGR order.
    pub color: Bgr,
    pub opacity: f64,
}

impl MaskConfig {
    pub fn defaults() -> Vec<MaskConfig> {
        vec![
            MaskConfig {
                name: "floor".into(),
                path: "assets/mask/floor_mask.png".into(),
                color: [0, 255, 0],
                opacity: 0.3,
            },
            MaskConfig {
                name: "window".into(),
                path: "assets/mask/window_mask.png".into(),
                color: [255, 0, 0],
                opacity: 0.6,
            },
        ]
    }
}

impl Settings {
    /// Built-in defaults with the stock floor and window masks.
    pub fn with_default_masks() -> Self {
        Self {
            masks: MaskConfig::defaults(),
            ..Default::default()
        }
    }

    /// Optional `courtside.{toml,yaml,json}` in the working directory, then
    /// `COURTSIDE__SECTION__KEY` environment variables.
    pub fn load() -> Result<Self, Error> {
        Self::load_from("courtside")
    }

    pub fn load_from(basename: &str) -> Result<Self, Error> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(basename).required(false))
            .add_source(config::Environment::with_prefix("COURTSIDE").separator("__"))
            .build()?;

        let mut settings: Settings = cfg.try_deserialize()?;
        if settings.masks.is_empty() {
            settings.masks = MaskConfig::defaults();
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("nothing-here");
        let s = Settings::load_from(&base.to_string_lossy()).unwrap();

        assert_eq!(s.history.capacity, 25);
        assert_eq!(s.export.fourcc, "mp4v");
        assert_eq!(s.render, RenderOptions::default());
        assert_eq!(s.masks, MaskConfig::defaults());
    }

    #[test]
    fn partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
[render]
shoe_legend = true
smooth_iterations = 3

[history]
capacity = 10

[[masks]]
name = "paint"
path = "assets/mask/paint.png"
color = [0, 0, 255]
opacity = 0.4
"#
        )
        .unwrap();

        let base = dir.path().join("review");
        let s = Settings::load_from(&base.to_string_lossy()).unwrap();

        assert!(s.render.shoe_legend);
        assert!(s.render.tracks);
        assert_eq!(s.render.smooth_iterations, 3);
        assert_eq!(s.history.capacity, 10);
        assert_eq!(s.masks.len(), 1);
        assert_eq!(s.masks[0].color, [0, 0, 255]);
        assert_eq!(s.paths.font, PathBuf::from("assets/DejaVuSans.ttf"));
    }
}
