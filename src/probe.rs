use std::path::Path;
use std::process::Command;

use serde_derive::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::value::{as_float, as_int};
use crate::video::VideoSource;

const UNKNOWN: &str = "N/A";

/// Container-level facts about a video. Unknown fields stay at zero or `"N/A"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoMetadata {
    pub width: i32,
    pub height: i32,
    pub fps: f64,
    pub frame_count: u64,
    /// Seconds.
    pub duration: f64,
    pub codec: String,
    pub container: String,
    /// Bits per second.
    pub bitrate: u64,
}

impl Default for VideoMetadata {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            fps: 0.0,
            frame_count: 0,
            duration: 0.0,
            codec: UNKNOWN.into(),
            container: UNKNOWN.into(),
            bitrate: 0,
        }
    }
}

impl VideoMetadata {
    /// True while any field a stream probe can supply is still unset.
    pub fn is_incomplete(&self) -> bool {
        self.width == 0
            || self.height == 0
            || self.fps == 0.0
            || self.duration == 0.0
            || self.codec == UNKNOWN
    }
}

/// One source of metadata. Providers only fill fields that are still unset.
pub trait MetadataProvider {
    fn name(&self) -> &'static str;
    fn fill(&self, path: &Path, meta: &mut VideoMetadata) -> Result<(), Error>;
}

/// Capture properties reported by the OpenCV backend.
pub struct OpenCvProvider;

impl MetadataProvider for OpenCvProvider {
    fn name(&self) -> &'static str {
        "opencv"
    }

    fn fill(&self, path: &Path, meta: &mut VideoMetadata) -> Result<(), Error> {
        let src = VideoSource::open(path)?;

        let fps = src.fps();
        let frame_count = src.frame_count();

        if meta.width == 0 {
            meta.width = src.width().max(0);
        }
        if meta.height == 0 {
            meta.height = src.height().max(0);
        }
        if meta.fps == 0.0 && fps > 0.0 {
            meta.fps = fps;
        }
        if meta.frame_count == 0 {
            meta.frame_count = frame_count;
        }
        if meta.duration == 0.0 && fps > 0.0 && frame_count > 0 {
            meta.duration = frame_count as f64 / fps;
        }
        if meta.codec == UNKNOWN {
            if let Some(codec) = fourcc_to_string(src.fourcc()) {
                meta.codec = codec;
            }
        }
        if meta.container == UNKNOWN {
            if let Some(ext) = container_from_path(path) {
                meta.container = ext;
            }
        }

        Ok(())
    }
}

/// Stream and format entries from the `ffprobe` executable, if installed.
pub struct FfprobeProvider;

impl MetadataProvider for FfprobeProvider {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    fn fill(&self, path: &Path, meta: &mut VideoMetadata) -> Result<(), Error> {
        if !meta.is_incomplete() {
            return Ok(());
        }

        let output = Command::new("ffprobe")
            .args(["-v", "error", "-count_frames", "-select_streams", "v:0"])
            .args([
                "-show_entries",
                "stream=width,height,codec_name,avg_frame_rate,nb_read_frames,nb_frames",
            ])
            .args(["-show_entries", "format=duration,bit_rate", "-of", "json"])
            .arg(path)
            .output()?;

        if !output.status.success() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("ffprobe exited with {}", output.status),
            )
            .into());
        }

        let report: Value = serde_json::from_slice(&output.stdout)?;
        apply_ffprobe_report(&report, path, meta);

        Ok(())
    }
}

/// Bitrate estimate from the file size over the known duration.
pub struct FileSizeBitrate;

impl MetadataProvider for FileSizeBitrate {
    fn name(&self) -> &'static str {
        "file-size"
    }

    fn fill(&self, path: &Path, meta: &mut VideoMetadata) -> Result<(), Error> {
        if meta.bitrate > 0 || meta.duration <= 0.0 {
            return Ok(());
        }

        let bits = std::fs::metadata(path)?.len() as f64 * 8.0;
        meta.bitrate = (bits / meta.duration.max(1.0)) as u64;

        Ok(())
    }
}

/// Merges an `ffprobe -of json` report into `meta`, touching only unset fields.
pub fn apply_ffprobe_report(report: &Value, path: &Path, meta: &mut VideoMetadata) {
    if let Some(stream) = report
        .get("streams")
        .and_then(Value::as_array)
        .and_then(|s| s.first())
    {
        let count = |key: &str| {
            stream
                .get(key)
                .and_then(|v| as_int(v).or_else(|| as_float(v).map(|f| f as i64)))
                .filter(|n| *n > 0)
                .map(|n| n as u64)
        };

        if meta.width == 0 {
            meta.width = stream.get("width").and_then(as_int).unwrap_or(0).max(0) as i32;
        }
        if meta.height == 0 {
            meta.height = stream.get("height").and_then(as_int).unwrap_or(0).max(0) as i32;
        }
        if meta.codec == UNKNOWN {
            if let Some(name) = stream.get("codec_name").and_then(Value::as_str) {
                if !name.is_empty() {
                    meta.codec = name.to_uppercase();
                }
            }
        }
        if meta.fps == 0.0 {
            let fps = stream
                .get("avg_frame_rate")
                .and_then(Value::as_str)
                .map(parse_fraction)
                .unwrap_or(0.0);
            if fps > 0.0 {
                meta.fps = fps;
            }
        }
        if meta.frame_count == 0 {
            if let Some(n) = count("nb_read_frames").or_else(|| count("nb_frames")) {
                meta.frame_count = n;
            }
        }
    }

    let format = report.get("format");
    let duration = format
        .and_then(|f| f.get("duration"))
        .and_then(as_float)
        .unwrap_or(0.0);

    if meta.duration == 0.0 && duration > 0.0 {
        meta.duration = duration;
    }
    if meta.frame_count == 0 && meta.fps > 0.0 && duration > 0.0 {
        meta.frame_count = (meta.fps * duration).round_ties_even() as u64;
    }
    if meta.container == UNKNOWN {
        if let Some(ext) = container_from_path(path) {
            meta.container = ext;
        }
    }
    if meta.bitrate == 0 {
        let bit_rate = format
            .and_then(|f| f.get("bit_rate"))
            .and_then(as_int)
            .unwrap_or(0);
        if bit_rate > 0 {
            meta.bitrate = bit_rate as u64;
        }
    }
}

/// Best-effort metadata for `path`. Never fails: a missing file or failing
/// providers leave the corresponding fields at their defaults.
pub fn probe_metadata<P: AsRef<Path>>(path: P) -> VideoMetadata {
    let providers: [&dyn MetadataProvider; 3] = [&OpenCvProvider, &FfprobeProvider, &FileSizeBitrate];
    probe_with(path.as_ref(), &providers)
}

pub fn probe_with(path: &Path, providers: &[&dyn MetadataProvider]) -> VideoMetadata {
    let mut meta = VideoMetadata::default();
    if !path.exists() {
        return meta;
    }

    for provider in providers {
        if let Err(err) = provider.fill(path, &mut meta) {
            debug!("{} metadata for {}: {}", provider.name(), path.display(), err);
        }
    }

    meta
}

/// `"30000/1001"` style rate; a zero denominator counts as 1, garbage as 0.
pub fn parse_fraction(s: &str) -> f64 {
    let parsed = match s.split_once('/') {
        Some((num, den)) => num
            .trim()
            .parse::<f64>()
            .and_then(|n| den.trim().parse::<f64>().map(|d| (n, d))),
        None => s.trim().parse::<f64>().map(|n| (n, 1.0)),
    };

    match parsed {
        Ok((num, den)) => {
            let den = if den == 0.0 { 1.0 } else { den };
            let fps = num / den;
            if fps.is_finite() {
                fps
            } else {
                0.0
            }
        }
        Err(_) => 0.0,
    }
}

/// Little-endian FOURCC code as text, trailing padding removed.
pub fn fourcc_to_string(code: u32) -> Option<String> {
    let text: String = code
        .to_le_bytes()
        .iter()
        .map(|&b| b as char)
        .collect::<String>()
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn container_from_path(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_uppercase())
        .filter(|ext| !ext.is_empty())
}
