use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::bbox::{BBox, PixelBox};

/// One tracker-reported box in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    /// 0-based frame index.
    pub frame: u64,
    pub id: i64,
    pub bbox: PixelBox,
    pub confidence: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSet {
    pub source: Option<PathBuf>,
    pub tracks: Vec<TrackPoint>,
    /// Non-comment lines that could not be parsed.
    pub skipped: usize,
}

/// Reads a MOT-style text file (`frame,id,x,y,w,h[,conf]`, 1-based frames).
/// A missing file yields an empty set; unparsable lines are skipped.
pub fn parse_tracks<P: AsRef<Path>>(path: P) -> TrackSet {
    let path = path.as_ref();
    let mut set = TrackSet {
        source: Some(path.to_path_buf()),
        ..Default::default()
    };

    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            debug!("tracks file {} unavailable: {}", path.display(), err);
            return set;
        }
    };

    for line in BufReader::new(file).lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("stopped reading tracks {}: {}", path.display(), err);
                break;
            }
        };

        match parse_line(&line) {
            Some(Some(point)) => set.tracks.push(point),
            Some(None) => (),
            None => {
                debug!("skipping malformed track line {:?}", line);
                set.skipped += 1;
            }
        }
    }

    debug!(
        "loaded {} track points from {} ({} skipped)",
        set.tracks.len(),
        path.display(),
        set.skipped
    );

    set
}

/// `Some(None)` for blank and comment lines, `None` for malformed ones.
fn parse_line(line: &str) -> Option<Option<TrackPoint>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Some(None);
    }

    let mut parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 6 {
        parts = line.split_whitespace().collect();
    }
    if parts.len() < 6 {
        return None;
    }

    // some exporters write frame and id as floats
    let index = |i: usize| parts[i].parse::<f64>().ok().filter(|v| v.is_finite());
    let coord = |i: usize| parts[i].parse::<f32>().ok().filter(|v| v.is_finite());
    let frame = index(0)?.trunc() as i64;
    let id = index(1)?.trunc() as i64;
    let (x, y, w, h) = (coord(2)?, coord(3)?, coord(4)?, coord(5)?);
    let confidence = match parts.get(6) {
        Some(conf) => Some(conf.parse::<f32>().ok().filter(|c| c.is_finite())?),
        None => None,
    };

    Some(Some(TrackPoint {
        frame: frame.saturating_sub(1).max(0) as u64,
        id,
        bbox: BBox::ltwh(x, y, w, h).as_ltrb().to_pixels(),
        confidence,
    }))
}

impl TrackSet {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Owned copies of the points reported for frame `idx`.
    pub fn tracks_for_frame(&self, idx: u64) -> Vec<TrackPoint> {
        self.tracks
            .iter()
            .filter(|t| t.frame == idx)
            .cloned()
            .collect()
    }
}
