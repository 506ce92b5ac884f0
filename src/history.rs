use std::collections::HashMap;

use nalgebra as na;

use crate::circular_queue::CircularQueue;
use crate::track::{TrackPoint, TrackSet};

pub const DEFAULT_TRAIL_CAPACITY: usize = 25;

/// Recent bottom-center anchors per track identity, used to draw trails.
#[derive(Debug, Clone)]
pub struct TrailHistory {
    capacity: usize,
    trails: HashMap<i64, CircularQueue<na::Point2<i32>>>,
}

impl Default for TrailHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TRAIL_CAPACITY)
    }
}

impl TrailHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            trails: HashMap::new(),
        }
    }

    /// History as it would stand after playing frames
    /// `idx + 1 - window ..= idx` in order. Used when the viewer jumps to an
    /// arbitrary frame and no sequential state is available.
    pub fn rebuild(tracks: &TrackSet, idx: u64, window: usize, capacity: usize) -> Self {
        let mut history = Self::with_capacity(capacity);
        let start = (idx + 1).saturating_sub(window as u64);

        let mut points: Vec<&TrackPoint> = tracks
            .tracks
            .iter()
            .filter(|t| t.frame >= start && t.frame <= idx)
            .collect();
        // stable: points of one frame keep file order
        points.sort_by_key(|t| t.frame);

        for t in points {
            history.push(t);
        }

        history
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn push(&mut self, point: &TrackPoint) {
        let capacity = self.capacity;
        self.trails
            .entry(point.id)
            .or_insert_with(|| CircularQueue::with_capacity(capacity))
            .push(point.bbox.bottom_center());
    }

    /// Appends the anchor of every point of the current frame.
    pub fn update(&mut self, frame_tracks: &[TrackPoint]) {
        for t in frame_tracks {
            self.push(t);
        }
    }

    /// Anchors for `id`, oldest first.
    pub fn trail(&self, id: i64) -> Vec<na::Point2<i32>> {
        self.trails
            .get(&id)
            .map(|q| q.iter().copied().collect())
            .unwrap_or_default()
    }

    #[inline]
    pub fn len(&self, id: i64) -> usize {
        self.trails.get(&id).map_or(0, CircularQueue::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trails.is_empty()
    }

    pub fn clear(&mut self) {
        self.trails.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::PixelBox;

    fn point(frame: u64, id: i64, x: i32) -> TrackPoint {
        TrackPoint {
            frame,
            id,
            bbox: PixelBox::new(x, 0, x + 10, 50),
            confidence: None,
        }
    }

    #[test]
    fn bounded_to_most_recent() {
        let mut h = TrailHistory::default();
        for i in 0..40 {
            h.update(&[point(i, 1, i as i32)]);
        }

        let trail = h.trail(1);
        assert_eq!(trail.len(), DEFAULT_TRAIL_CAPACITY);
        let expected: Vec<_> = (15..40).map(|x| na::Point2::new(x + 5, 50)).collect();
        assert_eq!(trail, expected);
    }

    #[test]
    fn identities_are_independent() {
        let mut h = TrailHistory::with_capacity(3);
        assert_eq!(h.capacity(), 3);
        h.update(&[point(0, 1, 0), point(0, 2, 100)]);
        h.update(&[point(1, 1, 10)]);

        assert_eq!(h.len(1), 2);
        assert_eq!(h.len(2), 1);
        assert_eq!(h.len(3), 0);
        assert!(h.trail(3).is_empty());

        h.clear();
        assert!(h.is_empty());
    }

    #[test]
    fn rebuild_matches_sequential_feed() {
        let set = TrackSet {
            source: None,
            tracks: (0..60)
                .rev()
                .flat_map(|f| vec![point(f, 1, f as i32), point(f, 2, 2 * f as i32)])
                .collect(),
            skipped: 0,
        };

        let mut sequential = TrailHistory::with_capacity(25);
        for f in 0..=40 {
            sequential.update(&set.tracks_for_frame(f));
        }

        let rebuilt = TrailHistory::rebuild(&set, 40, 25, 25);
        assert_eq!(rebuilt.trail(1), sequential.trail(1));
        assert_eq!(rebuilt.trail(2), sequential.trail(2));

        let early = TrailHistory::rebuild(&set, 3, 25, 25);
        assert_eq!(early.len(1), 4);
    }
}
