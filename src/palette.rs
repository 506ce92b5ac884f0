//! Fixed BGR palettes. Colors carry no meaning beyond telling boxes apart.

use opencv::core::Scalar;

pub type Bgr = [u8; 3];

/// Muted colors cycled by a detection's position in the frame's list.
pub const DETECTION_PALETTE: [Bgr; 10] = [
    [108, 117, 125],
    [52, 152, 219],
    [46, 204, 113],
    [241, 196, 15],
    [231, 76, 60],
    [155, 89, 182],
    [26, 188, 156],
    [243, 156, 18],
    [149, 165, 166],
    [52, 73, 94],
];

/// Colors keyed by track identity.
pub const TRACK_PALETTE: [Bgr; 10] = [
    [125, 117, 108], // gray-brown
    [219, 152, 52],  // blue
    [113, 204, 46],  // green
    [15, 196, 241],  // yellow
    [60, 76, 231],   // red
    [182, 89, 155],  // purple
    [156, 188, 26],  // teal
    [18, 156, 243],  // orange
    [166, 165, 149], // concrete
    [94, 73, 52],    // wet asphalt
];

#[inline]
pub fn detection_color(position: usize) -> Bgr {
    DETECTION_PALETTE[position % DETECTION_PALETTE.len()]
}

/// Same identity, same color, on every frame and on every render path.
#[inline]
pub fn track_color(track_id: i64) -> Bgr {
    TRACK_PALETTE[(track_id.unsigned_abs() % TRACK_PALETTE.len() as u64) as usize]
}

#[inline]
pub fn scalar(c: Bgr) -> Scalar {
    Scalar::new(c[0] as f64, c[1] as f64, c[2] as f64, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_color_is_stable() {
        let first = track_color(17);
        for id in -50..50 {
            track_color(id);
        }
        assert_eq!(track_color(17), first);
        assert_eq!(track_color(-3), track_color(3));
        assert_eq!(track_color(i64::MIN), TRACK_PALETTE[8]);
    }

    #[test]
    fn detection_color_cycles() {
        assert_eq!(detection_color(0), detection_color(10));
        assert_ne!(detection_color(0), detection_color(1));
    }
}
