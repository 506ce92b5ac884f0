use nalgebra as na;

/// Chaikin corner cutting. Every segment `(p, q)` is replaced by the points at
/// 25% and 75% of its length; the two end points are kept so the curve stays
/// anchored to the newest position.
pub fn chaikin(points: &[na::Point2<f32>], iterations: usize) -> Vec<na::Point2<f32>> {
    if points.len() < 3 || iterations == 0 {
        return points.to_vec();
    }

    let mut pts = points.to_vec();
    for _ in 0..iterations {
        let mut next = Vec::with_capacity(pts.len() * 2);
        next.push(pts[0]);

        for pair in pts.windows(2) {
            let (p, q) = (pair[0].coords, pair[1].coords);
            next.push((p * 0.75 + q * 0.25).into());
            next.push((p * 0.25 + q * 0.75).into());
        }

        next.push(pts[pts.len() - 1]);
        pts = next;
    }

    pts
}

/// Smooths an integer trail and snaps the result back onto the pixel grid.
pub fn smooth_trail(points: &[na::Point2<i32>], iterations: usize) -> Vec<na::Point2<i32>> {
    if points.len() < 3 || iterations == 0 {
        return points.to_vec();
    }

    let pts: Vec<na::Point2<f32>> = points
        .iter()
        .map(|p| na::Point2::new(p.x as f32, p.y as f32))
        .collect();

    chaikin(&pts, iterations)
        .into_iter()
        .map(|p| na::Point2::new(p.x.round_ties_even() as i32, p.y.round_ties_even() as i32))
        .collect()
}
