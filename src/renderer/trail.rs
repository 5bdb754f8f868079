//! Trail sequence: pointer samples that fade out frame by frame
//!
//! Pointer events arrive far less often than the pointer actually moves, so a
//! quick flick would leave a handful of isolated dots. Each new sample is
//! therefore joined to the previous one with evenly spaced points.

use crate::page::PointerPosition;
use serde::{Deserialize, Serialize};

/// Default distance between interpolated points
pub const DEFAULT_POINT_SPACING: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailPoint {
    pub x: f64,
    pub y: f64,
    /// Opacity in [0, 1]; the point is dropped once it reaches zero
    pub alpha: f64,
}

impl TrailPoint {
    fn opaque(x: f64, y: f64) -> Self {
        Self { x, y, alpha: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub struct Trail {
    points: Vec<TrailPoint>,
    last: Option<PointerPosition>,
    spacing: f64,
}

impl Default for Trail {
    fn default() -> Self {
        Self::new(DEFAULT_POINT_SPACING)
    }
}

impl Trail {
    pub fn new(spacing: f64) -> Self {
        Self {
            points: Vec::new(),
            last: None,
            spacing,
        }
    }

    /// Record a pointer sample and return how many points were appended
    ///
    /// `floor(distance / spacing)` points are laid on the segment from the
    /// previous sample, at `t = i / steps` for `i = 1..=steps`, followed by the
    /// sample itself. The last interpolated point therefore coincides with the
    /// sample, which doubles the dot at each event position.
    pub fn push_pointer(&mut self, position: PointerPosition) -> usize {
        let before = self.points.len();

        if let Some(last) = self.last {
            self.points.extend(interpolate(last, position, self.spacing));
        }
        self.points.push(TrailPoint::opaque(position.x, position.y));
        self.last = Some(position);

        self.points.len() - before
    }

    /// Lower every point's opacity by `fade_rate` and drop the ones that are
    /// no longer visible. Returns the number of points removed.
    pub fn fade(&mut self, fade_rate: f64) -> usize {
        let before = self.points.len();
        for point in &mut self.points {
            point.alpha -= fade_rate;
        }
        self.points.retain(|p| p.alpha > 0.0);
        before - self.points.len()
    }

    /// Forget all points and the previous sample
    pub fn clear(&mut self) {
        self.points.clear();
        self.last = None;
    }

    pub fn points(&self) -> &[TrailPoint] {
        &self.points
    }

    pub fn last_position(&self) -> Option<PointerPosition> {
        self.last
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Points strictly after `from` up to and including `to`, `spacing` apart
pub fn interpolate(
    from: PointerPosition,
    to: PointerPosition,
    spacing: f64,
) -> impl Iterator<Item = TrailPoint> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let steps = (from.distance_to(&to) / spacing).floor() as usize;

    (1..=steps).map(move |i| {
        let t = i as f64 / steps as f64;
        TrailPoint::opaque(from.x + dx * t, from.y + dy * t)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: f64, y: f64) -> PointerPosition {
        PointerPosition::new(x, y)
    }

    #[test]
    fn test_first_sample_adds_one_point() {
        let mut trail = Trail::default();
        assert_eq!(trail.push_pointer(pos(10.0, 20.0)), 1);
        assert_eq!(trail.points(), &[TrailPoint::opaque(10.0, 20.0)]);
    }

    #[test]
    fn test_interpolates_fast_movement() {
        let mut trail = Trail::default();
        trail.push_pointer(pos(100.0, 100.0));

        // distance 8 at spacing 4: two interpolated points plus the sample
        assert_eq!(trail.push_pointer(pos(108.0, 100.0)), 3);

        let xs: Vec<f64> = trail.points().iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![100.0, 104.0, 108.0, 108.0]);
        assert!(trail.points().iter().all(|p| p.alpha == 1.0 && p.y == 100.0));
    }

    #[test]
    fn test_point_count_matches_distance() {
        let samples = [
            pos(0.0, 0.0),
            pos(3.0, 4.0),   // 5   -> 1
            pos(3.0, 4.0),   // 0   -> 0
            pos(33.0, 44.0), // 50  -> 12
            pos(35.0, 44.0), // 2   -> 0
        ];
        let mut trail = Trail::default();
        let mut added = 0;
        for sample in samples {
            added += trail.push_pointer(sample);
        }

        let expected = samples.len() + 1 + 12;
        assert_eq!(added, expected);
        assert_eq!(trail.len(), expected);
        assert_eq!(trail.last_position(), Some(pos(35.0, 44.0)));
    }

    #[test]
    fn test_interpolated_points_are_evenly_spaced() {
        let points: Vec<TrailPoint> = interpolate(pos(0.0, 0.0), pos(0.0, 10.0), 4.0).collect();

        // floor(10 / 4) = 2 steps, so the points are 5 apart
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].y, 5.0);
        assert_eq!(points[1].y, 10.0);
    }

    #[test]
    fn test_fade_removes_spent_points() {
        let mut trail = Trail::default();
        trail.push_pointer(pos(0.0, 0.0));

        let fade_rate = 0.25;
        let mut previous_alpha = 1.0;
        for _ in 0..3 {
            assert_eq!(trail.fade(fade_rate), 0);
            let alpha = trail.points()[0].alpha;
            assert!((previous_alpha - alpha - fade_rate).abs() < 1e-12);
            previous_alpha = alpha;
        }

        assert_eq!(trail.fade(fade_rate), 1);
        assert!(trail.is_empty());
    }

    #[test]
    fn test_fade_never_grows_trail() {
        let mut trail = Trail::default();
        trail.push_pointer(pos(0.0, 0.0));
        trail.push_pointer(pos(40.0, 0.0));

        let mut len = trail.len();
        while !trail.is_empty() {
            trail.fade(0.02);
            assert!(trail.len() <= len);
            len = trail.len();
        }
    }

    #[test]
    fn test_clear_forgets_last_sample() {
        let mut trail = Trail::default();
        trail.push_pointer(pos(0.0, 0.0));
        trail.clear();

        assert!(trail.is_empty());
        assert_eq!(trail.last_position(), None);
        // No interpolation against the forgotten sample
        assert_eq!(trail.push_pointer(pos(100.0, 0.0)), 1);
    }
}
