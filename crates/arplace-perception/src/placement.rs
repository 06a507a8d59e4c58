//! Minimum spacing between consecutive placements.
//!
//! Dragging a finger across the screen produces a touch event per frame; the
//! filter keeps that from stacking dozens of objects on top of each other.

use crate::transform::Vec3;

/// Default minimum spacing between two consecutive placements (metres).
pub const DEFAULT_MINIMUM_DISTANCE_M: f32 = 0.07;

/// `true` when `candidate` is strictly farther than `minimum_distance` from
/// `last`, or when nothing has been placed yet.
///
/// Compares squared distances; a candidate exactly `minimum_distance` away is
/// rejected.
pub fn is_far_enough(last: Option<Vec3>, candidate: Vec3, minimum_distance: f32) -> bool {
    match last {
        None => true,
        Some(last) => candidate.sub(last).length_squared() > minimum_distance * minimum_distance,
    }
}

/// [`is_far_enough`] bound to a configured spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementFilter {
    minimum_distance: f32,
}

impl Default for PlacementFilter {
    fn default() -> Self {
        Self::new(DEFAULT_MINIMUM_DISTANCE_M)
    }
}

impl PlacementFilter {
    /// `minimum_distance` is clamped to be non-negative.
    pub fn new(minimum_distance: f32) -> Self {
        Self {
            minimum_distance: minimum_distance.max(0.0),
        }
    }

    pub fn minimum_distance(&self) -> f32 {
        self.minimum_distance
    }

    pub fn accepts(&self, last: Option<Vec3>, candidate: Vec3) -> bool {
        is_far_enough(last, candidate, self.minimum_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_placement_always_allowed() {
        assert!(is_far_enough(None, Vec3::zero(), 0.07));
        assert!(is_far_enough(None, Vec3::new(100.0, 0.0, 0.0), 1e6));
    }

    #[test]
    fn too_close_is_rejected() {
        let last = Some(Vec3::zero());
        assert!(!is_far_enough(last, Vec3::new(0.05, 0.0, 0.0), 0.07));
    }

    #[test]
    fn far_enough_is_accepted() {
        let last = Some(Vec3::new(1.0, 1.0, 1.0));
        assert!(is_far_enough(last, Vec3::new(1.0, 1.1, 1.0), 0.07));
    }

    #[test]
    fn exact_boundary_is_rejected() {
        // 0.5 and 0.25 are exact in binary floating point.
        let last = Some(Vec3::zero());
        assert!(!is_far_enough(last, Vec3::new(0.0, 0.0, 0.5), 0.5));
        assert!(!is_far_enough(last, Vec3::new(0.0, 0.25, 0.0), 0.25));
    }

    #[test]
    fn distance_uses_all_three_axes() {
        // Each axis contributes 0.05 → distance ≈ 0.0866 > 0.07.
        let last = Some(Vec3::zero());
        assert!(is_far_enough(last, Vec3::new(0.05, 0.05, 0.05), 0.07));
    }

    #[test]
    fn filter_clamps_negative_distance() {
        let filter = PlacementFilter::new(-1.0);
        assert_eq!(filter.minimum_distance(), 0.0);
        // Zero spacing still rejects an identical position.
        assert!(!filter.accepts(Some(Vec3::zero()), Vec3::zero()));
        assert!(filter.accepts(Some(Vec3::zero()), Vec3::new(0.001, 0.0, 0.0)));
    }

    #[test]
    fn default_filter_uses_seven_centimetres() {
        assert_eq!(PlacementFilter::default().minimum_distance(), DEFAULT_MINIMUM_DISTANCE_M);
    }
}
