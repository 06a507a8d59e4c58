//! Pinhole description of the device screen.
//!
//! Maps touch points to world-space rays (and world points back to touch
//! points) for a camera posed in the tracking world.  The camera looks down
//! its local −Z axis with +Y up; screen origin is the top-left corner.

use arplace_perception::{Transform3D, Vec3};
use arplace_scene::Ray;
use arplace_types::ScreenPoint;
use serde::{Deserialize, Serialize};

/// Screen size in pixels plus vertical field of view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub vertical_fov_deg: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 390.0,
            height: 844.0,
            vertical_fov_deg: 60.0,
        }
    }
}

impl Viewport {
    pub fn new(width: f32, height: f32, vertical_fov_deg: f32) -> Self {
        Self {
            width,
            height,
            vertical_fov_deg,
        }
    }

    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.width * 0.5, self.height * 0.5)
    }

    fn tan_half_fov(&self) -> f32 {
        (self.vertical_fov_deg.to_radians() * 0.5).tan()
    }

    fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// World-space ray from the camera centre through `point`.
    pub fn ray_through(&self, point: ScreenPoint, camera_pose: Transform3D) -> Ray {
        let tan_half = self.tan_half_fov();
        let ndc_x = 2.0 * point.x / self.width - 1.0;
        let ndc_y = 1.0 - 2.0 * point.y / self.height;
        let local = Vec3::new(ndc_x * tan_half * self.aspect(), ndc_y * tan_half, -1.0);
        Ray::new(camera_pose.translation, camera_pose.transform_vector(local))
    }

    /// Screen location of a world point, or `None` when it lies behind the
    /// camera.  Points outside the screen bounds are still returned.
    pub fn project(&self, world: Vec3, camera_pose: Transform3D) -> Option<ScreenPoint> {
        let local = camera_pose.inverse().transform_point(world);
        if local.z >= -f32::EPSILON {
            return None;
        }
        let depth = -local.z;
        let tan_half = self.tan_half_fov();
        let ndc_x = local.x / depth / (tan_half * self.aspect());
        let ndc_y = local.y / depth / tan_half;
        Some(ScreenPoint::new(
            (ndc_x + 1.0) * 0.5 * self.width,
            (1.0 - ndc_y) * 0.5 * self.height,
        ))
    }

    pub fn contains(&self, point: ScreenPoint) -> bool {
        (0.0..=self.width).contains(&point.x) && (0.0..=self.height).contains(&point.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arplace_perception::Quaternion;

    #[test]
    fn center_ray_follows_camera_forward() {
        let vp = Viewport::default();
        let ray = vp.ray_through(vp.center(), Transform3D::identity());
        assert!(ray.direction.sub(Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
        assert_eq!(ray.origin, Vec3::zero());
    }

    #[test]
    fn top_edge_ray_matches_half_fov() {
        let vp = Viewport::new(100.0, 100.0, 90.0);
        let ray = vp.ray_through(ScreenPoint::new(50.0, 0.0), Transform3D::identity());
        // 45° up: y == -z.
        assert!((ray.direction.y + ray.direction.z).abs() < 1e-5);
        assert!(ray.direction.y > 0.0);
    }

    #[test]
    fn project_inverts_ray_through() {
        let vp = Viewport::default();
        let camera = Transform3D::new(
            Vec3::new(0.0, 1.4, 0.5),
            Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), -0.6),
        );
        let point = ScreenPoint::new(120.0, 600.0);
        let ray = vp.ray_through(point, camera);
        let back = vp.project(ray.at(2.0), camera).unwrap();
        assert!((back.x - point.x).abs() < 1e-2, "x={}", back.x);
        assert!((back.y - point.y).abs() < 1e-2, "y={}", back.y);
    }

    #[test]
    fn project_behind_camera_is_none() {
        let vp = Viewport::default();
        assert!(vp.project(Vec3::new(0.0, 0.0, 1.0), Transform3D::identity()).is_none());
    }

    #[test]
    fn contains_checks_bounds() {
        let vp = Viewport::new(100.0, 200.0, 60.0);
        assert!(vp.contains(ScreenPoint::new(0.0, 200.0)));
        assert!(!vp.contains(ScreenPoint::new(-1.0, 10.0)));
    }
}
