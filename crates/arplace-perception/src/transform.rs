//! Pose math for anchors, cameras and placed objects.
//!
//! A pose is a rigid-body [`Transform3D`] (translation + unit quaternion).
//! [`Transform3D::to_matrix`] exposes the equivalent column-major 4×4
//! matrix for hosts that exchange poses as matrices.
//!
//! Conventions follow the camera-tracking world: +Y is up, the camera looks
//! down its local −Z axis.
//!
//! # Example
//!
//! ```rust
//! use arplace_perception::transform::{forward_pose, Transform3D};
//!
//! let pose = forward_pose(Transform3D::identity());
//! assert!((pose.translation.z + 0.2).abs() < 1e-6);
//! ```

use std::f32::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

/// Distance in front of the camera used by freeform placement (metres).
pub const FORWARD_OFFSET_M: f32 = 0.2;

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D vector / point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Unit vector in the same direction.  The zero vector is returned
    /// unchanged.
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            self
        } else {
            self.scale(1.0 / len)
        }
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `angle_rad` radians about `axis` (normalised here).
    pub fn from_axis_angle(axis: Vec3, angle_rad: f32) -> Self {
        let axis = axis.normalize();
        let (s, c) = (angle_rad * 0.5).sin_cos();
        Self::new(c, axis.x * s, axis.y * s, axis.z * s)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Re-normalise to unit length to counter accumulated float drift.
    pub fn normalize(self) -> Self {
        let n = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if n <= f32::EPSILON {
            Self::identity()
        } else {
            Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
        }
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }

    /// Row-major 3×3 rotation matrix (`m[row][col]`).
    pub fn to_rotation_matrix(self) -> [[f32; 3]; 3] {
        let Self { w, x, y, z } = self;
        [
            [
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y - w * z),
                2.0 * (x * z + w * y),
            ],
            [
                2.0 * (x * y + w * z),
                1.0 - 2.0 * (x * x + z * z),
                2.0 * (y * z - w * x),
            ],
            [
                2.0 * (x * z - w * y),
                2.0 * (y * z + w * x),
                1.0 - 2.0 * (x * x + y * y),
            ],
        ]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform: rotation followed by translation.
///
/// Represents the pose of a child frame in its parent: to convert a point
/// expressed in the child frame into the parent, rotate it by `rotation`
/// then add `translation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform3D {
    /// Create a transform from a translation and rotation.
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Pure translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quaternion::identity())
    }

    /// Pure rotation.
    pub fn from_rotation(rotation: Quaternion) -> Self {
        Self::new(Vec3::zero(), rotation)
    }

    /// Chain two transforms, `other` expressed in the frame of `self`.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.  In matrix
    /// terms this is the right-multiplication `self · other`.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation).normalize();
        Self::new(translated, rotated)
    }

    /// The inverse transform: T_B_A for `self` = T_A_B.
    pub fn inverse(self) -> Self {
        let inv_rot = self.rotation.conjugate();
        let inv_trans = inv_rot.rotate(self.translation).scale(-1.0);
        Self::new(inv_trans, inv_rot)
    }

    /// Map a point from the child frame into the parent frame.
    pub fn transform_point(self, p: Vec3) -> Vec3 {
        self.translation.add(self.rotation.rotate(p))
    }

    /// Rotate a direction from the child frame into the parent frame.
    pub fn transform_vector(self, v: Vec3) -> Vec3 {
        self.rotation.rotate(v)
    }

    /// Position component of the pose.
    pub fn position(self) -> Vec3 {
        self.translation
    }

    /// Column-major 4×4 matrix (`m[column][row]`), last column holds the
    /// translation.
    pub fn to_matrix(self) -> [[f32; 4]; 4] {
        let r = self.rotation.to_rotation_matrix();
        let t = self.translation;
        [
            [r[0][0], r[1][0], r[2][0], 0.0],
            [r[0][1], r[1][1], r[2][1], 0.0],
            [r[0][2], r[1][2], r[2][2], 0.0],
            [t.x, t.y, t.z, 1.0],
        ]
    }

    /// Decompose the rotation into `(pitch, yaw, roll)` Euler angles using
    /// the scene-graph convention `R = Ry(yaw) · Rx(pitch) · Rz(roll)`.
    ///
    /// At the ±90° pitch singularity roll is folded into yaw.
    pub fn euler_angles(self) -> (f32, f32, f32) {
        let m = self.rotation.to_rotation_matrix();
        let sin_pitch = (-m[1][2]).clamp(-1.0, 1.0);
        let pitch = sin_pitch.asin();
        if sin_pitch.abs() > 0.9999 {
            let yaw = (-m[2][0]).atan2(m[0][0]);
            (pitch, yaw, 0.0)
        } else {
            let yaw = m[0][2].atan2(m[2][2]);
            let roll = m[1][0].atan2(m[1][1]);
            (pitch, yaw, roll)
        }
    }

    /// Same pose with the pitch component removed, so an object placed with
    /// it stands upright regardless of the surface tilt.
    pub fn level_pitch(self) -> Self {
        let (_, yaw, roll) = self.euler_angles();
        let rotation = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), yaw)
            .mul(Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), roll))
            .normalize();
        Self::new(self.translation, rotation)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Placement helpers
// ────────────────────────────────────────────────────────────────────────────

/// Width and depth of a flat horizontal visual (metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneSize {
    pub width: f32,
    pub depth: f32,
}

/// Pose [`FORWARD_OFFSET_M`] in front of the camera, turned 90° about the
/// camera's local Z axis.
pub fn forward_pose(camera_pose: Transform3D) -> Transform3D {
    forward_pose_with_offset(camera_pose, FORWARD_OFFSET_M)
}

/// [`forward_pose`] with an explicit offset along the viewing direction.
///
/// Computed as `camera_pose · translation(0, 0, −offset) · rotation_z(90°)`.
pub fn forward_pose_with_offset(camera_pose: Transform3D, offset_m: f32) -> Transform3D {
    let translation = Transform3D::from_translation(Vec3::new(0.0, 0.0, -offset_m));
    let rotation =
        Transform3D::from_rotation(Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), FRAC_PI_2));
    camera_pose.compose(translation).compose(rotation)
}

/// Plane extent → visual size.  Planes are horizontal, so `y` is ignored.
pub fn extent_to_size(extent: Vec3) -> PlaneSize {
    PlaneSize {
        width: extent.x,
        depth: extent.z,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_1_SQRT_2, PI};

    fn assert_vec_near(a: Vec3, b: Vec3) {
        assert!(
            a.sub(b).length() < 1e-5,
            "expected {b:?}, got {a:?}"
        );
    }

    // ── Quaternion ──────────────────────────────────────────────────────────

    #[test]
    fn quaternion_90deg_about_z_rotates_x_to_y() {
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), FRAC_PI_2);
        assert!((q.w - FRAC_1_SQRT_2).abs() < 1e-6);
        assert!((q.z - FRAC_1_SQRT_2).abs() < 1e-6);
        assert_vec_near(q.rotate(Vec3::new(1.0, 0.0, 0.0)), Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn rotation_matrix_matches_rotate() {
        let q = Quaternion::from_axis_angle(Vec3::new(1.0, 2.0, -0.5), 0.8);
        let v = Vec3::new(0.3, -1.2, 2.0);
        let m = q.to_rotation_matrix();
        let via_matrix = Vec3::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        );
        assert_vec_near(via_matrix, q.rotate(v));
    }

    // ── Transform3D ─────────────────────────────────────────────────────────

    #[test]
    fn compose_with_inverse_is_identity() {
        let t = Transform3D::new(
            Vec3::new(1.0, -2.0, 0.5),
            Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), 1.1),
        );
        let id = t.compose(t.inverse());
        assert_vec_near(id.translation, Vec3::zero());
        assert!((id.rotation.w.abs() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn transform_point_applies_rotation_then_translation() {
        let t = Transform3D::new(
            Vec3::new(0.0, 0.0, 1.0),
            Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), FRAC_PI_2),
        );
        assert_vec_near(t.transform_point(Vec3::new(1.0, 0.0, 0.0)), Vec3::new(0.0, 1.0, 1.0));
    }

    #[test]
    fn to_matrix_is_column_major_with_translation_last() {
        let t = Transform3D::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let m = t.to_matrix();
        assert_eq!(m[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(m[0], [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn euler_angles_recover_yaw_pitch_roll() {
        let (yaw, pitch, roll) = (0.7, -0.3, 0.2);
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), yaw)
            .mul(Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), pitch))
            .mul(Quaternion::from_axis_angle(Vec3::new(0.0, 0.0, 1.0), roll));
        let (p, y, r) = Transform3D::from_rotation(q).euler_angles();
        assert!((p - pitch).abs() < 1e-4, "pitch={p}");
        assert!((y - yaw).abs() < 1e-4, "yaw={y}");
        assert!((r - roll).abs() < 1e-4, "roll={r}");
    }

    #[test]
    fn level_pitch_removes_floor_tilt() {
        // A flat image cover: yawed anchor, child tilted -90° about X.
        let yaw = 0.5;
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), yaw)
            .mul(Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), -FRAC_PI_2));
        let pose = Transform3D::new(Vec3::new(0.2, 0.0, -1.0), q);

        let level = pose.level_pitch();
        let (p, y, _) = level.euler_angles();
        assert!(p.abs() < 1e-4, "pitch={p}");
        assert!((y - yaw).abs() < 1e-4, "yaw={y}");
        assert_vec_near(level.translation, pose.translation);
        // Local up stays world up.
        assert_vec_near(level.transform_vector(Vec3::new(0.0, 1.0, 0.0)), Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn level_pitch_keeps_upright_pose() {
        let q = Quaternion::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), PI / 3.0);
        let pose = Transform3D::from_rotation(q);
        let level = pose.level_pitch();
        let v = Vec3::new(1.0, 0.0, 0.0);
        assert_vec_near(level.transform_vector(v), pose.transform_vector(v));
    }

    // ── Placement helpers ───────────────────────────────────────────────────

    #[test]
    fn forward_pose_of_identity_camera() {
        let pose = forward_pose(Transform3D::identity());
        assert_vec_near(pose.translation, Vec3::new(0.0, 0.0, -0.2));
        // 90° about Z: local X becomes Y, local Y becomes -X.
        assert_vec_near(pose.transform_vector(Vec3::new(1.0, 0.0, 0.0)), Vec3::new(0.0, 1.0, 0.0));
        assert_vec_near(pose.transform_vector(Vec3::new(0.0, 1.0, 0.0)), Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn forward_pose_offset_recovered_in_camera_frame() {
        let camera = Transform3D::new(
            Vec3::new(0.4, 1.5, -0.3),
            Quaternion::from_axis_angle(Vec3::new(1.0, 1.0, 0.0), -0.6),
        );
        let pose = forward_pose(camera);
        let local = camera.inverse().compose(pose);
        assert_vec_near(local.translation, Vec3::new(0.0, 0.0, -FORWARD_OFFSET_M));
        assert!((pose.translation.sub(camera.translation).length() - 0.2).abs() < 1e-5);
    }

    #[test]
    fn forward_pose_with_custom_offset() {
        let pose = forward_pose_with_offset(Transform3D::identity(), 0.5);
        assert_vec_near(pose.translation, Vec3::new(0.0, 0.0, -0.5));
    }

    #[test]
    fn extent_to_size_ignores_y() {
        let size = extent_to_size(Vec3::new(2.0, 9.0, 1.5));
        assert_eq!(size, PlaneSize { width: 2.0, depth: 1.5 });
    }

    #[test]
    fn transform_json_shape() {
        let json = serde_json::to_value(Transform3D::identity()).unwrap();
        assert_eq!(json["rotation"]["w"], 1.0);
        assert_eq!(json["translation"]["z"], 0.0);
    }
}
