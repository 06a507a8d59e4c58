//! Ray intersection against scene geometry and plane extents.
//!
//! All tests are done in the node's local frame: the world ray is mapped
//! through the inverse of the node's world transform.  Transforms are rigid,
//! so the hit distance is the same in both frames.

use arplace_perception::{Transform3D, Vec3};

use crate::graph::{Geometry, NodeId, SceneGraph};

const PARALLEL_EPSILON: f32 = 1e-6;

/// A half-line in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
}

impl Ray {
    /// `direction` is normalised here.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin.add(self.direction.scale(t))
    }

    /// Express the ray in the local frame of a node posed at `pose`.
    pub fn to_local(&self, pose: Transform3D) -> Ray {
        let inv = pose.inverse();
        Ray {
            origin: inv.transform_point(self.origin),
            direction: inv.transform_vector(self.direction),
        }
    }

    /// Distance to the local XY rectangle `|x| ≤ w/2, |y| ≤ h/2, z = 0`.
    pub fn intersect_rect_xy(&self, width: f32, height: f32) -> Option<f32> {
        if self.direction.z.abs() < PARALLEL_EPSILON {
            return None;
        }
        let t = -self.origin.z / self.direction.z;
        if t < 0.0 {
            return None;
        }
        let p = self.at(t);
        (p.x.abs() <= width * 0.5 && p.y.abs() <= height * 0.5).then_some(t)
    }

    /// Distance to the local XZ rectangle of size `extent.x × extent.z`
    /// centred on `center` (the layout of a detected plane's extent).
    pub fn intersect_extent_xz(&self, center: Vec3, extent: Vec3) -> Option<f32> {
        if self.direction.y.abs() < PARALLEL_EPSILON {
            return None;
        }
        let t = (center.y - self.origin.y) / self.direction.y;
        if t < 0.0 {
            return None;
        }
        let p = self.at(t);
        ((p.x - center.x).abs() <= extent.x * 0.5 && (p.z - center.z).abs() <= extent.z * 0.5)
            .then_some(t)
    }

    pub fn intersect_sphere(&self, radius: f32) -> Option<f32> {
        // |o + t·d|² = r² with |d| = 1.
        let b = self.origin.dot(self.direction);
        let c = self.origin.length_squared() - radius * radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let near = -b - sqrt_disc;
        let far = -b + sqrt_disc;
        if near >= 0.0 {
            Some(near)
        } else if far >= 0.0 {
            Some(far)
        } else {
            None
        }
    }

    /// Slab test against an origin-centred box with the given half sizes.
    pub fn intersect_box(&self, half: Vec3) -> Option<f32> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;
        for (o, d, h) in [
            (self.origin.x, self.direction.x, half.x),
            (self.origin.y, self.direction.y, half.y),
            (self.origin.z, self.direction.z, half.z),
        ] {
            if d.abs() < PARALLEL_EPSILON {
                if o.abs() > h {
                    return None;
                }
                continue;
            }
            let t1 = (-h - o) / d;
            let t2 = (h - o) / d;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }
        if t_max < t_min || t_max < 0.0 {
            None
        } else {
            Some(t_min.max(0.0))
        }
    }

    /// Distance to `geometry` for a ray already expressed in node-local space.
    pub fn intersect_geometry(&self, geometry: &Geometry) -> Option<f32> {
        match *geometry {
            Geometry::Empty => None,
            Geometry::Plane { width, height } => self.intersect_rect_xy(width, height),
            Geometry::Sphere { radius } => self.intersect_sphere(radius),
            Geometry::Box {
                width,
                height,
                length,
            } => self.intersect_box(Vec3::new(width * 0.5, height * 0.5, length * 0.5)),
            // Bounding box of the cylinder.
            Geometry::Cylinder { radius, height } => {
                self.intersect_box(Vec3::new(radius, height * 0.5, radius))
            }
        }
    }
}

/// Nearest geometry hit found by [`raycast_scene`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneHit {
    pub node: NodeId,
    pub distance: f32,
    /// Hit point in world space.
    pub point: Vec3,
    /// World pose of the hit node.
    pub world_transform: Transform3D,
}

/// Cast `ray` against every visible node reachable from the root and return
/// the nearest hit.
pub fn raycast_scene(scene: &SceneGraph, ray: &Ray) -> Option<SceneHit> {
    let nodes = scene.descendants(scene.root()).ok()?;
    let mut best: Option<SceneHit> = None;
    for id in nodes {
        let Ok(node) = scene.node(id) else { continue };
        if matches!(node.geometry, Geometry::Empty) || scene.is_effectively_hidden(id).unwrap_or(true) {
            continue;
        }
        let Ok(world) = scene.world_transform(id) else { continue };
        let Some(t) = ray.to_local(world).intersect_geometry(&node.geometry) else {
            continue;
        };
        if best.is_none_or(|b| t < b.distance) {
            best = Some(SceneHit {
                node: id,
                distance: t,
                point: ray.at(t),
                world_transform: world,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeTag};
    use arplace_perception::Quaternion;
    use std::f32::consts::FRAC_PI_2;

    fn down_from(x: f32, y: f32, z: f32) -> Ray {
        Ray::new(Vec3::new(x, y, z), Vec3::new(0.0, -1.0, 0.0))
    }

    fn floor_rotation() -> Quaternion {
        Quaternion::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), -FRAC_PI_2)
    }

    #[test]
    fn rect_hit_inside_and_miss_outside() {
        let ray = Ray::new(Vec3::new(0.1, 0.1, 2.0), Vec3::new(0.0, 0.0, -1.0));
        assert!((ray.intersect_rect_xy(1.0, 1.0).unwrap() - 2.0).abs() < 1e-6);
        assert!(ray.intersect_rect_xy(0.1, 0.1).is_none());
    }

    #[test]
    fn rect_behind_ray_is_missed() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 2.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(ray.intersect_rect_xy(1.0, 1.0).is_none());
    }

    #[test]
    fn extent_respects_center_offset() {
        let ray = down_from(1.4, 1.0, 0.0);
        let extent = Vec3::new(1.0, 0.0, 1.0);
        assert!(ray.intersect_extent_xz(Vec3::zero(), extent).is_none());
        let t = ray.intersect_extent_xz(Vec3::new(1.0, 0.0, 0.0), extent).unwrap();
        assert!((t - 1.0).abs() < 1e-6);
    }

    #[test]
    fn sphere_from_outside_and_inside() {
        let outside = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!((outside.intersect_sphere(1.0).unwrap() - 4.0).abs() < 1e-5);
        let inside = Ray::new(Vec3::zero(), Vec3::new(1.0, 0.0, 0.0));
        assert!((inside.intersect_sphere(1.0).unwrap() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn box_slab_test() {
        let ray = Ray::new(Vec3::new(-3.0, 0.2, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let t = ray.intersect_box(Vec3::new(0.5, 0.5, 0.5)).unwrap();
        assert!((t - 2.5).abs() < 1e-5);
        let above = Ray::new(Vec3::new(-3.0, 0.8, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(above.intersect_box(Vec3::new(0.5, 0.5, 0.5)).is_none());
    }

    #[test]
    fn raycast_finds_flat_cover_through_parent_pose() {
        let mut scene = SceneGraph::new();
        let anchor = scene
            .add_child(
                scene.root(),
                Node::new("anchor")
                    .with_transform(Transform3D::from_translation(Vec3::new(2.0, 0.0, 0.0)))
                    .with_tag(NodeTag::Anchor),
            )
            .unwrap();
        let cover = scene
            .add_child(
                anchor,
                Node::new("cover")
                    .with_geometry(Geometry::Plane { width: 0.4, height: 0.3 })
                    .with_transform(Transform3D::from_rotation(floor_rotation()))
                    .with_tag(NodeTag::ImageSurface),
            )
            .unwrap();

        let hit = raycast_scene(&scene, &down_from(2.1, 1.5, 0.1)).unwrap();
        assert_eq!(hit.node, cover);
        assert!((hit.distance - 1.5).abs() < 1e-5);
        assert!(hit.point.y.abs() < 1e-5);

        assert!(raycast_scene(&scene, &down_from(0.0, 1.5, 0.0)).is_none());
    }

    #[test]
    fn raycast_returns_nearest_and_skips_hidden() {
        let mut scene = SceneGraph::new();
        let low = scene
            .add_child(
                scene.root(),
                Node::new("low")
                    .with_geometry(Geometry::Plane { width: 1.0, height: 1.0 })
                    .with_transform(Transform3D::from_rotation(floor_rotation())),
            )
            .unwrap();
        let high = scene
            .add_child(
                scene.root(),
                Node::new("high")
                    .with_geometry(Geometry::Plane { width: 1.0, height: 1.0 })
                    .with_transform(Transform3D::new(Vec3::new(0.0, 0.5, 0.0), floor_rotation())),
            )
            .unwrap();

        let ray = down_from(0.0, 2.0, 0.0);
        assert_eq!(raycast_scene(&scene, &ray).unwrap().node, high);

        scene.node_mut(high).unwrap().hidden = true;
        assert_eq!(raycast_scene(&scene, &ray).unwrap().node, low);
    }

    #[test]
    fn detached_nodes_are_not_hit() {
        let mut scene = SceneGraph::new();
        scene.add_node(Node::new("loose").with_geometry(Geometry::Sphere { radius: 10.0 }));
        assert!(raycast_scene(&scene, &down_from(0.0, 1.0, 0.0)).is_none());
    }
}
