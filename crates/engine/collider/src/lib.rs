//! Triangle-set collider with a surface-area-heuristic BVH
//!
//! A [`Collider`] owns an ordered set of triangles and a bounding volume
//! hierarchy rebuilt on demand. Queries test arbitrary shapes against the
//! triangles, find the nearest line hit, or enumerate the intersecting
//! triangle pairs between two colliders, optionally swept over a motion
//! interval (continuous collision detection).
//!
//! Mutators mark the collider dirty; every query requires [`Collider::rebuild`]
//! first and fails with [`ColliderError::Dirty`] otherwise.

mod build;
mod pairs;
mod serialize;

pub use pairs::{collision_detection, CollisionConfig, CollisionPair, CollisionResult};

use glam::Vec3;
use skein_core::Severity;
use skein_geometry::{Aabb, Line, TestShape, Transform, Triangle};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColliderError {
    /// Query was issued while the BVH needs a rebuild.
    #[error("collider queried while dirty; call rebuild() first")]
    Dirty,

    /// Serialized form did not parse.
    #[error("format error: {0}")]
    Format(String),

    /// Serialized form ended prematurely.
    #[error("not enough data: expected {expected} more bytes, {available} available")]
    NotEnoughData { expected: usize, available: usize },

    /// Mesh import received a non-triangle topology.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
}

impl ColliderError {
    /// Severity this kind of error is logged with.
    pub fn severity(&self) -> Severity {
        match self {
            ColliderError::Dirty => Severity::Error,
            ColliderError::Format(_) => Severity::Error,
            ColliderError::NotEnoughData { .. } => Severity::Error,
            ColliderError::InvalidMesh(_) => Severity::Error,
        }
    }
}

/// One BVH node.
///
/// `left < 0 && right < 0` marks an inner node whose children live at
/// `-left` and `-right`; otherwise `left..right` is a half-open range into
/// the triangle vector. The root is node 0 and the left child of any inner
/// node is its immediate successor, keeping siblings cache-adjacent.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BvhNode {
    pub left: i32,
    pub right: i32,
}

impl BvhNode {
    #[inline]
    pub fn is_inner(&self) -> bool {
        self.left < 0
    }

    #[inline]
    pub fn children(&self) -> (usize, usize) {
        debug_assert!(self.is_inner());
        ((-self.left) as usize, (-self.right) as usize)
    }

    #[inline]
    pub fn triangle_range(&self) -> std::ops::Range<usize> {
        debug_assert!(!self.is_inner());
        self.left as usize..self.right as usize
    }
}

/// Triangle-set collider. See the crate docs.
#[derive(Debug, Clone)]
pub struct Collider {
    pub(crate) tris: Vec<Triangle>,
    pub(crate) boxes: Vec<Aabb>,
    pub(crate) nodes: Vec<BvhNode>,
    pub(crate) dirty: bool,
}

impl Default for Collider {
    fn default() -> Self {
        Self::new()
    }
}

impl Collider {
    pub fn new() -> Self {
        let mut c = Self { tris: Vec::new(), boxes: Vec::new(), nodes: Vec::new(), dirty: true };
        c.rebuild();
        c
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.tris
    }

    pub fn add_triangle(&mut self, t: Triangle) {
        debug_assert!(t.is_valid());
        self.tris.push(t);
        self.dirty = true;
    }

    pub fn add_triangles(&mut self, tris: &[Triangle]) {
        debug_assert!(tris.iter().all(|t| t.is_valid()));
        self.tris.extend_from_slice(tris);
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.tris.clear();
        self.dirty = true;
    }

    /// Deduplicates triangles (after canonically ordering each triangle's
    /// vertices) and drops degenerate ones.
    pub fn optimize(&mut self) {
        fn key(v: &Vec3) -> [u32; 3] {
            [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()]
        }
        let mut canonical: Vec<Triangle> = self
            .tris
            .iter()
            .filter(|t| !t.is_degenerate())
            .map(|t| {
                let mut vs = t.vertices;
                vs.sort_by_key(key);
                Triangle { vertices: vs }
            })
            .collect();
        canonical.sort_by_key(|t| [key(&t[0]), key(&t[1]), key(&t[2])]);
        canonical.dedup();
        self.tris = canonical;
        self.dirty = true;
    }

    /// Replaces the triangle set from mesh arrays. With empty `indices` the
    /// positions are taken as a triangle soup.
    pub fn import_mesh(&mut self, positions: &[Vec3], indices: &[u32]) -> Result<(), ColliderError> {
        self.clear();
        if indices.is_empty() {
            if positions.len() % 3 != 0 {
                return Err(ColliderError::InvalidMesh(format!(
                    "triangle soup position count {} is not a multiple of 3",
                    positions.len()
                )));
            }
            for c in positions.chunks_exact(3) {
                self.add_triangle(Triangle::new(c[0], c[1], c[2]));
            }
        } else {
            if indices.len() % 3 != 0 {
                return Err(ColliderError::InvalidMesh(format!(
                    "index count {} is not a multiple of 3",
                    indices.len()
                )));
            }
            for c in indices.chunks_exact(3) {
                let fetch = |i: u32| {
                    positions.get(i as usize).copied().ok_or_else(|| {
                        ColliderError::InvalidMesh(format!("index {i} out of range"))
                    })
                };
                self.add_triangle(Triangle::new(fetch(c[0])?, fetch(c[1])?, fetch(c[2])?));
            }
        }
        Ok(())
    }

    pub fn needs_rebuild(&self) -> bool {
        self.dirty
    }

    /// Rebuilds the BVH if dirty. Idempotent otherwise.
    pub fn rebuild(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        build::rebuild(self);
        tracing::trace!(
            target: "collider",
            triangles = self.tris.len(),
            nodes = self.nodes.len(),
            "bvh rebuilt"
        );
        debug_assert_eq!(self.boxes.len(), self.nodes.len());
        #[cfg(debug_assertions)]
        build::validate(self, 0);
    }

    /// Bounding box of the whole triangle set.
    pub fn aabb(&self) -> Aabb {
        debug_assert!(!self.dirty);
        self.boxes.first().copied().unwrap_or(Aabb::EMPTY)
    }

    pub fn copy(&self) -> Self {
        let mut c = Self::default();
        c.import_buffer(&self.export_buffer())
            .expect("serialization round trip is infallible");
        c
    }

    fn guard(&self) -> Result<(), ColliderError> {
        if self.dirty {
            return Err(ColliderError::Dirty);
        }
        Ok(())
    }

    /// Tests a world-space shape against the collider positioned by
    /// `transform`. The shape is moved into collider space once at the top.
    pub fn intersects<S: TestShape>(
        &self,
        shape: &S,
        transform: &Transform,
    ) -> Result<bool, ColliderError> {
        self.guard()?;
        if self.tris.is_empty() {
            return Ok(false);
        }
        let local = shape.transformed(&transform.inverse());
        Ok(self.intersects_node(&local, 0))
    }

    fn intersects_node<S: TestShape>(&self, s: &S, idx: usize) -> bool {
        if !s.intersects_aabb(&self.boxes[idx]) {
            return false;
        }
        let n = self.nodes[idx];
        if n.is_inner() {
            let (l, r) = n.children();
            self.intersects_node(s, l) || self.intersects_node(s, r)
        } else {
            self.tris[n.triangle_range()].iter().any(|t| s.intersects_triangle(t))
        }
    }

    /// Nearest hit of a world-space line against the positioned collider.
    /// Returns the world-space point and the triangle index.
    pub fn intersection(
        &self,
        line: &Line,
        transform: &Transform,
    ) -> Result<Option<(Vec3, u32)>, ColliderError> {
        self.guard()?;
        if self.tris.is_empty() {
            return Ok(None);
        }
        let local = line.transformed(&transform.inverse());
        Ok(self
            .intersection_node(&local, 0)
            .map(|(p, i)| (transform.apply_point(p), i)))
    }

    fn intersection_node(&self, l: &Line, idx: usize) -> Option<(Vec3, u32)> {
        if !l.intersects_aabb(&self.boxes[idx]) {
            return None;
        }
        let n = self.nodes[idx];
        if n.is_inner() {
            let (left, right) = n.children();
            let along = |p: &Vec3| (*p - l.origin).dot(l.direction);
            match (self.intersection_node(l, left), self.intersection_node(l, right)) {
                (Some(a), Some(b)) => Some(if along(&a.0) < along(&b.0) { a } else { b }),
                (a, b) => a.or(b),
            }
        } else {
            let mut best: Option<(Vec3, u32)> = None;
            let mut best_t = f32::INFINITY;
            for ti in n.triangle_range() {
                if let Some(t) = skein_geometry::intersection_line_triangle(l, &self.tris[ti]) {
                    if t < best_t {
                        best_t = t;
                        best = Some((l.point_at(t), ti as u32));
                    }
                }
            }
            best
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn tri(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> Triangle {
        Triangle::new(a.into(), b.into(), c.into())
    }

    fn two_triangle_collider() -> Collider {
        let mut c = Collider::new();
        c.add_triangle(tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]));
        c.add_triangle(tri([2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [2.0, 1.0, 0.0]));
        c.rebuild();
        c
    }

    #[test]
    fn query_while_dirty_fails() {
        let mut c = Collider::new();
        c.add_triangle(tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]));
        let l = Line::ray(Vec3::new(0.2, 0.2, 1.0), Vec3::NEG_Z);
        let err = c.intersection(&l, &Transform::IDENTITY).unwrap_err();
        assert!(matches!(err, ColliderError::Dirty));
        assert_eq!(err.severity(), Severity::Error);
        c.rebuild();
        assert!(c.intersection(&l, &Transform::IDENTITY).unwrap().is_some());
    }

    #[test]
    fn nearest_line_hit_returns_point_and_index() {
        let c = two_triangle_collider();
        let l = Line::clamped(Vec3::new(0.25, 0.25, 1.0), Vec3::NEG_Z, 0.0, 10.0);
        let (p, idx) = c.intersection(&l, &Transform::IDENTITY).unwrap().unwrap();
        assert!((p - Vec3::new(0.25, 0.25, 0.0)).length() < 1e-5);
        assert_eq!(idx, 0);
    }

    #[test]
    fn line_prefers_nearest_triangle() {
        let mut c = Collider::new();
        c.add_triangle(tri([-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [0.0, 1.0, 0.0]));
        c.add_triangle(tri([-1.0, -1.0, 2.0], [1.0, -1.0, 2.0], [0.0, 1.0, 2.0]));
        c.rebuild();
        let l = Line::ray(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let (p, idx) = c.intersection(&l, &Transform::IDENTITY).unwrap().unwrap();
        assert_eq!(idx, 1);
        assert!((p.z - 2.0).abs() < 1e-5);
    }

    #[test]
    fn transform_positions_collider_in_world() {
        let c = two_triangle_collider();
        let t = Transform::new(Vec3::new(10.0, 0.0, 0.0), Quat::IDENTITY, 1.0);
        let l = Line::ray(Vec3::new(10.25, 0.25, 1.0), Vec3::NEG_Z);
        let (p, idx) = c.intersection(&l, &t).unwrap().unwrap();
        assert_eq!(idx, 0);
        assert!((p - Vec3::new(10.25, 0.25, 0.0)).length() < 1e-4);
        // original-space ray now misses
        let l0 = Line::ray(Vec3::new(0.25, 0.25, 1.0), Vec3::NEG_Z);
        assert!(c.intersection(&l0, &t).unwrap().is_none());
    }

    #[test]
    fn shape_queries_respect_transform() {
        let c = two_triangle_collider();
        let s = skein_geometry::Sphere::new(Vec3::new(0.2, 0.2, 0.0), 0.1);
        assert!(c.intersects(&s, &Transform::IDENTITY).unwrap());
        let moved = Transform::from_position(Vec3::new(0.0, 0.0, 5.0));
        assert!(!c.intersects(&s, &moved).unwrap());
    }

    #[test]
    fn optimize_deduplicates_and_drops_degenerates() {
        let mut c = Collider::new();
        let t = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        c.add_triangle(t);
        // same triangle, rotated vertex order
        c.add_triangle(tri([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]));
        // degenerate
        c.add_triangle(tri([5.0, 5.0, 5.0], [5.0, 5.0, 5.0], [6.0, 5.0, 5.0]));
        c.optimize();
        assert_eq!(c.triangles().len(), 1);
    }

    #[test]
    fn import_mesh_soup_and_indexed() {
        let mut c = Collider::new();
        let pos = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z, Vec3::X, Vec3::Y];
        c.import_mesh(&pos, &[]).unwrap();
        assert_eq!(c.triangles().len(), 2);
        let mut c2 = Collider::new();
        c2.import_mesh(&pos[..4], &[0, 1, 2, 0, 2, 3]).unwrap();
        assert_eq!(c2.triangles().len(), 2);
        assert!(c2.import_mesh(&pos[..4], &[0, 1]).is_err());
        assert!(c2.import_mesh(&pos[..4], &[0, 1, 9]).is_err());
    }

    #[test]
    fn empty_collider_answers_nothing() {
        let mut c = Collider::new();
        c.rebuild();
        let l = Line::ray(Vec3::Z, Vec3::NEG_Z);
        assert!(c.intersection(&l, &Transform::IDENTITY).unwrap().is_none());
        assert!(!c.intersects(&Aabb::new(Vec3::splat(-1.0), Vec3::ONE), &Transform::IDENTITY).unwrap());
    }
}
