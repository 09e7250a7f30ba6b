//! Shape primitives.
//!
//! All shapes are plain-old-data over glam vectors. [`Triangle`] and
//! [`Aabb`] are additionally `Pod` so collider serialization can treat
//! their arrays as raw bytes.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4Swizzles};
use serde::{Deserialize, Serialize};

use crate::transform::Transform;

/// A point, segment, ray or full line.
///
/// `origin` and unit `direction` define the carrier line; `t_min`/`t_max`
/// clamp the admissible parameter range. A segment has finite bounds, a ray
/// has `t_max == f32::INFINITY`, a full line is unbounded on both ends and
/// a point has `t_min == t_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub origin: Vec3,
    pub direction: Vec3,
    pub t_min: f32,
    pub t_max: f32,
}

impl Line {
    /// Segment between two points.
    pub fn segment(a: Vec3, b: Vec3) -> Self {
        let d = b - a;
        let len = d.length();
        let direction = if len > 0.0 { d / len } else { Vec3::X };
        Self { origin: a, direction, t_min: 0.0, t_max: len }
    }

    /// Ray from `origin` along `direction` (normalized here).
    pub fn ray(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction: direction.normalize(), t_min: 0.0, t_max: f32::INFINITY }
    }

    /// Ray clamped to `[t_min, t_max]` along a normalized `direction`.
    pub fn clamped(origin: Vec3, direction: Vec3, t_min: f32, t_max: f32) -> Self {
        Self { origin, direction: direction.normalize(), t_min, t_max }
    }

    /// Unbounded line through `origin` along `direction`.
    pub fn line(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
            t_min: f32::NEG_INFINITY,
            t_max: f32::INFINITY,
        }
    }

    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// First admissible point (undefined for a full line).
    pub fn point_a(&self) -> Vec3 {
        self.point_at(self.t_min)
    }

    /// Last admissible point (undefined for a ray).
    pub fn point_b(&self) -> Vec3 {
        self.point_at(self.t_max)
    }

    pub fn is_point(&self) -> bool {
        self.t_min == self.t_max
    }

    pub fn is_segment(&self) -> bool {
        self.t_min.is_finite() && self.t_max.is_finite()
    }

    pub fn is_ray(&self) -> bool {
        self.t_min.is_finite() && self.t_max == f32::INFINITY
    }

    pub fn is_line(&self) -> bool {
        self.t_min == f32::NEG_INFINITY && self.t_max == f32::INFINITY
    }

    pub fn length(&self) -> f32 {
        self.t_max - self.t_min
    }

    pub fn is_valid(&self) -> bool {
        self.origin.is_finite() && self.direction.is_finite() && self.t_min <= self.t_max
    }

    /// Conservative box over the admissible range; unbounded lines produce
    /// an infinite box.
    pub fn aabb(&self) -> Aabb {
        if self.is_segment() {
            Aabb::from_points(&[self.point_a(), self.point_b()])
        } else {
            Aabb::INFINITE
        }
    }

    pub fn transformed(&self, t: &Transform) -> Self {
        Self {
            origin: t.apply_point(self.origin),
            direction: t.apply_direction(self.direction),
            t_min: self.t_min * t.scale,
            t_max: self.t_max * t.scale,
        }
    }
}

/// Triangle given by three counter-clockwise vertices.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Triangle {
    pub vertices: [Vec3; 3],
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { vertices: [a, b, c] }
    }

    pub fn normal(&self) -> Vec3 {
        (self.vertices[1] - self.vertices[0])
            .cross(self.vertices[2] - self.vertices[0])
            .normalize_or_zero()
    }

    pub fn area(&self) -> f32 {
        (self.vertices[1] - self.vertices[0])
            .cross(self.vertices[2] - self.vertices[0])
            .length()
            * 0.5
    }

    pub fn center(&self) -> Vec3 {
        (self.vertices[0] + self.vertices[1] + self.vertices[2]) / 3.0
    }

    /// Zero-area triangles carry no surface and are dropped by
    /// `Collider::optimize`.
    pub fn is_degenerate(&self) -> bool {
        self.area() <= 0.0
    }

    pub fn is_valid(&self) -> bool {
        self.vertices.iter().all(|v| v.is_finite())
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(&self.vertices)
    }

    pub fn transformed(&self, t: &Transform) -> Self {
        Self {
            vertices: [
                t.apply_point(self.vertices[0]),
                t.apply_point(self.vertices[1]),
                t.apply_point(self.vertices[2]),
            ],
        }
    }
}

impl std::ops::Index<usize> for Triangle {
    type Output = Vec3;

    fn index(&self, i: usize) -> &Vec3 {
        &self.vertices[i]
    }
}

/// Plane in Hesse normal form: points `p` with `dot(normal, p) == d`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    pub fn new(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize();
        Self { normal, d: normal.dot(point) }
    }

    pub fn from_triangle(t: &Triangle) -> Self {
        Self::new(t.vertices[0], t.normal())
    }

    /// A point on the plane.
    pub fn origin(&self) -> Vec3 {
        self.normal * self.d
    }

    /// Signed distance from `p`; positive on the normal side.
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.d
    }

    pub fn transformed(&self, t: &Transform) -> Self {
        Self::new(t.apply_point(self.origin()), t.apply_direction(self.normal))
    }
}

/// Sphere given by center and radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn is_valid(&self) -> bool {
        self.center.is_finite() && self.radius.is_finite() && self.radius >= 0.0
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(self.center - Vec3::splat(self.radius), self.center + Vec3::splat(self.radius))
    }

    pub fn transformed(&self, t: &Transform) -> Self {
        Self { center: t.apply_point(self.center), radius: self.radius * t.scale }
    }
}

/// Axis-aligned bounding box.
///
/// The empty box is represented with inverted infinite corners so that
/// unions start from it without special cases.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub const INFINITE: Self = Self {
        min: Vec3::splat(f32::NEG_INFINITY),
        max: Vec3::splat(f32::INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_point(p: Vec3) -> Self {
        Self { min: p, max: p }
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut b = Self::EMPTY;
        for &p in points {
            b.extend(p);
        }
        b
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn is_valid(&self) -> bool {
        !self.is_empty() && self.min.is_finite() && self.max.is_finite()
    }

    pub fn extend(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    /// Overlap of two boxes; empty when they are disjoint.
    pub fn intersection(&self, other: &Aabb) -> Aabb {
        let r = Aabb { min: self.min.max(other.min), max: self.max.min(other.max) };
        if r.min.cmple(r.max).all() {
            r
        } else {
            Aabb::EMPTY
        }
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn diagonal(&self) -> f32 {
        self.size().length()
    }

    /// Total surface area; 0 for the empty box.
    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let s = self.size();
        2.0 * (s.x * s.y + s.y * s.z + s.z * s.x)
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Closest point inside the box to `p`.
    pub fn clamp_point(&self, p: Vec3) -> Vec3 {
        p.clamp(self.min, self.max)
    }

    /// Tight box around the transformed corners. The result grows when the
    /// rotation is not axis-aligned.
    pub fn transformed(&self, t: &Transform) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut r = Self::EMPTY;
        for c in self.corners() {
            r.extend(t.apply_point(c));
        }
        r
    }
}

/// Solid cone: apex at `origin`, opening `half_angle` around unit
/// `direction`, truncated at `length` from the apex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cone {
    pub origin: Vec3,
    pub direction: Vec3,
    pub half_angle: f32,
    pub length: f32,
}

impl Cone {
    pub fn new(origin: Vec3, direction: Vec3, half_angle: f32, length: f32) -> Self {
        Self { origin, direction: direction.normalize(), half_angle, length }
    }

    pub fn base_center(&self) -> Vec3 {
        self.origin + self.direction * self.length
    }

    pub fn base_radius(&self) -> f32 {
        self.half_angle.tan() * self.length
    }

    pub fn is_valid(&self) -> bool {
        self.origin.is_finite()
            && self.direction.is_finite()
            && self.half_angle > 0.0
            && self.half_angle < std::f32::consts::FRAC_PI_2
            && self.length > 0.0
            && self.length.is_finite()
    }

    pub fn aabb(&self) -> Aabb {
        // extents of the base circle per axis: r * sqrt(1 - dir[i]^2)
        let r = self.base_radius();
        let d = self.direction;
        let ext = Vec3::new(
            r * (1.0 - d.x * d.x).max(0.0).sqrt(),
            r * (1.0 - d.y * d.y).max(0.0).sqrt(),
            r * (1.0 - d.z * d.z).max(0.0).sqrt(),
        );
        let bc = self.base_center();
        let mut b = Aabb::from_point(self.origin);
        b.extend(bc - ext);
        b.extend(bc + ext);
        b
    }

    pub fn transformed(&self, t: &Transform) -> Self {
        Self {
            origin: t.apply_point(self.origin),
            direction: t.apply_direction(self.direction),
            half_angle: self.half_angle,
            length: self.length * t.scale,
        }
    }
}

/// View frustum extracted from a projection-view matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub matrix: Mat4,
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the six clip planes, normals pointing inward.
    pub fn new(view_proj: Mat4) -> Self {
        let m = view_proj;
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];
        let mut planes = [Plane { normal: Vec3::X, d: 0.0 }; 6];
        let combos = [
            rows[3] + rows[0], // left
            rows[3] - rows[0], // right
            rows[3] + rows[1], // bottom
            rows[3] - rows[1], // top
            rows[3] + rows[2], // near
            rows[3] - rows[2], // far
        ];
        for (plane, c) in planes.iter_mut().zip(combos) {
            let n = c.xyz();
            let len = n.length();
            plane.normal = n / len;
            plane.d = -c.w / len;
        }
        Self { matrix: m, planes }
    }

    /// World-space corners found by unprojecting the clip cube.
    pub fn corners(&self) -> [Vec3; 8] {
        let inv = self.matrix.inverse();
        let mut out = [Vec3::ZERO; 8];
        let mut i = 0;
        for &z in &[-1.0f32, 1.0] {
            for &y in &[-1.0f32, 1.0] {
                for &x in &[-1.0f32, 1.0] {
                    let h = inv * glam::Vec4::new(x, y, z, 1.0);
                    out[i] = h.xyz() / h.w;
                    i += 1;
                }
            }
        }
        out
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(&self.corners())
    }

    pub fn transformed(&self, t: &Transform) -> Self {
        Self::new(self.matrix * t.inverse().to_mat4())
    }
}

/// Tagged shape variant used by the spatial structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Point(Vec3),
    Line(Line),
    Triangle(Triangle),
    Sphere(Sphere),
    Aabb(Aabb),
    Cone(Cone),
}

impl Shape {
    pub fn aabb(&self) -> Aabb {
        match self {
            Shape::Point(p) => Aabb::from_point(*p),
            Shape::Line(l) => l.aabb(),
            Shape::Triangle(t) => t.aabb(),
            Shape::Sphere(s) => s.aabb(),
            Shape::Aabb(b) => *b,
            Shape::Cone(c) => c.aabb(),
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Shape::Point(p) => p.is_finite(),
            Shape::Line(l) => l.is_valid() && (l.is_point() || l.is_segment()),
            Shape::Triangle(t) => t.is_valid() && t.area().is_finite(),
            Shape::Sphere(s) => s.is_valid(),
            Shape::Aabb(b) => b.is_valid(),
            Shape::Cone(c) => c.is_valid(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_endpoints() {
        let l = Line::segment(Vec3::ZERO, Vec3::new(0.0, 0.0, 4.0));
        assert!(l.is_segment());
        assert_eq!(l.point_a(), Vec3::ZERO);
        assert!((l.point_b() - Vec3::new(0.0, 0.0, 4.0)).length() < 1e-6);
    }

    #[test]
    fn empty_aabb_behaves() {
        let e = Aabb::EMPTY;
        assert!(e.is_empty());
        assert_eq!(e.surface_area(), 0.0);
        let b = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(!e.intersects(&b));
        assert_eq!(e.union(&b), b);
    }

    #[test]
    fn aabb_surface_area() {
        let b = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.surface_area(), 2.0 * (2.0 + 6.0 + 3.0));
    }

    #[test]
    fn triangle_normal_and_area() {
        let t = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y);
        assert!((t.normal() - Vec3::Z).length() < 1e-6);
        assert!((t.area() - 0.5).abs() < 1e-6);
        assert!(!t.is_degenerate());
        assert!(Triangle::new(Vec3::ZERO, Vec3::X, Vec3::X * 2.0).is_degenerate());
    }

    #[test]
    fn cone_aabb_encloses_base() {
        let c = Cone::new(Vec3::ZERO, Vec3::Z, 0.5, 2.0);
        let b = c.aabb();
        assert!(b.contains(Vec3::ZERO));
        assert!(b.contains(c.base_center()));
        let r = c.base_radius();
        assert!(b.contains(c.base_center() + Vec3::new(r * 0.99, 0.0, 0.0)));
    }

    #[test]
    fn frustum_planes_contain_origin_for_simple_proj() {
        let proj = Mat4::perspective_rh_gl(1.0, 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let f = Frustum::new(proj * view);
        for p in &f.planes {
            assert!(p.signed_distance(Vec3::ZERO) > 0.0, "origin should be inside");
        }
    }
}
