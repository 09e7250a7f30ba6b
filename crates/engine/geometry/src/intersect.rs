//! Pairwise distance and intersection tests.
//!
//! The collision core only ever needs a boolean overlap answer plus, for
//! lines, the nearest hit parameter. Functions are named
//! `intersects_<a>_<b>`; symmetric pairs exist once with the argument
//! order that reads best and are flipped at the dispatch layer.

use glam::Vec3;

use crate::shapes::{Aabb, Cone, Frustum, Line, Plane, Shape, Sphere, Triangle};
use crate::transform::Transform;
use crate::tri_aabb::tri_aabb_overlap;
use crate::tri_tri::tri_tri_overlap;

/// Tolerance used by the point-ish coincidence tests.
pub const PROXIMITY_EPS: f32 = 1e-5;

// ---------------------------------------------------------------------------
// closest points and distances
// ---------------------------------------------------------------------------

/// Closest parameter on the (clamped) line to `p`.
pub fn closest_param_on_line(l: &Line, p: Vec3) -> f32 {
    let t = (p - l.origin).dot(l.direction);
    t.clamp(l.t_min, l.t_max)
}

pub fn closest_point_on_line(l: &Line, p: Vec3) -> Vec3 {
    l.point_at(closest_param_on_line(l, p))
}

pub fn distance_point_line(p: Vec3, l: &Line) -> f32 {
    p.distance(closest_point_on_line(l, p))
}

/// Closest point on a triangle to `p` (Voronoi region walk).
pub fn closest_point_on_triangle(t: &Triangle, p: Vec3) -> Vec3 {
    let a = t.vertices[0];
    let b = t.vertices[1];
    let c = t.vertices[2];

    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}

pub fn distance_point_triangle(p: Vec3, t: &Triangle) -> f32 {
    p.distance(closest_point_on_triangle(t, p))
}

pub fn distance_point_aabb(p: Vec3, b: &Aabb) -> f32 {
    p.distance(b.clamp_point(p))
}

/// Closest parameter pair between two clamped lines.
pub fn closest_params_line_line(a: &Line, b: &Line) -> (f32, f32) {
    // Ericson's segment-segment closest points, generalized to the lines'
    // clamp ranges.
    let d1 = a.direction;
    let d2 = b.direction;
    let r = a.origin - b.origin;
    let b_dot = d1.dot(d2);
    let f = d2.dot(r);
    let c = d1.dot(r);
    let denom = 1.0 - b_dot * b_dot;

    let mut s = if denom.abs() > 1e-9 {
        ((b_dot * f - c) / denom).clamp(a.t_min, a.t_max)
    } else {
        0.0f32.clamp(a.t_min, a.t_max)
    };
    let mut t = (b_dot * s + f).clamp(b.t_min, b.t_max);
    s = (b_dot * t - c).clamp(a.t_min, a.t_max);
    t = (b_dot * s + f).clamp(b.t_min, b.t_max);
    (s, t)
}

pub fn distance_line_line(a: &Line, b: &Line) -> f32 {
    let (s, t) = closest_params_line_line(a, b);
    a.point_at(s).distance(b.point_at(t))
}

/// Closest point on the triangle to the clamped line.
pub fn closest_point_triangle_to_line(t: &Triangle, l: &Line) -> Vec3 {
    if let Some(hit) = intersection_line_triangle(l, t) {
        return l.point_at(hit);
    }
    let mut best = t.center();
    let mut best_d = distance_point_line(best, l);
    for endpoint in [l.t_min, l.t_max] {
        if !endpoint.is_finite() {
            continue;
        }
        let q = closest_point_on_triangle(t, l.point_at(endpoint));
        let d = distance_point_line(q, l);
        if d < best_d {
            best = q;
            best_d = d;
        }
    }
    for i in 0..3 {
        let edge = Line::segment(t.vertices[i], t.vertices[(i + 1) % 3]);
        let (s, u) = closest_params_line_line(&edge, l);
        let p = edge.point_at(s);
        let d = p.distance(l.point_at(u));
        if d < best_d {
            best = p;
            best_d = d;
        }
    }
    best
}

pub fn distance_line_triangle(l: &Line, t: &Triangle) -> f32 {
    let p = closest_point_triangle_to_line(t, l);
    distance_point_line(p, l)
}

// ---------------------------------------------------------------------------
// line intersections
// ---------------------------------------------------------------------------

/// Moller-Trumbore. Returns the hit parameter within the line's clamp
/// range, or `None` for misses and near-parallel configurations
/// (`|det| < 1e-5`).
pub fn intersection_line_triangle(l: &Line, t: &Triangle) -> Option<f32> {
    let v0 = t.vertices[0];
    let edge1 = t.vertices[1] - v0;
    let edge2 = t.vertices[2] - v0;
    let pvec = l.direction.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < 1e-5 {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = l.origin - v0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(edge1);
    let v = l.direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let hit = edge2.dot(qvec) * inv_det;
    if hit < l.t_min || hit > l.t_max {
        return None;
    }
    Some(hit)
}

/// Parameter range where the line passes through the box (slab clip).
pub fn intersection_line_aabb(l: &Line, b: &Aabb) -> Option<(f32, f32)> {
    if b.is_empty() {
        return None;
    }
    let mut t0 = l.t_min;
    let mut t1 = l.t_max;
    for i in 0..3 {
        let d = l.direction[i];
        if d.abs() < 1e-12 {
            if l.origin[i] < b.min[i] || l.origin[i] > b.max[i] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut near = (b.min[i] - l.origin[i]) * inv;
        let mut far = (b.max[i] - l.origin[i]) * inv;
        if near > far {
            std::mem::swap(&mut near, &mut far);
        }
        t0 = t0.max(near);
        t1 = t1.min(far);
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

/// Point where the line crosses the plane, if it does within its range.
pub fn intersection_line_plane(l: &Line, p: &Plane) -> Option<f32> {
    let denom = l.direction.dot(p.normal);
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = -p.signed_distance(l.origin) / denom;
    (t >= l.t_min && t <= l.t_max).then_some(t)
}

// ---------------------------------------------------------------------------
// boolean tests: point
// ---------------------------------------------------------------------------

pub fn intersects_point_point(a: Vec3, b: Vec3) -> bool {
    a.distance(b) <= PROXIMITY_EPS
}

pub fn intersects_point_line(p: Vec3, l: &Line) -> bool {
    distance_point_line(p, l) <= PROXIMITY_EPS
}

pub fn intersects_point_triangle(p: Vec3, t: &Triangle) -> bool {
    distance_point_triangle(p, t) <= PROXIMITY_EPS
}

pub fn intersects_point_plane(p: Vec3, pl: &Plane) -> bool {
    pl.signed_distance(p).abs() <= PROXIMITY_EPS
}

pub fn intersects_point_sphere(p: Vec3, s: &Sphere) -> bool {
    p.distance_squared(s.center) <= s.radius * s.radius
}

pub fn intersects_point_aabb(p: Vec3, b: &Aabb) -> bool {
    b.contains(p)
}

pub fn intersects_point_cone(p: Vec3, c: &Cone) -> bool {
    let v = p - c.origin;
    let h = v.dot(c.direction);
    if h < 0.0 || h > c.length {
        return false;
    }
    let len = v.length();
    if len <= PROXIMITY_EPS {
        return true;
    }
    h >= len * c.half_angle.cos()
}

pub fn intersects_point_frustum(p: Vec3, f: &Frustum) -> bool {
    f.planes.iter().all(|pl| pl.signed_distance(p) >= 0.0)
}

// ---------------------------------------------------------------------------
// boolean tests: line
// ---------------------------------------------------------------------------

pub fn intersects_line_line(a: &Line, b: &Line) -> bool {
    distance_line_line(a, b) <= PROXIMITY_EPS
}

pub fn intersects_line_triangle(l: &Line, t: &Triangle) -> bool {
    intersection_line_triangle(l, t).is_some()
}

pub fn intersects_line_plane(l: &Line, p: &Plane) -> bool {
    if intersection_line_plane(l, p).is_some() {
        return true;
    }
    // parallel: touching counts
    l.direction.dot(p.normal).abs() < 1e-12 && p.signed_distance(l.origin).abs() <= PROXIMITY_EPS
}

pub fn intersects_line_sphere(l: &Line, s: &Sphere) -> bool {
    distance_point_line(s.center, l) <= s.radius
}

pub fn intersects_line_aabb(l: &Line, b: &Aabb) -> bool {
    intersection_line_aabb(l, b).is_some()
}

pub fn intersects_line_cone(l: &Line, c: &Cone) -> bool {
    // containment of either end
    if l.t_min.is_finite() && intersects_point_cone(l.point_a(), c) {
        return true;
    }
    if l.t_max.is_finite() && intersects_point_cone(l.point_b(), c) {
        return true;
    }

    let cos2 = {
        let cs = c.half_angle.cos();
        cs * cs
    };
    let o = l.origin - c.origin;
    let u = l.direction;
    let ud = u.dot(c.direction);
    let od = o.dot(c.direction);

    // lateral surface: ((o + t u) . d)^2 = cos^2 |o + t u|^2
    let qa = ud * ud - cos2;
    let qb = 2.0 * (od * ud - cos2 * o.dot(u));
    let qc = od * od - cos2 * o.dot(o);
    let check_height = |t: f32| -> bool {
        if t < l.t_min || t > l.t_max {
            return false;
        }
        let h = od + t * ud;
        (0.0..=c.length).contains(&h)
    };
    if qa.abs() > 1e-9 {
        let disc = qb * qb - 4.0 * qa * qc;
        if disc >= 0.0 {
            let sq = disc.sqrt();
            if check_height((-qb - sq) / (2.0 * qa)) || check_height((-qb + sq) / (2.0 * qa)) {
                return true;
            }
        }
    } else if qb.abs() > 1e-9 && check_height(-qc / qb) {
        return true;
    }

    // base disc
    let base = Plane::new(c.base_center(), c.direction);
    if let Some(t) = intersection_line_plane(l, &base) {
        let p = l.point_at(t);
        if p.distance_squared(c.base_center()) <= c.base_radius() * c.base_radius() {
            return true;
        }
    }
    false
}

pub fn intersects_line_frustum(l: &Line, f: &Frustum) -> bool {
    // clip the admissible range against all six planes
    let mut t0 = l.t_min;
    let mut t1 = l.t_max;
    for p in &f.planes {
        let denom = l.direction.dot(p.normal);
        let dist = p.signed_distance(l.origin);
        if denom.abs() < 1e-12 {
            if dist < 0.0 {
                return false;
            }
            continue;
        }
        let t = -dist / denom;
        if denom > 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return false;
        }
    }
    true
}

// ---------------------------------------------------------------------------
// boolean tests: triangle
// ---------------------------------------------------------------------------

pub fn intersects_triangle_triangle(a: &Triangle, b: &Triangle) -> bool {
    tri_tri_overlap(a, b)
}

pub fn intersects_triangle_plane(t: &Triangle, p: &Plane) -> bool {
    let mut pos = 0;
    let mut neg = 0;
    for v in &t.vertices {
        let d = p.signed_distance(*v);
        if d.abs() <= PROXIMITY_EPS {
            return true;
        }
        if d > 0.0 {
            pos += 1;
        } else {
            neg += 1;
        }
    }
    pos > 0 && neg > 0
}

pub fn intersects_triangle_sphere(t: &Triangle, s: &Sphere) -> bool {
    distance_point_triangle(s.center, t) <= s.radius
}

pub fn intersects_triangle_aabb(t: &Triangle, b: &Aabb) -> bool {
    tri_aabb_overlap(t, b)
}

pub fn intersects_triangle_cone(t: &Triangle, c: &Cone) -> bool {
    for v in &t.vertices {
        if intersects_point_cone(*v, c) {
            return true;
        }
    }
    for i in 0..3 {
        let edge = Line::segment(t.vertices[i], t.vertices[(i + 1) % 3]);
        if intersects_line_cone(&edge, c) {
            return true;
        }
    }
    let axis = Line::segment(c.origin, c.base_center());
    if intersects_line_triangle(&axis, t) {
        return true;
    }
    // triangle slicing the cone without touching axis or containing a vertex
    intersects_point_cone(closest_point_triangle_to_line(t, &axis), c)
}

pub fn intersects_triangle_frustum(t: &Triangle, f: &Frustum) -> bool {
    // conservative: no plane has the whole triangle outside
    for p in &f.planes {
        if t.vertices.iter().all(|&v| p.signed_distance(v) < 0.0) {
            return false;
        }
    }
    true
}

// ---------------------------------------------------------------------------
// boolean tests: plane
// ---------------------------------------------------------------------------

pub fn intersects_plane_plane(a: &Plane, b: &Plane) -> bool {
    let cross = a.normal.cross(b.normal);
    if cross.length_squared() > 1e-12 {
        return true;
    }
    // parallel: coincident?
    a.signed_distance(b.origin()).abs() <= PROXIMITY_EPS
}

pub fn intersects_plane_sphere(p: &Plane, s: &Sphere) -> bool {
    p.signed_distance(s.center).abs() <= s.radius
}

pub fn intersects_plane_aabb(p: &Plane, b: &Aabb) -> bool {
    if b.is_empty() {
        return false;
    }
    // interval of the box projected on the plane normal
    let c = b.center();
    let h = b.size() * 0.5;
    let r = h.x * p.normal.x.abs() + h.y * p.normal.y.abs() + h.z * p.normal.z.abs();
    p.signed_distance(c).abs() <= r
}

pub fn intersects_plane_cone(p: &Plane, c: &Cone) -> bool {
    let apex = p.signed_distance(c.origin);
    // extreme signed distances of the base circle
    let align = p.normal.dot(c.direction);
    let swing = c.base_radius() * (1.0 - align * align).max(0.0).sqrt();
    let base = p.signed_distance(c.base_center());
    let lo = apex.min(base - swing);
    let hi = apex.max(base + swing);
    lo <= PROXIMITY_EPS && hi >= -PROXIMITY_EPS
}

// ---------------------------------------------------------------------------
// boolean tests: sphere / aabb / cone / frustum
// ---------------------------------------------------------------------------

pub fn intersects_sphere_sphere(a: &Sphere, b: &Sphere) -> bool {
    let r = a.radius + b.radius;
    a.center.distance_squared(b.center) <= r * r
}

pub fn intersects_sphere_aabb(s: &Sphere, b: &Aabb) -> bool {
    if b.is_empty() {
        return false;
    }
    distance_point_aabb(s.center, b) <= s.radius
}

pub fn intersects_sphere_cone(s: &Sphere, c: &Cone) -> bool {
    let v = s.center - c.origin;
    let h = v.dot(c.direction);
    if h < -s.radius || h > c.length + s.radius {
        return false;
    }
    let (sin_h, cos_h) = c.half_angle.sin_cos();
    let dist_axis = (v.length_squared() - h * h).max(0.0).sqrt();
    // apex corner region: closest feature is the apex itself
    if h * cos_h + dist_axis * sin_h < 0.0 {
        return v.length_squared() <= s.radius * s.radius;
    }
    // signed distance to the lateral surface of the infinite cone
    let e = dist_axis * cos_h - h * sin_h;
    if e > s.radius {
        return false;
    }
    if h > c.length {
        // beyond the base plane: closest feature is the base disc rim or face
        let dx = (dist_axis - c.base_radius()).max(0.0);
        let dz = h - c.length;
        return dx * dx + dz * dz <= s.radius * s.radius;
    }
    true
}

pub fn intersects_aabb_aabb(a: &Aabb, b: &Aabb) -> bool {
    a.intersects(b)
}

pub fn intersects_aabb_cone(b: &Aabb, c: &Cone) -> bool {
    if b.is_empty() {
        return false;
    }
    // cheap accepts
    if intersects_point_aabb(c.origin, b) || intersects_point_cone(b.clamp_point(c.origin), c) {
        return true;
    }
    let axis = Line::segment(c.origin, c.base_center());
    if intersects_line_aabb(&axis, b) {
        return true;
    }

    // separating axis test; the axis set is finite so a missed separating
    // axis errs toward reporting overlap, never a miss
    let mut axes: Vec<Vec3> = vec![Vec3::X, Vec3::Y, Vec3::Z, c.direction];
    for n in [Vec3::X, Vec3::Y, Vec3::Z] {
        let cr = c.direction.cross(n);
        if cr.length_squared() > 1e-12 {
            axes.push(cr.normalize());
        }
    }
    let to_center = b.center() - closest_point_on_line(&axis, b.center());
    if to_center.length_squared() > 1e-12 {
        axes.push(to_center.normalize());
    }

    for u in axes {
        let (c0, c1) = project_cone(c, u);
        let (b0, b1) = project_aabb(b, u);
        if c1 < b0 || b1 < c0 {
            return false;
        }
    }
    true
}

fn project_cone(c: &Cone, u: Vec3) -> (f32, f32) {
    let apex = u.dot(c.origin);
    let base = u.dot(c.base_center());
    let align = u.dot(c.direction);
    let swing = c.base_radius() * (1.0 - align * align).max(0.0).sqrt();
    (apex.min(base - swing), apex.max(base + swing))
}

fn project_aabb(b: &Aabb, u: Vec3) -> (f32, f32) {
    let c = u.dot(b.center());
    let h = b.size() * 0.5;
    let r = h.x * u.x.abs() + h.y * u.y.abs() + h.z * u.z.abs();
    (c - r, c + r)
}

/// Approximate; exact for axis/apex/base-point containment cases and
/// conservative through base-circle sampling otherwise.
pub fn intersects_cone_cone(a: &Cone, b: &Cone) -> bool {
    let ra = Sphere::new((a.origin + a.base_center()) * 0.5, a.origin.distance(a.base_center()) * 0.5 + a.base_radius());
    let rb = Sphere::new((b.origin + b.base_center()) * 0.5, b.origin.distance(b.base_center()) * 0.5 + b.base_radius());
    if !intersects_sphere_sphere(&ra, &rb) {
        return false;
    }
    let axis_a = Line::segment(a.origin, a.base_center());
    let axis_b = Line::segment(b.origin, b.base_center());
    if intersects_line_cone(&axis_a, b) || intersects_line_cone(&axis_b, a) {
        return true;
    }
    for (cone, other) in [(a, b), (b, a)] {
        let (bc, br) = (cone.base_center(), cone.base_radius());
        let (t1, t2) = orthonormal_basis(cone.direction);
        for i in 0..8 {
            let ang = i as f32 * std::f32::consts::TAU / 8.0;
            let p = bc + (t1 * ang.cos() + t2 * ang.sin()) * br;
            let rim = Line::segment(cone.origin, p);
            if intersects_line_cone(&rim, other) {
                return true;
            }
        }
    }
    false
}

fn orthonormal_basis(d: Vec3) -> (Vec3, Vec3) {
    let t1 = if d.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
    let t1 = (t1 - d * d.dot(t1)).normalize();
    (t1, d.cross(t1))
}

pub fn intersects_sphere_frustum(s: &Sphere, f: &Frustum) -> bool {
    f.planes.iter().all(|p| p.signed_distance(s.center) >= -s.radius)
}

pub fn intersects_aabb_frustum(b: &Aabb, f: &Frustum) -> bool {
    if b.is_empty() {
        return false;
    }
    for p in &f.planes {
        // most-positive corner along the plane normal
        let v = Vec3::new(
            if p.normal.x >= 0.0 { b.max.x } else { b.min.x },
            if p.normal.y >= 0.0 { b.max.y } else { b.min.y },
            if p.normal.z >= 0.0 { b.max.z } else { b.min.z },
        );
        if p.signed_distance(v) < 0.0 {
            return false;
        }
    }
    true
}

pub fn intersects_cone_frustum(c: &Cone, f: &Frustum) -> bool {
    intersects_aabb_frustum(&c.aabb(), f)
}

pub fn intersects_plane_frustum(p: &Plane, f: &Frustum) -> bool {
    let corners = f.corners();
    let mut pos = false;
    let mut neg = false;
    for c in corners {
        let d = p.signed_distance(c);
        pos |= d >= -PROXIMITY_EPS;
        neg |= d <= PROXIMITY_EPS;
        if pos && neg {
            return true;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// generic query dispatch
// ---------------------------------------------------------------------------

/// A shape usable as the query side of collider and spatial lookups.
pub trait TestShape {
    /// True only for [`Aabb`], whose exact box test is the box-box test
    /// itself and need not run twice.
    const IS_AABB: bool = false;

    /// Conservative world-space box.
    fn aabb(&self) -> Aabb;
    /// The shape moved by `t`.
    fn transformed(&self, t: &Transform) -> Self
    where
        Self: Sized;
    fn intersects_aabb(&self, b: &Aabb) -> bool;
    fn intersects_triangle(&self, t: &Triangle) -> bool;
    fn intersects_shape(&self, s: &Shape) -> bool;
}

impl TestShape for Vec3 {
    fn aabb(&self) -> Aabb {
        Aabb::from_point(*self)
    }
    fn transformed(&self, t: &Transform) -> Self {
        t.apply_point(*self)
    }
    fn intersects_aabb(&self, b: &Aabb) -> bool {
        intersects_point_aabb(*self, b)
    }
    fn intersects_triangle(&self, t: &Triangle) -> bool {
        intersects_point_triangle(*self, t)
    }
    fn intersects_shape(&self, s: &Shape) -> bool {
        match s {
            Shape::Point(p) => intersects_point_point(*self, *p),
            Shape::Line(l) => intersects_point_line(*self, l),
            Shape::Triangle(t) => intersects_point_triangle(*self, t),
            Shape::Sphere(sp) => intersects_point_sphere(*self, sp),
            Shape::Aabb(b) => intersects_point_aabb(*self, b),
            Shape::Cone(c) => intersects_point_cone(*self, c),
        }
    }
}

impl TestShape for Line {
    fn aabb(&self) -> Aabb {
        Line::aabb(self)
    }
    fn transformed(&self, t: &Transform) -> Self {
        Line::transformed(self, t)
    }
    fn intersects_aabb(&self, b: &Aabb) -> bool {
        intersects_line_aabb(self, b)
    }
    fn intersects_triangle(&self, t: &Triangle) -> bool {
        intersects_line_triangle(self, t)
    }
    fn intersects_shape(&self, s: &Shape) -> bool {
        match s {
            Shape::Point(p) => intersects_point_line(*p, self),
            Shape::Line(l) => intersects_line_line(self, l),
            Shape::Triangle(t) => intersects_line_triangle(self, t),
            Shape::Sphere(sp) => intersects_line_sphere(self, sp),
            Shape::Aabb(b) => intersects_line_aabb(self, b),
            Shape::Cone(c) => intersects_line_cone(self, c),
        }
    }
}

impl TestShape for Triangle {
    fn aabb(&self) -> Aabb {
        Triangle::aabb(self)
    }
    fn transformed(&self, t: &Transform) -> Self {
        Triangle::transformed(self, t)
    }
    fn intersects_aabb(&self, b: &Aabb) -> bool {
        intersects_triangle_aabb(self, b)
    }
    fn intersects_triangle(&self, t: &Triangle) -> bool {
        intersects_triangle_triangle(self, t)
    }
    fn intersects_shape(&self, s: &Shape) -> bool {
        match s {
            Shape::Point(p) => intersects_point_triangle(*p, self),
            Shape::Line(l) => intersects_line_triangle(l, self),
            Shape::Triangle(t) => intersects_triangle_triangle(self, t),
            Shape::Sphere(sp) => intersects_triangle_sphere(self, sp),
            Shape::Aabb(b) => intersects_triangle_aabb(self, b),
            Shape::Cone(c) => intersects_triangle_cone(self, c),
        }
    }
}

impl TestShape for Plane {
    fn aabb(&self) -> Aabb {
        Aabb::INFINITE
    }
    fn transformed(&self, t: &Transform) -> Self {
        Plane::transformed(self, t)
    }
    fn intersects_aabb(&self, b: &Aabb) -> bool {
        intersects_plane_aabb(self, b)
    }
    fn intersects_triangle(&self, t: &Triangle) -> bool {
        intersects_triangle_plane(t, self)
    }
    fn intersects_shape(&self, s: &Shape) -> bool {
        match s {
            Shape::Point(p) => intersects_point_plane(*p, self),
            Shape::Line(l) => intersects_line_plane(l, self),
            Shape::Triangle(t) => intersects_triangle_plane(t, self),
            Shape::Sphere(sp) => intersects_plane_sphere(self, sp),
            Shape::Aabb(b) => intersects_plane_aabb(self, b),
            Shape::Cone(c) => intersects_plane_cone(self, c),
        }
    }
}

impl TestShape for Sphere {
    fn aabb(&self) -> Aabb {
        Sphere::aabb(self)
    }
    fn transformed(&self, t: &Transform) -> Self {
        Sphere::transformed(self, t)
    }
    fn intersects_aabb(&self, b: &Aabb) -> bool {
        intersects_sphere_aabb(self, b)
    }
    fn intersects_triangle(&self, t: &Triangle) -> bool {
        intersects_triangle_sphere(t, self)
    }
    fn intersects_shape(&self, s: &Shape) -> bool {
        match s {
            Shape::Point(p) => intersects_point_sphere(*p, self),
            Shape::Line(l) => intersects_line_sphere(l, self),
            Shape::Triangle(t) => intersects_triangle_sphere(t, self),
            Shape::Sphere(sp) => intersects_sphere_sphere(self, sp),
            Shape::Aabb(b) => intersects_sphere_aabb(self, b),
            Shape::Cone(c) => intersects_sphere_cone(self, c),
        }
    }
}

impl TestShape for Aabb {
    const IS_AABB: bool = true;

    fn aabb(&self) -> Aabb {
        *self
    }
    fn transformed(&self, t: &Transform) -> Self {
        Aabb::transformed(self, t)
    }
    fn intersects_aabb(&self, b: &Aabb) -> bool {
        intersects_aabb_aabb(self, b)
    }
    fn intersects_triangle(&self, t: &Triangle) -> bool {
        intersects_triangle_aabb(t, self)
    }
    fn intersects_shape(&self, s: &Shape) -> bool {
        match s {
            Shape::Point(p) => intersects_point_aabb(*p, self),
            Shape::Line(l) => intersects_line_aabb(l, self),
            Shape::Triangle(t) => intersects_triangle_aabb(t, self),
            Shape::Sphere(sp) => intersects_sphere_aabb(sp, self),
            Shape::Aabb(b) => intersects_aabb_aabb(self, b),
            Shape::Cone(c) => intersects_aabb_cone(self, c),
        }
    }
}

impl TestShape for Cone {
    fn aabb(&self) -> Aabb {
        Cone::aabb(self)
    }
    fn transformed(&self, t: &Transform) -> Self {
        Cone::transformed(self, t)
    }
    fn intersects_aabb(&self, b: &Aabb) -> bool {
        intersects_aabb_cone(b, self)
    }
    fn intersects_triangle(&self, t: &Triangle) -> bool {
        intersects_triangle_cone(t, self)
    }
    fn intersects_shape(&self, s: &Shape) -> bool {
        match s {
            Shape::Point(p) => intersects_point_cone(*p, self),
            Shape::Line(l) => intersects_line_cone(l, self),
            Shape::Triangle(t) => intersects_triangle_cone(t, self),
            Shape::Sphere(sp) => intersects_sphere_cone(sp, self),
            Shape::Aabb(b) => intersects_aabb_cone(b, self),
            Shape::Cone(c) => intersects_cone_cone(self, c),
        }
    }
}

impl TestShape for Frustum {
    fn aabb(&self) -> Aabb {
        Frustum::aabb(self)
    }
    fn transformed(&self, t: &Transform) -> Self {
        Frustum::transformed(self, t)
    }
    fn intersects_aabb(&self, b: &Aabb) -> bool {
        intersects_aabb_frustum(b, self)
    }
    fn intersects_triangle(&self, t: &Triangle) -> bool {
        intersects_triangle_frustum(t, self)
    }
    fn intersects_shape(&self, s: &Shape) -> bool {
        match s {
            Shape::Point(p) => intersects_point_frustum(*p, self),
            Shape::Line(l) => intersects_line_frustum(l, self),
            Shape::Triangle(t) => intersects_triangle_frustum(t, self),
            Shape::Sphere(sp) => intersects_sphere_frustum(sp, self),
            Shape::Aabb(b) => intersects_aabb_frustum(b, self),
            Shape::Cone(c) => intersects_cone_frustum(c, self),
        }
    }
}

impl TestShape for Shape {
    fn aabb(&self) -> Aabb {
        Shape::aabb(self)
    }
    fn transformed(&self, t: &Transform) -> Self {
        match self {
            Shape::Point(p) => Shape::Point(t.apply_point(*p)),
            Shape::Line(l) => Shape::Line(l.transformed(t)),
            Shape::Triangle(tr) => Shape::Triangle(tr.transformed(t)),
            Shape::Sphere(s) => Shape::Sphere(s.transformed(t)),
            Shape::Aabb(b) => Shape::Aabb(b.transformed(t)),
            Shape::Cone(c) => Shape::Cone(c.transformed(t)),
        }
    }
    fn intersects_aabb(&self, b: &Aabb) -> bool {
        match self {
            Shape::Point(p) => intersects_point_aabb(*p, b),
            Shape::Line(l) => intersects_line_aabb(l, b),
            Shape::Triangle(t) => intersects_triangle_aabb(t, b),
            Shape::Sphere(s) => intersects_sphere_aabb(s, b),
            Shape::Aabb(a) => intersects_aabb_aabb(a, b),
            Shape::Cone(c) => intersects_aabb_cone(b, c),
        }
    }
    fn intersects_triangle(&self, t: &Triangle) -> bool {
        match self {
            Shape::Point(p) => intersects_point_triangle(*p, t),
            Shape::Line(l) => intersects_line_triangle(l, t),
            Shape::Triangle(a) => intersects_triangle_triangle(a, t),
            Shape::Sphere(s) => intersects_triangle_sphere(t, s),
            Shape::Aabb(b) => intersects_triangle_aabb(t, b),
            Shape::Cone(c) => intersects_triangle_cone(t, c),
        }
    }
    fn intersects_shape(&self, s: &Shape) -> bool {
        match self {
            Shape::Point(p) => p.intersects_shape(s),
            Shape::Line(l) => l.intersects_shape(s),
            Shape::Triangle(t) => t.intersects_shape(s),
            Shape::Sphere(sp) => sp.intersects_shape(s),
            Shape::Aabb(b) => b.intersects_shape(s),
            Shape::Cone(c) => c.intersects_shape(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_triangle() {
        let t = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y);
        let l = Line::clamped(Vec3::new(0.25, 0.25, 1.0), Vec3::NEG_Z, 0.0, 10.0);
        let hit = intersection_line_triangle(&l, &t).unwrap();
        assert!((l.point_at(hit) - Vec3::new(0.25, 0.25, 0.0)).length() < 1e-5);
    }

    #[test]
    fn parallel_ray_misses_triangle() {
        let t = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y);
        let l = Line::ray(Vec3::new(0.0, 0.0, 1.0), Vec3::X);
        assert!(intersection_line_triangle(&l, &t).is_none());
    }

    #[test]
    fn segment_too_short_misses() {
        let t = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y);
        let l = Line::segment(Vec3::new(0.25, 0.25, 2.0), Vec3::new(0.25, 0.25, 1.0));
        assert!(intersection_line_triangle(&l, &t).is_none());
    }

    #[test]
    fn line_aabb_slab() {
        let b = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let l = Line::ray(Vec3::new(0.5, 0.5, 5.0), Vec3::NEG_Z);
        let (t0, t1) = intersection_line_aabb(&l, &b).unwrap();
        assert!((t0 - 4.0).abs() < 1e-5);
        assert!((t1 - 5.0).abs() < 1e-5);
        let miss = Line::ray(Vec3::new(2.0, 2.0, 5.0), Vec3::NEG_Z);
        assert!(intersection_line_aabb(&miss, &b).is_none());
    }

    #[test]
    fn closest_point_on_triangle_regions() {
        let t = Triangle::new(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0));
        // interior projection
        let p = closest_point_on_triangle(&t, Vec3::new(0.5, 0.5, 3.0));
        assert!((p - Vec3::new(0.5, 0.5, 0.0)).length() < 1e-6);
        // vertex region
        let p = closest_point_on_triangle(&t, Vec3::new(-1.0, -1.0, 0.0));
        assert!((p - Vec3::ZERO).length() < 1e-6);
        // edge region
        let p = closest_point_on_triangle(&t, Vec3::new(1.0, -1.0, 0.0));
        assert!((p - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn sphere_aabb_contact() {
        let b = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(intersects_sphere_aabb(&Sphere::new(Vec3::new(2.0, 0.5, 0.5), 1.01), &b));
        assert!(!intersects_sphere_aabb(&Sphere::new(Vec3::new(2.0, 0.5, 0.5), 0.99), &b));
    }

    #[test]
    fn sphere_cone_cases() {
        let c = Cone::new(Vec3::ZERO, Vec3::Z, 0.4, 5.0);
        // on the axis inside
        assert!(intersects_sphere_cone(&Sphere::new(Vec3::new(0.0, 0.0, 2.0), 0.1), &c));
        // clearly to the side
        assert!(!intersects_sphere_cone(&Sphere::new(Vec3::new(10.0, 0.0, 2.0), 0.5), &c));
        // behind the apex
        assert!(!intersects_sphere_cone(&Sphere::new(Vec3::new(0.0, 0.0, -2.0), 0.5), &c));
        // touching the apex
        assert!(intersects_sphere_cone(&Sphere::new(Vec3::new(0.0, 0.0, -0.4), 0.5), &c));
        // beyond the base
        assert!(!intersects_sphere_cone(&Sphere::new(Vec3::new(0.0, 0.0, 6.0), 0.5), &c));
        assert!(intersects_sphere_cone(&Sphere::new(Vec3::new(0.0, 0.0, 5.4), 0.5), &c));
    }

    #[test]
    fn segment_cone_side_entry() {
        let c = Cone::new(Vec3::ZERO, Vec3::Z, 0.4, 5.0);
        let crossing = Line::segment(Vec3::new(-10.0, 0.0, 3.0), Vec3::new(10.0, 0.0, 3.0));
        assert!(intersects_line_cone(&crossing, &c));
        let missing = Line::segment(Vec3::new(-10.0, 0.0, -1.0), Vec3::new(10.0, 0.0, -1.0));
        assert!(!intersects_line_cone(&missing, &c));
    }

    #[test]
    fn aabb_cone_overlap_and_miss() {
        let c = Cone::new(Vec3::ZERO, Vec3::Z, 0.4, 5.0);
        let hit = Aabb::new(Vec3::new(-0.5, -0.5, 1.0), Vec3::new(0.5, 0.5, 2.0));
        assert!(intersects_aabb_cone(&hit, &c));
        let miss = Aabb::new(Vec3::new(10.0, 10.0, 10.0), Vec3::new(11.0, 11.0, 11.0));
        assert!(!intersects_aabb_cone(&miss, &c));
        let behind = Aabb::new(Vec3::new(-0.5, -0.5, -3.0), Vec3::new(0.5, 0.5, -1.0));
        assert!(!intersects_aabb_cone(&behind, &c));
    }

    #[test]
    fn plane_aabb_straddle() {
        let p = Plane::new(Vec3::ZERO, Vec3::Z);
        assert!(intersects_plane_aabb(&p, &Aabb::new(Vec3::splat(-1.0), Vec3::ONE)));
        assert!(!intersects_plane_aabb(&p, &Aabb::new(Vec3::new(0.0, 0.0, 1.0), Vec3::splat(2.0))));
    }

    #[test]
    fn segment_segment_distance() {
        let a = Line::segment(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        let b = Line::segment(Vec3::new(0.5, 1.0, 0.0), Vec3::new(0.5, 2.0, 0.0));
        assert!((distance_line_line(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn frustum_aabb_inside_and_outside() {
        let proj = glam::Mat4::perspective_rh_gl(1.0, 1.0, 0.1, 100.0);
        let view = glam::Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let f = Frustum::new(proj * view);
        assert!(intersects_aabb_frustum(&Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)), &f));
        assert!(!intersects_aabb_frustum(
            &Aabb::new(Vec3::new(0.0, 0.0, 50.0), Vec3::new(1.0, 1.0, 51.0)),
            &f
        ));
    }

    #[test]
    fn shape_dispatch_symmetry() {
        let s1 = Shape::Sphere(Sphere::new(Vec3::ZERO, 1.0));
        let s2 = Shape::Aabb(Aabb::new(Vec3::splat(0.5), Vec3::splat(2.0)));
        assert!(s1.intersects_shape(&s2));
        assert!(s2.intersects_shape(&s1));
        let far = Shape::Point(Vec3::splat(100.0));
        assert!(!s1.intersects_shape(&far));
        assert!(!far.intersects_shape(&s1));
    }
}
