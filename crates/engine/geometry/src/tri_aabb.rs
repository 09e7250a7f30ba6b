//! Triangle-AABB overlap via the 13-axis separating axis test.
//!
//! Axes: the three box normals, the triangle normal (through a bounded
//! plane-box overlap), and the nine cross products of box normals with
//! triangle edges.

use glam::Vec3;

use crate::shapes::{Aabb, Triangle};

pub fn tri_aabb_overlap(t: &Triangle, b: &Aabb) -> bool {
    if b.is_empty() {
        return false;
    }
    let center = b.center();
    let half = b.size() * 0.5;

    // triangle in box-centered coordinates
    let v0 = t.vertices[0] - center;
    let v1 = t.vertices[1] - center;
    let v2 = t.vertices[2] - center;

    let e0 = v1 - v0;
    let e1 = v2 - v1;
    let e2 = v0 - v2;

    // 9 edge cross-product axes
    for (edge, fa) in [(e0, e0.abs()), (e1, e1.abs()), (e2, e2.abs())] {
        // a_x = (1,0,0) x edge, etc.
        if !axis_test(
            Vec3::new(0.0, -edge.z, edge.y),
            fa.z * half.y + fa.y * half.z,
            v0,
            v1,
            v2,
        ) {
            return false;
        }
        if !axis_test(
            Vec3::new(edge.z, 0.0, -edge.x),
            fa.z * half.x + fa.x * half.z,
            v0,
            v1,
            v2,
        ) {
            return false;
        }
        if !axis_test(
            Vec3::new(-edge.y, edge.x, 0.0),
            fa.y * half.x + fa.x * half.y,
            v0,
            v1,
            v2,
        ) {
            return false;
        }
    }

    // 3 box normals
    for i in 0..3 {
        let min = v0[i].min(v1[i]).min(v2[i]);
        let max = v0[i].max(v1[i]).max(v2[i]);
        if min > half[i] || max < -half[i] {
            return false;
        }
    }

    // triangle plane
    let normal = e0.cross(e1);
    plane_box_overlap(normal, v0, half)
}

fn axis_test(axis: Vec3, rad: f32, v0: Vec3, v1: Vec3, v2: Vec3) -> bool {
    let p0 = axis.dot(v0);
    let p1 = axis.dot(v1);
    let p2 = axis.dot(v2);
    let min = p0.min(p1).min(p2);
    let max = p0.max(p1).max(p2);
    min <= rad && max >= -rad
}

fn plane_box_overlap(normal: Vec3, vert: Vec3, half: Vec3) -> bool {
    let mut vmin = Vec3::ZERO;
    let mut vmax = Vec3::ZERO;
    for i in 0..3 {
        let v = vert[i];
        if normal[i] > 0.0 {
            vmin[i] = -half[i] - v;
            vmax[i] = half[i] - v;
        } else {
            vmin[i] = half[i] - v;
            vmax[i] = -half[i] - v;
        }
    }
    if normal.dot(vmin) > 0.0 {
        return false;
    }
    normal.dot(vmax) >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_inside_box() {
        let t = Triangle::new(
            Vec3::new(0.1, 0.1, 0.1),
            Vec3::new(0.4, 0.1, 0.1),
            Vec3::new(0.1, 0.4, 0.1),
        );
        let b = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(tri_aabb_overlap(&t, &b));
    }

    #[test]
    fn triangle_piercing_box_without_contained_vertex() {
        let t = Triangle::new(
            Vec3::new(-2.0, 0.5, 0.5),
            Vec3::new(3.0, 0.5, 0.5),
            Vec3::new(0.5, 5.0, 0.5),
        );
        let b = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(tri_aabb_overlap(&t, &b));
    }

    #[test]
    fn triangle_outside_box() {
        let t = Triangle::new(
            Vec3::new(2.0, 2.0, 2.0),
            Vec3::new(3.0, 2.0, 2.0),
            Vec3::new(2.0, 3.0, 2.0),
        );
        let b = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(!tri_aabb_overlap(&t, &b));
    }

    #[test]
    fn diagonal_plane_separates() {
        // triangle in a plane that clips the corner region but misses the box
        let t = Triangle::new(
            Vec3::new(3.0, 0.0, 0.0),
            Vec3::new(0.0, 3.0, 0.0),
            Vec3::new(0.0, 0.0, 3.0),
        );
        let b = Aabb::new(Vec3::ZERO, Vec3::splat(0.5));
        assert!(!tri_aabb_overlap(&t, &b));
        let b2 = Aabb::new(Vec3::ZERO, Vec3::splat(1.5));
        assert!(tri_aabb_overlap(&t, &b2));
    }
}
