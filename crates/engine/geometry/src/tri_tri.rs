//! Triangle-triangle overlap test.
//!
//! Guigue-Devillers orientation-predicate formulation with the co-planar
//! case handled by 2D projection onto the dominant axis of the first
//! triangle's normal.

use glam::{Vec2, Vec3};

use crate::shapes::Triangle;

pub fn tri_tri_overlap(t1: &Triangle, t2: &Triangle) -> bool {
    let (p1, q1, r1) = (t1.vertices[0], t1.vertices[1], t1.vertices[2]);
    let (p2, q2, r2) = (t2.vertices[0], t2.vertices[1], t2.vertices[2]);

    let n2 = (p2 - r2).cross(q2 - r2);
    let dp1 = (p1 - r2).dot(n2);
    let dq1 = (q1 - r2).dot(n2);
    let dr1 = (r1 - r2).dot(n2);

    if dp1 * dq1 > 0.0 && dp1 * dr1 > 0.0 {
        return false;
    }

    let n1 = (q1 - p1).cross(r1 - p1);
    let dp2 = (p2 - r1).dot(n1);
    let dq2 = (q2 - r1).dot(n1);
    let dr2 = (r2 - r1).dot(n1);

    if dp2 * dq2 > 0.0 && dp2 * dr2 > 0.0 {
        return false;
    }

    // Permute triangle 1 so that p1 is alone on its side of triangle 2's
    // plane, with a consistent winding, then dispatch.
    if dp1 > 0.0 {
        if dq1 > 0.0 {
            check_permuted(r1, p1, q1, p2, r2, q2, dp2, dr2, dq2)
        } else if dr1 > 0.0 {
            check_permuted(q1, r1, p1, p2, r2, q2, dp2, dr2, dq2)
        } else {
            check_permuted(p1, q1, r1, p2, q2, r2, dp2, dq2, dr2)
        }
    } else if dp1 < 0.0 {
        if dq1 < 0.0 {
            check_permuted(r1, p1, q1, p2, q2, r2, dp2, dq2, dr2)
        } else if dr1 < 0.0 {
            check_permuted(q1, r1, p1, p2, q2, r2, dp2, dq2, dr2)
        } else {
            check_permuted(p1, q1, r1, p2, r2, q2, dp2, dr2, dq2)
        }
    } else if dq1 < 0.0 {
        if dr1 >= 0.0 {
            check_permuted(q1, r1, p1, p2, r2, q2, dp2, dr2, dq2)
        } else {
            check_permuted(p1, q1, r1, p2, q2, r2, dp2, dq2, dr2)
        }
    } else if dq1 > 0.0 {
        if dr1 > 0.0 {
            check_permuted(p1, q1, r1, p2, r2, q2, dp2, dr2, dq2)
        } else {
            check_permuted(q1, r1, p1, p2, q2, r2, dp2, dq2, dr2)
        }
    } else if dr1 > 0.0 {
        check_permuted(r1, p1, q1, p2, q2, r2, dp2, dq2, dr2)
    } else if dr1 < 0.0 {
        check_permuted(r1, p1, q1, p2, r2, q2, dp2, dr2, dq2)
    } else {
        coplanar_tri_tri(t1, t2, n1)
    }
}

/// One branch of the permuted interval test. Triangle 2 is re-permuted so
/// that its p vertex is on the positive side of triangle 1's plane.
#[allow(clippy::too_many_arguments)]
fn check_permuted(
    p1: Vec3,
    q1: Vec3,
    r1: Vec3,
    p2: Vec3,
    q2: Vec3,
    r2: Vec3,
    dp2: f32,
    dq2: f32,
    dr2: f32,
) -> bool {
    if dp2 > 0.0 {
        if dq2 > 0.0 {
            check_min_max(p1, r1, q1, r2, p2, q2)
        } else if dr2 > 0.0 {
            check_min_max(p1, r1, q1, q2, r2, p2)
        } else {
            check_min_max(p1, q1, r1, p2, q2, r2)
        }
    } else if dp2 < 0.0 {
        if dq2 < 0.0 {
            check_min_max(p1, q1, r1, r2, p2, q2)
        } else if dr2 < 0.0 {
            check_min_max(p1, q1, r1, q2, r2, p2)
        } else {
            check_min_max(p1, r1, q1, p2, q2, r2)
        }
    } else if dq2 < 0.0 {
        if dr2 >= 0.0 {
            check_min_max(p1, r1, q1, q2, r2, p2)
        } else {
            check_min_max(p1, q1, r1, p2, q2, r2)
        }
    } else if dq2 > 0.0 {
        if dr2 > 0.0 {
            check_min_max(p1, r1, q1, p2, q2, r2)
        } else {
            check_min_max(p1, q1, r1, q2, r2, p2)
        }
    } else if dr2 > 0.0 {
        check_min_max(p1, q1, r1, r2, p2, q2)
    } else if dr2 < 0.0 {
        check_min_max(p1, r1, q1, r2, p2, q2)
    } else {
        // both in triangle 1's plane; handled by the caller's coplanar path
        let n1 = (q1 - p1).cross(r1 - p1);
        coplanar_tri_tri(&Triangle::new(p1, q1, r1), &Triangle::new(p2, q2, r2), n1)
    }
}

/// Final interval overlap check on canonically permuted vertices.
fn check_min_max(p1: Vec3, q1: Vec3, r1: Vec3, p2: Vec3, q2: Vec3, r2: Vec3) -> bool {
    let n = (p2 - q1).cross(p1 - q1);
    if (q2 - q1).dot(n) > 0.0 {
        return false;
    }
    let n = (p2 - p1).cross(r1 - p1);
    (r2 - p1).dot(n) <= 0.0
}

fn coplanar_tri_tri(t1: &Triangle, t2: &Triangle, n1: Vec3) -> bool {
    // project onto the plane's dominant axis
    let a = n1.abs();
    let project: fn(Vec3) -> Vec2 = if a.x > a.y && a.x > a.z {
        |v| Vec2::new(v.z, v.y)
    } else if a.y > a.z {
        |v| Vec2::new(v.x, v.z)
    } else {
        |v| Vec2::new(v.x, v.y)
    };
    let u: [Vec2; 3] = [project(t1.vertices[0]), project(t1.vertices[1]), project(t1.vertices[2])];
    let v: [Vec2; 3] = [project(t2.vertices[0]), project(t2.vertices[1]), project(t2.vertices[2])];
    tri_tri_overlap_2d(&u, &v)
}

fn orient_2d(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (a.x - c.x) * (b.y - c.y) - (a.y - c.y) * (b.x - c.x)
}

fn ccw(t: &[Vec2; 3]) -> [Vec2; 3] {
    if orient_2d(t[0], t[1], t[2]) < 0.0 {
        [t[0], t[2], t[1]]
    } else {
        *t
    }
}

fn tri_tri_overlap_2d(t1: &[Vec2; 3], t2: &[Vec2; 3]) -> bool {
    let a = ccw(t1);
    let b = ccw(t2);
    !edge_separates(&a, &b) && !edge_separates(&b, &a)
}

/// True when some edge of `a` has all of `b` strictly outside.
fn edge_separates(a: &[Vec2; 3], b: &[Vec2; 3]) -> bool {
    for i in 0..3 {
        let p = a[i];
        let q = a[(i + 1) % 3];
        if b.iter().all(|&v| orient_2d(p, q, v) < 0.0) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> Triangle {
        Triangle::new(a.into(), b.into(), c.into())
    }

    #[test]
    fn crossing_triangles_overlap() {
        let a = tri([0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]);
        let b = tri([0.5, 0.5, -1.0], [0.5, 0.5, 1.0], [1.5, 0.5, 1.0]);
        assert!(tri_tri_overlap(&a, &b));
        assert!(tri_tri_overlap(&b, &a));
    }

    #[test]
    fn parallel_offset_planes_do_not_overlap() {
        let a = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let b = tri([0.0, 0.0, 0.5], [1.0, 0.0, 0.5], [0.0, 1.0, 0.5]);
        assert!(!tri_tri_overlap(&a, &b));
    }

    #[test]
    fn coplanar_overlapping() {
        let a = tri([0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]);
        let b = tri([0.5, 0.5, 0.0], [1.5, 0.5, 0.0], [0.5, 1.5, 0.0]);
        assert!(tri_tri_overlap(&a, &b));
    }

    #[test]
    fn coplanar_disjoint() {
        let a = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let b = tri([5.0, 5.0, 0.0], [6.0, 5.0, 0.0], [5.0, 6.0, 0.0]);
        assert!(!tri_tri_overlap(&a, &b));
    }

    #[test]
    fn distant_triangles_do_not_overlap() {
        let a = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let b = tri([10.0, 10.0, 10.0], [11.0, 10.0, 10.0], [10.0, 11.0, 10.0]);
        assert!(!tri_tri_overlap(&a, &b));
    }
}
