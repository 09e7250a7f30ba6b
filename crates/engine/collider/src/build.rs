//! Binned surface-area-heuristic BVH construction.

use skein_geometry::{Aabb, Triangle};

use crate::{BvhNode, Collider};

const LEAF_TRIANGLES: usize = 10;
const BIN_COUNT: usize = 12;
const FLAT_AXIS_EPS: f32 = 1e-7;

pub(crate) fn rebuild(c: &mut Collider) {
    let count = c.tris.len();
    c.boxes.clear();
    c.boxes.reserve(count / 5 + 1);
    c.nodes.clear();
    c.nodes.reserve(count / 5 + 1);
    let mut ts = std::mem::take(&mut c.tris);
    c.tris.reserve(count);
    build(c, &mut ts);
    debug_assert_eq!(c.tris.len(), count);
}

fn build(c: &mut Collider, ts: &mut Vec<Triangle>) {
    let mut bbox = Aabb::EMPTY;
    for t in ts.iter() {
        bbox = bbox.union(&t.aabb());
    }
    c.boxes.push(bbox);

    if ts.len() <= LEAF_TRIANGLES {
        build_leaf(c, ts);
        return;
    }

    // pick the axis and split plane minimizing the SAH cost; the parent's
    // own cost is the bar a split has to clear
    let parent_cost = bbox.surface_area() * ts.len() as f32;
    let mut best: Option<(usize, usize)> = None;
    let mut best_sah = parent_cost;
    for axis in 0..3 {
        let extent = bbox.max[axis] - bbox.min[axis];
        if extent < FLAT_AXIS_EPS {
            continue;
        }
        let mut bin_boxes = [Aabb::EMPTY; BIN_COUNT];
        let mut bin_counts = [0u32; BIN_COUNT];
        let scale = BIN_COUNT as f32 / extent;
        for t in ts.iter() {
            let d = (t.center()[axis] - bbox.min[axis]) * scale;
            let bin = (d as usize).min(BIN_COUNT - 1);
            bin_boxes[bin] = bin_boxes[bin].union(&t.aabb());
            bin_counts[bin] += 1;
        }

        // left-to-right prefix
        let mut left_box = [Aabb::EMPTY; BIN_COUNT];
        let mut left_count = [0u32; BIN_COUNT];
        let mut acc_box = Aabb::EMPTY;
        let mut acc_count = 0;
        for i in 0..BIN_COUNT {
            acc_box = acc_box.union(&bin_boxes[i]);
            acc_count += bin_counts[i];
            left_box[i] = acc_box;
            left_count[i] = acc_count;
        }
        // right-to-left suffix
        let mut right_box = [Aabb::EMPTY; BIN_COUNT];
        let mut right_count = [0u32; BIN_COUNT];
        acc_box = Aabb::EMPTY;
        acc_count = 0;
        for i in (0..BIN_COUNT).rev() {
            acc_box = acc_box.union(&bin_boxes[i]);
            acc_count += bin_counts[i];
            right_box[i] = acc_box;
            right_count[i] = acc_count;
        }
        debug_assert_eq!(left_count[BIN_COUNT - 1] as usize, ts.len());

        for i in 0..BIN_COUNT - 1 {
            let nl = left_count[i];
            let nr = right_count[i + 1];
            if nl == 0 || nr == 0 {
                continue;
            }
            let sah = left_box[i].surface_area() * nl as f32 + right_box[i + 1].surface_area() * nr as f32;
            if sah < best_sah {
                best_sah = sah;
                best = Some((axis, nl as usize));
            }
        }
    }

    let Some((axis, split)) = best else {
        build_leaf(c, ts);
        return;
    };
    debug_assert!(split > 0 && split < ts.len());

    ts.sort_by(|a, b| a.center()[axis].total_cmp(&b.center()[axis]));
    let mut right = ts.split_off(split);

    let idx = c.nodes.len();
    c.nodes.push(BvhNode { left: 0, right: 0 });
    build(c, ts);
    let right_idx = c.nodes.len();
    build(c, &mut right);
    c.nodes[idx] = BvhNode {
        left: -((idx + 1) as i32),
        right: -(right_idx as i32),
    };
}

fn build_leaf(c: &mut Collider, ts: &mut Vec<Triangle>) {
    let start = c.tris.len() as i32;
    c.tris.append(ts);
    c.nodes.push(BvhNode { left: start, right: c.tris.len() as i32 });
}

/// Walks the finished tree asserting the box-tightness invariant.
#[cfg(debug_assertions)]
pub(crate) fn validate(c: &Collider, idx: usize) {
    fn similar(a: &Aabb, b: &Aabb) -> bool {
        if a.is_empty() && b.is_empty() {
            return true;
        }
        (a.min - b.min).abs().max_element() + (a.max - b.max).abs().max_element() < 1e-3
    }
    let n = c.nodes[idx];
    if n.is_inner() {
        let (l, r) = n.children();
        validate(c, l);
        validate(c, r);
        debug_assert!(similar(&c.boxes[idx], &c.boxes[l].union(&c.boxes[r])));
    } else {
        let mut b = Aabb::EMPTY;
        for t in &c.tris[n.triangle_range()] {
            b = b.union(&t.aabb());
        }
        debug_assert!(similar(&c.boxes[idx], &b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn grid_collider(n: usize) -> Collider {
        let mut c = Collider::new();
        for i in 0..n {
            for j in 0..n {
                let o = Vec3::new(i as f32 * 2.0, j as f32 * 2.0, 0.0);
                c.add_triangle(Triangle::new(o, o + Vec3::X, o + Vec3::Y));
            }
        }
        c.rebuild();
        c
    }

    #[test]
    fn small_sets_form_a_single_leaf() {
        let c = grid_collider(3); // 9 triangles
        assert_eq!(c.nodes.len(), 1);
        assert!(!c.nodes[0].is_inner());
    }

    #[test]
    fn larger_sets_split() {
        let c = grid_collider(8); // 64 triangles
        assert!(c.nodes[0].is_inner());
        let (l, _) = c.nodes[0].children();
        assert_eq!(l, 1, "left child must follow its parent");
        // every triangle is reachable exactly once through leaf ranges
        let mut covered = vec![false; c.tris.len()];
        for n in &c.nodes {
            if !n.is_inner() {
                for i in n.triangle_range() {
                    assert!(!covered[i]);
                    covered[i] = true;
                }
            }
        }
        assert!(covered.iter().all(|&v| v));
    }

    #[test]
    fn root_box_encloses_everything() {
        let c = grid_collider(8);
        let root = c.boxes[0];
        for t in c.triangles() {
            let b = t.aabb();
            assert!(root.union(&b) == root || (root.min - root.union(&b).min).length() < 1e-4);
        }
    }

    #[test]
    fn identical_centroids_stay_a_leaf() {
        // all triangles share a centroid, no split can separate them
        let mut c = Collider::new();
        for _ in 0..32 {
            c.add_triangle(Triangle::new(
                Vec3::new(-1.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ));
        }
        c.rebuild();
        assert_eq!(c.nodes.len(), 1);
    }
}
