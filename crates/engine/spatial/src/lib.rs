//! Dynamic spatial structure over named shapes
//!
//! A [`SpatialStructure`] maps external `u32` names to owned shape records
//! and maintains a binned-SAH BVH over them, rebuilt on demand. Queries go
//! through [`SpatialQuery`] objects that share the structure's current
//! data; any mutation marks the structure dirty and queries fail until the
//! next [`SpatialStructure::rebuild`].
//!
//! The structure is single-writer. Query objects may be used from other
//! threads between rebuilds; they observe the data published by the most
//! recent rebuild.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;
use skein_core::Severity;
use skein_geometry::{Aabb, Shape, TestShape};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpatialError {
    /// Query issued between a mutation and the next rebuild.
    #[error("spatial structure queried while dirty; call rebuild() first")]
    Dirty,
}

impl SpatialError {
    /// Severity this kind of error is logged with.
    pub fn severity(&self) -> Severity {
        match self {
            SpatialError::Dirty => Severity::Error,
        }
    }
}

/// One BVH node. Child indices are packed as negatives; a leaf addresses a
/// range of the item-index array.
#[derive(Debug, Clone, Copy)]
struct Node {
    aabb: Aabb,
    /// inner: `-left_child`; leaf: offset into the index array
    a: i32,
    /// inner: `-right_child`; leaf: item count
    b: i32,
}

impl Node {
    fn is_inner(&self) -> bool {
        self.a < 0
    }
}

#[derive(Debug, Clone)]
struct Item {
    name: u32,
    shape: Shape,
    aabb: Aabb,
    center: Vec3,
}

/// Immutable data produced by one rebuild.
#[derive(Debug, Default)]
struct SpatialData {
    nodes: Vec<Node>,
    /// leaf ranges address this indirection into `items`
    indices: Vec<u32>,
    items: Vec<Item>,
}

/// State shared between the structure and its queries.
struct Shared {
    dirty: AtomicBool,
    data: RwLock<Arc<SpatialData>>,
}

const LEAF_ITEMS: i32 = 16;
const BIN_COUNT: usize = 10;
const FLAT_AXIS_EPS: f32 = 1e-7;

/// See the crate docs.
pub struct SpatialStructure {
    items: HashMap<u32, Item>,
    shared: Arc<Shared>,
}

impl Default for SpatialStructure {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialStructure {
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
            shared: Arc::new(Shared {
                dirty: AtomicBool::new(false),
                data: RwLock::new(Arc::new(SpatialData::default())),
            }),
        }
    }

    /// Inserts or replaces the shape stored under `name`.
    pub fn update(&mut self, name: u32, shape: Shape) {
        debug_assert!(shape.is_valid(), "invalid shape for name {name}");
        let aabb = shape.aabb();
        self.shared.dirty.store(true, Ordering::Release);
        self.items.insert(name, Item { name, shape, aabb, center: aabb.center() });
    }

    pub fn remove(&mut self, name: u32) {
        self.shared.dirty.store(true, Ordering::Release);
        self.items.remove(&name);
    }

    pub fn clear(&mut self) {
        self.shared.dirty.store(true, Ordering::Release);
        self.items.clear();
    }

    pub fn needs_rebuild(&self) -> bool {
        self.shared.dirty.load(Ordering::Acquire)
    }

    /// Creates a query object against this structure's data.
    pub fn query(&self) -> SpatialQuery {
        SpatialQuery { shared: self.shared.clone(), result: Vec::with_capacity(100) }
    }

    /// Rebuilds the BVH and publishes it to queries.
    pub fn rebuild(&mut self) {
        let mut data = SpatialData {
            nodes: Vec::with_capacity(self.items.len()),
            indices: Vec::with_capacity(self.items.len()),
            items: self.items.values().cloned().collect(),
        };
        if !data.items.is_empty() {
            let mut world = Aabb::EMPTY;
            for it in &data.items {
                world = world.union(&it.aabb);
            }
            data.indices = (0..data.items.len() as u32).collect();
            data.nodes.push(Node { aabb: world, a: 0, b: data.items.len() as i32 });
            build(&mut data, 0, f32::INFINITY);
            #[cfg(debug_assertions)]
            validate(&data, 0);
        }
        tracing::trace!(
            target: "spatial",
            items = data.items.len(),
            nodes = data.nodes.len(),
            "structure rebuilt"
        );
        *self.shared.data.write() = Arc::new(data);
        self.shared.dirty.store(false, Ordering::Release);
    }
}

fn build(data: &mut SpatialData, node_index: usize, parent_sah: f32) {
    let node = data.nodes[node_index];
    debug_assert!(node.a >= 0 && node.b >= 0);
    if node.b < LEAF_ITEMS {
        return;
    }
    let count = node.b as u32;

    let mut best_axis = usize::MAX;
    let mut best_items = 0u32;
    let mut best_sah = f32::INFINITY;
    let mut best_left = Aabb::EMPTY;
    let mut best_right = Aabb::EMPTY;

    for axis in 0..3 {
        let extent = node.aabb.max[axis] - node.aabb.min[axis];
        if extent < FLAT_AXIS_EPS {
            continue;
        }
        let inv = BIN_COUNT as f32 / extent;
        let offset = node.aabb.min[axis];
        let mut bin_boxes = [Aabb::EMPTY; BIN_COUNT];
        let mut bin_counts = [0u32; BIN_COUNT];
        for &i in &data.indices[node.a as usize..(node.a + node.b) as usize] {
            let item = &data.items[i as usize];
            let bin = (((item.center[axis] - offset) * inv) as usize).min(BIN_COUNT - 1);
            bin_boxes[bin] = bin_boxes[bin].union(&item.aabb);
            bin_counts[bin] += 1;
        }
        // right-to-left suffix boxes
        let mut right_boxes = [Aabb::EMPTY; BIN_COUNT];
        right_boxes[BIN_COUNT - 1] = bin_boxes[BIN_COUNT - 1];
        for i in (1..BIN_COUNT).rev() {
            right_boxes[i - 1] = right_boxes[i].union(&bin_boxes[i - 1]);
        }
        // left-to-right prefix
        let mut left_boxes = bin_boxes;
        let mut left_counts = bin_counts;
        for i in 1..BIN_COUNT {
            left_boxes[i] = left_boxes[i].union(&left_boxes[i - 1]);
            left_counts[i] += left_counts[i - 1];
        }
        debug_assert_eq!(left_counts[BIN_COUNT - 1], count);

        for i in 0..BIN_COUNT - 1 {
            let sah_l = left_boxes[i].surface_area() * left_counts[i] as f32;
            let sah_r = right_boxes[i + 1].surface_area() * (count - left_counts[i]) as f32;
            let sah = sah_l + sah_r;
            if sah < best_sah {
                best_axis = axis;
                best_sah = sah;
                best_items = left_counts[i];
                best_left = left_boxes[i];
                best_right = right_boxes[i + 1];
            }
        }
    }

    if best_sah >= parent_sah {
        return; // a split would make no improvement
    }
    if best_items == 0 || best_items >= count {
        return; // cannot separate the items (all at one position)
    }
    debug_assert!(best_axis < 3);

    {
        // partition by bin index; after an ascending stable sort the first
        // `best_items` entries are exactly the left side of the split
        let inv = BIN_COUNT as f32 / (node.aabb.max[best_axis] - node.aabb.min[best_axis]);
        let offset = node.aabb.min[best_axis];
        let items = &data.items;
        data.indices[node.a as usize..(node.a + node.b) as usize].sort_by_key(|&i| {
            let c = items[i as usize].center[best_axis];
            (((c - offset) * inv) as usize).min(BIN_COUNT - 1)
        });
    }

    let left_index = data.nodes.len() as i32;
    data.nodes.push(Node { aabb: best_left, a: node.a, b: best_items as i32 });
    build(data, left_index as usize, best_sah);
    let right_index = data.nodes.len() as i32;
    data.nodes.push(Node {
        aabb: best_right,
        a: node.a + best_items as i32,
        b: node.b - best_items as i32,
    });
    build(data, right_index as usize, best_sah);
    let n = &mut data.nodes[node_index];
    n.a = -left_index;
    n.b = -right_index;
}

#[cfg(debug_assertions)]
fn validate(data: &SpatialData, node_index: usize) {
    fn similar(a: &Aabb, b: &Aabb) -> bool {
        (a.min - b.min).length() + (a.max - b.max).length() < 1e-3
    }
    let node = data.nodes[node_index];
    debug_assert_eq!(node.a < 0, node.b < 0);
    if node.is_inner() {
        let l = data.nodes[(-node.a) as usize];
        let r = data.nodes[(-node.b) as usize];
        validate(data, (-node.a) as usize);
        validate(data, (-node.b) as usize);
        debug_assert!(similar(&node.aabb, &l.aabb.union(&r.aabb)));
    } else {
        let mut b = Aabb::EMPTY;
        for &i in &data.indices[node.a as usize..(node.a + node.b) as usize] {
            b = b.union(&data.items[i as usize].aabb);
        }
        debug_assert!(similar(&node.aabb, &b));
    }
}

/// Read handle over a structure's published data. Holds the names matched
/// by the most recent query.
pub struct SpatialQuery {
    shared: Arc<Shared>,
    result: Vec<u32>,
}

impl SpatialQuery {
    /// Names matched by the last successful [`Self::intersection`].
    pub fn result(&self) -> &[u32] {
        &self.result
    }

    /// Finds all stored shapes intersecting `shape`. Returns whether any
    /// matched; the names are available through [`Self::result`].
    pub fn intersection<S: TestShape>(&mut self, shape: &S) -> Result<bool, SpatialError> {
        if self.shared.dirty.load(Ordering::Acquire) {
            return Err(SpatialError::Dirty);
        }
        self.result.clear();
        let data = self.shared.data.read().clone();
        if data.nodes.is_empty() {
            return Ok(false);
        }
        let query_box = shape.aabb();
        descend(&data, shape, &query_box, 0, &mut self.result);
        Ok(!self.result.is_empty())
    }
}

fn descend<S: TestShape>(
    data: &SpatialData,
    shape: &S,
    query_box: &Aabb,
    node_index: usize,
    out: &mut Vec<u32>,
) {
    let node = &data.nodes[node_index];
    if !query_box.intersects(&node.aabb) {
        return;
    }
    // exact re-test culls the conservative box-only false positives of
    // non-box query shapes
    if !S::IS_AABB && !shape.intersects_aabb(&node.aabb) {
        return;
    }
    if node.is_inner() {
        descend(data, shape, query_box, (-node.a) as usize, out);
        descend(data, shape, query_box, (-node.b) as usize, out);
    } else {
        for &i in &data.indices[node.a as usize..(node.a + node.b) as usize] {
            let item = &data.items[i as usize];
            if shape.intersects_shape(&item.shape) {
                out.push(item.name);
            }
        }
    }
}
