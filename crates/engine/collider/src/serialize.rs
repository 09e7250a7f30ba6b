//! Collider wire format.
//!
//! Layout (little endian): 6-byte magic `colid\0`, u16 version, u32
//! triangle count, u32 node count, u8 dirty flag, then the triangle
//! (9 x f32), box (6 x f32) and node (2 x i32) arrays verbatim.

use skein_geometry::{Aabb, Triangle};

use crate::{BvhNode, Collider, ColliderError};

const MAGIC: &[u8; 6] = b"colid\0";
const VERSION: u16 = 2;
const HEADER_SIZE: usize = 6 + 2 + 4 + 4 + 1;

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ColliderError> {
        if self.data.len() < n {
            return Err(ColliderError::NotEnoughData {
                expected: n,
                available: self.data.len(),
            });
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn u16(&mut self) -> Result<u16, ColliderError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32, ColliderError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u8(&mut self) -> Result<u8, ColliderError> {
        Ok(self.take(1)?[0])
    }

    fn pod_vec<T: bytemuck::Pod>(&mut self, count: usize) -> Result<Vec<T>, ColliderError> {
        let bytes = self.take(count * std::mem::size_of::<T>())?;
        let mut v = vec![T::zeroed(); count];
        bytemuck::cast_slice_mut::<T, u8>(&mut v).copy_from_slice(bytes);
        Ok(v)
    }
}

impl Collider {
    /// Serializes the collider, BVH included, byte-for-byte reproducibly.
    pub fn export_buffer(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            HEADER_SIZE
                + self.tris.len() * std::mem::size_of::<Triangle>()
                + self.boxes.len() * std::mem::size_of::<Aabb>()
                + self.nodes.len() * std::mem::size_of::<BvhNode>(),
        );
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&(self.tris.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.nodes.len() as u32).to_le_bytes());
        out.push(self.dirty as u8);
        out.extend_from_slice(bytemuck::cast_slice(&self.tris));
        out.extend_from_slice(bytemuck::cast_slice(&self.boxes));
        out.extend_from_slice(bytemuck::cast_slice(&self.nodes));
        out
    }

    /// Replaces this collider's content from a serialized buffer.
    pub fn import_buffer(&mut self, buffer: &[u8]) -> Result<(), ColliderError> {
        let mut r = Reader { data: buffer };
        let magic = r.take(6)?;
        if magic != MAGIC {
            return Err(ColliderError::Format("wrong magic".into()));
        }
        let version = r.u16()?;
        if version != VERSION {
            return Err(ColliderError::Format(format!(
                "unsupported version {version}, expected {VERSION}"
            )));
        }
        let tris_count = r.u32()? as usize;
        let nodes_count = r.u32()? as usize;
        let dirty = r.u8()? != 0;
        let tris = r.pod_vec::<Triangle>(tris_count)?;
        let boxes = r.pod_vec::<Aabb>(nodes_count)?;
        let nodes = r.pod_vec::<BvhNode>(nodes_count)?;
        self.tris = tris;
        self.boxes = boxes;
        self.nodes = nodes;
        self.dirty = dirty;
        Ok(())
    }
}
