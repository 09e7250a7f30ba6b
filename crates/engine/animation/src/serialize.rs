//! Buffer round-trips for rigs and animations (little endian).

use glam::{Mat4, Quat, Vec3};
use skein_core::Severity;
use thiserror::Error;

use crate::{SkeletalAnimation, SkeletonRig};

#[derive(Error, Debug)]
pub enum AnimationFormatError {
    #[error("not enough data: expected {expected} more bytes, {available} available")]
    NotEnoughData { expected: usize, available: usize },

    #[error("format error: {0}")]
    Format(String),
}

impl AnimationFormatError {
    /// Severity this kind of error is logged with.
    pub fn severity(&self) -> Severity {
        match self {
            AnimationFormatError::NotEnoughData { .. } => Severity::Error,
            AnimationFormatError::Format(_) => Severity::Error,
        }
    }
}

struct Writer {
    out: Vec<u8>,
}

impl Writer {
    fn u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }

    fn pod_slice<T: bytemuck::Pod>(&mut self, v: &[T]) {
        self.u32(v.len() as u32);
        self.out.extend_from_slice(bytemuck::cast_slice(v));
    }

    fn curves<T: bytemuck::Pod>(&mut self, times: &[Vec<f32>], values: &[Vec<T>]) {
        self.u32(times.len() as u32);
        for (t, v) in times.iter().zip(values) {
            self.pod_slice(t);
            self.pod_slice(v);
        }
    }
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], AnimationFormatError> {
        if self.data.len() < n {
            return Err(AnimationFormatError::NotEnoughData {
                expected: n,
                available: self.data.len(),
            });
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn u32(&mut self) -> Result<u32, AnimationFormatError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, AnimationFormatError> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn pod_vec<T: bytemuck::Pod>(&mut self) -> Result<Vec<T>, AnimationFormatError> {
        let count = self.u32()? as usize;
        let bytes = self.take(count * std::mem::size_of::<T>())?;
        let mut v = vec![T::zeroed(); count];
        bytemuck::cast_slice_mut::<T, u8>(&mut v).copy_from_slice(bytes);
        Ok(v)
    }

    fn curves<T: bytemuck::Pod>(
        &mut self,
    ) -> Result<(Vec<Vec<f32>>, Vec<Vec<T>>), AnimationFormatError> {
        let count = self.u32()? as usize;
        let mut times = Vec::with_capacity(count);
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            times.push(self.pod_vec::<f32>()?);
            values.push(self.pod_vec::<T>()?);
        }
        Ok((times, values))
    }

    fn finish(&self) -> Result<(), AnimationFormatError> {
        if !self.data.is_empty() {
            return Err(AnimationFormatError::Format(format!(
                "{} trailing bytes after deserialization",
                self.data.len()
            )));
        }
        Ok(())
    }
}

impl SkeletonRig {
    pub fn export_buffer(&self) -> Vec<u8> {
        let mut w = Writer { out: Vec::new() };
        w.out.extend_from_slice(bytemuck::bytes_of(&self.global_inverse));
        w.pod_slice(&self.parents);
        w.pod_slice(&self.base_matrices);
        w.pod_slice(&self.inv_rest_matrices);
        w.out
    }

    pub fn import_buffer(&mut self, buffer: &[u8]) -> Result<(), AnimationFormatError> {
        let mut r = Reader { data: buffer };
        let gi: Mat4 = *bytemuck::from_bytes(r.take(std::mem::size_of::<Mat4>())?);
        let parents = r.pod_vec::<u16>()?;
        let bases = r.pod_vec::<Mat4>()?;
        let inv_rests = r.pod_vec::<Mat4>()?;
        if parents.len() != bases.len() || parents.len() != inv_rests.len() {
            return Err(AnimationFormatError::Format("rig arrays are not parallel".into()));
        }
        r.finish()?;
        self.global_inverse = gi;
        self.parents = parents;
        self.base_matrices = bases;
        self.inv_rest_matrices = inv_rests;
        Ok(())
    }

    pub fn copy(&self) -> Self {
        let mut rig = Self::new();
        rig.import_buffer(&self.export_buffer()).expect("round trip is infallible");
        rig
    }
}

impl SkeletalAnimation {
    pub fn export_buffer(&self) -> Vec<u8> {
        let mut w = Writer { out: Vec::new() };
        w.pod_slice(&self.channels_mapping);
        w.curves(&self.position_times, &self.position_values);
        w.curves(&self.rotation_times, &self.rotation_values);
        w.curves(&self.scale_times, &self.scale_values);
        w.u64(self.duration);
        w.u32(self.skeleton_name);
        w.out
    }

    pub fn import_buffer(&mut self, buffer: &[u8]) -> Result<(), AnimationFormatError> {
        let mut r = Reader { data: buffer };
        let channels_mapping = r.pod_vec::<u16>()?;
        let (position_times, position_values) = r.curves::<Vec3>()?;
        let (rotation_times, rotation_values) = r.curves::<Quat>()?;
        let (scale_times, scale_values) = r.curves::<Vec3>()?;
        let duration = r.u64()?;
        let skeleton_name = r.u32()?;
        r.finish()?;
        *self = Self {
            channels_mapping,
            position_times,
            position_values,
            rotation_times,
            rotation_values,
            scale_times,
            scale_values,
            duration,
            skeleton_name,
        };
        Ok(())
    }

    pub fn copy(&self) -> Self {
        let mut anim = Self::new();
        anim.import_buffer(&self.export_buffer()).expect("round trip is infallible");
        anim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BONE_NONE;

    #[test]
    fn rig_round_trip() {
        let mut rig = SkeletonRig::new();
        let child = Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
        rig.skeleton_data(
            Mat4::from_scale(Vec3::splat(0.5)),
            &[BONE_NONE, 0],
            &[Mat4::IDENTITY, child],
            &[Mat4::IDENTITY, child.inverse()],
        );
        assert_eq!(rig.copy(), rig);
    }

    #[test]
    fn animation_round_trip() {
        let mut anim = SkeletalAnimation::new();
        anim.channels_mapping(&[0, BONE_NONE, 1]);
        anim.positions_data(
            &[&[0.0, 1.0], &[0.5]],
            &[&[Vec3::ZERO, Vec3::ONE], &[Vec3::X]],
        );
        anim.rotations_data(&[&[0.0], &[]], &[&[Quat::IDENTITY], &[]]);
        anim.scales_data(&[&[], &[1.0]], &[&[], &[Vec3::splat(2.0)]]);
        anim.set_duration(123_456);
        anim.set_skeleton_name(99);
        assert_eq!(anim.copy(), anim);
    }

    #[test]
    fn truncated_buffers_error() {
        let mut anim = SkeletalAnimation::new();
        anim.channels_mapping(&[0]);
        anim.positions_data(&[&[0.0]], &[&[Vec3::ZERO]]);
        anim.rotations_data(&[&[]], &[&[]]);
        anim.scales_data(&[&[]], &[&[]]);
        let buf = anim.export_buffer();
        let mut other = SkeletalAnimation::new();
        let err = other.import_buffer(&buf[..buf.len() - 2]).unwrap_err();
        assert!(matches!(err, AnimationFormatError::NotEnoughData { .. }));
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn trailing_bytes_error() {
        let rig = SkeletonRig::new();
        let mut buf = rig.export_buffer();
        buf.push(0);
        let mut other = SkeletonRig::new();
        assert!(other.import_buffer(&buf).is_err());
    }
}
