//! Skeletal animation evaluation
//!
//! A [`SkeletonRig`] holds the bone hierarchy (parent indices, bind and
//! inverse-rest matrices, global inverse); a [`SkeletalAnimation`] holds
//! sparse per-channel keyframe curves and a bone-to-channel mapping. The
//! evaluators sample the curves at a coefficient in `[0, 1]`, compose
//! `T * R * S` per bone, accumulate through the hierarchy in one pre-order
//! pass (parents always precede children), and produce skinning matrices,
//! bone-visualization matrices, or an animated mesh.

mod serialize;

pub use serialize::AnimationFormatError;

use glam::{Mat3, Mat4, Quat, Vec3, Vec4};

/// Parent/channel index meaning "none".
pub const BONE_NONE: u16 = u16::MAX;

/// Bone hierarchy with bind-pose data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletonRig {
    pub(crate) global_inverse: Mat4,
    pub(crate) parents: Vec<u16>,
    pub(crate) base_matrices: Vec<Mat4>,
    pub(crate) inv_rest_matrices: Vec<Mat4>,
}

impl SkeletonRig {
    pub fn new() -> Self {
        Self { global_inverse: Mat4::IDENTITY, ..Self::default() }
    }

    /// Replaces all rig data. The arrays are parallel per bone; every
    /// parent index must be smaller than its child's.
    pub fn skeleton_data(
        &mut self,
        global_inverse: Mat4,
        parents: &[u16],
        bases: &[Mat4],
        inv_rests: &[Mat4],
    ) {
        assert_eq!(parents.len(), bases.len());
        assert_eq!(parents.len(), inv_rests.len());
        debug_assert!(parents
            .iter()
            .enumerate()
            .all(|(i, &p)| p == BONE_NONE || (p as usize) < i));
        self.global_inverse = global_inverse;
        self.parents = parents.to_vec();
        self.base_matrices = bases.to_vec();
        self.inv_rest_matrices = inv_rests.to_vec();
    }

    pub fn clear(&mut self) {
        self.parents.clear();
        self.base_matrices.clear();
        self.inv_rest_matrices.clear();
    }

    pub fn bones_count(&self) -> usize {
        self.parents.len()
    }

    pub fn global_inverse(&self) -> Mat4 {
        self.global_inverse
    }

    pub fn parents(&self) -> &[u16] {
        &self.parents
    }

    pub fn bases(&self) -> &[Mat4] {
        &self.base_matrices
    }

    pub fn inv_rests(&self) -> &[Mat4] {
        &self.inv_rest_matrices
    }
}

/// Sparse keyframed animation targeting one rig.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletalAnimation {
    /// bone -> channel; [`BONE_NONE`] for unanimated bones
    pub(crate) channels_mapping: Vec<u16>,
    pub(crate) position_times: Vec<Vec<f32>>,
    pub(crate) position_values: Vec<Vec<Vec3>>,
    pub(crate) rotation_times: Vec<Vec<f32>>,
    pub(crate) rotation_values: Vec<Vec<Quat>>,
    pub(crate) scale_times: Vec<Vec<f32>>,
    pub(crate) scale_values: Vec<Vec<Vec3>>,
    /// microseconds
    pub(crate) duration: u64,
    /// hashed name of the rig this animation targets
    pub(crate) skeleton_name: u32,
}

impl SkeletalAnimation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn channels_mapping(&mut self, mapping: &[u16]) {
        self.channels_mapping = mapping.to_vec();
    }

    pub fn positions_data(&mut self, times: &[&[f32]], values: &[&[Vec3]]) {
        assert_eq!(times.len(), values.len());
        self.position_times = times.iter().map(|t| t.to_vec()).collect();
        self.position_values = values.iter().map(|v| v.to_vec()).collect();
    }

    pub fn rotations_data(&mut self, times: &[&[f32]], values: &[&[Quat]]) {
        assert_eq!(times.len(), values.len());
        self.rotation_times = times.iter().map(|t| t.to_vec()).collect();
        self.rotation_values = values.iter().map(|v| v.to_vec()).collect();
    }

    pub fn scales_data(&mut self, times: &[&[f32]], values: &[&[Vec3]]) {
        assert_eq!(times.len(), values.len());
        self.scale_times = times.iter().map(|t| t.to_vec()).collect();
        self.scale_values = values.iter().map(|v| v.to_vec()).collect();
    }

    pub fn bones_count(&self) -> usize {
        self.channels_mapping.len()
    }

    pub fn channels_count(&self) -> usize {
        self.position_times.len()
    }

    pub fn set_duration(&mut self, duration: u64) {
        self.duration = duration;
    }

    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn set_skeleton_name(&mut self, name: u32) {
        self.skeleton_name = name;
    }

    pub fn skeleton_name(&self) -> u32 {
        self.skeleton_name
    }

    /// Local matrix of one bone at `coef`, or `fallback` when the bone is
    /// unanimated.
    pub(crate) fn evaluate_bone(&self, bone: usize, coef: f32, fallback: &Mat4) -> Mat4 {
        debug_assert!((0.0..=1.0).contains(&coef));
        let ch = self.channels_mapping[bone];
        if ch == BONE_NONE {
            return *fallback;
        }
        let ch = ch as usize;
        let s = sample_curve(coef, &self.scale_times[ch], &self.scale_values[ch], Vec3::ONE, Vec3::lerp);
        let r = sample_curve(coef, &self.rotation_times[ch], &self.rotation_values[ch], Quat::IDENTITY, |a, b, t| {
            a.slerp(b, t)
        });
        let t = sample_curve(coef, &self.position_times[ch], &self.position_values[ch], Vec3::ZERO, Vec3::lerp);
        Mat4::from_translation(t) * Mat4::from_quat(r) * Mat4::from_scale(s)
    }
}

/// Keyframe interval containing `coef`, by binary search.
fn find_frame_index(coef: f32, times: &[f32]) -> usize {
    debug_assert!(!times.is_empty());
    if coef <= times[0] {
        return 0;
    }
    if coef >= times[times.len() - 1] {
        return times.len() - 1;
    }
    times.partition_point(|&t| t <= coef) - 1
}

fn sample_curve<T: Copy>(
    coef: f32,
    times: &[f32],
    values: &[T],
    identity: T,
    interpolate: impl Fn(T, T, f32) -> T,
) -> T {
    match times.len() {
        0 => identity,
        1 => values[0],
        _ => {
            let index = find_frame_index(coef, times);
            if index + 1 == times.len() {
                values[index]
            } else {
                let a = times[index];
                let b = times[index + 1];
                let amount = ((coef - a) / (b - a)).clamp(0.0, 1.0);
                interpolate(values[index], values[index + 1], amount)
            }
        }
    }
}

/// Accumulated per-bone matrices, parents composed before children.
fn animate_hierarchy(rig: &SkeletonRig, animation: &SkeletalAnimation, coef: f32, output: &mut [Mat4]) {
    assert_eq!(output.len(), rig.bones_count());
    assert_eq!(animation.bones_count(), rig.bones_count());
    debug_assert!((0.0..=1.0).contains(&coef));
    for i in 0..rig.bones_count() {
        let parent = rig.parents[i];
        let accumulated = if parent == BONE_NONE {
            Mat4::IDENTITY
        } else {
            debug_assert!((parent as usize) < i);
            output[parent as usize]
        };
        output[i] = accumulated * animation.evaluate_bone(i, coef, &rig.base_matrices[i]);
    }
}

/// Skinning matrices: `global_inverse * accumulated * inverse_rest`.
pub fn animate_skin(rig: &SkeletonRig, animation: &SkeletalAnimation, coef: f32, output: &mut [Mat4]) {
    animate_hierarchy(rig, animation, coef, output);
    for i in 0..rig.bones_count() {
        output[i] = rig.global_inverse * output[i] * rig.inv_rest_matrices[i];
    }
}

fn dominant_axis(v: Vec3) -> Vec3 {
    let a = v.abs();
    if a.x >= a.y && a.x >= a.z {
        Vec3::X
    } else if a.y >= a.z {
        Vec3::Y
    } else {
        Vec3::Z
    }
}

/// Bone-visualization matrices: each bone maps a unit segment onto the
/// parent-to-child span; root bones degenerate to zero scale.
pub fn animate_skeleton(
    rig: &SkeletonRig,
    animation: &SkeletalAnimation,
    coef: f32,
    output: &mut [Mat4],
) {
    let mut accumulated = vec![Mat4::IDENTITY; rig.bones_count()];
    animate_hierarchy(rig, animation, coef, &mut accumulated);
    for i in 0..rig.bones_count() {
        let parent = rig.parents[i];
        if parent == BONE_NONE {
            output[i] = Mat4::from_scale(Vec3::ZERO);
            continue;
        }
        let a = (accumulated[parent as usize] * Vec4::new(0.0, 0.0, 0.0, 1.0)).truncate();
        let b = (accumulated[i] * Vec4::new(0.0, 0.0, 0.0, 1.0)).truncate();
        let length = a.distance(b);
        let matrix = if length > 0.0 {
            let forward = (b - a) / length;
            let up = if dominant_axis(b - a).distance_squared(Vec3::Y) < 0.8 {
                Vec3::X
            } else {
                Vec3::Y
            };
            let right = up.cross(forward).normalize();
            let up = forward.cross(right);
            let rotation = Quat::from_mat3(&Mat3::from_cols(right, up, forward));
            Mat4::from_scale_rotation_translation(Vec3::splat(length), rotation, a)
        } else {
            Mat4::from_translation(a) * Mat4::from_scale(Vec3::ZERO)
        };
        output[i] = rig.global_inverse * matrix;
    }
}

/// Mesh collaborator receiving the skin matrices.
pub trait MeshAnimation {
    fn apply_skin(&mut self, matrices: &[Mat4]);
}

pub fn animate_mesh(
    rig: &SkeletonRig,
    animation: &SkeletalAnimation,
    coef: f32,
    mesh: &mut dyn MeshAnimation,
) {
    let mut matrices = vec![Mat4::IDENTITY; rig.bones_count()];
    animate_skin(rig, animation, coef, &mut matrices);
    mesh.apply_skin(&matrices);
}

/// Looping playback coefficient for an animation at `current_time`, with
/// playback `speed` and phase `offset`. Saturates into `[0, 1)`.
pub fn evaluate_coefficient(
    animation: Option<&SkeletalAnimation>,
    current_time: u64,
    start_time: u64,
    speed: f32,
    offset: f32,
) -> f32 {
    let Some(animation) = animation else {
        return 0.0;
    };
    let duration = animation.duration().max(1);
    let sample = (current_time as i64 - start_time as i64) as f64 * speed as f64
        / duration as f64
        + offset as f64;
    // truncation toward zero, so a negative sample saturates to the first
    // frame instead of wrapping into the loop
    let looped = sample - sample.trunc();
    looped.clamp(0.0, 1.0) as f32
}
