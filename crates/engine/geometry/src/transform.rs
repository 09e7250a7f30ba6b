//! Rigid transform with uniform scale.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position, orientation and uniform scale.
///
/// Composition follows the usual convention: `a * b` applies `b` first,
/// then `a`. Points transform as `position + orientation * (p * scale)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
        scale: 1.0,
    };

    pub fn new(position: Vec3, orientation: Quat, scale: f32) -> Self {
        Self { position, orientation, scale }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Self::IDENTITY }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Applies the transform to a point.
    pub fn apply_point(&self, p: Vec3) -> Vec3 {
        self.position + self.orientation * (p * self.scale)
    }

    /// Applies the transform to a direction (rotation only).
    pub fn apply_direction(&self, d: Vec3) -> Vec3 {
        self.orientation * d
    }

    /// The inverse transform, such that `t.inverse().apply_point(t.apply_point(p)) == p`.
    pub fn inverse(&self) -> Self {
        let orientation = self.orientation.conjugate();
        let scale = 1.0 / self.scale;
        Self {
            position: orientation * (-self.position * scale),
            orientation,
            scale,
        }
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), self.orientation, self.position)
    }

    /// Interpolates between two transforms; positions and scales lerp,
    /// orientations slerp.
    pub fn interpolate(a: &Transform, b: &Transform, t: f32) -> Transform {
        Transform {
            position: a.position.lerp(b.position, t),
            orientation: a.orientation.slerp(b.orientation, t),
            scale: a.scale + (b.scale - a.scale) * t,
        }
    }
}

impl std::ops::Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        Transform {
            position: self.apply_point(rhs.position),
            orientation: self.orientation * rhs.orientation,
            scale: self.scale * rhs.scale,
        }
    }
}
