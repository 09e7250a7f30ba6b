//! Geometric primitives and intersection tests
//!
//! This crate provides the shape vocabulary shared by the collision core:
//! lines, triangles, planes, spheres, axis-aligned boxes, cones and view
//! frusta, a rigid [`Transform`], and the pairwise distance / intersection
//! algorithms over them. All types build on glam vectors.
//!
//! Conventions:
//!
//! - [`Line`] covers points, segments, rays and full lines through its
//!   `t_min`/`t_max` clamp range; the direction is kept normalized.
//! - Intersection predicates come in `intersects(a, b) -> bool` and, where
//!   a witness point is useful, `intersection(a, b) -> Option<...>` forms.
//! - Tests involving cones beyond sphere/point/segment use a separating
//!   axis set that never reports a false miss; a rare near-tangent overlap
//!   may be reported conservatively.

pub mod intersect;
pub mod shapes;
pub mod transform;
mod tri_aabb;
mod tri_tri;

pub use intersect::*;
pub use shapes::{Aabb, Cone, Frustum, Line, Plane, Shape, Sphere, Triangle};
pub use transform::Transform;

pub use glam::{Mat4, Quat, Vec3};
