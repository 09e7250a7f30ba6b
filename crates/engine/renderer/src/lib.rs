//! Deferred render queue and screen-space effects
//!
//! GPU work is recorded into a [`RenderQueue`] as typed commands by any
//! thread (typically graphics-prepare) and replayed by a
//! [`QueueExecutor`], which wraps the GL context and can only live on the
//! graphics-dispatch thread; the split enforces the thread-owned-context
//! rule structurally. [`ProvisionalGraphics`] caches transient textures,
//! framebuffers and uniform buffers across frames by textual key, running
//! each initializer exactly once.
//!
//! The screen-space effect builders in [`effects`] are pure recording
//! functions; they never touch GL.

pub mod effects;
pub mod provisional;
pub mod queue;

pub use effects::{
    gaussian_blur, screen_space_bloom, screen_space_depth_of_field,
    screen_space_eye_adaptation_apply, screen_space_eye_adaptation_prepare,
    screen_space_fast_approximate_anti_aliasing, screen_space_sharpening,
    screen_space_ambient_occlusion, screen_space_tonemap, EffectShader, EffectShaderSource,
    EffectsContext,
};
pub use provisional::{
    FrameBufferHandle, ProvisionalGraphics, TextureHandle, UniformBufferHandle,
};
pub use queue::{ModelHandle, QueueExecutor, RenderCommand, RenderQueue, ShaderHandle, UniformValue};
