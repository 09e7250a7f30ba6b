//! Typed, replayable GPU command list.
//!
//! Recording appends [`RenderCommand`]s and issues no GL; replay happens
//! through [`QueueExecutor::execute`], on the dispatch thread only. The
//! executor type is `!Send` by construction so the compiler enforces the
//! split.

use std::collections::HashMap;
use std::marker::PhantomData;

use glam::{IVec2, Mat4, Vec2, Vec3, Vec4};
use glow::HasContext;
use tracing::error;

use crate::provisional::{FrameBufferHandle, TextureHandle, UniformBufferHandle};

/// Compiled shader program reference. Creation happens elsewhere (asset
/// pipeline or executor-side setup); recording only stores the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderHandle(pub glow::Program);

/// Drawable vertex-array reference with its vertex count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelHandle {
    pub vao: glow::VertexArray,
    pub vertex_count: i32,
}

#[derive(Debug, Clone)]
pub enum UniformValue {
    Int(i32),
    UInt(u32),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    IVec2(IVec2),
    Mat4(Mat4),
}

macro_rules! into_uniform {
    ($($t:ty => $v:ident),* $(,)?) => {
        $(impl From<$t> for UniformValue {
            fn from(v: $t) -> Self {
                UniformValue::$v(v)
            }
        })*
    };
}
into_uniform!(i32 => Int, u32 => UInt, f32 => Float, Vec2 => Vec2, Vec3 => Vec3, Vec4 => Vec4, IVec2 => IVec2, Mat4 => Mat4);

/// One recorded GPU operation.
#[derive(Debug, Clone)]
pub enum RenderCommand {
    BindFrameBuffer(FrameBufferHandle),
    ColorTexture { fb: FrameBufferHandle, attachment: u32, tex: TextureHandle, mip: u32 },
    DepthTexture { fb: FrameBufferHandle, tex: TextureHandle },
    CheckFrameBuffer(FrameBufferHandle),
    BindTexture { tex: TextureHandle, unit: u32 },
    BindImage { tex: TextureHandle, unit: u32, read: bool, write: bool, format: u32 },
    Filters { tex: TextureHandle, min: u32, mag: u32 },
    GenerateMipmaps(TextureHandle),
    BindShader(ShaderHandle),
    Uniform { name: &'static str, value: UniformValue },
    UniversalUniformStruct { bytes: Vec<u8>, binding: u32 },
    BindUniformBuffer { buffer: UniformBufferHandle, binding: u32 },
    Viewport { offset: IVec2, size: IVec2 },
    Draw(ModelHandle),
    Compute { groups: [u32; 3] },
    MemoryBarrier { mask: u32 },
    PushScope(&'static str),
    PopScope,
}

/// See the module docs.
#[derive(Default)]
pub struct RenderQueue {
    commands: Vec<RenderCommand>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drops all recorded commands, keeping the allocation.
    pub fn reset(&mut self) {
        self.commands.clear();
    }

    pub fn bind_framebuffer(&mut self, fb: &FrameBufferHandle) {
        self.commands.push(RenderCommand::BindFrameBuffer(fb.clone()));
    }

    pub fn color_texture(&mut self, fb: &FrameBufferHandle, attachment: u32, tex: &TextureHandle, mip: u32) {
        self.commands.push(RenderCommand::ColorTexture {
            fb: fb.clone(),
            attachment,
            tex: tex.clone(),
            mip,
        });
    }

    pub fn depth_texture(&mut self, fb: &FrameBufferHandle, tex: &TextureHandle) {
        self.commands.push(RenderCommand::DepthTexture { fb: fb.clone(), tex: tex.clone() });
    }

    pub fn check_framebuffer(&mut self, fb: &FrameBufferHandle) {
        self.commands.push(RenderCommand::CheckFrameBuffer(fb.clone()));
    }

    pub fn bind_texture(&mut self, tex: &TextureHandle, unit: u32) {
        self.commands.push(RenderCommand::BindTexture { tex: tex.clone(), unit });
    }

    pub fn bind_image(&mut self, tex: &TextureHandle, unit: u32, read: bool, write: bool, format: u32) {
        self.commands.push(RenderCommand::BindImage { tex: tex.clone(), unit, read, write, format });
    }

    pub fn filters(&mut self, tex: &TextureHandle, min: u32, mag: u32) {
        self.commands.push(RenderCommand::Filters { tex: tex.clone(), min, mag });
    }

    pub fn generate_mipmaps(&mut self, tex: &TextureHandle) {
        self.commands.push(RenderCommand::GenerateMipmaps(tex.clone()));
    }

    pub fn bind_shader(&mut self, shader: ShaderHandle) {
        self.commands.push(RenderCommand::BindShader(shader));
    }

    /// Records a uniform on the currently bound shader, addressed by
    /// name; the executor resolves and caches locations.
    pub fn uniform(&mut self, name: &'static str, value: impl Into<UniformValue>) {
        self.commands.push(RenderCommand::Uniform { name, value: value.into() });
    }

    /// Uploads a plain-old-data struct into the transient uniform buffer
    /// bound at `binding`.
    pub fn universal_uniform_struct<T: bytemuck::Pod>(&mut self, value: &T, binding: u32) {
        self.commands.push(RenderCommand::UniversalUniformStruct {
            bytes: bytemuck::bytes_of(value).to_vec(),
            binding,
        });
    }

    pub fn bind_uniform_buffer(&mut self, buffer: &UniformBufferHandle, binding: u32) {
        self.commands.push(RenderCommand::BindUniformBuffer { buffer: buffer.clone(), binding });
    }

    pub fn viewport(&mut self, offset: IVec2, size: IVec2) {
        self.commands.push(RenderCommand::Viewport { offset, size });
    }

    pub fn draw(&mut self, model: ModelHandle) {
        self.commands.push(RenderCommand::Draw(model));
    }

    pub fn compute(&mut self, shader: ShaderHandle, groups: [u32; 3]) {
        self.bind_shader(shader);
        self.commands.push(RenderCommand::Compute { groups });
    }

    pub fn memory_barrier(&mut self, mask: u32) {
        self.commands.push(RenderCommand::MemoryBarrier { mask });
    }

    /// Runs `f` inside a named debug group.
    pub fn scoped(&mut self, name: &'static str, f: impl FnOnce(&mut Self)) {
        self.commands.push(RenderCommand::PushScope(name));
        f(self);
        self.commands.push(RenderCommand::PopScope);
    }
}

/// Replays render queues on the GL context. Not `Send`: construct and
/// use it on the graphics-dispatch thread only.
pub struct QueueExecutor {
    gl: glow::Context,
    uniform_locations: HashMap<(glow::Program, &'static str), Option<glow::UniformLocation>>,
    transient_ubos: HashMap<u32, glow::Buffer>,
    current_program: Option<glow::Program>,
    _not_send: PhantomData<*const ()>,
}

impl QueueExecutor {
    pub fn new(gl: glow::Context) -> Self {
        Self {
            gl,
            uniform_locations: HashMap::new(),
            transient_ubos: HashMap::new(),
            current_program: None,
            _not_send: PhantomData,
        }
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    fn uniform_location(&mut self, name: &'static str) -> Option<glow::UniformLocation> {
        let program = self.current_program?;
        let gl = &self.gl;
        self.uniform_locations
            .entry((program, name))
            .or_insert_with(|| unsafe { gl.get_uniform_location(program, name) })
            .clone()
    }

    /// Issues every recorded command in order.
    pub fn execute(&mut self, queue: &RenderQueue) {
        for command in queue.commands() {
            self.run(command);
        }
    }

    fn run(&mut self, command: &RenderCommand) {
        let gl = &self.gl;
        unsafe {
            match command {
                RenderCommand::BindFrameBuffer(fb) => {
                    let fb = fb.resolve(gl);
                    gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fb));
                }
                RenderCommand::ColorTexture { fb, attachment, tex, mip } => {
                    let fb = fb.resolve(gl);
                    let tex = tex.resolve(gl);
                    gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fb));
                    gl.framebuffer_texture_2d(
                        glow::FRAMEBUFFER,
                        glow::COLOR_ATTACHMENT0 + attachment,
                        glow::TEXTURE_2D,
                        Some(tex),
                        *mip as i32,
                    );
                }
                RenderCommand::DepthTexture { fb, tex } => {
                    let fb = fb.resolve(gl);
                    let tex = tex.resolve(gl);
                    gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fb));
                    gl.framebuffer_texture_2d(
                        glow::FRAMEBUFFER,
                        glow::DEPTH_ATTACHMENT,
                        glow::TEXTURE_2D,
                        Some(tex),
                        0,
                    );
                }
                RenderCommand::CheckFrameBuffer(fb) => {
                    let fb = fb.resolve(gl);
                    gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fb));
                    let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
                    if status != glow::FRAMEBUFFER_COMPLETE {
                        error!(target: "renderer", status, "framebuffer incomplete");
                    }
                }
                RenderCommand::BindTexture { tex, unit } => {
                    let tex = tex.resolve(gl);
                    gl.active_texture(glow::TEXTURE0 + unit);
                    gl.bind_texture(glow::TEXTURE_2D, Some(tex));
                }
                RenderCommand::BindImage { tex, unit, read, write, format } => {
                    let tex = tex.resolve(gl);
                    let access = match (*read, *write) {
                        (true, false) => glow::READ_ONLY,
                        (false, true) => glow::WRITE_ONLY,
                        _ => glow::READ_WRITE,
                    };
                    gl.bind_image_texture(*unit, Some(tex), 0, false, 0, access, *format);
                }
                RenderCommand::Filters { tex, min, mag } => {
                    let tex = tex.resolve(gl);
                    gl.bind_texture(glow::TEXTURE_2D, Some(tex));
                    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, *min as i32);
                    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, *mag as i32);
                }
                RenderCommand::GenerateMipmaps(tex) => {
                    let tex = tex.resolve(gl);
                    gl.bind_texture(glow::TEXTURE_2D, Some(tex));
                    gl.generate_mipmap(glow::TEXTURE_2D);
                }
                RenderCommand::BindShader(shader) => {
                    gl.use_program(Some(shader.0));
                    self.current_program = Some(shader.0);
                }
                RenderCommand::Uniform { name, value } => {
                    let location = self.uniform_location(name);
                    let gl = &self.gl;
                    let loc = location.as_ref();
                    match value {
                        UniformValue::Int(v) => gl.uniform_1_i32(loc, *v),
                        UniformValue::UInt(v) => gl.uniform_1_u32(loc, *v),
                        UniformValue::Float(v) => gl.uniform_1_f32(loc, *v),
                        UniformValue::Vec2(v) => gl.uniform_2_f32(loc, v.x, v.y),
                        UniformValue::Vec3(v) => gl.uniform_3_f32(loc, v.x, v.y, v.z),
                        UniformValue::Vec4(v) => gl.uniform_4_f32(loc, v.x, v.y, v.z, v.w),
                        UniformValue::IVec2(v) => gl.uniform_2_i32(loc, v.x, v.y),
                        UniformValue::Mat4(m) => {
                            gl.uniform_matrix_4_f32_slice(loc, false, &m.to_cols_array())
                        }
                    }
                }
                RenderCommand::UniversalUniformStruct { bytes, binding } => {
                    let buffer = *self
                        .transient_ubos
                        .entry(*binding)
                        .or_insert_with(|| gl.create_buffer().expect("creating a uniform buffer"));
                    gl.bind_buffer(glow::UNIFORM_BUFFER, Some(buffer));
                    gl.buffer_data_u8_slice(glow::UNIFORM_BUFFER, bytes, glow::DYNAMIC_DRAW);
                    gl.bind_buffer_base(glow::UNIFORM_BUFFER, *binding, Some(buffer));
                }
                RenderCommand::BindUniformBuffer { buffer, binding } => {
                    let buffer = buffer.resolve(gl);
                    gl.bind_buffer_base(glow::UNIFORM_BUFFER, *binding, Some(buffer));
                }
                RenderCommand::Viewport { offset, size } => {
                    gl.viewport(offset.x, offset.y, size.x, size.y);
                }
                RenderCommand::Draw(model) => {
                    gl.bind_vertex_array(Some(model.vao));
                    gl.draw_arrays(glow::TRIANGLES, 0, model.vertex_count);
                }
                RenderCommand::Compute { groups } => {
                    gl.dispatch_compute(groups[0], groups[1], groups[2]);
                }
                RenderCommand::MemoryBarrier { mask } => {
                    gl.memory_barrier(*mask);
                }
                RenderCommand::PushScope(name) => {
                    gl.push_debug_group(glow::DEBUG_SOURCE_APPLICATION, 0, name);
                }
                RenderCommand::PopScope => {
                    gl.pop_debug_group();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisional::ProvisionalGraphics;

    #[test]
    fn recording_appends_in_order() {
        let prov = ProvisionalGraphics::new();
        let fb = prov.frame_buffer_draw("fx");
        let tex = prov.texture("t", |_| unreachable!());
        let mut q = RenderQueue::new();
        q.viewport(IVec2::ZERO, IVec2::new(64, 64));
        q.bind_framebuffer(&fb);
        q.color_texture(&fb, 0, &tex, 0);
        q.check_framebuffer(&fb);
        assert_eq!(q.commands().len(), 4);
        assert!(matches!(q.commands()[0], RenderCommand::Viewport { .. }));
        assert!(matches!(q.commands()[3], RenderCommand::CheckFrameBuffer(_)));
        q.reset();
        assert!(q.is_empty());
    }

    #[test]
    fn scoped_brackets_commands() {
        let mut q = RenderQueue::new();
        q.scoped("blur", |q| {
            q.viewport(IVec2::ZERO, IVec2::ONE);
        });
        assert!(matches!(q.commands()[0], RenderCommand::PushScope("blur")));
        assert!(matches!(q.commands()[2], RenderCommand::PopScope));
    }

    #[test]
    fn uniform_values_convert() {
        let mut q = RenderQueue::new();
        q.uniform("uni_direction", Vec2::new(1.0, 0.0));
        q.uniform("uni_mip", 3i32);
        match &q.commands()[1] {
            RenderCommand::Uniform { name, value: UniformValue::Int(3) } => {
                assert_eq!(*name, "uni_mip")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn pod_structs_serialize_into_uniform_bytes() {
        #[repr(C)]
        #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
        struct Params {
            params: [f32; 4],
        }
        let mut q = RenderQueue::new();
        q.universal_uniform_struct(&Params { params: [1.0, 2.0, 3.0, 4.0] }, 2);
        match &q.commands()[0] {
            RenderCommand::UniversalUniformStruct { bytes, binding: 2 } => {
                assert_eq!(bytes.len(), 16)
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
