//! Screen-space effect builders.
//!
//! Every function here is a pure recording step: it derives provisional
//! resources, binds shaders from the supplied source, and appends
//! commands to the queue. Nothing touches GL until the dispatch thread
//! replays the queue.

use glam::{IVec2, Mat4, Vec2, Vec4};
use glow::HasContext;

use crate::provisional::{ProvisionalGraphics, TextureHandle, UniformBufferHandle};
use crate::queue::{ModelHandle, RenderQueue, ShaderHandle};

/// Uniform-block binding reserved for per-effect parameter structs.
pub const CUSTOM_DATA_BINDING: u32 = 2;

/// Shaders the effect builders depend on; the application resolves them
/// (typically from the asset pipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectShader {
    GaussianBlur,
    SsaoDownscaleDepth,
    SsaoGenerate,
    SsaoResolve,
    DofCollect,
    DofApply,
    LuminanceCollection,
    LuminanceHistogram,
    LuminanceApply,
    BloomGenerate,
    BloomApply,
    Tonemap,
    Fxaa,
    Sharpening,
}

pub trait EffectShaderSource {
    fn shader(&self, which: EffectShader) -> ShaderHandle;
    /// Full-screen quad model drawn by every pass.
    fn quad(&self) -> ModelHandle;
}

/// Recording surfaces shared by all effect builders.
pub struct EffectsContext<'a> {
    pub queue: &'a mut RenderQueue,
    pub provisionals: &'a ProvisionalGraphics,
    pub shaders: &'a dyn EffectShaderSource,
}

/// Transient render-target texture keyed by its parameters.
fn prov_tex(
    prov: &ProvisionalGraphics,
    prefix: &str,
    resolution: IVec2,
    mipmap_levels: u32,
    internal_format: u32,
) -> TextureHandle {
    let name = format!("{prefix}_{}x{}_{mipmap_levels}_{internal_format}", resolution.x, resolution.y);
    prov.texture(&name, move |gl| unsafe {
        let tex = gl.create_texture().expect("creating an effect texture");
        gl.bind_texture(glow::TEXTURE_2D, Some(tex));
        gl.tex_storage_2d(
            glow::TEXTURE_2D,
            mipmap_levels as i32,
            internal_format,
            resolution.x,
            resolution.y,
        );
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        let min = if mipmap_levels > 1 { glow::LINEAR_MIPMAP_LINEAR } else { glow::LINEAR };
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, min as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        tex
    })
}

fn downscaled(resolution: IVec2, factor: i32) -> IVec2 {
    (resolution / factor).max(IVec2::ONE)
}

pub struct GaussianBlurConfig {
    pub texture: TextureHandle,
    pub resolution: IVec2,
    pub internal_format: u32,
    pub mipmap_level: u32,
    pub mipmaps_count: u32,
}

/// Separable two-pass blur of `texture` in place, through a transient
/// ping texture of the same format.
pub fn gaussian_blur(ctx: &mut EffectsContext, config: &GaussianBlurConfig) {
    let shader = ctx.shaders.shader(EffectShader::GaussianBlur);
    let quad = ctx.shaders.quad();
    let fb = ctx.provisionals.frame_buffer_draw("graphicsEffects");
    let ping = prov_tex(
        ctx.provisionals,
        "blur",
        config.resolution,
        config.mipmaps_count,
        config.internal_format,
    );
    let res = downscaled(config.resolution, 1 << config.mipmap_level);
    let q = &mut *ctx.queue;
    q.scoped("blur", |q| {
        q.viewport(IVec2::ZERO, res);
        q.bind_framebuffer(&fb);
        q.bind_shader(shader);
        q.uniform("uniMipLevel", config.mipmap_level as i32);
        let mut blur = |tex_in: &TextureHandle, tex_out: &TextureHandle, direction: Vec2| {
            q.color_texture(&fb, 0, tex_out, config.mipmap_level);
            q.check_framebuffer(&fb);
            q.bind_texture(tex_in, 0);
            q.uniform("uniDirection", direction);
            q.draw(quad);
        };
        blur(&config.texture, &ping, Vec2::new(1.0, 0.0));
        blur(&ping, &config.texture, Vec2::new(0.0, 1.0));
    });
}

pub struct SsaoConfig {
    pub resolution: IVec2,
    pub in_depth: TextureHandle,
    pub proj: Mat4,
    pub strength: f32,
    pub bias: f32,
    pub power: f32,
    pub rays_length: f32,
    pub samples_count: u32,
    pub blur_passes: u32,
    pub frame_index: u32,
}

/// Ambient occlusion at third resolution; returns the occlusion texture.
pub fn screen_space_ambient_occlusion(ctx: &mut EffectsContext, config: &SsaoConfig) -> TextureHandle {
    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Params {
        proj: Mat4,
        proj_inv: Mat4,
        params: Vec4,
        iparams: [i32; 4],
    }

    let res = downscaled(config.resolution, 3);
    let quad = ctx.shaders.quad();
    let fb = ctx.provisionals.frame_buffer_draw("graphicsEffects");
    let depth_low = prov_tex(ctx.provisionals, "ssaoDepthLowRes", res, 1, glow::R32F);
    let out_ao = prov_tex(ctx.provisionals, "ssao", res, 1, glow::R8);
    let points = ssao_points_buffer(ctx.provisionals, config.samples_count);

    let shader_downscale = ctx.shaders.shader(EffectShader::SsaoDownscaleDepth);
    let shader_generate = ctx.shaders.shader(EffectShader::SsaoGenerate);
    let shader_resolve = ctx.shaders.shader(EffectShader::SsaoResolve);

    {
        let q = &mut *ctx.queue;
        q.scoped("ssao", |q| {
            let params = Params {
                proj: config.proj,
                proj_inv: config.proj.inverse(),
                params: Vec4::new(config.strength, config.bias, config.power, config.rays_length),
                iparams: [config.samples_count as i32, hash_u32(config.frame_index) as i32, 0, 0],
            };
            q.universal_uniform_struct(&params, CUSTOM_DATA_BINDING);

            q.viewport(IVec2::ZERO, res);
            q.bind_framebuffer(&fb);

            q.scoped("lowResDepth", |q| {
                q.color_texture(&fb, 0, &depth_low, 0);
                q.check_framebuffer(&fb);
                q.bind_shader(shader_downscale);
                q.bind_texture(&config.in_depth, 0);
                q.draw(quad);
            });

            q.bind_uniform_buffer(&points, 3);

            q.scoped("generate", |q| {
                q.color_texture(&fb, 0, &out_ao, 0);
                q.check_framebuffer(&fb);
                q.bind_texture(&depth_low, 0);
                q.bind_shader(shader_generate);
                q.draw(quad);
            });
        });
    }

    let blur = GaussianBlurConfig {
        texture: out_ao.clone(),
        resolution: res,
        internal_format: glow::R8,
        mipmap_level: 0,
        mipmaps_count: 1,
    };
    for _ in 0..config.blur_passes {
        gaussian_blur(ctx, &blur);
    }

    ctx.queue.scoped("resolve", |q| {
        q.bind_texture(&out_ao, 0);
        q.bind_shader(shader_resolve);
        q.draw(quad);
    });
    out_ao
}

/// Deterministic hemisphere kernel for the SSAO shader, cached per
/// sample count.
fn ssao_points_buffer(prov: &ProvisionalGraphics, count: u32) -> UniformBufferHandle {
    let name = format!("ssaoPoints_{count}");
    prov.uniform_buffer(&name, move |gl| {
        let mut state = 0x9e3779b9u32 ^ count;
        let mut rand = move || {
            // xorshift; quality is irrelevant, determinism is not
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as f32 / u32::MAX as f32
        };
        let mut points = Vec::with_capacity(count as usize);
        while points.len() < count as usize {
            let p = glam::Vec3::new(rand() * 2.0 - 1.0, rand() * 2.0 - 1.0, rand());
            if p.length_squared() > 1.0 || p.z < 0.1 {
                continue;
            }
            points.push(Vec4::from((p, 0.0)));
        }
        let bytes: &[u8] = bytemuck::cast_slice(&points);
        unsafe {
            let buffer = gl.create_buffer().expect("creating the ssao points buffer");
            gl.bind_buffer(glow::UNIFORM_BUFFER, Some(buffer));
            gl.buffer_data_u8_slice(glow::UNIFORM_BUFFER, bytes, glow::STATIC_DRAW);
            buffer
        }
    })
}

fn hash_u32(mut x: u32) -> u32 {
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846ca68b);
    x ^ (x >> 16)
}

pub struct DepthOfFieldConfig {
    pub resolution: IVec2,
    pub in_color: TextureHandle,
    pub in_depth: TextureHandle,
    pub out_color: TextureHandle,
    pub proj: Mat4,
    pub focus_distance: f32,
    pub focus_radius: f32,
    pub blend_radius: f32,
    pub blur_passes: u32,
}

pub fn screen_space_depth_of_field(ctx: &mut EffectsContext, config: &DepthOfFieldConfig) {
    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Params {
        proj_inv: Mat4,
        dof_near: Vec4,
        dof_far: Vec4,
    }

    const DOWNSCALE: i32 = 3;
    let res = downscaled(config.resolution, DOWNSCALE);
    let quad = ctx.shaders.quad();
    let fb = ctx.provisionals.frame_buffer_draw("graphicsEffects");
    let tex_dof = prov_tex(ctx.provisionals, "dofColor", res, 1, glow::RGB16F);
    let shader_collect = ctx.shaders.shader(EffectShader::DofCollect);
    let shader_apply = ctx.shaders.shader(EffectShader::DofApply);

    {
        let q = &mut *ctx.queue;
        q.scoped("depth of field", |q| {
            let fd = config.focus_distance;
            let fr = config.focus_radius;
            let br = config.blend_radius;
            let params = Params {
                proj_inv: config.proj.inverse(),
                dof_near: Vec4::new(fd - fr - br, fd - fr, 0.0, 0.0),
                dof_far: Vec4::new(fd + fr, fd + fr + br, 0.0, 0.0),
            };
            q.universal_uniform_struct(&params, CUSTOM_DATA_BINDING);

            q.bind_framebuffer(&fb);
            q.viewport(IVec2::ZERO, res);

            // collect
            q.bind_texture(&config.in_color, 0);
            q.bind_texture(&config.in_depth, 1);
            q.bind_shader(shader_collect);
            q.color_texture(&fb, 0, &tex_dof, 0);
            q.check_framebuffer(&fb);
            q.draw(quad);
        });
    }

    let blur = GaussianBlurConfig {
        texture: tex_dof.clone(),
        resolution: res,
        internal_format: glow::RGB16F,
        mipmap_level: 0,
        mipmaps_count: 1,
    };
    for _ in 0..config.blur_passes {
        gaussian_blur(ctx, &blur);
    }

    ctx.queue.scoped("dof apply", |q| {
        q.viewport(IVec2::ZERO, config.resolution);
        q.color_texture(&fb, 0, &config.out_color, 0);
        q.check_framebuffer(&fb);
        q.bind_texture(&config.in_color, 0);
        q.bind_texture(&config.in_depth, 1);
        q.bind_texture(&tex_dof, 2);
        q.bind_shader(shader_apply);
        q.draw(quad);
    });
}

pub struct EyeAdaptationConfig {
    pub resolution: IVec2,
    pub in_color: TextureHandle,
    pub out_color: Option<TextureHandle>,
    /// distinguishes per-camera accumulation textures
    pub camera_id: u32,
    pub low_log_lum: f32,
    pub high_log_lum: f32,
    pub darker_speed: f32,
    pub lighter_speed: f32,
    pub night_offset: f32,
    pub night_desaturate: f32,
    pub night_contrast: f32,
    pub key: f32,
    pub strength: f32,
    pub elapsed_time: f32,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct EyeAdaptationParams {
    log_range: Vec4,
    adaptation_speed: Vec4,
    night_params: Vec4,
    apply_params: Vec4,
}

fn eye_adaptation_params(config: &EyeAdaptationConfig) -> EyeAdaptationParams {
    EyeAdaptationParams {
        log_range: Vec4::new(config.low_log_lum, config.high_log_lum, 0.0, 0.0),
        adaptation_speed: Vec4::new(config.darker_speed, config.lighter_speed, 0.0, 0.0)
            * config.elapsed_time,
        night_params: Vec4::new(config.night_offset, config.night_desaturate, config.night_contrast, 0.0),
        apply_params: Vec4::new(config.key, config.strength, 0.0, 0.0),
    }
}

fn groups_for(x: i32) -> u32 {
    let x = x as u32;
    x / 16 + if x % 16 > 0 { 1 } else { 0 }
}

/// Luminance histogram and accumulation compute passes.
pub fn screen_space_eye_adaptation_prepare(ctx: &mut EffectsContext, config: &EyeAdaptationConfig) {
    const DOWNSCALE: i32 = 4;
    let res = downscaled(config.resolution, DOWNSCALE);
    let tex_hist = prov_tex(ctx.provisionals, "luminanceHistogram", IVec2::new(256, 1), 1, glow::R32UI);
    let tex_accum = prov_tex(
        ctx.provisionals,
        &format!("luminanceAccumulation_{}", config.camera_id),
        IVec2::ONE,
        1,
        glow::R32F,
    );
    let shader_collection = ctx.shaders.shader(EffectShader::LuminanceCollection);
    let shader_histogram = ctx.shaders.shader(EffectShader::LuminanceHistogram);
    let params = eye_adaptation_params(config);

    ctx.queue.scoped("eye adaptation prepare", |q| {
        q.universal_uniform_struct(&params, CUSTOM_DATA_BINDING);
        q.bind_image(&config.in_color, 0, true, false, glow::RGBA16F);
        q.bind_image(&tex_hist, 1, true, true, glow::R32UI);
        q.bind_image(&tex_accum, 2, true, true, glow::R32F);

        q.compute(shader_collection, [groups_for(res.x), groups_for(res.y), 1]);
        q.memory_barrier(glow::SHADER_IMAGE_ACCESS_BARRIER_BIT);

        q.compute(shader_histogram, [1, 1, 1]);
        q.memory_barrier(glow::SHADER_IMAGE_ACCESS_BARRIER_BIT | glow::TEXTURE_FETCH_BARRIER_BIT);
    });
}

pub fn screen_space_eye_adaptation_apply(ctx: &mut EffectsContext, config: &EyeAdaptationConfig) {
    let quad = ctx.shaders.quad();
    let fb = ctx.provisionals.frame_buffer_draw("graphicsEffects");
    let tex_accum = prov_tex(
        ctx.provisionals,
        &format!("luminanceAccumulation_{}", config.camera_id),
        IVec2::ONE,
        1,
        glow::R32F,
    );
    let shader = ctx.shaders.shader(EffectShader::LuminanceApply);
    let out = config.out_color.clone().expect("eye adaptation apply needs an output");
    let params = eye_adaptation_params(config);

    ctx.queue.scoped("eye adaptation apply", |q| {
        q.viewport(IVec2::ZERO, config.resolution);
        q.bind_framebuffer(&fb);
        q.universal_uniform_struct(&params, CUSTOM_DATA_BINDING);
        q.color_texture(&fb, 0, &out, 0);
        q.check_framebuffer(&fb);
        q.bind_texture(&config.in_color, 0);
        q.bind_texture(&tex_accum, 1);
        q.bind_shader(shader);
        q.draw(quad);
    });
}

pub struct BloomConfig {
    pub resolution: IVec2,
    pub in_color: TextureHandle,
    pub out_color: TextureHandle,
    pub threshold: f32,
    pub blur_passes: u32,
}

pub fn screen_space_bloom(ctx: &mut EffectsContext, config: &BloomConfig) {
    const DOWNSCALE: i32 = 3;
    let res = downscaled(config.resolution, DOWNSCALE);
    let quad = ctx.shaders.quad();
    let fb = ctx.provisionals.frame_buffer_draw("graphicsEffects");
    let mips = config.blur_passes.max(1);
    let tex = prov_tex(ctx.provisionals, "bloom", res, mips, glow::RGB16F);
    let shader_generate = ctx.shaders.shader(EffectShader::BloomGenerate);
    let shader_apply = ctx.shaders.shader(EffectShader::BloomApply);

    {
        let q = &mut *ctx.queue;
        q.scoped("bloom", |q| {
            q.viewport(IVec2::ZERO, res);
            q.bind_framebuffer(&fb);

            // luminance-thresholded generation
            q.color_texture(&fb, 0, &tex, 0);
            q.check_framebuffer(&fb);
            q.bind_texture(&config.in_color, 0);
            q.bind_shader(shader_generate);
            q.uniform("uniThreshold", Vec4::new(config.threshold, 0.0, 0.0, 0.0));
            q.draw(quad);

            // mip chain for the widening blur
            q.filters(&tex, glow::LINEAR_MIPMAP_LINEAR, glow::LINEAR);
            q.generate_mipmaps(&tex);
        });
    }

    for level in 0..config.blur_passes {
        let blur = GaussianBlurConfig {
            texture: tex.clone(),
            resolution: res,
            internal_format: glow::RGB16F,
            mipmap_level: level,
            mipmaps_count: mips,
        };
        gaussian_blur(ctx, &blur);
    }

    ctx.queue.scoped("bloom apply", |q| {
        q.viewport(IVec2::ZERO, config.resolution);
        q.bind_framebuffer(&fb);
        q.color_texture(&fb, 0, &config.out_color, 0);
        q.check_framebuffer(&fb);
        q.bind_texture(&config.in_color, 0);
        q.bind_texture(&tex, 1);
        q.bind_shader(shader_apply);
        q.uniform("uniLodLevels", mips as i32);
        q.draw(quad);
    });
}

pub struct TonemapConfig {
    pub resolution: IVec2,
    pub in_color: TextureHandle,
    pub out_color: TextureHandle,
    pub gamma: f32,
    pub tonemap_enabled: bool,
}

pub fn screen_space_tonemap(ctx: &mut EffectsContext, config: &TonemapConfig) {
    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Params {
        params: Vec4,
    }

    let quad = ctx.shaders.quad();
    let fb = ctx.provisionals.frame_buffer_draw("graphicsEffects");
    let shader = ctx.shaders.shader(EffectShader::Tonemap);

    ctx.queue.scoped("tonemap", |q| {
        q.viewport(IVec2::ZERO, config.resolution);
        q.bind_framebuffer(&fb);
        let params = Params {
            params: Vec4::new(
                1.0 / config.gamma,
                config.tonemap_enabled as u32 as f32,
                0.0,
                0.0,
            ),
        };
        q.universal_uniform_struct(&params, CUSTOM_DATA_BINDING);
        q.color_texture(&fb, 0, &config.out_color, 0);
        q.check_framebuffer(&fb);
        q.bind_texture(&config.in_color, 0);
        q.bind_shader(shader);
        q.draw(quad);
    });
}

pub struct FxaaConfig {
    pub resolution: IVec2,
    pub in_color: TextureHandle,
    pub out_color: TextureHandle,
}

pub fn screen_space_fast_approximate_anti_aliasing(ctx: &mut EffectsContext, config: &FxaaConfig) {
    let quad = ctx.shaders.quad();
    let fb = ctx.provisionals.frame_buffer_draw("graphicsEffects");
    let shader = ctx.shaders.shader(EffectShader::Fxaa);

    ctx.queue.scoped("fxaa", |q| {
        q.viewport(IVec2::ZERO, config.resolution);
        q.bind_framebuffer(&fb);
        q.color_texture(&fb, 0, &config.out_color, 0);
        q.check_framebuffer(&fb);
        q.bind_texture(&config.in_color, 0);
        q.bind_shader(shader);
        q.draw(quad);
    });
}

pub struct SharpeningConfig {
    pub resolution: IVec2,
    pub in_color: TextureHandle,
    pub out_color: TextureHandle,
    pub strength: f32,
}

pub fn screen_space_sharpening(ctx: &mut EffectsContext, config: &SharpeningConfig) {
    #[repr(C)]
    #[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
    struct Params {
        params: Vec4,
    }

    let quad = ctx.shaders.quad();
    let fb = ctx.provisionals.frame_buffer_draw("graphicsEffects");
    let shader = ctx.shaders.shader(EffectShader::Sharpening);

    ctx.queue.scoped("sharpening", |q| {
        q.viewport(IVec2::ZERO, config.resolution);
        q.bind_framebuffer(&fb);
        q.universal_uniform_struct(
            &Params { params: Vec4::new(config.strength, 0.0, 0.0, 0.0) },
            CUSTOM_DATA_BINDING,
        );
        q.color_texture(&fb, 0, &config.out_color, 0);
        q.check_framebuffer(&fb);
        q.bind_texture(&config.in_color, 0);
        q.bind_shader(shader);
        q.draw(quad);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::RenderCommand;
    use std::num::NonZeroU32;

    struct FakeShaders;

    impl EffectShaderSource for FakeShaders {
        fn shader(&self, which: EffectShader) -> ShaderHandle {
            ShaderHandle(glow::NativeProgram(NonZeroU32::new(which as u32 + 1).unwrap()))
        }
        fn quad(&self) -> ModelHandle {
            ModelHandle {
                vao: glow::NativeVertexArray(NonZeroU32::new(1).unwrap()),
                vertex_count: 6,
            }
        }
    }

    fn context<'a>(
        queue: &'a mut RenderQueue,
        prov: &'a ProvisionalGraphics,
        shaders: &'a FakeShaders,
    ) -> EffectsContext<'a> {
        EffectsContext { queue, provisionals: prov, shaders }
    }

    fn count_draws(q: &RenderQueue) -> usize {
        q.commands().iter().filter(|c| matches!(c, RenderCommand::Draw(_))).count()
    }

    #[test]
    fn blur_records_two_passes() {
        let prov = ProvisionalGraphics::new();
        let shaders = FakeShaders;
        let mut queue = RenderQueue::new();
        let tex = prov_tex(&prov, "scene", IVec2::new(256, 256), 1, glow::RGB16F);
        let mut ctx = context(&mut queue, &prov, &shaders);
        gaussian_blur(
            &mut ctx,
            &GaussianBlurConfig {
                texture: tex,
                resolution: IVec2::new(256, 256),
                internal_format: glow::RGB16F,
                mipmap_level: 0,
                mipmaps_count: 1,
            },
        );
        assert_eq!(count_draws(&queue), 2);
        assert!(matches!(queue.commands()[0], RenderCommand::PushScope("blur")));
        assert!(matches!(queue.commands().last(), Some(RenderCommand::PopScope)));
    }

    #[test]
    fn ssao_records_generate_blur_resolve() {
        let prov = ProvisionalGraphics::new();
        let shaders = FakeShaders;
        let mut queue = RenderQueue::new();
        let depth = prov_tex(&prov, "depth", IVec2::new(300, 300), 1, glow::R32F);
        let mut ctx = context(&mut queue, &prov, &shaders);
        let out = screen_space_ambient_occlusion(
            &mut ctx,
            &SsaoConfig {
                resolution: IVec2::new(300, 300),
                in_depth: depth,
                proj: Mat4::perspective_rh_gl(1.0, 1.0, 0.1, 100.0),
                strength: 1.0,
                bias: 0.02,
                power: 1.3,
                rays_length: 1.0,
                samples_count: 16,
                blur_passes: 2,
                frame_index: 7,
            },
        );
        // downscale + generate + 2 blur passes (2 draws each) + resolve
        assert_eq!(count_draws(&queue), 2 + 4 + 1);
        // a second recording at the same resolution reuses the cached
        // occlusion texture
        let other = screen_space_ambient_occlusion(
            &mut context(&mut queue, &prov, &shaders),
            &SsaoConfig {
                resolution: IVec2::new(300, 300),
                in_depth: prov_tex(&prov, "depth", IVec2::new(300, 300), 1, glow::R32F),
                proj: Mat4::IDENTITY,
                strength: 1.0,
                bias: 0.0,
                power: 1.0,
                rays_length: 1.0,
                samples_count: 16,
                blur_passes: 0,
                frame_index: 8,
            },
        );
        assert!(out.same_entry(&other));
    }

    #[test]
    fn bloom_blurs_each_mip_level() {
        let prov = ProvisionalGraphics::new();
        let shaders = FakeShaders;
        let mut queue = RenderQueue::new();
        let color = prov_tex(&prov, "hdr", IVec2::new(900, 600), 1, glow::RGBA16F);
        let out = prov_tex(&prov, "ldr", IVec2::new(900, 600), 1, glow::RGBA16F);
        let mut ctx = context(&mut queue, &prov, &shaders);
        screen_space_bloom(
            &mut ctx,
            &BloomConfig {
                resolution: IVec2::new(900, 600),
                in_color: color,
                out_color: out,
                threshold: 1.0,
                blur_passes: 3,
            },
        );
        // generate + 3 blur passes of 2 draws + apply
        assert_eq!(count_draws(&queue), 1 + 6 + 1);
        assert!(queue
            .commands()
            .iter()
            .any(|c| matches!(c, RenderCommand::GenerateMipmaps(_))));
    }

    #[test]
    fn eye_adaptation_prepare_is_compute_only() {
        let prov = ProvisionalGraphics::new();
        let shaders = FakeShaders;
        let mut queue = RenderQueue::new();
        let color = prov_tex(&prov, "hdr", IVec2::new(640, 480), 1, glow::RGBA16F);
        let mut ctx = context(&mut queue, &prov, &shaders);
        screen_space_eye_adaptation_prepare(
            &mut ctx,
            &EyeAdaptationConfig {
                resolution: IVec2::new(640, 480),
                in_color: color,
                out_color: None,
                camera_id: 1,
                low_log_lum: -5.0,
                high_log_lum: 5.0,
                darker_speed: 1.0,
                lighter_speed: 3.0,
                night_offset: 0.0,
                night_desaturate: 0.0,
                night_contrast: 0.0,
                key: 0.18,
                strength: 1.0,
                elapsed_time: 0.016,
            },
        );
        assert_eq!(count_draws(&queue), 0);
        let computes = queue
            .commands()
            .iter()
            .filter(|c| matches!(c, RenderCommand::Compute { .. }))
            .count();
        assert_eq!(computes, 2);
        // 640/4 = 160 -> 10 groups of 16
        assert!(queue
            .commands()
            .iter()
            .any(|c| matches!(c, RenderCommand::Compute { groups: [10, 8, 1] })));
    }

    #[test]
    fn tonemap_chain_reuses_the_effects_framebuffer() {
        let prov = ProvisionalGraphics::new();
        let shaders = FakeShaders;
        let mut queue = RenderQueue::new();
        let a = prov_tex(&prov, "a", IVec2::new(64, 64), 1, glow::RGBA16F);
        let b = prov_tex(&prov, "b", IVec2::new(64, 64), 1, glow::RGBA16F);
        let mut ctx = context(&mut queue, &prov, &shaders);
        screen_space_tonemap(
            &mut ctx,
            &TonemapConfig {
                resolution: IVec2::new(64, 64),
                in_color: a.clone(),
                out_color: b.clone(),
                gamma: 2.2,
                tonemap_enabled: true,
            },
        );
        screen_space_fast_approximate_anti_aliasing(
            &mut ctx,
            &FxaaConfig { resolution: IVec2::new(64, 64), in_color: b, out_color: a },
        );
        let fb1 = prov.frame_buffer_draw("graphicsEffects");
        let binds = queue
            .commands()
            .iter()
            .filter_map(|c| match c {
                RenderCommand::BindFrameBuffer(fb) => Some(fb.same_entry(&fb1)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert!(!binds.is_empty());
        assert!(binds.into_iter().all(|same| same));
    }
}
