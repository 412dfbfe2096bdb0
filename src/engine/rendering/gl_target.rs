//! ### English
//! Headless surfman/glow render target.
//!
//! Owns a surfman context without a surface and two framebuffers:
//! - `draw`: the engine renders into it after `prepare_rendering()`.
//! - `post`: receives the orientation pass when one is needed.
//!
//! All GL objects are created, used and destroyed on the worker thread.
//!
//! ### 中文
//! 无窗口的 surfman/glow 渲染目标。
//!
//! 持有一个不带 surface 的 surfman 上下文以及两个 framebuffer：
//! - `draw`：`prepare_rendering()` 后引擎在其中绘制；
//! - `post`：需要方向变换时接收该 pass 的输出。
//!
//! 所有 GL 对象都只在工作线程上创建、使用与销毁。

use dpi::PhysicalSize;
use glow::{HasContext as _, PixelPackData, PixelUnpackData};
use surfman::{Connection, ContextAttributeFlags, ContextAttributes, GLApi, GLVersion};
use tracing::{debug, warn};

use super::target::{CameraOrientation, RenderTarget, quad_tex_coords};
use crate::engine::error::RenderTargetError;

const VERTEX_SHADER: &str = r#"
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_tex_coord;
out vec2 v_tex_coord;

void main() {
    v_tex_coord = a_tex_coord;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
"#;

const FRAGMENT_SHADER: &str = r#"
uniform sampler2D u_texture;
in vec2 v_tex_coord;
out vec4 frag_color;

void main() {
    frag_color = texture(u_texture, v_tex_coord);
}
"#;

/// ### English
/// Quad positions in triangle-strip order, matching `quad_tex_coords`.
///
/// ### 中文
/// triangle strip 顺序的四边形顶点位置，与 `quad_tex_coords` 对应。
const QUAD_POSITIONS: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]];

/// ### English
/// One framebuffer plus its lazily allocated RGBA8 color texture.
///
/// ### 中文
/// 一个 framebuffer 及其按需分配的 RGBA8 颜色纹理。
struct FramebufferSlot {
    framebuffer: glow::Framebuffer,
    texture: Option<glow::Texture>,
}

impl FramebufferSlot {
    fn new(gl: &glow::Context) -> Result<Self, RenderTargetError> {
        let framebuffer =
            unsafe { gl.create_framebuffer() }.map_err(RenderTargetError::Allocation)?;
        Ok(Self {
            framebuffer,
            texture: None,
        })
    }

    /// ### English
    /// Allocates the color texture on first use, binds the framebuffer and checks completeness.
    /// Leaves the framebuffer bound.
    ///
    /// ### 中文
    /// 首次使用时分配颜色纹理，绑定 framebuffer 并检查完整性。返回时保持该 framebuffer 绑定。
    fn bind(
        &mut self,
        gl: &glow::Context,
        size: PhysicalSize<u32>,
    ) -> Result<(), RenderTargetError> {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.framebuffer));

            if self.texture.is_none() {
                let texture = gl.create_texture().map_err(RenderTargetError::Allocation)?;
                gl.bind_texture(glow::TEXTURE_2D, Some(texture));
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    glow::RGBA8 as i32,
                    size.width as i32,
                    size.height as i32,
                    0,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    PixelUnpackData::Slice(None),
                );
                for (pname, value) in [
                    (glow::TEXTURE_MIN_FILTER, glow::LINEAR),
                    (glow::TEXTURE_MAG_FILTER, glow::LINEAR),
                    (glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE),
                    (glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE),
                ] {
                    gl.tex_parameter_i32(glow::TEXTURE_2D, pname, value as i32);
                }
                gl.bind_texture(glow::TEXTURE_2D, None);
                gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    glow::COLOR_ATTACHMENT0,
                    glow::TEXTURE_2D,
                    Some(texture),
                    0,
                );
                self.texture = Some(texture);
            }

            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            if status != glow::FRAMEBUFFER_COMPLETE {
                return Err(RenderTargetError::IncompleteFramebuffer(status));
            }
            gl.viewport(0, 0, size.width as i32, size.height as i32);
        }
        Ok(())
    }

    fn delete(&self, gl: &glow::Context) {
        unsafe {
            if let Some(texture) = self.texture {
                gl.delete_texture(texture);
            }
            gl.delete_framebuffer(self.framebuffer);
        }
    }
}

/// ### English
/// Full-screen quad program used by the orientation pass.
///
/// ### 中文
/// 方向变换 pass 使用的全屏四边形程序。
struct OrientationPass {
    program: glow::Program,
    vao: glow::VertexArray,
    vbo: glow::Buffer,
    texture_location: Option<glow::UniformLocation>,
}

impl OrientationPass {
    fn new(gl: &glow::Context, api: GLApi) -> Result<Self, RenderTargetError> {
        let header = match api {
            GLApi::GL => "#version 330 core\n",
            GLApi::GLES => "#version 300 es\nprecision mediump float;\n",
        };

        unsafe {
            let vertex = compile_shader(gl, glow::VERTEX_SHADER, header, VERTEX_SHADER)?;
            let fragment = match compile_shader(gl, glow::FRAGMENT_SHADER, header, FRAGMENT_SHADER)
            {
                Ok(shader) => shader,
                Err(err) => {
                    gl.delete_shader(vertex);
                    return Err(err);
                }
            };

            let program = gl.create_program().map_err(RenderTargetError::Allocation)?;
            gl.attach_shader(program, vertex);
            gl.attach_shader(program, fragment);
            gl.link_program(program);
            gl.delete_shader(vertex);
            gl.delete_shader(fragment);
            if !gl.get_program_link_status(program) {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(RenderTargetError::Allocation(format!(
                    "Program link error: {log}"
                )));
            }
            let texture_location = gl.get_uniform_location(program, "u_texture");

            let vao = gl.create_vertex_array().map_err(RenderTargetError::Allocation)?;
            let vbo = gl.create_buffer().map_err(RenderTargetError::Allocation)?;
            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));

            let stride = 4 * std::mem::size_of::<f32>() as i32;
            gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(
                1,
                2,
                glow::FLOAT,
                false,
                stride,
                2 * std::mem::size_of::<f32>() as i32,
            );
            gl.enable_vertex_attrib_array(1);

            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);

            Ok(Self {
                program,
                vao,
                vbo,
                texture_location,
            })
        }
    }

    /// ### English
    /// Draws `source` into the currently bound framebuffer with the given orientation.
    ///
    /// ### 中文
    /// 以给定方向把 `source` 绘制到当前绑定的 framebuffer。
    fn draw(
        &self,
        gl: &glow::Context,
        source: glow::Texture,
        orientation: CameraOrientation,
        flip_y: bool,
    ) {
        let tex_coords = quad_tex_coords(orientation, flip_y);
        let mut vertices = [0.0f32; 16];
        for (i, (position, tex_coord)) in QUAD_POSITIONS.iter().zip(tex_coords).enumerate() {
            vertices[i * 4..i * 4 + 2].copy_from_slice(position);
            vertices[i * 4 + 2..i * 4 + 4].copy_from_slice(&tex_coord);
        }

        unsafe {
            gl.use_program(Some(self.program));
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(source));
            gl.uniform_1_i32(self.texture_location.as_ref(), 0);

            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&vertices),
                glow::DYNAMIC_DRAW,
            );
            gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);

            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.use_program(None);
        }
    }

    fn delete(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_buffer(self.vbo);
            gl.delete_vertex_array(self.vao);
            gl.delete_program(self.program);
        }
    }
}

unsafe fn compile_shader(
    gl: &glow::Context,
    shader_type: u32,
    header: &str,
    body: &str,
) -> Result<glow::Shader, RenderTargetError> {
    unsafe {
        let shader = gl.create_shader(shader_type).map_err(RenderTargetError::Allocation)?;
        gl.shader_source(shader, &format!("{header}{body}"));
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(RenderTargetError::Allocation(format!(
                "Shader compile error: {log}"
            )));
        }
        Ok(shader)
    }
}

/// ### English
/// Which framebuffer holds the most recent output.
///
/// ### 中文
/// 哪个 framebuffer 持有最新输出。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Draw,
    Post,
}

impl Output {
    /// ### English
    /// Framebuffer that holds the output after orienting. `Draw` means the pass is skipped.
    ///
    /// ### 中文
    /// 方向处理后持有输出的 framebuffer。`Draw` 表示跳过后处理。
    fn after_orienting(orientation: CameraOrientation, is_y_flip: bool) -> Self {
        if orientation.requires_pass(is_y_flip) {
            Output::Post
        } else {
            Output::Draw
        }
    }
}

struct GlResources {
    device: surfman::Device,
    context: surfman::Context,
    gl: glow::Context,
    draw: FramebufferSlot,
    post: FramebufferSlot,
    pass: OrientationPass,
    output: Output,
}

enum RenderState {
    Uninitialized,
    Initialized(Box<GlResources>),
}

/// ### English
/// [`RenderTarget`] backed by a headless surfman context (GL 3.3 core or GLES 3.0) and glow.
///
/// ### 中文
/// 基于无窗口 surfman 上下文（GL 3.3 core 或 GLES 3.0）与 glow 的 [`RenderTarget`]。
pub struct GlRenderTarget {
    size: PhysicalSize<u32>,
    state: RenderState,
    post_process_passes: u64,
}

// SAFETY: the surfman device/context and the glow context are created in `init()` on the worker
// thread and never leave it. Only the uninitialized value crosses threads.
unsafe impl Send for GlRenderTarget {}

impl GlRenderTarget {
    pub fn new(size: PhysicalSize<u32>) -> Self {
        Self {
            size,
            state: RenderState::Uninitialized,
            post_process_passes: 0,
        }
    }

    /// ### English
    /// Number of orientation passes drawn so far.
    ///
    /// ### 中文
    /// 迄今为止绘制的方向变换 pass 数量。
    pub fn post_process_passes(&self) -> u64 {
        self.post_process_passes
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, RenderState::Initialized(_))
    }

    fn resources(&mut self) -> Result<&mut GlResources, RenderTargetError> {
        match &mut self.state {
            RenderState::Initialized(resources) => Ok(resources),
            RenderState::Uninitialized => Err(RenderTargetError::NotInitialized),
        }
    }

    fn create_context() -> Result<(surfman::Device, surfman::Context), RenderTargetError> {
        let connection = Connection::new().map_err(|err| {
            RenderTargetError::ContextCreation(format!("Failed to create surfman Connection: {err:?}"))
        })?;
        let adapter = connection.create_adapter().map_err(|err| {
            RenderTargetError::ContextCreation(format!("Failed to create adapter: {err:?}"))
        })?;
        let mut device = connection.create_device(&adapter).map_err(|err| {
            RenderTargetError::ContextCreation(format!("Failed to create device: {err:?}"))
        })?;

        let version = match device.gl_api() {
            GLApi::GL => GLVersion::new(3, 3),
            GLApi::GLES => GLVersion::new(3, 0),
        };
        let attributes = ContextAttributes {
            version,
            flags: ContextAttributeFlags::empty(),
        };
        let descriptor = device
            .create_context_descriptor(&attributes)
            .map_err(|err| {
                RenderTargetError::ContextCreation(format!(
                    "Failed to create context descriptor: {err:?}"
                ))
            })?;
        let context = device.create_context(&descriptor, None).map_err(|err| {
            RenderTargetError::ContextCreation(format!("Failed to create context: {err:?}"))
        })?;
        Ok((device, context))
    }
}

impl RenderTarget for GlRenderTarget {
    fn init(&mut self) -> Result<(), RenderTargetError> {
        if self.is_initialized() {
            return Ok(());
        }

        let (device, mut context) = Self::create_context()?;
        let resources = Self::init_resources(&device, &context);
        match resources {
            Ok((gl, draw, post, pass)) => {
                debug!(
                    width = self.size.width,
                    height = self.size.height,
                    "offscreen GL context initialized"
                );
                self.state = RenderState::Initialized(Box::new(GlResources {
                    device,
                    context,
                    gl,
                    draw,
                    post,
                    pass,
                    output: Output::Draw,
                }));
                Ok(())
            }
            Err(err) => {
                if let Err(destroy_err) = device.destroy_context(&mut context) {
                    warn!("Failed to destroy surfman context: {destroy_err:?}");
                }
                Err(err)
            }
        }
    }

    fn activate_context(&mut self) -> Result<(), RenderTargetError> {
        let resources = self.resources()?;
        resources
            .device
            .make_context_current(&resources.context)
            .map_err(|err| {
                RenderTargetError::ContextCreation(format!("Failed to make context current: {err:?}"))
            })
    }

    fn prepare_rendering(&mut self) -> Result<(), RenderTargetError> {
        let size = self.size;
        let resources = self.resources()?;
        resources.output = Output::Draw;
        let result = resources.draw.bind(&resources.gl, size);
        if result.is_err() {
            unsafe {
                resources.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            }
        }
        result
    }

    fn orient_image(
        &mut self,
        orientation: CameraOrientation,
        is_y_flip: bool,
    ) -> Result<(), RenderTargetError> {
        if Output::after_orienting(orientation, is_y_flip) == Output::Draw {
            self.resources()?.output = Output::Draw;
            return Ok(());
        }

        let size = self.size;
        let resources = self.resources()?;
        let source = resources
            .draw
            .texture
            .ok_or_else(|| RenderTargetError::Allocation("draw texture missing".to_string()))?;

        let gl = &resources.gl;
        if let Err(err) = resources.post.bind(gl, size) {
            unsafe {
                gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            }
            return Err(err);
        }
        resources.pass.draw(gl, source, orientation, is_y_flip);
        unsafe {
            gl.flush();
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
        resources.output = Output::Post;
        self.post_process_passes += 1;
        Ok(())
    }

    fn read_current_buffer(&mut self) -> Result<Vec<u8>, RenderTargetError> {
        let size = self.size;
        let resources = self.resources()?;
        let framebuffer = match resources.output {
            Output::Draw => &resources.draw,
            Output::Post => &resources.post,
        }
        .framebuffer;

        let mut pixels = vec![0u8; size.width as usize * size.height as usize * 4];
        let gl = &resources.gl;
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            gl.read_pixels(
                0,
                0,
                size.width as i32,
                size.height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelPackData::Slice(Some(&mut pixels)),
            );
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
        Ok(pixels)
    }

    fn size(&self) -> PhysicalSize<u32> {
        self.size
    }
}

impl GlRenderTarget {
    #[allow(clippy::type_complexity)]
    fn init_resources(
        device: &surfman::Device,
        context: &surfman::Context,
    ) -> Result<
        (
            glow::Context,
            FramebufferSlot,
            FramebufferSlot,
            OrientationPass,
        ),
        RenderTargetError,
    > {
        device.make_context_current(context).map_err(|err| {
            RenderTargetError::ContextCreation(format!("Failed to make context current: {err:?}"))
        })?;

        if device.get_proc_address(context, "glReadPixels").is_null() {
            return Err(RenderTargetError::FunctionLoading(
                "glReadPixels is not available".to_string(),
            ));
        }
        let gl = unsafe {
            glow::Context::from_loader_function(|symbol| device.get_proc_address(context, symbol))
        };

        let draw = FramebufferSlot::new(&gl)?;
        let post = match FramebufferSlot::new(&gl) {
            Ok(post) => post,
            Err(err) => {
                draw.delete(&gl);
                return Err(err);
            }
        };
        let pass = match OrientationPass::new(&gl, device.gl_api()) {
            Ok(pass) => pass,
            Err(err) => {
                draw.delete(&gl);
                post.delete(&gl);
                return Err(err);
            }
        };
        Ok((gl, draw, post, pass))
    }
}

impl Drop for GlRenderTarget {
    fn drop(&mut self) {
        let RenderState::Initialized(resources) =
            std::mem::replace(&mut self.state, RenderState::Uninitialized)
        else {
            return;
        };
        let mut resources = *resources;

        if resources
            .device
            .make_context_current(&resources.context)
            .is_ok()
        {
            resources.draw.delete(&resources.gl);
            resources.post.delete(&resources.gl);
            resources.pass.delete(&resources.gl);
        }
        if let Err(err) = resources.device.destroy_context(&mut resources.context) {
            warn!("Failed to destroy surfman context: {err:?}");
        }
    }
}
