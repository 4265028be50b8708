use std::sync::Arc;

use glow::{HasContext, PixelUnpackData};

use super::{
    FloatPrecision, GraphicsContext, PrecisionFormat, ShaderStage, TextureFilter,
    TextureParameter, TextureWrap,
};

/// [`GraphicsContext`] backed by a `glow` context (desktop GL 3.3+, GLES 3, or
/// WebGL2).
///
/// Every call assumes the wrapped context is current on the calling thread;
/// that requirement is taken on once by [`GlowContext::new`].
pub struct GlowContext {
    gl: Arc<glow::Context>,
    vertex_array: Option<glow::VertexArray>,
}

impl GlowContext {
    /// Wraps `gl`, creating and binding the vertex array object core profiles
    /// require before any attribute setup.
    ///
    /// # Safety
    ///
    /// `gl` must be current on this thread for the lifetime of the returned
    /// value, and all calls must be made from that thread.
    pub unsafe fn new(gl: Arc<glow::Context>) -> Result<Self, String> {
        let vertex_array = unsafe {
            let vao = gl.create_vertex_array()?;
            gl.bind_vertex_array(Some(vao));
            vao
        };
        Ok(Self {
            gl,
            vertex_array: Some(vertex_array),
        })
    }

    /// Shared handle to the underlying context.
    pub fn gl(&self) -> &Arc<glow::Context> {
        &self.gl
    }
}

impl Drop for GlowContext {
    fn drop(&mut self) {
        if let Some(vao) = self.vertex_array.take() {
            unsafe {
                self.gl.bind_vertex_array(None);
                self.gl.delete_vertex_array(vao);
            }
        }
    }
}

fn stage_enum(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

fn filter_enum(filter: TextureFilter) -> i32 {
    let value = match filter {
        TextureFilter::Linear => glow::LINEAR,
        TextureFilter::LinearMipmapLinear => glow::LINEAR_MIPMAP_LINEAR,
    };
    value as i32
}

fn wrap_enum(wrap: TextureWrap) -> i32 {
    match wrap {
        TextureWrap::ClampToEdge => glow::CLAMP_TO_EDGE as i32,
    }
}

fn gl_size(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl GraphicsContext for GlowContext {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type Buffer = glow::Buffer;
    type Texture = glow::Texture;
    type UniformLocation = glow::UniformLocation;

    fn shader_precision(
        &self,
        stage: ShaderStage,
        precision: FloatPrecision,
    ) -> Option<PrecisionFormat> {
        let precision = match precision {
            FloatPrecision::Low => glow::LOW_FLOAT,
            FloatPrecision::Medium => glow::MEDIUM_FLOAT,
            FloatPrecision::High => glow::HIGH_FLOAT,
        };
        unsafe {
            self.gl
                .get_shader_precision_format(stage_enum(stage), precision)
        }
        .map(|format| PrecisionFormat {
            range_min: format.range_min,
            range_max: format.range_max,
            precision: format.precision,
        })
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        unsafe { self.gl.create_shader(stage_enum(stage)) }
    }

    fn compile_shader(&self, shader: &Self::Shader, source: &str) -> bool {
        unsafe {
            self.gl.shader_source(*shader, source);
            self.gl.compile_shader(*shader);
            self.gl.get_shader_compile_status(*shader)
        }
    }

    fn shader_info_log(&self, shader: &Self::Shader) -> String {
        unsafe { self.gl.get_shader_info_log(*shader) }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { self.gl.delete_shader(shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { self.gl.create_program() }
    }

    fn attach_shader(&self, program: &Self::Program, shader: &Self::Shader) {
        unsafe { self.gl.attach_shader(*program, *shader) }
    }

    fn detach_shader(&self, program: &Self::Program, shader: &Self::Shader) {
        unsafe { self.gl.detach_shader(*program, *shader) }
    }

    fn link_program(&self, program: &Self::Program) -> bool {
        unsafe {
            self.gl.link_program(*program);
            self.gl.get_program_link_status(*program)
        }
    }

    fn program_info_log(&self, program: &Self::Program) -> String {
        unsafe { self.gl.get_program_info_log(*program) }
    }

    fn use_program(&self, program: Option<&Self::Program>) {
        unsafe { self.gl.use_program(program.copied()) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { self.gl.delete_program(program) }
    }

    fn attrib_location(&self, program: &Self::Program, name: &str) -> Option<u32> {
        unsafe { self.gl.get_attrib_location(*program, name) }
    }

    fn create_buffer(&self) -> Result<Self::Buffer, String> {
        unsafe { self.gl.create_buffer() }
    }

    fn upload_vertices(&self, buffer: &Self::Buffer, data: &[u8]) {
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(*buffer));
            self.gl
                .buffer_data_u8_slice(glow::ARRAY_BUFFER, data, glow::STATIC_DRAW);
        }
    }

    fn bind_vertex_attrib(&self, index: u32, buffer: &Self::Buffer, components: i32) {
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(*buffer));
            self.gl.enable_vertex_attrib_array(index);
            self.gl
                .vertex_attrib_pointer_f32(index, components, glow::FLOAT, false, 0, 0);
        }
    }

    fn delete_buffer(&self, buffer: Self::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) }
    }

    fn uniform_location(
        &self,
        program: &Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.gl.get_uniform_location(*program, name) }
    }

    fn uniform_1_f32(&self, location: &Self::UniformLocation, value: f32) {
        unsafe { self.gl.uniform_1_f32(Some(location), value) }
    }

    fn uniform_1_i32(&self, location: &Self::UniformLocation, value: i32) {
        unsafe { self.gl.uniform_1_i32(Some(location), value) }
    }

    fn uniform_2_f32_slice(&self, location: &Self::UniformLocation, values: &[f32]) {
        unsafe { self.gl.uniform_2_f32_slice(Some(location), values) }
    }

    fn uniform_3_f32_slice(&self, location: &Self::UniformLocation, values: &[f32]) {
        unsafe { self.gl.uniform_3_f32_slice(Some(location), values) }
    }

    fn uniform_4_f32_slice(&self, location: &Self::UniformLocation, values: &[f32]) {
        unsafe { self.gl.uniform_4_f32_slice(Some(location), values) }
    }

    fn uniform_matrix_3_f32_slice(&self, location: &Self::UniformLocation, values: &[f32]) {
        unsafe {
            self.gl
                .uniform_matrix_3_f32_slice(Some(location), false, values)
        }
    }

    fn uniform_matrix_4_f32_slice(&self, location: &Self::UniformLocation, values: &[f32]) {
        unsafe {
            self.gl
                .uniform_matrix_4_f32_slice(Some(location), false, values)
        }
    }

    fn create_texture(&self) -> Result<Self::Texture, String> {
        unsafe { self.gl.create_texture() }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) }
    }

    fn bind_texture(&self, texture: Option<&Self::Texture>) {
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, texture.copied()) }
    }

    fn tex_parameter(&self, parameter: TextureParameter) {
        let (name, value) = match parameter {
            TextureParameter::WrapS(wrap) => (glow::TEXTURE_WRAP_S, wrap_enum(wrap)),
            TextureParameter::WrapT(wrap) => (glow::TEXTURE_WRAP_T, wrap_enum(wrap)),
            TextureParameter::MinFilter(filter) => (glow::TEXTURE_MIN_FILTER, filter_enum(filter)),
            TextureParameter::MagFilter(filter) => (glow::TEXTURE_MAG_FILTER, filter_enum(filter)),
        };
        unsafe { self.gl.tex_parameter_i32(glow::TEXTURE_2D, name, value) }
    }

    fn tex_image_rgba8(&self, width: u32, height: u32, pixels: &[u8]) {
        unsafe {
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                gl_size(width),
                gl_size(height),
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                PixelUnpackData::Slice(Some(pixels)),
            );
        }
    }

    fn generate_mipmap(&self) {
        unsafe { self.gl.generate_mipmap(glow::TEXTURE_2D) }
    }

    fn delete_texture(&self, texture: Self::Texture) {
        unsafe { self.gl.delete_texture(texture) }
    }

    fn error_code(&self) -> u32 {
        unsafe { self.gl.get_error() }
    }

    fn viewport(&self, width: u32, height: u32) {
        unsafe { self.gl.viewport(0, 0, gl_size(width), gl_size(height)) }
    }

    fn clear(&self) {
        unsafe { self.gl.clear(glow::COLOR_BUFFER_BIT) }
    }

    fn draw_triangles(&self, vertex_count: i32) {
        unsafe { self.gl.draw_arrays(glow::TRIANGLES, 0, vertex_count) }
    }

    fn reset_bindings(&self) {
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, None);
            self.gl.bind_renderbuffer(glow::RENDERBUFFER, None);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            self.gl.use_program(None);
        }
    }
}
