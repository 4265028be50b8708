//! Rendering-surface contract consumed by the mount.
//!
//! `GraphicsContext` is deliberately GL-shaped: the mount resolves uniform
//! locations by name, assigns texture units, and issues one draw per frame, so
//! the trait exposes exactly those primitives and nothing else. Handles are
//! associated types so a backend can hand out whatever its API uses
//! (`glow` handles, WebGL objects, or plain integers in tests).

#[cfg(feature = "glow")]
mod glow_context;

#[cfg(feature = "glow")]
pub use glow_context::GlowContext;

/// `glGetError` value meaning "no error recorded".
pub const NO_ERROR: u32 = 0;

/// Pipeline stage a shader object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Float precision qualifiers that can be probed on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatPrecision {
    Low,
    Medium,
    High,
}

/// Result of a shader precision probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrecisionFormat {
    pub range_min: i32,
    pub range_max: i32,
    /// Mantissa bits available at this precision.
    pub precision: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureWrap {
    ClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Linear,
    LinearMipmapLinear,
}

/// Sampler state applied to the currently bound 2D texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureParameter {
    WrapS(TextureWrap),
    WrapT(TextureWrap),
    MinFilter(TextureFilter),
    MagFilter(TextureFilter),
}

/// GL-style rendering primitives used by the program builder, uniform binder,
/// texture loader, and frame driver.
///
/// All calls are issued from the host UI thread; implementations are free to
/// rely on a single current context.
pub trait GraphicsContext {
    type Shader;
    type Program;
    type Buffer;
    type Texture;
    type UniformLocation: Clone;

    /// Probes numeric precision support; `None` when the platform cannot say.
    fn shader_precision(
        &self,
        stage: ShaderStage,
        precision: FloatPrecision,
    ) -> Option<PrecisionFormat>;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    /// Uploads `source` and compiles it, returning the compile status.
    fn compile_shader(&self, shader: &Self::Shader, source: &str) -> bool;
    fn shader_info_log(&self, shader: &Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: &Self::Program, shader: &Self::Shader);
    fn detach_shader(&self, program: &Self::Program, shader: &Self::Shader);
    /// Links the attached stages, returning the link status.
    fn link_program(&self, program: &Self::Program) -> bool;
    fn program_info_log(&self, program: &Self::Program) -> String;
    fn use_program(&self, program: Option<&Self::Program>);
    fn delete_program(&self, program: Self::Program);

    fn attrib_location(&self, program: &Self::Program, name: &str) -> Option<u32>;
    fn create_buffer(&self) -> Result<Self::Buffer, String>;
    /// Binds `buffer` as the array buffer and fills it with static data.
    fn upload_vertices(&self, buffer: &Self::Buffer, data: &[u8]);
    /// Points attribute `index` at `buffer` as tightly packed `f32` tuples.
    fn bind_vertex_attrib(&self, index: u32, buffer: &Self::Buffer, components: i32);
    fn delete_buffer(&self, buffer: Self::Buffer);

    fn uniform_location(
        &self,
        program: &Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;
    fn uniform_1_f32(&self, location: &Self::UniformLocation, value: f32);
    fn uniform_1_i32(&self, location: &Self::UniformLocation, value: i32);
    fn uniform_2_f32_slice(&self, location: &Self::UniformLocation, values: &[f32]);
    fn uniform_3_f32_slice(&self, location: &Self::UniformLocation, values: &[f32]);
    fn uniform_4_f32_slice(&self, location: &Self::UniformLocation, values: &[f32]);
    /// Column-major upload; never transposed.
    fn uniform_matrix_3_f32_slice(&self, location: &Self::UniformLocation, values: &[f32]);
    /// Column-major upload; never transposed.
    fn uniform_matrix_4_f32_slice(&self, location: &Self::UniformLocation, values: &[f32]);

    fn create_texture(&self) -> Result<Self::Texture, String>;
    /// Selects texture unit `unit` (zero based).
    fn active_texture(&self, unit: u32);
    fn bind_texture(&self, texture: Option<&Self::Texture>);
    fn tex_parameter(&self, parameter: TextureParameter);
    /// Uploads tightly packed RGBA8 pixels into the bound 2D texture.
    fn tex_image_rgba8(&self, width: u32, height: u32, pixels: &[u8]);
    fn generate_mipmap(&self);
    fn delete_texture(&self, texture: Self::Texture);
    /// Pops the oldest recorded error, [`NO_ERROR`] if none.
    fn error_code(&self) -> u32;

    fn viewport(&self, width: u32, height: u32);
    fn clear(&self);
    fn draw_triangles(&self, vertex_count: i32);
    /// Unbinds buffers, textures, framebuffers, and the program.
    fn reset_bindings(&self);
}
