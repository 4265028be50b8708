use std::sync::OnceLock;

use regex::Regex;

use crate::error::BuildError;
use crate::gl::{FloatPrecision, GraphicsContext, ShaderStage};

/// Pass-through vertex stage shared by every mounted fragment shader.
pub const VERTEX_SHADER: &str = r"#version 300 es
precision mediump float;

layout(location = 0) in vec4 a_position;

void main() {
  gl_Position = a_position;
}
";

/// Attribute the full-screen quad is bound to.
pub(crate) const POSITION_ATTRIBUTE: &str = "a_position";

/// Below this many mantissa bits `mediump` bands visibly, so sources are
/// rewritten to `highp`.
pub(crate) const MEDIUMP_MANTISSA_THRESHOLD: i32 = 23;

/// Two triangles covering normalised device coordinates.
const QUAD_VERTICES: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [-1.0, 1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [1.0, 1.0],
];

pub(crate) const QUAD_VERTEX_COUNT: i32 = QUAD_VERTICES.len() as i32;

/// Linked program plus the quad buffer bound to its position attribute.
pub struct ShaderProgram<G: GraphicsContext> {
    program: G::Program,
    quad: G::Buffer,
}

impl<G: GraphicsContext> ShaderProgram<G> {
    pub fn program(&self) -> &G::Program {
        &self.program
    }

    /// Deletes the program and its quad buffer.
    pub(crate) fn release(self, gl: &G) {
        gl.delete_buffer(self.quad);
        gl.delete_program(self.program);
    }
}

/// Compiles and links `vertex` + `fragment`, then allocates the quad buffer.
///
/// Stage objects are always released, whether linking succeeds or not, and no
/// partially built program survives a failure.
pub fn build_program<G: GraphicsContext>(
    gl: &G,
    vertex: &str,
    fragment: &str,
) -> Result<ShaderProgram<G>, BuildError> {
    let (vertex, fragment) = if needs_precision_upgrade(gl) {
        tracing::debug!("medium float precision too narrow; promoting shaders to highp");
        (upgrade_precision(vertex), upgrade_precision(fragment))
    } else {
        (vertex.to_owned(), fragment.to_owned())
    };

    let vertex_shader = compile_stage(gl, ShaderStage::Vertex, &vertex)?;
    let fragment_shader = match compile_stage(gl, ShaderStage::Fragment, &fragment) {
        Ok(shader) => shader,
        Err(err) => {
            gl.delete_shader(vertex_shader);
            return Err(err);
        }
    };

    let program = match gl.create_program() {
        Ok(program) => program,
        Err(reason) => {
            gl.delete_shader(vertex_shader);
            gl.delete_shader(fragment_shader);
            return Err(BuildError::Allocation {
                resource: "shader program",
                reason,
            });
        }
    };

    gl.attach_shader(&program, &vertex_shader);
    gl.attach_shader(&program, &fragment_shader);
    let linked = gl.link_program(&program);
    gl.detach_shader(&program, &vertex_shader);
    gl.detach_shader(&program, &fragment_shader);
    gl.delete_shader(vertex_shader);
    gl.delete_shader(fragment_shader);

    if !linked {
        let log = gl.program_info_log(&program);
        gl.delete_program(program);
        return Err(BuildError::Link { log });
    }

    gl.use_program(Some(&program));

    let quad = match gl.create_buffer() {
        Ok(buffer) => buffer,
        Err(reason) => {
            gl.use_program(None);
            gl.delete_program(program);
            return Err(BuildError::Allocation {
                resource: "quad vertex buffer",
                reason,
            });
        }
    };
    gl.upload_vertices(&quad, bytemuck::cast_slice(&QUAD_VERTICES));
    let position = gl.attrib_location(&program, POSITION_ATTRIBUTE).unwrap_or(0);
    gl.bind_vertex_attrib(position, &quad, 2);

    tracing::debug!(position_attribute = position, "linked shader program");
    Ok(ShaderProgram { program, quad })
}

fn compile_stage<G: GraphicsContext>(
    gl: &G,
    stage: ShaderStage,
    source: &str,
) -> Result<G::Shader, BuildError> {
    let shader = gl
        .create_shader(stage)
        .map_err(|reason| BuildError::Allocation {
            resource: "shader object",
            reason,
        })?;
    if gl.compile_shader(&shader, source) {
        Ok(shader)
    } else {
        let log = gl.shader_info_log(&shader);
        gl.delete_shader(shader);
        Err(BuildError::Compile { stage, log })
    }
}

/// True when the fragment stage's `mediump` float mantissa is narrower than
/// [`MEDIUMP_MANTISSA_THRESHOLD`]. Platforms that cannot report precision are
/// left alone.
pub(crate) fn needs_precision_upgrade<G: GraphicsContext>(gl: &G) -> bool {
    gl.shader_precision(ShaderStage::Fragment, FloatPrecision::Medium)
        .map(|format| format.precision < MEDIUMP_MANTISSA_THRESHOLD)
        .unwrap_or(false)
}

/// Rewrites `lowp`/`mediump` on precision statements and on
/// `uniform`/`varying`/`attribute` declarations to `highp`.
pub(crate) fn upgrade_precision(source: &str) -> String {
    static DEFAULT_PRECISION: OnceLock<Regex> = OnceLock::new();
    static QUALIFIED_DECLARATION: OnceLock<Regex> = OnceLock::new();

    let default_precision = DEFAULT_PRECISION.get_or_init(|| {
        Regex::new(r"precision\s+(lowp|mediump)\s+float;").expect("precision pattern is valid")
    });
    let qualified = QUALIFIED_DECLARATION.get_or_init(|| {
        Regex::new(r"\b(uniform|varying|attribute)\s+(lowp|mediump)\s+(\w+)")
            .expect("declaration pattern is valid")
    });

    let source = default_precision.replace_all(source, "precision highp float;");
    qualified
        .replace_all(&source, "${1} highp ${3}")
        .into_owned()
}
