//! Uniform Binder.
//!
//! Locations are resolved once, right after linking, for the initial uniform
//! names, the controller-owned uniforms, and the `<name>AspectRatio`
//! companion of every image uniform. Each later update is compared against
//! the last value that actually reached the GPU and skipped when equal.

use std::collections::HashMap;

use crate::error::UniformError;
use crate::gl::GraphicsContext;
use crate::texture::TextureTable;
use crate::types::{UniformShape, UniformValue, Uniforms};

/// Animation clock in seconds.
pub const TIME_UNIFORM: &str = "u_time";
/// Render scale (backing pixels per CSS pixel).
pub const PIXEL_RATIO_UNIFORM: &str = "u_pixelRatio";
/// Backing-store size in pixels.
pub const RESOLUTION_UNIFORM: &str = "u_resolution";
/// Suffix of the optional per-image aspect-ratio uniform.
pub const ASPECT_RATIO_SUFFIX: &str = "AspectRatio";

const CONTROLLER_UNIFORMS: [&str; 3] = [TIME_UNIFORM, PIXEL_RATIO_UNIFORM, RESOLUTION_UNIFORM];

/// Last value uploaded for a name. Images keep only their identity key so the
/// cache does not pin pixel buffers.
#[derive(Debug, Clone, PartialEq)]
enum CachedUniform {
    Value(UniformValue),
    Image { key: String },
}

impl CachedUniform {
    fn of(value: &UniformValue) -> Self {
        match value {
            UniformValue::Image(image) => Self::Image {
                key: image.cache_key(),
            },
            other => Self::Value(other.clone()),
        }
    }

    fn shape(&self) -> UniformShape {
        match self {
            Self::Value(value) => value.shape(),
            Self::Image { .. } => UniformShape::Image,
        }
    }

    fn matches(&self, value: &UniformValue) -> bool {
        match (self, value) {
            (Self::Image { key }, UniformValue::Image(image)) => *key == image.cache_key(),
            (Self::Value(cached), value) => cached == value,
            _ => false,
        }
    }
}

pub(crate) struct UniformBinder<G: GraphicsContext> {
    locations: HashMap<String, G::UniformLocation>,
    cache: HashMap<String, CachedUniform>,
}

impl<G: GraphicsContext> UniformBinder<G> {
    pub fn new() -> Self {
        Self {
            locations: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    /// Resolves every location the mount will use with `program`. Names the
    /// program does not declare are simply absent.
    pub fn resolve(&mut self, gl: &G, program: &G::Program, initial: &Uniforms) {
        let mut names: Vec<String> = CONTROLLER_UNIFORMS
            .iter()
            .map(|name| (*name).to_owned())
            .collect();
        for (name, value) in initial {
            names.push(name.clone());
            if matches!(value, UniformValue::Image(_)) {
                names.push(format!("{name}{ASPECT_RATIO_SUFFIX}"));
            }
        }

        for name in names {
            if let Some(location) = gl.uniform_location(program, &name) {
                self.locations.insert(name, location);
            }
        }
        tracing::debug!(resolved = self.locations.len(), "resolved uniform locations");
    }

    pub fn location(&self, name: &str) -> Option<&G::UniformLocation> {
        self.locations.get(name)
    }

    /// Forgets all locations and cached values.
    pub fn clear(&mut self) {
        self.locations.clear();
        self.cache.clear();
    }

    /// Uploads `value` for `name` unless it equals the last uploaded value.
    /// Returns whether a GPU upload happened.
    pub fn bind(
        &mut self,
        gl: &G,
        textures: &mut TextureTable<G>,
        name: &str,
        value: &UniformValue,
    ) -> Result<bool, UniformError> {
        if let Some(cached) = self.cache.get(name) {
            if cached.matches(value) {
                tracing::trace!(uniform = %name, "uniform unchanged; skipping upload");
                return Ok(false);
            }
        }

        let location = self
            .location(name)
            .ok_or_else(|| UniformError::MissingLocation {
                name: name.to_owned(),
            })?;

        let flattened = match value {
            UniformValue::Array(children) => Some(flatten(name, children)?),
            _ => None,
        };

        if let Some(cached) = self.cache.get(name) {
            let declared = cached.shape();
            let received = value.shape();
            if declared != received {
                return Err(UniformError::ShapeChanged {
                    name: name.to_owned(),
                    declared: declared.to_string(),
                    received: received.to_string(),
                });
            }
        }

        match value {
            UniformValue::Float(v) => gl.uniform_1_f32(location, *v),
            UniformValue::Bool(v) => gl.uniform_1_i32(location, i32::from(*v)),
            UniformValue::Vec2(v) => gl.uniform_2_f32_slice(location, v),
            UniformValue::Vec3(v) => gl.uniform_3_f32_slice(location, v),
            UniformValue::Vec4(v) => gl.uniform_4_f32_slice(location, v),
            UniformValue::Mat3(v) => gl.uniform_matrix_3_f32_slice(location, v),
            UniformValue::Mat4(v) => gl.uniform_matrix_4_f32_slice(location, v),
            UniformValue::Array(_) => {
                let (width, values) = flattened.unwrap_or_default();
                upload_array(gl, location, width, &values);
            }
            UniformValue::Image(image) => {
                let aspect_name = format!("{name}{ASPECT_RATIO_SUFFIX}");
                textures.load(
                    gl,
                    name,
                    image,
                    location,
                    self.locations.get(&aspect_name),
                )?;
            }
        }

        self.cache.insert(name.to_owned(), CachedUniform::of(value));
        Ok(true)
    }

    /// Binds every entry, containing failures per uniform. Returns how many
    /// uploads were issued.
    pub fn bind_all(&mut self, gl: &G, textures: &mut TextureTable<G>, uniforms: &Uniforms) -> usize {
        let mut uploaded = 0;
        for (name, value) in uniforms {
            match self.bind(gl, textures, name, value) {
                Ok(true) => uploaded += 1,
                Ok(false) => {}
                Err(err) => report(&err),
            }
        }
        uploaded
    }

    pub fn upload_time(&self, gl: &G, seconds: f32) {
        if let Some(location) = self.locations.get(TIME_UNIFORM) {
            gl.uniform_1_f32(location, seconds);
        }
    }

    pub fn upload_resolution(&self, gl: &G, width: u32, height: u32, render_scale: f64) {
        if let Some(location) = self.locations.get(RESOLUTION_UNIFORM) {
            gl.uniform_2_f32_slice(location, &[width as f32, height as f32]);
        }
        if let Some(location) = self.locations.get(PIXEL_RATIO_UNIFORM) {
            gl.uniform_1_f32(location, render_scale as f32);
        }
    }
}

/// Validates that every child has one supported length and concatenates
/// them in order.
fn flatten(name: &str, children: &[Vec<f32>]) -> Result<(usize, Vec<f32>), UniformError> {
    let width = children.first().map_or(0, Vec::len);
    if children.iter().any(|child| child.len() != width) {
        return Err(UniformError::MismatchedChildren {
            name: name.to_owned(),
        });
    }
    if !matches!(width, 2 | 3 | 4 | 9 | 16) {
        return Err(UniformError::UnsupportedLength {
            name: name.to_owned(),
            len: width,
        });
    }
    Ok((width, children.concat()))
}

fn upload_array<G: GraphicsContext>(gl: &G, location: &G::UniformLocation, width: usize, values: &[f32]) {
    match width {
        2 => gl.uniform_2_f32_slice(location, values),
        3 => gl.uniform_3_f32_slice(location, values),
        4 => gl.uniform_4_f32_slice(location, values),
        9 => gl.uniform_matrix_3_f32_slice(location, values),
        16 => gl.uniform_matrix_4_f32_slice(location, values),
        _ => {}
    }
}

fn report(err: &UniformError) {
    match err {
        UniformError::ImageNotLoaded { .. }
        | UniformError::Upload { .. }
        | UniformError::Allocation { .. } => {
            tracing::error!(error = %err, "failed to set image uniform");
        }
        _ => tracing::warn!(error = %err, "skipping uniform update"),
    }
}
