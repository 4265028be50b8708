use std::collections::{HashMap, HashSet};

use crate::error::UniformError;
use crate::gl::{GraphicsContext, TextureFilter, TextureParameter, TextureWrap, NO_ERROR};
use crate::types::ImageSource;

/// Live textures for image uniforms plus their texture units.
///
/// Units are handed out in first-use order and never reassigned, so a
/// uniform keeps its unit even after its texture is replaced or fails to
/// upload.
pub(crate) struct TextureTable<G: GraphicsContext> {
    textures: HashMap<String, G::Texture>,
    units: HashMap<String, u32>,
    mipmapped: HashSet<String>,
}

impl<G: GraphicsContext> TextureTable<G> {
    pub fn new(mipmapped: impl IntoIterator<Item = String>) -> Self {
        Self {
            textures: HashMap::new(),
            units: HashMap::new(),
            mipmapped: mipmapped.into_iter().collect(),
        }
    }

    #[cfg(test)]
    pub fn unit(&self, name: &str) -> Option<u32> {
        self.units.get(name).copied()
    }

    #[cfg(test)]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.textures.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    fn unit_for(&mut self, name: &str) -> u32 {
        let next = self.units.len() as u32;
        *self.units.entry(name.to_owned()).or_insert(next)
    }

    /// Uploads `image` as the texture behind sampler uniform `name`.
    ///
    /// Any previous texture for `name` is deleted first. A texture is only
    /// registered, and the sampler only pointed at its unit, once the upload
    /// has completed without a GL error.
    pub fn load(
        &mut self,
        gl: &G,
        name: &str,
        image: &ImageSource,
        sampler: &G::UniformLocation,
        aspect_ratio: Option<&G::UniformLocation>,
    ) -> Result<(), UniformError> {
        let pixels = match image.pixels() {
            Some(pixels) if image.is_complete() => pixels,
            _ => {
                return Err(UniformError::ImageNotLoaded {
                    name: name.to_owned(),
                })
            }
        };

        if let Some(previous) = self.textures.remove(name) {
            gl.delete_texture(previous);
        }

        let unit = self.unit_for(name);
        let texture = gl
            .create_texture()
            .map_err(|reason| UniformError::Allocation {
                name: name.to_owned(),
                reason,
            })?;

        gl.active_texture(unit);
        gl.bind_texture(Some(&texture));
        gl.tex_parameter(TextureParameter::WrapS(TextureWrap::ClampToEdge));
        gl.tex_parameter(TextureParameter::WrapT(TextureWrap::ClampToEdge));
        gl.tex_parameter(TextureParameter::MinFilter(TextureFilter::Linear));
        gl.tex_parameter(TextureParameter::MagFilter(TextureFilter::Linear));
        gl.tex_image_rgba8(pixels.width(), pixels.height(), pixels.as_raw());

        let mipmapped = self.mipmapped.contains(name);
        if mipmapped {
            gl.generate_mipmap();
            gl.tex_parameter(TextureParameter::MinFilter(
                TextureFilter::LinearMipmapLinear,
            ));
        }

        let code = gl.error_code();
        if code != NO_ERROR {
            gl.bind_texture(None);
            gl.delete_texture(texture);
            return Err(UniformError::Upload {
                name: name.to_owned(),
                code,
            });
        }

        self.textures.insert(name.to_owned(), texture);
        gl.uniform_1_i32(sampler, unit as i32);
        if let Some(location) = aspect_ratio {
            gl.uniform_1_f32(location, image.aspect_ratio());
        }

        tracing::debug!(
            uniform = %name,
            unit,
            width = pixels.width(),
            height = pixels.height(),
            mipmapped,
            "uploaded uniform texture"
        );
        Ok(())
    }

    /// Deletes every texture and forgets the table. Unit assignments are kept.
    pub fn release_all(&mut self, gl: &G) {
        for (_, texture) in self.textures.drain() {
            gl.delete_texture(texture);
        }
    }
}
