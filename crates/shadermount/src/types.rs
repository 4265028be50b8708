use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::resize::{NoZoomCorrection, ZoomEstimator};

/// Default floor for the backing-store pixel ratio.
pub const DEFAULT_MIN_PIXEL_RATIO: f64 = 2.0;

/// Default cap on backing-store pixels (a 4K surface).
pub const DEFAULT_MAX_PIXEL_COUNT: u64 = 1920 * 1080 * 4;

/// Characters of an image locator that participate in its cache key.
const IMAGE_KEY_LOCATOR_CHARS: usize = 200;

/// Uniform name to value mapping used for initial and partial updates.
pub type Uniforms = BTreeMap<String, UniformValue>;

/// CPU-side value for a named shader uniform.
///
/// Each variant maps to exactly one upload call; see `uniforms::upload`.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    /// Uploaded as an integer, `1` or `0`.
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column-major 3×3 matrix.
    Mat3([f32; 9]),
    /// Column-major 4×4 matrix.
    Mat4([f32; 16]),
    /// Uniform array of vectors (or matrices); every child must share a length.
    Array(Vec<Vec<f32>>),
    Image(ImageSource),
}

impl UniformValue {
    /// Interprets a flat numeric array by its length: 2/3/4 are vectors, 9 and
    /// 16 are matrices. Any other length has no uniform shape.
    pub fn from_slice(values: &[f32]) -> Option<Self> {
        let value = match values.len() {
            2 => Self::Vec2(values.try_into().ok()?),
            3 => Self::Vec3(values.try_into().ok()?),
            4 => Self::Vec4(values.try_into().ok()?),
            9 => Self::Mat3(values.try_into().ok()?),
            16 => Self::Mat4(values.try_into().ok()?),
            _ => return None,
        };
        Some(value)
    }

    /// Shape the value declares for its uniform. Arrays report the length of
    /// their first child; mismatches are caught when uploading.
    pub fn shape(&self) -> UniformShape {
        match self {
            Self::Float(_) => UniformShape::Float,
            Self::Bool(_) => UniformShape::Bool,
            Self::Vec2(_) => UniformShape::Vector(2),
            Self::Vec3(_) => UniformShape::Vector(3),
            Self::Vec4(_) => UniformShape::Vector(4),
            Self::Mat3(_) => UniformShape::Matrix(3),
            Self::Mat4(_) => UniformShape::Matrix(4),
            Self::Array(children) => UniformShape::Array(children.first().map_or(0, Vec::len)),
            Self::Image(_) => UniformShape::Image,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(value: [f32; 2]) -> Self {
        Self::Vec2(value)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(value: [f32; 3]) -> Self {
        Self::Vec3(value)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(value: [f32; 4]) -> Self {
        Self::Vec4(value)
    }
}

impl From<Vec<Vec<f32>>> for UniformValue {
    fn from(value: Vec<Vec<f32>>) -> Self {
        Self::Array(value)
    }
}

impl From<ImageSource> for UniformValue {
    fn from(value: ImageSource) -> Self {
        Self::Image(value)
    }
}

/// Declared shape of a uniform; fixed for the lifetime of a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformShape {
    Float,
    Bool,
    Vector(usize),
    Matrix(usize),
    /// Array of vectors with the given per-element width.
    Array(usize),
    Image,
}

impl fmt::Display for UniformShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UniformShape::Float => f.write_str("float"),
            UniformShape::Bool => f.write_str("bool"),
            UniformShape::Vector(n) => write!(f, "vec{n}"),
            UniformShape::Matrix(n) => write!(f, "mat{n}"),
            UniformShape::Array(n) => write!(f, "array of {n}-component elements"),
            UniformShape::Image => f.write_str("sampler2D"),
        }
    }
}

/// Image bound to a sampler uniform.
///
/// Equality goes through [`ImageSource::cache_key`] rather than pixel data, so
/// re-assigning the same image is recognised even when the pixels were
/// reloaded into a fresh buffer.
#[derive(Clone)]
pub struct ImageSource {
    locator: String,
    natural_width: u32,
    natural_height: u32,
    pixels: Option<Arc<RgbaImage>>,
}

impl ImageSource {
    /// Decodes the image at `path` into RGBA8.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)
            .with_context(|| format!("failed to open image at {}", path.display()))?;
        let rgba = image.to_rgba8();
        if rgba.width() == 0 || rgba.height() == 0 {
            anyhow::bail!(
                "image at {} has zero extent ({}x{})",
                path.display(),
                rgba.width(),
                rgba.height()
            );
        }
        tracing::debug!(
            path = %path.display(),
            width = rgba.width(),
            height = rgba.height(),
            "decoded uniform image"
        );
        Ok(Self::from_rgba(path.display().to_string(), rgba))
    }

    /// Wraps already-decoded pixels.
    pub fn from_rgba(locator: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            locator: locator.into(),
            natural_width: image.width(),
            natural_height: image.height(),
            pixels: Some(Arc::new(image)),
        }
    }

    /// An image whose pixels have not arrived yet.
    pub fn pending(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            natural_width: 0,
            natural_height: 0,
            pixels: None,
        }
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn natural_width(&self) -> u32 {
        self.natural_width
    }

    pub fn natural_height(&self) -> u32 {
        self.natural_height
    }

    /// True once pixels are present with a non-zero width.
    pub fn is_complete(&self) -> bool {
        self.pixels.is_some() && self.natural_width > 0
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.as_deref()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.natural_width as f32 / self.natural_height.max(1) as f32
    }

    /// `<first 200 chars of locator>|<width>x<height>`.
    pub fn cache_key(&self) -> String {
        let locator: String = self
            .locator
            .chars()
            .take(IMAGE_KEY_LOCATOR_CHARS)
            .collect();
        format!(
            "{locator}|{}x{}",
            self.natural_width, self.natural_height
        )
    }
}

impl PartialEq for ImageSource {
    fn eq(&self, other: &Self) -> bool {
        self.cache_key() == other.cache_key()
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSource")
            .field("locator", &self.locator)
            .field("natural_width", &self.natural_width)
            .field("natural_height", &self.natural_height)
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// GPU power hint forwarded to the context provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerPreference {
    #[default]
    Default,
    LowPower,
    HighPerformance,
}

/// Attributes requested when the host creates the rendering context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    pub alpha: bool,
    pub premultiplied_alpha: bool,
    pub antialias: bool,
    pub preserve_drawing_buffer: bool,
    pub power_preference: PowerPreference,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            alpha: true,
            premultiplied_alpha: true,
            antialias: true,
            preserve_drawing_buffer: false,
            power_preference: PowerPreference::Default,
        }
    }
}

/// Everything a mount needs besides the host and the fragment source.
#[derive(Debug, Clone)]
pub struct MountOptions {
    /// Initial uniforms; their names are resolved once at link time.
    pub uniforms: Uniforms,
    pub context: ContextOptions,
    /// Signed animation speed; `0` renders on demand only.
    pub speed: f32,
    /// Starting clock value in milliseconds.
    pub frame: f64,
    pub min_pixel_ratio: f64,
    pub max_pixel_count: u64,
    /// Image uniforms that get mipmaps and trilinear minification.
    pub mipmaps: Vec<String>,
    /// Browser-zoom guess used when the host cannot report device pixels.
    pub zoom: Arc<dyn ZoomEstimator>,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            uniforms: Uniforms::new(),
            context: ContextOptions::default(),
            speed: 0.0,
            frame: 0.0,
            min_pixel_ratio: DEFAULT_MIN_PIXEL_RATIO,
            max_pixel_count: DEFAULT_MAX_PIXEL_COUNT,
            mipmaps: Vec::new(),
            zoom: Arc::new(NoZoomCorrection),
        }
    }
}
