//! TOML description of a shader mount.
//!
//! ```toml
//! fragment = "waves.frag"
//! speed = 0.5
//! frame = "2.5s"
//! min_pixel_ratio = 2
//! mipmaps = ["u_noise"]
//!
//! [context]
//! power_preference = "low-power"
//!
//! [uniforms]
//! u_scale = 1.5
//! u_colors = [[1, 0, 0], [0, 0, 1]]
//! u_noise = { image = "noise.png" }
//! ```
//!
//! Relative paths resolve against the directory holding the configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use shadermount::{
    ContextOptions, ImageSource, MountOptions, NoZoomCorrection, PowerPreference, UniformValue,
    Uniforms, WindowWidthZoom, ZoomEstimator, DEFAULT_MAX_PIXEL_COUNT, DEFAULT_MIN_PIXEL_RATIO,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to load image for uniform '{name}': {reason}")]
    Image { name: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoomPolicy {
    #[default]
    None,
    WindowWidth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerPreferenceSetting {
    #[default]
    Default,
    LowPower,
    HighPerformance,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ContextSettings {
    pub alpha: Option<bool>,
    pub premultiplied_alpha: Option<bool>,
    pub antialias: Option<bool>,
    pub preserve_drawing_buffer: Option<bool>,
    #[serde(default)]
    pub power_preference: PowerPreferenceSetting,
}

/// Uniform value as written in TOML.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum UniformSpec {
    Bool(bool),
    Number(f64),
    Vector(Vec<f64>),
    Nested(Vec<Vec<f64>>),
    Image { image: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MountConfig {
    /// Fragment shader source file.
    pub fragment: Option<PathBuf>,
    #[serde(default)]
    pub speed: f32,
    /// Starting clock in milliseconds; accepts a number or a duration string.
    #[serde(default, deserialize_with = "deserialize_frame")]
    pub frame: f64,
    #[serde(default = "default_min_pixel_ratio")]
    pub min_pixel_ratio: f64,
    #[serde(default = "default_max_pixel_count")]
    pub max_pixel_count: u64,
    #[serde(default)]
    pub mipmaps: Vec<String>,
    #[serde(default)]
    pub zoom: ZoomPolicy,
    #[serde(default)]
    pub context: ContextSettings,
    #[serde(default)]
    pub uniforms: BTreeMap<String, UniformSpec>,
}

fn default_min_pixel_ratio() -> f64 {
    DEFAULT_MIN_PIXEL_RATIO
}

fn default_max_pixel_count() -> u64 {
    DEFAULT_MAX_PIXEL_COUNT
}

fn deserialize_frame<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a frame as milliseconds or a human-readable duration")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(|duration| duration.as_secs_f64() * 1000.0)
                .map_err(|err| E::custom(format!("invalid frame '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v as f64)
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(v as f64)
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() {
                return Err(E::custom("frame must be finite"));
            }
            Ok(v)
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl MountConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: MountConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.speed.is_finite() {
            return Err(ConfigError::Invalid("speed must be finite".into()));
        }
        if !(self.min_pixel_ratio.is_finite() && self.min_pixel_ratio > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "min_pixel_ratio must be positive, got {}",
                self.min_pixel_ratio
            )));
        }
        if self.max_pixel_count == 0 {
            return Err(ConfigError::Invalid(
                "max_pixel_count must be greater than zero".into(),
            ));
        }
        if let Some(name) = self.mipmaps.iter().find(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "mipmaps contains an empty uniform name '{name}'"
            )));
        }
        for (name, spec) in &self.uniforms {
            validate_uniform(name, spec)?;
        }
        Ok(())
    }

    /// Reads the fragment source named by `fragment`, if any.
    pub fn fragment_source(&self, base_dir: &Path) -> Result<Option<String>, ConfigError> {
        let Some(fragment) = &self.fragment else {
            return Ok(None);
        };
        let path = base_dir.join(fragment);
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| ConfigError::Io { path, source })
    }

    /// Builds mount options, decoding image uniforms relative to `base_dir`.
    pub fn to_options(&self, base_dir: &Path) -> Result<MountOptions, ConfigError> {
        let mut uniforms = Uniforms::new();
        for (name, spec) in &self.uniforms {
            uniforms.insert(name.clone(), resolve_uniform(name, spec, base_dir)?);
        }

        let zoom: Arc<dyn ZoomEstimator> = match self.zoom {
            ZoomPolicy::None => Arc::new(NoZoomCorrection),
            ZoomPolicy::WindowWidth => Arc::new(WindowWidthZoom),
        };

        Ok(MountOptions {
            uniforms,
            context: self.context.resolve(),
            speed: self.speed,
            frame: self.frame,
            min_pixel_ratio: self.min_pixel_ratio,
            max_pixel_count: self.max_pixel_count,
            mipmaps: self.mipmaps.clone(),
            zoom,
        })
    }
}

impl ContextSettings {
    fn resolve(&self) -> ContextOptions {
        let defaults = ContextOptions::default();
        ContextOptions {
            alpha: self.alpha.unwrap_or(defaults.alpha),
            premultiplied_alpha: self
                .premultiplied_alpha
                .unwrap_or(defaults.premultiplied_alpha),
            antialias: self.antialias.unwrap_or(defaults.antialias),
            preserve_drawing_buffer: self
                .preserve_drawing_buffer
                .unwrap_or(defaults.preserve_drawing_buffer),
            power_preference: match self.power_preference {
                PowerPreferenceSetting::Default => PowerPreference::Default,
                PowerPreferenceSetting::LowPower => PowerPreference::LowPower,
                PowerPreferenceSetting::HighPerformance => PowerPreference::HighPerformance,
            },
        }
    }
}

fn validate_uniform(name: &str, spec: &UniformSpec) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Invalid("uniform names must not be empty".into()));
    }
    match spec {
        UniformSpec::Vector(values) if !matches!(values.len(), 2 | 3 | 4 | 9 | 16) => {
            Err(ConfigError::Invalid(format!(
                "uniform '{name}' has {} components; expected 2, 3, 4, 9 or 16",
                values.len()
            )))
        }
        UniformSpec::Nested(children) => {
            let width = children.first().map_or(0, Vec::len);
            if children.iter().any(|child| child.len() != width) {
                return Err(ConfigError::Invalid(format!(
                    "uniform '{name}' mixes vectors of different lengths"
                )));
            }
            if !matches!(width, 2 | 3 | 4 | 9 | 16) {
                return Err(ConfigError::Invalid(format!(
                    "uniform '{name}' has {width}-component elements; expected 2, 3, 4, 9 or 16"
                )));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn resolve_uniform(name: &str, spec: &UniformSpec, base_dir: &Path) -> Result<UniformValue, ConfigError> {
    let value = match spec {
        UniformSpec::Bool(value) => UniformValue::Bool(*value),
        UniformSpec::Number(value) => UniformValue::Float(*value as f32),
        UniformSpec::Vector(values) => {
            let values: Vec<f32> = values.iter().map(|v| *v as f32).collect();
            UniformValue::from_slice(&values).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "uniform '{name}' has unsupported component count {}",
                    values.len()
                ))
            })?
        }
        UniformSpec::Nested(children) => UniformValue::Array(
            children
                .iter()
                .map(|child| child.iter().map(|v| *v as f32).collect())
                .collect(),
        ),
        UniformSpec::Image { image } => {
            let path = base_dir.join(image);
            let source = ImageSource::open(&path).map_err(|err| ConfigError::Image {
                name: name.to_owned(),
                reason: format!("{err:#}"),
            })?;
            UniformValue::Image(source)
        }
    };
    Ok(value)
}
