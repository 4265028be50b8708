//! Shader mount for fragment-shader backgrounds.
//!
//! A [`ShaderMount`] attaches one fragment shader to one host element, keeps
//! the canvas backing store sized to the element, pushes uniforms, and drives
//! the animation clock. The flow for a single frame is:
//!
//! ```text
//!   host (DOM element / winit window)
//!          │ HostEvent::{Resized, ZoomChanged, VisibilityChanged, Frame}
//!          ▼
//!   ShaderMount::handle_event ──▶ ResizeController ──▶ canvas + viewport
//!          │
//!          └─▶ RenderLoop::advance ──▶ UniformBinder (u_time, u_resolution,
//!                                         u_pixelRatio, user uniforms)
//!                                              │
//!                                              └─▶ one draw of the quad
//! ```
//!
//! Rendering goes through the GL-shaped [`GraphicsContext`] trait (with a
//! `glow` implementation behind the `glow` feature) and the host environment
//! through [`HostElement`] (with a `winit` implementation behind the `winit`
//! feature). Everything runs on the host's UI thread.

pub mod compile;
pub mod error;
pub mod gl;
pub mod host;
pub mod mount;
pub mod resize;
pub mod timeline;
pub mod types;
pub mod uniforms;

mod texture;

#[cfg(test)]
mod testing;

pub use compile::{build_program, ShaderProgram, VERTEX_SHADER};
pub use error::{BuildError, MountError, UniformError};
pub use gl::GraphicsContext;
#[cfg(feature = "glow")]
pub use gl::GlowContext;
pub use host::{BoxSize, ElementId, FrameRequest, HostElement, HostEvent, ViewportMetrics};
#[cfg(feature = "winit")]
pub use host::window::WindowHost;
pub use mount::{attached_mount, ensure_base_styles, MountId, ShaderMount, BASE_STYLES};
pub use resize::{BackingStore, NoZoomCorrection, WindowWidthZoom, ZoomEstimator};
pub use timeline::LoopState;
pub use types::{
    ContextOptions, ImageSource, MountOptions, PowerPreference, UniformShape, UniformValue,
    Uniforms, DEFAULT_MAX_PIXEL_COUNT, DEFAULT_MIN_PIXEL_RATIO,
};
