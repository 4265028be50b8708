//! Host-element contract.
//!
//! A host is whatever the mount renders into: a DOM element with a canvas
//! child, a native window, or a fake in tests. The mount never owns callbacks;
//! instead the host forwards notifications as [`HostEvent`]s to
//! `ShaderMount::handle_event` and the mount calls back through this trait.

use std::time::Instant;

use crate::gl::GraphicsContext;
use crate::types::ContextOptions;

#[cfg(feature = "winit")]
pub mod window;

/// Stable identity of a host element, used by the attached-mount side table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

/// Handle for an active box-size observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// Handle for a registered viewport/document listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Handle for one scheduled next-repaint callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRequest(pub u64);

/// Observed size of the host element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSize {
    /// Content box in CSS pixels.
    pub css_width: f64,
    pub css_height: f64,
    /// Content box in physical device pixels, when the platform reports it.
    pub device_pixels: Option<(u32, u32)>,
}

impl BoxSize {
    pub fn css(css_width: f64, css_height: f64) -> Self {
        Self {
            css_width,
            css_height,
            device_pixels: None,
        }
    }

    pub fn with_device_pixels(mut self, width: u32, height: u32) -> Self {
        self.device_pixels = Some((width, height));
        self
    }
}

/// Viewport-level scale information sampled at resize time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMetrics {
    pub device_pixel_ratio: f64,
    /// Pinch-zoom scale of the visual viewport; `1.0` when not zoomed.
    pub pinch_zoom: f64,
    /// Outer window width, for zoom heuristics.
    pub outer_width: Option<f64>,
    /// Layout viewport width including scrollbars, for zoom heuristics.
    pub inner_width: Option<f64>,
}

impl Default for ViewportMetrics {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            pinch_zoom: 1.0,
            outer_width: None,
            inner_width: None,
        }
    }
}

/// Listener kinds a mount registers on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// Browser zoom or pinch-zoom changed.
    ViewportZoom,
    /// Document visibility changed.
    Visibility,
}

/// Notifications delivered from the host to a mount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    Resized(BoxSize),
    ZoomChanged,
    VisibilityChanged,
    Frame(FrameRequest),
}

/// Everything the mount needs from its host environment.
pub trait HostElement {
    type Context: GraphicsContext;

    fn element_id(&self) -> ElementId;
    /// False when the element is detached or otherwise unusable.
    fn is_connected(&self) -> bool;
    /// Creates the rendering surface inside the element and returns its
    /// hardware-accelerated context, or `None` when none is available.
    fn create_context(&mut self, options: &ContextOptions) -> Option<Self::Context>;
    /// Resizes the canvas backing store.
    fn set_canvas_size(&mut self, width: u32, height: u32);
    fn remove_canvas(&mut self);

    /// Current box size, if the element has been laid out.
    fn box_size(&self) -> Option<BoxSize>;
    fn viewport(&self) -> ViewportMetrics;
    fn document_hidden(&self) -> bool;

    fn observe_size(&mut self) -> ObserverId;
    fn disconnect_size_observer(&mut self, observer: ObserverId);
    fn add_listener(&mut self, signal: HostSignal) -> ListenerId;
    fn remove_listener(&mut self, listener: ListenerId);

    fn request_frame(&mut self) -> FrameRequest;
    fn cancel_frame(&mut self, request: FrameRequest);
    fn now(&self) -> Instant;

    fn has_stylesheet(&self, id: &str) -> bool;
    fn insert_stylesheet(&mut self, id: &str, css: &str);
}
