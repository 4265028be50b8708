//! Native host backed by a `winit` window.
//!
//! The window's client area plays the role of the host element: its physical
//! inner size is the device-pixel box, the scale factor is the device pixel
//! ratio, and occlusion stands in for document visibility. The caller creates
//! the GL context and surface (for instance with glutin) and hands the context
//! over; `WindowHost` forwards window events to the mount through
//! [`WindowHost::translate`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::window::{Window, WindowId};

use crate::gl::GraphicsContext;
use crate::host::{
    BoxSize, ElementId, FrameRequest, HostElement, HostEvent, HostSignal, ListenerId, ObserverId,
    ViewportMetrics,
};
use crate::types::ContextOptions;

/// Box size of a client area of `size` physical pixels at `scale_factor`.
pub fn box_size_for(size: PhysicalSize<u32>, scale_factor: f64) -> BoxSize {
    let scale = if scale_factor > 0.0 { scale_factor } else { 1.0 };
    BoxSize::css(
        f64::from(size.width) / scale,
        f64::from(size.height) / scale,
    )
    .with_device_pixels(size.width, size.height)
}

/// Observation and scheduling state, kept apart from the window so it can be
/// driven without a display.
#[derive(Debug, Default)]
pub(crate) struct WindowSignals {
    next_handle: u64,
    observer: Option<ObserverId>,
    listeners: Vec<(ListenerId, HostSignal)>,
    pending_frame: Option<FrameRequest>,
    occluded: bool,
}

impl WindowSignals {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn listens(&self, signal: HostSignal) -> bool {
        self.listeners.iter().any(|(_, active)| *active == signal)
    }

    fn observe(&mut self) -> ObserverId {
        let observer = ObserverId(self.next_handle());
        self.observer = Some(observer);
        observer
    }

    fn disconnect(&mut self, observer: ObserverId) {
        if self.observer == Some(observer) {
            self.observer = None;
        }
    }

    fn add_listener(&mut self, signal: HostSignal) -> ListenerId {
        let listener = ListenerId(self.next_handle());
        self.listeners.push((listener, signal));
        listener
    }

    fn remove_listener(&mut self, listener: ListenerId) {
        self.listeners.retain(|(active, _)| *active != listener);
    }

    fn request_frame(&mut self) -> FrameRequest {
        let request = FrameRequest(self.next_handle());
        self.pending_frame = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending_frame == Some(request) {
            self.pending_frame = None;
        }
    }

    pub(crate) fn translate(&mut self, event: &WindowEvent, scale_factor: f64) -> Option<HostEvent> {
        match event {
            WindowEvent::Resized(size) if self.observer.is_some() => {
                Some(HostEvent::Resized(box_size_for(*size, scale_factor)))
            }
            WindowEvent::ScaleFactorChanged { .. } if self.listens(HostSignal::ViewportZoom) => {
                Some(HostEvent::ZoomChanged)
            }
            WindowEvent::Occluded(occluded) => {
                self.occluded = *occluded;
                self.listens(HostSignal::Visibility)
                    .then_some(HostEvent::VisibilityChanged)
            }
            WindowEvent::RedrawRequested => self.pending_frame.take().map(HostEvent::Frame),
            _ => None,
        }
    }
}

/// [`HostElement`] over a `winit` window and a caller-created context.
pub struct WindowHost<G: GraphicsContext> {
    window: Arc<Window>,
    context: Option<G>,
    surface_size: Option<PhysicalSize<u32>>,
    signals: WindowSignals,
    stylesheets: HashSet<String>,
}

impl<G: GraphicsContext> WindowHost<G> {
    /// `context` must be current on the calling thread and target `window`.
    pub fn new(window: Arc<Window>, context: G) -> Self {
        Self {
            window,
            context: Some(context),
            surface_size: None,
            signals: WindowSignals::default(),
            stylesheets: HashSet::new(),
        }
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Backing-store size chosen by the mount; the GL surface should be
    /// resized to match before the next swap.
    pub fn surface_size(&self) -> Option<PhysicalSize<u32>> {
        self.surface_size
    }

    /// Converts a window event into the notification the mount expects.
    ///
    /// `RedrawRequested` only yields a frame when the mount asked for one;
    /// redraws requested by the platform return `None`, and the caller can
    /// repaint with `mount.set_frame(mount.current_frame())`.
    pub fn translate(&mut self, event: &WindowEvent) -> Option<HostEvent> {
        let scale_factor = self.window.scale_factor();
        self.signals.translate(event, scale_factor)
    }
}

impl<G: GraphicsContext> HostElement for WindowHost<G> {
    type Context = G;

    fn element_id(&self) -> ElementId {
        ElementId(u64::from(self.window.id()))
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn create_context(&mut self, options: &ContextOptions) -> Option<G> {
        tracing::debug!(?options, "handing pre-created context to mount");
        self.context.take()
    }

    fn set_canvas_size(&mut self, width: u32, height: u32) {
        self.surface_size = Some(PhysicalSize::new(width, height));
    }

    fn remove_canvas(&mut self) {
        self.surface_size = None;
    }

    fn box_size(&self) -> Option<BoxSize> {
        let size = self.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return None;
        }
        Some(box_size_for(size, self.window.scale_factor()))
    }

    fn viewport(&self) -> ViewportMetrics {
        ViewportMetrics {
            device_pixel_ratio: self.window.scale_factor(),
            ..ViewportMetrics::default()
        }
    }

    fn document_hidden(&self) -> bool {
        self.signals.occluded || self.window.is_minimized() == Some(true)
    }

    fn observe_size(&mut self) -> ObserverId {
        self.signals.observe()
    }

    fn disconnect_size_observer(&mut self, observer: ObserverId) {
        self.signals.disconnect(observer);
    }

    fn add_listener(&mut self, signal: HostSignal) -> ListenerId {
        self.signals.add_listener(signal)
    }

    fn remove_listener(&mut self, listener: ListenerId) {
        self.signals.remove_listener(listener);
    }

    fn request_frame(&mut self) -> FrameRequest {
        let request = self.signals.request_frame();
        self.window.request_redraw();
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        self.signals.cancel_frame(request);
    }

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn has_stylesheet(&self, id: &str) -> bool {
        self.stylesheets.contains(id)
    }

    fn insert_stylesheet(&mut self, id: &str, _css: &str) {
        self.stylesheets.insert(id.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_size_carries_device_pixels() {
        let size = box_size_for(PhysicalSize::new(2560, 1440), 2.0);
        assert_eq!(size.css_width, 1280.0);
        assert_eq!(size.css_height, 720.0);
        assert_eq!(size.device_pixels, Some((2560, 1440)));
    }

    #[test]
    fn resize_events_need_an_observer() {
        let mut signals = WindowSignals::default();
        let event = WindowEvent::Resized(PhysicalSize::new(800, 600));
        assert_eq!(signals.translate(&event, 1.0), None);
        let observer = signals.observe();
        assert!(matches!(
            signals.translate(&event, 1.0),
            Some(HostEvent::Resized(size)) if size.device_pixels == Some((800, 600))
        ));
        signals.disconnect(observer);
        assert_eq!(signals.translate(&event, 1.0), None);
    }

    #[test]
    fn occlusion_updates_visibility() {
        let mut signals = WindowSignals::default();
        signals.add_listener(HostSignal::Visibility);
        assert_eq!(
            signals.translate(&WindowEvent::Occluded(true), 1.0),
            Some(HostEvent::VisibilityChanged)
        );
        assert!(signals.occluded);
    }

    #[test]
    fn redraw_delivers_only_requested_frames() {
        let mut signals = WindowSignals::default();
        assert_eq!(signals.translate(&WindowEvent::RedrawRequested, 1.0), None);
        let request = signals.request_frame();
        assert_eq!(
            signals.translate(&WindowEvent::RedrawRequested, 1.0),
            Some(HostEvent::Frame(request))
        );
        assert_eq!(signals.translate(&WindowEvent::RedrawRequested, 1.0), None);

        let cancelled = signals.request_frame();
        signals.cancel_frame(cancelled);
        assert_eq!(signals.translate(&WindowEvent::RedrawRequested, 1.0), None);
    }
}
