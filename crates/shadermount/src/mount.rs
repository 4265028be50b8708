//! Lifecycle Manager and the public mount API.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::compile::{build_program, ShaderProgram, QUAD_VERTEX_COUNT, VERTEX_SHADER};
use crate::error::MountError;
use crate::gl::GraphicsContext;
use crate::host::{
    BoxSize, ElementId, FrameRequest, HostElement, HostEvent, HostSignal, ListenerId, ObserverId,
};
use crate::resize::{BackingStore, ResizeController, ZoomEstimator};
use crate::texture::TextureTable;
use crate::timeline::{LoopCommand, LoopState, RenderLoop};
use crate::types::{MountOptions, Uniforms};
use crate::uniforms::UniformBinder;

/// Identifier of the shared stylesheet inserted by [`ensure_base_styles`].
pub const BASE_STYLES_ID: &str = "shadermount-base-styles";

/// Layout rules shared by every mounted element: the element becomes a
/// stacking context and the canvas fills it behind any other content.
pub const BASE_STYLES: &str = "@layer shadermount {
  :where([data-shader-mount]) {
    isolation: isolate;
    position: relative;
  }
  :where([data-shader-mount]) > canvas {
    contain: strict;
    display: block;
    position: absolute;
    inset: 0;
    z-index: -1;
    width: 100%;
    height: 100%;
    border-radius: inherit;
  }
}
";

static NEXT_MOUNT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static ATTACHED: RefCell<HashMap<ElementId, MountId>> = RefCell::new(HashMap::new());
}

/// Identity of one mount instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountId(u64);

impl MountId {
    fn next() -> Self {
        Self(NEXT_MOUNT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Mount currently attached to `element` on this thread, if any.
pub fn attached_mount(element: ElementId) -> Option<MountId> {
    ATTACHED.with(|attached| attached.borrow().get(&element).copied())
}

fn attach(element: ElementId, mount: MountId) {
    ATTACHED.with(|attached| {
        if let Some(previous) = attached.borrow_mut().insert(element, mount) {
            tracing::warn!(
                ?element,
                ?previous,
                ?mount,
                "element already had a shader mount; dispose the old one first"
            );
        }
    });
}

fn detach(element: ElementId, mount: MountId) {
    ATTACHED.with(|attached| {
        let mut attached = attached.borrow_mut();
        if attached.get(&element) == Some(&mount) {
            attached.remove(&element);
        }
    });
}

/// Inserts [`BASE_STYLES`] into the host document unless already present.
/// Returns whether it was inserted.
pub fn ensure_base_styles<H: HostElement>(host: &mut H) -> bool {
    if host.has_stylesheet(BASE_STYLES_ID) {
        return false;
    }
    host.insert_stylesheet(BASE_STYLES_ID, BASE_STYLES);
    true
}

/// A fragment shader mounted onto a host element.
///
/// Owns the rendering context, the linked program, textures, observers and
/// listeners for that element. Host notifications are fed in through
/// [`ShaderMount::handle_event`]. Dropping the mount disposes it.
pub struct ShaderMount<H: HostElement> {
    id: MountId,
    host: H,
    gl: H::Context,
    program: Option<ShaderProgram<H::Context>>,
    uniforms: UniformBinder<H::Context>,
    textures: TextureTable<H::Context>,
    provided_uniforms: Uniforms,
    resize: ResizeController,
    zoom: Arc<dyn ZoomEstimator>,
    last_box: Option<BoxSize>,
    render_loop: RenderLoop,
    observer: Option<ObserverId>,
    listeners: Vec<ListenerId>,
    disposed: bool,
}

impl<H: HostElement> ShaderMount<H> {
    /// Creates the canvas and context inside `host`, builds the program,
    /// uploads the initial uniforms, and starts observing the host.
    ///
    /// Only a disconnected host or a missing rendering context are fatal.
    /// Shader build failures are logged and leave the mount drawing nothing.
    pub fn new(mut host: H, fragment_source: &str, options: MountOptions) -> Result<Self, MountError> {
        if !host.is_connected() {
            return Err(MountError::HostDisconnected);
        }
        ensure_base_styles(&mut host);

        let Some(gl) = host.create_context(&options.context) else {
            host.remove_canvas();
            return Err(MountError::ContextUnavailable);
        };

        let program = match build_program(&gl, VERTEX_SHADER, fragment_source) {
            Ok(program) => Some(program),
            Err(err) => {
                tracing::error!(error = %err, "failed to build shader program");
                None
            }
        };

        let mut uniforms = UniformBinder::new();
        if let Some(program) = &program {
            uniforms.resolve(&gl, program.program(), &options.uniforms);
        }

        let now = host.now();
        let mut mount = Self {
            id: MountId::next(),
            host,
            gl,
            program,
            uniforms,
            textures: TextureTable::new(options.mipmaps),
            provided_uniforms: options.uniforms,
            resize: ResizeController::new(options.min_pixel_ratio, options.max_pixel_count),
            zoom: options.zoom,
            last_box: None,
            render_loop: RenderLoop::new(options.frame, now),
            observer: None,
            listeners: Vec::new(),
            disposed: false,
        };

        if mount.program.is_some() {
            mount.uniforms.bind_all(
                &mount.gl,
                &mut mount.textures,
                &mount.provided_uniforms,
            );
        }

        mount.observer = Some(mount.host.observe_size());
        mount.listeners = vec![
            mount.host.add_listener(HostSignal::ViewportZoom),
            mount.host.add_listener(HostSignal::Visibility),
        ];
        attach(mount.host.element_id(), mount.id);

        let initial_box = mount.host.box_size();
        if let Some(box_size) = initial_box {
            mount.on_resize(box_size);
        }

        let now = mount.host.now();
        let hidden = mount.host.document_hidden();
        let command = mount.render_loop.set_hidden(hidden, now);
        mount.apply(command);
        let command = mount.render_loop.set_speed(options.speed, now);
        mount.apply(command);

        tracing::debug!(
            mount = ?mount.id,
            element = ?mount.host.element_id(),
            speed = options.speed,
            frame = options.frame,
            has_program = mount.program.is_some(),
            "mounted shader"
        );
        Ok(mount)
    }

    pub fn id(&self) -> MountId {
        self.id
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn context(&self) -> &H::Context {
        &self.gl
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn is_running(&self) -> bool {
        self.render_loop.state() == LoopState::Running
    }

    /// Requested speed; the effective speed is zero while the host is hidden.
    pub fn speed(&self) -> f32 {
        self.render_loop.requested_speed()
    }

    pub fn backing_store(&self) -> Option<BackingStore> {
        self.resize.current()
    }

    pub fn min_pixel_ratio(&self) -> f64 {
        self.resize.min_pixel_ratio()
    }

    pub fn max_pixel_count(&self) -> u64 {
        self.resize.max_pixel_count()
    }

    /// Every uniform supplied so far, initial values merged with updates.
    pub fn provided_uniforms(&self) -> &Uniforms {
        &self.provided_uniforms
    }

    /// Current animation clock in milliseconds.
    pub fn current_frame(&self) -> f64 {
        self.render_loop.clock()
    }

    pub fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Resized(box_size) => self.on_resize(box_size),
            HostEvent::ZoomChanged => self.on_zoom_change(),
            HostEvent::VisibilityChanged => self.on_visibility_change(),
            HostEvent::Frame(request) => self.on_frame(request),
        }
    }

    /// Uploads the changed entries of `uniforms` and re-renders.
    pub fn set_uniforms(&mut self, uniforms: Uniforms) {
        if self.ignore_after_dispose("set_uniforms") {
            return;
        }
        if self.program.is_some() {
            let uploaded = self
                .uniforms
                .bind_all(&self.gl, &mut self.textures, &uniforms);
            tracing::trace!(uploaded, requested = uniforms.len(), "applied uniform update");
        }
        self.provided_uniforms.extend(uniforms);
        self.render(self.host.now());
    }

    pub fn set_speed(&mut self, speed: f32) {
        if self.ignore_after_dispose("set_speed") {
            return;
        }
        let command = self.render_loop.set_speed(speed, self.host.now());
        self.apply(command);
    }

    /// Sets the clock to `frame` milliseconds and renders once.
    pub fn set_frame(&mut self, frame: f64) {
        if self.ignore_after_dispose("set_frame") {
            return;
        }
        let now = self.host.now();
        self.render_loop.set_frame(frame, now);
        self.render(now);
    }

    pub fn set_min_pixel_ratio(&mut self, ratio: f64) {
        if self.ignore_after_dispose("set_min_pixel_ratio") {
            return;
        }
        self.resize.set_min_pixel_ratio(ratio);
        self.refresh_size();
    }

    pub fn set_max_pixel_count(&mut self, count: u64) {
        if self.ignore_after_dispose("set_max_pixel_count") {
            return;
        }
        self.resize.set_max_pixel_count(count);
        self.refresh_size();
    }

    /// Applies a new host box size, resizing and re-rendering only when the
    /// backing store changes.
    pub fn on_resize(&mut self, box_size: BoxSize) {
        if self.ignore_after_dispose("resize") {
            return;
        }
        self.last_box = Some(box_size);
        let viewport = self.host.viewport();
        let previous = self.resize.current();
        let Some(store) = self
            .resize
            .recompute(box_size, &viewport, self.zoom.as_ref())
        else {
            return;
        };

        tracing::debug!(
            from = ?previous.map(|store| (store.width, store.height)),
            width = store.width,
            height = store.height,
            render_scale = store.render_scale,
            "resized backing store"
        );
        self.host.set_canvas_size(store.width, store.height);
        self.gl.viewport(store.width, store.height);
        self.render(self.host.now());
    }

    /// Restarts box-size observation so the next measurement reflects the
    /// new zoom level.
    pub fn on_zoom_change(&mut self) {
        if self.ignore_after_dispose("zoom change") {
            return;
        }
        if let Some(observer) = self.observer.take() {
            self.host.disconnect_size_observer(observer);
        }
        self.observer = Some(self.host.observe_size());
        tracing::debug!("recreated size observer after zoom change");
    }

    pub fn on_visibility_change(&mut self) {
        if self.ignore_after_dispose("visibility change") {
            return;
        }
        let hidden = self.host.document_hidden();
        let command = self.render_loop.set_hidden(hidden, self.host.now());
        self.apply(command);
    }

    /// Next-repaint callback. Requests other than the outstanding one are
    /// ignored.
    pub fn on_frame(&mut self, request: FrameRequest) {
        if self.ignore_after_dispose("frame") {
            return;
        }
        if !self.render_loop.take_due(request) {
            tracing::trace!(?request, "ignoring stale frame callback");
            return;
        }
        self.render(self.host.now());
    }

    /// Releases everything the mount owns. Later calls on the mount are
    /// no-ops.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        if let Some(request) = self.render_loop.stop() {
            self.host.cancel_frame(request);
        }
        let textures = self.textures.len();
        self.textures.release_all(&self.gl);
        if let Some(program) = self.program.take() {
            self.gl.use_program(None);
            program.release(&self.gl);
        }
        self.gl.reset_bindings();
        if let Some(observer) = self.observer.take() {
            self.host.disconnect_size_observer(observer);
        }
        for listener in self.listeners.drain(..) {
            self.host.remove_listener(listener);
        }
        self.uniforms.clear();
        self.host.remove_canvas();
        detach(self.host.element_id(), self.id);

        tracing::debug!(mount = ?self.id, textures, "disposed shader mount");
    }

    fn ignore_after_dispose(&self, operation: &'static str) -> bool {
        if self.disposed {
            tracing::trace!(operation, "ignoring call on disposed mount");
        }
        self.disposed
    }

    fn refresh_size(&mut self) {
        if let Some(box_size) = self.last_box.or_else(|| self.host.box_size()) {
            self.on_resize(box_size);
        }
    }

    fn apply(&mut self, command: LoopCommand) {
        match command {
            LoopCommand::Schedule => {
                let request = self.host.request_frame();
                self.render_loop.mark_scheduled(request);
            }
            LoopCommand::Cancel(request) => self.host.cancel_frame(request),
            LoopCommand::Idle => {}
        }
    }

    fn render(&mut self, now: Instant) {
        let Some(program) = self.program.as_ref() else {
            tracing::warn!("no shader program; skipping render");
            return;
        };

        let clock = self.render_loop.advance(now);
        self.gl.clear();
        self.gl.use_program(Some(program.program()));
        self.uniforms.upload_time(&self.gl, (clock * 0.001) as f32);
        if let Some(store) = self.resize.current() {
            if self.resize.take_resolution_dirty() {
                self.uniforms
                    .upload_resolution(&self.gl, store.width, store.height, store.render_scale);
            }
        }
        self.gl.draw_triangles(QUAD_VERTEX_COUNT);

        if self.render_loop.effective_speed() != 0.0 {
            if let Some(outstanding) = self.render_loop.stop() {
                self.host.cancel_frame(outstanding);
            }
            let request = self.host.request_frame();
            self.render_loop.mark_scheduled(request);
        }
    }
}

impl<H: HostElement> Drop for ShaderMount<H> {
    fn drop(&mut self) {
        self.dispose();
    }
}
