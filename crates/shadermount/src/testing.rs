//! Recording graphics context and scriptable host used by unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::gl::{
    FloatPrecision, GraphicsContext, PrecisionFormat, ShaderStage, TextureParameter, NO_ERROR,
};
use crate::host::{
    BoxSize, ElementId, FrameRequest, HostElement, HostSignal, ListenerId, ObserverId,
    ViewportMetrics,
};
use crate::types::ContextOptions;

pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// One call issued against [`RecordingContext`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum GlCall {
    CompileShader { stage: ShaderStage },
    DeleteShader(u32),
    CreateProgram,
    LinkProgram,
    UseProgram(Option<u32>),
    DeleteProgram(u32),
    CreateBuffer,
    UploadVertices { bytes: usize },
    BindVertexAttrib { index: u32, components: i32 },
    DeleteBuffer(u32),
    Uniform { name: String, kind: UniformKind, values: Vec<f32> },
    CreateTexture(u32),
    ActiveTexture(u32),
    BindTexture(Option<u32>),
    TexParameter(TextureParameter),
    TexImage { width: u32, height: u32 },
    GenerateMipmap,
    DeleteTexture(u32),
    Viewport { width: u32, height: u32 },
    Clear,
    Draw { vertex_count: i32 },
    ResetBindings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UniformKind {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

#[derive(Debug)]
struct GlState {
    calls: Vec<GlCall>,
    next_handle: u32,
    shaders: HashMap<u32, ShaderStage>,
    programs: HashSet<u32>,
    buffers: HashSet<u32>,
    textures: HashSet<u32>,
    sources: Vec<String>,
    shader_logs: HashMap<u32, String>,
    mediump_precision: Option<i32>,
    compile_failure: Option<(ShaderStage, String)>,
    link_failure: Option<String>,
    missing_uniforms: HashSet<String>,
    errors: VecDeque<u32>,
}

impl Default for GlState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            next_handle: 1,
            shaders: HashMap::new(),
            programs: HashSet::new(),
            buffers: HashSet::new(),
            textures: HashSet::new(),
            sources: Vec::new(),
            shader_logs: HashMap::new(),
            mediump_precision: Some(23),
            compile_failure: None,
            link_failure: None,
            missing_uniforms: HashSet::new(),
            errors: VecDeque::new(),
        }
    }
}

impl GlState {
    fn handle(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }
}

/// `GraphicsContext` that records calls and hands out integer handles.
///
/// Clones share state, so a test can keep one while the mount owns another.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingContext {
    state: Rc<RefCell<GlState>>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mediump_precision(&self, bits: Option<i32>) {
        self.state.borrow_mut().mediump_precision = bits;
    }

    pub fn fail_compile(&self, stage: ShaderStage, log: &str) {
        self.state.borrow_mut().compile_failure = Some((stage, log.to_owned()));
    }

    pub fn fail_link(&self, log: &str) {
        self.state.borrow_mut().link_failure = Some(log.to_owned());
    }

    /// Makes `name` resolve to no location.
    pub fn hide_uniform(&self, name: &str) {
        self.state.borrow_mut().missing_uniforms.insert(name.to_owned());
    }

    /// Queues an error code returned by the next `error_code` call.
    pub fn push_error(&self, code: u32) {
        self.state.borrow_mut().errors.push_back(code);
    }

    pub fn calls(&self) -> Vec<GlCall> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn count(&self, predicate: impl Fn(&GlCall) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn compiled_sources(&self) -> Vec<String> {
        self.state.borrow().sources.clone()
    }

    /// Values uploaded to uniform `name`, oldest first.
    pub fn uploads(&self, name: &str) -> Vec<(UniformKind, Vec<f32>)> {
        self.state
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                GlCall::Uniform {
                    name: uploaded,
                    kind,
                    values,
                } if uploaded == name => Some((*kind, values.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn draws(&self) -> usize {
        self.count(|call| matches!(call, GlCall::Draw { .. }))
    }

    pub fn live_shaders(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.state.borrow().textures.len()
    }

    fn record(&self, call: GlCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn uniform(&self, name: &str, kind: UniformKind, values: &[f32]) {
        self.record(GlCall::Uniform {
            name: name.to_owned(),
            kind,
            values: values.to_vec(),
        });
    }
}

impl GraphicsContext for RecordingContext {
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type Texture = u32;
    type UniformLocation = String;

    fn shader_precision(
        &self,
        stage: ShaderStage,
        precision: FloatPrecision,
    ) -> Option<PrecisionFormat> {
        match (stage, precision) {
            (ShaderStage::Fragment, FloatPrecision::Medium) => self
                .state
                .borrow()
                .mediump_precision
                .map(|bits| PrecisionFormat {
                    range_min: 15,
                    range_max: 15,
                    precision: bits,
                }),
            _ => Some(PrecisionFormat {
                range_min: 127,
                range_max: 127,
                precision: 23,
            }),
        }
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let handle = state.handle();
        state.shaders.insert(handle, stage);
        Ok(handle)
    }

    fn compile_shader(&self, shader: &u32, source: &str) -> bool {
        let mut state = self.state.borrow_mut();
        let stage = state.shaders[shader];
        state.sources.push(source.to_owned());
        state.calls.push(GlCall::CompileShader { stage });
        match state.compile_failure.clone() {
            Some((failing, log)) if failing == stage => {
                state.shader_logs.insert(*shader, log);
                false
            }
            _ => true,
        }
    }

    fn shader_info_log(&self, shader: &u32) -> String {
        self.state
            .borrow()
            .shader_logs
            .get(shader)
            .cloned()
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: u32) {
        let mut state = self.state.borrow_mut();
        state.shaders.remove(&shader);
        state.calls.push(GlCall::DeleteShader(shader));
    }

    fn create_program(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let handle = state.handle();
        state.programs.insert(handle);
        state.calls.push(GlCall::CreateProgram);
        Ok(handle)
    }

    fn attach_shader(&self, _program: &u32, _shader: &u32) {}

    fn detach_shader(&self, _program: &u32, _shader: &u32) {}

    fn link_program(&self, _program: &u32) -> bool {
        let mut state = self.state.borrow_mut();
        state.calls.push(GlCall::LinkProgram);
        state.link_failure.is_none()
    }

    fn program_info_log(&self, _program: &u32) -> String {
        self.state.borrow().link_failure.clone().unwrap_or_default()
    }

    fn use_program(&self, program: Option<&u32>) {
        self.record(GlCall::UseProgram(program.copied()));
    }

    fn delete_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        state.programs.remove(&program);
        state.calls.push(GlCall::DeleteProgram(program));
    }

    fn attrib_location(&self, _program: &u32, _name: &str) -> Option<u32> {
        Some(0)
    }

    fn create_buffer(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let handle = state.handle();
        state.buffers.insert(handle);
        state.calls.push(GlCall::CreateBuffer);
        Ok(handle)
    }

    fn upload_vertices(&self, _buffer: &u32, data: &[u8]) {
        self.record(GlCall::UploadVertices { bytes: data.len() });
    }

    fn bind_vertex_attrib(&self, index: u32, _buffer: &u32, components: i32) {
        self.record(GlCall::BindVertexAttrib { index, components });
    }

    fn delete_buffer(&self, buffer: u32) {
        let mut state = self.state.borrow_mut();
        state.buffers.remove(&buffer);
        state.calls.push(GlCall::DeleteBuffer(buffer));
    }

    fn uniform_location(&self, _program: &u32, name: &str) -> Option<String> {
        if self.state.borrow().missing_uniforms.contains(name) {
            None
        } else {
            Some(name.to_owned())
        }
    }

    fn uniform_1_f32(&self, location: &String, value: f32) {
        self.uniform(location, UniformKind::Float, &[value]);
    }

    fn uniform_1_i32(&self, location: &String, value: i32) {
        self.uniform(location, UniformKind::Int, &[value as f32]);
    }

    fn uniform_2_f32_slice(&self, location: &String, values: &[f32]) {
        self.uniform(location, UniformKind::Vec2, values);
    }

    fn uniform_3_f32_slice(&self, location: &String, values: &[f32]) {
        self.uniform(location, UniformKind::Vec3, values);
    }

    fn uniform_4_f32_slice(&self, location: &String, values: &[f32]) {
        self.uniform(location, UniformKind::Vec4, values);
    }

    fn uniform_matrix_3_f32_slice(&self, location: &String, values: &[f32]) {
        self.uniform(location, UniformKind::Mat3, values);
    }

    fn uniform_matrix_4_f32_slice(&self, location: &String, values: &[f32]) {
        self.uniform(location, UniformKind::Mat4, values);
    }

    fn create_texture(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let handle = state.handle();
        state.textures.insert(handle);
        state.calls.push(GlCall::CreateTexture(handle));
        Ok(handle)
    }

    fn active_texture(&self, unit: u32) {
        self.record(GlCall::ActiveTexture(unit));
    }

    fn bind_texture(&self, texture: Option<&u32>) {
        self.record(GlCall::BindTexture(texture.copied()));
    }

    fn tex_parameter(&self, parameter: TextureParameter) {
        self.record(GlCall::TexParameter(parameter));
    }

    fn tex_image_rgba8(&self, width: u32, height: u32, pixels: &[u8]) {
        assert_eq!(pixels.len(), (width * height * 4) as usize);
        self.record(GlCall::TexImage { width, height });
    }

    fn generate_mipmap(&self) {
        self.record(GlCall::GenerateMipmap);
    }

    fn delete_texture(&self, texture: u32) {
        let mut state = self.state.borrow_mut();
        state.textures.remove(&texture);
        state.calls.push(GlCall::DeleteTexture(texture));
    }

    fn error_code(&self) -> u32 {
        self.state.borrow_mut().errors.pop_front().unwrap_or(NO_ERROR)
    }

    fn viewport(&self, width: u32, height: u32) {
        self.record(GlCall::Viewport { width, height });
    }

    fn clear(&self) {
        self.record(GlCall::Clear);
    }

    fn draw_triangles(&self, vertex_count: i32) {
        self.record(GlCall::Draw { vertex_count });
    }

    fn reset_bindings(&self) {
        self.record(GlCall::ResetBindings);
    }
}

/// Inspectable state behind a [`FakeHost`].
#[derive(Debug)]
pub(crate) struct HostState {
    pub connected: bool,
    pub context_available: bool,
    pub context_requests: Vec<ContextOptions>,
    pub canvas: Option<(u32, u32)>,
    pub canvas_resizes: usize,
    pub canvas_removed: bool,
    pub box_size: Option<BoxSize>,
    pub viewport: ViewportMetrics,
    pub hidden: bool,
    pub observers: Vec<ObserverId>,
    pub observers_created: usize,
    pub listeners: Vec<(ListenerId, HostSignal)>,
    pub pending_frames: Vec<FrameRequest>,
    pub cancelled_frames: Vec<FrameRequest>,
    pub now: Instant,
    pub stylesheets: BTreeMap<String, String>,
    next_id: u64,
}

impl HostState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Host double with a 400×300 CSS box at pixel ratio 1.
#[derive(Debug, Clone)]
pub(crate) struct FakeHost {
    id: ElementId,
    gl: RecordingContext,
    state: Rc<RefCell<HostState>>,
}

impl FakeHost {
    pub fn new(id: u64) -> Self {
        let state = HostState {
            connected: true,
            context_available: true,
            context_requests: Vec::new(),
            canvas: None,
            canvas_resizes: 0,
            canvas_removed: false,
            box_size: Some(BoxSize::css(400.0, 300.0)),
            viewport: ViewportMetrics::default(),
            hidden: false,
            observers: Vec::new(),
            observers_created: 0,
            listeners: Vec::new(),
            pending_frames: Vec::new(),
            cancelled_frames: Vec::new(),
            now: Instant::now(),
            stylesheets: BTreeMap::new(),
            next_id: 0,
        };
        Self {
            id: ElementId(id),
            gl: RecordingContext::new(),
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn gl(&self) -> RecordingContext {
        self.gl.clone()
    }

    pub fn state(&self) -> std::cell::RefMut<'_, HostState> {
        self.state.borrow_mut()
    }

    pub fn advance(&self, millis: u64) {
        self.state.borrow_mut().now += Duration::from_millis(millis);
    }

    /// Most recent outstanding frame request.
    pub fn pending_frame(&self) -> Option<FrameRequest> {
        self.state.borrow().pending_frames.last().copied()
    }

    /// Removes the oldest outstanding request, as the host does when it fires.
    pub fn take_frame(&self) -> Option<FrameRequest> {
        let mut state = self.state.borrow_mut();
        if state.pending_frames.is_empty() {
            None
        } else {
            Some(state.pending_frames.remove(0))
        }
    }
}

impl HostElement for FakeHost {
    type Context = RecordingContext;

    fn element_id(&self) -> ElementId {
        self.id
    }

    fn is_connected(&self) -> bool {
        self.state.borrow().connected
    }

    fn create_context(&mut self, options: &ContextOptions) -> Option<RecordingContext> {
        let mut state = self.state.borrow_mut();
        state.context_requests.push(*options);
        state.canvas = Some((300, 150));
        state.context_available.then(|| self.gl.clone())
    }

    fn set_canvas_size(&mut self, width: u32, height: u32) {
        let mut state = self.state.borrow_mut();
        state.canvas = Some((width, height));
        state.canvas_resizes += 1;
    }

    fn remove_canvas(&mut self) {
        let mut state = self.state.borrow_mut();
        state.canvas = None;
        state.canvas_removed = true;
    }

    fn box_size(&self) -> Option<BoxSize> {
        self.state.borrow().box_size
    }

    fn viewport(&self) -> ViewportMetrics {
        self.state.borrow().viewport
    }

    fn document_hidden(&self) -> bool {
        self.state.borrow().hidden
    }

    fn observe_size(&mut self) -> ObserverId {
        let mut state = self.state.borrow_mut();
        let observer = ObserverId(state.next_id());
        state.observers.push(observer);
        state.observers_created += 1;
        observer
    }

    fn disconnect_size_observer(&mut self, observer: ObserverId) {
        self.state
            .borrow_mut()
            .observers
            .retain(|active| *active != observer);
    }

    fn add_listener(&mut self, signal: HostSignal) -> ListenerId {
        let mut state = self.state.borrow_mut();
        let listener = ListenerId(state.next_id());
        state.listeners.push((listener, signal));
        listener
    }

    fn remove_listener(&mut self, listener: ListenerId) {
        self.state
            .borrow_mut()
            .listeners
            .retain(|(active, _)| *active != listener);
    }

    fn request_frame(&mut self) -> FrameRequest {
        let mut state = self.state.borrow_mut();
        let request = FrameRequest(state.next_id());
        state.pending_frames.push(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        let mut state = self.state.borrow_mut();
        state.pending_frames.retain(|pending| *pending != request);
        state.cancelled_frames.push(request);
    }

    fn now(&self) -> Instant {
        self.state.borrow().now
    }

    fn has_stylesheet(&self, id: &str) -> bool {
        self.state.borrow().stylesheets.contains_key(id)
    }

    fn insert_stylesheet(&mut self, id: &str, css: &str) {
        self.state
            .borrow_mut()
            .stylesheets
            .insert(id.to_owned(), css.to_owned());
    }
}
