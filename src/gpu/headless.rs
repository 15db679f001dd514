//! Recording driver with no device behind it. Every call is appended to a
//! shared log so callers can assert on upload, bind and draw traffic.

use super::*;
use anyhow::anyhow;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    GenTexture(TextureId),
    BindTexture(TextureId),
    DeleteTexture(TextureId),
    TexImage { width: u32, height: u32 },
    TexFilter(Filter, Filter),
    TexWrap(Wrap, Wrap),
    GenBuffer(BufferId),
    BindBuffer(BufferTarget, Option<BufferId>),
    DeleteBuffer(BufferId),
    BufferData { target: BufferTarget, len: usize },
    BufferSubData { target: BufferTarget, offset: usize, len: usize },
    CreateProgram(ProgramId),
    CompileShader(ShaderStage),
    LinkProgram(ProgramId),
    UseProgram(ProgramId),
    DeleteProgram(ProgramId),
    UniformMatrix4(UniformLocation),
    Uniform4f(UniformLocation, [f32; 4]),
    Uniform1i(UniformLocation, i32),
    EnableAttrib(AttribLocation),
    DisableAttrib(AttribLocation),
    AttribPointer { location: AttribLocation, components: u32, stride: u32, offset: u32 },
    DrawElements { count: u32, first: u32 },
    ScissorTest(bool),
    Scissor(ScissorRect),
    Blend(BlendMode),
    Clear([f32; 4]),
    Present,
}

#[derive(Debug, Default)]
struct HeadlessState {
    calls: Vec<GpuCall>,
    context_id: u64,
    next_id: u32,
    link_error: Option<String>,
    textures: HashSet<u32>,
    buffers: HashSet<u32>,
}

impl HeadlessState {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Inspection side of a [`HeadlessDriver`], usable after the driver has been
/// moved into a `Graphics` context.
#[derive(Debug, Clone, Default)]
pub struct HeadlessHandle(Arc<Mutex<HeadlessState>>);

impl HeadlessHandle {
    fn lock(&self) -> MutexGuard<'_, HeadlessState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn calls(&self) -> Vec<GpuCall> {
        self.lock().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&GpuCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn live_textures(&self) -> usize {
        self.lock().textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.lock().buffers.len()
    }

    /// Simulates the platform destroying the context: all handles vanish
    /// and the context id changes.
    pub fn lose_context(&self) {
        let mut state = self.lock();
        state.context_id += 1;
        state.textures.clear();
        state.buffers.clear();
    }
}

#[derive(Debug, Default)]
pub struct HeadlessDriver {
    handle: HeadlessHandle,
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A driver whose program links always fail with `message`.
    pub fn failing_link(message: &str) -> Self {
        let driver = Self::default();
        driver.handle.lock().link_error = Some(message.to_string());
        driver
    }

    pub fn handle(&self) -> HeadlessHandle {
        self.handle.clone()
    }

    fn record(&mut self, call: GpuCall) {
        log::trace!("gpu: {call:?}");
        self.handle.lock().calls.push(call);
    }
}

impl GpuDriver for HeadlessDriver {
    fn context_id(&self) -> u64 {
        self.handle.lock().context_id
    }

    fn gen_texture(&mut self) -> TextureId {
        let id = {
            let mut state = self.handle.lock();
            let id = state.next();
            state.textures.insert(id);
            TextureId(id)
        };
        self.record(GpuCall::GenTexture(id));
        id
    }

    fn bind_texture(&mut self, id: TextureId) {
        self.record(GpuCall::BindTexture(id));
    }

    fn delete_texture(&mut self, id: TextureId) {
        self.handle.lock().textures.remove(&id.0);
        self.record(GpuCall::DeleteTexture(id));
    }

    fn tex_image_2d(&mut self, width: u32, height: u32, _format: PixelFormat, _pixels: &[u8]) {
        self.record(GpuCall::TexImage { width, height });
    }

    fn tex_filter(&mut self, min: Filter, mag: Filter) {
        self.record(GpuCall::TexFilter(min, mag));
    }

    fn tex_wrap(&mut self, s: Wrap, t: Wrap) {
        self.record(GpuCall::TexWrap(s, t));
    }

    fn gen_buffer(&mut self) -> BufferId {
        let id = {
            let mut state = self.handle.lock();
            let id = state.next();
            state.buffers.insert(id);
            BufferId(id)
        };
        self.record(GpuCall::GenBuffer(id));
        id
    }

    fn bind_buffer(&mut self, target: BufferTarget, id: Option<BufferId>) {
        self.record(GpuCall::BindBuffer(target, id));
    }

    fn delete_buffer(&mut self, id: BufferId) {
        self.handle.lock().buffers.remove(&id.0);
        self.record(GpuCall::DeleteBuffer(id));
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) {
        self.record(GpuCall::BufferData {
            target,
            len: data.len(),
        });
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.record(GpuCall::BufferSubData {
            target,
            offset,
            len: data.len(),
        });
    }

    fn create_program(&mut self) -> ProgramId {
        let id = ProgramId(self.handle.lock().next());
        self.record(GpuCall::CreateProgram(id));
        id
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> anyhow::Result<ShaderId> {
        self.record(GpuCall::CompileShader(stage));
        if source.trim().is_empty() {
            return Err(anyhow!("empty {stage:?} shader source"));
        }
        Ok(ShaderId(self.handle.lock().next()))
    }

    fn attach_shader(&mut self, _program: ProgramId, _shader: ShaderId) {}

    fn delete_shader(&mut self, _shader: ShaderId) {}

    fn link_program(&mut self, program: ProgramId) -> anyhow::Result<()> {
        self.record(GpuCall::LinkProgram(program));
        match self.handle.lock().link_error.clone() {
            Some(message) => Err(anyhow!(message)),
            None => Ok(()),
        }
    }

    fn use_program(&mut self, program: ProgramId) {
        self.record(GpuCall::UseProgram(program));
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.record(GpuCall::DeleteProgram(program));
    }

    fn attrib_location(&mut self, _program: ProgramId, name: &str) -> Option<AttribLocation> {
        match name {
            "aXY" => Some(AttribLocation(0)),
            "aUV" => Some(AttribLocation(1)),
            _ => None,
        }
    }

    fn uniform_location(&mut self, _program: ProgramId, name: &str) -> Option<UniformLocation> {
        match name {
            "uCamera" => Some(UniformLocation(0)),
            "uModel" => Some(UniformLocation(1)),
            "uColorM" => Some(UniformLocation(2)),
            "uColorA" => Some(UniformLocation(3)),
            "uTex" => Some(UniformLocation(4)),
            _ => None,
        }
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, _value: &[f32; 16]) {
        self.record(GpuCall::UniformMatrix4(location));
    }

    fn uniform4f(&mut self, location: UniformLocation, value: [f32; 4]) {
        self.record(GpuCall::Uniform4f(location, value));
    }

    fn uniform1i(&mut self, location: UniformLocation, value: i32) {
        self.record(GpuCall::Uniform1i(location, value));
    }

    fn enable_vertex_attrib(&mut self, location: AttribLocation) {
        self.record(GpuCall::EnableAttrib(location));
    }

    fn disable_vertex_attrib(&mut self, location: AttribLocation) {
        self.record(GpuCall::DisableAttrib(location));
    }

    fn vertex_attrib_pointer(&mut self, location: AttribLocation, components: u32, stride: u32, offset: u32) {
        self.record(GpuCall::AttribPointer {
            location,
            components,
            stride,
            offset,
        });
    }

    fn draw_elements(&mut self, count: u32, first: u32) {
        self.record(GpuCall::DrawElements { count, first });
    }

    fn set_scissor_test(&mut self, enabled: bool) {
        self.record(GpuCall::ScissorTest(enabled));
    }

    fn scissor(&mut self, rect: ScissorRect) {
        self.record(GpuCall::Scissor(rect));
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.record(GpuCall::Blend(mode));
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.record(GpuCall::Clear(color));
    }

    fn present(&mut self) -> anyhow::Result<()> {
        self.record(GpuCall::Present);
        Ok(())
    }
}
