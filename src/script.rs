use crate::camera::Camera;
use crate::gpu::{
    AttribLocation, BufferId, BufferTarget, Gpu, ProgramId, ScissorRect, ShaderStage,
    UniformLocation,
};
use crate::graphics::Screen;
use crate::matrix::Matrix;
use crate::vertex::{self, VertexDataset, INDICES_PER_QUAD};
use anyhow::{anyhow, Context};
use std::sync::Arc;
use tessera_game_core::ErrorReporter;

const VERTEX_SHADER: &str = include_str!("../shaders/quad_vert.wgsl");
const FRAGMENT_SHADER: &str = include_str!("../shaders/quad_frag.wgsl");

/// Floats between consecutive vertices: x, y, u, v.
const STRIDE: u32 = 4;

#[derive(Debug, Clone, Copy)]
struct Uniforms {
    camera: Option<UniformLocation>,
    model: Option<UniformLocation>,
    tex: Option<UniformLocation>,
    color_m: Option<UniformLocation>,
    color_a: Option<UniformLocation>,
}

/// The quad shader program plus the render state it owns: uniform and
/// attribute locations, the shared index buffer and the last camera bound.
///
/// One instance lives per graphics context. Link failures are reported, not
/// raised; draws through an unlinked program are left to the driver.
pub struct Script {
    program: ProgramId,
    uniforms: Uniforms,
    a_xy: Option<AttribLocation>,
    a_uv: Option<AttribLocation>,
    indices: BufferId,
    last_camera: Option<Arc<Camera>>,
}

impl Script {
    /// Compiles, links and activates the program.
    pub fn new(gpu: &mut Gpu, reporter: &dyn ErrorReporter) -> Self {
        let driver = gpu.driver();
        let program = driver.create_program();
        if let Err(err) = build_program(gpu, program) {
            reporter.report("shader program", &err);
        }

        let driver = gpu.driver();
        let uniforms = Uniforms {
            camera: driver.uniform_location(program, "uCamera"),
            model: driver.uniform_location(program, "uModel"),
            tex: driver.uniform_location(program, "uTex"),
            color_m: driver.uniform_location(program, "uColorM"),
            color_a: driver.uniform_location(program, "uColorA"),
        };
        let a_xy = driver.attrib_location(program, "aXY");
        let a_uv = driver.attrib_location(program, "aUV");

        let indices = driver.gen_buffer();
        let index_data = vertex::quad_indices();
        driver.bind_buffer(BufferTarget::Index, Some(indices));
        driver.buffer_data(BufferTarget::Index, bytemuck::cast_slice(&index_data));

        let script = Self {
            program,
            uniforms,
            a_xy,
            a_uv,
            indices,
            last_camera: None,
        };
        script.activate(gpu);
        log::debug!("quad script ready (program {:?})", program);
        script
    }

    fn activate(&self, gpu: &mut Gpu) {
        let driver = gpu.driver();
        driver.use_program(self.program);
        for attrib in [self.a_xy, self.a_uv].into_iter().flatten() {
            driver.enable_vertex_attrib(attrib);
        }
        if let Some(tex) = self.uniforms.tex {
            driver.uniform1i(tex, 0);
        }
        driver.bind_buffer(BufferTarget::Index, Some(self.indices));
    }

    pub fn program(&self) -> ProgramId {
        self.program
    }

    pub fn last_camera(&self) -> Option<&Arc<Camera>> {
        self.last_camera.as_ref()
    }

    /// Forgets the bound camera so the next [`set_camera`](Self::set_camera)
    /// uploads again.
    pub fn reset_camera(&mut self) {
        self.last_camera = None;
    }

    /// Uploads the camera's matrix and clip rectangle unless `camera` is
    /// already the bound one.
    pub fn set_camera(&mut self, gpu: &mut Gpu, camera: &Arc<Camera>, screen: &Screen) {
        if self
            .last_camera
            .as_ref()
            .is_some_and(|last| Arc::ptr_eq(last, camera))
        {
            return;
        }
        self.last_camera = Some(camera.clone());

        let state = camera.snapshot();
        let driver = gpu.driver();
        if let Some(location) = self.uniforms.camera {
            driver.uniform_matrix4(location, &state.matrix().values);
        }
        if state.is_full_screen() {
            driver.set_scissor_test(false);
            return;
        }
        driver.set_scissor_test(true);

        // Scissor works in physical pixels with a bottom-left origin.
        let xs = screen.backbuffer_width as f32 / screen.width;
        let ys = (screen.backbuffer_height as f32 - screen.bottom_inset as f32) / screen.height;
        let (sw, sh) = (state.screen_width(), state.screen_height());
        driver.scissor(ScissorRect {
            x: (state.x as f32 * xs).round() as i32,
            y: ((screen.height - sh - state.y as f32) * ys).round() as i32 + screen.bottom_inset,
            width: (sw * xs).round() as i32,
            height: (sh * ys).round() as i32,
        });
    }

    pub fn set_model(&self, gpu: &mut Gpu, model: &Matrix) {
        if let Some(location) = self.uniforms.model {
            gpu.driver().uniform_matrix4(location, &model.values);
        }
    }

    /// Uploads the color transform: `out = in * mult + add` per channel.
    pub fn lighting(&self, gpu: &mut Gpu, mult: [f32; 4], add: [f32; 4]) {
        let driver = gpu.driver();
        if let Some(location) = self.uniforms.color_m {
            driver.uniform4f(location, mult);
        }
        if let Some(location) = self.uniforms.color_a {
            driver.uniform4f(location, add);
        }
    }

    fn describe(&self, gpu: &mut Gpu, dataset: &VertexDataset) {
        dataset.update_gl_data(gpu);
        dataset.bind(gpu);
        let driver = gpu.driver();
        if let Some(xy) = self.a_xy {
            driver.vertex_attrib_pointer(xy, 2, STRIDE, 0);
        }
        if let Some(uv) = self.a_uv {
            driver.vertex_attrib_pointer(uv, 2, STRIDE, 2);
        }
        dataset.release(gpu);
    }

    /// One quad from the start of `dataset`.
    pub fn draw_quad(&self, gpu: &mut Gpu, dataset: &VertexDataset) {
        self.describe(gpu, dataset);
        gpu.driver().draw_elements(INDICES_PER_QUAD as u32, 0);
    }

    /// `length` consecutive quads starting at quad `offset`.
    pub fn draw_quad_set(&self, gpu: &mut Gpu, dataset: &VertexDataset, length: usize, offset: usize) {
        if length == 0 {
            return;
        }
        self.describe(gpu, dataset);
        gpu.driver().draw_elements(
            (INDICES_PER_QUAD * length) as u32,
            (INDICES_PER_QUAD * offset) as u32,
        );
    }

    /// Releases the program and the index buffer.
    pub fn delete(self, gpu: &mut Gpu) {
        let driver = gpu.driver();
        driver.delete_program(self.program);
        driver.delete_buffer(self.indices);
    }
}

fn build_program(gpu: &mut Gpu, program: ProgramId) -> anyhow::Result<()> {
    let driver = gpu.driver();
    let vert = driver
        .compile_shader(ShaderStage::Vertex, VERTEX_SHADER)
        .context("vertex shader")?;
    let frag = driver
        .compile_shader(ShaderStage::Fragment, FRAGMENT_SHADER)
        .context("fragment shader")?;
    driver.attach_shader(program, vert);
    driver.attach_shader(program, frag);
    let linked = driver.link_program(program);
    driver.delete_shader(vert);
    driver.delete_shader(frag);
    linked.map_err(|err| anyhow!("link failed: {err:#}"))
}
