//! The narrow graphics-API surface the engine renders through. Handles are
//! opaque ids owned by the driver; every call happens on the render thread.

pub mod headless;
#[cfg(feature = "backend-wgpu")]
pub mod wgpu_backend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttribLocation(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    #[default]
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Wrap {
    #[default]
    Clamp,
    Repeat,
    Mirror,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferTarget {
    Vertex,
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
}

/// Scissor rectangle in physical pixels, origin at the bottom-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

pub trait GpuDriver {
    /// Changes whenever previously issued handles became invalid.
    fn context_id(&self) -> u64;

    fn gen_texture(&mut self) -> TextureId;
    fn bind_texture(&mut self, id: TextureId);
    fn delete_texture(&mut self, id: TextureId);
    /// Uploads pixels to the bound texture.
    fn tex_image_2d(&mut self, width: u32, height: u32, format: PixelFormat, pixels: &[u8]);
    fn tex_filter(&mut self, min: Filter, mag: Filter);
    fn tex_wrap(&mut self, s: Wrap, t: Wrap);

    fn gen_buffer(&mut self) -> BufferId;
    fn bind_buffer(&mut self, target: BufferTarget, id: Option<BufferId>);
    fn delete_buffer(&mut self, id: BufferId);
    /// Respecifies the whole bound buffer.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]);
    /// Overwrites part of the bound buffer; `offset` is in bytes.
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);

    fn create_program(&mut self) -> ProgramId;
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> anyhow::Result<ShaderId>;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);
    fn delete_shader(&mut self, shader: ShaderId);
    fn link_program(&mut self, program: ProgramId) -> anyhow::Result<()>;
    fn use_program(&mut self, program: ProgramId);
    fn delete_program(&mut self, program: ProgramId);
    fn attrib_location(&mut self, program: ProgramId, name: &str) -> Option<AttribLocation>;
    fn uniform_location(&mut self, program: ProgramId, name: &str) -> Option<UniformLocation>;
    fn uniform_matrix4(&mut self, location: UniformLocation, value: &[f32; 16]);
    fn uniform4f(&mut self, location: UniformLocation, value: [f32; 4]);
    fn uniform1i(&mut self, location: UniformLocation, value: i32);

    fn enable_vertex_attrib(&mut self, location: AttribLocation);
    fn disable_vertex_attrib(&mut self, location: AttribLocation);
    /// Describes an attribute sourced from the bound vertex buffer. Stride
    /// and offset are counted in floats.
    fn vertex_attrib_pointer(&mut self, location: AttribLocation, components: u32, stride: u32, offset: u32);
    /// Draws `count` indices from the bound index buffer starting at index
    /// `first`.
    fn draw_elements(&mut self, count: u32, first: u32);

    fn set_scissor_test(&mut self, enabled: bool);
    fn scissor(&mut self, rect: ScissorRect);
    fn set_blend_mode(&mut self, mode: BlendMode);
    fn clear(&mut self, color: [f32; 4]);

    /// Ends the frame.
    fn present(&mut self) -> anyhow::Result<()>;

    /// The output surface changed size, in physical pixels.
    fn resize_surface(&mut self, _width: u32, _height: u32) {}

    /// The device is gone and the driver must be replaced.
    fn is_lost(&self) -> bool {
        false
    }
}

/// Driver plus the bound-texture cache used to skip redundant binds.
pub struct Gpu {
    driver: Box<dyn GpuDriver>,
    bound_texture: Option<TextureId>,
}

impl Gpu {
    pub fn new(driver: Box<dyn GpuDriver>) -> Self {
        Self {
            driver,
            bound_texture: None,
        }
    }

    pub fn driver(&mut self) -> &mut dyn GpuDriver {
        self.driver.as_mut()
    }

    pub fn context_id(&self) -> u64 {
        self.driver.context_id()
    }

    pub fn bound_texture(&self) -> Option<TextureId> {
        self.bound_texture
    }

    /// Binds unless `id` is already bound.
    pub fn bind_texture(&mut self, id: TextureId) {
        if self.bound_texture != Some(id) {
            self.driver.bind_texture(id);
            self.bound_texture = Some(id);
        }
    }

    pub fn delete_texture(&mut self, id: TextureId) {
        self.driver.delete_texture(id);
        if self.bound_texture == Some(id) {
            self.bound_texture = None;
        }
    }

    /// Swaps in a driver for a new device. Every handle issued by the old
    /// one is invalid afterwards.
    pub fn replace_driver(&mut self, driver: Box<dyn GpuDriver>) {
        self.driver = driver;
        self.bound_texture = None;
    }

    /// Forgets cached bindings. Required after context loss.
    pub fn invalidate_bindings(&mut self) {
        self.bound_texture = None;
    }
}
