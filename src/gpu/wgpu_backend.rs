//! [`GpuDriver`] on wgpu. Calls are recorded against CPU-side shadows and
//! replayed as a single render pass when the frame is presented.

use super::{
    AttribLocation, BlendMode, BufferId, BufferTarget, Filter, GpuDriver, PixelFormat, ProgramId, ScissorRect,
    ShaderId, ShaderStage, TextureId, UniformLocation, Wrap,
};
use anyhow::{anyhow, Context};
use bytemuck::{Pod, Zeroable};
use pollster::block_on;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use winit::window::Window;

static NEXT_CONTEXT: AtomicU64 = AtomicU64::new(1);

const U_CAMERA: u32 = 0;
const U_MODEL: u32 = 1;
const U_COLOR_M: u32 = 2;
const U_COLOR_A: u32 = 3;
const U_TEX: u32 = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct Uniforms {
    camera: [f32; 16],
    model: [f32; 16],
    color_m: [f32; 4],
    color_a: [f32; 4],
}

impl Default for Uniforms {
    fn default() -> Self {
        let mut identity = [0.0; 16];
        identity[0] = 1.0;
        identity[5] = 1.0;
        identity[10] = 1.0;
        identity[15] = 1.0;
        Self {
            camera: identity,
            model: identity,
            color_m: [1.0; 4],
            color_a: [0.0; 4],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SamplerKey {
    min: Filter,
    mag: Filter,
    wrap_s: Wrap,
    wrap_t: Wrap,
}

struct TextureEntry {
    texture: Option<wgpu::Texture>,
    sampler: SamplerKey,
    bind_group: Option<wgpu::BindGroup>,
}

#[derive(Default)]
struct BufferEntry {
    shadow: Vec<u8>,
    buffer: Option<wgpu::Buffer>,
    dirty: Option<(usize, usize)>,
}

impl BufferEntry {
    fn touch(&mut self, start: usize, end: usize) {
        self.dirty = Some(match self.dirty {
            Some((s, e)) => (s.min(start), e.max(end)),
            None => (start, end),
        });
    }
}

struct ProgramEntry {
    vertex: Option<Arc<wgpu::ShaderModule>>,
    fragment: Option<Arc<wgpu::ShaderModule>>,
    normal: Option<wgpu::RenderPipeline>,
    additive: Option<wgpu::RenderPipeline>,
}

struct DrawCommand {
    program: ProgramId,
    blend: BlendMode,
    texture: TextureId,
    vertices: BufferId,
    indices: BufferId,
    uniform_offset: u32,
    first: u32,
    count: u32,
    scissor: Option<ScissorRect>,
}

pub struct WgpuDriver {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    context_id: u64,
    lost: Arc<AtomicBool>,
    next_id: u32,

    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    uniform_stride: u32,
    uniform_buffer: Option<wgpu::Buffer>,
    uniform_bind_group: Option<wgpu::BindGroup>,
    samplers: HashMap<SamplerKey, wgpu::Sampler>,

    textures: HashMap<u32, TextureEntry>,
    buffers: HashMap<u32, BufferEntry>,
    shaders: HashMap<u32, (ShaderStage, Arc<wgpu::ShaderModule>)>,
    programs: HashMap<u32, ProgramEntry>,

    bound_texture: Option<TextureId>,
    bound_vertex: Option<BufferId>,
    bound_index: Option<BufferId>,
    attrib_source: Option<BufferId>,
    program: Option<ProgramId>,
    blend: BlendMode,
    scissor_enabled: bool,
    scissor: ScissorRect,
    uniforms: Uniforms,

    clear_color: wgpu::Color,
    frame_uniforms: Vec<u8>,
    last_uniforms: Option<(Uniforms, u32)>,
    commands: Vec<DrawCommand>,
}

fn to_filter(filter: Filter) -> wgpu::FilterMode {
    match filter {
        Filter::Nearest => wgpu::FilterMode::Nearest,
        Filter::Linear => wgpu::FilterMode::Linear,
    }
}

fn to_address(wrap: Wrap) -> wgpu::AddressMode {
    match wrap {
        Wrap::Clamp => wgpu::AddressMode::ClampToEdge,
        Wrap::Repeat => wgpu::AddressMode::Repeat,
        Wrap::Mirror => wgpu::AddressMode::MirrorRepeat,
    }
}

fn create_sampler(device: &wgpu::Device, key: SamplerKey) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("quad-sampler"),
        address_mode_u: to_address(key.wrap_s),
        address_mode_v: to_address(key.wrap_t),
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: to_filter(key.mag),
        min_filter: to_filter(key.min),
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

fn align_to(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

impl WgpuDriver {
    pub fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(window.clone())
            .context("creating window surface")?;
        let adapter = block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: Some(&surface),
        }))
        .ok_or_else(|| anyhow!("no compatible graphics adapter"))?;
        let (device, queue) = block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("tessera-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("requesting graphics device")?;

        let lost = Arc::new(AtomicBool::new(false));
        let lost_flag = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::warn!("graphics device lost ({reason:?}): {message}");
            lost_flag.store(true, Ordering::SeqCst);
        });

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no formats"))?;
        let config = wgpu::SurfaceConfiguration {
            desired_maximum_frame_latency: 2,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![format],
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
        };
        surface.configure(&device, &config);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quad-uniforms"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<Uniforms>() as _),
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quad-texture"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quad-pipeline-layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let uniform_stride = align_to(
            std::mem::size_of::<Uniforms>(),
            device.limits().min_uniform_buffer_offset_alignment as usize,
        ) as u32;

        let context_id = NEXT_CONTEXT.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "wgpu context {context_id}: {} ({:?}), surface {:?} {}x{}",
            adapter.get_info().name,
            adapter.get_info().backend,
            format,
            config.width,
            config.height
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            context_id,
            lost,
            next_id: 1,
            uniform_layout,
            texture_layout,
            pipeline_layout,
            uniform_stride,
            uniform_buffer: None,
            uniform_bind_group: None,
            samplers: HashMap::new(),
            textures: HashMap::new(),
            buffers: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            bound_texture: None,
            bound_vertex: None,
            bound_index: None,
            attrib_source: None,
            program: None,
            blend: BlendMode::Normal,
            scissor_enabled: false,
            scissor: ScissorRect {
                x: 0,
                y: 0,
                width: 0,
                height: 0,
            },
            uniforms: Uniforms::default(),
            clear_color: wgpu::Color::BLACK,
            frame_uniforms: Vec::new(),
            last_uniforms: None,
            commands: Vec::new(),
        })
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn with_validation<T>(&self, build: impl FnOnce(&wgpu::Device) -> T) -> anyhow::Result<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = build(&self.device);
        match block_on(self.device.pop_error_scope()) {
            Some(err) => Err(anyhow!("{err}")),
            None => Ok(value),
        }
    }

    fn build_pipeline(&self, entry: &ProgramEntry, blend: wgpu::BlendState) -> anyhow::Result<wgpu::RenderPipeline> {
        let vertex = entry.vertex.as_ref().ok_or_else(|| anyhow!("no vertex shader attached"))?;
        let fragment = entry
            .fragment
            .as_ref()
            .ok_or_else(|| anyhow!("no fragment shader attached"))?;
        let format = self.config.format;
        self.with_validation(|device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("quad-pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: 4 * std::mem::size_of::<f32>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: fragment,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        })
    }

    /// Offset of the current uniform block in this frame's uniform data.
    fn push_uniforms(&mut self) -> u32 {
        if let Some((last, offset)) = self.last_uniforms {
            if last == self.uniforms {
                return offset;
            }
        }
        let offset = self.frame_uniforms.len() as u32;
        self.frame_uniforms.extend_from_slice(bytemuck::bytes_of(&self.uniforms));
        self.frame_uniforms.resize(offset as usize + self.uniform_stride as usize, 0);
        self.last_uniforms = Some((self.uniforms, offset));
        offset
    }

    fn upload_buffers(&mut self) {
        for entry in self.buffers.values_mut() {
            let Some((start, end)) = entry.dirty.take() else {
                continue;
            };
            let size = align_to(entry.shadow.len().max(4), wgpu::COPY_BUFFER_ALIGNMENT as usize);
            let fits = entry.buffer.as_ref().is_some_and(|b| b.size() as usize >= size);
            if !fits {
                entry.shadow.resize(size, 0);
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("quad-data"),
                    size: size as u64,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                self.queue.write_buffer(&buffer, 0, &entry.shadow);
                entry.buffer = Some(buffer);
            } else if let Some(buffer) = &entry.buffer {
                let start = start / 4 * 4;
                let end = align_to(end.min(entry.shadow.len()), 4).min(entry.shadow.len());
                if start < end {
                    self.queue.write_buffer(buffer, start as u64, &entry.shadow[start..end]);
                }
            }
        }
    }

    fn upload_uniforms(&mut self) {
        if self.frame_uniforms.is_empty() {
            return;
        }
        let needed = self.frame_uniforms.len() as u64;
        let fits = self.uniform_buffer.as_ref().is_some_and(|b| b.size() >= needed);
        if !fits {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("quad-uniforms"),
                size: needed.next_power_of_two(),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.uniform_bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("quad-uniforms"),
                layout: &self.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &buffer,
                        offset: 0,
                        size: wgpu::BufferSize::new(std::mem::size_of::<Uniforms>() as _),
                    }),
                }],
            }));
            self.uniform_buffer = Some(buffer);
        }
        if let Some(buffer) = &self.uniform_buffer {
            self.queue.write_buffer(buffer, 0, &self.frame_uniforms);
        }
    }

    fn prepare_texture_groups(&mut self) {
        let used: Vec<u32> = self.commands.iter().map(|c| c.texture.0).collect();
        for id in used {
            let Some(entry) = self.textures.get_mut(&id) else {
                continue;
            };
            if entry.bind_group.is_some() {
                continue;
            }
            let Some(texture) = &entry.texture else {
                continue;
            };
            let key = entry.sampler;
            let device = &self.device;
            let sampler = self
                .samplers
                .entry(key)
                .or_insert_with(|| create_sampler(device, key));
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            entry.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("quad-texture"),
                layout: &self.texture_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ],
            }));
        }
    }

    /// Converts a bottom-left scissor rect into a clamped top-left one.
    fn scissor_to_target(&self, rect: ScissorRect) -> (u32, u32, u32, u32) {
        let (tw, th) = (self.config.width as i32, self.config.height as i32);
        let x0 = rect.x.clamp(0, tw);
        let x1 = (rect.x + rect.width).clamp(0, tw);
        let top = (th - (rect.y + rect.height)).clamp(0, th);
        let bottom = (th - rect.y).clamp(0, th);
        (x0 as u32, top as u32, (x1 - x0).max(0) as u32, (bottom - top).max(0) as u32)
    }

    fn reset_frame(&mut self) {
        self.commands.clear();
        self.frame_uniforms.clear();
        self.last_uniforms = None;
    }
}

impl GpuDriver for WgpuDriver {
    fn context_id(&self) -> u64 {
        self.context_id
    }

    fn gen_texture(&mut self) -> TextureId {
        let id = self.next_id();
        self.textures.insert(
            id,
            TextureEntry {
                texture: None,
                sampler: SamplerKey {
                    min: Filter::Nearest,
                    mag: Filter::Nearest,
                    wrap_s: Wrap::Clamp,
                    wrap_t: Wrap::Clamp,
                },
                bind_group: None,
            },
        );
        TextureId(id)
    }

    fn bind_texture(&mut self, id: TextureId) {
        self.bound_texture = Some(id);
    }

    fn delete_texture(&mut self, id: TextureId) {
        self.textures.remove(&id.0);
        if self.bound_texture == Some(id) {
            self.bound_texture = None;
        }
    }

    fn tex_image_2d(&mut self, width: u32, height: u32, format: PixelFormat, pixels: &[u8]) {
        let PixelFormat::Rgba8 = format;
        if width == 0 || height == 0 {
            return;
        }
        let Some(id) = self.bound_texture else {
            log::warn!("texture upload with no texture bound");
            return;
        };
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("quad-texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        if let Some(entry) = self.textures.get_mut(&id.0) {
            entry.texture = Some(texture);
            entry.bind_group = None;
        }
    }

    fn tex_filter(&mut self, min: Filter, mag: Filter) {
        if let Some(entry) = self.bound_texture.and_then(|id| self.textures.get_mut(&id.0)) {
            entry.sampler.min = min;
            entry.sampler.mag = mag;
            entry.bind_group = None;
        }
    }

    fn tex_wrap(&mut self, s: Wrap, t: Wrap) {
        if let Some(entry) = self.bound_texture.and_then(|id| self.textures.get_mut(&id.0)) {
            entry.sampler.wrap_s = s;
            entry.sampler.wrap_t = t;
            entry.bind_group = None;
        }
    }

    fn gen_buffer(&mut self) -> BufferId {
        let id = self.next_id();
        self.buffers.insert(id, BufferEntry::default());
        BufferId(id)
    }

    fn bind_buffer(&mut self, target: BufferTarget, id: Option<BufferId>) {
        match target {
            BufferTarget::Vertex => self.bound_vertex = id,
            BufferTarget::Index => self.bound_index = id,
        }
    }

    fn delete_buffer(&mut self, id: BufferId) {
        self.buffers.remove(&id.0);
        if self.bound_vertex == Some(id) {
            self.bound_vertex = None;
        }
        if self.bound_index == Some(id) {
            self.bound_index = None;
        }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8]) {
        let bound = match target {
            BufferTarget::Vertex => self.bound_vertex,
            BufferTarget::Index => self.bound_index,
        };
        if let Some(entry) = bound.and_then(|id| self.buffers.get_mut(&id.0)) {
            entry.shadow.clear();
            entry.shadow.extend_from_slice(data);
            entry.buffer = None;
            entry.touch(0, data.len());
        }
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        let bound = match target {
            BufferTarget::Vertex => self.bound_vertex,
            BufferTarget::Index => self.bound_index,
        };
        if let Some(entry) = bound.and_then(|id| self.buffers.get_mut(&id.0)) {
            let end = offset + data.len();
            if entry.shadow.len() < end {
                entry.shadow.resize(end, 0);
                entry.buffer = None;
            }
            entry.shadow[offset..end].copy_from_slice(data);
            entry.touch(offset, end);
        }
    }

    fn create_program(&mut self) -> ProgramId {
        let id = self.next_id();
        self.programs.insert(
            id,
            ProgramEntry {
                vertex: None,
                fragment: None,
                normal: None,
                additive: None,
            },
        );
        ProgramId(id)
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> anyhow::Result<ShaderId> {
        let module = self
            .with_validation(|device| {
                device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(match stage {
                        ShaderStage::Vertex => "quad-vertex",
                        ShaderStage::Fragment => "quad-fragment",
                    }),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                })
            })
            .with_context(|| format!("compiling {stage:?} shader"))?;
        let id = self.next_id();
        self.shaders.insert(id, (stage, Arc::new(module)));
        Ok(ShaderId(id))
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        let Some((stage, module)) = self.shaders.get(&shader.0) else {
            return;
        };
        if let Some(entry) = self.programs.get_mut(&program.0) {
            match stage {
                ShaderStage::Vertex => entry.vertex = Some(module.clone()),
                ShaderStage::Fragment => entry.fragment = Some(module.clone()),
            }
        }
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        self.shaders.remove(&shader.0);
    }

    fn link_program(&mut self, program: ProgramId) -> anyhow::Result<()> {
        let entry = self
            .programs
            .get(&program.0)
            .ok_or_else(|| anyhow!("unknown program {}", program.0))?;
        let normal = self.build_pipeline(entry, wgpu::BlendState::ALPHA_BLENDING)?;
        let additive_blend = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };
        let additive = self.build_pipeline(
            entry,
            wgpu::BlendState {
                color: additive_blend,
                alpha: additive_blend,
            },
        )?;
        if let Some(entry) = self.programs.get_mut(&program.0) {
            entry.normal = Some(normal);
            entry.additive = Some(additive);
        }
        Ok(())
    }

    fn use_program(&mut self, program: ProgramId) {
        self.program = Some(program);
    }

    fn delete_program(&mut self, program: ProgramId) {
        self.programs.remove(&program.0);
        if self.program == Some(program) {
            self.program = None;
        }
    }

    fn attrib_location(&mut self, _program: ProgramId, name: &str) -> Option<AttribLocation> {
        match name {
            "aXY" => Some(AttribLocation(0)),
            "aUV" => Some(AttribLocation(1)),
            _ => None,
        }
    }

    fn uniform_location(&mut self, _program: ProgramId, name: &str) -> Option<UniformLocation> {
        let slot = match name {
            "uCamera" => U_CAMERA,
            "uModel" => U_MODEL,
            "uColorM" => U_COLOR_M,
            "uColorA" => U_COLOR_A,
            "uTex" => U_TEX,
            _ => return None,
        };
        Some(UniformLocation(slot))
    }

    fn uniform_matrix4(&mut self, location: UniformLocation, value: &[f32; 16]) {
        match location.0 {
            U_CAMERA => self.uniforms.camera = *value,
            U_MODEL => self.uniforms.model = *value,
            other => log::trace!("matrix uniform {other} ignored"),
        }
    }

    fn uniform4f(&mut self, location: UniformLocation, value: [f32; 4]) {
        match location.0 {
            U_COLOR_M => self.uniforms.color_m = value,
            U_COLOR_A => self.uniforms.color_a = value,
            other => log::trace!("vec4 uniform {other} ignored"),
        }
    }

    // The sampler is always bound to group 1.
    fn uniform1i(&mut self, _location: UniformLocation, _value: i32) {}

    fn enable_vertex_attrib(&mut self, _location: AttribLocation) {}

    fn disable_vertex_attrib(&mut self, _location: AttribLocation) {}

    fn vertex_attrib_pointer(&mut self, _location: AttribLocation, _components: u32, _stride: u32, _offset: u32) {
        self.attrib_source = self.bound_vertex;
    }

    fn draw_elements(&mut self, count: u32, first: u32) {
        let (Some(program), Some(texture), Some(vertices), Some(indices)) =
            (self.program, self.bound_texture, self.attrib_source, self.bound_index)
        else {
            log::trace!("draw skipped: incomplete pipeline state");
            return;
        };
        let uniform_offset = self.push_uniforms();
        self.commands.push(DrawCommand {
            program,
            blend: self.blend,
            texture,
            vertices,
            indices,
            uniform_offset,
            first,
            count,
            scissor: self.scissor_enabled.then_some(self.scissor),
        });
    }

    fn set_scissor_test(&mut self, enabled: bool) {
        self.scissor_enabled = enabled;
    }

    fn scissor(&mut self, rect: ScissorRect) {
        self.scissor = rect;
    }

    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend = mode;
    }

    /// Drops everything drawn so far this frame.
    fn clear(&mut self, color: [f32; 4]) {
        self.clear_color = wgpu::Color {
            r: color[0] as f64,
            g: color[1] as f64,
            b: color[2] as f64,
            a: color[3] as f64,
        };
        self.reset_frame();
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }

    fn present(&mut self) -> anyhow::Result<()> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                self.reset_frame();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::debug!("frame acquisition timed out, skipping");
                self.reset_frame();
                return Ok(());
            }
            Err(err) => {
                self.reset_frame();
                return Err(err).context("acquiring frame");
            }
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.upload_buffers();
        self.upload_uniforms();
        self.prepare_texture_groups();

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame-encoder"),
        });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(uniform_group) = &self.uniform_bind_group {
                for cmd in &self.commands {
                    let Some(program) = self.programs.get(&cmd.program.0) else {
                        continue;
                    };
                    let pipeline = match cmd.blend {
                        BlendMode::Normal => program.normal.as_ref(),
                        BlendMode::Additive => program.additive.as_ref(),
                    };
                    let texture_group = self.textures.get(&cmd.texture.0).and_then(|t| t.bind_group.as_ref());
                    let vertices = self.buffers.get(&cmd.vertices.0).and_then(|b| b.buffer.as_ref());
                    let indices = self.buffers.get(&cmd.indices.0).and_then(|b| b.buffer.as_ref());
                    let (Some(pipeline), Some(texture_group), Some(vertices), Some(indices)) =
                        (pipeline, texture_group, vertices, indices)
                    else {
                        continue;
                    };
                    let (x, y, w, h) = match cmd.scissor {
                        Some(rect) => self.scissor_to_target(rect),
                        None => (0, 0, self.config.width, self.config.height),
                    };
                    if w == 0 || h == 0 {
                        continue;
                    }
                    rpass.set_scissor_rect(x, y, w, h);
                    rpass.set_pipeline(pipeline);
                    rpass.set_bind_group(0, uniform_group, &[cmd.uniform_offset]);
                    rpass.set_bind_group(1, texture_group, &[]);
                    rpass.set_vertex_buffer(0, vertices.slice(..));
                    rpass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                    rpass.draw_indexed(cmd.first..cmd.first + cmd.count, 0, 0..1);
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));
        self.window.pre_present_notify();
        frame.present();
        self.reset_frame();
        Ok(())
    }
}
