//! wgpu 渲染后端
//!
//! 以"当前状态"方式包装 wgpu：绑定操作只记录状态，`dispatch` / `draw_points`
//! 时按程序反射表组装绑定组，各自编码并立即提交。提交顺序即执行顺序，
//! 因此计算阶段对粒子缓冲区的写入对随后的绘制可见。
//!
//! 绑定约定：
//! - uniform 块按 WGSL 中声明的 group/binding 创建，每个程序一份
//! - 存储缓冲区按绑定号匹配 `var<storage>` 的 binding
//! - 纹理 uniform 的值是纹理单元编号，采样器取自同一单元

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::core::error::{RenderError, RenderResult};
use crate::render::backend::{
    BackendCapabilities, BlendMode, BufferDescriptor, BufferUsage, ProgramDescriptor,
    RenderBackend, TextureDescriptor, TextureFormat, VertexFormat, VertexLayout, VertexStep,
};
use crate::render::reflection::{ProgramReflection, UniformSlot};
use crate::render::shader::ShaderStage;
use crate::render::uniform::{UniformLocation, UniformValue};

/// 每个实例（粒子）展开的顶点数
const QUAD_VERTICES: u32 = 4;

/// GPU 缓冲区
pub struct WgpuBuffer {
    buffer: Arc<wgpu::Buffer>,
}

impl WgpuBuffer {
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

/// GPU 纹理
pub struct WgpuTexture {
    _texture: wgpu::Texture,
    view: Arc<wgpu::TextureView>,
    sampler: Arc<wgpu::Sampler>,
}

/// 着色器程序
pub struct WgpuProgram {
    inner: Arc<ProgramInner>,
}

struct UniformBuffer {
    group: u32,
    binding: u32,
    buffer: Arc<wgpu::Buffer>,
    staging: Mutex<Vec<u8>>,
}

enum ProgramStages {
    Compute(wgpu::ComputePipeline),
    Render {
        vertex: wgpu::ShaderModule,
        vertex_entry: String,
        fragment: Option<(wgpu::ShaderModule, String)>,
    },
}

struct ProgramInner {
    id: u64,
    label: String,
    reflection: ProgramReflection,
    stages: ProgramStages,
    uniforms: Vec<UniformBuffer>,
    texture_units: Mutex<HashMap<UniformLocation, u32>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RenderPipelineKey {
    program: u64,
    blend: Option<BlendMode>,
    layout: VertexLayout,
}

enum BoundResource {
    Buffer(Arc<wgpu::Buffer>),
    View(Arc<wgpu::TextureView>),
    Sampler(Arc<wgpu::Sampler>),
}

struct Frame {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// wgpu 后端
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    limits: wgpu::Limits,
    frame: Option<Frame>,

    program: Option<Arc<ProgramInner>>,
    texture_units: HashMap<u32, (Arc<wgpu::TextureView>, Arc<wgpu::Sampler>)>,
    storage: BTreeMap<u32, Arc<wgpu::Buffer>>,
    vertex: Option<(Arc<wgpu::Buffer>, VertexLayout)>,
    blend: Option<BlendMode>,

    render_pipelines: HashMap<RenderPipelineKey, wgpu::RenderPipeline>,
    next_program_id: u64,
}

impl WgpuBackend {
    /// 为窗口创建后端
    pub async fn new(window: Arc<Window>, vsync: bool) -> RenderResult<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window)
            .map_err(|e| RenderError::SurfaceCreation(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::NoAdapter)?;
        let info = adapter.get_info();
        tracing::info!(target: "render", "Using adapter '{}' ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Particles Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| RenderError::DeviceRequest(e.to_string()))?;

        device.on_uncaptured_error(Box::new(|error| {
            tracing::error!(target: "render", "wgpu error: {}", error);
        }));

        let mut config = surface
            .get_default_config(&adapter, size.width.max(1), size.height.max(1))
            .ok_or_else(|| {
                RenderError::SurfaceCreation("surface is not supported by the adapter".into())
            })?;
        config.present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        surface.configure(&device, &config);

        tracing::info!(
            target: "render",
            "Surface configured: {}x{} {:?} {:?}",
            config.width,
            config.height,
            config.format,
            config.present_mode
        );

        let limits = device.limits();
        Ok(Self {
            surface,
            device,
            queue,
            config,
            limits,
            frame: None,
            program: None,
            texture_units: HashMap::new(),
            storage: BTreeMap::new(),
            vertex: None,
            blend: None,
            render_pipelines: HashMap::new(),
            next_program_id: 1,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// 当前表面尺寸
    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// 调整表面尺寸，宽或高为 0 时忽略（窗口最小化）
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// 获取下一帧并清屏
    ///
    /// 返回 `Ok(false)` 表示本帧应跳过（表面丢失、过期或超时）。
    pub fn begin_frame(&mut self, clear: [f64; 4]) -> RenderResult<bool> {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!(target: "render", "Surface lost or outdated, reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(false);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!(target: "render", "Surface timeout, skipping frame");
                return Ok(false);
            }
            Err(e) => return Err(RenderError::Surface(e.to_string())),
        };
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        {
            let [r, g, b, a] = clear;
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        self.frame = Some(Frame {
            surface_texture,
            view,
        });
        Ok(true)
    }

    /// 呈现当前帧
    pub fn end_frame(&mut self) {
        if let Some(frame) = self.frame.take() {
            frame.surface_texture.present();
        }
    }

    fn flush_uniforms(&self, program: &ProgramInner) {
        for uniform in &program.uniforms {
            self.queue
                .write_buffer(&uniform.buffer, 0, &lock(&uniform.staging));
        }
    }

    /// 按反射表收集当前绑定的资源并创建绑定组
    fn create_bind_groups(
        &self,
        program: &ProgramInner,
        layout_of: impl Fn(u32) -> wgpu::BindGroupLayout,
    ) -> Option<Vec<(u32, wgpu::BindGroup)>> {
        let mut groups: BTreeMap<u32, Vec<(u32, BoundResource)>> = BTreeMap::new();

        for uniform in &program.uniforms {
            groups
                .entry(uniform.group)
                .or_default()
                .push((uniform.binding, BoundResource::Buffer(Arc::clone(&uniform.buffer))));
        }

        for storage in program.reflection.storage_bindings() {
            let Some(buffer) = self.storage.get(&storage.binding) else {
                tracing::warn!(
                    target: "render",
                    "Program '{}' needs storage buffer '{}' at binding {}",
                    program.label,
                    storage.name,
                    storage.binding
                );
                return None;
            };
            groups
                .entry(storage.group)
                .or_default()
                .push((storage.binding, BoundResource::Buffer(Arc::clone(buffer))));
        }

        let units = lock(&program.texture_units);
        for (index, info) in program.reflection.uniforms().iter().enumerate() {
            let UniformSlot::Texture {
                group,
                binding,
                sampler,
            } = info.slot
            else {
                continue;
            };
            let location = UniformLocation(index as u32);
            let unit = units.get(&location).copied().unwrap_or(0);
            let Some((view, unit_sampler)) = self.texture_units.get(&unit) else {
                tracing::warn!(
                    target: "render",
                    "No texture bound to unit {} for '{}'",
                    unit,
                    info.name
                );
                return None;
            };
            let entries = groups.entry(group).or_default();
            entries.push((binding, BoundResource::View(Arc::clone(view))));
            if let Some(sampler_binding) = sampler {
                entries.push((sampler_binding, BoundResource::Sampler(Arc::clone(unit_sampler))));
            }
        }
        drop(units);

        let bind_groups = groups
            .into_iter()
            .map(|(group, resources)| {
                let entries: Vec<wgpu::BindGroupEntry<'_>> = resources
                    .iter()
                    .map(|(binding, resource)| wgpu::BindGroupEntry {
                        binding: *binding,
                        resource: match resource {
                            BoundResource::Buffer(buffer) => buffer.as_entire_binding(),
                            BoundResource::View(view) => wgpu::BindingResource::TextureView(view),
                            BoundResource::Sampler(sampler) => {
                                wgpu::BindingResource::Sampler(sampler)
                            }
                        },
                    })
                    .collect();
                let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(program.label.as_str()),
                    layout: &layout_of(group),
                    entries: &entries,
                });
                (group, bind_group)
            })
            .collect();

        Some(bind_groups)
    }

    fn ensure_render_pipeline(
        &mut self,
        program: &ProgramInner,
        key: &RenderPipelineKey,
    ) -> Option<()> {
        if self.render_pipelines.contains_key(key) {
            return Some(());
        }
        let ProgramStages::Render {
            vertex,
            vertex_entry,
            fragment,
        } = &program.stages
        else {
            return None;
        };

        let attributes: Vec<wgpu::VertexAttribute> = key
            .layout
            .attributes
            .iter()
            .map(|attr| wgpu::VertexAttribute {
                format: vertex_format(attr.format),
                offset: attr.offset,
                shader_location: attr.location,
            })
            .collect();
        let step_mode = match key.layout.step {
            VertexStep::Vertex => wgpu::VertexStepMode::Vertex,
            VertexStep::Instance => wgpu::VertexStepMode::Instance,
        };
        let targets = [Some(wgpu::ColorTargetState {
            format: self.config.format,
            blend: key.blend.map(blend_state),
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(program.label.as_str()),
                layout: None,
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: vertex_entry,
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: key.layout.stride,
                        step_mode,
                        attributes: &attributes,
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: fragment.as_ref().map(|(module, entry)| wgpu::FragmentState {
                    module,
                    entry_point: entry,
                    targets: &targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        tracing::debug!(
            target: "render",
            "Created render pipeline for '{}' (blend {:?})",
            program.label,
            key.blend
        );
        self.render_pipelines.insert(key.clone(), pipeline);
        Some(())
    }
}

fn buffer_usages(usage: BufferUsage) -> wgpu::BufferUsages {
    let mut usages = wgpu::BufferUsages::empty();
    let pairs = [
        (BufferUsage::VERTEX, wgpu::BufferUsages::VERTEX),
        (BufferUsage::UNIFORM, wgpu::BufferUsages::UNIFORM),
        (BufferUsage::STORAGE, wgpu::BufferUsages::STORAGE),
        (BufferUsage::COPY_SRC, wgpu::BufferUsages::COPY_SRC),
        (BufferUsage::COPY_DST, wgpu::BufferUsages::COPY_DST),
    ];
    for (ours, theirs) in pairs {
        if usage.contains(ours) {
            usages |= theirs;
        }
    }
    usages
}

fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
    }
}

fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32 => wgpu::VertexFormat::Float32,
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

fn blend_state(blend: BlendMode) -> wgpu::BlendState {
    match blend {
        BlendMode::Additive => wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::SrcAlpha,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        },
    }
}

impl RenderBackend for WgpuBackend {
    type Buffer = WgpuBuffer;
    type Texture = WgpuTexture;
    type Program = WgpuProgram;

    fn name(&self) -> &str {
        "wgpu"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            max_texture_size: self.limits.max_texture_dimension_2d,
            max_buffer_size: self.limits.max_buffer_size,
            max_compute_workgroups_per_dimension: self.limits.max_compute_workgroups_per_dimension,
            max_texture_units: self.limits.max_sampled_textures_per_shader_stage,
        }
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDescriptor,
        contents: &[u8],
    ) -> RenderResult<Self::Buffer> {
        if contents.len() as u64 > desc.size {
            return Err(RenderError::InvalidState(format!(
                "initial contents ({} bytes) larger than buffer ({} bytes)",
                contents.len(),
                desc.size
            )));
        }

        let usage = buffer_usages(desc.usage);
        let label = desc.label.as_deref();
        let buffer = if contents.is_empty() {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label,
                size: desc.size,
                usage,
                mapped_at_creation: false,
            })
        } else {
            let mut data = contents.to_vec();
            data.resize(desc.size as usize, 0);
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label,
                    contents: &data,
                    usage,
                })
        };

        tracing::debug!(
            target: "render",
            "Created buffer {:?} ({} bytes, {:?})",
            label,
            desc.size,
            desc.hint
        );
        Ok(WgpuBuffer {
            buffer: Arc::new(buffer),
        })
    }

    fn write_buffer(&mut self, buffer: &Self::Buffer, offset: u64, data: &[u8]) {
        self.queue.write_buffer(&buffer.buffer, offset, data);
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        rgba: &[u8],
    ) -> RenderResult<Self::Texture> {
        if rgba.len() != desc.byte_len() {
            return Err(RenderError::TextureCreation(format!(
                "expected {} bytes, got {}",
                desc.byte_len(),
                rgba.len()
            )));
        }

        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(desc.format),
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
            rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * desc.width),
                rows_per_image: Some(desc.height),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: desc.label.as_deref(),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(WgpuTexture {
            _texture: texture,
            view: Arc::new(view),
            sampler: Arc::new(sampler),
        })
    }

    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> RenderResult<Self::Program> {
        let module = |shader: &crate::render::shader::Shader| {
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(shader.label()),
                    source: wgpu::ShaderSource::Wgsl(shader.source().into()),
                })
        };

        let stages = if let Some(compute) = desc.shader(ShaderStage::Compute) {
            let compute_module = module(compute);
            let pipeline = self
                .device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(desc.label),
                    layout: None,
                    module: &compute_module,
                    entry_point: compute.entry_point(),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                });
            ProgramStages::Compute(pipeline)
        } else if let Some(vertex) = desc.shader(ShaderStage::Vertex) {
            ProgramStages::Render {
                vertex: module(vertex),
                vertex_entry: vertex.entry_point().to_string(),
                fragment: desc
                    .shader(ShaderStage::Fragment)
                    .map(|fragment| (module(fragment), fragment.entry_point().to_string())),
            }
        } else {
            return Err(RenderError::InvalidState(format!(
                "program '{}' has neither a compute nor a vertex stage",
                desc.label
            )));
        };

        let uniforms = desc
            .reflection
            .blocks()
            .iter()
            .map(|block| {
                let size = u64::from(block.size.max(16)).next_multiple_of(16);
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(desc.label),
                    size,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                UniformBuffer {
                    group: block.group,
                    binding: block.binding,
                    buffer: Arc::new(buffer),
                    staging: Mutex::new(vec![0; size as usize]),
                }
            })
            .collect();

        let id = self.next_program_id;
        self.next_program_id += 1;

        Ok(WgpuProgram {
            inner: Arc::new(ProgramInner {
                id,
                label: desc.label.to_string(),
                reflection: desc.reflection.clone(),
                stages,
                uniforms,
                texture_units: Mutex::new(HashMap::new()),
            }),
        })
    }

    fn use_program(&mut self, program: Option<&Self::Program>) {
        self.program = program.map(|p| Arc::clone(&p.inner));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue) {
        let Some(program) = &self.program else {
            tracing::warn!(target: "render", "set_uniform without a bound program");
            return;
        };
        let Some(info) = program.reflection.uniform(location) else {
            tracing::warn!(target: "render", "Unknown uniform location {:?}", location);
            return;
        };

        match (info.slot, value) {
            (UniformSlot::Texture { .. }, UniformValue::Int(unit)) => {
                lock(&program.texture_units).insert(location, (*unit).max(0) as u32);
            }
            (UniformSlot::Block { group, binding, offset }, value) if value.fits(info.kind) => {
                let Some(uniform) = program
                    .uniforms
                    .iter()
                    .find(|u| u.group == group && u.binding == binding)
                else {
                    return;
                };
                let mut staging = lock(&uniform.staging);
                let written = staging
                    .get_mut(offset as usize..)
                    .and_then(|target| value.write_bytes(target));
                if written.is_none() {
                    tracing::warn!(
                        target: "render",
                        "Uniform '{}' does not fit its block",
                        info.name
                    );
                }
            }
            _ => tracing::warn!(
                target: "render",
                "Value {:?} does not fit uniform '{}' ({:?})",
                value,
                info.name,
                info.kind
            ),
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<&Self::Texture>) {
        match texture {
            Some(texture) => {
                self.texture_units.insert(
                    unit,
                    (Arc::clone(&texture.view), Arc::clone(&texture.sampler)),
                );
            }
            None => {
                self.texture_units.remove(&unit);
            }
        }
    }

    fn bind_storage_buffer(&mut self, binding: u32, buffer: Option<&Self::Buffer>) {
        match buffer {
            Some(buffer) => {
                self.storage.insert(binding, Arc::clone(&buffer.buffer));
            }
            None => {
                self.storage.remove(&binding);
            }
        }
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        let Some(program) = self.program.clone() else {
            tracing::warn!(target: "render", "Dispatch without a bound program");
            return;
        };
        let ProgramStages::Compute(pipeline) = &program.stages else {
            tracing::warn!(target: "render", "Program '{}' is not a compute program", program.label);
            return;
        };
        let max = self.limits.max_compute_workgroups_per_dimension;
        if x > max || y > max || z > max {
            tracing::warn!(target: "render", "Dispatch ({}, {}, {}) exceeds limit {}", x, y, z, max);
            return;
        }

        self.flush_uniforms(&program);
        let Some(bind_groups) =
            self.create_bind_groups(&program, |group| pipeline.get_bind_group_layout(group))
        else {
            return;
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Compute Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(program.label.as_str()),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            for (group, bind_group) in &bind_groups {
                pass.set_bind_group(*group, bind_group, &[]);
            }
            pass.dispatch_workgroups(x, y, z);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn set_blend(&mut self, blend: Option<BlendMode>) {
        self.blend = blend;
    }

    fn set_vertex_buffer(&mut self, source: Option<(&Self::Buffer, &VertexLayout)>) {
        self.vertex = source.map(|(buffer, layout)| (Arc::clone(&buffer.buffer), layout.clone()));
    }

    fn draw_points(&mut self, first: u32, count: u32) {
        let Some(program) = self.program.clone() else {
            tracing::warn!(target: "render", "Draw without a bound program");
            return;
        };
        let Some((vertex_buffer, layout)) = self.vertex.clone() else {
            tracing::warn!(target: "render", "Draw without a vertex buffer");
            return;
        };
        if self.frame.is_none() {
            tracing::warn!(target: "render", "Draw outside begin_frame/end_frame");
            return;
        }

        let key = RenderPipelineKey {
            program: program.id,
            blend: self.blend,
            layout,
        };
        if self.ensure_render_pipeline(&program, &key).is_none() {
            tracing::warn!(target: "render", "Program '{}' is not a render program", program.label);
            return;
        }
        let Some(pipeline) = self.render_pipelines.get(&key) else {
            return;
        };

        self.flush_uniforms(&program);
        let Some(bind_groups) =
            self.create_bind_groups(&program, |group| pipeline.get_bind_group_layout(group))
        else {
            return;
        };
        let Some(frame) = &self.frame else {
            return;
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Draw Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(program.label.as_str()),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            for (group, bind_group) in &bind_groups {
                pass.set_bind_group(*group, bind_group, &[]);
            }
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.draw(0..QUAD_VERTICES, first..first + count);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}
