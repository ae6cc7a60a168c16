//! 无窗口的内存后端（用于测试与基准）
//!
//! 缓冲区和纹理保存在内存中，所有操作记录为 [`GpuCommand`]。
//! 计算分发时执行按入口点名称注册的 [`ComputeKernel`]，
//! 其输入是当前程序的 uniform 值和已绑定的存储缓冲区。
//!
//! 每个资源句柄持有一个释放守卫，句柄被丢弃时计入 [`ResourceCounters`]，
//! 以此检查资源恰好释放一次。

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::error::{RenderError, RenderResult};
use crate::render::backend::{
    BackendCapabilities, BlendMode, BufferDescriptor, ProgramDescriptor, RenderBackend,
    TextureDescriptor, VertexLayout,
};
use crate::render::reflection::ProgramReflection;
use crate::render::shader::ShaderStage;
use crate::render::uniform::{UniformLocation, UniformValue};

/// 资源类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
    Program,
}

impl ResourceKind {
    fn index(self) -> usize {
        match self {
            ResourceKind::Buffer => 0,
            ResourceKind::Texture => 1,
            ResourceKind::Program => 2,
        }
    }
}

/// 资源创建/释放计数
#[derive(Debug, Default)]
pub struct ResourceCounters {
    created: [AtomicUsize; 3],
    released: [AtomicUsize; 3],
}

impl ResourceCounters {
    pub fn created(&self, kind: ResourceKind) -> usize {
        self.created[kind.index()].load(Ordering::SeqCst)
    }

    pub fn released(&self, kind: ResourceKind) -> usize {
        self.released[kind.index()].load(Ordering::SeqCst)
    }

    /// 仍然存活的资源数
    pub fn live(&self, kind: ResourceKind) -> usize {
        self.created(kind) - self.released(kind)
    }
}

/// 释放守卫，丢弃时计入释放数
#[derive(Debug)]
struct ReleaseGuard {
    kind: ResourceKind,
    counters: Arc<ResourceCounters>,
}

impl ReleaseGuard {
    fn new(kind: ResourceKind, counters: &Arc<ResourceCounters>) -> Self {
        counters.created[kind.index()].fetch_add(1, Ordering::SeqCst);
        Self {
            kind,
            counters: Arc::clone(counters),
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.counters.released[self.kind.index()].fetch_add(1, Ordering::SeqCst);
    }
}

/// 内存缓冲区
#[derive(Debug)]
pub struct HeadlessBuffer {
    id: u64,
    data: Arc<Mutex<Vec<u8>>>,
    _guard: ReleaseGuard,
}

impl HeadlessBuffer {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// 内存纹理
#[derive(Debug)]
pub struct HeadlessTexture {
    id: u64,
    width: u32,
    height: u32,
    _guard: ReleaseGuard,
}

impl HeadlessTexture {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// 内存着色器程序
#[derive(Debug)]
pub struct HeadlessProgram {
    id: u64,
    label: String,
    reflection: Arc<ProgramReflection>,
    compute_entry: Option<String>,
    _guard: ReleaseGuard,
}

impl HeadlessProgram {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// 记录下来的后端操作
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    UseProgram(Option<u64>),
    SetUniform {
        location: UniformLocation,
        value: UniformValue,
    },
    BindTexture {
        unit: u32,
        texture: Option<u64>,
    },
    BindStorageBuffer {
        binding: u32,
        buffer: Option<u64>,
    },
    WriteBuffer {
        buffer: u64,
        offset: u64,
        len: usize,
    },
    Dispatch([u32; 3]),
    SetBlend(Option<BlendMode>),
    SetVertexBuffer(Option<u64>),
    DrawPoints {
        first: u32,
        count: u32,
    },
}

/// 分发时可读取的 uniform 值
pub struct UniformReader<'a> {
    reflection: &'a ProgramReflection,
    values: &'a [Option<UniformValue>],
}

impl<'a> UniformReader<'a> {
    /// 按名称读取最近一次设置的值
    pub fn get(&self, name: &str) -> Option<UniformValue> {
        let location = self.reflection.location(name)?;
        self.values.get(location.index()).copied().flatten()
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            UniformValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn vec3(&self, name: &str) -> Option<glam::Vec3> {
        match self.get(name)? {
            UniformValue::Vec3(v) => Some(v),
            _ => None,
        }
    }
}

/// 已绑定存储缓冲区的可写视图
pub struct StorageView<'a> {
    pub binding: u32,
    pub data: &'a mut [u8],
}

/// 计算着色器的 CPU 实现
pub trait ComputeKernel {
    /// 执行一次分发
    fn dispatch(
        &mut self,
        uniforms: &UniformReader<'_>,
        storage: &mut [StorageView<'_>],
        groups: [u32; 3],
    );
}

#[derive(Clone)]
struct BoundProgram {
    id: u64,
    reflection: Arc<ProgramReflection>,
    compute_entry: Option<String>,
}

#[derive(Clone)]
struct BoundBuffer {
    id: u64,
    data: Arc<Mutex<Vec<u8>>>,
}

/// 内存后端
pub struct HeadlessBackend {
    capabilities: BackendCapabilities,
    counters: Arc<ResourceCounters>,
    next_id: u64,
    commands: Vec<GpuCommand>,
    program: Option<BoundProgram>,
    uniform_values: HashMap<u64, Vec<Option<UniformValue>>>,
    texture_units: BTreeMap<u32, u64>,
    storage: BTreeMap<u32, BoundBuffer>,
    vertex_buffer: Option<(u64, VertexLayout)>,
    blend: Option<BlendMode>,
    kernels: HashMap<String, Box<dyn ComputeKernel>>,
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::with_capabilities(BackendCapabilities::default())
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: BackendCapabilities) -> Self {
        Self {
            capabilities,
            counters: Arc::new(ResourceCounters::default()),
            next_id: 1,
            commands: Vec::new(),
            program: None,
            uniform_values: HashMap::new(),
            texture_units: BTreeMap::new(),
            storage: BTreeMap::new(),
            vertex_buffer: None,
            blend: None,
            kernels: HashMap::new(),
        }
    }

    /// 为计算入口点注册 CPU 实现
    pub fn register_kernel(&mut self, entry_point: &str, kernel: Box<dyn ComputeKernel>) {
        self.kernels.insert(entry_point.to_string(), kernel);
    }

    /// 资源计数（可在后端被丢弃后继续持有）
    pub fn counters(&self) -> Arc<ResourceCounters> {
        Arc::clone(&self.counters)
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// 读取缓冲区内容
    pub fn buffer_contents(&self, buffer: &HeadlessBuffer) -> Vec<u8> {
        lock(&buffer.data).clone()
    }

    /// 按 `T` 解释缓冲区内容
    pub fn read_buffer<T: bytemuck::Pod>(&self, buffer: &HeadlessBuffer) -> Vec<T> {
        bytemuck::pod_collect_to_vec(&lock(&buffer.data))
    }

    /// 程序中某个 uniform 最近一次设置的值
    pub fn uniform_value(&self, program: &HeadlessProgram, name: &str) -> Option<UniformValue> {
        let location = program.reflection.location(name)?;
        self.uniform_values
            .get(&program.id)?
            .get(location.index())
            .copied()
            .flatten()
    }

    /// 纹理单元上绑定的纹理 id
    pub fn bound_texture(&self, unit: u32) -> Option<u64> {
        self.texture_units.get(&unit).copied()
    }

    pub fn current_program(&self) -> Option<u64> {
        self.program.as_ref().map(|p| p.id)
    }

    pub fn blend(&self) -> Option<BlendMode> {
        self.blend
    }

    pub fn vertex_layout(&self) -> Option<&VertexLayout> {
        self.vertex_buffer.as_ref().map(|(_, layout)| layout)
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn run_kernel(&mut self, program: &BoundProgram, groups: [u32; 3]) {
        let Some(entry) = program.compute_entry.as_deref() else {
            tracing::warn!(target: "render", "Dispatch with a program that has no compute stage");
            return;
        };
        let Some(kernel) = self.kernels.get_mut(entry) else {
            tracing::debug!(target: "render", "No kernel registered for '{}'", entry);
            return;
        };

        let empty = Vec::new();
        let values = self.uniform_values.get(&program.id).unwrap_or(&empty);
        let uniforms = UniformReader {
            reflection: &program.reflection,
            values,
        };

        let mut seen = Vec::new();
        let mut guards: Vec<(u32, MutexGuard<'_, Vec<u8>>)> = Vec::new();
        for (binding, buffer) in &self.storage {
            if seen.contains(&buffer.id) {
                tracing::warn!(
                    target: "render",
                    "Buffer {} bound to several storage bindings, skipping binding {}",
                    buffer.id,
                    binding
                );
                continue;
            }
            seen.push(buffer.id);
            guards.push((*binding, lock(&buffer.data)));
        }
        let mut views: Vec<StorageView<'_>> = guards
            .iter_mut()
            .map(|(binding, data)| StorageView {
                binding: *binding,
                data: data.as_mut_slice(),
            })
            .collect();

        kernel.dispatch(&uniforms, &mut views, groups);
    }
}

fn lock(data: &Mutex<Vec<u8>>) -> MutexGuard<'_, Vec<u8>> {
    data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RenderBackend for HeadlessBackend {
    type Buffer = HeadlessBuffer;
    type Texture = HeadlessTexture;
    type Program = HeadlessProgram;

    fn name(&self) -> &str {
        "headless"
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities.clone()
    }

    fn create_buffer(
        &mut self,
        desc: &BufferDescriptor,
        contents: &[u8],
    ) -> RenderResult<Self::Buffer> {
        if desc.size > self.capabilities.max_buffer_size {
            return Err(RenderError::InvalidState(format!(
                "buffer of {} bytes exceeds limit {}",
                desc.size, self.capabilities.max_buffer_size
            )));
        }
        if contents.len() as u64 > desc.size {
            return Err(RenderError::InvalidState(format!(
                "initial contents ({} bytes) larger than buffer ({} bytes)",
                contents.len(),
                desc.size
            )));
        }

        let mut data = vec![0u8; desc.size as usize];
        data[..contents.len()].copy_from_slice(contents);
        Ok(HeadlessBuffer {
            id: self.next_id(),
            data: Arc::new(Mutex::new(data)),
            _guard: ReleaseGuard::new(ResourceKind::Buffer, &self.counters),
        })
    }

    fn write_buffer(&mut self, buffer: &Self::Buffer, offset: u64, data: &[u8]) {
        let mut contents = lock(&buffer.data);
        let start = offset as usize;
        let Some(target) = contents.get_mut(start..start + data.len()) else {
            tracing::warn!(target: "render", "Write outside buffer {}", buffer.id);
            return;
        };
        target.copy_from_slice(data);
        drop(contents);

        self.commands.push(GpuCommand::WriteBuffer {
            buffer: buffer.id,
            offset,
            len: data.len(),
        });
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
        Ok(HeadlessTexture {
            id: self.next_id(),
            width: desc.width,
            height: desc.height,
            _guard: ReleaseGuard::new(ResourceKind::Texture, &self.counters),
        })
    }

    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> RenderResult<Self::Program> {
        let compute_entry = desc
            .shader(ShaderStage::Compute)
            .map(|shader| shader.entry_point().to_string());
        Ok(HeadlessProgram {
            id: self.next_id(),
            label: desc.label.to_string(),
            reflection: Arc::new(desc.reflection.clone()),
            compute_entry,
            _guard: ReleaseGuard::new(ResourceKind::Program, &self.counters),
        })
    }

    fn use_program(&mut self, program: Option<&Self::Program>) {
        self.program = program.map(|p| BoundProgram {
            id: p.id,
            reflection: Arc::clone(&p.reflection),
            compute_entry: p.compute_entry.clone(),
        });
        self.commands
            .push(GpuCommand::UseProgram(program.map(|p| p.id)));
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
        if !value.fits(info.kind) {
            tracing::warn!(
                target: "render",
                "Value {:?} does not fit uniform '{}' ({:?})",
                value,
                info.name,
                info.kind
            );
            return;
        }

        let count = program.reflection.uniforms().len();
        let values = self
            .uniform_values
            .entry(program.id)
            .or_insert_with(|| vec![None; count]);
        values[location.index()] = Some(*value);

        self.commands.push(GpuCommand::SetUniform {
            location,
            value: *value,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<&Self::Texture>) {
        match texture {
            Some(texture) => {
                self.texture_units.insert(unit, texture.id);
            }
            None => {
                self.texture_units.remove(&unit);
            }
        }
        self.commands.push(GpuCommand::BindTexture {
            unit,
            texture: texture.map(|t| t.id),
        });
    }

    fn bind_storage_buffer(&mut self, binding: u32, buffer: Option<&Self::Buffer>) {
        match buffer {
            Some(buffer) => {
                self.storage.insert(
                    binding,
                    BoundBuffer {
                        id: buffer.id,
                        data: Arc::clone(&buffer.data),
                    },
                );
            }
            None => {
                self.storage.remove(&binding);
            }
        }
        self.commands.push(GpuCommand::BindStorageBuffer {
            binding,
            buffer: buffer.map(|b| b.id),
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(GpuCommand::Dispatch([x, y, z]));
        let Some(program) = self.program.clone() else {
            tracing::warn!(target: "render", "Dispatch without a bound program");
            return;
        };
        self.run_kernel(&program, [x, y, z]);
    }

    fn set_blend(&mut self, blend: Option<BlendMode>) {
        self.blend = blend;
        self.commands.push(GpuCommand::SetBlend(blend));
    }

    fn set_vertex_buffer(&mut self, source: Option<(&Self::Buffer, &VertexLayout)>) {
        self.vertex_buffer = source.map(|(buffer, layout)| (buffer.id, layout.clone()));
        self.commands
            .push(GpuCommand::SetVertexBuffer(source.map(|(b, _)| b.id)));
    }

    fn draw_points(&mut self, first: u32, count: u32) {
        if self.program.is_none() {
            tracing::warn!(target: "render", "Draw without a bound program");
        }
        if self.vertex_buffer.is_none() {
            tracing::warn!(target: "render", "Draw without a vertex buffer");
        }
        self.commands.push(GpuCommand::DrawPoints { first, count });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::{BufferUsage, TextureFormat, UpdateHint};
    use crate::render::shader::Shader;

    const DOUBLE: &str = r#"
struct Params {
    factor: f32,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(1) @binding(0) var<storage, read_write> values: array<f32>;

@compute @workgroup_size(1)
fn double(@builtin(global_invocation_id) id: vec3<u32>) {
    values[id.x] = values[id.x] * params.factor;
}
"#;

    struct Scale;

    impl ComputeKernel for Scale {
        fn dispatch(
            &mut self,
            uniforms: &UniformReader<'_>,
            storage: &mut [StorageView<'_>],
            groups: [u32; 3],
        ) {
            let factor = uniforms.float("factor").unwrap_or(1.0);
            let view = storage.iter_mut().find(|v| v.binding == 0).unwrap();
            let mut values: Vec<f32> = bytemuck::pod_collect_to_vec(&*view.data);
            for value in values.iter_mut().take(groups[0] as usize) {
                *value *= factor;
            }
            view.data.copy_from_slice(bytemuck::cast_slice(&values));
        }
    }

    fn storage_desc(size: u64) -> BufferDescriptor {
        BufferDescriptor {
            label: None,
            size,
            usage: BufferUsage::STORAGE | BufferUsage::COPY_DST,
            hint: UpdateHint::Dynamic,
        }
    }

    fn compile(backend: &mut HeadlessBackend) -> HeadlessProgram {
        let shader = Shader::from_source("double", ShaderStage::Compute, DOUBLE).unwrap();
        let reflection = shader.reflection().clone();
        backend
            .create_program(&ProgramDescriptor {
                label: "double",
                shaders: &[shader],
                reflection: &reflection,
            })
            .unwrap()
    }

    #[test]
    fn test_dispatch_runs_registered_kernel() {
        let mut backend = HeadlessBackend::new();
        backend.register_kernel("double", Box::new(Scale));
        let program = compile(&mut backend);

        let input = [1.0f32, 2.0, 3.0, 4.0];
        let buffer = backend
            .create_buffer(&storage_desc(16), bytemuck::cast_slice(&input))
            .unwrap();

        backend.use_program(Some(&program));
        let loc = program.reflection.location("factor").unwrap();
        backend.set_uniform(loc, &UniformValue::Float(2.0));
        backend.bind_storage_buffer(0, Some(&buffer));
        backend.dispatch(3, 1, 1);

        let output: Vec<f32> = backend.read_buffer(&buffer);
        assert_eq!(output, vec![2.0, 4.0, 6.0, 4.0]);
        assert_eq!(
            backend.uniform_value(&program, "factor"),
            Some(UniformValue::Float(2.0))
        );
    }

    #[test]
    fn test_set_uniform_rejects_wrong_kind() {
        let mut backend = HeadlessBackend::new();
        let program = compile(&mut backend);
        backend.use_program(Some(&program));
        let loc = program.reflection.location("factor").unwrap();
        backend.set_uniform(loc, &UniformValue::Int(3));
        assert_eq!(backend.uniform_value(&program, "factor"), None);
    }

    #[test]
    fn test_resources_released_once() {
        let mut backend = HeadlessBackend::new();
        let counters = backend.counters();

        let buffer = backend.create_buffer(&storage_desc(64), &[]).unwrap();
        let texture = backend
            .create_texture(
                &TextureDescriptor {
                    label: None,
                    width: 1,
                    height: 1,
                    format: TextureFormat::Rgba8Unorm,
                },
                &[255, 255, 255, 255],
            )
            .unwrap();
        assert_eq!(counters.live(ResourceKind::Buffer), 1);
        assert_eq!(counters.live(ResourceKind::Texture), 1);

        drop(buffer);
        drop(texture);
        assert_eq!(counters.released(ResourceKind::Buffer), 1);
        assert_eq!(counters.released(ResourceKind::Texture), 1);
        assert_eq!(counters.live(ResourceKind::Buffer), 0);
    }

    #[test]
    fn test_write_buffer_bounds() {
        let mut backend = HeadlessBackend::new();
        let buffer = backend.create_buffer(&storage_desc(8), &[]).unwrap();
        backend.write_buffer(&buffer, 4, &[1, 2, 3, 4]);
        backend.write_buffer(&buffer, 6, &[9, 9, 9, 9]);
        assert_eq!(backend.buffer_contents(&buffer), vec![0, 0, 0, 0, 1, 2, 3, 4]);
        assert_eq!(backend.commands().len(), 1);
    }

    #[test]
    fn test_texture_size_mismatch() {
        let mut backend = HeadlessBackend::new();
        let result = backend.create_texture(
            &TextureDescriptor {
                label: None,
                width: 2,
                height: 2,
                format: TextureFormat::Rgba8Unorm,
            },
            &[0; 4],
        );
        assert!(matches!(result, Err(RenderError::TextureCreation(_))));
    }
}
