//! 渲染模块
//!
//! - `backend` - 后端抽象（缓冲区、纹理、程序、绑定状态）
//! - `wgpu_backend` - 基于 wgpu 的窗口后端
//! - `headless` - 内存后端，在 CPU 上执行计算内核，用于测试
//! - `shader` / `reflection` - WGSL 着色器与 uniform 反射
//! - `material` - 按名称设置的 uniform 集合
//! - `particles` - GPU 粒子系统

pub mod backend;
pub mod camera;
pub mod headless;
pub mod material;
pub mod particles;
pub mod reflection;
pub mod shader;
pub mod texture;
pub mod uniform;
pub mod wgpu_backend;

pub use backend::{
    BackendCapabilities, BlendMode, BufferDescriptor, BufferUsage, RenderBackend,
    TextureDescriptor, TextureFormat, UpdateHint, VertexLayout,
};
pub use camera::{CameraInput, FlyCamera};
pub use headless::{ComputeKernel, GpuCommand, HeadlessBackend, ResourceKind};
pub use material::Material;
pub use particles::{
    ParticleShaders, ParticleSystem, ParticleSystemDescriptor, DEFAULT_MAX_PARTICLES,
};
pub use reflection::ProgramReflection;
pub use shader::{Shader, ShaderProgram, ShaderStage};
pub use texture::Texture;
pub use uniform::{UniformKind, UniformLocation, UniformValue};
pub use wgpu_backend::WgpuBackend;
