//! 渲染后端抽象
//!
//! 以"当前状态"方式描述 GPU 操作：先绑定程序、纹理单元、存储缓冲区和顶点源，
//! 再设置 uniform，最后发起计算分发或绘制。
//!
//! ## 实现
//!
//! - [`WgpuBackend`](super::wgpu_backend::WgpuBackend) - 基于 wgpu 的窗口渲染
//! - [`HeadlessBackend`](super::headless::HeadlessBackend) - 内存实现，用于测试
//!
//! 资源句柄通过关联类型表达，句柄被丢弃时底层资源随之释放。

use crate::core::error::RenderResult;
use crate::render::shader::{Shader, ShaderStage};
use crate::render::reflection::ProgramReflection;
use crate::render::uniform::{UniformLocation, UniformValue};

/// 缓冲区描述符
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    /// 标签
    pub label: Option<String>,
    /// 大小（字节）
    pub size: u64,
    /// 用途
    pub usage: BufferUsage,
    /// 更新频率提示
    pub hint: UpdateHint,
}

/// 缓冲区更新频率提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateHint {
    /// 内容很少变化
    #[default]
    Static,
    /// 内容每帧都会被 GPU 改写
    Dynamic,
}

/// 缓冲区用途
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferUsage(pub u32);

impl BufferUsage {
    pub const VERTEX: Self = Self(1);
    pub const UNIFORM: Self = Self(4);
    pub const STORAGE: Self = Self(8);
    pub const COPY_SRC: Self = Self(16);
    pub const COPY_DST: Self = Self(32);

    /// `other` 的每一位都已设置
    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for BufferUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// 纹理描述符
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    /// 标签
    pub label: Option<String>,
    /// 宽度
    pub width: u32,
    /// 高度
    pub height: u32,
    /// 格式
    pub format: TextureFormat,
}

impl TextureDescriptor {
    /// 期望的像素数据字节数
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// 纹理格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
}

impl TextureFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        4
    }
}

/// 着色器程序描述符
#[derive(Debug, Clone, Copy)]
pub struct ProgramDescriptor<'a> {
    /// 标签
    pub label: &'a str,
    /// 各阶段着色器
    pub shaders: &'a [Shader],
    /// 合并后的反射信息
    pub reflection: &'a ProgramReflection,
}

impl<'a> ProgramDescriptor<'a> {
    /// 查找指定阶段的着色器
    pub fn shader(&self, stage: ShaderStage) -> Option<&'a Shader> {
        self.shaders.iter().find(|shader| shader.stage() == stage)
    }
}

/// 混合模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// 加法混合：`src * src.a + dst`
    Additive,
}

/// 顶点属性格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// 顶点属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// 着色器中的 `@location`
    pub location: u32,
    /// 格式
    pub format: VertexFormat,
    /// 在单个元素中的字节偏移
    pub offset: u64,
}

/// 顶点步进方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexStep {
    Vertex,
    Instance,
}

/// 顶点缓冲区布局
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexLayout {
    /// 元素跨度（字节）
    pub stride: u64,
    /// 步进方式
    pub step: VertexStep,
    /// 属性列表
    pub attributes: Vec<VertexAttribute>,
}

/// 后端能力
#[derive(Debug, Clone)]
pub struct BackendCapabilities {
    /// 最大纹理尺寸
    pub max_texture_size: u32,
    /// 最大缓冲区大小
    pub max_buffer_size: u64,
    /// 单个维度上可分发的最大工作组数
    pub max_compute_workgroups_per_dimension: u32,
    /// 可用纹理单元数
    pub max_texture_units: u32,
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self {
            max_texture_size: 8192,
            max_buffer_size: 256 * 1024 * 1024,
            max_compute_workgroups_per_dimension: 65535,
            max_texture_units: 16,
        }
    }
}

/// 渲染后端 Trait
///
/// 绑定类操作传入 `None` 表示解除绑定。所有状态在再次设置前保持不变。
pub trait RenderBackend {
    /// 缓冲区句柄
    type Buffer;
    /// 纹理句柄
    type Texture;
    /// 着色器程序句柄
    type Program;

    /// 获取后端名称
    fn name(&self) -> &str;

    /// 获取后端能力
    fn capabilities(&self) -> BackendCapabilities;

    /// 创建缓冲区，`contents` 非空时作为初始内容
    fn create_buffer(
        &mut self,
        desc: &BufferDescriptor,
        contents: &[u8],
    ) -> RenderResult<Self::Buffer>;

    /// 写入缓冲区数据
    fn write_buffer(&mut self, buffer: &Self::Buffer, offset: u64, data: &[u8]);

    /// 创建纹理并上传 RGBA 像素
    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        rgba: &[u8],
    ) -> RenderResult<Self::Texture>;

    /// 链接着色器程序
    fn create_program(&mut self, desc: &ProgramDescriptor<'_>) -> RenderResult<Self::Program>;

    /// 设置当前程序
    fn use_program(&mut self, program: Option<&Self::Program>);

    /// 设置当前程序的 uniform 值
    fn set_uniform(&mut self, location: UniformLocation, value: &UniformValue);

    /// 绑定纹理到纹理单元
    fn bind_texture(&mut self, unit: u32, texture: Option<&Self::Texture>);

    /// 绑定存储缓冲区到绑定点
    fn bind_storage_buffer(&mut self, binding: u32, buffer: Option<&Self::Buffer>);

    /// 以当前计算程序分发工作组
    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    /// 设置混合模式，`None` 关闭混合
    fn set_blend(&mut self, blend: Option<BlendMode>);

    /// 设置顶点源
    fn set_vertex_buffer(&mut self, source: Option<(&Self::Buffer, &VertexLayout)>);

    /// 以当前渲染程序绘制点（每个点一个实例）
    fn draw_points(&mut self, first: u32, count: u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_usage_bitor() {
        let usage = BufferUsage::VERTEX | BufferUsage::STORAGE | BufferUsage::COPY_DST;
        assert!(usage.contains(BufferUsage::VERTEX));
        assert!(usage.contains(BufferUsage::STORAGE));
        assert!(!usage.contains(BufferUsage::UNIFORM));
    }

    #[test]
    fn test_buffer_usage_contains_requires_every_bit() {
        let usage = BufferUsage::VERTEX | BufferUsage::STORAGE;
        assert!(usage.contains(BufferUsage::VERTEX | BufferUsage::STORAGE));
        assert!(!usage.contains(BufferUsage::VERTEX | BufferUsage::UNIFORM));
        assert!(!BufferUsage::VERTEX.contains(usage));
    }

    #[test]
    fn test_texture_byte_len() {
        let desc = TextureDescriptor {
            label: None,
            width: 4,
            height: 2,
            format: TextureFormat::Rgba8UnormSrgb,
        };
        assert_eq!(desc.byte_len(), 32);
    }

    #[test]
    fn test_default_capabilities() {
        let caps = BackendCapabilities::default();
        assert_eq!(caps.max_compute_workgroups_per_dimension, 65535);
    }
}
