//! 粒子数据布局
//!
//! 计算着色器、顶点属性表和 CPU 参考内核按字节偏移读取同一块缓冲区，
//! 字段顺序和大小不可改动。

use std::mem::{offset_of, size_of};

use crate::render::backend::{VertexAttribute, VertexFormat, VertexLayout, VertexStep};

/// GPU 粒子
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Particle {
    /// 位置（w 未使用）
    pub position: [f32; 4],
    /// 速度（w 未使用）
    pub velocity: [f32; 4],
    /// 颜色 RGBA
    pub color: [f32; 4],
    /// 旋转角（弧度）
    pub rotation: f32,
    /// 角速度（弧度/秒）
    pub angular_velocity: f32,
    /// 归一化年龄，范围 [0, 1)
    pub age: f32,
    pub _padding: f32,
}

const _: () = assert!(size_of::<Particle>() % 16 == 0);
const _: () = assert!(size_of::<Particle>() == 64);

/// 初始颜色
pub const INITIAL_COLOR: [f32; 4] = [1.0, 0.0, 1.0, 1.0];

impl Particle {
    /// 指定初始年龄的静止粒子
    pub fn with_age(age: f32) -> Self {
        Self {
            position: [0.0; 4],
            velocity: [0.0; 4],
            color: INITIAL_COLOR,
            rotation: 0.0,
            angular_velocity: 0.0,
            age,
            _padding: 0.0,
        }
    }

    /// 顶点属性布局：每个粒子一个实例
    ///
    /// location 0..=5 依次为 position、velocity、color、rotation、angular_velocity、age。
    pub fn vertex_layout() -> VertexLayout {
        let attr = |location, format, offset: usize| VertexAttribute {
            location,
            format,
            offset: offset as u64,
        };
        VertexLayout {
            stride: size_of::<Particle>() as u64,
            step: VertexStep::Instance,
            attributes: vec![
                attr(0, VertexFormat::Float32x4, offset_of!(Particle, position)),
                attr(1, VertexFormat::Float32x4, offset_of!(Particle, velocity)),
                attr(2, VertexFormat::Float32x4, offset_of!(Particle, color)),
                attr(3, VertexFormat::Float32, offset_of!(Particle, rotation)),
                attr(
                    4,
                    VertexFormat::Float32,
                    offset_of!(Particle, angular_velocity),
                ),
                attr(5, VertexFormat::Float32, offset_of!(Particle, age)),
            ],
        }
    }
}

/// 固定容量的粒子池
///
/// 第 i 个粒子的年龄初始化为 i / capacity，使粒子在生命周期内错开重生。
#[derive(Debug, Clone)]
pub struct ParticlePool {
    particles: Vec<Particle>,
}

impl ParticlePool {
    pub fn new(capacity: u32) -> Self {
        let particles = (0..capacity)
            .map(|i| Particle::with_age(i as f32 / capacity as f32))
            .collect();
        Self { particles }
    }

    pub fn capacity(&self) -> u32 {
        self.particles.len() as u32
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.particles)
    }

    /// 缓冲区大小（字节）
    pub fn byte_len(&self) -> u64 {
        (self.particles.len() * size_of::<Particle>()) as u64
    }
}
