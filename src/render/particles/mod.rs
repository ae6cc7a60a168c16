//! GPU 粒子系统模块
//!
//! ## 架构设计
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  GPU Particle System                     │
//! ├─────────────────────────────────────────────────────────┤
//! │  1. Simulation (Compute Shader, simulate.wgsl)           │
//! │     - 年龄推进 age += burnRate * dt                       │
//! │     - 年龄溢出时回绕并在 basePosition 重生                 │
//! │     - 速度、位置、旋转积分                                │
//! │                                                          │
//! │  2. Rendering (Vertex + Fragment Shader)                 │
//! │     - 每个粒子一个实例，顶点阶段扩展为朝向相机的面片       │
//! │     - 加法混合，不排序、不做深度测试                       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 使用示例
//!
//! ```ignore
//! let shaders = ParticleShaders::load(&config.assets)?;
//! let mut system = ParticleSystem::new(
//!     &mut backend,
//!     ParticleSystemDescriptor { capacity: DEFAULT_MAX_PARTICLES, shaders },
//!     texture,
//! )?;
//!
//! system.update(&mut backend, dt);
//! system.material_mut().set_matrix("cameraView", view_projection);
//! system.draw(&mut backend);
//! ```

pub mod kernel;
pub mod particle;
pub mod system;

/// 默认粒子数量
pub const DEFAULT_MAX_PARTICLES: u32 = 16348;

pub use kernel::{ParticleKernel, SimulationParams, SIMULATE_ENTRY_POINT};
pub use particle::{Particle, ParticlePool};
pub use system::{ParticleShaders, ParticleSystem, ParticleSystemDescriptor};
