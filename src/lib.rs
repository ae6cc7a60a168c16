//! # GPU Particles
//!
//! 计算着色器驱动的粒子演示程序。
//!
//! 固定容量的粒子池常驻 GPU 缓冲区，每帧由计算内核推进年龄、回收并积分，
//! 再以实例化绘制扩展为朝向相机的面片，加法混合输出。
//!
//! ## Modules
//!
//! - [`core`]: 入口、帧循环、键盘控制与错误类型
//! - [`config`]: TOML/JSON 配置与环境变量覆盖
//! - [`platform`]: 窗口与按键抽象
//! - [`render`]: 后端抽象、着色器反射、材质与粒子系统
//!
//! ### Example
//!
//! ```ignore
//! use gpu_particles::render::{HeadlessBackend, ParticleShaders, ParticleSystem};
//!
//! let mut backend = HeadlessBackend::new();
//! let mut system = ParticleSystem::new(&mut backend, desc, texture)?;
//! system.update(&mut backend, 1.0 / 60.0);
//! ```

/// Configuration system
pub mod config;
/// Core functionality including the main loop and initialization
pub mod core;
/// Platform abstraction layer
pub mod platform;
/// Rendering backends, materials and the particle system
pub mod render;
