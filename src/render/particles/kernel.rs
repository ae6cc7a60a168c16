//! 粒子模拟内核的 CPU 实现
//!
//! 与 `assets/shaders/simulate.wgsl` 逐步对应，用于无 GPU 的测试与基准：
//!
//! 1. `age += burnRate * dt`，超过 1 时取小数部分并重生
//! 2. 重生粒子回到 `basePosition`，速度和角速度由粒子下标与旧状态的哈希生成
//! 3. `velocity += acceleration * dt`，`position += velocity * dt`，`rotation += angular_velocity * dt`

use glam::Vec3;

use crate::render::headless::{ComputeKernel, StorageView, UniformReader};
use crate::render::particles::particle::Particle;

/// 计算着色器入口点名称
pub const SIMULATE_ENTRY_POINT: &str = "simulate";

/// 重生时的最小竖直速度
pub const MIN_SPAWN_SPEED: f32 = 1.0;
/// 竖直速度的随机增量上限
pub const SPAWN_SPEED_RANGE: f32 = 1.5;
/// 水平扩散速度上限
pub const SPAWN_SPREAD: f32 = 0.5;
/// 角速度范围 [-2, 2)
pub const SPAWN_SPIN: f32 = 4.0;

/// 一次模拟步的参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    pub dt: f32,
    pub burn_rate: f32,
    pub base_position: Vec3,
    pub acceleration: Vec3,
}

impl SimulationParams {
    /// 从程序 uniform 中读取
    pub fn from_uniforms(uniforms: &UniformReader<'_>) -> Option<Self> {
        Some(Self {
            dt: uniforms.float("dt")?,
            burn_rate: uniforms.float("burnRate")?,
            base_position: uniforms.vec3("basePosition")?,
            acceleration: uniforms.vec3("acceleration")?,
        })
    }
}

/// PCG 哈希
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

fn unit_random(seed: u32, n: u32) -> f32 {
    pcg_hash(seed.wrapping_add(n)) as f32 / 4_294_967_296.0
}

fn respawn(index: u32, particle: &mut Particle, base_position: Vec3) {
    let history = particle.velocity[0].to_bits() ^ particle.position[1].to_bits();
    let seed = pcg_hash(index ^ pcg_hash(history));

    let angle = unit_random(seed, 0) * std::f32::consts::TAU;
    let spread = unit_random(seed, 1) * SPAWN_SPREAD;
    let rise = MIN_SPAWN_SPEED + unit_random(seed, 2) * SPAWN_SPEED_RANGE;

    particle.position = [base_position.x, base_position.y, base_position.z, 1.0];
    particle.velocity = [angle.cos() * spread, rise, angle.sin() * spread, 0.0];
    particle.angular_velocity = (unit_random(seed, 3) - 0.5) * SPAWN_SPIN;
}

/// 模拟单个粒子
pub fn simulate_particle(index: u32, particle: &mut Particle, params: &SimulationParams) {
    let mut age = particle.age + params.burn_rate * params.dt;
    if age >= 1.0 {
        age = age.fract();
        if !(0.0..1.0).contains(&age) {
            age = 0.0;
        }
        respawn(index, particle, params.base_position);
    }
    particle.age = age;

    let acceleration = params.acceleration * params.dt;
    let velocity = Vec3::from_slice(&particle.velocity[..3]) + acceleration;
    let position = Vec3::from_slice(&particle.position[..3]) + velocity * params.dt;
    velocity.write_to_slice(&mut particle.velocity[..3]);
    position.write_to_slice(&mut particle.position[..3]);

    particle.rotation += particle.angular_velocity * params.dt;
}

/// 模拟整个粒子池
pub fn simulate(particles: &mut [Particle], params: &SimulationParams) {
    for (index, particle) in particles.iter_mut().enumerate() {
        simulate_particle(index as u32, particle, params);
    }
}

/// 注册到 [`HeadlessBackend`](crate::render::headless::HeadlessBackend) 的模拟内核
///
/// 每个工作组处理一个粒子，读取存储绑定 0 上的粒子数组。
#[derive(Debug, Default)]
pub struct ParticleKernel {
    dispatches: u64,
}

impl ParticleKernel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComputeKernel for ParticleKernel {
    fn dispatch(
        &mut self,
        uniforms: &UniformReader<'_>,
        storage: &mut [StorageView<'_>],
        groups: [u32; 3],
    ) {
        let Some(params) = SimulationParams::from_uniforms(uniforms) else {
            tracing::warn!(target: "particles", "Simulation uniforms not set, skipping dispatch");
            return;
        };
        let Some(view) = storage.iter_mut().find(|view| view.binding == 0) else {
            tracing::warn!(target: "particles", "No particle buffer at storage binding 0");
            return;
        };

        let mut particles: Vec<Particle> = bytemuck::pod_collect_to_vec(&*view.data);
        let count = (groups[0] as usize).min(particles.len());
        simulate(&mut particles[..count], &params);
        view.data[..particles.len() * std::mem::size_of::<Particle>()]
            .copy_from_slice(bytemuck::cast_slice(&particles));

        self.dispatches += 1;
        tracing::trace!(
            target: "particles",
            "Simulated {} particles (dispatch #{})",
            count,
            self.dispatches
        );
    }
}
