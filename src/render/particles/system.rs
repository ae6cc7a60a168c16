//! 粒子系统
//!
//! 拥有粒子缓冲区以及模拟、渲染两个材质，每帧先 `update` 再 `draw`。

use std::sync::Arc;

use glam::{Vec2, Vec3};

use crate::config::{AssetConfig, ParticleConfig};
use crate::core::error::{EngineResult, RenderError, RenderResult};
use crate::render::backend::{BlendMode, BufferDescriptor, BufferUsage, RenderBackend, UpdateHint};
use crate::render::material::Material;
use crate::render::particles::particle::{Particle, ParticlePool};
use crate::render::shader::{Shader, ShaderProgram, ShaderStage};
use crate::render::texture::Texture;

/// 粒子系统使用的三个着色器阶段
#[derive(Debug, Clone)]
pub struct ParticleShaders {
    /// 模拟（计算）
    pub compute: Shader,
    /// 点扩展为面片（顶点）
    pub vertex: Shader,
    /// 着色（片元）
    pub fragment: Shader,
}

impl ParticleShaders {
    /// 从资源目录加载
    pub fn load(assets: &AssetConfig) -> EngineResult<Self> {
        Ok(Self {
            compute: Shader::from_file(assets.simulate_shader_path(), ShaderStage::Compute)?,
            vertex: Shader::from_file(assets.vertex_shader_path(), ShaderStage::Vertex)?,
            fragment: Shader::from_file(assets.fragment_shader_path(), ShaderStage::Fragment)?,
        })
    }

    /// 从源码创建
    pub fn from_sources(compute: &str, vertex: &str, fragment: &str) -> RenderResult<Self> {
        Ok(Self {
            compute: Shader::from_source("simulate.wgsl", ShaderStage::Compute, compute)?,
            vertex: Shader::from_source("billboard.wgsl", ShaderStage::Vertex, vertex)?,
            fragment: Shader::from_source("particle.wgsl", ShaderStage::Fragment, fragment)?,
        })
    }
}

/// 粒子系统描述符
#[derive(Debug, Clone)]
pub struct ParticleSystemDescriptor {
    /// 粒子数量
    pub capacity: u32,
    /// 着色器
    pub shaders: ParticleShaders,
}

/// GPU 粒子系统
pub struct ParticleSystem<B: RenderBackend> {
    /// 发射位置
    pub position: Vec3,
    /// 粒子生命周期（秒）
    pub lifetime: f32,
    /// 全局加速度
    pub acceleration: Vec3,
    /// 粒子屏幕尺寸（像素）
    pub particle_size: Vec2,

    capacity: u32,
    buffer: B::Buffer,
    simulate: Material<B>,
    render: Material<B>,
}

impl<B: RenderBackend> ParticleSystem<B> {
    /// 创建粒子系统
    ///
    /// 容量必须在 `1..=max_compute_workgroups_per_dimension` 内（每个粒子一个工作组）。
    pub fn new(
        backend: &mut B,
        desc: ParticleSystemDescriptor,
        texture: Arc<Texture<B>>,
    ) -> RenderResult<Self> {
        let max = backend.capabilities().max_compute_workgroups_per_dimension;
        if desc.capacity == 0 || desc.capacity > max {
            return Err(RenderError::InvalidState(format!(
                "particle capacity {} must be in 1..={}",
                desc.capacity, max
            )));
        }

        let ParticleShaders {
            compute,
            vertex,
            fragment,
        } = desc.shaders;
        let simulate_program = ShaderProgram::new(backend, "Particle Simulate", vec![compute])?;
        let render_program =
            ShaderProgram::new(backend, "Particle Render", vec![vertex, fragment])?;

        let simulate = Material::new(simulate_program);
        let mut render = Material::new(render_program);
        render.set_texture("tex", texture);

        let pool = ParticlePool::new(desc.capacity);
        let buffer = backend.create_buffer(
            &BufferDescriptor {
                label: Some("Particle Buffer".to_string()),
                size: pool.byte_len(),
                usage: BufferUsage::VERTEX | BufferUsage::STORAGE | BufferUsage::COPY_DST,
                hint: UpdateHint::Static,
            },
            pool.as_bytes(),
        )?;

        tracing::info!(
            target: "particles",
            "Created particle system with {} particles ({} bytes)",
            desc.capacity,
            pool.byte_len()
        );

        Ok(Self {
            position: Vec3::ZERO,
            lifetime: 1.0,
            acceleration: Vec3::ZERO,
            particle_size: Vec2::new(100.0, 100.0),
            capacity: desc.capacity,
            buffer,
            simulate,
            render,
        })
    }

    /// 应用配置中的初始参数
    pub fn apply_config(&mut self, config: &ParticleConfig) {
        self.position = Vec3::from_array(config.position);
        self.lifetime = config.lifetime;
        self.acceleration = Vec3::from_array(config.acceleration);
        self.particle_size = Vec2::from_array(config.particle_size);
    }

    /// 每秒推进的归一化年龄，`1 / lifetime`
    ///
    /// 生命周期非正、为 NaN 或倒数溢出时返回 0，粒子停止老化。
    pub fn burn_rate(&self) -> f32 {
        let rate = 1.0 / self.lifetime;
        if self.lifetime > 0.0 && rate.is_finite() {
            rate
        } else {
            0.0
        }
    }

    /// 运行一次模拟
    pub fn update(&mut self, backend: &mut B, dt: f32) {
        backend.bind_storage_buffer(0, Some(&self.buffer));

        let burn_rate = self.burn_rate();
        self.simulate.set_float("dt", dt);
        self.simulate.set_float("burnRate", burn_rate);
        self.simulate.set_vec3("basePosition", self.position);
        self.simulate.set_vec3("acceleration", self.acceleration);

        self.simulate.bind(backend);
        backend.dispatch(self.capacity, 1, 1);
        self.simulate.unbind(backend);

        backend.bind_storage_buffer(0, None);
    }

    /// 以加法混合绘制全部粒子
    ///
    /// 调用前需在渲染材质上设置 `cameraView` 和 `viewport`。
    pub fn draw(&mut self, backend: &mut B) {
        backend.set_blend(Some(BlendMode::Additive));
        let layout = Particle::vertex_layout();
        backend.set_vertex_buffer(Some((&self.buffer, &layout)));

        self.render.set_vec2("particleSize", self.particle_size);
        self.render.bind(backend);
        backend.draw_points(0, self.capacity);
        self.render.unbind(backend);

        backend.set_vertex_buffer(None);
        backend.set_blend(None);
    }

    /// 重新上传错开年龄的初始粒子池
    pub fn reset(&mut self, backend: &mut B) {
        let pool = ParticlePool::new(self.capacity);
        backend.write_buffer(&self.buffer, 0, pool.as_bytes());
        tracing::debug!(target: "particles", "Particle pool reset");
    }

    /// 渲染材质
    pub fn material_mut(&mut self) -> &mut Material<B> {
        &mut self.render
    }

    pub fn material(&self) -> &Material<B> {
        &self.render
    }

    /// 模拟材质
    pub fn simulate_material(&self) -> &Material<B> {
        &self.simulate
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// 粒子缓冲区
    pub fn buffer(&self) -> &B::Buffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::{GpuCommand, HeadlessBackend};
    use crate::render::particles::kernel::{ParticleKernel, SIMULATE_ENTRY_POINT};

    const SIMULATE: &str = include_str!("../../../assets/shaders/simulate.wgsl");
    const BILLBOARD: &str = include_str!("../../../assets/shaders/billboard.wgsl");
    const PARTICLE: &str = include_str!("../../../assets/shaders/particle.wgsl");

    fn system(backend: &mut HeadlessBackend, capacity: u32) -> ParticleSystem<HeadlessBackend> {
        backend.register_kernel(SIMULATE_ENTRY_POINT, Box::new(ParticleKernel::new()));
        let texture = Texture::from_rgba8(backend, "white", 1, 1, &[255; 4]).unwrap();
        let shaders = ParticleShaders::from_sources(SIMULATE, BILLBOARD, PARTICLE).unwrap();
        ParticleSystem::new(
            backend,
            ParticleSystemDescriptor { capacity, shaders },
            texture,
        )
        .unwrap()
    }

    #[test]
    fn test_burn_rate() {
        let mut backend = HeadlessBackend::new();
        let mut system = system(&mut backend, 8);
        assert_eq!(system.burn_rate(), 1.0);
        system.lifetime = 2.0;
        assert_eq!(system.burn_rate(), 0.5);
        system.lifetime = 0.0005;
        assert_eq!(system.burn_rate(), 1.0 / 0.0005);
        system.lifetime = 0.0;
        assert_eq!(system.burn_rate(), 0.0);
        system.lifetime = -1.0;
        assert_eq!(system.burn_rate(), 0.0);
        system.lifetime = f32::NAN;
        assert_eq!(system.burn_rate(), 0.0);
    }

    #[test]
    fn test_capacity_limits() {
        let mut backend = HeadlessBackend::new();
        let texture = Texture::from_rgba8(&mut backend, "white", 1, 1, &[255; 4]).unwrap();
        for capacity in [0, 65536] {
            let shaders = ParticleShaders::from_sources(SIMULATE, BILLBOARD, PARTICLE).unwrap();
            let result = ParticleSystem::new(
                &mut backend,
                ParticleSystemDescriptor { capacity, shaders },
                Arc::clone(&texture),
            );
            assert!(matches!(result, Err(RenderError::InvalidState(_))));
        }
    }

    #[test]
    fn test_update_pushes_simulation_uniforms() {
        let mut backend = HeadlessBackend::new();
        let mut system = system(&mut backend, 4);
        system.position = Vec3::new(1.0, 2.0, 3.0);
        system.acceleration = Vec3::new(0.0, -1.0, 0.0);
        system.lifetime = 4.0;

        backend.clear_commands();
        system.update(&mut backend, 0.016);

        let simulate = system.simulate_material();
        assert_eq!(simulate.float("dt"), Some(0.016));
        assert_eq!(simulate.float("burnRate"), Some(0.25));
        assert_eq!(simulate.vec3("basePosition"), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(simulate.vec3("acceleration"), Some(Vec3::new(0.0, -1.0, 0.0)));

        let commands = backend.commands();
        let buffer = Some(system.buffer().id());
        assert_eq!(
            commands.first(),
            Some(&GpuCommand::BindStorageBuffer { binding: 0, buffer })
        );
        assert!(commands.contains(&GpuCommand::Dispatch([4, 1, 1])));
        assert_eq!(
            commands.last(),
            Some(&GpuCommand::BindStorageBuffer {
                binding: 0,
                buffer: None
            })
        );
    }

    #[test]
    fn test_draw_restores_state() {
        let mut backend = HeadlessBackend::new();
        let mut system = system(&mut backend, 4);

        backend.clear_commands();
        system.draw(&mut backend);

        let commands = backend.commands();
        assert_eq!(commands[0], GpuCommand::SetBlend(Some(BlendMode::Additive)));
        assert_eq!(
            commands[1],
            GpuCommand::SetVertexBuffer(Some(system.buffer().id()))
        );
        assert!(commands.contains(&GpuCommand::DrawPoints { first: 0, count: 4 }));
        assert_eq!(commands[commands.len() - 2], GpuCommand::SetVertexBuffer(None));
        assert_eq!(commands[commands.len() - 1], GpuCommand::SetBlend(None));
        assert_eq!(backend.blend(), None);
        assert_eq!(backend.current_program(), None);
        assert_eq!(system.material().vec2("particleSize"), Some(Vec2::new(100.0, 100.0)));
    }

    #[test]
    fn test_reset_restores_staggered_ages() {
        let mut backend = HeadlessBackend::new();
        let mut system = system(&mut backend, 10);
        system.update(&mut backend, 0.37);
        system.reset(&mut backend);

        let particles: Vec<Particle> = backend.read_buffer(system.buffer());
        assert_eq!(particles, ParticlePool::new(10).particles());
    }
}
