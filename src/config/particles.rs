use super::{ConfigError, ConfigResult};
use crate::impl_default;
use crate::render::particles::DEFAULT_MAX_PARTICLES;
use serde::{Deserialize, Serialize};

/// 粒子系统配置
///
/// 对应 `ParticleSystem` 的公开可变字段，启动时写入一次。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleConfig {
    /// 粒子池容量
    pub capacity: u32,

    /// 粒子回收周期（秒）
    pub lifetime: f32,

    /// 发射位置
    pub position: [f32; 3],

    /// 全局加速度
    pub acceleration: [f32; 3],

    /// 粒子尺寸（像素）
    pub particle_size: [f32; 2],
}

impl_default!(ParticleConfig {
    capacity: DEFAULT_MAX_PARTICLES,
    lifetime: 1.0,
    position: [0.0, 0.0, -0.5],
    acceleration: [0.0, 0.0, 0.0],
    particle_size: [100.0, 100.0],
});

impl ParticleConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "Particle capacity must be at least 1".to_string(),
            ));
        }
        if !(self.lifetime > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "Particle lifetime must be positive, got {}",
                self.lifetime
            )));
        }
        Ok(())
    }
}
