//! 键盘控制
//!
//! | 按键 | 作用 |
//! |------|------|
//! | R / F | 竖直加速度 ±1 |
//! | T / G | 粒子尺寸 ±50（两个轴） |
//! | Escape | 退出 |

use glam::Vec2;

use crate::platform::KeyCode;
use crate::render::backend::RenderBackend;
use crate::render::particles::ParticleSystem;

/// 每次按键的加速度步长
pub const ACCELERATION_STEP: f32 = 1.0;
/// 每次按键的尺寸步长（像素）
pub const SIZE_STEP: f32 = 50.0;

/// 按键产生的动作
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlAction {
    None,
    Exit,
    AccelerationChanged(f32),
    ParticleSizeChanged(Vec2),
}

/// 把一次按下应用到粒子系统
pub fn apply_key<B: RenderBackend>(key: KeyCode, particles: &mut ParticleSystem<B>) -> ControlAction {
    match key {
        KeyCode::R | KeyCode::F => {
            let step = if key == KeyCode::R {
                ACCELERATION_STEP
            } else {
                -ACCELERATION_STEP
            };
            particles.acceleration.y += step;
            tracing::debug!(target: "engine", "Acceleration: {}", particles.acceleration.y);
            ControlAction::AccelerationChanged(particles.acceleration.y)
        }
        KeyCode::T | KeyCode::G => {
            let step = if key == KeyCode::T { SIZE_STEP } else { -SIZE_STEP };
            particles.particle_size += Vec2::splat(step);
            tracing::debug!(target: "engine", "Particle size: {}", particles.particle_size);
            ControlAction::ParticleSizeChanged(particles.particle_size)
        }
        KeyCode::Escape => ControlAction::Exit,
        _ => ControlAction::None,
    }
}

/// 控制说明
pub fn help_lines() -> [&'static str; 5] {
    [
        "Mouse: look around, W/A/S/D/Space/Shift: move",
        "R/F: increase/decrease vertical acceleration",
        "T/G: increase/decrease particle size",
        "Escape: exit",
        "Window title shows FPS",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::HeadlessBackend;
    use crate::render::particles::{ParticleShaders, ParticleSystemDescriptor};
    use crate::render::texture::Texture;

    fn system(backend: &mut HeadlessBackend) -> ParticleSystem<HeadlessBackend> {
        let shaders = ParticleShaders::from_sources(
            include_str!("../../assets/shaders/simulate.wgsl"),
            include_str!("../../assets/shaders/billboard.wgsl"),
            include_str!("../../assets/shaders/particle.wgsl"),
        )
        .unwrap();
        let texture = Texture::from_rgba8(backend, "white", 1, 1, &[255; 4]).unwrap();
        ParticleSystem::new(
            backend,
            ParticleSystemDescriptor {
                capacity: 4,
                shaders,
            },
            texture,
        )
        .unwrap()
    }

    #[test]
    fn test_size_up_then_down() {
        let mut backend = HeadlessBackend::new();
        let mut particles = system(&mut backend);
        let before = particles.particle_size;

        assert_eq!(
            apply_key(KeyCode::T, &mut particles),
            ControlAction::ParticleSizeChanged(before + Vec2::splat(50.0))
        );
        apply_key(KeyCode::G, &mut particles);
        assert_eq!(particles.particle_size, before);
    }

    #[test]
    fn test_acceleration_steps() {
        let mut backend = HeadlessBackend::new();
        let mut particles = system(&mut backend);
        for _ in 0..3 {
            apply_key(KeyCode::R, &mut particles);
        }
        assert_eq!(particles.acceleration.y, 3.0);
        assert_eq!(
            apply_key(KeyCode::F, &mut particles),
            ControlAction::AccelerationChanged(2.0)
        );
    }

    #[test]
    fn test_escape_and_other_keys() {
        let mut backend = HeadlessBackend::new();
        let mut particles = system(&mut backend);
        assert_eq!(apply_key(KeyCode::Escape, &mut particles), ControlAction::Exit);
        assert_eq!(apply_key(KeyCode::W, &mut particles), ControlAction::None);
    }
}
