//! 演示程序状态
//!
//! 输入回调与帧循环共享的全部状态，由事件循环显式持有并传递。

use glam::Vec2;

use crate::config::EngineConfig;
use crate::core::clock::FrameCounter;
use crate::core::controls::{apply_key, ControlAction};
use crate::platform::KeyCode;
use crate::render::backend::RenderBackend;
use crate::render::camera::{CameraInput, FlyCamera};
use crate::render::particles::ParticleSystem;

pub struct DemoState<B: RenderBackend> {
    pub particles: ParticleSystem<B>,
    pub camera: FlyCamera,
    pub camera_input: CameraInput,
    viewport: Vec2,
    frame_counter: FrameCounter,
}

impl<B: RenderBackend> DemoState<B> {
    pub fn new(mut particles: ParticleSystem<B>, config: &EngineConfig, viewport: (u32, u32)) -> Self {
        particles.apply_config(&config.particles);
        Self {
            particles,
            camera: FlyCamera::from_config(&config.input),
            camera_input: CameraInput::default(),
            viewport: Vec2::new(viewport.0 as f32, viewport.1 as f32),
            frame_counter: FrameCounter::new(),
        }
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    /// 处理按键，重复触发的按下只影响移动状态
    pub fn handle_key(&mut self, key: KeyCode, pressed: bool, repeat: bool) -> ControlAction {
        let input = &mut self.camera_input;
        match key {
            KeyCode::W => input.forward = pressed,
            KeyCode::S => input.back = pressed,
            KeyCode::A => input.left = pressed,
            KeyCode::D => input.right = pressed,
            KeyCode::Space => input.up = pressed,
            KeyCode::Shift => input.down = pressed,
            _ => {}
        }

        if !pressed || repeat {
            return ControlAction::None;
        }
        apply_key(key, &mut self.particles)
    }

    pub fn handle_mouse_motion(&mut self, dx: f64, dy: f64) {
        self.camera.on_mouse_move(dx as f32, dy as f32);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.viewport = Vec2::new(width as f32, height as f32);
        }
    }

    /// 帧更新与绘制，满一秒时返回 FPS
    ///
    /// 调用方负责在此之前开始帧、之后呈现。
    pub fn frame(&mut self, backend: &mut B, dt: f32) -> Option<u32> {
        let fps = self.frame_counter.tick(dt);

        self.camera.update(&self.camera_input, dt);
        self.particles.update(backend, dt);

        let aspect = self.viewport.x / self.viewport.y;
        let material = self.particles.material_mut();
        material.set_matrix("cameraView", self.camera.view_projection(aspect));
        material.set_vec2("viewport", self.viewport);

        self.particles.draw(backend);
        fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::{GpuCommand, HeadlessBackend};
    use crate::render::particles::{
        ParticleKernel, ParticleShaders, ParticleSystemDescriptor, SIMULATE_ENTRY_POINT,
    };
    use crate::render::texture::Texture;

    fn demo(backend: &mut HeadlessBackend) -> DemoState<HeadlessBackend> {
        backend.register_kernel(SIMULATE_ENTRY_POINT, Box::new(ParticleKernel::new()));
        let shaders = ParticleShaders::from_sources(
            include_str!("../../assets/shaders/simulate.wgsl"),
            include_str!("../../assets/shaders/billboard.wgsl"),
            include_str!("../../assets/shaders/particle.wgsl"),
        )
        .unwrap();
        let texture = Texture::from_rgba8(backend, "white", 1, 1, &[255; 4]).unwrap();
        let particles = ParticleSystem::new(
            backend,
            ParticleSystemDescriptor {
                capacity: 16,
                shaders,
            },
            texture,
        )
        .unwrap();
        DemoState::new(particles, &EngineConfig::default(), (800, 600))
    }

    #[test]
    fn test_frame_sets_render_uniforms() {
        let mut backend = HeadlessBackend::new();
        let mut state = demo(&mut backend);
        state.frame(&mut backend, 0.016);

        let material = state.particles.material();
        assert_eq!(material.vec2("viewport"), Some(Vec2::new(800.0, 600.0)));
        assert_eq!(
            material.matrix("cameraView"),
            Some(state.camera.view_projection(800.0 / 600.0))
        );

        let commands = backend.commands();
        let dispatch = commands
            .iter()
            .position(|c| matches!(c, GpuCommand::Dispatch(_)))
            .unwrap();
        let draw = commands
            .iter()
            .position(|c| matches!(c, GpuCommand::DrawPoints { .. }))
            .unwrap();
        assert!(dispatch < draw);
    }

    #[test]
    fn test_key_repeat_ignored() {
        let mut backend = HeadlessBackend::new();
        let mut state = demo(&mut backend);
        state.handle_key(KeyCode::R, true, false);
        state.handle_key(KeyCode::R, true, true);
        state.handle_key(KeyCode::R, false, false);
        assert_eq!(state.particles.acceleration.y, 1.0);
    }

    #[test]
    fn test_movement_keys_track_state() {
        let mut backend = HeadlessBackend::new();
        let mut state = demo(&mut backend);
        state.handle_key(KeyCode::W, true, false);
        assert!(state.camera_input.forward);
        state.handle_key(KeyCode::W, false, false);
        assert!(!state.camera_input.forward);
    }

    #[test]
    fn test_resize_ignores_zero() {
        let mut backend = HeadlessBackend::new();
        let mut state = demo(&mut backend);
        state.resize(0, 0);
        assert_eq!(state.viewport(), Vec2::new(800.0, 600.0));
        state.resize(1024, 768);
        assert_eq!(state.viewport(), Vec2::new(1024.0, 768.0));
    }
}
