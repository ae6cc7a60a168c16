//! 自由飞行相机
//!
//! 鼠标控制朝向（yaw/pitch），W/A/S/D 水平移动，Space/Shift 上下移动。

use glam::{Mat4, Vec3};

use crate::config::InputConfig;

/// 俯仰角限制（约 89°）
const PITCH_LIMIT: f32 = 1.5533;

/// 相机移动按键状态
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraInput {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

/// 自由飞行相机
#[derive(Debug, Clone)]
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    /// 移动速度（单位/秒）
    pub speed: f32,
    /// 鼠标灵敏度（弧度/像素）
    pub sensitivity: f32,
    pub invert_y: bool,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.5, 2.0),
            // 朝向 -Z
            yaw: -std::f32::consts::FRAC_PI_2,
            pitch: 0.0,
            speed: 2.0,
            sensitivity: 0.003,
            invert_y: false,
            fov: 0.75,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl FlyCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按输入配置创建
    pub fn from_config(config: &InputConfig) -> Self {
        Self {
            speed: config.move_speed,
            sensitivity: config.mouse_sensitivity,
            invert_y: config.mouse_invert_y,
            ..Self::default()
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
    }

    pub fn right(&self) -> Vec3 {
        Vec3::new(
            (self.yaw + std::f32::consts::FRAC_PI_2).cos(),
            0.0,
            (self.yaw + std::f32::consts::FRAC_PI_2).sin(),
        )
    }

    pub fn up(&self) -> Vec3 {
        Vec3::Y
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), self.up())
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    /// 投影 × 视图
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// 鼠标移动（像素增量，屏幕向下为正）
    pub fn on_mouse_move(&mut self, delta_x: f32, delta_y: f32) {
        let delta_y = if self.invert_y { delta_y } else { -delta_y };
        self.yaw += delta_x * self.sensitivity;
        self.pitch = (self.pitch + delta_y * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn update(&mut self, input: &CameraInput, dt: f32) {
        let mut movement = Vec3::ZERO;

        if input.forward {
            movement += self.forward();
        }
        if input.back {
            movement -= self.forward();
        }
        if input.right {
            movement += self.right();
        }
        if input.left {
            movement -= self.right();
        }
        if input.up {
            movement += self.up();
        }
        if input.down {
            movement -= self.up();
        }

        if movement.length_squared() > 0.0 {
            self.position += movement.normalize() * self.speed * dt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_looks_down_negative_z() {
        let cam = FlyCamera::new();
        let fwd = cam.forward();
        assert!(fwd.x.abs() < 1e-6);
        assert!((fwd.z + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pitch_clamp() {
        let mut cam = FlyCamera::new();
        cam.on_mouse_move(0.0, -100_000.0);
        assert_eq!(cam.pitch, PITCH_LIMIT);
        cam.on_mouse_move(0.0, 100_000.0);
        assert_eq!(cam.pitch, -PITCH_LIMIT);
    }

    #[test]
    fn test_invert_y() {
        let mut cam = FlyCamera::new();
        cam.invert_y = true;
        cam.on_mouse_move(0.0, 10.0);
        assert!(cam.pitch > 0.0);
    }

    #[test]
    fn test_forward_movement() {
        let mut cam = FlyCamera::new().with_position(Vec3::ZERO);
        cam.speed = 10.0;
        let input = CameraInput {
            forward: true,
            ..Default::default()
        };
        cam.update(&input, 1.0);
        assert!(cam.position.z < -9.9);
    }

    #[test]
    fn test_view_projection_centers_target() {
        let cam = FlyCamera::new().with_position(Vec3::new(0.0, 0.0, 2.0));
        let clip = cam.view_projection(4.0 / 3.0) * Vec3::new(0.0, 0.0, -0.5).extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }
}
