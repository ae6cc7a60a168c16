use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 输入与相机配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// 鼠标灵敏度（弧度/像素）
    pub mouse_sensitivity: f32,

    /// 鼠标反转Y轴
    pub mouse_invert_y: bool,

    /// 相机移动速度（单位/秒）
    pub move_speed: f32,

    /// 启动时是否锁定鼠标
    pub grab_cursor: bool,
}

impl_default!(InputConfig {
    mouse_sensitivity: 0.003,
    mouse_invert_y: false,
    move_speed: 2.0,
    grab_cursor: true,
});

impl InputConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.mouse_sensitivity > 0.0) || !(self.move_speed > 0.0) {
            return Err(ConfigError::ValidationError(
                "Mouse sensitivity and move speed must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
