use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// 窗口标题（运行时会被 FPS 显示替换）
    pub title: String,

    /// 宽度（像素）
    pub width: u32,

    /// 高度（像素）
    pub height: u32,

    /// 垂直同步
    pub vsync: bool,

    /// 清屏颜色（RGBA）
    pub clear_color: [f64; 4],
}

impl_default!(WindowConfig {
    title: "Particles!".to_string(),
    width: 800,
    height: 600,
    vsync: true,
    clear_color: [0.0, 0.0, 0.0, 0.0],
});

impl WindowConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::ValidationError(
                "Invalid window size".to_string(),
            ));
        }
        Ok(())
    }
}
