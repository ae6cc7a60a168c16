//! 统一错误处理模块
//!
//! 提供演示程序范围内的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **渲染错误** (`RenderError`): 设备、表面、着色器、管线相关
//! - **资源错误** (`AssetError`): 着色器源文件与纹理图片的加载
//! - **配置错误** (`config::ConfigError`): 配置文件读取与校验
//!
//! `EngineError` 汇总所有层的错误，由 `Engine::run` 返回给 `main`。
//!
//! 缺失的 uniform 不属于错误：它只记录一条诊断日志，渲染继续进行。

use crate::config::ConfigError;
use thiserror::Error;

/// 引擎核心错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Window creation failed: {0}")]
    Window(String),

    #[error("Event loop error: {0}")]
    EventLoop(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 渲染系统错误
#[derive(Error, Debug, Clone)]
pub enum RenderError {
    #[error("Failed to create surface: {0}")]
    SurfaceCreation(String),

    #[error("Failed to request adapter: no compatible GPU found")]
    NoAdapter,

    #[error("Failed to request device: {0}")]
    DeviceRequest(String),

    #[error("Failed to create shader: {0}")]
    ShaderCompilation(String),

    #[error("Failed to create texture: {0}")]
    TextureCreation(String),

    #[error("Surface error: {0}")]
    Surface(String),

    #[error("Invalid render state: {0}")]
    InvalidState(String),
}

/// 资源管理错误
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset not found: {path}")]
    NotFound { path: String },

    #[error("Failed to load asset: {path}, reason: {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Asset decode error: {0}")]
    Decode(String),
}

/// 引擎结果类型别名
pub type EngineResult<T> = Result<T, EngineError>;
pub type RenderResult<T> = Result<T, RenderError>;
pub type AssetResult<T> = Result<T, AssetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let asset_err = AssetError::NotFound {
            path: "particle.png".to_string(),
        };
        let engine_err: EngineError = asset_err.into();
        assert!(matches!(engine_err, EngineError::Asset(_)));

        let render_err = RenderError::InvalidState("capacity".to_string());
        let engine_err: EngineError = render_err.into();
        assert!(matches!(engine_err, EngineError::Render(_)));
    }

    #[test]
    fn test_error_display() {
        let err = RenderError::NoAdapter;
        assert_eq!(
            err.to_string(),
            "Failed to request adapter: no compatible GPU found"
        );

        let err = AssetError::NotFound {
            path: "assets/shaders/simulate.wgsl".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Asset not found: assets/shaders/simulate.wgsl"
        );
    }
}
