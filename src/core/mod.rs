//! 核心模块
//!
//! 包含演示程序的核心功能：
//! - `engine` - 主入口和运行循环
//! - `controls` - 键盘控制到粒子参数的映射
//! - `clock` - 帧计时与 FPS 统计
//! - `demo` - 输入回调与帧循环共享的状态
//! - `error` - 错误类型定义

pub mod clock;
pub mod controls;
pub mod demo;
pub mod engine;
pub mod error;
#[macro_use]
pub mod macros;

// 重新导出错误类型
pub use error::{
    AssetError, AssetResult, EngineError, EngineResult, RenderError, RenderResult,
};

// 重新导出主要类型
pub use clock::{FrameClock, FrameCounter};
pub use controls::{apply_key, ControlAction};
pub use demo::DemoState;
pub use engine::{validate_assets, Engine};
