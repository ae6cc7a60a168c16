/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖和启动时校验
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod input;
pub mod particles;
pub mod window;

pub use input::InputConfig;
pub use particles::ParticleConfig;
pub use window::WindowConfig;

use crate::impl_default;

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 演示程序主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 窗口配置
    #[serde(default)]
    pub window: WindowConfig,

    /// 粒子系统配置
    #[serde(default)]
    pub particles: ParticleConfig,

    /// 相机与鼠标输入配置
    #[serde(default)]
    pub input: InputConfig,

    /// 资源路径配置
    #[serde(default)]
    pub assets: AssetConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// 按给定的查找函数覆盖配置（便于测试时注入变量）
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // 窗口配置
        if let Some(width) = lookup("PARTICLES_WINDOW_WIDTH").and_then(|v| v.parse().ok()) {
            self.window.width = width;
        }
        if let Some(height) = lookup("PARTICLES_WINDOW_HEIGHT").and_then(|v| v.parse().ok()) {
            self.window.height = height;
        }
        if let Some(val) = lookup("PARTICLES_VSYNC") {
            self.window.vsync = val.parse().unwrap_or(self.window.vsync);
        }

        // 粒子配置
        if let Some(capacity) = lookup("PARTICLES_CAPACITY").and_then(|v| v.parse().ok()) {
            self.particles.capacity = capacity;
        }
        if let Some(lifetime) = lookup("PARTICLES_LIFETIME").and_then(|v| v.parse().ok()) {
            self.particles.lifetime = lifetime;
        }

        // 资源目录
        if let Some(dir) = lookup("PARTICLES_ASSET_DIR") {
            self.assets.root = PathBuf::from(dir);
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.window.validate()?;
        self.particles.validate()?;
        self.input.validate()?;
        Ok(())
    }

    /// 自动查找并加载配置文件
    ///
    /// 按以下顺序查找：
    /// 1. ./config.toml
    /// 2. ./config.json
    /// 3. ~/.config/gpu_particles/config.toml
    /// 4. 使用默认配置
    ///
    /// 不输出日志，可在日志系统初始化之前调用，之后用 [`ConfigDiscovery::report`] 补记。
    pub fn discover() -> ConfigDiscovery {
        let mut candidates = vec![PathBuf::from("config.toml"), PathBuf::from("config.json")];
        if let Some(home) = dirs::home_dir() {
            candidates.push(
                home.join(".config")
                    .join("gpu_particles")
                    .join("config.toml"),
            );
        }
        Self::discover_in(candidates)
    }

    /// 按顺序尝试候选文件，返回第一个成功解析的配置
    ///
    /// 不存在的文件直接跳过；存在但无法读取或解析的文件记入 `rejected`。
    pub fn discover_in<I>(candidates: I) -> ConfigDiscovery
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut rejected = Vec::new();
        for path in candidates {
            let loaded = match path.extension().and_then(|ext| ext.to_str()) {
                Some("json") => Self::from_json_file(&path),
                _ => Self::from_toml_file(&path),
            };
            match loaded {
                Ok(config) => {
                    return ConfigDiscovery {
                        config,
                        source: Some(path),
                        rejected,
                    }
                }
                Err(ConfigError::FileError(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => rejected.push((path, e)),
            }
        }

        ConfigDiscovery {
            config: Self::default(),
            source: None,
            rejected,
        }
    }
}

/// 配置查找结果
#[derive(Debug)]
pub struct ConfigDiscovery {
    /// 生效的配置
    pub config: EngineConfig,
    /// 配置来源，`None` 表示默认配置
    pub source: Option<PathBuf>,
    /// 存在但无法加载的文件及其错误
    pub rejected: Vec<(PathBuf, ConfigError)>,
}

impl ConfigDiscovery {
    /// 记录配置来源，并对每个被跳过的文件输出警告
    pub fn report(&self) {
        for (path, error) in &self.rejected {
            tracing::warn!(target: "config", "Ignoring config file {:?}: {}", path, error);
        }
        match &self.source {
            Some(path) => tracing::info!(target: "config", "Loaded config from {:?}", path),
            None => tracing::info!(target: "config", "Using default configuration"),
        }
    }
}

/// 资源路径配置
///
/// 所有路径相对 `root` 解析。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetConfig {
    /// 资源根目录
    pub root: PathBuf,
    /// 计算着色器（模拟）
    pub simulate_shader: PathBuf,
    /// 顶点着色器（点扩展为面片）
    pub vertex_shader: PathBuf,
    /// 片元着色器
    pub fragment_shader: PathBuf,
    /// 粒子纹理
    pub texture: PathBuf,
}

impl_default!(AssetConfig {
    root: PathBuf::from("assets"),
    simulate_shader: PathBuf::from("shaders/simulate.wgsl"),
    vertex_shader: PathBuf::from("shaders/billboard.wgsl"),
    fragment_shader: PathBuf::from("shaders/particle.wgsl"),
    texture: PathBuf::from("particle.png"),
});

impl AssetConfig {
    /// 计算着色器完整路径
    pub fn simulate_shader_path(&self) -> PathBuf {
        self.root.join(&self.simulate_shader)
    }

    /// 顶点着色器完整路径
    pub fn vertex_shader_path(&self) -> PathBuf {
        self.root.join(&self.vertex_shader)
    }

    /// 片元着色器完整路径
    pub fn fragment_shader_path(&self) -> PathBuf {
        self.root.join(&self.fragment_shader)
    }

    /// 纹理完整路径
    pub fn texture_path(&self) -> PathBuf {
        self.root.join(&self.texture)
    }

    /// 启动时必须存在的全部文件
    pub fn required_files(&self) -> [PathBuf; 4] {
        [
            self.simulate_shader_path(),
            self.vertex_shader_path(),
            self.fragment_shader_path(),
            self.texture_path(),
        ]
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别（`RUST_LOG` 未设置时生效）
    pub level: LogLevel,
}

impl_default!(LoggingConfig {
    level: LogLevel::Info,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    /// 转换为 `EnvFilter` 指令
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
