//! 引擎主入口
//!
//! 定义Engine结构和主运行循环

use std::sync::Arc;

use winit::event::{DeviceEvent, ElementState, Event, WindowEvent};
use winit::event_loop::EventLoop;

use crate::config::{AssetConfig, EngineConfig, LogLevel};
use crate::core::clock::{FrameClock, FrameCounter};
use crate::core::controls::{help_lines, ControlAction};
use crate::core::demo::DemoState;
use crate::platform::{KeyCode, Window, WinitWindow};
use crate::render::particles::{ParticleShaders, ParticleSystem, ParticleSystemDescriptor};
use crate::render::texture::Texture;
use crate::render::wgpu_backend::WgpuBackend;

use super::error::{AssetError, AssetResult, EngineError, EngineResult};

/// 粒子演示程序入口
///
/// # 示例
///
/// ```no_run
/// use gpu_particles::core::Engine;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     Engine::run()?;
///     Ok(())
/// }
/// ```
///
/// # 生命周期
///
/// 1. **初始化阶段**：加载配置、初始化日志、校验资源、创建窗口和渲染后端
/// 2. **运行阶段**：每帧模拟并绘制粒子
/// 3. **关闭阶段**：事件循环退出后释放全部 GPU 资源
pub struct Engine;

impl Engine {
    /// 运行演示程序直到窗口关闭或按下 Escape
    pub fn run() -> EngineResult<()> {
        let discovery = EngineConfig::discover();
        let mut config = discovery.config.clone();
        config.apply_env_overrides();

        Self::initialize_logging(config.logging.level);
        discovery.report();
        config.validate()?;
        tracing::info!(target: "config", "Particle capacity: {}", config.particles.capacity);

        validate_assets(&config.assets)?;

        let event_loop = EventLoop::new()
            .map_err(|e| EngineError::EventLoop(format!("Failed to create event loop: {}", e)))?;
        let window = WinitWindow::try_new(&event_loop, &config.window)
            .ok_or_else(|| EngineError::Window("Failed to create window".to_string()))?;

        let mut backend = pollster::block_on(WgpuBackend::new(window.handle(), config.window.vsync))?;

        let texture = Texture::load(&mut backend, config.assets.texture_path())?;
        let shaders = ParticleShaders::load(&config.assets)?;
        let particles = ParticleSystem::new(
            &mut backend,
            ParticleSystemDescriptor {
                capacity: config.particles.capacity,
                shaders,
            },
            Arc::clone(&texture),
        )?;
        drop(texture);

        let state = DemoState::new(particles, &config, backend.size());

        if config.input.grab_cursor {
            if window.set_cursor_grab(true) {
                window.set_cursor_visible(false);
            } else {
                tracing::warn!(target: "engine", "Cursor grab is not supported on this platform");
            }
        }

        for line in help_lines() {
            tracing::info!(target: "engine", "{}", line);
        }

        Self::run_event_loop(event_loop, window, backend, state, config.window.clear_color)?;

        tracing::info!(target: "engine", "Engine shutting down");
        Ok(())
    }

    /// 初始化日志系统
    ///
    /// `RUST_LOG` 优先，未设置时使用配置中的级别。
    fn initialize_logging(level: LogLevel) {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.as_filter()));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        tracing::info!(target: "engine", "Engine starting");
    }

    fn run_event_loop(
        event_loop: EventLoop<()>,
        window: WinitWindow,
        mut backend: WgpuBackend,
        mut state: DemoState<WgpuBackend>,
        clear_color: [f64; 4],
    ) -> EngineResult<()> {
        let mut clock = FrameClock::new();
        let mut fatal: Option<EngineError> = None;
        let window_id = window.raw().id();

        event_loop
            .run(|event, elwt| match event {
                Event::WindowEvent {
                    event,
                    window_id: id,
                } if id == window_id => match event {
                    WindowEvent::CloseRequested => elwt.exit(),
                    WindowEvent::Resized(size) => {
                        backend.resize(size.width, size.height);
                        state.resize(size.width, size.height);
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        let key = KeyCode::from_physical(event.physical_key);
                        let pressed = event.state == ElementState::Pressed;
                        if state.handle_key(key, pressed, event.repeat) == ControlAction::Exit {
                            elwt.exit();
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        let dt = clock.delta();
                        match backend.begin_frame(clear_color) {
                            Ok(true) => {
                                if let Some(fps) = state.frame(&mut backend, dt) {
                                    window.set_title(&FrameCounter::title(fps));
                                }
                                backend.end_frame();
                            }
                            Ok(false) => {}
                            Err(e) => {
                                tracing::error!(target: "engine", "Fatal surface error: {}", e);
                                fatal = Some(e.into());
                                elwt.exit();
                            }
                        }
                    }
                    _ => {}
                },
                Event::DeviceEvent {
                    event: DeviceEvent::MouseMotion { delta },
                    ..
                } => state.handle_mouse_motion(delta.0, delta.1),
                Event::AboutToWait => window.request_redraw(),
                _ => {}
            })
            .map_err(|e| EngineError::EventLoop(e.to_string()))?;

        match fatal {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// 校验启动所需的着色器和纹理文件都存在
pub fn validate_assets(assets: &AssetConfig) -> AssetResult<()> {
    for path in assets.required_files() {
        if !path.is_file() {
            return Err(AssetError::NotFound {
                path: path.display().to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_validate_assets_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetConfig {
            root: dir.path().to_path_buf(),
            ..AssetConfig::default()
        };
        let err = validate_assets(&assets).unwrap_err();
        assert!(matches!(err, AssetError::NotFound { .. }));
    }

    #[test]
    fn test_validate_assets_complete() {
        let dir = tempfile::tempdir().unwrap();
        let assets = AssetConfig {
            root: dir.path().to_path_buf(),
            ..AssetConfig::default()
        };
        fs::create_dir_all(dir.path().join("shaders")).unwrap();
        for path in assets.required_files() {
            fs::write(path, b"").unwrap();
        }
        assert!(validate_assets(&assets).is_ok());
    }

    #[test]
    fn test_bundled_assets_present() {
        let assets = AssetConfig {
            root: std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets"),
            ..AssetConfig::default()
        };
        assert!(validate_assets(&assets).is_ok());
    }
}
