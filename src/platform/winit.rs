use std::sync::Arc;

use winit::dpi::PhysicalSize;
use winit::event_loop::EventLoop;
use winit::window::{CursorGrabMode, Window as WinitWindowRaw, WindowBuilder};

use crate::config::WindowConfig;

#[derive(Clone)]
pub struct WinitWindow {
    window: Arc<WinitWindowRaw>,
}

impl WinitWindow {
    /// 按配置创建窗口
    pub fn try_new(event_loop: &EventLoop<()>, config: &WindowConfig) -> Option<Self> {
        let window = WindowBuilder::new()
            .with_title(&config.title)
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .build(event_loop)
            .map_err(|e| tracing::error!(target: "platform", "Failed to create window: {}", e))
            .ok()?;
        Some(Self {
            window: Arc::new(window),
        })
    }

    pub fn raw(&self) -> &WinitWindowRaw {
        &self.window
    }

    /// 共享窗口句柄（渲染表面需要 `'static` 所有权）
    pub fn handle(&self) -> Arc<WinitWindowRaw> {
        Arc::clone(&self.window)
    }
}

impl crate::platform::Window for WinitWindow {
    fn size(&self) -> (u32, u32) {
        let s = self.window.inner_size();
        (s.width, s.height)
    }
    fn scale_factor(&self) -> f64 {
        self.window.scale_factor()
    }
    fn request_redraw(&self) {
        self.window.request_redraw();
    }
    fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }
    fn set_cursor_visible(&self, visible: bool) {
        self.window.set_cursor_visible(visible);
    }
    fn set_cursor_grab(&self, grab: bool) -> bool {
        if !grab {
            return self.window.set_cursor_grab(CursorGrabMode::None).is_ok();
        }
        // 部分平台只支持其中一种模式
        self.window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined))
            .is_ok()
    }
}
