pub mod winit;

pub use self::winit::WinitWindow;

use ::winit::keyboard::{KeyCode as WinitKeyCode, PhysicalKey};

// ============================================================================
// Platform Window Abstraction
// ============================================================================

/// 平台窗口抽象
pub trait Window {
    fn size(&self) -> (u32, u32);
    fn scale_factor(&self) -> f64;
    fn request_redraw(&self);
    fn set_title(&self, title: &str);
    fn set_cursor_visible(&self, visible: bool);
    /// 锁定鼠标，返回是否成功
    fn set_cursor_grab(&self, grab: bool) -> bool;
}

// ============================================================================
// Input Abstraction
// ============================================================================

/// 演示程序关心的按键
///
/// 按物理位置识别，与键盘布局无关。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    W, A, S, D,
    R, F, T, G,
    Space, Shift,
    Escape,
    Unknown,
}

impl KeyCode {
    /// 从 winit 物理按键转换
    pub fn from_physical(key: PhysicalKey) -> Self {
        match key {
            PhysicalKey::Code(code) => Self::from_winit(code),
            PhysicalKey::Unidentified(_) => KeyCode::Unknown,
        }
    }

    pub fn from_winit(code: WinitKeyCode) -> Self {
        match code {
            WinitKeyCode::KeyW => KeyCode::W,
            WinitKeyCode::KeyA => KeyCode::A,
            WinitKeyCode::KeyS => KeyCode::S,
            WinitKeyCode::KeyD => KeyCode::D,
            WinitKeyCode::KeyR => KeyCode::R,
            WinitKeyCode::KeyF => KeyCode::F,
            WinitKeyCode::KeyT => KeyCode::T,
            WinitKeyCode::KeyG => KeyCode::G,
            WinitKeyCode::Space => KeyCode::Space,
            WinitKeyCode::ShiftLeft | WinitKeyCode::ShiftRight => KeyCode::Shift,
            WinitKeyCode::Escape => KeyCode::Escape,
            _ => KeyCode::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert_eq!(KeyCode::from_winit(WinitKeyCode::KeyR), KeyCode::R);
        assert_eq!(KeyCode::from_winit(WinitKeyCode::ShiftRight), KeyCode::Shift);
        assert_eq!(
            KeyCode::from_physical(PhysicalKey::Code(WinitKeyCode::Escape)),
            KeyCode::Escape
        );
        assert_eq!(KeyCode::from_winit(WinitKeyCode::KeyQ), KeyCode::Unknown);
    }
}
