//! 核心宏定义
//!
//! 提供统一的宏来减少配置结构体的样板代码

/// 为结构体实现Default trait的宏
///
/// 使用示例:
/// ```rust
/// use gpu_particles::impl_default;
///
/// struct WindowSize {
///     width: u32,
///     height: u32,
/// }
///
/// impl_default!(WindowSize {
///     width: 800,
///     height: 600,
/// });
///
/// let size = WindowSize::default();
/// assert_eq!(size.width, 800);
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    struct Limits {
        lifetime: f32,
        label: String,
    }

    impl_default!(Limits {
        lifetime: 1.0,
        label: "particles".to_string(),
    });

    #[test]
    fn test_impl_default() {
        let limits = Limits::default();
        assert_eq!(limits.lifetime, 1.0);
        assert_eq!(limits.label, "particles");
    }
}
