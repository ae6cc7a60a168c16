//! 纹理资源
//!
//! 用 `image` crate 解码图片，转换为 RGBA8 后交给后端上传。

use std::path::Path;
use std::sync::Arc;

use crate::core::error::{AssetError, EngineResult, RenderError, RenderResult};
use crate::render::backend::{RenderBackend, TextureDescriptor, TextureFormat};

/// 二维纹理
///
/// 通过 `Arc` 在材质之间共享，最后一个持有者释放时后端纹理随之释放。
pub struct Texture<B: RenderBackend> {
    label: String,
    width: u32,
    height: u32,
    raw: B::Texture,
}

impl<B: RenderBackend> Texture<B> {
    /// 从 RGBA8 像素创建纹理
    pub fn from_rgba8(
        backend: &mut B,
        label: &str,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> RenderResult<Arc<Self>> {
        let desc = TextureDescriptor {
            label: Some(label.to_string()),
            width,
            height,
            format: TextureFormat::Rgba8UnormSrgb,
        };

        if width == 0 || height == 0 {
            return Err(RenderError::TextureCreation(format!(
                "{}: empty texture {}x{}",
                label, width, height
            )));
        }
        let max = backend.capabilities().max_texture_size;
        if width > max || height > max {
            return Err(RenderError::TextureCreation(format!(
                "{}: {}x{} exceeds maximum size {}",
                label, width, height, max
            )));
        }
        if rgba.len() != desc.byte_len() {
            return Err(RenderError::TextureCreation(format!(
                "{}: expected {} bytes of pixel data, got {}",
                label,
                desc.byte_len(),
                rgba.len()
            )));
        }

        let raw = backend.create_texture(&desc, rgba)?;
        tracing::debug!(target: "render", "Created texture '{}' {}x{}", label, width, height);

        Ok(Arc::new(Self {
            label: label.to_string(),
            width,
            height,
            raw,
        }))
    }

    /// 从已解码的图片创建纹理
    pub fn from_image(
        backend: &mut B,
        label: &str,
        image: &image::DynamicImage,
    ) -> RenderResult<Arc<Self>> {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(backend, label, width, height, rgba.as_raw())
    }

    /// 从图片文件加载纹理
    pub fn load<P: AsRef<Path>>(backend: &mut B, path: P) -> EngineResult<Arc<Self>> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        if !path.exists() {
            return Err(AssetError::NotFound { path: path_str }.into());
        }

        let image = image::open(path).map_err(|e| match e {
            image::ImageError::IoError(io) => AssetError::LoadFailed {
                path: path_str.clone(),
                reason: io.to_string(),
            },
            other => AssetError::Decode(format!("{}: {}", path_str, other)),
        })?;

        tracing::info!(
            target: "render",
            "Loaded texture {} ({}x{})",
            path_str,
            image.width(),
            image.height()
        );
        Ok(Self::from_image(backend, &path_str, &image)?)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// 后端纹理句柄
    pub fn raw(&self) -> &B::Texture {
        &self.raw
    }
}

impl<B: RenderBackend> Drop for Texture<B> {
    fn drop(&mut self) {
        tracing::debug!(target: "render", "Released texture '{}'", self.label);
    }
}
