//! 着色器与着色器程序
//!
//! [`Shader`] 是单个阶段的 WGSL 源码，创建时即完成解析、校验和反射；
//! [`ShaderProgram`] 将若干阶段链接为一个程序，并提供按名称查询 uniform 位置的能力。

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use crate::core::error::{AssetError, EngineResult, RenderError, RenderResult};
use crate::render::backend::{ProgramDescriptor, RenderBackend};
use crate::render::reflection::ProgramReflection;
use crate::render::uniform::UniformLocation;

/// 着色器阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl From<naga::ShaderStage> for ShaderStage {
    fn from(stage: naga::ShaderStage) -> Self {
        match stage {
            naga::ShaderStage::Vertex => ShaderStage::Vertex,
            naga::ShaderStage::Fragment => ShaderStage::Fragment,
            naga::ShaderStage::Compute => ShaderStage::Compute,
        }
    }
}

/// 单阶段着色器
#[derive(Debug, Clone)]
pub struct Shader {
    label: String,
    stage: ShaderStage,
    entry_point: String,
    source: String,
    reflection: ProgramReflection,
}

impl Shader {
    /// 从源码创建着色器
    ///
    /// 源码中必须存在该阶段的入口点。
    pub fn from_source(
        label: impl Into<String>,
        stage: ShaderStage,
        source: impl Into<String>,
    ) -> RenderResult<Self> {
        let label = label.into();
        let source = source.into();
        let reflection = ProgramReflection::from_wgsl(&label, &source)?;

        let entry_point = reflection
            .entry_point(stage)
            .map(|ep| ep.name.clone())
            .ok_or_else(|| {
                RenderError::ShaderCompilation(format!(
                    "{}: no {:?} entry point",
                    label, stage
                ))
            })?;

        tracing::debug!(target: "shader", "Compiled {:?} shader '{}'", stage, label);

        Ok(Self {
            label,
            stage,
            entry_point,
            source,
            reflection,
        })
    }

    /// 从文件加载着色器
    pub fn from_file<P: AsRef<Path>>(path: P, stage: ShaderStage) -> EngineResult<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AssetError::NotFound {
                path: path.display().to_string(),
            },
            _ => AssetError::LoadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            },
        })?;
        Ok(Self::from_source(path.display().to_string(), stage, source)?)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// 该阶段使用的入口点名称
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn reflection(&self) -> &ProgramReflection {
        &self.reflection
    }
}

/// 链接后的着色器程序
///
/// 通过 `Arc` 共享；最后一个持有者释放时后端程序对象随之释放。
pub struct ShaderProgram<B: RenderBackend> {
    label: String,
    stages: Vec<ShaderStage>,
    reflection: ProgramReflection,
    raw: B::Program,
}

impl<B: RenderBackend> ShaderProgram<B> {
    /// 链接着色器程序
    ///
    /// 合法组合：单独的计算阶段，或顶点阶段加可选的片元阶段。
    pub fn new(backend: &mut B, label: &str, shaders: Vec<Shader>) -> RenderResult<Arc<Self>> {
        let stages: Vec<ShaderStage> = shaders.iter().map(Shader::stage).collect();
        validate_stages(label, &stages)?;

        let mut reflection = ProgramReflection::default();
        for shader in &shaders {
            reflection.merge(shader.reflection().clone())?;
        }

        let raw = backend.create_program(&ProgramDescriptor {
            label,
            shaders: &shaders,
            reflection: &reflection,
        })?;

        tracing::info!(
            target: "shader",
            "Linked program '{}' ({:?}, {} uniforms)",
            label,
            stages,
            reflection.uniforms().len()
        );

        Ok(Arc::new(Self {
            label: label.to_string(),
            stages,
            reflection,
            raw,
        }))
    }

    /// 按名称查询 uniform 位置
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        self.reflection.location(name)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_compute(&self) -> bool {
        self.stages.contains(&ShaderStage::Compute)
    }

    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    pub fn reflection(&self) -> &ProgramReflection {
        &self.reflection
    }

    /// 后端程序句柄
    pub fn raw(&self) -> &B::Program {
        &self.raw
    }
}

impl<B: RenderBackend> Drop for ShaderProgram<B> {
    fn drop(&mut self) {
        tracing::debug!(target: "shader", "Released program '{}'", self.label);
    }
}

fn validate_stages(label: &str, stages: &[ShaderStage]) -> RenderResult<()> {
    let count = |stage| stages.iter().filter(|s| **s == stage).count();
    let compute = count(ShaderStage::Compute);
    let vertex = count(ShaderStage::Vertex);
    let fragment = count(ShaderStage::Fragment);

    let valid = match (compute, vertex, fragment) {
        (1, 0, 0) => true,
        (0, 1, 0) | (0, 1, 1) => true,
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(RenderError::ShaderCompilation(format!(
            "{}: invalid stage combination {:?}",
            label, stages
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(f32(index), 0.0, 0.0, 1.0);
}
"#;

    #[test]
    fn test_entry_point_from_reflection() {
        let shader = Shader::from_source("quad", ShaderStage::Vertex, VERTEX).unwrap();
        assert_eq!(shader.entry_point(), "vs_main");
        assert_eq!(shader.stage(), ShaderStage::Vertex);
    }

    #[test]
    fn test_missing_stage_entry_point() {
        let err = Shader::from_source("quad", ShaderStage::Fragment, VERTEX).unwrap_err();
        assert!(matches!(err, RenderError::ShaderCompilation(_)));
    }

    #[test]
    fn test_missing_file_is_asset_error() {
        let err = Shader::from_file("does/not/exist.wgsl", ShaderStage::Compute).unwrap_err();
        assert!(matches!(
            err,
            crate::core::error::EngineError::Asset(AssetError::NotFound { .. })
        ));
    }

    #[test]
    fn test_stage_combinations() {
        use ShaderStage::*;
        assert!(validate_stages("p", &[Compute]).is_ok());
        assert!(validate_stages("p", &[Vertex, Fragment]).is_ok());
        assert!(validate_stages("p", &[Vertex]).is_ok());
        assert!(validate_stages("p", &[]).is_err());
        assert!(validate_stages("p", &[Fragment]).is_err());
        assert!(validate_stages("p", &[Compute, Vertex]).is_err());
        assert!(validate_stages("p", &[Vertex, Vertex]).is_err());
    }
}
