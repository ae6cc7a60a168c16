//! WGSL 着色器反射
//!
//! 用 naga 解析并校验 WGSL，收集程序的 uniform、纹理、存储缓冲区和入口点：
//!
//! - `var<uniform>` 结构体的每个成员成为一个按名称可查询的 uniform
//! - `texture_2d` 全局变量成为纹理 uniform，同组内名为 `<名称>_sampler` 的采样器与之配对
//! - `var<storage>` 记录绑定点，供计算分发时按绑定号匹配
//!
//! 多个阶段的反射结果通过 [`ProgramReflection::merge`] 合并为一个程序的反射表。

use crate::core::error::{RenderError, RenderResult};
use crate::render::shader::ShaderStage;
use crate::render::uniform::{UniformKind, UniformLocation};

/// uniform 在 GPU 上的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformSlot {
    /// uniform 块中的成员
    Block { group: u32, binding: u32, offset: u32 },
    /// 纹理绑定，`sampler` 为配对采样器的绑定号
    Texture {
        group: u32,
        binding: u32,
        sampler: Option<u32>,
    },
}

/// 单个 uniform 的反射信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformInfo {
    pub name: String,
    pub kind: UniformKind,
    pub slot: UniformSlot,
}

/// uniform 块
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformBlock {
    pub group: u32,
    pub binding: u32,
    /// 块大小（字节）
    pub size: u32,
}

/// 存储缓冲区绑定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageBinding {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub writable: bool,
}

/// 入口点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub stage: ShaderStage,
    pub name: String,
    pub workgroup_size: [u32; 3],
}

/// 程序反射表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramReflection {
    uniforms: Vec<UniformInfo>,
    blocks: Vec<UniformBlock>,
    storage: Vec<StorageBinding>,
    entry_points: Vec<EntryPoint>,
}

impl ProgramReflection {
    /// 解析、校验并反射一段 WGSL 源码
    pub fn from_wgsl(label: &str, source: &str) -> RenderResult<Self> {
        let module = naga::front::wgsl::parse_str(source).map_err(|e| {
            RenderError::ShaderCompilation(format!("{}:\n{}", label, e.emit_to_string(source)))
        })?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        );
        validator
            .validate(&module)
            .map_err(|e| RenderError::ShaderCompilation(format!("{}: {:?}", label, e)))?;

        Ok(Self::from_module(&module))
    }

    fn from_module(module: &naga::Module) -> Self {
        let mut reflection = Self::default();
        let mut textures = Vec::new();
        let mut samplers = Vec::new();

        for (_, var) in module.global_variables.iter() {
            let Some(binding) = var.binding.as_ref() else {
                continue;
            };
            let name = var.name.clone().unwrap_or_default();
            let inner = &module.types[var.ty].inner;

            match var.space {
                naga::AddressSpace::Uniform => {
                    reflection.reflect_uniform_block(module, &name, binding, inner)
                }
                naga::AddressSpace::Storage { access } => {
                    reflection.storage.push(StorageBinding {
                        name,
                        group: binding.group,
                        binding: binding.binding,
                        writable: access.contains(naga::StorageAccess::STORE),
                    })
                }
                naga::AddressSpace::Handle => match inner {
                    naga::TypeInner::Image { .. } => textures.push((name, binding.clone())),
                    naga::TypeInner::Sampler { .. } => samplers.push((name, binding.clone())),
                    _ => {}
                },
                _ => {}
            }
        }

        for (name, binding) in textures {
            let sampler_name = format!("{}_sampler", name);
            let sampler = samplers
                .iter()
                .find(|(n, b)| *n == sampler_name && b.group == binding.group)
                .map(|(_, b)| b.binding);
            reflection.uniforms.push(UniformInfo {
                name,
                kind: UniformKind::Texture,
                slot: UniformSlot::Texture {
                    group: binding.group,
                    binding: binding.binding,
                    sampler,
                },
            });
        }

        reflection.entry_points = module
            .entry_points
            .iter()
            .map(|ep| EntryPoint {
                stage: ep.stage.into(),
                name: ep.name.clone(),
                workgroup_size: ep.workgroup_size,
            })
            .collect();

        reflection
    }

    fn reflect_uniform_block(
        &mut self,
        module: &naga::Module,
        name: &str,
        binding: &naga::ResourceBinding,
        inner: &naga::TypeInner,
    ) {
        match inner {
            naga::TypeInner::Struct { members, span } => {
                self.blocks.push(UniformBlock {
                    group: binding.group,
                    binding: binding.binding,
                    size: *span,
                });
                for member in members {
                    let Some(member_name) = member.name.clone() else {
                        continue;
                    };
                    match uniform_kind(&module.types[member.ty].inner) {
                        Some(kind) => self.uniforms.push(UniformInfo {
                            name: member_name,
                            kind,
                            slot: UniformSlot::Block {
                                group: binding.group,
                                binding: binding.binding,
                                offset: member.offset,
                            },
                        }),
                        None => tracing::debug!(
                            target: "shader",
                            "Skipping uniform member '{}' with unsupported type",
                            member_name
                        ),
                    }
                }
            }
            other => match uniform_kind(other) {
                Some(kind) => {
                    self.blocks.push(UniformBlock {
                        group: binding.group,
                        binding: binding.binding,
                        size: kind.byte_size(),
                    });
                    self.uniforms.push(UniformInfo {
                        name: name.to_string(),
                        kind,
                        slot: UniformSlot::Block {
                            group: binding.group,
                            binding: binding.binding,
                            offset: 0,
                        },
                    });
                }
                None => tracing::debug!(
                    target: "shader",
                    "Skipping uniform '{}' with unsupported type",
                    name
                ),
            },
        }
    }

    /// 合并另一阶段的反射结果
    ///
    /// 同名 uniform 必须在各阶段中类别和位置一致。
    pub fn merge(&mut self, other: ProgramReflection) -> RenderResult<()> {
        for uniform in other.uniforms {
            match self.uniforms.iter().find(|u| u.name == uniform.name) {
                Some(existing) if *existing != uniform => {
                    return Err(RenderError::ShaderCompilation(format!(
                        "uniform '{}' is declared differently across stages",
                        uniform.name
                    )));
                }
                Some(_) => {}
                None => self.uniforms.push(uniform),
            }
        }

        for block in other.blocks {
            match self
                .blocks
                .iter()
                .find(|b| b.group == block.group && b.binding == block.binding)
            {
                Some(existing) if *existing != block => {
                    return Err(RenderError::ShaderCompilation(format!(
                        "uniform block at group {} binding {} differs across stages",
                        block.group, block.binding
                    )));
                }
                Some(_) => {}
                None => self.blocks.push(block),
            }
        }

        for storage in other.storage {
            if !self.storage.contains(&storage) {
                self.storage.push(storage);
            }
        }

        self.entry_points.extend(other.entry_points);
        Ok(())
    }

    /// 按名称查询 uniform 位置
    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms
            .iter()
            .position(|u| u.name == name)
            .map(|index| UniformLocation(index as u32))
    }

    /// 按位置获取 uniform 信息
    pub fn uniform(&self, location: UniformLocation) -> Option<&UniformInfo> {
        self.uniforms.get(location.index())
    }

    pub fn uniforms(&self) -> &[UniformInfo] {
        &self.uniforms
    }

    pub fn blocks(&self) -> &[UniformBlock] {
        &self.blocks
    }

    pub fn storage_bindings(&self) -> &[StorageBinding] {
        &self.storage
    }

    pub fn entry_points(&self) -> &[EntryPoint] {
        &self.entry_points
    }

    /// 指定阶段的第一个入口点
    pub fn entry_point(&self, stage: ShaderStage) -> Option<&EntryPoint> {
        self.entry_points.iter().find(|ep| ep.stage == stage)
    }
}

fn uniform_kind(inner: &naga::TypeInner) -> Option<UniformKind> {
    use naga::{ScalarKind, TypeInner, VectorSize};

    match inner {
        TypeInner::Scalar(scalar) => match scalar.kind {
            ScalarKind::Float if scalar.width == 4 => Some(UniformKind::Float),
            ScalarKind::Sint if scalar.width == 4 => Some(UniformKind::Int),
            _ => None,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => match size {
            VectorSize::Bi => Some(UniformKind::Vec2),
            VectorSize::Tri => Some(UniformKind::Vec3),
            VectorSize::Quad => Some(UniformKind::Vec4),
        },
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            ..
        } => Some(UniformKind::Matrix4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPUTE: &str = r#"
struct Params {
    dt: f32,
    burnRate: f32,
    basePosition: vec3<f32>,
    acceleration: vec3<f32>,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(1) @binding(0) var<storage, read_write> data: array<vec4<f32>>;

@compute @workgroup_size(1)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    data[id.x] = data[id.x] + vec4<f32>(params.acceleration * params.dt, params.burnRate) + vec4<f32>(params.basePosition, 0.0);
}
"#;

    const FRAGMENT: &str = r#"
struct Params {
    tint: vec4<f32>,
}

@group(0) @binding(0) var<uniform> params: Params;
@group(1) @binding(0) var tex: texture_2d<f32>;
@group(1) @binding(1) var tex_sampler: sampler;

@fragment
fn main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(tex, tex_sampler, uv) * params.tint;
}
"#;

    #[test]
    fn test_reflect_uniform_block() {
        let reflection = ProgramReflection::from_wgsl("compute", COMPUTE).unwrap();
        let loc = reflection.location("basePosition").unwrap();
        let info = reflection.uniform(loc).unwrap();
        assert_eq!(info.kind, UniformKind::Vec3);
        assert_eq!(
            info.slot,
            UniformSlot::Block {
                group: 0,
                binding: 0,
                offset: 16
            }
        );
        assert_eq!(reflection.blocks()[0].size, 48);
        assert!(reflection.location("missing").is_none());
    }

    #[test]
    fn test_reflect_storage_and_entry_point() {
        let reflection = ProgramReflection::from_wgsl("compute", COMPUTE).unwrap();
        let storage = &reflection.storage_bindings()[0];
        assert_eq!((storage.group, storage.binding), (1, 0));
        assert!(storage.writable);

        let entry = reflection.entry_point(ShaderStage::Compute).unwrap();
        assert_eq!(entry.name, "main");
        assert_eq!(entry.workgroup_size, [1, 1, 1]);
    }

    #[test]
    fn test_reflect_texture_pairs_sampler() {
        let reflection = ProgramReflection::from_wgsl("fragment", FRAGMENT).unwrap();
        let info = reflection
            .uniform(reflection.location("tex").unwrap())
            .unwrap();
        assert_eq!(info.kind, UniformKind::Texture);
        assert_eq!(
            info.slot,
            UniformSlot::Texture {
                group: 1,
                binding: 0,
                sampler: Some(1)
            }
        );
    }

    #[test]
    fn test_merge_rejects_conflicting_blocks() {
        let mut compute = ProgramReflection::from_wgsl("compute", COMPUTE).unwrap();
        let fragment = ProgramReflection::from_wgsl("fragment", FRAGMENT).unwrap();
        assert!(matches!(
            compute.merge(fragment),
            Err(RenderError::ShaderCompilation(_))
        ));
    }

    #[test]
    fn test_invalid_source_reports_label() {
        let err = ProgramReflection::from_wgsl("broken.wgsl", "fn main( {").unwrap_err();
        match err {
            RenderError::ShaderCompilation(msg) => assert!(msg.contains("broken.wgsl")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
