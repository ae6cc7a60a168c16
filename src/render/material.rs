//! 材质：着色器程序 + 一组命名 uniform 值
//!
//! 每个类别（纹理、矩阵、vec4、vec3、vec2、float、int）维护一张 `{名称, 位置, 值}` 表，
//! 首次设置时追加，之后原地覆盖。`bind` 时一次性把程序和全部值应用到后端。
//!
//! 程序未声明的名称不会进入表中，只输出一条 `warn` 诊断。

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::render::backend::RenderBackend;
use crate::render::shader::ShaderProgram;
use crate::render::texture::Texture;
use crate::render::uniform::{UniformKind, UniformLocation, UniformValue};

struct UniformEntry<T> {
    name: String,
    location: UniformLocation,
    value: T,
}

fn upsert<T>(table: &mut Vec<UniformEntry<T>>, name: &str, location: UniformLocation, value: T) {
    match table.iter_mut().find(|entry| entry.location == location) {
        Some(entry) => entry.value = value,
        None => table.push(UniformEntry {
            name: name.to_string(),
            location,
            value,
        }),
    }
}

fn lookup<'a, T>(table: &'a [UniformEntry<T>], name: &str) -> Option<&'a T> {
    table
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| &entry.value)
}

/// 材质
pub struct Material<B: RenderBackend> {
    program: Arc<ShaderProgram<B>>,
    textures: Vec<UniformEntry<Arc<Texture<B>>>>,
    matrices: Vec<UniformEntry<Mat4>>,
    vec4s: Vec<UniformEntry<Vec4>>,
    vec3s: Vec<UniformEntry<Vec3>>,
    vec2s: Vec<UniformEntry<Vec2>>,
    floats: Vec<UniformEntry<f32>>,
    ints: Vec<UniformEntry<i32>>,
}

impl<B: RenderBackend> Material<B> {
    /// 创建材质
    pub fn new(program: Arc<ShaderProgram<B>>) -> Self {
        Self {
            program,
            textures: Vec::new(),
            matrices: Vec::new(),
            vec4s: Vec::new(),
            vec3s: Vec::new(),
            vec2s: Vec::new(),
            floats: Vec::new(),
            ints: Vec::new(),
        }
    }

    pub fn program(&self) -> &Arc<ShaderProgram<B>> {
        &self.program
    }

    fn resolve(&self, name: &str, kind: UniformKind) -> Option<UniformLocation> {
        let Some(location) = self.program.uniform_location(name) else {
            tracing::warn!(
                target: "material",
                "Uniform '{}' not found in program '{}'",
                name,
                self.program.label()
            );
            return None;
        };

        let declared = self.program.reflection().uniform(location).map(|u| u.kind);
        if declared != Some(kind) {
            tracing::warn!(
                target: "material",
                "Uniform '{}' in program '{}' is {:?}, cannot set {:?}",
                name,
                self.program.label(),
                declared,
                kind
            );
            return None;
        }

        Some(location)
    }

    /// 设置纹理
    ///
    /// 材质持有纹理的一个引用；被替换的纹理引用随之释放。
    pub fn set_texture(&mut self, name: &str, texture: Arc<Texture<B>>) -> bool {
        let Some(location) = self.resolve(name, UniformKind::Texture) else {
            return false;
        };
        upsert(&mut self.textures, name, location, texture);
        true
    }

    pub fn set_matrix(&mut self, name: &str, value: Mat4) -> bool {
        let Some(location) = self.resolve(name, UniformKind::Matrix4) else {
            return false;
        };
        upsert(&mut self.matrices, name, location, value);
        true
    }

    pub fn set_vec4(&mut self, name: &str, value: Vec4) -> bool {
        let Some(location) = self.resolve(name, UniformKind::Vec4) else {
            return false;
        };
        upsert(&mut self.vec4s, name, location, value);
        true
    }

    pub fn set_vec3(&mut self, name: &str, value: Vec3) -> bool {
        let Some(location) = self.resolve(name, UniformKind::Vec3) else {
            return false;
        };
        upsert(&mut self.vec3s, name, location, value);
        true
    }

    pub fn set_vec2(&mut self, name: &str, value: Vec2) -> bool {
        let Some(location) = self.resolve(name, UniformKind::Vec2) else {
            return false;
        };
        upsert(&mut self.vec2s, name, location, value);
        true
    }

    pub fn set_float(&mut self, name: &str, value: f32) -> bool {
        let Some(location) = self.resolve(name, UniformKind::Float) else {
            return false;
        };
        upsert(&mut self.floats, name, location, value);
        true
    }

    pub fn set_int(&mut self, name: &str, value: i32) -> bool {
        let Some(location) = self.resolve(name, UniformKind::Int) else {
            return false;
        };
        upsert(&mut self.ints, name, location, value);
        true
    }

    /// 激活程序并上传全部 uniform
    ///
    /// 第 i 个纹理绑定到纹理单元 i，并把 i 写入对应的纹理 uniform。
    /// 超出后端 `max_texture_units` 的纹理不绑定，只输出警告。
    pub fn bind(&self, backend: &mut B) {
        backend.use_program(Some(self.program.raw()));

        let units = self.texture_units(backend);
        for entry in self.textures.iter().skip(units) {
            tracing::warn!(
                target: "material",
                "Texture '{}' in program '{}' exceeds {} texture units, skipped",
                entry.name,
                self.program.label(),
                units
            );
        }
        for (unit, entry) in self.textures.iter().take(units).enumerate() {
            backend.bind_texture(unit as u32, Some(entry.value.raw()));
            backend.set_uniform(entry.location, &UniformValue::Int(unit as i32));
        }
        for entry in &self.matrices {
            backend.set_uniform(entry.location, &UniformValue::Matrix4(entry.value));
        }
        for entry in &self.vec4s {
            backend.set_uniform(entry.location, &UniformValue::Vec4(entry.value));
        }
        for entry in &self.vec3s {
            backend.set_uniform(entry.location, &UniformValue::Vec3(entry.value));
        }
        for entry in &self.vec2s {
            backend.set_uniform(entry.location, &UniformValue::Vec2(entry.value));
        }
        for entry in &self.floats {
            backend.set_uniform(entry.location, &UniformValue::Float(entry.value));
        }
        for entry in &self.ints {
            backend.set_uniform(entry.location, &UniformValue::Int(entry.value));
        }
    }

    /// 清空用过的纹理单元并解绑程序
    pub fn unbind(&self, backend: &mut B) {
        for unit in 0..self.texture_units(backend) {
            backend.bind_texture(unit as u32, None);
        }
        backend.use_program(None);
    }

    fn texture_units(&self, backend: &B) -> usize {
        let limit = backend.capabilities().max_texture_units as usize;
        self.textures.len().min(limit)
    }

    pub fn texture(&self, name: &str) -> Option<&Arc<Texture<B>>> {
        lookup(&self.textures, name)
    }

    pub fn matrix(&self, name: &str) -> Option<Mat4> {
        lookup(&self.matrices, name).copied()
    }

    pub fn vec4(&self, name: &str) -> Option<Vec4> {
        lookup(&self.vec4s, name).copied()
    }

    pub fn vec3(&self, name: &str) -> Option<Vec3> {
        lookup(&self.vec3s, name).copied()
    }

    pub fn vec2(&self, name: &str) -> Option<Vec2> {
        lookup(&self.vec2s, name).copied()
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        lookup(&self.floats, name).copied()
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        lookup(&self.ints, name).copied()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn matrix_count(&self) -> usize {
        self.matrices.len()
    }

    pub fn vec4_count(&self) -> usize {
        self.vec4s.len()
    }

    pub fn vec3_count(&self) -> usize {
        self.vec3s.len()
    }

    pub fn vec2_count(&self) -> usize {
        self.vec2s.len()
    }

    pub fn float_count(&self) -> usize {
        self.floats.len()
    }

    pub fn int_count(&self) -> usize {
        self.ints.len()
    }
}
