//! Uniform 值与位置类型
//!
//! `UniformLocation` 是程序反射表中的索引，相当于按名称查询得到的句柄。

use glam::{Mat4, Vec2, Vec3, Vec4};

/// 程序内 uniform 的位置句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub(crate) u32);

impl UniformLocation {
    /// 反射表中的索引
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// uniform 类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    /// 纹理（绑定到纹理单元）
    Texture,
    /// 4x4 矩阵
    Matrix4,
    /// vec4<f32>
    Vec4,
    /// vec3<f32>
    Vec3,
    /// vec2<f32>
    Vec2,
    /// f32
    Float,
    /// i32
    Int,
}

impl UniformKind {
    /// 在 uniform 块中占用的字节数
    pub fn byte_size(&self) -> u32 {
        match self {
            UniformKind::Texture => 0,
            UniformKind::Matrix4 => 64,
            UniformKind::Vec4 => 16,
            UniformKind::Vec3 => 12,
            UniformKind::Vec2 => 8,
            UniformKind::Float | UniformKind::Int => 4,
        }
    }
}

/// 上传到 GPU 的 uniform 值
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Matrix4(Mat4),
    Vec4(Vec4),
    Vec3(Vec3),
    Vec2(Vec2),
    Float(f32),
    Int(i32),
}

impl UniformValue {
    /// 值的类别
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Matrix4(_) => UniformKind::Matrix4,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Int(_) => UniformKind::Int,
        }
    }

    /// 是否可以写入给定类别的 uniform
    ///
    /// 纹理 uniform 接受整数：写入的是纹理单元编号。
    pub fn fits(&self, kind: UniformKind) -> bool {
        match (self, kind) {
            (UniformValue::Int(_), UniformKind::Texture) => true,
            _ => self.kind() == kind,
        }
    }

    /// 按 WGSL 内存布局写入字节（小端）
    ///
    /// 返回写入的字节数；目标空间不足时不写入并返回 `None`。
    pub fn write_bytes(&self, out: &mut [u8]) -> Option<usize> {
        let mut scratch = [0u8; 64];
        let len = match self {
            UniformValue::Matrix4(m) => {
                scratch.copy_from_slice(bytemuck::cast_slice(&m.to_cols_array()));
                64
            }
            UniformValue::Vec4(v) => {
                scratch[..16].copy_from_slice(bytemuck::cast_slice(&v.to_array()));
                16
            }
            UniformValue::Vec3(v) => {
                scratch[..12].copy_from_slice(bytemuck::cast_slice(&v.to_array()));
                12
            }
            UniformValue::Vec2(v) => {
                scratch[..8].copy_from_slice(bytemuck::cast_slice(&v.to_array()));
                8
            }
            UniformValue::Float(f) => {
                scratch[..4].copy_from_slice(&f.to_le_bytes());
                4
            }
            UniformValue::Int(i) => {
                scratch[..4].copy_from_slice(&i.to_le_bytes());
                4
            }
        };
        let target = out.get_mut(..len)?;
        target.copy_from_slice(&scratch[..len]);
        Some(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texture_accepts_unit_index() {
        assert!(UniformValue::Int(0).fits(UniformKind::Texture));
        assert!(!UniformValue::Float(0.0).fits(UniformKind::Texture));
        assert!(UniformValue::Vec3(Vec3::ONE).fits(UniformKind::Vec3));
        assert!(!UniformValue::Vec3(Vec3::ONE).fits(UniformKind::Vec4));
    }

    #[test]
    fn test_write_bytes_layout() {
        let mut out = [0u8; 16];
        let written = UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0))
            .write_bytes(&mut out)
            .unwrap();
        assert_eq!(written, 12);
        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&out);
        assert_eq!(floats, [1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn test_write_bytes_out_of_range() {
        let mut out = [0u8; 8];
        assert!(UniformValue::Matrix4(Mat4::IDENTITY)
            .write_bytes(&mut out)
            .is_none());
        assert_eq!(out, [0u8; 8]);
    }
}
