//! 网格与骨架的输入数据（由外部加载器提供）

mod mesh;

pub use mesh::{compute_normals, Mesh};

use glam::{Mat4, Vec3};

/// 单个骨骼影响（关节索引 + 权重）
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoneInfluence {
    pub joint: usize,
    pub weight: f32,
}

impl BoneInfluence {
    pub fn new(joint: usize, weight: f32) -> Self {
        Self { joint, weight }
    }
}

/// 加载器提供的静止姿态网格
#[derive(Clone, Debug, Default)]
pub struct AbsMesh {
    /// 顶点位置（世界空间）
    pub positions: Vec<Vec3>,
    /// 顶点法线，缺失时由三角形计算
    pub normals: Option<Vec<Vec3>>,
    /// 三角形索引
    pub indices: Vec<u32>,
    /// 每顶点骨骼权重，可以为空（此时按最近骨骼刚性绑定）
    pub weights: Vec<Vec<BoneInfluence>>,
}

/// 加载器提供的抽象骨架
#[derive(Clone, Debug, Default)]
pub struct AbsSkeleton {
    /// 每个关节在静止姿态下的世界变换
    pub bones: Vec<Mat4>,
    /// parents[i] = 父关节索引，根为 -1
    pub parents: Vec<i32>,
}

impl AbsSkeleton {
    /// 仅由关节位置构造（无旋转）
    pub fn from_joint_positions(positions: &[Vec3], parents: &[i32]) -> Self {
        Self {
            bones: positions.iter().map(|p| Mat4::from_translation(*p)).collect(),
            parents: parents.to_vec(),
        }
    }

    pub fn joint_count(&self) -> usize {
        self.bones.len()
    }
}
