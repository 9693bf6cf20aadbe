//! 初始蒙皮（投影前的几何猜测）

mod skinning;

pub use skinning::compute_skinning;

use glam::{Mat4, Vec3};

use crate::model::BoneInfluence;

/// 蒙皮方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SkinningMode {
    /// 线性混合蒙皮
    #[default]
    Linear,
    /// 对偶四元数蒙皮
    DualQuaternion,
}

/// 蒙皮输入数据
pub struct SkinningInput<'a> {
    /// 静止顶点位置
    pub positions: &'a [Vec3],
    /// 静止顶点法线
    pub normals: &'a [Vec3],
    /// 顶点权重（索引指向 `matrices`）
    pub weights: &'a [Vec<BoneInfluence>],
    /// 蒙皮矩阵（静止世界 -> 动画世界）
    pub matrices: &'a [Mat4],
}

/// 蒙皮输出数据
pub struct SkinningOutput {
    /// 变换后的顶点位置
    pub positions: Vec<Vec3>,
    /// 变换后的顶点法线
    pub normals: Vec<Vec3>,
}
