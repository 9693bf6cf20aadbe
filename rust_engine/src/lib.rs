//! Implicit Skinning Engine - 基于 HRBF 隐式曲面的骨骼蒙皮运行时
//!
//! 每根骨骼由一个 HRBF 隐式场表示，动画时把网格顶点投影回混合场的等值面，
//! 避免线性混合蒙皮在关节处的塌陷：
//! - 骨架层级与姿态传播
//! - 顶点到骨骼的关联分析
//! - HRBF 采样点选择与拟合
//! - 骨骼场的层级混合
//! - 每帧蒙皮 / 投影 / 平滑

pub mod analysis;
pub mod blending;
pub mod deform;
pub mod hrbf;
pub mod math;
pub mod model;
pub mod rig;
pub mod sampling;
pub mod skeleton;
pub mod skinning;

pub use analysis::VertToBoneInfo;
pub use blending::{ControllerShape, ImplicitBlend, JointBlend};
pub use deform::{AnimatedMesh, DeformConfig, DeformStats};
pub use hrbf::{GridField, HrbfField};
pub use model::{AbsMesh, AbsSkeleton, BoneInfluence, Mesh};
pub use sampling::{InputSample, SampleSet, SampleSetSettings};
pub use skeleton::{Bone, BoneId, BonePayload, PoseFrame, SkelId, Skeleton, SkeletonEnv};
pub use skinning::SkinningMode;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SkinError {
    #[error("Degenerate HRBF fit: {0}")]
    DegenerateFit(String),

    #[error("Skeleton topology error: {0}")]
    Topology(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown skeleton id: {0}")]
    UnknownSkeleton(SkelId),
}

pub type Result<T> = std::result::Result<T, SkinError>;
