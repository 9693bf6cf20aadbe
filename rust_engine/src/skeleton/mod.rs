//! 骨架：骨骼、关节层级与姿态

mod bone;
mod env;
mod skeleton;

pub use bone::{Bone, BonePayload, BoneType};
pub use env::{PoseFrame, PosedBone, SkeletonEnv};
pub use skeleton::{AnimatedBone, Skeleton, SkeletonJoint};

use glam::{Mat4, Quat, Vec3};

use crate::blending::{ControllerShape, JointBlend};

/// 骨骼标识（等于其关节索引）
pub type BoneId = usize;

/// 骨架在环境中的标识
pub type SkelId = u32;

/// 关节的混合参数
#[derive(Clone, Debug, PartialEq)]
pub struct JointData {
    /// 子骨骼场与本骨骼场的混合算子
    pub blend: JointBlend,
    /// 膨胀强度，范围 [0, 1]
    pub bulge_strength: f32,
    /// 梯度混合控制曲线
    pub controller: ControllerShape,
}

impl Default for JointData {
    fn default() -> Self {
        Self {
            blend: JointBlend::default(),
            bulge_strength: 0.7,
            controller: ControllerShape::default(),
        }
    }
}

/// 关节局部动画变换（相对静止姿态，在关节自身坐标系中表达）
#[derive(Clone, Debug)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl BoneTransform {
    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Default::default()
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}
