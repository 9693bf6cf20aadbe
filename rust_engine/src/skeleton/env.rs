//! 骨架环境：为每个骨架保存当前姿态快照
//!
//! 姿态以整帧 `Arc<PoseFrame>` 发布，求值方只会看到完整的旧帧或新帧。

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat3, Mat4, Vec3};

use super::SkelId;
use crate::{Result, SkinError};

/// 单根骨骼在当前姿态下的世界 <-> 局部映射
#[derive(Clone, Debug)]
pub struct PosedBone {
    /// 世界坐标 -> 骨骼静止局部坐标
    pub world_to_local: Mat4,
    /// 局部梯度 -> 世界梯度（world_to_local 线性部分的转置）
    pub gradient_to_world: Mat3,
    /// 网格骨骼在该姿态下的世界包围盒，盒外势场恒为外部值
    pub world_bounds: Option<(Vec3, Vec3)>,
}

impl PosedBone {
    fn new(bone_transform: &Mat4, bone_frame: &Mat4, world_bounds: Option<(Vec3, Vec3)>) -> Self {
        let world_to_local = (*bone_transform * *bone_frame).inverse();
        Self {
            world_to_local,
            gradient_to_world: Mat3::from_mat4(world_to_local).transpose(),
            world_bounds,
        }
    }

    /// 点是否可能落在骨骼的支撑区内
    #[inline]
    pub fn may_contain(&self, point: Vec3) -> bool {
        match self.world_bounds {
            Some((lo, hi)) => point.cmpge(lo).all() && point.cmple(hi).all(),
            None => true,
        }
    }
}

/// 某一时刻骨架姿态的不可变快照
#[derive(Clone, Debug)]
pub struct PoseFrame {
    skel_id: SkelId,
    generation: u64,
    joint_transforms: Vec<Mat4>,
    bones: Vec<PosedBone>,
}

impl PoseFrame {
    /// `bone_transforms[i]` 为骨骼 i 的变换（父关节变换或单位阵），
    /// `bone_frames[i]` 为其静止坐标系，`bone_bounds[i]` 为网格骨骼的世界包围盒
    pub(crate) fn build(
        skel_id: SkelId,
        generation: u64,
        joint_transforms: Vec<Mat4>,
        bone_transforms: &[Mat4],
        bone_frames: &[Mat4],
        bone_bounds: &[Option<(Vec3, Vec3)>],
    ) -> Self {
        debug_assert_eq!(bone_transforms.len(), bone_bounds.len());
        let bones = bone_transforms
            .iter()
            .zip(bone_frames)
            .zip(bone_bounds)
            .map(|((transform, frame), bounds)| PosedBone::new(transform, frame, *bounds))
            .collect();
        Self {
            skel_id,
            generation,
            joint_transforms,
            bones,
        }
    }

    pub fn skel_id(&self) -> SkelId {
        self.skel_id
    }

    /// 每次姿态更新递增
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn joint_count(&self) -> usize {
        self.joint_transforms.len()
    }

    pub fn joint_transform(&self, joint: usize) -> Mat4 {
        self.joint_transforms[joint]
    }

    pub fn bone(&self, bone: usize) -> &PosedBone {
        &self.bones[bone]
    }

    /// 世界坐标点转到骨骼局部空间
    #[inline]
    pub fn to_local(&self, bone: usize, point: Vec3) -> Vec3 {
        self.bones[bone].world_to_local.transform_point3(point)
    }

    /// 局部空间梯度转回世界空间
    #[inline]
    pub fn gradient_to_world(&self, bone: usize, gradient: Vec3) -> Vec3 {
        self.bones[bone].gradient_to_world * gradient
    }
}

/// 骨架注册表（显式传递的会话上下文）
#[derive(Debug, Default)]
pub struct SkeletonEnv {
    next_id: SkelId,
    frames: HashMap<SkelId, Arc<PoseFrame>>,
}

impl SkeletonEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配新的骨架 ID
    pub(crate) fn allocate_id(&mut self) -> SkelId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// 发布（替换）骨架的姿态快照
    pub(crate) fn publish(&mut self, frame: PoseFrame) -> Arc<PoseFrame> {
        let frame = Arc::new(frame);
        self.frames.insert(frame.skel_id(), Arc::clone(&frame));
        frame
    }

    /// 获取骨架当前姿态
    pub fn frame(&self, id: SkelId) -> Result<Arc<PoseFrame>> {
        self.frames
            .get(&id)
            .cloned()
            .ok_or(SkinError::UnknownSkeleton(id))
    }

    pub fn contains(&self, id: SkelId) -> bool {
        self.frames.contains_key(&id)
    }

    /// 移除骨架，返回是否存在
    pub fn unregister(&mut self, id: SkelId) -> bool {
        self.frames.remove(&id).is_some()
    }

    pub fn skeleton_count(&self) -> usize {
        self.frames.len()
    }
}
