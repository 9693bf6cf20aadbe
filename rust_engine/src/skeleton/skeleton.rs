//! 骨架：关节层级、静止骨骼与当前姿态

use glam::{Mat4, Vec3};

use super::{
    Bone, BoneId, BonePayload, BoneTransform, BoneType, JointData, PoseFrame, SkelId, SkeletonEnv,
};
use crate::blending::{ControllerShape, JointBlend};
use crate::hrbf::{GridField, HrbfField};
use crate::math::DualQuat;
use crate::model::AbsSkeleton;
use crate::sampling::InputSample;
use crate::{Result, SkinError};

/// 当前姿态下的骨骼几何
#[derive(Clone, Debug)]
pub struct AnimatedBone {
    pub org: Vec3,
    pub dir: Vec3,
    /// 骨骼局部 -> 动画世界
    pub frame: Mat4,
    pub dual_quat: DualQuat,
}

/// 关节
#[derive(Clone, Debug)]
pub struct SkeletonJoint {
    /// 父关节索引，根为 -1
    parent: i32,
    children: Vec<usize>,
    /// 静止姿态下的全局矩阵（由加载器给出）
    rest_transform: Mat4,
    /// 当前蒙皮变换（静止世界 -> 动画世界）
    transform: Mat4,
    data: JointData,
    hrbf_radius: f32,
    bone: Bone,
    anim: AnimatedBone,
}

impl SkeletonJoint {
    pub fn parent(&self) -> i32 {
        self.parent
    }

    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn data(&self) -> &JointData {
        &self.data
    }

    pub fn bone(&self) -> &Bone {
        &self.bone
    }
}

/// 骨架
#[derive(Clone, Debug)]
pub struct Skeleton {
    skel_id: SkelId,
    joints: Vec<SkeletonJoint>,
    root: usize,
    /// 父关节在前的处理顺序
    sorted_indices: Vec<usize>,
    generation: u64,
    /// 任何隐式场或混合参数改变时递增
    fields_version: u64,
}

impl Skeleton {
    /// 校验层级、构建静止骨骼并注册到环境中
    pub fn new(abs: &AbsSkeleton, env: &mut SkeletonEnv) -> Result<Self> {
        let count = abs.bones.len();
        if abs.parents.len() != count {
            return Err(SkinError::Topology(format!(
                "{} joints but {} parent entries",
                count,
                abs.parents.len()
            )));
        }
        let (root, sorted_indices, children) = build_hierarchy(&abs.parents)?;

        let positions: Vec<Vec3> = abs.bones.iter().map(|m| m.w_axis.truncate()).collect();
        let joints = (0..count)
            .map(|i| {
                let parent = abs.parents[i];
                let org = if parent >= 0 {
                    positions[parent as usize]
                } else {
                    positions[i]
                };
                let bone = Bone::new(i, org, positions[i]);
                let anim = animate_bone(&bone, &Mat4::IDENTITY);
                SkeletonJoint {
                    parent,
                    children: children[i].clone(),
                    rest_transform: abs.bones[i],
                    transform: Mat4::IDENTITY,
                    data: JointData::default(),
                    hrbf_radius: (bone.length() * 0.25).max(1e-3),
                    bone,
                    anim,
                }
            })
            .collect();

        let mut skeleton = Self {
            skel_id: env.allocate_id(),
            joints,
            root,
            sorted_indices,
            generation: 0,
            fields_version: 0,
        };
        env.publish(skeleton.pose_frame());

        log::info!(
            "骨架构建完成: id={}, {} 个关节, {} 根骨骼",
            skeleton.skel_id,
            count,
            skeleton.bone_ids().len()
        );
        skeleton.generation += 1;
        Ok(skeleton)
    }

    pub fn skel_id(&self) -> SkelId {
        self.skel_id
    }

    /// 隐式场版本号，用于判断缓存是否过期
    pub fn fields_version(&self) -> u64 {
        self.fields_version
    }

    pub fn nb_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn root(&self) -> usize {
        self.root
    }

    pub fn parent(&self, joint: usize) -> i32 {
        self.joints[joint].parent
    }

    pub fn children(&self, joint: usize) -> &[usize] {
        &self.joints[joint].children
    }

    pub fn is_leaf(&self, joint: usize) -> bool {
        self.joints[joint].children.is_empty()
    }

    /// 有父关节的关节才对应一根真正的骨骼
    pub fn is_bone(&self, joint: usize) -> bool {
        self.joints[joint].parent >= 0
    }

    /// 所有真正骨骼的 ID（升序）
    pub fn bone_ids(&self) -> Vec<BoneId> {
        (0..self.joints.len()).filter(|&i| self.is_bone(i)).collect()
    }

    /// 起点关节是否与其他骨骼共享（父关节本身是骨骼，或存在兄弟骨骼）
    pub fn has_articulated_start(&self, bone: BoneId) -> bool {
        match self.joints[bone].parent {
            p if p >= 0 => self.is_bone(p as usize) || self.joints[p as usize].children.len() > 1,
            _ => false,
        }
    }

    /// 终点关节是否连接子骨骼
    pub fn has_articulated_end(&self, bone: BoneId) -> bool {
        self.is_bone(bone) && !self.is_leaf(bone)
    }

    /// 父关节在前的遍历顺序
    pub fn hierarchy_order(&self) -> &[usize] {
        &self.sorted_indices
    }

    pub fn joint(&self, joint: usize) -> &SkeletonJoint {
        &self.joints[joint]
    }

    /// 关节静止位置
    pub fn joint_position(&self, joint: usize) -> Vec3 {
        self.joints[joint].rest_transform.w_axis.truncate()
    }

    /// 关节当前蒙皮变换
    pub fn joint_transform(&self, joint: usize) -> Mat4 {
        self.joints[joint].transform
    }

    pub fn joint_data(&self, joint: usize) -> &JointData {
        &self.joints[joint].data
    }

    /// 骨骼跟随父关节运动；根关节没有骨骼，返回单位阵
    pub fn get_bone_transform(&self, bone: BoneId) -> Mat4 {
        match self.joints[bone].parent {
            p if p >= 0 => self.joints[p as usize].transform,
            _ => Mat4::IDENTITY,
        }
    }

    pub fn bone(&self, bone: BoneId) -> &Bone {
        &self.joints[bone].bone
    }

    pub fn bones(&self) -> impl Iterator<Item = &Bone> {
        self.joints.iter().map(|j| &j.bone)
    }

    pub fn bone_type(&self, bone: BoneId) -> BoneType {
        self.joints[bone].bone.bone_type()
    }

    pub fn animated_bone(&self, bone: BoneId) -> &AnimatedBone {
        &self.joints[bone].anim
    }

    /// 当前姿态下骨骼局部 -> 世界的矩阵
    pub fn bone_anim_frame(&self, bone: BoneId) -> Mat4 {
        self.joints[bone].anim.frame
    }

    /// 替换骨骼（ID 必须一致）
    pub fn set_bone(&mut self, index: BoneId, bone: Bone) {
        debug_assert_eq!(bone.id(), index, "bone id does not match its slot");
        let transform = self.get_bone_transform(index);
        let joint = &mut self.joints[index];
        joint.anim = animate_bone(&bone, &transform);
        joint.bone = bone;
        self.refresh_grid(index, true);
        self.fields_version += 1;
    }

    pub fn set_joint_blending(&mut self, joint: usize, blend: JointBlend) {
        self.joints[joint].data.blend = blend;
        self.fields_version += 1;
    }

    /// 膨胀强度，截断到 [0, 1]
    pub fn set_joint_bulge_mag(&mut self, joint: usize, magnitude: f32) {
        self.joints[joint].data.bulge_strength = magnitude.clamp(0.0, 1.0);
        self.fields_version += 1;
    }

    pub fn set_joint_controller(&mut self, joint: usize, controller: ControllerShape) {
        self.joints[joint].data.controller = controller;
        self.fields_version += 1;
    }

    pub fn hrbf_radius(&self, bone: BoneId) -> f32 {
        self.joints[bone].hrbf_radius
    }

    /// 修改紧支撑半径，不重新拟合；半径必须为正
    pub fn set_bone_hrbf_radius(&mut self, bone: BoneId, radius: f32) -> Result<()> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(SkinError::InvalidInput(format!(
                "HRBF radius of bone {} must be positive, got {}",
                bone, radius
            )));
        }
        let joint = &mut self.joints[bone];
        joint.hrbf_radius = radius;
        joint.bone.set_radius(radius);
        self.fields_version += 1;
        Ok(())
    }

    /// 用局部空间采样点拟合骨骼的 HRBF；失败时保留原有隐式场
    pub fn fit_bone(&mut self, bone: BoneId, samples: &InputSample) -> Result<()> {
        let field = HrbfField::fit(samples, self.joints[bone].hrbf_radius)?;
        self.joints[bone].bone.set_payload(BonePayload::Hrbf(field));
        self.fields_version += 1;
        Ok(())
    }

    /// 把骨骼的 HRBF 烘焙成网格
    pub fn precompute_bone(&mut self, bone: BoneId, resolution: usize) -> Result<()> {
        let grid = match self.joints[bone].bone.payload() {
            BonePayload::Hrbf(field) => GridField::from_field(field, resolution)?,
            BonePayload::PrecomputedGrid(_) => return Ok(()),
            BonePayload::None => {
                return Err(SkinError::InvalidInput(format!(
                    "bone {} has no HRBF to precompute",
                    bone
                )))
            }
        };
        self.joints[bone]
            .bone
            .set_payload(BonePayload::PrecomputedGrid(grid));
        self.refresh_grid(bone, true);
        self.fields_version += 1;
        Ok(())
    }

    /// 由局部动画变换（相对静止姿态）逐级合成全局蒙皮变换
    ///
    /// `S_i = S_parent * B_i * A_i * B_i⁻¹`，B 为关节静止全局矩阵，A 为局部动画。
    pub fn compose_local_transforms(&self, locals: &[BoneTransform]) -> Result<Vec<Mat4>> {
        if locals.len() != self.joints.len() {
            return Err(SkinError::InvalidInput(format!(
                "expected {} local transforms, got {}",
                self.joints.len(),
                locals.len()
            )));
        }

        let mut globals = vec![Mat4::IDENTITY; self.joints.len()];
        for &i in &self.sorted_indices {
            let joint = &self.joints[i];
            let rest = joint.rest_transform;
            let local = rest * locals[i].to_matrix() * rest.inverse();
            globals[i] = match joint.parent {
                p if p >= 0 => globals[p as usize] * local,
                _ => local,
            };
        }
        Ok(globals)
    }

    /// 设置每个关节的蒙皮变换并发布新的姿态快照
    pub fn update_bones_pose(&mut self, env: &mut SkeletonEnv, transforms: &[Mat4]) -> Result<()> {
        if transforms.len() != self.joints.len() {
            return Err(SkinError::InvalidInput(format!(
                "expected {} joint transforms, got {}",
                self.joints.len(),
                transforms.len()
            )));
        }

        for (joint, transform) in self.joints.iter_mut().zip(transforms) {
            joint.transform = *transform;
        }
        for i in 0..self.joints.len() {
            let transform = self.get_bone_transform(i);
            let joint = &mut self.joints[i];
            joint.anim = animate_bone(&joint.bone, &transform);
            if let BonePayload::PrecomputedGrid(grid) = joint.bone.payload_mut() {
                grid.mark_needs_retransform();
            }
        }
        self.transform_precomputed_prim();

        env.publish(self.pose_frame());
        self.generation += 1;
        Ok(())
    }

    /// 刷新所有需要重新变换的网格骨骼
    pub fn transform_precomputed_prim(&mut self) {
        for i in 0..self.joints.len() {
            self.refresh_grid(i, false);
        }
    }

    /// 当前姿态的快照（不发布）
    pub fn pose_frame(&self) -> PoseFrame {
        let bone_transforms: Vec<Mat4> = (0..self.joints.len())
            .map(|i| self.get_bone_transform(i))
            .collect();
        // 网格骨骼优先使用 transform_precomputed_prim 缓存的包围盒
        let bounds: Vec<Option<(Vec3, Vec3)>> = self
            .joints
            .iter()
            .map(|j| match j.bone.payload() {
                BonePayload::PrecomputedGrid(grid) if !grid.needs_retransform() => {
                    Some(grid.world_bounds())
                }
                BonePayload::PrecomputedGrid(grid) => Some(grid.bounds_in(&j.anim.frame)),
                _ => None,
            })
            .collect();
        self.build_frame(
            self.joints.iter().map(|j| j.transform).collect(),
            &bone_transforms,
            &bounds,
        )
    }

    /// 静止姿态的快照
    pub fn rest_frame(&self) -> PoseFrame {
        let identity = vec![Mat4::IDENTITY; self.joints.len()];
        let bounds: Vec<Option<(Vec3, Vec3)>> = self
            .joints
            .iter()
            .map(|j| match j.bone.payload() {
                BonePayload::PrecomputedGrid(grid) => Some(grid.bounds_in(&j.bone.frame())),
                _ => None,
            })
            .collect();
        self.build_frame(identity.clone(), &identity, &bounds)
    }

    /// 从环境中注销
    pub fn release(self, env: &mut SkeletonEnv) {
        env.unregister(self.skel_id);
    }

    fn build_frame(
        &self,
        joint_transforms: Vec<Mat4>,
        bone_transforms: &[Mat4],
        bone_bounds: &[Option<(Vec3, Vec3)>],
    ) -> PoseFrame {
        let bone_frames: Vec<Mat4> = self.joints.iter().map(|j| j.bone.frame()).collect();
        PoseFrame::build(
            self.skel_id,
            self.generation,
            joint_transforms,
            bone_transforms,
            &bone_frames,
            bone_bounds,
        )
    }

    fn refresh_grid(&mut self, bone: BoneId, force: bool) {
        let frame = self.joints[bone].anim.frame;
        if let BonePayload::PrecomputedGrid(grid) = self.joints[bone].bone.payload_mut() {
            if force || grid.needs_retransform() {
                grid.retransform(&frame);
            }
        }
    }
}

fn animate_bone(bone: &Bone, transform: &Mat4) -> AnimatedBone {
    AnimatedBone {
        org: transform.transform_point3(bone.org()),
        dir: transform.transform_vector3(bone.dir()),
        frame: *transform * bone.frame(),
        dual_quat: DualQuat::from_mat4(transform),
    }
}

/// 校验父索引并返回 (根, 父在前的顺序, 子列表)
fn build_hierarchy(parents: &[i32]) -> Result<(usize, Vec<usize>, Vec<Vec<usize>>)> {
    let count = parents.len();
    if count == 0 {
        return Err(SkinError::Topology("skeleton has no joints".to_string()));
    }

    let mut children = vec![Vec::new(); count];
    let mut roots = Vec::new();
    for (i, &parent) in parents.iter().enumerate() {
        if parent < 0 {
            roots.push(i);
        } else if parent as usize >= count {
            return Err(SkinError::Topology(format!(
                "joint {} has out-of-range parent {}",
                i, parent
            )));
        } else if parent as usize == i {
            return Err(SkinError::Topology(format!("joint {} is its own parent", i)));
        } else {
            children[parent as usize].push(i);
        }
    }
    if roots.len() != 1 {
        return Err(SkinError::Topology(format!(
            "expected exactly one root, found {}",
            roots.len()
        )));
    }

    // 从根出发的广度优先顺序；到达不了的关节一定在环上或挂在环下
    let root = roots[0];
    let mut order = Vec::with_capacity(count);
    order.push(root);
    let mut head = 0;
    while head < order.len() {
        let joint = order[head];
        order.extend_from_slice(&children[joint]);
        head += 1;
    }
    if order.len() != count {
        return Err(SkinError::Topology(format!(
            "{} joints are part of a cycle",
            count - order.len()
        )));
    }
    Ok((root, order, children))
}
