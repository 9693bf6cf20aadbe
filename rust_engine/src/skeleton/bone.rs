//! 骨骼节点

use glam::{Mat4, Vec3};

use super::BoneId;
use crate::hrbf::{GridField, HrbfField, OUTSIDE_POTENTIAL};
use crate::math::{self, MIN_BONE_LENGTH};

/// 骨骼上挂载的隐式曲面
#[derive(Clone, Debug, Default)]
pub enum BonePayload {
    #[default]
    None,
    Hrbf(HrbfField),
    PrecomputedGrid(GridField),
}

/// 骨骼类型标签
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoneType {
    None,
    Hrbf,
    PrecomputedGrid,
}

/// 骨骼（静止姿态几何 + 隐式场）
#[derive(Clone, Debug)]
pub struct Bone {
    id: BoneId,
    /// 起点（父关节位置）
    org: Vec3,
    /// 起点到终点的向量
    dir: Vec3,
    length: f32,
    /// 紧支撑半径
    radius: f32,
    payload: BonePayload,
}

impl Bone {
    /// 由起点和终点创建；长度为 0 时使用极小长度和 +X 方向
    pub fn new(id: BoneId, org: Vec3, end: Vec3) -> Self {
        let mut dir = end - org;
        let mut length = dir.length();
        if length < MIN_BONE_LENGTH {
            length = MIN_BONE_LENGTH;
            dir = Vec3::X * MIN_BONE_LENGTH;
        }
        Self {
            id,
            org,
            dir,
            length,
            radius: 0.0,
            payload: BonePayload::None,
        }
    }

    pub fn id(&self) -> BoneId {
        self.id
    }

    pub fn org(&self) -> Vec3 {
        self.org
    }

    pub fn dir(&self) -> Vec3 {
        self.dir
    }

    /// 单位方向
    pub fn axis(&self) -> Vec3 {
        self.dir / self.length
    }

    pub fn end(&self) -> Vec3 {
        self.org + self.dir
    }

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// 修改紧支撑半径，同时作用到隐式场；非正值忽略
    pub fn set_radius(&mut self, radius: f32) {
        if !(radius > 0.0) {
            return;
        }
        self.radius = radius;
        match &mut self.payload {
            BonePayload::None => {}
            BonePayload::Hrbf(field) => field.set_radius(radius),
            BonePayload::PrecomputedGrid(grid) => grid.set_radius(radius),
        }
    }

    pub fn payload(&self) -> &BonePayload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut BonePayload {
        &mut self.payload
    }

    /// 替换隐式场，半径取场自身的半径
    pub fn set_payload(&mut self, payload: BonePayload) {
        match &payload {
            BonePayload::None => {}
            BonePayload::Hrbf(field) => self.radius = field.radius(),
            BonePayload::PrecomputedGrid(grid) => self.radius = grid.radius(),
        }
        self.payload = payload;
    }

    pub fn bone_type(&self) -> BoneType {
        match self.payload {
            BonePayload::None => BoneType::None,
            BonePayload::Hrbf(_) => BoneType::Hrbf,
            BonePayload::PrecomputedGrid(_) => BoneType::PrecomputedGrid,
        }
    }

    pub fn has_field(&self) -> bool {
        !matches!(self.payload, BonePayload::None)
    }

    /// 静止姿态下的骨骼坐标系（局部 -> 世界）
    pub fn frame(&self) -> Mat4 {
        math::bone_frame(self.org, self.dir)
    }

    /// 点到骨骼线段的距离和沿骨骼的投影长度
    pub fn distance(&self, point: Vec3) -> (f32, f32) {
        math::point_segment_distance(point, self.org, self.dir, self.length)
    }

    /// 在骨骼局部空间求值
    pub fn eval_local(&self, local: Vec3) -> (f32, Vec3) {
        match &self.payload {
            BonePayload::None => (OUTSIDE_POTENTIAL, Vec3::ZERO),
            BonePayload::Hrbf(field) => field.eval(local),
            BonePayload::PrecomputedGrid(grid) => grid.eval(local),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_length_bone() {
        let bone = Bone::new(3, Vec3::ONE, Vec3::ONE);
        assert_eq!(bone.length(), MIN_BONE_LENGTH);
        assert!((bone.axis() - Vec3::X).length() < 1e-6);
        assert_eq!(bone.bone_type(), BoneType::None);
    }

    #[test]
    fn test_frame_maps_axis_to_bone() {
        let bone = Bone::new(1, Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 5.0));
        let end = bone.frame().transform_point3(Vec3::new(bone.length(), 0.0, 0.0));
        assert!((end - bone.end()).length() < 1e-5);
    }

    #[test]
    fn test_empty_payload_is_outside() {
        let bone = Bone::new(1, Vec3::ZERO, Vec3::X);
        assert_eq!(bone.eval_local(Vec3::ZERO), (OUTSIDE_POTENTIAL, Vec3::ZERO));
    }
}
