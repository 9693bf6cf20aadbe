//! 几何辅助函数

mod dual_quat;

pub use dual_quat::DualQuat;

use glam::{Mat3, Mat4, Vec3};

/// 退化骨骼的最小长度（与关节重合的骨骼）
pub const MIN_BONE_LENGTH: f32 = 1e-6;

/// 点到线段的距离
///
/// 返回 `(距离, 投影参数)`，投影参数为沿骨骼方向的长度，已限制在 `[0, length]`。
pub fn point_segment_distance(point: Vec3, org: Vec3, dir: Vec3, length: f32) -> (f32, f32) {
    let axis = dir.normalize_or_zero();
    let t = (point - org).dot(axis).clamp(0.0, length.max(0.0));
    let closest = org + axis * t;
    ((point - closest).length(), t)
}

/// 骨骼坐标系：原点在骨骼起点，X 轴沿骨骼方向，Y/Z 任取正交
pub fn bone_frame(org: Vec3, dir: Vec3) -> Mat4 {
    let x = dir.try_normalize().unwrap_or(Vec3::X);
    let (y, z) = x.any_orthonormal_pair();
    Mat4::from_cols(x.extend(0.0), y.extend(0.0), z.extend(0.0), org.extend(1.0))
}

/// 法线变换矩阵 = 线性部分的逆转置
pub fn normal_matrix(m: &Mat4) -> Mat3 {
    Mat3::from_mat4(*m).inverse().transpose()
}

/// 用法线矩阵变换法线并重新归一化
pub fn transform_normal(normal_mat: &Mat3, n: Vec3) -> Vec3 {
    (*normal_mat * n).normalize_or_zero()
}

/// 绕指定点的旋转：translate(pivot) * R * translate(-pivot)
pub fn rotation_about(pivot: Vec3, rotation: glam::Quat) -> Mat4 {
    Mat4::from_translation(pivot) * Mat4::from_quat(rotation) * Mat4::from_translation(-pivot)
}
