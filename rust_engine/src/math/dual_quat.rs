//! 对偶四元数（刚体变换的混合表示）

use glam::{Mat4, Quat, Vec3, Vec4};

/// 对偶四元数：real 表示旋转，dual 编码平移
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DualQuat {
    pub real: Quat,
    pub dual: Quat,
}

impl Default for DualQuat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl DualQuat {
    pub const IDENTITY: Self = Self {
        real: Quat::IDENTITY,
        dual: Quat::from_xyzw(0.0, 0.0, 0.0, 0.0),
    };

    /// 由旋转和平移构造
    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        let real = rotation.normalize();
        let t = Quat::from_xyzw(translation.x, translation.y, translation.z, 0.0);
        let dual = scale(qmul(t, real), 0.5);
        Self { real, dual }
    }

    /// 由矩阵构造（忽略缩放分量）
    pub fn from_mat4(m: &Mat4) -> Self {
        let (_, rotation, translation) = m.to_scale_rotation_translation();
        Self::from_rotation_translation(rotation, translation)
    }

    /// 平移分量 t = 2 * dual * conj(real)
    pub fn translation(&self) -> Vec3 {
        let t = qmul(self.dual, self.real.conjugate());
        Vec3::new(t.x, t.y, t.z) * 2.0
    }

    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.real, self.translation())
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.real * p + self.translation()
    }

    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.real * v
    }

    /// 加权混合（DLB），按第一个分量的半球对齐符号
    pub fn blend(items: &[(DualQuat, f32)]) -> DualQuat {
        let Some((pivot, _)) = items.first() else {
            return DualQuat::IDENTITY;
        };

        let mut real = Vec4::ZERO;
        let mut dual = Vec4::ZERO;
        for (dq, w) in items {
            let w = if dq.real.dot(pivot.real) < 0.0 { -*w } else { *w };
            real += Vec4::from(dq.real) * w;
            dual += Vec4::from(dq.dual) * w;
        }

        let norm = real.length();
        if norm < 1e-8 {
            return DualQuat::IDENTITY;
        }
        DualQuat {
            real: Quat::from_vec4(real / norm),
            dual: Quat::from_vec4(dual / norm),
        }
    }
}

/// 非单位四元数乘法（glam 的乘法假设单位四元数）
fn qmul(a: Quat, b: Quat) -> Quat {
    Quat::from_xyzw(
        a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
        a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
        a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
    )
}

fn scale(q: Quat, s: f32) -> Quat {
    Quat::from_vec4(Vec4::from(q) * s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_round_trip_point() {
        let m = Mat4::from_rotation_translation(
            Quat::from_rotation_y(0.7),
            Vec3::new(1.0, -2.0, 3.0),
        );
        let dq = DualQuat::from_mat4(&m);
        let p = Vec3::new(0.3, 0.5, -1.5);
        assert!((dq.transform_point(p) - m.transform_point3(p)).length() < 1e-5);
        assert!((dq.translation() - Vec3::new(1.0, -2.0, 3.0)).length() < 1e-5);
    }

    #[test]
    fn test_blend_same_transform() {
        let dq = DualQuat::from_rotation_translation(Quat::from_rotation_z(1.0), Vec3::X);
        let blended = DualQuat::blend(&[(dq, 0.3), (dq, 0.7)]);
        let p = Vec3::new(2.0, 1.0, 0.0);
        assert!((blended.transform_point(p) - dq.transform_point(p)).length() < 1e-5);
    }

    #[test]
    fn test_blend_antipodal_sign() {
        let dq = DualQuat::from_rotation_translation(Quat::from_rotation_x(0.4), Vec3::Y);
        let flipped = DualQuat {
            real: Quat::from_vec4(-Vec4::from(dq.real)),
            dual: Quat::from_vec4(-Vec4::from(dq.dual)),
        };
        let blended = DualQuat::blend(&[(dq, 0.5), (flipped, 0.5)]);
        let p = Vec3::new(0.0, 0.0, 1.0);
        assert!((blended.transform_point(p) - dq.transform_point(p)).length() < 1e-5);
    }
}
