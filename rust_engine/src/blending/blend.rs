//! 层级混合

use std::sync::Arc;

use glam::Vec3;

use super::blend_pair;
use crate::hrbf::OUTSIDE_POTENTIAL;
use crate::skeleton::{BoneId, PoseFrame, Skeleton, SkeletonEnv};
use crate::Result;

/// 某一姿态下整个骨架的混合场
///
/// 关节 j 的子树 = 骨骼 j 自身的场与每棵子树依次按关节 j 的参数混合。
pub struct ImplicitBlend<'a> {
    skel: &'a Skeleton,
    frame: Arc<PoseFrame>,
}

impl<'a> ImplicitBlend<'a> {
    pub fn new(skel: &'a Skeleton, frame: Arc<PoseFrame>) -> Self {
        debug_assert_eq!(frame.joint_count(), skel.nb_joints());
        Self { skel, frame }
    }

    /// 使用环境中发布的当前姿态
    pub fn from_env(skel: &'a Skeleton, env: &SkeletonEnv) -> Result<Self> {
        Ok(Self::new(skel, env.frame(skel.skel_id())?))
    }

    /// 静止姿态
    pub fn rest(skel: &'a Skeleton) -> Self {
        Self::new(skel, Arc::new(skel.rest_frame()))
    }

    pub fn frame(&self) -> &PoseFrame {
        &self.frame
    }

    /// 世界坐标下的势场与梯度；没有任何场时为 `(+1, 0)`
    pub fn eval(&self, point: Vec3) -> (f32, Vec3) {
        if self.skel.nb_joints() == 0 {
            return (OUTSIDE_POTENTIAL, Vec3::ZERO);
        }
        self.eval_subtree(self.skel.root(), point)
            .unwrap_or((OUTSIDE_POTENTIAL, Vec3::ZERO))
    }

    /// 单根骨骼在当前姿态下的势场
    pub fn eval_bone(&self, bone: BoneId, point: Vec3) -> (f32, Vec3) {
        if !self.frame.bone(bone).may_contain(point) {
            return (OUTSIDE_POTENTIAL, Vec3::ZERO);
        }
        let local = self.frame.to_local(bone, point);
        let (value, gradient) = self.skel.bone(bone).eval_local(local);
        (value, self.frame.gradient_to_world(bone, gradient))
    }

    fn eval_subtree(&self, joint: usize, point: Vec3) -> Option<(f32, Vec3)> {
        let mut acc = if self.skel.is_bone(joint) && self.skel.bone(joint).has_field() {
            Some(self.eval_bone(joint, point))
        } else {
            None
        };

        let data = self.skel.joint_data(joint);
        for &child in self.skel.children(joint) {
            if let Some(sub) = self.eval_subtree(child, point) {
                acc = Some(match acc {
                    Some(own) => blend_pair(data, own, sub),
                    None => sub,
                });
            }
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hrbf::field::tests::sphere_samples;
    use crate::blending::ControllerShape;
    use crate::math::rotation_about;
    use crate::model::AbsSkeleton;
    use glam::{Mat4, Quat};

    fn two_bones(env: &mut SkeletonEnv) -> Skeleton {
        let abs = AbsSkeleton::from_joint_positions(
            &[Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), Vec3::new(8.0, 0.0, 0.0)],
            &[-1, 0, 1],
        );
        Skeleton::new(&abs, env).unwrap()
    }

    #[test]
    fn test_empty_skeleton_is_outside() {
        let mut env = SkeletonEnv::new();
        let skel = two_bones(&mut env);
        let blend = ImplicitBlend::rest(&skel);
        assert_eq!(blend.eval(Vec3::new(2.0, 0.0, 0.0)), (OUTSIDE_POTENTIAL, Vec3::ZERO));
    }

    #[test]
    fn test_single_field_follows_parent_joint() {
        let mut env = SkeletonEnv::new();
        let mut skel = two_bones(&mut env);
        // 骨骼 2 的局部空间中，以 (2, 0, 0) 为中心的球
        let samples = sphere_samples(40, 1.0).transform(&Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)));
        skel.set_bone_hrbf_radius(2, 1.0).unwrap();
        skel.fit_bone(2, &samples).unwrap();

        let rest = ImplicitBlend::rest(&skel);
        let (v, _) = rest.eval(Vec3::new(6.0, 1.0, 0.0));
        assert!(v.abs() < 0.05);

        let bend = rotation_about(Vec3::new(4.0, 0.0, 0.0), Quat::from_rotation_z(90f32.to_radians()));
        skel.update_bones_pose(&mut env, &[Mat4::IDENTITY, bend, bend]).unwrap();
        let posed = ImplicitBlend::from_env(&skel, &env).unwrap();

        // 球心移动到 (4, 2, 0)
        let (v, g) = posed.eval(Vec3::new(4.0, 3.0, 0.0));
        assert!(v.abs() < 0.05);
        assert!(g.normalize().dot(Vec3::Y) > 0.95);
        let (inside, _) = posed.eval(Vec3::new(4.0, 2.0, 0.0));
        assert!(inside < 0.0);
        assert_eq!(posed.eval_bone(1, Vec3::new(4.0, 2.0, 0.0)).0, OUTSIDE_POTENTIAL);
    }

    #[test]
    fn test_union_gradient_matches_finite_difference() {
        let mut env = SkeletonEnv::new();
        let mut skel = two_bones(&mut env);
        for bone in [1, 2] {
            let samples = sphere_samples(40, 1.5).transform(&Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0)));
            skel.set_bone_hrbf_radius(bone, 2.0).unwrap();
            skel.fit_bone(bone, &samples).unwrap();
        }
        skel.set_joint_controller(1, ControllerShape::flat());
        let blend = ImplicitBlend::rest(&skel);

        // 两个球 (3,0,0) 与 (7,0,0) 之间的混合带
        let p = Vec3::new(5.1, 1.0, 0.2);
        let (_, g) = blend.eval(p);
        let eps = 1e-3;
        for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
            let fd = (blend.eval(p + axis * eps).0 - blend.eval(p - axis * eps).0) / (2.0 * eps);
            assert!((g.dot(axis) - fd).abs() < 1e-2, "{} vs {}", g.dot(axis), fd);
        }
    }

    #[test]
    fn test_grid_bone_culled_outside_posed_bounds() {
        let mut env = SkeletonEnv::new();
        let mut skel = two_bones(&mut env);
        let samples = sphere_samples(40, 1.0).transform(&Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)));
        skel.set_bone_hrbf_radius(2, 1.0).unwrap();
        skel.fit_bone(2, &samples).unwrap();
        skel.precompute_bone(2, 24).unwrap();

        // 静止时网格盒覆盖 x ∈ [3, 9]
        let rest = ImplicitBlend::rest(&skel);
        let (_, rest_hi) = rest.frame().bone(2).world_bounds.unwrap();
        assert!(rest_hi.x > 8.9);
        assert!(rest.frame().bone(1).world_bounds.is_none());
        let far = Vec3::new(8.5, 0.0, 0.0);
        assert!(rest.eval_bone(2, far).0 > 0.0);

        let bend = rotation_about(Vec3::new(4.0, 0.0, 0.0), Quat::from_rotation_z(90f32.to_radians()));
        skel.update_bones_pose(&mut env, &[Mat4::IDENTITY, bend, bend]).unwrap();
        let posed = ImplicitBlend::from_env(&skel, &env).unwrap();

        // 弯曲后盒子转到 +Y，x 不超过 7
        let (lo, hi) = posed.frame().bone(2).world_bounds.unwrap();
        assert!(hi.y > 4.9 && lo.y < -0.9);
        assert!(hi.x < 7.1);

        assert_eq!(posed.eval_bone(2, far), (OUTSIDE_POTENTIAL, Vec3::ZERO));
        let (v, _) = posed.eval_bone(2, Vec3::new(4.0, 3.0, 0.0));
        assert!(v.abs() < 0.1);
    }
}
