//! 顶点蒙皮计算

use glam::{Mat4, Vec3};
use rayon::prelude::*;

use super::{SkinningInput, SkinningMode, SkinningOutput};
use crate::math::DualQuat;
use crate::model::BoneInfluence;

/// 并行计算蒙皮
pub fn compute_skinning(input: &SkinningInput, mode: SkinningMode) -> SkinningOutput {
    debug_assert_eq!(input.positions.len(), input.normals.len());
    debug_assert_eq!(input.positions.len(), input.weights.len());

    let skinned: Vec<(Vec3, Vec3)> = match mode {
        SkinningMode::Linear => input
            .positions
            .par_iter()
            .zip(input.normals.par_iter())
            .zip(input.weights.par_iter())
            .map(|((position, normal), weights)| {
                linear_vertex(*position, *normal, weights, input.matrices)
            })
            .collect(),
        SkinningMode::DualQuaternion => {
            let dual_quats: Vec<DualQuat> =
                input.matrices.par_iter().map(DualQuat::from_mat4).collect();
            input
                .positions
                .par_iter()
                .zip(input.normals.par_iter())
                .zip(input.weights.par_iter())
                .map(|((position, normal), weights)| {
                    dual_quat_vertex(*position, *normal, weights, &dual_quats)
                })
                .collect()
        }
    };

    let (positions, normals) = skinned.into_iter().unzip();
    SkinningOutput { positions, normals }
}

/// 线性混合；没有权重的顶点保持不动
fn linear_vertex(
    position: Vec3,
    normal: Vec3,
    weights: &[BoneInfluence],
    matrices: &[Mat4],
) -> (Vec3, Vec3) {
    if weights.is_empty() {
        return (position, normal);
    }
    let mut pos = Vec3::ZERO;
    let mut norm = Vec3::ZERO;
    let mut total = 0.0;
    for influence in weights {
        let m = get_matrix(matrices, influence.joint);
        pos += m.transform_point3(position) * influence.weight;
        norm += m.transform_vector3(normal) * influence.weight;
        total += influence.weight;
    }
    if total > 0.0 {
        pos /= total;
    } else {
        pos = position;
    }
    (pos, norm.normalize_or_zero())
}

fn dual_quat_vertex(
    position: Vec3,
    normal: Vec3,
    weights: &[BoneInfluence],
    dual_quats: &[DualQuat],
) -> (Vec3, Vec3) {
    if weights.is_empty() {
        return (position, normal);
    }
    let items: Vec<(DualQuat, f32)> = weights
        .iter()
        .map(|w| {
            let dq = dual_quats
                .get(w.joint)
                .copied()
                .unwrap_or(DualQuat::IDENTITY);
            (dq, w.weight)
        })
        .collect();
    let blended = DualQuat::blend(&items);
    (
        blended.transform_point(position),
        blended.transform_vector(normal).normalize_or_zero(),
    )
}

fn get_matrix(matrices: &[Mat4], index: usize) -> Mat4 {
    matrices.get(index).copied().unwrap_or(Mat4::IDENTITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::rotation_about;
    use glam::Quat;

    fn run(mode: SkinningMode, weights: &[Vec<BoneInfluence>], matrices: &[Mat4]) -> SkinningOutput {
        let positions = vec![Vec3::new(10.0, 1.0, 0.0); weights.len()];
        let normals = vec![Vec3::Y; weights.len()];
        compute_skinning(
            &SkinningInput {
                positions: &positions,
                normals: &normals,
                weights,
                matrices,
            },
            mode,
        )
    }

    #[test]
    fn test_rigid_weights_agree() {
        let bend = rotation_about(Vec3::new(10.0, 0.0, 0.0), Quat::from_rotation_z(90f32.to_radians()));
        let weights = vec![vec![BoneInfluence::new(1, 1.0)]];
        let matrices = [Mat4::IDENTITY, bend];
        let lbs = run(SkinningMode::Linear, &weights, &matrices);
        let dqs = run(SkinningMode::DualQuaternion, &weights, &matrices);
        let expected = Vec3::new(9.0, 0.0, 0.0);
        assert!((lbs.positions[0] - expected).length() < 1e-4);
        assert!((dqs.positions[0] - expected).length() < 1e-4);
        assert!((dqs.normals[0] + Vec3::X).length() < 1e-4);
    }

    #[test]
    fn test_dqs_preserves_distance_to_pivot() {
        let pivot = Vec3::new(10.0, 0.0, 0.0);
        let bend = rotation_about(pivot, Quat::from_rotation_z(90f32.to_radians()));
        let weights = vec![vec![BoneInfluence::new(0, 0.5), BoneInfluence::new(1, 0.5)]];
        let matrices = [Mat4::IDENTITY, bend];
        let lbs = run(SkinningMode::Linear, &weights, &matrices);
        let dqs = run(SkinningMode::DualQuaternion, &weights, &matrices);
        // 线性混合在关节处收缩，对偶四元数保持半径
        assert!(lbs.positions[0].distance(pivot) < 0.8);
        assert!((dqs.positions[0].distance(pivot) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_unweighted_vertex_stays() {
        let out = run(SkinningMode::Linear, &[Vec::new()], &[Mat4::from_translation(Vec3::X)]);
        assert_eq!(out.positions[0], Vec3::new(10.0, 1.0, 0.0));
    }
}
