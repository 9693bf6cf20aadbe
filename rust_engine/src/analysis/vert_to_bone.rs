//! 顶点 -> 最近骨骼

use rayon::prelude::*;

use super::weighted_percentile;
use crate::model::Mesh;
use crate::skeleton::{BoneId, Skeleton};

/// 每个顶点保留的候选骨骼数
pub const MAX_CANDIDATES: usize = 4;

/// 静止姿态下顶点与骨骼的关联
#[derive(Clone, Debug)]
pub struct VertToBoneInfo {
    /// 每个顶点的最近骨骼；骨架没有骨骼时为 None
    nearest: Vec<Option<BoneId>>,
    /// 每个顶点按 (距离, 骨骼 ID) 排序的候选
    candidates: Vec<Vec<(BoneId, f32)>>,
    /// 按关节索引：分配到该骨骼的顶点（升序）
    bone_vertices: Vec<Vec<usize>>,
}

impl VertToBoneInfo {
    pub fn new(skel: &Skeleton, mesh: &Mesh) -> Self {
        let bone_ids = skel.bone_ids();

        let candidates: Vec<Vec<(BoneId, f32)>> = mesh
            .positions()
            .par_iter()
            .map(|p| {
                let mut ranked: Vec<(BoneId, f32)> = bone_ids
                    .iter()
                    .map(|&b| (b, skel.bone(b).distance(*p).0))
                    .collect();
                // 距离相同取较小的骨骼 ID
                ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
                ranked.truncate(MAX_CANDIDATES);
                ranked
            })
            .collect();

        let nearest: Vec<Option<BoneId>> =
            candidates.iter().map(|c| c.first().map(|(b, _)| *b)).collect();

        let mut bone_vertices = vec![Vec::new(); skel.nb_joints()];
        for (v, bone) in nearest.iter().enumerate() {
            if let Some(b) = bone {
                bone_vertices[*b].push(v);
            }
        }

        log::debug!(
            "顶点-骨骼关联: {} 个顶点, {} 根骨骼",
            mesh.vertex_count(),
            bone_ids.len()
        );

        Self {
            nearest,
            candidates,
            bone_vertices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.nearest.len()
    }

    pub fn nearest_bone(&self, vertex: usize) -> Option<BoneId> {
        self.nearest[vertex]
    }

    pub fn candidates(&self, vertex: usize) -> &[(BoneId, f32)] {
        &self.candidates[vertex]
    }

    pub fn bone_vertices(&self, bone: BoneId) -> &[usize] {
        &self.bone_vertices[bone]
    }

    /// 默认关节排除半径
    ///
    /// 顶点到骨骼的径向距离的加权中位数，权重为顶点沿骨骼方向靠近相连关节的程度。
    /// 两端都不相连或没有顶点的骨骼为 0。
    pub fn get_default_junction_radius(&self, skel: &Skeleton, mesh: &Mesh) -> Vec<f32> {
        (0..skel.nb_joints())
            .map(|b| {
                if !skel.is_bone(b) {
                    return 0.0;
                }
                let start = skel.has_articulated_start(b);
                let end = skel.has_articulated_end(b);
                if !start && !end {
                    return 0.0;
                }

                let bone = skel.bone(b);
                let length = bone.length();
                let (radial, weights): (Vec<f32>, Vec<f32>) = self.bone_vertices[b]
                    .iter()
                    .map(|&v| {
                        let (dist, t) = bone.distance(mesh.positions()[v]);
                        let mut proximity = 0.0f32;
                        if start {
                            proximity = proximity.max(1.0 - t / length);
                        }
                        if end {
                            proximity = proximity.max(t / length);
                        }
                        (dist, proximity * proximity)
                    })
                    .unzip();
                weighted_percentile(&radial, &weights, 0.5).unwrap_or(0.0)
            })
            .collect()
    }

    /// 默认 HRBF 紧支撑半径：径向距离的 90% 分位数
    ///
    /// 没有顶点的骨骼取 `0.25 × 长度`，非骨骼关节为 0。
    pub fn get_default_hrbf_radius(&self, skel: &Skeleton, mesh: &Mesh) -> Vec<f32> {
        (0..skel.nb_joints())
            .map(|b| {
                if !skel.is_bone(b) {
                    return 0.0;
                }
                let bone = skel.bone(b);
                let radial: Vec<f32> = self.bone_vertices[b]
                    .iter()
                    .map(|&v| bone.distance(mesh.positions()[v]).0)
                    .collect();
                let weights = vec![1.0; radial.len()];
                match weighted_percentile(&radial, &weights, 0.9) {
                    Some(r) if r > 0.0 => r,
                    _ => 0.25 * bone.length(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AbsMesh, AbsSkeleton};
    use crate::skeleton::SkeletonEnv;
    use glam::Vec3;

    fn mesh(positions: Vec<Vec3>) -> Mesh {
        Mesh::from_abs(AbsMesh {
            normals: Some(vec![Vec3::Y; positions.len()]),
            positions,
            indices: Vec::new(),
            weights: Vec::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_single_bone_takes_everything() {
        let mut env = SkeletonEnv::new();
        let abs = AbsSkeleton::from_joint_positions(&[Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0)], &[-1, 0]);
        let skel = Skeleton::new(&abs, &mut env).unwrap();
        let mesh = mesh(vec![
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(2.0, 0.0, 2.0),
            Vec3::new(-3.0, 0.0, 0.0),
        ]);

        let info = VertToBoneInfo::new(&skel, &mesh);
        assert!((0..3).all(|v| info.nearest_bone(v) == Some(1)));
        assert_eq!(info.bone_vertices(1), &[0, 1, 2]);
        assert_eq!(info.get_default_junction_radius(&skel, &mesh), vec![0.0, 0.0]);

        let hrbf = info.get_default_hrbf_radius(&skel, &mesh);
        assert_eq!(hrbf[0], 0.0);
        assert!((hrbf[1] - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_tie_goes_to_lowest_bone() {
        let mut env = SkeletonEnv::new();
        // 两根兄弟骨骼，顶点与两者等距
        let abs = AbsSkeleton::from_joint_positions(
            &[Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), Vec3::new(-4.0, 0.0, 0.0)],
            &[-1, 0, 0],
        );
        let skel = Skeleton::new(&abs, &mut env).unwrap();
        let mesh = mesh(vec![Vec3::new(0.0, 1.0, 0.0)]);
        let info = VertToBoneInfo::new(&skel, &mesh);
        assert_eq!(info.nearest_bone(0), Some(1));
        assert_eq!(info.candidates(0).len(), 2);
    }

    #[test]
    fn test_junction_radius_on_chain() {
        let mut env = SkeletonEnv::new();
        let abs = AbsSkeleton::from_joint_positions(
            &[Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), Vec3::new(20.0, 0.0, 0.0)],
            &[-1, 0, 1],
        );
        let skel = Skeleton::new(&abs, &mut env).unwrap();
        // 半径为 1 的环
        let positions: Vec<Vec3> = (0..20)
            .flat_map(|i| {
                let x = 0.5 + i as f32;
                (0..8).map(move |k| {
                    let a = k as f32 * std::f32::consts::TAU / 8.0;
                    Vec3::new(x, a.cos(), a.sin())
                })
            })
            .collect();
        let mesh = mesh(positions);
        let info = VertToBoneInfo::new(&skel, &mesh);
        let jr = info.get_default_junction_radius(&skel, &mesh);
        assert_eq!(jr[0], 0.0);
        assert!((jr[1] - 1.0).abs() < 1e-4);
        assert!((jr[2] - 1.0).abs() < 1e-4);
    }
}
