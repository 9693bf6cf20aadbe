//! 动画网格：缓存静止姿态势场，每帧从静止网格出发重新变形

use glam::{Mat4, Vec3};
use rayon::prelude::*;

use super::config::{self, DeformConfig};
use super::projection::{project_vertices, VertexStatus};
use super::smoothing::smooth_vertices;
use crate::analysis::VertToBoneInfo;
use crate::blending::ImplicitBlend;
use crate::model::{compute_normals, BoneInfluence, Mesh};
use crate::skeleton::{SkelId, Skeleton, SkeletonEnv};
use crate::skinning::{compute_skinning, SkinningInput};
use crate::{Result, SkinError};

/// 一帧变形的统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeformStats {
    pub converged: usize,
    pub stalled: usize,
    pub contact: usize,
    /// 所有顶点在各次投影中的迭代次数之和
    pub iterations: usize,
}

/// 静止姿态下每个顶点的势场
#[derive(Clone, Debug)]
struct BasePotential {
    skel_id: SkelId,
    fields_version: u64,
    values: Vec<f32>,
    gradients: Vec<Vec3>,
}

/// 被骨架驱动的网格
pub struct AnimatedMesh {
    mesh: Mesh,
    config: DeformConfig,
    /// 网格没有权重时使用的刚性绑定（索引为骨骼 ID）
    rigid_weights: Vec<Vec<BoneInfluence>>,
    smoothing_weights: Vec<f32>,
    base: Option<BasePotential>,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    /// 最后一次投影的逐顶点状态
    status: Vec<VertexStatus>,
    last_stats: DeformStats,
}

impl AnimatedMesh {
    pub fn new(mesh: Mesh, skel: &Skeleton) -> Self {
        let rigid_weights = if mesh.has_weights() {
            Vec::new()
        } else {
            let info = VertToBoneInfo::new(skel, &mesh);
            (0..mesh.vertex_count())
                .map(|v| match info.nearest_bone(v) {
                    Some(bone) => vec![BoneInfluence::new(bone, 1.0)],
                    None => Vec::new(),
                })
                .collect()
        };

        let count = mesh.vertex_count();
        Self {
            positions: mesh.positions().to_vec(),
            normals: mesh.normals().to_vec(),
            mesh,
            config: config::get_config(),
            rigid_weights,
            smoothing_weights: vec![1.0; count],
            base: None,
            status: Vec::new(),
            last_stats: DeformStats::default(),
        }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn config(&self) -> &DeformConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: DeformConfig) {
        self.config = config;
    }

    /// 逐顶点平滑权重
    pub fn set_smoothing_weights(&mut self, weights: Vec<f32>) -> Result<()> {
        if weights.len() != self.mesh.vertex_count() {
            return Err(SkinError::InvalidInput(format!(
                "expected {} smoothing weights, got {}",
                self.mesh.vertex_count(),
                weights.len()
            )));
        }
        self.smoothing_weights = weights;
        Ok(())
    }

    pub fn smoothing_weights(&self) -> &[f32] {
        &self.smoothing_weights
    }

    /// 在静止姿态下计算每个顶点的混合势场
    pub fn update_base_potential(&mut self, skel: &Skeleton) {
        let blend = ImplicitBlend::rest(skel);
        let (values, gradients): (Vec<f32>, Vec<Vec3>) = self
            .mesh
            .positions()
            .par_iter()
            .map(|p| blend.eval(*p))
            .unzip();

        log::info!(
            "静止势场计算完成: {} 个顶点, 骨架 {}",
            values.len(),
            skel.skel_id()
        );
        self.base = Some(BasePotential {
            skel_id: skel.skel_id(),
            fields_version: skel.fields_version(),
            values,
            gradients,
        });
    }

    pub fn invalidate_base_potential(&mut self) {
        self.base = None;
    }

    /// 缓存存在且与骨架的当前隐式场一致
    pub fn has_base_potential(&self, skel: &Skeleton) -> bool {
        self.base.as_ref().is_some_and(|b| {
            b.skel_id == skel.skel_id() && b.fields_version == skel.fields_version()
        })
    }

    pub fn base_potential(&self) -> Option<&[f32]> {
        self.base.as_ref().map(|b| b.values.as_slice())
    }

    pub fn base_gradients(&self) -> Option<&[Vec3]> {
        self.base.as_ref().map(|b| b.gradients.as_slice())
    }

    /// 按当前姿态变形
    ///
    /// 每次都从静止网格出发，同一姿态重复调用结果相同。
    /// 势场缓存过期时只把顶点恢复到静止位置。
    pub fn deform_mesh(&mut self, skel: &Skeleton, env: &SkeletonEnv) -> Result<DeformStats> {
        let frame = env.frame(skel.skel_id())?;

        let base = match &self.base {
            Some(base) if self.has_base_potential(skel) => base,
            _ => {
                log::debug!("静止势场缓存已过期，跳过变形");
                self.positions = self.mesh.positions().to_vec();
                self.normals = self.mesh.normals().to_vec();
                self.status.clear();
                self.last_stats = DeformStats::default();
                return Ok(self.last_stats);
            }
        };

        // 1. 初始蒙皮
        let (weights, matrices): (&[Vec<BoneInfluence>], Vec<Mat4>) = if self.mesh.has_weights() {
            let joints = (0..frame.joint_count())
                .map(|j| frame.joint_transform(j))
                .collect();
            (self.mesh.weights(), joints)
        } else {
            let bones = (0..skel.nb_joints())
                .map(|b| match skel.parent(b) {
                    p if p >= 0 => frame.joint_transform(p as usize),
                    _ => Mat4::IDENTITY,
                })
                .collect();
            (self.rigid_weights.as_slice(), bones)
        };
        let skinned = compute_skinning(
            &SkinningInput {
                positions: self.mesh.positions(),
                normals: self.mesh.normals(),
                weights,
                matrices: &matrices,
            },
            self.config.skinning_mode,
        );

        // 2. 投影回静止势场的等值面
        let blend = ImplicitBlend::new(skel, frame);
        let eval = |p: Vec3| blend.eval(p);
        let mut projection = project_vertices(&eval, &skinned.positions, &base.values, &self.config);
        let mut iterations: usize = projection.iterations.iter().map(|&i| i as usize).sum();

        // 3. 平滑与投影交替，最后一步总是投影
        if self.config.smoothing_enabled {
            for _ in 0..self.config.smoothing_iterations {
                let smoothed = smooth_vertices(
                    &projection.positions,
                    &projection.gradients,
                    self.mesh.neighbor_lists(),
                    &self.smoothing_weights,
                    1,
                    self.config.smoothing_strength,
                );
                projection = project_vertices(&eval, &smoothed, &base.values, &self.config);
                iterations += projection.iterations.iter().map(|&i| i as usize).sum::<usize>();
            }
        }

        let mut stats = DeformStats {
            iterations,
            ..Default::default()
        };
        for status in &projection.status {
            match status {
                VertexStatus::Converged => stats.converged += 1,
                VertexStatus::Stalled => stats.stalled += 1,
                VertexStatus::Contact => stats.contact += 1,
            }
        }
        let positions = projection.positions;
        self.status = projection.status;

        self.normals = if self.mesh.indices().is_empty() {
            skinned.normals
        } else {
            compute_normals(&positions, self.mesh.indices())
        };
        self.positions = positions;

        if stats.stalled > 0 {
            log::debug!(
                "投影未完全收敛: {} 个顶点停滞, {} 个接触",
                stats.stalled,
                stats.contact
            );
        }
        log::debug!(
            "变形完成: 收敛 {}, 停滞 {}, 接触 {}, 总迭代 {}",
            stats.converged,
            stats.stalled,
            stats.contact,
            stats.iterations
        );
        self.last_stats = stats;
        Ok(stats)
    }

    /// 当前（变形后的）顶点位置
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// 由变形后位置重新计算的法线
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn last_stats(&self) -> DeformStats {
        self.last_stats
    }

    /// 上一帧每个顶点的投影状态；缓存过期时为空
    pub fn vertex_status(&self) -> &[VertexStatus] {
        &self.status
    }
}
