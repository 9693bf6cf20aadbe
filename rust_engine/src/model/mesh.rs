//! 静止姿态网格

use glam::Vec3;

use super::{AbsMesh, BoneInfluence};
use crate::{Result, SkinError};

/// 静止姿态网格（顶点、法线、拓扑和权重）
#[derive(Clone, Debug)]
pub struct Mesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    indices: Vec<u32>,
    weights: Vec<Vec<BoneInfluence>>,
    /// 一环邻域（由三角形边构建）
    neighbors: Vec<Vec<usize>>,
}

impl Mesh {
    /// 从加载器数据创建，校验长度和索引范围
    pub fn from_abs(abs: AbsMesh) -> Result<Self> {
        let AbsMesh {
            positions,
            normals,
            indices,
            weights,
        } = abs;
        let vertex_count = positions.len();

        if indices.len() % 3 != 0 {
            return Err(SkinError::InvalidInput(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(SkinError::InvalidInput(format!(
                "triangle index {} out of range (vertex count {})",
                bad, vertex_count
            )));
        }
        if !weights.is_empty() && weights.len() != vertex_count {
            return Err(SkinError::InvalidInput(format!(
                "weight count {} does not match vertex count {}",
                weights.len(),
                vertex_count
            )));
        }

        let normals = match normals {
            Some(normals) if normals.len() == vertex_count => normals
                .into_iter()
                .map(|n| n.normalize_or_zero())
                .collect(),
            Some(normals) => {
                return Err(SkinError::InvalidInput(format!(
                    "normal count {} does not match vertex count {}",
                    normals.len(),
                    vertex_count
                )))
            }
            None => compute_normals(&positions, &indices),
        };

        let neighbors = build_neighbors(vertex_count, &indices);

        Ok(Self {
            positions,
            normals,
            indices,
            weights,
            neighbors,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn has_weights(&self) -> bool {
        !self.weights.is_empty()
    }

    pub fn weights(&self) -> &[Vec<BoneInfluence>] {
        &self.weights
    }

    /// 顶点 i 的一环邻域
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }

    pub fn neighbor_lists(&self) -> &[Vec<usize>] {
        &self.neighbors
    }
}

/// 面积加权的顶点法线
pub fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        // 叉积长度即两倍面积，不归一化即为面积加权
        let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }
    normals.iter_mut().for_each(|n| *n = n.normalize_or_zero());
    normals
}

fn build_neighbors(vertex_count: usize, indices: &[u32]) -> Vec<Vec<usize>> {
    let mut neighbors = vec![Vec::new(); vertex_count];
    for tri in indices.chunks_exact(3) {
        for k in 0..3 {
            let a = tri[k] as usize;
            let b = tri[(k + 1) % 3] as usize;
            neighbors[a].push(b);
            neighbors[b].push(a);
        }
    }
    for list in &mut neighbors {
        list.sort_unstable();
        list.dedup();
    }
    neighbors
}
