//! 投影后的切向拉普拉斯平滑

use glam::Vec3;
use rayon::prelude::*;

/// Jacobi 迭代：每个顶点向一环邻域重心移动，去掉沿场梯度（法线）的分量
///
/// `weights[i]` 逐顶点缩放 `strength`；梯度为 0 或没有邻居的顶点不动。
pub fn smooth_vertices(
    positions: &[Vec3],
    gradients: &[Vec3],
    neighbors: &[Vec<usize>],
    weights: &[f32],
    iterations: usize,
    strength: f32,
) -> Vec<Vec3> {
    debug_assert_eq!(positions.len(), gradients.len());
    debug_assert_eq!(positions.len(), neighbors.len());
    debug_assert_eq!(positions.len(), weights.len());

    let normals: Vec<Option<Vec3>> = gradients.par_iter().map(|g| g.try_normalize()).collect();
    let mut current = positions.to_vec();
    for _ in 0..iterations {
        current = current
            .par_iter()
            .enumerate()
            .map(|(i, &p)| {
                let ring = &neighbors[i];
                let Some(n) = normals[i] else {
                    return p;
                };
                if ring.is_empty() {
                    return p;
                }
                let centroid = ring.iter().map(|&j| current[j]).sum::<Vec3>() / ring.len() as f32;
                let delta = centroid - p;
                let tangential = delta - n * delta.dot(n);
                p + tangential * (strength * weights[i]).clamp(0.0, 1.0)
            })
            .collect();
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_tangential_motion() {
        // 平面上的一个顶点被拉出了邻居的重心
        let positions = vec![
            Vec3::new(0.4, 0.0, 0.3),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
        ];
        let gradients = vec![Vec3::Z; 5];
        let neighbors = vec![vec![1, 2, 3, 4], vec![], vec![], vec![], vec![]];
        let weights = vec![1.0; 5];

        let out = smooth_vertices(&positions, &gradients, &neighbors, &weights, 1, 1.0);
        // z 分量（法线方向）保持
        assert!((out[0] - Vec3::new(0.0, 0.0, 0.3)).length() < 1e-6);
        assert_eq!(&out[1..], &positions[1..]);
    }

    #[test]
    fn test_zero_weight_or_gradient_pins_vertex() {
        let positions = vec![Vec3::new(0.5, 0.0, 0.0), Vec3::X, -Vec3::X];
        let neighbors = vec![vec![1, 2], vec![0], vec![0]];

        let out = smooth_vertices(&positions, &[Vec3::ZERO, Vec3::Z, Vec3::Z], &neighbors, &[1.0; 3], 2, 0.5);
        assert_eq!(out[0], positions[0]);

        let out = smooth_vertices(&positions, &[Vec3::Z; 3], &neighbors, &[0.0, 1.0, 1.0], 1, 0.5);
        assert_eq!(out[0], positions[0]);
    }
}
