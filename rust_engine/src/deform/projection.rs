//! 顶点投影到混合场的等值面

use glam::Vec3;
use rayon::prelude::*;

use super::DeformConfig;

/// 单个顶点的投影结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexStatus {
    /// |f - base| 小于容差
    Converged,
    /// 梯度过小、线搜索失败或达到迭代上限
    Stalled,
    /// 梯度方向突变（碰到其他骨骼的场）
    Contact,
}

/// 整个网格的投影结果
#[derive(Clone, Debug)]
pub struct Projection {
    pub positions: Vec<Vec3>,
    /// 最终位置处的场梯度
    pub gradients: Vec<Vec3>,
    pub status: Vec<VertexStatus>,
    pub iterations: Vec<u32>,
}

/// 并行地把每个顶点沿梯度移动，使 `f(p)` 回到 `base`
///
/// 每一步都保证 |f - base| 严格减小，否则停在原处。
pub fn project_vertices<F>(field: &F, start: &[Vec3], base: &[f32], config: &DeformConfig) -> Projection
where
    F: Fn(Vec3) -> (f32, Vec3) + Sync,
{
    debug_assert_eq!(start.len(), base.len());
    let results: Vec<(Vec3, Vec3, VertexStatus, u32)> = start
        .par_iter()
        .zip(base.par_iter())
        .map(|(p, target)| project_vertex(field, *p, *target, config))
        .collect();

    let mut projection = Projection {
        positions: Vec::with_capacity(results.len()),
        gradients: Vec::with_capacity(results.len()),
        status: Vec::with_capacity(results.len()),
        iterations: Vec::with_capacity(results.len()),
    };
    for (position, gradient, status, iterations) in results {
        projection.positions.push(position);
        projection.gradients.push(gradient);
        projection.status.push(status);
        projection.iterations.push(iterations);
    }
    projection
}

/// 单顶点牛顿迭代 + 回溯线搜索
///
/// 接触时保留已接受的这一步，返回的迭代次数为实际移动的步数。
pub fn project_vertex<F>(
    field: &F,
    start: Vec3,
    target: f32,
    config: &DeformConfig,
) -> (Vec3, Vec3, VertexStatus, u32)
where
    F: Fn(Vec3) -> (f32, Vec3),
{
    let mut p = start;
    let (mut value, mut gradient) = field(p);
    let mut error = (value - target).abs();

    for iteration in 0..config.max_iterations as u32 {
        if error < config.tolerance {
            return (p, gradient, VertexStatus::Converged, iteration);
        }
        let grad_len2 = gradient.length_squared();
        if grad_len2.sqrt() < config.min_gradient {
            return (p, gradient, VertexStatus::Stalled, iteration);
        }

        let mut step = -gradient * ((value - target) / grad_len2);
        if step.length() > config.max_step {
            step = step.normalize() * config.max_step;
        }

        // 回溯：步长折半直到误差减小
        let mut accepted = None;
        let mut alpha = 1.0;
        for _ in 0..=config.line_search_steps {
            let candidate = p + step * alpha;
            let (v, g) = field(candidate);
            let e = (v - target).abs();
            if e < error {
                accepted = Some((candidate, v, g, e));
                break;
            }
            alpha *= 0.5;
        }
        let Some((candidate, v, g, e)) = accepted else {
            return (p, gradient, VertexStatus::Stalled, iteration);
        };

        // 起点可能在另一根骨骼的场内，第一步不判断接触
        let diverged = iteration > 0
            && match (gradient.try_normalize(), g.try_normalize()) {
                (Some(a), Some(b)) => a.dot(b).clamp(-1.0, 1.0).acos() > config.max_gradient_angle,
                _ => false,
            };

        p = candidate;
        value = v;
        gradient = g;
        error = e;

        if diverged {
            return (p, gradient, VertexStatus::Contact, iteration + 1);
        }
    }

    let status = if error < config.tolerance {
        VertexStatus::Converged
    } else {
        VertexStatus::Stalled
    };
    (p, gradient, status, config.max_iterations as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(p: Vec3) -> (f32, Vec3) {
        // 半径 2 的球的有符号距离，截断到 [-1, 1]
        let d = p.length() - 2.0;
        if d.abs() >= 1.0 {
            (d.signum(), Vec3::ZERO)
        } else {
            (d, p.normalize_or_zero())
        }
    }

    #[test]
    fn test_converges_to_level_set() {
        let config = DeformConfig::default();
        let start = vec![Vec3::new(2.5, 0.0, 0.0), Vec3::new(0.0, 1.3, 0.0), Vec3::new(1.0, 1.0, 1.0)];
        let base = vec![0.0, 0.0, 0.2];
        let out = project_vertices(&sphere, &start, &base, &config);
        for i in 0..start.len() {
            assert_eq!(out.status[i], VertexStatus::Converged);
            assert!((sphere(out.positions[i]).0 - base[i]).abs() < config.tolerance);
        }
        // 沿法线移动
        assert!(out.positions[0].y.abs() < 1e-6);
    }

    #[test]
    fn test_outside_support_stalls_in_place() {
        let config = DeformConfig::default();
        let start = Vec3::new(10.0, 0.0, 0.0);
        let (p, _, status, iterations) = project_vertex(&sphere, start, 0.0, &config);
        assert_eq!(status, VertexStatus::Stalled);
        assert_eq!(p, start);
        assert_eq!(iterations, 0);
    }

    #[test]
    fn test_step_is_clamped() {
        let config = DeformConfig {
            max_iterations: 1,
            max_step: 0.1,
            ..Default::default()
        };
        let start = Vec3::new(2.8, 0.0, 0.0);
        let (p, _, _, _) = project_vertex(&sphere, start, 0.0, &config);
        assert!((p.x - 2.7).abs() < 1e-5);
    }

    /// 两个平面的硬并集，折痕处梯度突变
    fn crease(p: Vec3) -> (f32, Vec3) {
        let a = (p.x - 1.0, Vec3::X);
        let b = (p.y - 1.0, Vec3::Y);
        if a.0 > b.0 {
            a
        } else {
            b
        }
    }

    #[test]
    fn test_gradient_divergence_is_contact() {
        let config = DeformConfig {
            max_step: 0.3,
            ..Default::default()
        };
        // 沿 -X 走两步后越过折痕，梯度转为 +Y
        let start = Vec3::new(1.6, 1.2, 0.0);
        let (p, g, status, iterations) = project_vertex(&crease, start, 0.0, &config);
        assert_eq!(status, VertexStatus::Contact);
        assert_eq!(iterations, 2);
        // 停在越过折痕的那一步，而不是起点
        assert!((p - Vec3::new(1.0, 1.2, 0.0)).length() < 1e-5);
        assert_eq!(g, Vec3::Y);
        assert!(crease(p).0 < crease(start).0);
    }

    #[test]
    fn test_first_step_across_crease_still_projects() {
        // 第一步就跨过折痕，仍然继续投影直到收敛
        let config = DeformConfig::default();
        let start = Vec3::new(1.3, 1.2, 0.0);
        let (p, _, status, iterations) = project_vertex(&crease, start, 0.0, &config);
        assert_eq!(status, VertexStatus::Converged);
        assert!(iterations >= 2);
        assert!(crease(p).0.abs() < config.tolerance);
    }

    #[test]
    fn test_error_never_increases() {
        let config = DeformConfig::default();
        for i in 0..50 {
            let start = Vec3::new(0.3 + i as f32 * 0.07, 1.1, -0.4);
            let before = sphere(start).0.abs();
            let (p, _, _, _) = project_vertex(&sphere, start, 0.0, &config);
            assert!(sphere(p).0.abs() <= before);
        }
    }
}
