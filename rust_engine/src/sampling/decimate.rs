//! 最远点抽稀

use glam::Vec3;

#[inline]
fn metric(a: Vec3, na: Vec3, b: Vec3, nb: Vec3, normal_weight: f32) -> f32 {
    a.distance(b) * (1.0 + normal_weight * (1.0 - na.dot(nb)))
}

/// 贪心最远点采样，返回选中的下标
///
/// 从下标 0 开始，每次加入离已选集合最远的点（同距取最小下标），
/// 直到达到 `max_count` 或最远距离小于 `min_distance`。
/// 距离为 `d · (1 + normal_weight · (1 − n·m))`，法线变化剧烈的点优先。
pub fn farthest_point_sample(
    points: &[Vec3],
    normals: &[Vec3],
    max_count: usize,
    min_distance: f32,
    normal_weight: f32,
) -> Vec<usize> {
    debug_assert_eq!(points.len(), normals.len());
    if points.is_empty() || max_count == 0 {
        return Vec::new();
    }

    let mut selected = vec![0];
    let mut dist: Vec<f32> = points
        .iter()
        .zip(normals)
        .map(|(p, n)| metric(*p, *n, points[0], normals[0], normal_weight))
        .collect();

    while selected.len() < max_count {
        let mut best = 0;
        let mut best_dist = f32::NEG_INFINITY;
        for (i, &d) in dist.iter().enumerate() {
            if d > best_dist {
                best = i;
                best_dist = d;
            }
        }
        // 重合点距离为 0，不能再选
        if best_dist <= 0.0 || best_dist < min_distance {
            break;
        }
        selected.push(best);

        let (bp, bn) = (points[best], normals[best]);
        for (i, d) in dist.iter_mut().enumerate() {
            *d = d.min(metric(points[i], normals[i], bp, bn, normal_weight));
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picks_extremes_first() {
        let points: Vec<Vec3> = (0..11).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let normals = vec![Vec3::Y; points.len()];
        let picked = farthest_point_sample(&points, &normals, 3, 0.0, 1.0);
        assert_eq!(picked, vec![0, 10, 5]);
    }

    #[test]
    fn test_min_distance_stops() {
        let points: Vec<Vec3> = (0..11).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let normals = vec![Vec3::Y; points.len()];
        let picked = farthest_point_sample(&points, &normals, 100, 2.0, 0.0);
        assert_eq!(picked, vec![0, 10, 5, 2, 7]);
        for (a, &i) in picked.iter().enumerate() {
            for &j in &picked[a + 1..] {
                assert!(points[i].distance(points[j]) >= 2.0 - 1e-6);
            }
        }
    }

    #[test]
    fn test_duplicates_never_selected() {
        let points = vec![Vec3::ZERO, Vec3::ZERO, Vec3::X];
        let normals = vec![Vec3::Y; 3];
        let picked = farthest_point_sample(&points, &normals, 10, 0.0, 1.0);
        assert_eq!(picked, vec![0, 2]);
    }

    #[test]
    fn test_normal_weight_prefers_sharp_normals() {
        let points = vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.9, 0.0, 0.0)];
        let normals = vec![Vec3::Y, Vec3::Y, -Vec3::Y];
        let picked = farthest_point_sample(&points, &normals, 2, 0.0, 1.0);
        assert_eq!(picked, vec![0, 2]);
    }
}
