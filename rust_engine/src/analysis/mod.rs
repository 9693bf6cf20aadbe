//! 顶点与骨骼的关联分析

mod vert_to_bone;

pub use vert_to_bone::{VertToBoneInfo, MAX_CANDIDATES};

/// 加权百分位数
///
/// 按值排序后返回累计权重首次达到 `p × 总权重` 的值。
/// 没有正权重时返回 `None`。
pub fn weighted_percentile(values: &[f32], weights: &[f32], p: f32) -> Option<f32> {
    debug_assert_eq!(values.len(), weights.len());
    let mut pairs: Vec<(f32, f32)> = values
        .iter()
        .zip(weights)
        .filter(|(_, w)| **w > 0.0)
        .map(|(v, w)| (*v, *w))
        .collect();
    let total: f32 = pairs.iter().map(|(_, w)| w).sum();
    if pairs.is_empty() || !(total > 0.0) {
        return None;
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let target = p.clamp(0.0, 1.0) * total;
    let mut acc = 0.0;
    for &(value, weight) in &pairs {
        acc += weight;
        if acc >= target {
            return Some(value);
        }
    }
    pairs.last().map(|(v, _)| *v)
}
