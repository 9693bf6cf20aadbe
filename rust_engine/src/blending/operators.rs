//! 二元混合算子（势场空间，带梯度）

use glam::Vec3;

use super::JointBlend;
use crate::skeleton::JointData;

/// 控制曲线为 1 时的平滑宽度
pub const BLEND_WIDTH: f32 = 0.5;

/// (势场, 梯度)
pub type Sample = (f32, Vec3);

/// 硬并集：min(a, b)
#[inline]
pub fn hard_union(a: Sample, b: Sample) -> Sample {
    if b.0 < a.0 {
        b
    } else {
        a
    }
}

/// 多项式平滑最小值，宽度 `k`
///
/// `h = clamp(0.5 + 0.5(b−a)/k, 0, 1)`，`f = mix(b, a, h) − k·h(1−h)`，
/// 梯度恰为 `h∇a + (1−h)∇b`。
#[inline]
pub fn smooth_union(a: Sample, b: Sample, k: f32) -> Sample {
    if !(k > 0.0) {
        return hard_union(a, b);
    }
    let h = (0.5 + 0.5 * (b.0 - a.0) / k).clamp(0.0, 1.0);
    let value = b.0 + h * (a.0 - b.0) - k * h * (1.0 - h);
    let gradient = a.1 * h + b.1 * (1.0 - h);
    (value, gradient)
}

#[inline]
fn bump(t: f32) -> (f32, f32) {
    if t.abs() >= 1.0 {
        return (0.0, 0.0);
    }
    let u = 1.0 - t * t;
    (u * u, -4.0 * t * u)
}

/// 平滑并集减去接触区域的膨胀项 `m·k·w(a/k)·w(b/k)`，`w(t) = (1−t²)²`
#[inline]
pub fn bulge(a: Sample, b: Sample, k: f32, magnitude: f32) -> Sample {
    let (value, gradient) = smooth_union(a, b, k);
    if !(k > 0.0) || magnitude <= 0.0 {
        return (value, gradient);
    }
    let (wa, dwa) = bump(a.0 / k);
    let (wb, dwb) = bump(b.0 / k);
    let value = value - magnitude * k * wa * wb;
    let gradient = gradient - (a.1 * (dwa * wb) + b.1 * (wa * dwb)) * magnitude;
    (value, gradient)
}

/// 按关节参数混合父骨骼场 `a` 与子树场 `b`
///
/// 控制曲线由两梯度夹角余弦求值，作为局部常数缩放混合宽度。
pub fn blend_pair(joint: &JointData, a: Sample, b: Sample) -> Sample {
    let cos = match (a.1.try_normalize(), b.1.try_normalize()) {
        (Some(na), Some(nb)) => na.dot(nb),
        _ => 1.0,
    };
    let k = BLEND_WIDTH * joint.controller.eval(cos);
    match joint.blend {
        JointBlend::Max => hard_union(a, b),
        JointBlend::Union => smooth_union(a, b, k),
        JointBlend::Bulge => bulge(a, b, k, joint.bulge_strength),
    }
}
