//! HRBF 隐式场
//!
//! 场值约定：表面为 0，内部为负，外部为正。原始 HRBF 是全局支撑的，
//! 通过半径 R 把它压缩到 `[-1, 1]` 的紧支撑势能：
//!
//! ```text
//! s = clamp(f / R, -1, 1)
//! potential = (3s - s³) / 2
//! ```

pub(crate) mod field;
mod fit;
mod grid;

pub use field::HrbfField;
pub use grid::GridField;

use glam::{DMat3, DVec3};

/// 场外（或被剔除时）的势能
pub const OUTSIDE_POTENTIAL: f32 = 1.0;

/// 核函数 φ(r) = r³
#[inline]
pub(crate) fn phi(r: f64) -> f64 {
    r * r * r
}

/// ∇φ(v) = 3|v|v
#[inline]
pub(crate) fn grad_phi(v: DVec3) -> DVec3 {
    v * (3.0 * v.length())
}

/// φ 的 Hessian：3(|v| I + v vᵀ / |v|)，v = 0 时为 0
pub(crate) fn hessian_phi(v: DVec3) -> DMat3 {
    let r = v.length();
    if r < 1e-12 {
        return DMat3::ZERO;
    }
    let outer = DMat3::from_cols(v * v.x, v * v.y, v * v.z);
    (DMat3::IDENTITY * r + outer * (1.0 / r)) * 3.0
}

/// 全局场值 f 在半径 R 下的紧支撑势能
pub fn compact_potential(f: f64, radius: f64) -> f64 {
    let s = (f / radius).clamp(-1.0, 1.0);
    0.5 * (3.0 * s - s * s * s)
}

/// d potential / d f
pub fn compact_derivative(f: f64, radius: f64) -> f64 {
    let s = f / radius;
    if s <= -1.0 || s >= 1.0 {
        return 0.0;
    }
    1.5 * (1.0 - s * s) / radius
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_potential_range() {
        assert!((compact_potential(0.0, 2.0)).abs() < 1e-12);
        assert!((compact_potential(5.0, 2.0) - 1.0).abs() < 1e-12);
        assert!((compact_potential(-5.0, 2.0) + 1.0).abs() < 1e-12);
        assert_eq!(compact_derivative(3.0, 2.0), 0.0);
        assert!((compact_derivative(0.0, 2.0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_radius_rescale_is_reparameterisation() {
        for &f in &[-0.7, -0.1, 0.0, 0.25, 0.9] {
            for &k in &[0.5, 2.0, 3.7] {
                let a = compact_potential(f, 1.0);
                let b = compact_potential(f * k, k);
                assert!((a - b).abs() < 1e-12);
                // 导数按 1/k 缩放
                let da = compact_derivative(f, 1.0);
                let db = compact_derivative(f * k, k);
                assert!((da - db * k).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_hessian_is_gradient_derivative() {
        let v = DVec3::new(0.3, -0.4, 1.2);
        let h = hessian_phi(v);
        let eps = 1e-6;
        for axis in 0..3 {
            let mut dv = DVec3::ZERO;
            dv[axis] = eps;
            let fd = (grad_phi(v + dv) - grad_phi(v - dv)) / (2.0 * eps);
            assert!((fd - h.col(axis)).length() < 1e-5);
        }
    }
}
