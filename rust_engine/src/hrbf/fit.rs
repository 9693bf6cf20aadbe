//! HRBF 插值系统的组装与求解

use glam::DVec3;
use nalgebra::{DMatrix, DVector};

use super::{grad_phi, hessian_phi, phi};
use crate::{Result, SkinError};

/// 求解得到的插值系数
#[derive(Clone, Debug, Default)]
pub(super) struct HrbfWeights {
    pub alphas: Vec<f64>,
    pub betas: Vec<DVec3>,
    /// 线性多项式 c0 + c·x
    pub c0: f64,
    pub c: DVec3,
}

/// LU 主元的最小相对大小，低于此值视为奇异
const PIVOT_TOLERANCE: f64 = 1e-12;
/// 相对残差容差
const RESIDUAL_TOLERANCE: f64 = 1e-8;
/// 重合样本的距离阈值
const COINCIDENT_EPSILON: f64 = 1e-9;

/// 组装并求解 (4N + 4) 维 Hermite 插值系统
///
/// 未知量按 [α_j, β_j.x, β_j.y, β_j.z] 逐样本排列，最后 4 个为多项式系数。
/// 值约束 f(x_i) = 0，梯度约束 ∇f(x_i) = n_i，多项式部分满足正交条件。
pub(super) fn solve(centers: &[DVec3], normals: &[DVec3]) -> Result<HrbfWeights> {
    let n = centers.len();
    if n < 2 {
        return Err(SkinError::DegenerateFit(format!(
            "need at least 2 samples, got {}",
            n
        )));
    }
    if normals.len() != n {
        return Err(SkinError::DegenerateFit(format!(
            "{} positions but {} normals",
            n,
            normals.len()
        )));
    }

    for i in 0..n {
        if normals[i].length_squared() < 1e-24 {
            return Err(SkinError::DegenerateFit(format!("sample {} has a zero normal", i)));
        }
        for j in (i + 1)..n {
            if centers[i].distance_squared(centers[j]) < COINCIDENT_EPSILON * COINCIDENT_EPSILON {
                return Err(SkinError::DegenerateFit(format!(
                    "samples {} and {} are coincident",
                    i, j
                )));
            }
        }
    }

    let dim = 4 * n + 4;
    let poly = 4 * n;
    let mut a = DMatrix::<f64>::zeros(dim, dim);
    let mut b = DVector::<f64>::zeros(dim);

    for i in 0..n {
        let xi = centers[i];
        let row = 4 * i;

        for j in 0..n {
            let col = 4 * j;
            let v = xi - centers[j];
            let g = grad_phi(v);
            let h = hessian_phi(v);

            // 值约束行
            a[(row, col)] = phi(v.length());
            for k in 0..3 {
                a[(row, col + 1 + k)] = -g[k];
            }
            // 梯度约束行
            for r in 0..3 {
                a[(row + 1 + r, col)] = g[r];
                for k in 0..3 {
                    a[(row + 1 + r, col + 1 + k)] = -h.col(k)[r];
                }
            }
        }

        // 多项式列
        a[(row, poly)] = 1.0;
        for k in 0..3 {
            a[(row, poly + 1 + k)] = xi[k];
            a[(row + 1 + k, poly + 1 + k)] = 1.0;
        }

        // 正交条件行（与多项式列对称）
        a[(poly, row)] = 1.0;
        for k in 0..3 {
            a[(poly + 1 + k, row)] = xi[k];
            a[(poly + 1 + k, row + 1 + k)] = 1.0;
        }

        for k in 0..3 {
            b[row + 1 + k] = normals[i][k];
        }
    }

    let lu = a.clone().lu();

    // 主元比值作为条件数的粗略估计
    let u = lu.u();
    let (min_pivot, max_pivot) = (0..dim)
        .map(|i| u[(i, i)].abs())
        .fold((f64::MAX, 0.0f64), |(lo, hi), p| (lo.min(p), hi.max(p)));
    if !(max_pivot > 0.0) || min_pivot / max_pivot < PIVOT_TOLERANCE {
        return Err(SkinError::DegenerateFit(format!(
            "singular interpolation system (pivot ratio {:.3e})",
            min_pivot / max_pivot.max(f64::MIN_POSITIVE)
        )));
    }

    let x = lu
        .solve(&b)
        .ok_or_else(|| SkinError::DegenerateFit("singular interpolation system".into()))?;

    if x.iter().any(|v| !v.is_finite()) {
        return Err(SkinError::DegenerateFit("non-finite solution".into()));
    }
    let residual = (&a * &x - &b).norm();
    if residual > RESIDUAL_TOLERANCE * (a.norm() * x.norm() + b.norm()) {
        return Err(SkinError::DegenerateFit(format!(
            "system is numerically singular (residual {:.3e})",
            residual
        )));
    }

    let mut weights = HrbfWeights {
        alphas: Vec::with_capacity(n),
        betas: Vec::with_capacity(n),
        c0: x[poly],
        c: DVec3::new(x[poly + 1], x[poly + 2], x[poly + 3]),
    };
    for j in 0..n {
        let col = 4 * j;
        weights.alphas.push(x[col]);
        weights
            .betas
            .push(DVec3::new(x[col + 1], x[col + 2], x[col + 3]));
    }
    Ok(weights)
}
