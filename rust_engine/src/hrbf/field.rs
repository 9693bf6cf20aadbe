//! 拟合后的 HRBF 场

use glam::{DVec3, Vec3};

use super::fit::{self, HrbfWeights};
use super::{compact_derivative, compact_potential, grad_phi, hessian_phi, phi, OUTSIDE_POTENTIAL};
use crate::sampling::InputSample;
use crate::{Result, SkinError};

/// 单根骨骼的 HRBF 隐式场（骨骼局部空间）
#[derive(Clone, Debug)]
pub struct HrbfField {
    centers: Vec<DVec3>,
    normals: Vec<DVec3>,
    weights: HrbfWeights,
    /// 紧支撑半径
    radius: f32,
    /// 样本包围球
    bound_center: Vec3,
    bound_radius: f32,
}

impl HrbfField {
    /// 从样本拟合
    ///
    /// 样本不足两个或系统奇异时返回 `DegenerateFit`。
    pub fn fit(samples: &InputSample, radius: f32) -> Result<Self> {
        if !(radius > 0.0) {
            return Err(SkinError::InvalidInput(format!(
                "HRBF radius must be positive, got {}",
                radius
            )));
        }
        if samples.nodes.len() != samples.n_nodes.len() {
            return Err(SkinError::DegenerateFit(format!(
                "{} positions but {} normals",
                samples.nodes.len(),
                samples.n_nodes.len()
            )));
        }

        let centers: Vec<DVec3> = samples.nodes.iter().map(|p| p.as_dvec3()).collect();
        let normals: Vec<DVec3> = samples
            .n_nodes
            .iter()
            .map(|n| n.as_dvec3().normalize_or_zero())
            .collect();

        let weights = fit::solve(&centers, &normals)?;

        let centroid = samples.nodes.iter().copied().sum::<Vec3>() / samples.nodes.len() as f32;
        let bound_radius = samples
            .nodes
            .iter()
            .map(|p| p.distance(centroid))
            .fold(0.0f32, f32::max);

        log::debug!(
            "HRBF 拟合完成: {} 个样本, 半径 {:.4}, 包围球半径 {:.4}",
            centers.len(),
            radius,
            bound_radius
        );

        Ok(Self {
            centers,
            normals,
            weights,
            radius,
            bound_center: centroid,
            bound_radius,
        })
    }

    /// 全局支撑的原始场值和梯度
    pub fn eval_raw(&self, point: Vec3) -> (f64, DVec3) {
        let x = point.as_dvec3();
        let w = &self.weights;

        let mut value = w.c0 + w.c.dot(x);
        let mut grad = w.c;
        for ((center, alpha), beta) in self.centers.iter().zip(&w.alphas).zip(&w.betas) {
            let v = x - *center;
            let g = grad_phi(v);
            value += alpha * phi(v.length()) - beta.dot(g);
            grad += g * *alpha - hessian_phi(v) * *beta;
        }
        (value, grad)
    }

    /// 紧支撑势能和梯度
    ///
    /// 包围球（加上半径）之外直接剔除为 `(1, 0)`。
    pub fn eval(&self, point: Vec3) -> (f32, Vec3) {
        if point.distance(self.bound_center) > self.cull_radius() {
            return (OUTSIDE_POTENTIAL, Vec3::ZERO);
        }
        let (f, grad) = self.eval_raw(point);
        let r = self.radius as f64;
        let potential = compact_potential(f, r);
        let grad = grad * compact_derivative(f, r);
        (potential as f32, grad.as_vec3())
    }

    /// 修改紧支撑半径（只改变定义域缩放，不重新拟合）
    pub fn set_radius(&mut self, radius: f32) {
        if radius > 0.0 {
            self.radius = radius;
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn sample_count(&self) -> usize {
        self.centers.len()
    }

    pub fn centers(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.centers.iter().map(|c| c.as_vec3())
    }

    pub fn normals(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.normals.iter().map(|n| n.as_vec3())
    }

    /// 样本包围球 (中心, 半径)
    pub fn bounds(&self) -> (Vec3, f32) {
        (self.bound_center, self.bound_radius)
    }

    /// 超出此距离的点被剔除
    pub fn cull_radius(&self) -> f32 {
        self.bound_radius + 2.0 * self.radius
    }
}
