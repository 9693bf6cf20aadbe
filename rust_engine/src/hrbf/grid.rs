//! 预计算网格场（把 HRBF 烘焙到规则网格上）

use glam::{Mat4, Vec3};
use rayon::prelude::*;

use super::{compact_derivative, compact_potential, HrbfField, OUTSIDE_POTENTIAL};
use crate::{Result, SkinError};

/// 规则网格上的原始场值，三线性插值
#[derive(Clone, Debug)]
pub struct GridField {
    /// 网格最小角（骨骼局部空间）
    origin: Vec3,
    cell_size: f32,
    /// 每个轴的节点数
    resolution: usize,
    values: Vec<f32>,
    radius: f32,
    /// 姿态改变后需要重新变换
    needs_retransform: bool,
    /// 当前姿态下的世界包围盒
    world_bounds: (Vec3, Vec3),
}

impl GridField {
    /// 以 `resolution³` 个节点烘焙 HRBF 场
    pub fn from_field(field: &HrbfField, resolution: usize) -> Result<Self> {
        if resolution < 2 {
            return Err(SkinError::InvalidInput(format!(
                "grid resolution must be at least 2, got {}",
                resolution
            )));
        }

        let (center, _) = field.bounds();
        let half = field.cull_radius();
        let origin = center - Vec3::splat(half);
        let cell_size = 2.0 * half / (resolution - 1) as f32;

        let values: Vec<f32> = (0..resolution * resolution * resolution)
            .into_par_iter()
            .map(|idx| {
                let x = idx % resolution;
                let y = (idx / resolution) % resolution;
                let z = idx / (resolution * resolution);
                let p = origin + Vec3::new(x as f32, y as f32, z as f32) * cell_size;
                field.eval_raw(p).0 as f32
            })
            .collect();

        let max = origin + Vec3::splat(2.0 * half);
        Ok(Self {
            origin,
            cell_size,
            resolution,
            values,
            radius: field.radius(),
            needs_retransform: false,
            world_bounds: (origin, max),
        })
    }

    #[inline]
    fn value(&self, x: usize, y: usize, z: usize) -> f32 {
        self.values[x + self.resolution * (y + self.resolution * z)]
    }

    /// 三线性插值的原始场值和梯度；网格外返回 None
    pub fn eval_raw(&self, point: Vec3) -> Option<(f32, Vec3)> {
        let g = (point - self.origin) / self.cell_size;
        let max = (self.resolution - 1) as f32;
        if g.min_element() < 0.0 || g.max_element() > max {
            return None;
        }

        let last = self.resolution - 2;
        let ix = (g.x.floor() as usize).min(last);
        let iy = (g.y.floor() as usize).min(last);
        let iz = (g.z.floor() as usize).min(last);
        let t = g - Vec3::new(ix as f32, iy as f32, iz as f32);

        let c000 = self.value(ix, iy, iz);
        let c100 = self.value(ix + 1, iy, iz);
        let c010 = self.value(ix, iy + 1, iz);
        let c110 = self.value(ix + 1, iy + 1, iz);
        let c001 = self.value(ix, iy, iz + 1);
        let c101 = self.value(ix + 1, iy, iz + 1);
        let c011 = self.value(ix, iy + 1, iz + 1);
        let c111 = self.value(ix + 1, iy + 1, iz + 1);

        let lerp = |a: f32, b: f32, s: f32| a + (b - a) * s;

        let c00 = lerp(c000, c100, t.x);
        let c10 = lerp(c010, c110, t.x);
        let c01 = lerp(c001, c101, t.x);
        let c11 = lerp(c011, c111, t.x);
        let c0 = lerp(c00, c10, t.y);
        let c1 = lerp(c01, c11, t.y);
        let value = lerp(c0, c1, t.z);

        let dx = lerp(
            lerp(c100 - c000, c110 - c010, t.y),
            lerp(c101 - c001, c111 - c011, t.y),
            t.z,
        );
        let dy = lerp(c10 - c00, c11 - c01, t.z);
        let dz = c1 - c0;

        Some((value, Vec3::new(dx, dy, dz) / self.cell_size))
    }

    /// 紧支撑势能和梯度，网格外为 `(1, 0)`
    pub fn eval(&self, point: Vec3) -> (f32, Vec3) {
        match self.eval_raw(point) {
            Some((f, grad)) => {
                let r = self.radius as f64;
                let potential = compact_potential(f as f64, r) as f32;
                let scale = compact_derivative(f as f64, r) as f32;
                (potential, grad * scale)
            }
            None => (OUTSIDE_POTENTIAL, Vec3::ZERO),
        }
    }

    pub fn set_radius(&mut self, radius: f32) {
        if radius > 0.0 {
            self.radius = radius;
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn mark_needs_retransform(&mut self) {
        self.needs_retransform = true;
    }

    pub fn needs_retransform(&self) -> bool {
        self.needs_retransform
    }

    /// 按骨骼当前的局部到世界变换更新世界包围盒
    pub fn retransform(&mut self, local_to_world: &Mat4) {
        self.world_bounds = self.bounds_in(local_to_world);
        self.needs_retransform = false;
    }

    /// 网格在给定局部到世界变换下的轴对齐包围盒
    pub fn bounds_in(&self, local_to_world: &Mat4) -> (Vec3, Vec3) {
        let extent = Vec3::splat(self.cell_size * (self.resolution - 1) as f32);
        let mut lo = Vec3::splat(f32::MAX);
        let mut hi = Vec3::splat(f32::MIN);
        for corner in 0..8 {
            let offset = Vec3::new(
                if corner & 1 != 0 { extent.x } else { 0.0 },
                if corner & 2 != 0 { extent.y } else { 0.0 },
                if corner & 4 != 0 { extent.z } else { 0.0 },
            );
            let p = local_to_world.transform_point3(self.origin + offset);
            lo = lo.min(p);
            hi = hi.max(p);
        }
        (lo, hi)
    }

    pub fn world_bounds(&self) -> (Vec3, Vec3) {
        self.world_bounds
    }
}

#[cfg(test)]
mod tests {
    use super::super::field::tests::sphere_samples;
    use super::*;

    #[test]
    fn test_grid_matches_field() {
        let field = HrbfField::fit(&sphere_samples(40, 1.0), 1.0).unwrap();
        let grid = GridField::from_field(&field, 48).unwrap();

        for p in [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.5, 0.2),
            Vec3::new(-0.8, 0.7, 0.1),
        ] {
            let (a, _) = field.eval(p);
            let (b, _) = grid.eval(p);
            assert!((a - b).abs() < 0.05, "field {} grid {}", a, b);
        }
        assert_eq!(grid.eval(Vec3::splat(40.0)).0, OUTSIDE_POTENTIAL);
    }

    #[test]
    fn test_retransform_clears_flag() {
        let field = HrbfField::fit(&sphere_samples(20, 1.0), 1.0).unwrap();
        let mut grid = GridField::from_field(&field, 8).unwrap();
        grid.mark_needs_retransform();
        assert!(grid.needs_retransform());
        grid.retransform(&Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        assert!(!grid.needs_retransform());
        let (lo, hi) = grid.world_bounds();
        assert!(lo.x > 5.0 && hi.x > lo.x);
    }

    #[test]
    fn test_rejects_tiny_resolution() {
        let field = HrbfField::fit(&sphere_samples(20, 1.0), 1.0).unwrap();
        assert!(GridField::from_field(&field, 1).is_err());
    }
}
