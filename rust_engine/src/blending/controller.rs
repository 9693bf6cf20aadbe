//! 梯度混合控制曲线

use glam::Vec2;

/// 分段三次 Hermite 曲线
///
/// 横轴为两个场梯度夹角的余弦 [-1, 1]，纵轴为混合宽度系数 [0, 1]。
/// `[p0, p1]` 段端点斜率为 `s0` / 0，`[p1, p2]` 段为 0 / `s1`，两侧外延为常数。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControllerShape {
    pub p0: Vec2,
    pub p1: Vec2,
    pub p2: Vec2,
    pub s0: f32,
    pub s1: f32,
}

impl Default for ControllerShape {
    fn default() -> Self {
        Self::elbow()
    }
}

impl ControllerShape {
    pub fn new(p0: Vec2, p1: Vec2, p2: Vec2, s0: f32, s1: f32) -> Self {
        Self { p0, p1, p2, s0, s1 }
    }

    /// 肘部：梯度相对（接触）时锐利，顺向时平滑
    pub fn elbow() -> Self {
        Self::new(Vec2::new(-0.5, 0.0), Vec2::new(0.3, 0.45), Vec2::new(0.9, 1.0), 1.0, 1.0)
    }

    /// 手指：更早变锐利
    pub fn finger() -> Self {
        Self::new(Vec2::new(-0.2, 0.0), Vec2::new(0.4, 0.3), Vec2::new(0.95, 1.0), 0.5, 2.0)
    }

    /// 恒为 1
    pub fn flat() -> Self {
        Self::new(Vec2::new(-1.0, 1.0), Vec2::new(0.0, 1.0), Vec2::new(1.0, 1.0), 0.0, 0.0)
    }

    pub fn eval(&self, x: f32) -> f32 {
        let y = if x <= self.p0.x {
            self.p0.y
        } else if x < self.p1.x {
            hermite(self.p0, self.p1, self.s0, 0.0, x)
        } else if x < self.p2.x {
            hermite(self.p1, self.p2, 0.0, self.s1, x)
        } else {
            self.p2.y
        };
        y.clamp(0.0, 1.0)
    }
}

fn hermite(a: Vec2, b: Vec2, ma: f32, mb: f32, x: f32) -> f32 {
    let w = b.x - a.x;
    if w <= 0.0 {
        return b.y;
    }
    let t = (x - a.x) / w;
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    h00 * a.y + h10 * w * ma + h01 * b.y + h11 * w * mb
}
