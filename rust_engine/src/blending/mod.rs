//! 骨骼隐式场的混合
//!
//! 势场约定：内部为负，外部为正，曲面为 0，取值 [-1, 1]。

mod blend;
mod controller;
mod operators;

pub use blend::ImplicitBlend;
pub use controller::ControllerShape;
pub use operators::{blend_pair, bulge, hard_union, smooth_union, BLEND_WIDTH};

/// 关节处两个场的混合算子
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JointBlend {
    /// 硬并集（取势场较小者）
    Max,
    /// 多项式平滑并集
    #[default]
    Union,
    /// 平滑并集 + 接触处膨胀
    Bulge,
}
