//! 变形配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。
//! 每个 `AnimatedMesh` 创建时复制一份全局配置，之后可单独修改。

use once_cell::sync::Lazy;
use std::sync::RwLock;

use crate::skinning::SkinningMode;

/// 变形配置（扁平化，不嵌套）
#[derive(Debug, Clone, PartialEq)]
pub struct DeformConfig {
    // ========== 初始蒙皮 ==========
    /// 蒙皮方式，默认线性混合
    pub skinning_mode: SkinningMode,

    // ========== 投影 ==========
    /// 每个顶点的最大牛顿迭代次数，默认 20
    pub max_iterations: usize,
    /// |f - base| 小于此值视为收敛，默认 1e-3
    pub tolerance: f32,
    /// 单步最大移动距离，默认 0.5
    pub max_step: f32,
    /// 梯度模长小于此值时停止，默认 1e-4
    pub min_gradient: f32,
    /// 相邻两步梯度夹角超过此值（弧度）视为接触，默认 55°
    pub max_gradient_angle: f32,
    /// 回溯线搜索的最大折半次数，默认 4
    pub line_search_steps: usize,

    // ========== 平滑 ==========
    /// 是否在投影后做切向平滑，默认开启
    pub smoothing_enabled: bool,
    /// 平滑迭代次数，默认 3
    pub smoothing_iterations: usize,
    /// 每次迭代向一环邻域重心移动的比例，默认 0.5
    pub smoothing_strength: f32,
}

impl Default for DeformConfig {
    fn default() -> Self {
        Self {
            // ====== 初始蒙皮 ======
            // 投影的起点；DQS 在扭转时体积保持更好，但两者都会被投影修正
            skinning_mode: SkinningMode::Linear,

            // ====== 投影 ======
            // 大多数顶点 2~5 步内收敛，关节内侧接触区需要更多
            max_iterations: 20,

            // 势场空间的误差，势场取值 [-1, 1]
            tolerance: 1e-3,

            // 防止梯度很小时一步跳出紧支撑区
            max_step: 0.5,

            min_gradient: 1e-4,

            // 梯度突变说明顶点已经碰到另一根骨骼的场
            // 越小 → 越早停止，关节内侧越“硬”
            max_gradient_angle: 55f32.to_radians(),

            line_search_steps: 4,

            // ====== 平滑 ======
            smoothing_enabled: true,
            smoothing_iterations: 3,
            // 0 = 不动，1 = 直接移到邻域重心（切向）
            smoothing_strength: 0.5,
        }
    }
}

/// 全局配置实例
static DEFORM_CONFIG: Lazy<RwLock<DeformConfig>> = Lazy::new(|| {
    RwLock::new(DeformConfig::default())
});

/// 获取当前默认配置（只读）
pub fn get_config() -> DeformConfig {
    DEFORM_CONFIG.read().unwrap().clone()
}

/// 手动设置默认配置（影响之后创建的网格）
pub fn set_config(config: DeformConfig) {
    *DEFORM_CONFIG.write().unwrap() = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *DEFORM_CONFIG.write().unwrap() = DeformConfig::default();
}
