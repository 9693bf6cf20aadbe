//! 绑定流程：分析 -> 采样 -> 拟合每根骨骼的 HRBF

use crate::analysis::VertToBoneInfo;
use crate::model::Mesh;
use crate::sampling::{SampleSet, SampleSetSettings};
use crate::skeleton::{BoneId, Skeleton};
use crate::{Result, SkinError};

/// 绑定参数
#[derive(Clone, Debug, Default)]
pub struct RigSettings {
    /// 采样参数；`junction_radius` 为空时使用默认关节半径
    pub sampling: SampleSetSettings,
    /// 覆盖默认 HRBF 半径（按关节索引）
    pub hrbf_radius: Option<Vec<f32>>,
    /// 拟合后烘焙为网格的分辨率，None 表示保留解析 HRBF
    pub grid_resolution: Option<usize>,
}

/// 绑定结果
#[derive(Clone, Debug, Default)]
pub struct RigReport {
    /// 成功拟合的骨骼
    pub fitted: Vec<BoneId>,
    /// 没有样本、保持为空的骨骼
    pub empty: Vec<BoneId>,
    /// 拟合失败的骨骼，保留原有隐式场
    pub failed: Vec<(BoneId, SkinError)>,
    pub junction_radius: Vec<f32>,
    pub hrbf_radius: Vec<f32>,
    pub total_samples: usize,
}

/// 为骨架的所有骨骼建立隐式场
///
/// 单根骨骼拟合失败只记入 `failed`，其余骨骼照常拟合。
/// 只有参数本身无效时返回错误，此时骨架未被修改。
pub fn build_bone_fields(
    skel: &mut Skeleton,
    mesh: &Mesh,
    settings: &RigSettings,
) -> Result<RigReport> {
    if let Some(resolution) = settings.grid_resolution {
        if resolution < 2 {
            return Err(SkinError::InvalidInput(format!(
                "grid resolution must be at least 2, got {}",
                resolution
            )));
        }
    }

    let info = VertToBoneInfo::new(skel, mesh);

    let mut sampling = settings.sampling.clone();
    if sampling.junction_radius.is_empty() {
        sampling.junction_radius = info.get_default_junction_radius(skel, mesh);
    }
    let samples = SampleSet::choose_all(mesh, skel, &info, &sampling);

    let hrbf_radius = match &settings.hrbf_radius {
        Some(radius) => radius.clone(),
        None => info.get_default_hrbf_radius(skel, mesh),
    };

    let mut report = RigReport {
        junction_radius: sampling.junction_radius.clone(),
        total_samples: samples.total_samples(),
        ..Default::default()
    };

    for (bone, bone_samples) in samples.iter() {
        if let Some(&radius) = hrbf_radius.get(bone) {
            if let Err(err) = skel.set_bone_hrbf_radius(bone, radius) {
                log::warn!("骨骼 {} 半径无效，沿用 {}: {}", bone, skel.hrbf_radius(bone), err);
            }
        }
        if bone_samples.is_empty() {
            log::warn!("骨骼 {} 没有采样点，保持无隐式场", bone);
            report.empty.push(bone);
            continue;
        }
        if let Err(err) = skel.fit_bone(bone, bone_samples) {
            log::warn!("骨骼 {} 拟合失败 ({} 个样本): {}", bone, bone_samples.len(), err);
            report.failed.push((bone, err));
            continue;
        }
        if let Some(resolution) = settings.grid_resolution {
            skel.precompute_bone(bone, resolution)?;
        }
        report.fitted.push(bone);
    }
    report.hrbf_radius = hrbf_radius;

    log::info!(
        "绑定完成: 拟合 {} 根骨骼, {} 根为空, {} 根失败, 共 {} 个样本",
        report.fitted.len(),
        report.empty.len(),
        report.failed.len(),
        report.total_samples
    );
    Ok(report)
}
