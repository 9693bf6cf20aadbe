//! 每根骨骼的 HRBF 采样点选择

use rayon::prelude::*;

use super::{farthest_point_sample, InputSample, SampleSet, SampleSetSettings};
use crate::analysis::VertToBoneInfo;
use crate::model::Mesh;
use crate::skeleton::{BoneId, Skeleton};

impl SampleSet {
    /// 为单根骨骼选择采样点，结果写入集合并返回
    ///
    /// 样本位于骨骼静止局部空间。没有分配顶点的骨骼得到空集合。
    pub fn choose_hrbf_samples(
        &mut self,
        mesh: &Mesh,
        skel: &Skeleton,
        info: &VertToBoneInfo,
        settings: &SampleSetSettings,
        bone_id: BoneId,
    ) -> &InputSample {
        let samples = select_bone_samples(mesh, skel, info, settings, bone_id);
        self.samples.insert(bone_id, samples);
        &self.samples[&bone_id]
    }

    /// 对所有骨骼并行采样
    pub fn choose_all(
        mesh: &Mesh,
        skel: &Skeleton,
        info: &VertToBoneInfo,
        settings: &SampleSetSettings,
    ) -> SampleSet {
        let samples = skel
            .bone_ids()
            .into_par_iter()
            .map(|bone| (bone, select_bone_samples(mesh, skel, info, settings, bone)))
            .collect();
        SampleSet { samples }
    }
}

fn select_bone_samples(
    mesh: &Mesh,
    skel: &Skeleton,
    info: &VertToBoneInfo,
    settings: &SampleSetSettings,
    bone_id: BoneId,
) -> InputSample {
    let vertices = info.bone_vertices(bone_id);
    if vertices.is_empty() {
        log::warn!("骨骼 {} 没有分配到顶点，跳过采样", bone_id);
        return InputSample::default();
    }

    let bone = skel.bone(bone_id);
    let axis = bone.axis();
    let length = bone.length();
    let junction = settings.junction_radius.get(bone_id).copied().unwrap_or(0.0);
    let start = skel.has_articulated_start(bone_id);
    let end = skel.has_articulated_end(bone_id);

    let (positions, normals): (Vec<_>, Vec<_>) = vertices
        .iter()
        .filter_map(|&v| {
            let p = mesh.positions()[v];
            let n = mesh.normals()[v];
            let (_, t) = bone.distance(p);
            if (start && t <= junction) || (end && t >= length - junction) {
                return None;
            }
            if let Some(fold) = settings.fold {
                let near_start = t < 0.5 * length;
                if start && near_start && n.dot(-axis) > fold {
                    return None;
                }
                if end && !near_start && n.dot(axis) > fold {
                    return None;
                }
            }
            Some((p, n))
        })
        .unzip();

    let picked = farthest_point_sample(
        &positions,
        &normals,
        settings.max_samples_per_bone,
        settings.min_sample_distance,
        settings.normal_weight,
    );

    let mut world = InputSample::default();
    for &i in &picked {
        world.push(positions[i], normals[i]);
    }

    // 在排除面外侧封口
    if settings.add_caps && !world.is_empty() {
        let inset = junction * (1.0 - settings.cap_offset);
        if start {
            world.push(bone.org() + axis * inset, -axis);
        }
        if end {
            world.push(bone.end() - axis * inset, axis);
        }
    }

    log::debug!(
        "骨骼 {}: {} 个候选顶点, 选中 {} 个样本",
        bone_id,
        positions.len(),
        world.len()
    );
    world.transform(&bone.frame().inverse())
}
