//! HRBF 采样点
//!
//! 每根骨骼从分配给它的网格顶点中挑选一组 (位置, 法线)，
//! 去掉关节附近的顶点后做最远点抽稀，结果存放在骨骼静止局部空间。

mod builder;
mod decimate;

pub use decimate::farthest_point_sample;

use std::collections::BTreeMap;

use glam::{Mat4, Vec3};

use crate::math;
use crate::skeleton::BoneId;

/// 一根骨骼的采样点
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputSample {
    /// 位置
    pub nodes: Vec<Vec3>,
    /// 法线（单位长度）
    pub n_nodes: Vec<Vec3>,
}

impl InputSample {
    pub fn push(&mut self, position: Vec3, normal: Vec3) {
        self.nodes.push(position);
        self.n_nodes.push(normal);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.n_nodes.clear();
    }

    /// 变换位置和法线（法线使用逆转置）
    pub fn transform(&self, m: &Mat4) -> Self {
        let normal_mat = math::normal_matrix(m);
        Self {
            nodes: self.nodes.iter().map(|p| m.transform_point3(*p)).collect(),
            n_nodes: self
                .n_nodes
                .iter()
                .map(|n| math::transform_normal(&normal_mat, *n))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Vec3, Vec3)> + '_ {
        self.nodes.iter().copied().zip(self.n_nodes.iter().copied())
    }
}

/// 采样参数
#[derive(Clone, Debug)]
pub struct SampleSetSettings {
    /// 每根骨骼的关节排除半径（按关节索引，缺省视为 0）
    pub junction_radius: Vec<f32>,
    /// 每根骨骼最多保留的样本数
    pub max_samples_per_bone: usize,
    /// 样本之间的最小距离（抽稀停止条件）
    pub min_sample_distance: f32,
    /// 法线差异在抽稀距离中的权重
    pub normal_weight: f32,
    /// 折叠剔除阈值：法线沿骨骼指向相连关节超过该点积则丢弃
    pub fold: Option<f32>,
    /// 在相连关节处加入封口样本
    pub add_caps: bool,
    /// 封口样本越过排除面的距离，以关节排除半径为单位
    pub cap_offset: f32,
}

impl Default for SampleSetSettings {
    fn default() -> Self {
        Self {
            junction_radius: Vec::new(),
            max_samples_per_bone: 50,
            min_sample_distance: 0.0,
            normal_weight: 1.0,
            fold: None,
            add_caps: false,
            cap_offset: 0.5,
        }
    }
}

/// 所有骨骼的采样结果
#[derive(Clone, Debug, Default)]
pub struct SampleSet {
    samples: BTreeMap<BoneId, InputSample>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bone: BoneId) -> Option<&InputSample> {
        self.samples.get(&bone)
    }

    pub fn insert(&mut self, bone: BoneId, samples: InputSample) {
        self.samples.insert(bone, samples);
    }

    /// 按骨骼 ID 升序遍历
    pub fn iter(&self) -> impl Iterator<Item = (BoneId, &InputSample)> {
        self.samples.iter().map(|(id, s)| (*id, s))
    }

    pub fn bone_count(&self) -> usize {
        self.samples.len()
    }

    pub fn total_samples(&self) -> usize {
        self.samples.values().map(InputSample::len).sum()
    }
}
