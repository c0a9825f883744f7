//! 皮层下结构 PV.

use crate::block::mean_blocks;
use crate::label::{ClassifiedLabels, Structure};
use crate::resample::Resample;
use crate::{LabelVolume, PvResult, VoxelGrid};
use log::debug;
use nalgebra::Matrix4;
use ndarray::{s, Array3, Array4, Axis};
use std::collections::BTreeMap;

/// 每个出现过的皮层下结构在目标网格上的 PV 掩膜.
pub type StructureMasks = BTreeMap<Structure, Array3<f64>>;

/// 为标签体中出现的每个皮层下结构计算目标网格上的 PV 掩膜.
///
/// 所有结构的 0/1 掩膜沿最后一维堆叠, 一次性重采样到超采样网格 `high`,
/// 分块求平均后再拆分. 对应多个标签的结构 (例如丘脑 9 与 10) 取并集.
///
/// 没有任何结构时直接返回空表, 不会调用重采样器.
pub fn subcortical_pvs<R: Resample + ?Sized>(
    labels: &LabelVolume,
    classified: &ClassifiedLabels,
    high: &VoxelGrid,
    superfactor: usize,
    resampler: &R,
) -> PvResult<StructureMasks> {
    let structures = classified.structures();
    if structures.is_empty() {
        return Ok(StructureMasks::new());
    }

    let (x, y, z) = labels.shape();
    let mut stacked = Array4::<f32>::zeros((x, y, z, structures.len()));
    for (mut channel, (name, codes)) in stacked.axis_iter_mut(Axis(3)).zip(structures) {
        debug!("{name} labels: {codes:?}");
        channel.assign(&labels.mask(codes));
    }

    let high_res = resampler.resample(stacked.view(), labels.grid(), high, &Matrix4::identity())?;
    let reduced = mean_blocks(&high_res, &[superfactor, superfactor, superfactor, 1])?;

    Ok(structures
        .keys()
        .enumerate()
        .map(|(c, name)| (*name, reduced.slice(s![.., .., .., c]).mapv(f64::from)))
        .collect())
}
