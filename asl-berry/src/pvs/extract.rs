//! 从 FreeSurfer 分割与皮层表面估计 ASL 空间的组织 PV.

use super::{stack_images, subcortical_pvs, volumetric_pvs, CortexEstimator};
use crate::consts::pv::DEFAULT_SUPERFACTOR;
use crate::data::check_shape;
use crate::label::{classify_volume, UnrecognizedLabel};
use crate::resample::{AffineResampler, Interpolation};
use crate::{LabelVolume, PvError, PvField, PvResult, Rounding, VoxelGrid};
use log::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 流程参数.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExtractConfig {
    /// 体积 PV 与皮层下结构 PV 的超采样倍数.
    pub superfactor: usize,

    /// 重采样使用的线程数.
    pub cores: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            superfactor: DEFAULT_SUPERFACTOR,
            cores: std::thread::available_parallelism().map_or(1, usize::from),
        }
    }
}

impl ExtractConfig {
    /// 检查参数. `superfactor` 或 `cores` 为 0 时返回 `Err(PvError::Configuration)`.
    pub fn validate(&self) -> PvResult<()> {
        if self.superfactor == 0 {
            return Err(PvError::Configuration(
                "supersampling factor must be at least 1".to_string(),
            ));
        }
        if self.cores == 0 {
            return Err(PvError::Configuration(
                "number of cores must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// 流程输出.
#[derive(Debug, Clone)]
pub struct ExtractOutput {
    /// 参考网格上的 GM/WM/CSF PV.
    pub pvs: PvField,

    /// 参考网格: T1 网格按 ASL 体素大小缩放后的结果.
    pub grid: VoxelGrid,

    /// 需要报告的未识别标签.
    pub unrecognized: Vec<UnrecognizedLabel>,
}

/// 参考网格: 与 T1 视野一致, 体素大小接近 ASL 体素大小.
pub fn reference_grid(t1_grid: &VoxelGrid, asl_grid: &VoxelGrid) -> PvResult<VoxelGrid> {
    let t1 = t1_grid.vox_size();
    let asl = asl_grid.vox_size();
    let factor = [0, 1, 2].map(|i| asl[i] / t1[i]);
    t1_grid.resize_voxels(factor, Rounding::Round)
}

/// 估计 ASL 分辨率 (T1 视野) 上的组织 PV.
///
/// 1. 参考网格为 T1 网格按 ASL/T1 体素大小之比缩放 (四舍五入);
///   超采样网格为参考网格按 `superfactor` 细分;
/// 2. 皮层估计器在参考网格上给出皮层 PV;
/// 3. 由分割标签得到体积 PV 与皮层下结构 PV (标签网格 -> 超采样网格 -> 参考网格);
/// 4. 融合, 见 [`stack_images`];
/// 5. 浮点噪声清理, 见 [`PvField::squash_noise`].
///
/// 任何步骤失败都会直接返回错误, 不产生部分结果.
pub fn extract_fs_pvs<C: CortexEstimator + ?Sized>(
    aseg: &LabelVolume,
    t1_grid: &VoxelGrid,
    asl_grid: &VoxelGrid,
    cortex: &C,
    config: &ExtractConfig,
) -> PvResult<ExtractOutput> {
    config.validate()?;

    let reference = reference_grid(t1_grid, asl_grid)?;
    let high = reference.supersample(config.superfactor)?;
    info!(
        "reference grid {:?} @ {:?} mm, supersampled grid {:?}",
        reference.size(),
        reference.vox_size(),
        high.size()
    );

    let classified = classify_volume(aseg);
    debug!("structures present: {:?}", classified.structures().keys());

    info!("estimating cortical PVs");
    let cortex_pvs = cortex.estimate(&reference)?;
    let (x, y, z) = cortex_pvs.shape();
    check_shape(&reference, &[x, y, z])?;

    let resampler = AffineResampler::new(Interpolation::Linear, config.cores);
    info!("estimating volumetric PVs");
    let volumetric = volumetric_pvs(aseg, &classified, &high, config.superfactor, &resampler)?;
    info!("estimating subcortical PVs");
    let structures = subcortical_pvs(aseg, &classified, &high, config.superfactor, &resampler)?;

    info!("merging {} subcortical structures", structures.len());
    let mut pvs = stack_images(&cortex_pvs, &volumetric, &structures)?;
    if pvs.squash_noise() {
        debug!("floating point noise below 1e-6 removed");
    }

    Ok(ExtractOutput {
        pvs,
        grid: reference,
        unrecognized: classified.unrecognized().to_vec(),
    })
}
