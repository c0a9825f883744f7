//! 由分割标签直接得到的体积 PV.

use crate::block::mean_blocks;
use crate::consts::pv::VOLUMETRIC_CSF_FLOOR;
use crate::label::ClassifiedLabels;
use crate::resample::Resample;
use crate::{LabelVolume, PvField, PvResult, TissueClass, VoxelGrid};
use log::debug;
use nalgebra::Matrix4;
use ndarray::{s, Array4};

/// 由标签体计算目标网格上的 GM/WM/CSF 体积 PV.
///
/// 1. GM, WM 标签分别生成 0/1 掩膜 (CSF 不需要单独的通道);
/// 2. 以恒等变换一阶重采样到超采样网格 `high`;
/// 3. 按 `[s, s, s]` 分块求平均, 回到目标网格;
/// 4. `CSF = max(0, 1 - GM - WM)`, 小于 `VOLUMETRIC_CSF_FLOOR` 的 CSF 置 0;
/// 5. 逐体素除以三者之和.
pub fn volumetric_pvs<R: Resample + ?Sized>(
    labels: &LabelVolume,
    classified: &ClassifiedLabels,
    high: &VoxelGrid,
    superfactor: usize,
    resampler: &R,
) -> PvResult<PvField> {
    let (x, y, z) = labels.shape();
    let mut onehot = Array4::<f32>::zeros((x, y, z, 2));
    for tissue in [TissueClass::Gm, TissueClass::Wm] {
        let codes = classified.tissue_labels(tissue);
        debug!("{tissue} labels: {codes:?}");
        onehot
            .slice_mut(s![.., .., .., tissue.channel()])
            .assign(&labels.mask(&codes));
    }

    let high_res = resampler.resample(onehot.view(), labels.grid(), high, &Matrix4::identity())?;
    let reduced = mean_blocks(&high_res, &[superfactor, superfactor, superfactor, 1])?;

    let gm = reduced.slice(s![.., .., .., 0]).mapv(f64::from);
    let wm = reduced.slice(s![.., .., .., 1]).mapv(f64::from);
    let mut csf = &gm + &wm;
    csf.mapv_inplace(|v| {
        let c = (1.0 - v).max(0.0);
        if c < VOLUMETRIC_CSF_FLOOR {
            0.0
        } else {
            c
        }
    });

    let mut ans = PvField::new(gm, wm, csf)?;
    ans.renormalize();
    Ok(ans)
}
