//! 层时间校正.

use super::MtTissue;
use crate::consts::mt::{SLICES_PER_BAND, SLICE_DT};
use crate::{PvError, PvResult};
use ndarray::{ArrayBase, Axis, DataMut, Ix3};

/// 第 `slice` 层的层时间校正系数: 将实际有效 TR `tr + (slice mod 10) · dt`
/// 下的信号缩放到名义 TR 下.
///
/// `scale = (1 - exp(-tr / T1)) / (1 - exp(-(tr + (slice mod 10) · dt) / T1))`
#[inline]
pub fn slicetime_scale(t1: f64, tr: f64, slice: usize) -> f64 {
    let t = tr + (slice % SLICES_PER_BAND) as f64 * SLICE_DT;
    (1.0 - (-tr / t1).exp()) / (1.0 - (-t / t1).exp())
}

fn t1_of(tissue: MtTissue) -> PvResult<f64> {
    tissue.t1().ok_or_else(|| {
        PvError::Configuration(format!("tissue `{tissue}` has no single T1 value"))
    })
}

fn scale_slices<S, F>(image: &mut ArrayBase<S, Ix3>, f: F)
where
    S: DataMut<Elem = f64>,
    F: Fn(usize) -> f64,
{
    for (z, mut sli) in image.axis_iter_mut(Axis(2)).enumerate() {
        let s = f(z);
        sli.mapv_inplace(|v| v * s);
    }
}

/// 原地对 `image` (最后一维为层) 做层时间校正.
///
/// 当 `tissue` 为 `Combined` 时返回 `Err(PvError::Configuration)`.
pub fn slicetime_correction<S>(image: &mut ArrayBase<S, Ix3>, tissue: MtTissue, tr: f64) -> PvResult<()>
where
    S: DataMut<Elem = f64>,
{
    let t1 = t1_of(tissue)?;
    scale_slices(image, |z| slicetime_scale(t1, tr, z));
    Ok(())
}

/// 撤销 [`slicetime_correction`], 即乘以校正系数的倒数.
///
/// 当 `tissue` 为 `Combined` 时返回 `Err(PvError::Configuration)`.
pub fn undo_slicetime_correction<S>(
    image: &mut ArrayBase<S, Ix3>,
    tissue: MtTissue,
    tr: f64,
) -> PvResult<()>
where
    S: DataMut<Elem = f64>,
{
    let t1 = t1_of(tissue)?;
    scale_slices(image, |z| 1.0 / slicetime_scale(t1, tr, z));
    Ok(())
}
