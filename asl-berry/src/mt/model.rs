//! 逐频带线性模型.

use super::MtMethod;
use crate::consts::mt::{BANDS, FIT_BANDS, SLICES, SLICES_PER_BAND};
use crate::fitting::{polyfit, sample_curve, Polynomial};
use crate::{PvError, PvResult};
use ndarray::{s, Array1, Array3, ArrayView1, Axis};

/// 线性模型拟合结果.
#[derive(Debug, Clone)]
pub struct LinearFit {
    /// 形状为 `(dims.0, dims.1, 60)` 的缩放因子图, 未拟合的层为 1.
    pub scaling_factors: Array3<f64>,

    /// 预测曲线的层坐标, 共 `resolution * 6` 个点.
    pub fit_x: Array1<f64>,

    /// 预测曲线的值. 未拟合的频带为 0.
    pub fit_y: Array1<f64>,
}

/// 频带内层号 `0, 1, ..., 9`.
fn band_x() -> Array1<f64> {
    Array1::range(0.0, SLICES_PER_BAND as f64, 1.0)
}

/// 逐频带写入缩放因子 `a / (a + b·x)` 和预测曲线.
fn apply_model(fit: &mut LinearFit, band: usize, model: &Polynomial, resolution: usize) {
    let a = model.intercept();
    for x in 0..SLICES_PER_BAND {
        let factor = a / model.eval(x as f64);
        fit.scaling_factors
            .index_axis_mut(Axis(2), band * SLICES_PER_BAND + x)
            .fill(factor);
    }
    let step = SLICES_PER_BAND as f64 / resolution as f64;
    let (_, y) = sample_curve(model, 0.0, step, resolution);
    fit.fit_y
        .slice_mut(s![band * resolution..(band + 1) * resolution])
        .assign(&ArrayView1::from(&y));
}

/// 由逐层均值 `slice_means` (长度 60) 拟合中间四个频带的线性模型.
///
/// - `Separate`: 每个频带以层号 `0..10` 为自变量单独拟合 `y = a + b·x`;
/// - `Together`: 四个频带逐层平均后拟合一次, 应用于全部四个频带.
///
/// 第 `10·band + x` 层的缩放因子为 `a / (a + b·x)`; 第一个和最后一个频带为 1.
/// 预测曲线每个频带采样 `resolution` 个点.
///
/// 含 NaN 的层不参与拟合.
pub fn fit_linear_model(
    slice_means: ArrayView1<f64>,
    method: MtMethod,
    dims: (usize, usize),
    resolution: usize,
) -> PvResult<LinearFit> {
    if slice_means.len() != SLICES {
        return Err(PvError::GridMismatch {
            expected: vec![SLICES],
            found: vec![slice_means.len()],
        });
    }
    if resolution == 0 {
        return Err(PvError::Configuration(
            "prediction resolution must be at least 1".to_string(),
        ));
    }

    let step = SLICES_PER_BAND as f64 / resolution as f64;
    let mut fit = LinearFit {
        scaling_factors: Array3::ones((dims.0, dims.1, SLICES)),
        fit_x: Array1::from_shape_fn(resolution * BANDS, |i| {
            (i / resolution * SLICES_PER_BAND) as f64 + (i % resolution) as f64 * step
        }),
        fit_y: Array1::zeros(resolution * BANDS),
    };

    let x = band_x();
    let band = |b: usize| slice_means.slice(s![b * SLICES_PER_BAND..(b + 1) * SLICES_PER_BAND]);
    match method {
        MtMethod::Separate => {
            for b in FIT_BANDS {
                let model = polyfit(x.view(), band(b), 1)?;
                apply_model(&mut fit, b, &model, resolution);
            }
        }
        MtMethod::Together => {
            let y = Array1::from_shape_fn(SLICES_PER_BAND, |i| {
                let vals: Vec<f64> = FIT_BANDS
                    .map(|b| band(b)[i])
                    .filter(|v| !v.is_nan())
                    .collect();
                if vals.is_empty() {
                    f64::NAN
                } else {
                    vals.iter().sum::<f64>() / vals.len() as f64
                }
            });
            let model = polyfit(x.view(), y.view(), 1)?;
            for b in FIT_BANDS {
                apply_model(&mut fit, b, &model, resolution);
            }
        }
    }
    Ok(fit)
}
