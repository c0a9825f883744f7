//! MT 缩放因子估计.

use super::{fit_linear_model, slicetime_correction, undo_slicetime_correction, MtMethod, MtTissue};
use crate::consts::mt::SLICES;
use crate::{PvError, PvResult};
use log::{debug, info};
use ndarray::{s, Array1, Array2, Array3, ArrayBase, ArrayView2, Axis, Data, Ix3};
use ndarray_npy::write_npy;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// MT 估计参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MtConfig {
    /// 名义重复时间 (秒).
    pub tr: f64,

    /// 拟合方式.
    pub method: MtMethod,

    /// 预测曲线每个频带的采样点数.
    pub resolution: usize,

    /// 是否对缩放因子撤销层时间校正.
    pub undo_slicetime: bool,
}

impl Default for MtConfig {
    fn default() -> Self {
        Self {
            tr: 8.0,
            method: MtMethod::Separate,
            resolution: 10_000,
            undo_slicetime: false,
        }
    }
}

/// 一幅已被组织掩膜的标定图像.
#[derive(Debug, Clone)]
pub enum CalibInput {
    /// 单一组织掩膜.
    Single(Array3<f64>),

    /// 分别被 GM 和 WM 掩膜的同一幅图像.
    Combined {
        /// GM 掩膜后的图像.
        gm: Array3<f64>,
        /// WM 掩膜后的图像.
        wm: Array3<f64>,
    },
}

impl CalibInput {
    fn dims(&self) -> &[usize] {
        match self {
            CalibInput::Single(img) => img.shape(),
            CalibInput::Combined { gm, .. } => gm.shape(),
        }
    }
}

/// MT 估计结果.
#[derive(Debug, Clone)]
pub struct MtEstimate {
    /// 所有图像平均后的逐层均值, 长度 60.
    pub slice_means: Array1<f64>,

    /// `Combined` 时每层 WM, GM 非零体素个数的平均值, 形状 `(60, 2)`.
    pub counts: Option<Array2<f64>>,

    /// 缩放因子图.
    pub scaling_factors: Array3<f64>,

    /// 预测曲线的层坐标.
    pub fit_x: Array1<f64>,

    /// 预测曲线的值.
    pub fit_y: Array1<f64>,
}

impl MtEstimate {
    /// 将逐层均值, 预测曲线 (`2 x N`, 第一行为层坐标) 以及 (若有) 体素个数写为 npy 文件:
    /// `{tissue}_slice_means.npy`, `{tissue}_fit.npy`, `mean_voxel_count.npy`.
    ///
    /// 返回写出的文件路径.
    pub fn save_arrays<P: AsRef<Path>>(&self, dir: P, tissue: MtTissue) -> PvResult<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let means = dir.join(format!("{tissue}_slice_means.npy"));
        write_npy(&means, &self.slice_means)?;

        let fit = dir.join(format!("{tissue}_fit.npy"));
        let curve = Array2::from_shape_fn((2, self.fit_x.len()), |(r, i)| match r {
            0 => self.fit_x[i],
            _ => self.fit_y[i],
        });
        write_npy(&fit, &curve)?;

        let mut written = vec![means, fit];
        if let Some(counts) = &self.counts {
            let p = dir.join("mean_voxel_count.npy");
            write_npy(&p, counts)?;
            written.push(p);
        }
        Ok(written)
    }
}

/// 逐层 (最后一维) 求非零且非 NaN 体素的均值. 没有这样的体素时为 NaN.
pub fn slice_means<S: Data<Elem = f64>>(image: &ArrayBase<S, Ix3>) -> Array1<f64> {
    image
        .axis_iter(Axis(2))
        .map(|sli| {
            let (sum, n) = sli
                .iter()
                .filter(|v| **v != 0.0 && !v.is_nan())
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if n == 0 {
                f64::NAN
            } else {
                sum / n as f64
            }
        })
        .collect()
}

/// 逐行求忽略 NaN 的均值. 整行都是 NaN 时为 NaN.
pub fn nan_mean_columns(values: ArrayView2<f64>) -> Array1<f64> {
    values
        .axis_iter(Axis(0))
        .map(|row| {
            let (sum, n) = row
                .iter()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if n == 0 {
                f64::NAN
            } else {
                sum / n as f64
            }
        })
        .collect()
}

/// 逐层统计正值体素个数.
fn positive_counts(image: &Array3<f64>) -> Array1<f64> {
    image
        .axis_iter(Axis(2))
        .map(|sli| sli.iter().filter(|v| **v > 0.0).count() as f64)
        .collect()
}

/// 由若干幅掩膜后的标定图像估计 MT 缩放因子.
///
/// 每幅图像先做层时间校正 (`Combined` 时 GM 与 WM 分别校正后相加), 然后逐层求非零均值,
/// 在图像之间求忽略 NaN 的均值, 最后拟合线性模型.
///
/// # 返回值
///
/// - `inputs` 为空, 或输入类型与 `tissue` 不匹配时返回 `Err(PvError::Configuration)`;
/// - 图像形状不一致或层数不为 60 时返回 `Err(PvError::GridMismatch)`.
pub fn estimate_mt(inputs: &[CalibInput], tissue: MtTissue, config: &MtConfig) -> PvResult<MtEstimate> {
    let first = inputs
        .first()
        .ok_or_else(|| PvError::Configuration("no calibration images given".to_string()))?;
    let dims = first.dims().to_vec();
    if dims.len() != 3 || dims[2] != SLICES {
        return Err(PvError::GridMismatch {
            expected: vec![dims[0], dims[1], SLICES],
            found: dims,
        });
    }

    let mut means = Array2::<f64>::zeros((SLICES, inputs.len()));
    let mut counts = Array2::<f64>::zeros((SLICES, inputs.len() * 2));
    for (n, input) in inputs.iter().enumerate() {
        if input.dims() != dims.as_slice() {
            return Err(PvError::GridMismatch {
                expected: dims,
                found: input.dims().to_vec(),
            });
        }
        let corrected = match (input, tissue) {
            (CalibInput::Combined { gm, wm }, MtTissue::Combined) => {
                let mut gm = gm.clone();
                let mut wm = wm.clone();
                slicetime_correction(&mut gm, MtTissue::Gm, config.tr)?;
                slicetime_correction(&mut wm, MtTissue::Wm, config.tr)?;
                counts.column_mut(2 * n).assign(&positive_counts(&wm));
                counts.column_mut(2 * n + 1).assign(&positive_counts(&gm));
                gm + wm
            }
            (CalibInput::Single(img), t) if t != MtTissue::Combined => {
                let mut img = img.clone();
                slicetime_correction(&mut img, t, config.tr)?;
                img
            }
            _ => {
                return Err(PvError::Configuration(format!(
                    "calibration input {n} does not match tissue `{tissue}`"
                )));
            }
        };
        let m = slice_means(&corrected);
        let empty = m.iter().filter(|v| v.is_nan()).count();
        debug!("calibration image {n}: {empty} slices without signal");
        means.column_mut(n).assign(&m);
    }

    let slice_means = nan_mean_columns(means.view());
    info!("fitting {} model for `{tissue}` on {} images", config.method, inputs.len());
    let fit = fit_linear_model(slice_means.view(), config.method, (dims[0], dims[1]), config.resolution)?;

    let mut scaling_factors = fit.scaling_factors;
    if config.undo_slicetime {
        // `Combined` 没有单一的 T1, 按 WM 处理.
        let t = match tissue {
            MtTissue::Combined => MtTissue::Wm,
            t => t,
        };
        undo_slicetime_correction(&mut scaling_factors, t, config.tr)?;
    }

    // 每幅图像对应 WM, GM 两列, 分别平均.
    let counts = (tissue == MtTissue::Combined).then(|| {
        let mut out = Array2::<f64>::zeros((SLICES, 2));
        for c in 0..2 {
            let cols = counts.slice(s![.., c..;2]);
            out.column_mut(c).assign(&nan_mean_columns(cols));
        }
        out
    });

    Ok(MtEstimate {
        slice_means,
        counts,
        scaling_factors,
        fit_x: fit.fit_x,
        fit_y: fit.fit_y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::mt::SLICES_PER_BAND;
    use crate::mt::slicetime_scale;

    /// 构造一幅校正后每个频带内线性增长的图像: 先生成 "校正后" 信号, 再除以校正系数.
    fn calib(t1: f64, tr: f64, offset: f64) -> Array3<f64> {
        Array3::from_shape_fn((3, 3, SLICES), |(i, _, z)| {
            if i == 0 {
                return 0.0;
            }
            let (b, x) = (z / SLICES_PER_BAND, z % SLICES_PER_BAND);
            let corrected = offset + 100.0 * b as f64 + 2.0 * x as f64;
            corrected / slicetime_scale(t1, tr, z)
        })
    }

    #[test]
    fn test_slice_means_ignore_zeros() {
        let mut img = Array3::<f64>::zeros((2, 2, 3));
        img[(0, 0, 0)] = 2.0;
        img[(1, 1, 0)] = 4.0;
        img[(0, 1, 1)] = f64::NAN;
        img[(1, 0, 1)] = 5.0;
        let m = slice_means(&img);
        assert_eq!(m[0], 3.0);
        assert_eq!(m[1], 5.0);
        assert!(m[2].is_nan());
    }

    #[test]
    fn test_nan_mean_columns() {
        let v = ndarray::arr2(&[[1.0, f64::NAN, 3.0], [f64::NAN, f64::NAN, f64::NAN]]);
        let m = nan_mean_columns(v.view());
        assert_eq!(m[0], 2.0);
        assert!(m[1].is_nan());
    }

    #[test]
    fn test_estimate_single_tissue() {
        let inputs = vec![
            CalibInput::Single(calib(1.0, 8.0, 1000.0)),
            CalibInput::Single(calib(1.0, 8.0, 1010.0)),
        ];
        let cfg = MtConfig {
            resolution: 10,
            ..MtConfig::default()
        };
        let est = estimate_mt(&inputs, MtTissue::Wm, &cfg).unwrap();
        assert_eq!(est.scaling_factors.dim(), (3, 3, SLICES));
        assert!(est.counts.is_none());

        // 平均后第 3 个频带: a = 1305, b = 2.
        assert!((est.slice_means[30] - 1305.0).abs() < 1e-6);
        for x in 0..10 {
            let expected = 1305.0 / (1305.0 + 2.0 * x as f64);
            assert!((est.scaling_factors[(1, 2, 30 + x)] - expected).abs() < 1e-9);
        }
        assert_eq!(est.scaling_factors[(0, 0, 0)], 1.0);
    }

    #[test]
    fn test_estimate_combined_counts() {
        let gm = calib(1.3, 8.0, 500.0);
        let mut wm = calib(1.0, 8.0, 500.0);
        wm.index_axis_mut(Axis(0), 1).fill(0.0);
        let inputs = vec![CalibInput::Combined { gm, wm }];
        let cfg = MtConfig {
            resolution: 10,
            ..MtConfig::default()
        };
        let est = estimate_mt(&inputs, MtTissue::Combined, &cfg).unwrap();
        let counts = est.counts.unwrap();
        assert_eq!(counts.dim(), (SLICES, 2));
        // WM 只剩 i = 2 的一行 (3 个体素), GM 有 6 个.
        assert_eq!(counts[(7, 0)], 3.0);
        assert_eq!(counts[(7, 1)], 6.0);
        assert!(est.slice_means.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_undo_slicetime_option() {
        let inputs = vec![CalibInput::Single(calib(4.3, 8.0, 700.0))];
        let base = MtConfig {
            resolution: 10,
            ..MtConfig::default()
        };
        let plain = estimate_mt(&inputs, MtTissue::Csf, &base).unwrap();
        let undone = estimate_mt(
            &inputs,
            MtTissue::Csf,
            &MtConfig {
                undo_slicetime: true,
                ..base
            },
        )
        .unwrap();
        let z = 25;
        let ratio = undone.scaling_factors[(0, 0, z)] / plain.scaling_factors[(0, 0, z)];
        assert!((ratio - 1.0 / slicetime_scale(4.3, 8.0, z)).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_inputs() {
        let cfg = MtConfig::default();
        assert!(estimate_mt(&[], MtTissue::Wm, &cfg).is_err());

        let wrong_slices = vec![CalibInput::Single(Array3::zeros((2, 2, 59)))];
        assert!(matches!(
            estimate_mt(&wrong_slices, MtTissue::Wm, &cfg),
            Err(PvError::GridMismatch { .. })
        ));

        let single = vec![CalibInput::Single(calib(1.0, 8.0, 100.0))];
        assert!(matches!(
            estimate_mt(&single, MtTissue::Combined, &cfg),
            Err(PvError::Configuration(_))
        ));
    }

    #[test]
    fn test_save_arrays() {
        use ndarray_npy::read_npy;

        let gm = calib(1.3, 8.0, 500.0);
        let wm = calib(1.0, 8.0, 500.0);
        let inputs = vec![CalibInput::Combined { gm, wm }];
        let cfg = MtConfig {
            resolution: 4,
            ..MtConfig::default()
        };
        let est = estimate_mt(&inputs, MtTissue::Combined, &cfg).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let written = est.save_arrays(dir.path(), MtTissue::Combined).unwrap();
        assert_eq!(written.len(), 3);
        assert!(written[0].ends_with("combined_slice_means.npy"));

        let fit: Array2<f64> = read_npy(&written[1]).unwrap();
        assert_eq!(fit.dim(), (2, 24));
        assert_eq!(fit.row(0), est.fit_x);
        let counts: Array2<f64> = read_npy(&written[2]).unwrap();
        assert_eq!(counts, est.counts.unwrap());
    }
}
