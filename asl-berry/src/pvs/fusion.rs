//! 组织图融合.
//!
//! 以皮层表面估计为基础, 补回体积估计中的脑室 CSF, 最后叠加皮层下灰质结构.

use super::StructureMasks;
use crate::consts::pv::{CORTEX_GM_THRESHOLD, PARTITION_TOLERANCE};
use crate::{PvError, PvField, PvResult};
use log::debug;

/// 传播 NaN 的 `min`.
#[inline]
fn min_nan(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

/// 单个体素: 皮层估计优先, 其次是体积 CSF.
///
/// `cortex` 的 GM 或 WM 非零时采用皮层估计, 否则为纯 CSF.
/// 若体积 CSF 更大且皮层 GM 不超过阈值, 则以体积 CSF 替换, 并依次压缩 GM, WM.
#[inline]
fn cortex_then_csf(cortex: [f64; 3], vol_csf: f64) -> [f64; 3] {
    let [mut gm, mut wm, mut csf] = if cortex[0] != 0.0 || cortex[1] != 0.0 {
        cortex
    } else {
        [0.0, 0.0, 1.0]
    };

    // NaN 不视为超过阈值.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    let below = !(cortex[0] > CORTEX_GM_THRESHOLD);
    if vol_csf > csf && below {
        csf = vol_csf;
        gm = min_nan(gm, 1.0 - csf);
        wm = min_nan(wm, 1.0 - (csf + gm));
    }
    [gm, wm, csf]
}

/// 单个体素: 叠加一个皮层下结构的 PV `m`. `m <= 0` 时不变, `m` 为 NaN 时整个体素变为 NaN.
#[inline]
#[allow(clippy::neg_cmp_op_on_partial_ord)]
fn add_structure(v: &mut [f64; 3], m: f64) {
    if !(m <= 0.0) {
        v[0] = min_nan(v[0] + m, 1.0);
        v[2] = min_nan(v[2], 1.0 - v[0]);
        v[1] = if v[0].is_nan() || v[2].is_nan() {
            f64::NAN
        } else {
            (1.0 - (v[0] + v[2])).max(0.0)
        };
    }
}

/// 融合皮层估计 `cortex`, 体积估计 `volumetric` (仅使用其 CSF) 与皮层下结构 `structures`.
///
/// 1. 初始化为纯 CSF;
/// 2. 皮层 GM 或 WM 非零的体素采用皮层估计;
/// 3. 体积 CSF 更大且皮层 GM 不超过 `CORTEX_GM_THRESHOLD` 的体素,
///   CSF 取体积 CSF, GM 与 WM 依次压缩;
/// 4. 检查划分不变量;
/// 5. 按结构名顺序叠加每个皮层下结构: GM 增加, CSF 与 WM 依次让出空间;
/// 6. 负的舍入误差置 0, 检查划分不变量, 逐体素归一化.
///
/// # 返回值
///
/// - 输入形状不一致时返回 `Err(PvError::GridMismatch)`;
/// - 皮层或体积估计含 NaN/无穷大, 或任何一次不变量检查失败,
///   都返回 `Err(PvError::FusionInvariant)`, 不可恢复.
pub fn stack_images(
    cortex: &PvField,
    volumetric: &PvField,
    structures: &StructureMasks,
) -> PvResult<PvField> {
    let shape = cortex.shape();
    let others = std::iter::once(volumetric.shape()).chain(structures.values().map(|m| m.dim()));
    for found in others {
        if found != shape {
            return Err(PvError::GridMismatch {
                expected: vec![shape.0, shape.1, shape.2],
                found: vec![found.0, found.1, found.2],
            });
        }
    }

    cortex.check_finite()?;
    volumetric.check_finite()?;

    let mut out = PvField::pure_csf(shape);
    let vol_csf = volumetric.get(crate::TissueClass::Csf);
    for idx in ndarray::indices(shape) {
        out.set_voxel(idx, cortex_then_csf(cortex.voxel(idx), vol_csf[idx]));
    }
    out.check_partition(PARTITION_TOLERANCE)?;

    for (name, mask) in structures {
        debug!("layering {name}");
        for idx in ndarray::indices(shape) {
            let mut v = out.voxel(idx);
            add_structure(&mut v, mask[idx]);
            out.set_voxel(idx, v);
        }
    }

    out.clamp_negative();
    out.check_partition(PARTITION_TOLERANCE)?;
    out.renormalize();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Structure;
    use crate::{Idx3d, TissueClass, Violation};
    use ndarray::{Array3, Zip};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn single(v: [f64; 3]) -> PvField {
        let mut f = PvField::zeros((1, 1, 1));
        f.set_voxel((0, 0, 0), v);
        f
    }

    fn random_partition(rng: &mut StdRng, shape: Idx3d) -> PvField {
        let mut f = PvField::zeros(shape);
        for idx in ndarray::indices(shape) {
            let v = match rng.gen_range(0..4) {
                0 => [0.0, 0.0, 1.0],
                1 => [1.0, 0.0, 0.0],
                _ => {
                    let a: f64 = rng.gen_range(0.0..1.0);
                    let b: f64 = rng.gen_range(0.0..1.0 - a);
                    [a, b, 1.0 - a - b]
                }
            };
            f.set_voxel(idx, v);
        }
        f
    }

    fn max_sum_error(f: &PvField) -> f64 {
        Zip::from(f.get(TissueClass::Gm))
            .and(f.get(TissueClass::Wm))
            .and(f.get(TissueClass::Csf))
            .fold(0.0_f64, |m, g, w, c| m.max((g + w + c - 1.0).abs()))
    }

    #[test]
    fn test_random_inputs_keep_partition() {
        let mut rng = StdRng::seed_from_u64(42);
        let shape = (6, 5, 4);
        for _ in 0..20 {
            let cortex = random_partition(&mut rng, shape);
            let volumetric = random_partition(&mut rng, shape);
            let mut structures = StructureMasks::new();
            for s in [Structure::LCaud, Structure::RPuta, Structure::LThal] {
                let m = Array3::from_shape_fn(shape, |_| {
                    if rng.gen_bool(0.5) {
                        0.0
                    } else {
                        rng.gen_range(0.0..1.5)
                    }
                });
                structures.insert(s, m);
            }

            let out = stack_images(&cortex, &volumetric, &structures).unwrap();
            assert!(out.check_partition(PARTITION_TOLERANCE).is_ok());
            assert!(max_sum_error(&out) < 1e-9);
            assert!(out.min() >= 0.0);
        }
    }

    #[test]
    fn test_cortex_precedence() {
        let cortex = single([0.5, 0.3, 0.2]);
        let volumetric = single([0.05, 0.05, 0.9]);
        let out = stack_images(&cortex, &volumetric, &StructureMasks::new()).unwrap();
        let [g, w, c] = out.voxel((0, 0, 0));
        assert!((g - 0.5).abs() < 1e-12);
        assert!((w - 0.3).abs() < 1e-12);
        assert!((c - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_ventricle_csf_fills_in() {
        // 皮层 GM 不超过阈值时, 体积 CSF 覆盖皮层估计.
        let cortex = single([0.005, 0.5, 0.495]);
        let volumetric = single([0.0, 0.1, 0.9]);
        let out = stack_images(&cortex, &volumetric, &StructureMasks::new()).unwrap();
        let [g, w, c] = out.voxel((0, 0, 0));
        assert!((g - 0.005).abs() < 1e-12);
        assert!((w - 0.095).abs() < 1e-12);
        assert!((c - 0.9).abs() < 1e-12);

        // 皮层估计全零时从纯 CSF 开始.
        let out = stack_images(&single([0.0; 3]), &volumetric, &StructureMasks::new()).unwrap();
        assert_eq!(out.voxel((0, 0, 0)), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_subcortical_monotonicity() {
        let cortex = single([0.2, 0.5, 0.3]);
        let volumetric = single([0.0, 0.0, 0.0]);
        let mut last: Option<[f64; 3]> = None;
        for m in [0.0, 0.3, 1.0, 1.5] {
            let mut structures = StructureMasks::new();
            structures.insert(Structure::LPuta, Array3::from_elem((1, 1, 1), m));
            let v = stack_images(&cortex, &volumetric, &structures)
                .unwrap()
                .voxel((0, 0, 0));
            assert!((v.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            if let Some(prev) = last {
                assert!(v[0] >= prev[0]);
                assert!(v[2] <= prev[2]);
            }
            last = Some(v);
        }
        let [g, w, c] = last.unwrap();
        assert_eq!((g, w, c), (1.0, 0.0, 0.0));
    }

    #[test]
    fn test_invalid_cortex_is_fatal() {
        let cortex = single([0.9, 0.9, 0.0]);
        let volumetric = single([0.0, 0.0, 0.0]);
        match stack_images(&cortex, &volumetric, &StructureMasks::new()) {
            Err(PvError::FusionInvariant(v)) => {
                assert_eq!(v.kind, Violation::Sum);
                assert_eq!(v.voxel, (0, 0, 0));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_nan_input_is_fatal() {
        let mut cortex = PvField::zeros((1, 1, 2));
        cortex.set_voxel((0, 0, 0), [f64::NAN, 0.0, 1.0]);
        cortex.set_voxel((0, 0, 1), [0.5, f64::NAN, 0.5]);
        let volumetric = PvField::zeros((1, 1, 2));
        match stack_images(&cortex, &volumetric, &StructureMasks::new()) {
            Err(PvError::FusionInvariant(v)) => {
                assert_eq!(v.kind, Violation::NonFinite);
                assert_eq!(v.voxel, (0, 0, 0));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let mut volumetric = single([0.0, 0.0, 0.0]);
        volumetric.get_mut(TissueClass::Csf).fill(f64::NAN);
        let out = stack_images(&single([0.2, 0.5, 0.3]), &volumetric, &StructureMasks::new());
        assert!(matches!(out, Err(PvError::FusionInvariant(_))));

        // 结构掩膜中的 NaN 在最后一次检查时暴露.
        let mut structures = StructureMasks::new();
        structures.insert(Structure::LCaud, Array3::from_elem((1, 1, 1), f64::NAN));
        let out = stack_images(&single([0.2, 0.5, 0.3]), &single([0.0; 3]), &structures);
        assert!(matches!(out, Err(PvError::FusionInvariant(_))));
    }

    #[test]
    fn test_small_drift_is_renormalized() {
        let mut rng = StdRng::seed_from_u64(7);
        let shape = (4, 4, 3);
        let mut cortex = random_partition(&mut rng, shape);
        cortex.map_inplace(|v| {
            if v[0] != 0.0 || v[1] != 0.0 {
                v[1] += 1e-7;
            }
        });
        cortex
            .get_mut(TissueClass::Csf)
            .mapv_inplace(|c| if c > 0.5 { c - 1e-7 } else { c });
        let volumetric = PvField::zeros(shape);
        let mut structures = StructureMasks::new();
        structures.insert(Structure::RCaud, Array3::from_elem(shape, 0.25));

        let out = stack_images(&cortex, &volumetric, &structures).unwrap();
        assert!(max_sum_error(&out) < 1e-9);
    }

    #[test]
    fn test_shape_mismatch() {
        let cortex = PvField::pure_csf((2, 2, 2));
        let volumetric = PvField::pure_csf((2, 2, 3));
        assert!(matches!(
            stack_images(&cortex, &volumetric, &StructureMasks::new()),
            Err(PvError::GridMismatch { .. })
        ));
    }
}
