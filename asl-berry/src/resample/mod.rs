//! 仿射重采样.
//!
//! 对目标网格的每个体素中心, 通过
//! `src.world2vox · transform⁻¹ · dst.vox2world` 拉回到源网格的体素坐标,
//! 再按插值阶数取值. 拉回点落在源网格之外时取 0.

use crate::data::check_shape;
use crate::{PvError, PvResult, VoxelGrid};
use nalgebra::{Matrix4, Vector4};
use ndarray::{s, Array4, ArrayView4, ArrayViewMut1, ArrayViewMut3, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 距整数小于该值的坐标被视为恰好落在体素中心上.
const SNAP: f64 = 1e-6;

/// 插值阶数.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Interpolation {
    /// 零阶, 最近邻.
    Nearest,

    /// 一阶, 三线性.
    #[default]
    Linear,
}

/// 在两个体素网格之间重采样多通道体数据 (通道位于最后一维).
pub trait Resample {
    /// 将位于 `src_grid` 上的 `src` 经世界坐标变换 `transform` (源 -> 目标)
    /// 重采样到 `dst_grid` 上. 输出形状为 `dst_grid.size()` 加上原通道数.
    fn resample(
        &self,
        src: ArrayView4<'_, f32>,
        src_grid: &VoxelGrid,
        dst_grid: &VoxelGrid,
        transform: &Matrix4<f64>,
    ) -> PvResult<Array4<f32>>;
}

/// 基于仿射矩阵的重采样器.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AffineResampler {
    order: Interpolation,
    cores: usize,
}

impl Default for AffineResampler {
    fn default() -> Self {
        Self::new(Interpolation::Linear, 0)
    }
}

impl AffineResampler {
    /// 创建重采样器. `cores` 为并行线程数, 0 表示由 `rayon` 自行决定.
    #[inline]
    pub const fn new(order: Interpolation, cores: usize) -> Self {
        Self { order, cores }
    }

    /// 对输出的第 `i` 个平面 (形状 `[j, k, c]`) 求值.
    fn fill_plane(
        &self,
        src: &ArrayView4<'_, f32>,
        pull: &Matrix4<f64>,
        i: usize,
        mut plane: ArrayViewMut3<'_, f32>,
    ) {
        let (ny, nz, _) = plane.dim();
        for j in 0..ny {
            for k in 0..nz {
                let p = pull * Vector4::new(i as f64, j as f64, k as f64, 1.0);
                let out = plane.slice_mut(s![j, k, ..]);
                match self.order {
                    Interpolation::Nearest => nearest(src, [p[0], p[1], p[2]], out),
                    Interpolation::Linear => trilinear(src, [p[0], p[1], p[2]], out),
                }
            }
        }
    }
}

impl Resample for AffineResampler {
    fn resample(
        &self,
        src: ArrayView4<'_, f32>,
        src_grid: &VoxelGrid,
        dst_grid: &VoxelGrid,
        transform: &Matrix4<f64>,
    ) -> PvResult<Array4<f32>> {
        check_shape(src_grid, src.shape())?;
        let inv = transform.try_inverse().ok_or_else(|| {
            PvError::Configuration(format!("singular registration transform: {transform}"))
        })?;
        let pull = src_grid.world2vox() * inv * dst_grid.vox2world();

        let [nx, ny, nz] = dst_grid.size();
        let mut out = Array4::<f32>::zeros((nx, ny, nz, src.shape()[3]));

        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(self.cores)
                    .build()
                    .map_err(|e| PvError::Configuration(format!("cannot build thread pool: {e}")))?;
                pool.install(|| {
                    out.axis_iter_mut(Axis(0))
                        .into_par_iter()
                        .enumerate()
                        .for_each(|(i, plane)| self.fill_plane(&src, &pull, i, plane));
                });
            } else {
                for (i, plane) in out.axis_iter_mut(Axis(0)).enumerate() {
                    self.fill_plane(&src, &pull, i, plane);
                }
            }
        }
        Ok(out)
    }
}

/// 将接近整数的坐标吸附到整数上.
#[inline]
fn snap(x: f64) -> f64 {
    let r = x.round();
    if (x - r).abs() < SNAP {
        r
    } else {
        x
    }
}

/// 沿单个轴的左邻点下标与权重. 越界或轴长为 0 时返回 `None`.
#[inline]
fn axis_weights(x: f64, n: usize) -> Option<(usize, usize, f64)> {
    let x = snap(x);
    let last = n.checked_sub(1)?;
    if !(0.0..=last as f64).contains(&x) {
        return None;
    }
    let lo = (x.floor() as usize).min(n.saturating_sub(2));
    let hi = (lo + 1).min(last);
    Some((lo, hi, x - lo as f64))
}

fn trilinear(src: &ArrayView4<'_, f32>, p: [f64; 3], mut out: ArrayViewMut1<'_, f32>) {
    let shape = src.shape();
    let mut axes = [(0, 0, 0.0); 3];
    for a in 0..3 {
        match axis_weights(p[a], shape[a]) {
            Some(w) => axes[a] = w,
            None => return,
        }
    }
    let [(x0, x1, tx), (y0, y1, ty), (z0, z1, tz)] = axes;
    let corners = [
        (x0, y0, z0, (1.0 - tx) * (1.0 - ty) * (1.0 - tz)),
        (x1, y0, z0, tx * (1.0 - ty) * (1.0 - tz)),
        (x0, y1, z0, (1.0 - tx) * ty * (1.0 - tz)),
        (x1, y1, z0, tx * ty * (1.0 - tz)),
        (x0, y0, z1, (1.0 - tx) * (1.0 - ty) * tz),
        (x1, y0, z1, tx * (1.0 - ty) * tz),
        (x0, y1, z1, (1.0 - tx) * ty * tz),
        (x1, y1, z1, tx * ty * tz),
    ];
    for (c, o) in out.iter_mut().enumerate() {
        let mut acc = 0.0_f64;
        for &(x, y, z, w) in corners.iter().filter(|v| v.3 != 0.0) {
            acc += w * src[(x, y, z, c)] as f64;
        }
        *o = acc as f32;
    }
}

fn nearest(src: &ArrayView4<'_, f32>, p: [f64; 3], mut out: ArrayViewMut1<'_, f32>) {
    let shape = src.shape();
    let mut idx = [0usize; 3];
    for a in 0..3 {
        let r = snap(p[a]).round();
        match shape[a].checked_sub(1) {
            Some(last) if (0.0..=last as f64).contains(&r) => idx[a] = r as usize,
            _ => return,
        }
    }
    out.assign(&src.slice(s![idx[0], idx[1], idx[2], ..]));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Rounding;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_src(rng: &mut StdRng, shape: (usize, usize, usize, usize)) -> Array4<f32> {
        Array4::from_shape_fn(shape, |_| rng.gen_range(0.0..1.0))
    }

    #[test]
    fn test_identity_is_exact() {
        let mut rng = StdRng::seed_from_u64(11);
        let src = random_src(&mut rng, (5, 6, 7, 2));
        let mut affine = Matrix4::from_diagonal(&Vector4::new(1.3, 0.7, 2.1, 1.0));
        affine[(0, 3)] = -40.0;
        affine[(2, 3)] = 12.5;
        let grid = VoxelGrid::new([5, 6, 7], affine).unwrap();

        for order in [Interpolation::Linear, Interpolation::Nearest] {
            let out = AffineResampler::new(order, 2)
                .resample(src.view(), &grid, &grid, &Matrix4::identity())
                .unwrap();
            assert_eq!(out, src);
        }
    }

    #[test]
    fn test_supersample_constant_field() {
        let src = Array4::<f32>::from_elem((4, 4, 4, 1), 0.25);
        let grid = VoxelGrid::from_vox_size([4; 3], [2.0; 3]);
        let high = grid.supersample(2).unwrap();
        let out = AffineResampler::default()
            .resample(src.view(), &grid, &high, &Matrix4::identity())
            .unwrap();
        assert_eq!(out.shape(), &[8, 8, 8, 1]);
        // 高分辨率网格最外层体素中心落在源网格之外.
        assert_eq!(out[(0, 0, 0, 0)], 0.0);
        assert!((out[(3, 4, 5, 0)] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_linear_midpoint() {
        let src = Array4::<f32>::from_shape_fn((2, 1, 1, 1), |(i, ..)| i as f32);
        let src_grid = VoxelGrid::from_vox_size([2, 1, 1], [1.0; 3]);
        // 平移半个体素.
        let mut shift = Matrix4::identity();
        shift[(0, 3)] = -0.5;
        let dst_grid = VoxelGrid::from_vox_size([2, 1, 1], [1.0; 3]);
        let out = AffineResampler::new(Interpolation::Linear, 1)
            .resample(src.view(), &src_grid, &dst_grid, &shift)
            .unwrap();
        // 目标体素 0 拉回到源坐标 0.5.
        assert!((out[(0, 0, 0, 0)] - 0.5).abs() < 1e-6);
        // 目标体素 1 拉回到源坐标 1.5, 越界.
        assert_eq!(out[(1, 0, 0, 0)], 0.0);
    }

    #[test]
    fn test_downsample_grid_samples_centres() {
        let src = Array4::<f32>::from_shape_fn((9, 9, 9, 1), |(i, j, k, _)| (i + 10 * j + 100 * k) as f32);
        let grid = VoxelGrid::from_vox_size([9; 3], [1.0; 3]);
        let low = grid.resize_voxels([3.0; 3], Rounding::Round).unwrap();
        let out = AffineResampler::new(Interpolation::Nearest, 0)
            .resample(src.view(), &grid, &low, &Matrix4::identity())
            .unwrap();
        assert_eq!(out[(0, 0, 0, 0)], src[(1, 1, 1, 0)]);
        assert_eq!(out[(2, 1, 0, 0)], src[(7, 4, 1, 0)]);
    }

    #[test]
    fn test_empty_source_axis() {
        assert_eq!(axis_weights(0.0, 0), None);
        assert_eq!(axis_weights(0.0, 1), Some((0, 0, 0.0)));
        assert_eq!(axis_weights(f64::NAN, 3), None);

        let src = Array4::<f32>::zeros((0, 2, 2, 1));
        let mut out = ndarray::Array1::<f32>::from_elem(1, 7.0);
        trilinear(&src.view(), [0.0, 0.0, 0.0], out.view_mut());
        assert_eq!(out[0], 7.0);
        nearest(&src.view(), [0.0, 0.0, 0.0], out.view_mut());
        assert_eq!(out[0], 7.0);

        let src = Array4::<f32>::from_elem((1, 2, 2, 1), 3.0);
        nearest(&src.view(), [f64::NAN, 0.0, 0.0], out.view_mut());
        assert_eq!(out[0], 7.0);
        nearest(&src.view(), [0.0, 1.0, 1.0], out.view_mut());
        assert_eq!(out[0], 3.0);
    }

    #[test]
    fn test_grid_checks() {
        let src = Array4::<f32>::zeros((3, 3, 3, 1));
        let grid = VoxelGrid::from_vox_size([3, 3, 4], [1.0; 3]);
        let r = AffineResampler::default();
        assert!(r.resample(src.view(), &grid, &grid, &Matrix4::identity()).is_err());
        let grid = VoxelGrid::from_vox_size([3, 3, 3], [1.0; 3]);
        assert!(r.resample(src.view(), &grid, &grid, &Matrix4::zeros()).is_err());
    }
}
