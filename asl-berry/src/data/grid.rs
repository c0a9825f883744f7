//! 体素网格.

use crate::{Idx3d, PvError, PvResult};
use nalgebra::{Matrix3, Matrix4, Vector3, Vector4};
use nifti::NiftiHeader;
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 缩放体素时, 新体素个数的取整方式.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Rounding {
    /// 四舍六入五成双 (与 numpy 一致).
    Round,

    /// 向下取整.
    Floor,

    /// 向上取整.
    Ceil,
}

impl Rounding {
    #[inline]
    fn apply(&self, v: f64) -> f64 {
        match self {
            Rounding::Round => v.round_ties_even(),
            Rounding::Floor => v.floor(),
            Rounding::Ceil => v.ceil(),
        }
    }
}

/// 规则采样的三维体素网格: 各维体素个数, 以及体素坐标到物理 (世界) 坐标的仿射矩阵.
///
/// 体素大小由仿射矩阵前三列的模长给出 (单位: 毫米).
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelGrid {
    size: [usize; 3],
    vox2world: Matrix4<f64>,
    world2vox: Matrix4<f64>,
}

impl VoxelGrid {
    /// 由体素个数 `size` 和仿射矩阵 `vox2world` 构建网格.
    ///
    /// 若某一维体素个数为 0, 或仿射矩阵不可逆, 则返回 `Err(PvError::Configuration)`.
    pub fn new(size: [usize; 3], vox2world: Matrix4<f64>) -> PvResult<Self> {
        if size.iter().any(|s| *s == 0) {
            return Err(PvError::Configuration(format!(
                "voxel grid size must be positive, got {size:?}"
            )));
        }
        let world2vox = vox2world.try_inverse().ok_or_else(|| {
            PvError::Configuration(format!("singular vox2world matrix: {vox2world}"))
        })?;
        Ok(Self {
            size,
            vox2world,
            world2vox,
        })
    }

    /// 以世界坐标原点为第一个体素中心、轴对齐的网格. 常用于测试和合成数据.
    ///
    /// 若参数非法则程序 panic.
    pub fn from_vox_size(size: [usize; 3], vox_size: [f64; 3]) -> Self {
        let [x, y, z] = vox_size;
        let affine = Matrix4::from_diagonal(&Vector4::new(x, y, z, 1.0));
        Self::new(size, affine).expect("体素网格参数非法")
    }

    /// 从 nifti header 读取网格. 优先使用 sform, 其次 qform, 最后退化为
    /// 仅由 `pixdim` 给出的对角矩阵.
    pub fn from_header(h: &NiftiHeader) -> PvResult<Self> {
        let [_, nx, ny, nz, ..] = h.dim;
        let size = [nx as usize, ny as usize, nz as usize];

        let affine = if h.sform_code > 0 {
            let mut m = Matrix4::identity();
            for (r, row) in [h.srow_x, h.srow_y, h.srow_z].iter().enumerate() {
                for (c, v) in row.iter().enumerate() {
                    m[(r, c)] = *v as f64;
                }
            }
            m
        } else if h.qform_code > 0 {
            qform_affine(h)
        } else {
            let [_, x, y, z, ..] = h.pixdim;
            Matrix4::from_diagonal(&Vector4::new(x as f64, y as f64, z as f64, 1.0))
        };
        Self::new(size, affine)
    }

    /// 只读取 nifti 文件的 header 部分并构建网格.
    pub fn open<P: AsRef<Path>>(path: P) -> PvResult<Self> {
        let header = NiftiHeader::from_file(path.as_ref())?;
        Self::from_header(&header)
    }

    /// 各维体素个数.
    #[inline]
    pub fn size(&self) -> [usize; 3] {
        self.size
    }

    /// 各维体素个数, 以元组形式给出.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        let [x, y, z] = self.size;
        (x, y, z)
    }

    /// 体素总个数.
    #[inline]
    pub fn n_voxels(&self) -> usize {
        self.size.iter().product()
    }

    /// 体素大小 (毫米).
    pub fn vox_size(&self) -> [f64; 3] {
        let m = self.vox2world.fixed_view::<3, 3>(0, 0);
        [m.column(0).norm(), m.column(1).norm(), m.column(2).norm()]
    }

    /// 视野大小 (毫米), 即体素个数乘以体素大小.
    pub fn fov_size(&self) -> [f64; 3] {
        let v = self.vox_size();
        [0, 1, 2].map(|i| self.size[i] as f64 * v[i])
    }

    /// 体素坐标 -> 世界坐标.
    #[inline]
    pub fn vox2world(&self) -> &Matrix4<f64> {
        &self.vox2world
    }

    /// 世界坐标 -> 体素坐标.
    #[inline]
    pub fn world2vox(&self) -> &Matrix4<f64> {
        &self.world2vox
    }

    /// 按 `factor` 缩放体素大小, 保持视野不变.
    ///
    /// 新体素个数为 `size / factor` 按 `rounding` 取整, 新体素大小为视野除以新体素个数.
    /// 新网格第一个体素的外角与旧网格第一个体素的外角重合.
    ///
    /// # 返回值
    ///
    /// - 若 `factor` 存在非正数或非有限值, 返回 `Err(PvError::Configuration)`;
    /// - 若取整后某一维体素个数为 0, 返回 `Err(PvError::Configuration)`.
    pub fn resize_voxels(&self, factor: [f64; 3], rounding: Rounding) -> PvResult<Self> {
        if factor.iter().any(|f| !f.is_finite() || *f <= 0.0) {
            return Err(PvError::Configuration(format!(
                "voxel resize factor must be positive and finite, got {factor:?}"
            )));
        }

        let mut new_size = [0usize; 3];
        for i in 0..3 {
            let n = rounding.apply(self.size[i] as f64 / factor[i]);
            if n < 1.0 {
                return Err(PvError::Configuration(format!(
                    "resizing {:?} by {factor:?} leaves an empty axis",
                    self.size
                )));
            }
            new_size[i] = n as usize;
        }
        self.resized(new_size)
    }

    /// 保持视野不变, 将体素个数改为 `new_size`.
    fn resized(&self, new_size: [usize; 3]) -> PvResult<Self> {
        // 新体素大小 / 旧体素大小
        let ratio = Vector3::from_fn(|i, _| self.size[i] as f64 / new_size[i] as f64);

        // 在旧体素坐标系下: 新体素 i 的中心位于 -0.5 + (i + 0.5) * ratio.
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0)
            .copy_from(&Matrix3::from_diagonal(&ratio));
        for i in 0..3 {
            m[(i, 3)] = (ratio[i] - 1.0) / 2.0;
        }

        Self::new(new_size, self.vox2world * m)
    }

    /// 以整数倍 `factor` 超采样, 新网格每个体素边长为原来的 `1 / factor`.
    ///
    /// 等价于 `resize_voxels([1 / factor; 3], Rounding::Ceil)`, 但新体素个数
    /// 精确为 `size * factor`, 不受浮点误差影响.
    ///
    /// 当 `factor` 为 0 时返回 `Err(PvError::Configuration)`.
    pub fn supersample(&self, factor: usize) -> PvResult<Self> {
        if factor == 0 {
            return Err(PvError::Configuration(
                "supersampling factor must be at least 1".to_string(),
            ));
        }
        self.resized(self.size.map(|n| n * factor))
    }

    /// 生成描述该网格的 nifti header (sform, 毫米单位).
    pub fn to_header(&self) -> NiftiHeader {
        let mut h = NiftiHeader::default();
        let [nx, ny, nz] = self.size;
        h.dim = [3, nx as u16, ny as u16, nz as u16, 1, 1, 1, 1];
        let [vx, vy, vz] = self.vox_size();
        h.pixdim = [1.0, vx as f32, vy as f32, vz as f32, 1.0, 1.0, 1.0, 1.0];
        h.sform_code = 2;
        h.qform_code = 0;
        let m = &self.vox2world;
        h.srow_x = [0, 1, 2, 3].map(|c| m[(0, c)] as f32);
        h.srow_y = [0, 1, 2, 3].map(|c| m[(1, c)] as f32);
        h.srow_z = [0, 1, 2, 3].map(|c| m[(2, c)] as f32);
        // NIFTI_UNITS_MM
        h.xyzt_units = 2;
        h
    }
}

/// 由 qform 四元数计算仿射矩阵.
fn qform_affine(h: &NiftiHeader) -> Matrix4<f64> {
    let (b, c, d) = (h.quatern_b as f64, h.quatern_c as f64, h.quatern_d as f64);
    let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
    let rot = Matrix3::new(
        a * a + b * b - c * c - d * d,
        2.0 * (b * c - a * d),
        2.0 * (b * d + a * c),
        2.0 * (b * c + a * d),
        a * a + c * c - b * b - d * d,
        2.0 * (c * d - a * b),
        2.0 * (b * d - a * c),
        2.0 * (c * d + a * b),
        a * a + d * d - c * c - b * b,
    );
    let [qfac, x, y, z, ..] = h.pixdim;
    let qfac = if qfac < 0.0 { -1.0 } else { 1.0 };
    let scale = Matrix3::from_diagonal(&Vector3::new(x as f64, y as f64, qfac * z as f64));

    let mut m = Matrix4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&(rot * scale));
    m[(0, 3)] = h.quatern_x as f64;
    m[(1, 3)] = h.quatern_y as f64;
    m[(2, 3)] = h.quatern_z as f64;
    m
}
