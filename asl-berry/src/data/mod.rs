//! 体数据: 体素网格, 分割标签体, 组织 PV 图以及它们的持久化.

use std::collections::BTreeSet;
use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayD, Axis, Ix3, Ix4};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::{Idx3d, PvError, PvResult};

mod grid;
mod pv;
mod save;

pub use grid::{Rounding, VoxelGrid};
pub use pv::PvField;
pub use save::{split_paths, write_volume, write_volume_like, ImgWriteVis};

macro_rules! impl_read_volume {
    ($($name: ident => $t: ty),+) => {
        $(
            /// 读取 nii 文件, 返回 header 与按 `[i, j, k, ...]` 顺序组织的标准布局数组.
            pub fn $name<P: AsRef<Path>>(path: P) -> PvResult<(NiftiHeader, ArrayD<$t>)> {
                let obj = ReaderOptions::new().read_file(path.as_ref())?;
                let header = obj.header().clone();
                let data = obj.into_volume().into_ndarray::<$t>()?;

                // nifti 数据段按照 Fortran 顺序排列.
                let data = if data.is_standard_layout() {
                    data
                } else {
                    data.as_standard_layout().into_owned()
                };
                Ok((header, data))
            }
        )+
    };
}

impl_read_volume!(read_volume_f64 => f64, read_volume_i32 => i32);

/// 将 `[i, j, k]` 或 `[i, j, k, 1]` 形状的数组转换为三维数组.
pub fn into_3d<T>(data: ArrayD<T>) -> PvResult<Array3<T>> {
    let data = if data.ndim() == 4 && data.shape()[3] == 1 {
        data.index_axis_move(Axis(3), 0)
    } else {
        data
    };
    let found = data.shape().to_vec();
    data.into_dimensionality::<Ix3>().map_err(|_| {
        PvError::Configuration(format!("expected a 3D volume, found shape {found:?}"))
    })
}

/// 将 `[i, j, k, c]` 形状的数组转换为四维数组.
pub(crate) fn into_4d<T>(data: ArrayD<T>) -> PvResult<ndarray::Array4<T>> {
    let found = data.shape().to_vec();
    data.into_dimensionality::<Ix4>().map_err(|_| {
        PvError::Configuration(format!("expected a 4D volume, found shape {found:?}"))
    })
}

/// 检查数组形状是否与网格一致.
pub(crate) fn check_shape(grid: &VoxelGrid, shape: &[usize]) -> PvResult<()> {
    if shape.len() < 3 || shape[..3] != grid.size() {
        return Err(PvError::GridMismatch {
            expected: grid.size().to_vec(),
            found: shape.to_vec(),
        });
    }
    Ok(())
}

/// FreeSurfer `aparc+aseg` 分割标签体, 包括体素网格和整数标签.
#[derive(Debug, Clone)]
pub struct LabelVolume {
    grid: VoxelGrid,
    data: Array3<i32>,
}

impl Index<Idx3d> for LabelVolume {
    type Output = i32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl LabelVolume {
    /// 打开 nii 格式的分割标签体. 浮点存储的标签会被截断为整数.
    pub fn open<P: AsRef<Path>>(path: P) -> PvResult<Self> {
        let (header, data) = read_volume_i32(path)?;
        let grid = VoxelGrid::from_header(&header)?;
        Self::new(into_3d(data)?, grid)
    }

    /// 由裸标签数据和网格直接创建标签体.
    ///
    /// 当 `data` 形状与网格不一致时返回 `Err(PvError::GridMismatch)`.
    pub fn new(data: Array3<i32>, grid: VoxelGrid) -> PvResult<Self> {
        check_shape(&grid, data.shape())?;
        Ok(Self { grid, data })
    }

    /// 体素网格.
    #[inline]
    pub fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// 数据形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    /// 标签体中出现的所有不同标签, 升序.
    pub fn labels(&self) -> Vec<i32> {
        self.data
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// 标签为 `label` 的体素个数.
    pub fn count(&self, label: i32) -> usize {
        self.data.iter().filter(|v| **v == label).count()
    }

    /// 标签属于 `codes` 的体素置 1, 其余置 0.
    pub fn mask(&self, codes: &[i32]) -> Array3<f32> {
        self.data
            .mapv(|v| if codes.contains(&v) { 1.0 } else { 0.0 })
    }
}
