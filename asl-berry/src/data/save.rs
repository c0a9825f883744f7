//! 体数据与预览图的持久化存储.

use super::{check_shape, PvField, VoxelGrid};
use crate::{PvResult, TissueClass};
use image::ImageResult;
use ndarray::{ArrayBase, Axis, Data, Dimension, Ix3, RemoveAxis};
use nifti::writer::WriterOptions;
use nifti::NiftiHeader;
use std::path::{Path, PathBuf};

/// 将 `data` 以 `f32` 写入 nii 文件, 使用 `grid` 的仿射矩阵.
/// 路径以 `.gz` 结尾时自动压缩.
///
/// 当 `data` 前三维与网格不一致时返回 `Err(PvError::GridMismatch)`.
pub fn write_volume<S, D, P>(path: P, grid: &VoxelGrid, data: &ArrayBase<S, D>) -> PvResult<()>
where
    S: Data<Elem = f32>,
    D: Dimension + RemoveAxis,
    P: AsRef<Path>,
{
    check_shape(grid, data.shape())?;
    let header = grid.to_header();
    WriterOptions::new(path.as_ref())
        .reference_header(&header)
        .write_nifti(data)?;
    Ok(())
}

/// 将 `data` 以 `f32` 写入 nii 文件, 头部照搬 `reference`.
/// 除维度与数据类型外, 单位, qform/sform 和层时间等字段都保持不变.
///
/// 当 `data` 前三维与 `reference` 不一致时返回 `Err(PvError::GridMismatch)`.
pub fn write_volume_like<S, D, P>(path: P, reference: &NiftiHeader, data: &ArrayBase<S, D>) -> PvResult<()>
where
    S: Data<Elem = f32>,
    D: Dimension + RemoveAxis,
    P: AsRef<Path>,
{
    check_shape(&VoxelGrid::from_header(reference)?, data.shape())?;
    WriterOptions::new(path.as_ref())
        .reference_header(reference)
        .write_nifti(data)?;
    Ok(())
}

/// 拆分输出的三个文件路径, 顺序为 GM, WM, CSF.
///
/// 在文件名第一个 `.` 处切分, 例如 `out.nii.gz` -> `out_GM.nii.gz`.
pub fn split_paths<P: AsRef<Path>>(path: P) -> [PathBuf; 3] {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = match name.find('.') {
        Some(i) => name.split_at(i),
        None => (name.as_str(), ""),
    };
    TissueClass::ALL.map(|t| path.with_file_name(format!("{stem}_{}{ext}", t.suffix())))
}

impl PvField {
    /// 写出最后一维为 GM, WM, CSF 的四维 nii 文件.
    pub fn save_stacked<P: AsRef<Path>>(&self, path: P, grid: &VoxelGrid) -> PvResult<()> {
        let data = self.to_stacked().mapv(|v| v as f32);
        write_volume(path, grid, &data)
    }

    /// 写出三个三维 nii 文件, 文件名见 [`split_paths`]. 返回写出的路径.
    pub fn save_split<P: AsRef<Path>>(&self, path: P, grid: &VoxelGrid) -> PvResult<[PathBuf; 3]> {
        let paths = split_paths(path);
        for (t, p) in TissueClass::ALL.iter().zip(&paths) {
            write_volume(p, grid, &self.get(*t).mapv(|v| v as f32))?;
        }
        Ok(paths)
    }

    /// 在 `dir` 下为每种组织保存中间轴向切片的预览图 `GM.png`, `WM.png`, `CSF.png`.
    pub fn save_previews<P: AsRef<Path>>(&self, dir: P) -> PvResult<()> {
        std::fs::create_dir_all(dir.as_ref())?;
        for t in TissueClass::ALL {
            self.get(t)
                .save_vis(dir.as_ref().join(format!("{}.png", t.suffix())))?;
        }
        Ok(())
    }
}

/// 表明一个可以通过 **可视化友好** 模式持久化存储的对象.
///
/// 对三维分数图, 取 `k` 方向中间的切片, 分数 `[0, 1]` 线性映射到灰度 `[0, 255]`.
/// 图像的水平方向为 `i`, 垂直方向为 `j` 且向上增长.
pub trait ImgWriteVis {
    /// 按照可视化规则将图片保存到 `path` 路径.
    fn save_vis<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 分数 -> 灰度.
#[inline]
fn gray(v: f64) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

impl<S: Data<Elem = f64>> ImgWriteVis for ArrayBase<S, Ix3> {
    fn save_vis<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        let (width, height, depth) = self.dim();
        let sli = self.index_axis(Axis(2), depth / 2);
        let mut buf = image::GrayImage::new(width as u32, height as u32);
        for ((i, j), &v) in sli.indexed_iter() {
            buf.put_pixel(i as u32, (height - 1 - j) as u32, image::Luma([gray(v)]));
        }
        buf.save(path)
    }
}
