//! 运行时错误.

use crate::Idx3d;
use std::fmt::{self, Display, Formatter};

/// PV 估计与 MT 估计的运行时错误.
#[derive(Debug)]
pub enum PvError {
    /// 参数配置错误, 例如块大小向量长度与数组维数不一致, 或块大小为 0.
    Configuration(String),

    /// 第 `axis` 维长度 `len` 不能被块大小 `block` 整除.
    Shape {
        /// 出错的维度.
        axis: usize,
        /// 该维度的长度.
        len: usize,
        /// 该维度的块大小.
        block: usize,
    },

    /// 组织 PV 融合后不满足划分不变量. 这代表逻辑错误或输入 PV 非法, 不可恢复.
    FusionInvariant(InvariantViolation),

    /// 本应位于同一网格上的数据形状不一致.
    GridMismatch {
        /// 期望形状.
        expected: Vec<usize>,
        /// 实际形状.
        found: Vec<usize>,
    },

    /// 读写 nifti 文件错误.
    Nifti(nifti::NiftiError),

    /// 写 npy 文件错误.
    Npy(String),

    /// 写预览图错误.
    Image(image::ImageError),

    /// 其他底层 I/O 错误.
    Io(std::io::Error),

    /// 外部协作程序 (例如皮层 PV 估计器) 运行失败.
    External(String),
}

/// 违反的具体不变量.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Violation {
    /// 三个组织分量之和不为 1.
    Sum,

    /// 出现负的分量.
    Negative,

    /// 出现大于 1 的分量.
    Large,

    /// 输入中出现 NaN 或无穷大.
    NonFinite,
}

/// 融合不变量被破坏的第一个体素.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InvariantViolation {
    /// 不变量种类.
    pub kind: Violation,

    /// 体素位置.
    pub voxel: Idx3d,

    /// 该体素的 (GM, WM, CSF).
    pub value: [f64; 3],
}

/// 运行时结果.
pub type PvResult<T> = Result<T, PvError>;

impl Display for Violation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Violation::Sum => "voxel PVs do not sum to 1",
            Violation::Negative => "negative PV found",
            Violation::Large => "large PV found",
            Violation::NonFinite => "non-finite PV found",
        })
    }
}

impl Display for PvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PvError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            PvError::Shape { axis, len, block } => write!(
                f,
                "shape error: axis {axis} of length {len} is not divisible by block size {block}"
            ),
            PvError::FusionInvariant(v) => write!(
                f,
                "fusion invariant violated: {} at voxel {:?}, (GM, WM, CSF) = {:?}",
                v.kind, v.voxel, v.value
            ),
            PvError::GridMismatch { expected, found } => {
                write!(f, "grid mismatch: expected {expected:?}, found {found:?}")
            }
            PvError::Nifti(e) => write!(f, "nifti error: {e}"),
            PvError::Npy(msg) => write!(f, "npy error: {msg}"),
            PvError::Image(e) => write!(f, "image error: {e}"),
            PvError::Io(e) => write!(f, "I/O error: {e}"),
            PvError::External(msg) => write!(f, "external estimator error: {msg}"),
        }
    }
}

impl std::error::Error for PvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PvError::Nifti(e) => Some(e),
            PvError::Image(e) => Some(e),
            PvError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<nifti::NiftiError> for PvError {
    #[inline]
    fn from(e: nifti::NiftiError) -> Self {
        PvError::Nifti(e)
    }
}

impl From<std::io::Error> for PvError {
    #[inline]
    fn from(e: std::io::Error) -> Self {
        PvError::Io(e)
    }
}

impl From<image::ImageError> for PvError {
    #[inline]
    fn from(e: image::ImageError) -> Self {
        PvError::Image(e)
    }
}

impl From<ndarray_npy::WriteNpyError> for PvError {
    #[inline]
    fn from(e: ndarray_npy::WriteNpyError) -> Self {
        PvError::Npy(e.to_string())
    }
}
