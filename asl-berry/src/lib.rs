#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供 ASL 灌注成像中部分容积 (partial volume, PV) 估计与组织图融合,
//! 以及多频带标定图像 MT 层间偏差估计的基础数据结构和算法.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 所有体数据都按照 NIfTI header 仿射矩阵的体素轴顺序 `[i, j, k]` 访问,
//!   有通道时通道位于最后一维. 这与 `nifti` crate 读出的逻辑顺序一致.
//! 2. 输入的分割标签遵循 FreeSurfer 的 `aparc+aseg` 查找表.
//! 3. 组织 PV 融合中任何不变量被破坏都会以 [`PvError::FusionInvariant`]
//!   终止整个流程, 不会写出部分结果.
//!
//! # 开发计划
//!
//! ### 标签分类 ✅
//!
//! FreeSurfer 标签 -> GM/WM/CSF 或皮层下结构名. 固定查找表 + 有序数值区间表.
//!
//! 实现位于 `asl-berry/src/label`.
//!
//! ### 分块求和降采样 ✅
//!
//! 将超采样的掩膜按整数块大小求和, 得到抗锯齿的部分容积分数.
//!
//! 实现位于 `asl-berry/src/block.rs`.
//!
//! ### 体素网格与仿射重采样 ✅
//!
//! 1. 体素网格按比例缩放 (round/floor/ceil 三种取整模式), 视野 (FoV) 保持不变. ✅
//! 2. 一阶 (三线性) 与零阶 (最近邻) 仿射重采样, 借助 `rayon` 按平面并行. ✅
//!
//! 实现位于 `asl-berry/src/data/grid.rs` 与 `asl-berry/src/resample`.
//!
//! ### 体积 PV 与皮层下结构 PV ✅
//!
//! 实现位于 `asl-berry/src/pvs/{volumetric, subcortical}.rs`.
//!
//! ### 组织图融合 (`stack_images`) ✅
//!
//! 皮层表面估计优先, 再补回脑室 CSF, 最后叠加皮层下灰质结构.
//!
//! 实现位于 `asl-berry/src/pvs/fusion.rs`.
//!
//! ### 完整流程 (`extract_fs_pvs`) ✅
//!
//! 实现位于 `asl-berry/src/pvs/extract.rs`.
//!
//! ### MT 层间偏差估计 ✅
//!
//! 层时间校正, 逐频带线性回归, 缩放因子图.
//!
//! 1. 撤销层时间校正 (`undo_slicetime_correction`) 的意图尚不明确,
//!   目前只作为可选步骤提供. ⌛️
//!
//! 实现位于 `asl-berry/src/mt`.

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub mod block;
pub mod consts;
pub mod data;
mod error;
pub mod fitting;
pub mod label;
pub mod mt;
pub mod prelude;
pub mod pvs;
pub mod resample;

pub use data::{LabelVolume, PvField, Rounding, VoxelGrid};
pub use label::TissueClass;
pub use error::{InvariantViolation, PvError, PvResult, Violation};
