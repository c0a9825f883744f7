//! 多频带标定图像的 MT (磁化传递) 层间偏差估计.
//!
//! 多频带采集中, 同一频带内不同层的采集时间不同, 而 MT 效应随层序变化.
//! 估计流程:
//!
//! 1. 对每幅已被组织掩膜的标定图像做层时间校正 ([`slicetime_correction`]);
//! 2. 逐层求非零体素均值, 再在图像之间求忽略 NaN 的均值;
//! 3. 对中间四个频带做线性回归 ([`fit_linear_model`]), 得到每层的缩放因子.
//!
//! 扫描参数 (6 个频带, 每频带 10 层, 层间隔 0.059 秒) 见 [`crate::consts::mt`].

mod estimate;
mod model;
mod slicetime;

pub use estimate::{estimate_mt, nan_mean_columns, slice_means, CalibInput, MtConfig, MtEstimate};
pub use model::{fit_linear_model, LinearFit};
pub use slicetime::{slicetime_correction, slicetime_scale, undo_slicetime_correction};

use std::fmt::{self, Display, Formatter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 用于估计 MT 效应的组织掩膜.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MtTissue {
    /// 白质.
    Wm,

    /// 灰质.
    Gm,

    /// 脑脊液.
    Csf,

    /// 灰质与白质分别校正后相加.
    Combined,
}

impl MtTissue {
    /// 所有组织.
    pub const ALL: [MtTissue; 4] = [MtTissue::Wm, MtTissue::Gm, MtTissue::Csf, MtTissue::Combined];

    /// 小写名称, 用于文件名.
    pub const fn name(&self) -> &'static str {
        match self {
            MtTissue::Wm => "wm",
            MtTissue::Gm => "gm",
            MtTissue::Csf => "csf",
            MtTissue::Combined => "combined",
        }
    }

    /// 纵向弛豫时间 T1 (秒). `Combined` 没有单一的 T1.
    pub const fn t1(&self) -> Option<f64> {
        match self {
            MtTissue::Wm => Some(1.0),
            MtTissue::Gm => Some(1.3),
            MtTissue::Csf => Some(4.3),
            MtTissue::Combined => None,
        }
    }

    /// 按名称解析, 不区分大小写.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }
}

impl Display for MtTissue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 线性模型的拟合方式.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MtMethod {
    /// 中间四个频带各自拟合.
    #[default]
    Separate,

    /// 中间四个频带逐层平均后拟合一次.
    Together,
}

impl MtMethod {
    /// 小写名称.
    pub const fn name(&self) -> &'static str {
        match self {
            MtMethod::Separate => "separate",
            MtMethod::Together => "together",
        }
    }
}

impl Display for MtMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
