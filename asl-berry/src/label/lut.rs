//! FreeSurfer 查找表.
//!
//! 精确匹配表优先, 其次按顺序匹配数值区间表.

use super::{LabelClass, Structure, TissueClass};
use crate::consts::fs;
use std::ops::Range;

/// 精确匹配表. 不在表中时返回 `None`.
pub(super) const fn exact(code: i32) -> Option<LabelClass> {
    use LabelClass::{Structure as S, Tissue as T};
    use Structure::*;
    use TissueClass::*;

    let class = match code {
        // 左半球
        fs::LEFT_CEREBRAL_WHITE_MATTER => T(Wm),
        fs::LEFT_CEREBRAL_CORTEX => T(Gm),
        fs::LEFT_LATERAL_VENTRICLE | fs::LEFT_INF_LAT_VENT => T(Csf),
        26 => S(LAccu),
        18 => S(LAmyg),
        fs::LEFT_CAUDATE => S(LCaud),
        17 => S(LHipp),
        13 => S(LPall),
        12 => S(LPuta),
        fs::LEFT_THALAMUS | fs::LEFT_THALAMUS_PROPER => S(LThal),

        // 中线与脑室
        fs::UNKNOWN | fs::THIRD_VENTRICLE | fs::FOURTH_VENTRICLE | 24 => T(Csf),
        77..=79 => T(Wm),

        // 右半球
        41 => T(Wm),
        42 => T(Gm),
        43 | 44 => T(Csf),
        58 => S(RAccu),
        54 => S(RAmyg),
        50 => S(RCaud),
        53 => S(RHipp),
        52 => S(RPall),
        51 => S(RPuta),
        48 | 49 => S(RThal),

        _ => return None,
    };
    Some(class)
}

/// `aparc` 分区的数值区间表, 按顺序匹配.
pub(super) const RANGES: [(Range<i32>, TissueClass); 3] = [
    (fs::CORPUS_CALLOSUM, TissueClass::Wm),
    (fs::CORTICAL_PARCELS, TissueClass::Gm),
    (fs::WHITE_MATTER_PARCELS, TissueClass::Wm),
];

/// 不需要报告的未识别标签: 小脑 (6, 7, 8, 45, 46, 47) 与脑干 (16).
pub(super) const IGNORE: [i32; 7] = [6, 7, 8, 45, 46, 47, fs::BRAIN_STEM];
