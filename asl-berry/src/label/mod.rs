//! 分割标签分类.
//!
//! 将 FreeSurfer `aparc+aseg` 的标签值映射为粗粒度组织类型 (GM/WM/CSF)
//! 或具名的皮层下结构. 规则依次为:
//!
//! 1. 固定查找表精确匹配;
//! 2. 数值区间表: `[251, 256)` -> WM (胼胝体), `[1000, 3000)` -> GM (皮层分区),
//!   `[3000, 5000)` -> WM (皮层下白质分区);
//! 3. 其它标签均为未识别. 小脑和脑干标签虽然未识别, 但不会被报告.

mod lut;

use crate::LabelVolume;
use itertools::Itertools;
use log::warn;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 粗粒度组织类型. 三者互斥.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TissueClass {
    /// 灰质.
    Gm,

    /// 白质.
    Wm,

    /// 脑脊液 (及非脑组织).
    Csf,
}

impl TissueClass {
    /// 通道顺序: GM, WM, CSF.
    pub const ALL: [TissueClass; 3] = [TissueClass::Gm, TissueClass::Wm, TissueClass::Csf];

    /// 在 `(..., 3)` 组织数组中的通道下标.
    #[inline]
    pub const fn channel(&self) -> usize {
        match self {
            TissueClass::Gm => 0,
            TissueClass::Wm => 1,
            TissueClass::Csf => 2,
        }
    }

    /// 拆分输出时使用的文件名后缀.
    pub const fn suffix(&self) -> &'static str {
        match self {
            TissueClass::Gm => "GM",
            TissueClass::Wm => "WM",
            TissueClass::Csf => "CSF",
        }
    }
}

impl Display for TissueClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// 具名皮层下结构, 命名遵循 FSL FIRST 的惯例 (例如 `L_Caud`).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Structure {
    /// 左伏隔核.
    LAccu,
    /// 左杏仁核.
    LAmyg,
    /// 左尾状核.
    LCaud,
    /// 左海马.
    LHipp,
    /// 左苍白球.
    LPall,
    /// 左壳核.
    LPuta,
    /// 左丘脑.
    LThal,
    /// 右伏隔核.
    RAccu,
    /// 右杏仁核.
    RAmyg,
    /// 右尾状核.
    RCaud,
    /// 右海马.
    RHipp,
    /// 右苍白球.
    RPall,
    /// 右壳核.
    RPuta,
    /// 右丘脑.
    RThal,
}

impl Structure {
    /// 所有结构, 按 `Ord` 顺序排列.
    pub const ALL: [Structure; 14] = [
        Structure::LAccu,
        Structure::LAmyg,
        Structure::LCaud,
        Structure::LHipp,
        Structure::LPall,
        Structure::LPuta,
        Structure::LThal,
        Structure::RAccu,
        Structure::RAmyg,
        Structure::RCaud,
        Structure::RHipp,
        Structure::RPall,
        Structure::RPuta,
        Structure::RThal,
    ];

    /// FIRST 风格的结构名.
    pub const fn name(&self) -> &'static str {
        match self {
            Structure::LAccu => "L_Accu",
            Structure::LAmyg => "L_Amyg",
            Structure::LCaud => "L_Caud",
            Structure::LHipp => "L_Hipp",
            Structure::LPall => "L_Pall",
            Structure::LPuta => "L_Puta",
            Structure::LThal => "L_Thal",
            Structure::RAccu => "R_Accu",
            Structure::RAmyg => "R_Amyg",
            Structure::RCaud => "R_Caud",
            Structure::RHipp => "R_Hipp",
            Structure::RPall => "R_Pall",
            Structure::RPuta => "R_Puta",
            Structure::RThal => "R_Thal",
        }
    }
}

impl Display for Structure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 单个标签的分类结果.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LabelClass {
    /// 粗粒度组织.
    Tissue(TissueClass),

    /// 具名皮层下结构.
    Structure(Structure),

    /// 未识别.
    Unrecognized,
}

/// 未识别且不在忽略列表中的标签. 非致命, 仅用于提醒操作者.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct UnrecognizedLabel(pub i32);

impl Display for UnrecognizedLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "did not assign aseg/aparc label: {}", self.0)
    }
}

/// 对单个标签分类. 全函数, 未匹配时返回 [`LabelClass::Unrecognized`].
pub fn classify(code: i32) -> LabelClass {
    if let Some(class) = lut::exact(code) {
        return class;
    }
    lut::RANGES
        .iter()
        .find(|(range, _)| range.contains(&code))
        .map_or(LabelClass::Unrecognized, |(_, t)| LabelClass::Tissue(*t))
}

/// 标签是否在忽略列表中 (小脑和脑干).
#[inline]
pub fn is_ignored(code: i32) -> bool {
    lut::IGNORE.contains(&code)
}

/// 对整个标签体中每个不同的标签分类一次.
#[inline]
pub fn classify_volume(volume: &LabelVolume) -> ClassifiedLabels {
    ClassifiedLabels::from_labels(volume.labels())
}

/// 一个标签体中所有不同标签的分类汇总.
#[derive(Clone, Debug, Default)]
pub struct ClassifiedLabels {
    tissues: BTreeMap<i32, TissueClass>,
    structures: BTreeMap<Structure, Vec<i32>>,
    unrecognized: Vec<UnrecognizedLabel>,
}

impl ClassifiedLabels {
    /// 对 `labels` 中每个不同的值分类一次. 重复值会被忽略.
    ///
    /// 每个需要报告的未识别标签会以 `warn` 级别记录一次.
    pub fn from_labels<I: IntoIterator<Item = i32>>(labels: I) -> Self {
        let mut ans = Self::default();
        for code in labels.into_iter().sorted_unstable().dedup() {
            match classify(code) {
                LabelClass::Tissue(t) => {
                    ans.tissues.insert(code, t);
                }
                LabelClass::Structure(s) => ans.structures.entry(s).or_default().push(code),
                LabelClass::Unrecognized if is_ignored(code) => {}
                LabelClass::Unrecognized => {
                    let w = UnrecognizedLabel(code);
                    warn!("{w}");
                    ans.unrecognized.push(w);
                }
            }
        }
        ans
    }

    /// 被分类为 `class` 的所有标签, 升序.
    pub fn tissue_labels(&self, class: TissueClass) -> Vec<i32> {
        self.tissues
            .iter()
            .filter_map(|(code, t)| (*t == class).then_some(*code))
            .collect()
    }

    /// 出现过的皮层下结构及其对应的标签 (升序). 一个结构可能对应多个标签.
    #[inline]
    pub fn structures(&self) -> &BTreeMap<Structure, Vec<i32>> {
        &self.structures
    }

    /// 需要报告的未识别标签, 升序.
    #[inline]
    pub fn unrecognized(&self) -> &[UnrecognizedLabel] {
        &self.unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const CSF: LabelClass = LabelClass::Tissue(TissueClass::Csf);
    const GM: LabelClass = LabelClass::Tissue(TissueClass::Gm);
    const WM: LabelClass = LabelClass::Tissue(TissueClass::Wm);

    fn table() -> Vec<(i32, LabelClass)> {
        use Structure::*;
        let s = LabelClass::Structure;
        vec![
            (0, CSF),
            (2, WM),
            (3, GM),
            (4, CSF),
            (5, CSF),
            (9, s(LThal)),
            (10, s(LThal)),
            (11, s(LCaud)),
            (12, s(LPuta)),
            (13, s(LPall)),
            (14, CSF),
            (15, CSF),
            (17, s(LHipp)),
            (18, s(LAmyg)),
            (24, CSF),
            (26, s(LAccu)),
            (41, WM),
            (42, GM),
            (43, CSF),
            (44, CSF),
            (48, s(RThal)),
            (49, s(RThal)),
            (50, s(RCaud)),
            (51, s(RPuta)),
            (52, s(RPall)),
            (53, s(RHipp)),
            (54, s(RAmyg)),
            (58, s(RAccu)),
            (77, WM),
            (78, WM),
            (79, WM),
        ]
    }

    fn expected(code: i32) -> LabelClass {
        if let Some((_, c)) = table().into_iter().find(|(k, _)| *k == code) {
            c
        } else if (251..256).contains(&code) {
            WM
        } else if (1000..3000).contains(&code) {
            GM
        } else if (3000..5000).contains(&code) {
            WM
        } else {
            LabelClass::Unrecognized
        }
    }

    #[test]
    fn test_exact_table() {
        for (code, class) in table() {
            assert_eq!(classify(code), class, "label {code}");
        }
        assert_eq!(classify(0), CSF);
    }

    #[test]
    fn test_named_codes() {
        use crate::consts::fs;
        assert_eq!(classify(fs::UNKNOWN), CSF);
        assert_eq!(classify(fs::LEFT_CEREBRAL_WHITE_MATTER), WM);
        assert_eq!(classify(fs::LEFT_CEREBRAL_CORTEX), GM);
        assert_eq!(classify(fs::LEFT_LATERAL_VENTRICLE), CSF);
        assert_eq!(classify(fs::LEFT_INF_LAT_VENT), CSF);
        assert_eq!(classify(fs::THIRD_VENTRICLE), CSF);
        assert_eq!(classify(fs::FOURTH_VENTRICLE), CSF);
        assert_eq!(classify(fs::LEFT_CAUDATE), LabelClass::Structure(Structure::LCaud));
        assert_eq!(classify(fs::LEFT_THALAMUS), LabelClass::Structure(Structure::LThal));
        assert_eq!(classify(fs::LEFT_THALAMUS_PROPER), LabelClass::Structure(Structure::LThal));
        assert!(is_ignored(fs::BRAIN_STEM));
    }

    #[test]
    fn test_ranges() {
        assert_eq!(classify(250), LabelClass::Unrecognized);
        assert_eq!(classify(251), WM);
        assert_eq!(classify(255), WM);
        assert_eq!(classify(256), LabelClass::Unrecognized);
        assert_eq!(classify(999), LabelClass::Unrecognized);
        assert_eq!(classify(1000), GM);
        assert_eq!(classify(2999), GM);
        assert_eq!(classify(3000), WM);
        assert_eq!(classify(4999), WM);
        assert_eq!(classify(5000), LabelClass::Unrecognized);
        assert_eq!(classify(-1), LabelClass::Unrecognized);
    }

    #[test]
    fn test_random_labels() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..20_000 {
            let code = if rng.gen_bool(0.5) {
                rng.gen_range(-10..6000)
            } else {
                rng.gen()
            };
            assert_eq!(classify(code), expected(code), "label {code}");
        }
    }

    #[test]
    fn test_ignore_list() {
        for code in [6, 7, 8, 16, 45, 46, 47] {
            assert_eq!(classify(code), LabelClass::Unrecognized);
            assert!(is_ignored(code));
        }
        assert!(!is_ignored(0));
        assert!(!is_ignored(31));
    }

    #[test]
    fn test_classified_labels() {
        let c = ClassifiedLabels::from_labels([0, 0, 2, 3, 9, 10, 11, 16, 31, 1035, 31]);
        assert_eq!(c.tissue_labels(TissueClass::Csf), vec![0]);
        assert_eq!(c.tissue_labels(TissueClass::Wm), vec![2]);
        assert_eq!(c.tissue_labels(TissueClass::Gm), vec![3, 1035]);
        assert_eq!(c.structures()[&Structure::LThal], vec![9, 10]);
        assert_eq!(c.structures()[&Structure::LCaud], vec![11]);
        assert_eq!(c.structures().len(), 2);
        // 16 (脑干) 被忽略, 31 (脉络丛) 需要报告.
        assert_eq!(c.unrecognized(), &[UnrecognizedLabel(31)]);
    }

    #[test]
    fn test_structure_names() {
        assert_eq!(Structure::LCaud.to_string(), "L_Caud");
        assert_eq!(Structure::RThal.name(), "R_Thal");
        assert!(Structure::ALL.windows(2).all(|w| w[0] < w[1]));
    }
}
