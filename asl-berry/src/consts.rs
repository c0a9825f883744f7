//! 通用常量.

/// 组织 PV 融合与清理相关的数值门限.
pub mod pv {
    /// 皮层 GM 超过该值的体素被视为 "皮层可信", 不接受体积 CSF 的更新.
    pub const CORTEX_GM_THRESHOLD: f64 = 0.01;

    /// 体积 PV 中低于该值的 CSF 被视为重采样噪声而置零.
    pub const VOLUMETRIC_CSF_FLOOR: f64 = 1e-2;

    /// 体素三个组织分量之和偏离 1 的容许误差, 以及单个分量越过 `[0, 1]` 的容许误差.
    pub const PARTITION_TOLERANCE: f64 = 1e-6;

    /// 最终清理: 只有全局最小值大于该值时才会执行清理.
    pub const CLEANUP_MIN_FLOOR: f64 = 1e-9;

    /// 最终清理: 低于该值的分量被置零.
    pub const CLEANUP_NOISE: f64 = 1e-6;

    /// 默认超采样倍数.
    pub const DEFAULT_SUPERFACTOR: usize = 2;
}

/// FreeSurfer `aparc+aseg` 标签值.
pub mod fs {
    /// 背景 (按约定视为 CSF).
    pub const UNKNOWN: i32 = 0;

    /// 左侧脑白质.
    pub const LEFT_CEREBRAL_WHITE_MATTER: i32 = 2;

    /// 左侧大脑皮层.
    pub const LEFT_CEREBRAL_CORTEX: i32 = 3;

    /// 左侧脑室.
    pub const LEFT_LATERAL_VENTRICLE: i32 = 4;

    /// 左侧下侧脑室.
    pub const LEFT_INF_LAT_VENT: i32 = 5;

    /// 左侧丘脑.
    pub const LEFT_THALAMUS: i32 = 9;

    /// 左侧丘脑 (旧版本编码).
    pub const LEFT_THALAMUS_PROPER: i32 = 10;

    /// 左侧尾状核.
    pub const LEFT_CAUDATE: i32 = 11;

    /// 第三脑室.
    pub const THIRD_VENTRICLE: i32 = 14;

    /// 第四脑室.
    pub const FOURTH_VENTRICLE: i32 = 15;

    /// 脑干.
    pub const BRAIN_STEM: i32 = 16;

    /// 胼胝体编码区间 `[251, 256)`.
    pub const CORPUS_CALLOSUM: std::ops::Range<i32> = 251..256;

    /// 皮层分区编码区间 `[1000, 3000)`.
    pub const CORTICAL_PARCELS: std::ops::Range<i32> = 1000..3000;

    /// 皮层下白质分区编码区间 `[3000, 5000)`.
    pub const WHITE_MATTER_PARCELS: std::ops::Range<i32> = 3000..5000;
}

/// MT 估计所用的扫描参数.
pub mod mt {
    /// 多频带采集的频带个数.
    pub const BANDS: usize = 6;

    /// 每个频带内的层数.
    pub const SLICES_PER_BAND: usize = 10;

    /// 总层数.
    pub const SLICES: usize = BANDS * SLICES_PER_BAND;

    /// 频带内相邻两层的采集时间间隔 (秒).
    pub const SLICE_DT: f64 = 0.059;

    /// 参与线性拟合的频带 (中间四个).
    pub const FIT_BANDS: std::ops::Range<usize> = 1..5;
}
