//! 三组织部分容积图.

use crate::consts::pv::{CLEANUP_MIN_FLOOR, CLEANUP_NOISE};
use crate::{Idx3d, InvariantViolation, PvError, PvResult, TissueClass, Violation};
use ndarray::{s, Array3, Array4, ArrayBase, ArrayView3, ArrayViewMut3, Data, FoldWhile, Ix4, Zip};

/// 同一网格上的 GM, WM, CSF 三个部分容积分数图.
///
/// 经过融合与归一化后, 每个体素三者之和为 1, 且都位于 `[0, 1]` 内.
#[derive(Debug, Clone, PartialEq)]
pub struct PvField {
    gm: Array3<f64>,
    wm: Array3<f64>,
    csf: Array3<f64>,
}

impl PvField {
    /// 由三张形状一致的分数图创建.
    ///
    /// 形状不一致时返回 `Err(PvError::GridMismatch)`.
    pub fn new(gm: Array3<f64>, wm: Array3<f64>, csf: Array3<f64>) -> PvResult<Self> {
        for other in [&wm, &csf] {
            if other.shape() != gm.shape() {
                return Err(PvError::GridMismatch {
                    expected: gm.shape().to_vec(),
                    found: other.shape().to_vec(),
                });
            }
        }
        Ok(Self { gm, wm, csf })
    }

    /// 全部体素为 `(0, 0, 0)`.
    pub fn zeros(shape: Idx3d) -> Self {
        Self {
            gm: Array3::zeros(shape),
            wm: Array3::zeros(shape),
            csf: Array3::zeros(shape),
        }
    }

    /// 全部体素为纯 CSF, 即 `(0, 0, 1)`.
    pub fn pure_csf(shape: Idx3d) -> Self {
        let mut ans = Self::zeros(shape);
        ans.csf.fill(1.0);
        ans
    }

    /// 由最后一维为 GM, WM, CSF 三通道的数组创建.
    ///
    /// 最后一维长度不为 3 时返回 `Err(PvError::Configuration)`.
    pub fn from_stacked<A, S>(stacked: &ArrayBase<S, Ix4>) -> PvResult<Self>
    where
        A: Copy + Into<f64>,
        S: Data<Elem = A>,
    {
        if stacked.shape()[3] != 3 {
            return Err(PvError::Configuration(format!(
                "stacked PV volume must have 3 channels, found shape {:?}",
                stacked.shape()
            )));
        }
        let channel = |c: usize| stacked.slice(s![.., .., .., c]).mapv(Into::into);
        Ok(Self {
            gm: channel(0),
            wm: channel(1),
            csf: channel(2),
        })
    }

    /// 沿最后一维堆叠为 GM, WM, CSF 三通道数组.
    pub fn to_stacked(&self) -> Array4<f64> {
        let (x, y, z) = self.shape();
        let mut out = Array4::zeros((x, y, z, 3));
        for t in TissueClass::ALL {
            out.slice_mut(s![.., .., .., t.channel()])
                .assign(&self.get(t));
        }
        out
    }

    /// 数据形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.gm.dim()
    }

    /// 获取某种组织的分数图.
    #[inline]
    pub fn get(&self, tissue: TissueClass) -> ArrayView3<'_, f64> {
        match tissue {
            TissueClass::Gm => self.gm.view(),
            TissueClass::Wm => self.wm.view(),
            TissueClass::Csf => self.csf.view(),
        }
    }

    /// 获取某种组织的可变分数图.
    #[inline]
    pub fn get_mut(&mut self, tissue: TissueClass) -> ArrayViewMut3<'_, f64> {
        match tissue {
            TissueClass::Gm => self.gm.view_mut(),
            TissueClass::Wm => self.wm.view_mut(),
            TissueClass::Csf => self.csf.view_mut(),
        }
    }

    /// 单个体素的 `(GM, WM, CSF)`.
    ///
    /// 索引越界时 panic.
    #[inline]
    pub fn voxel(&self, pos: Idx3d) -> [f64; 3] {
        [self.gm[pos], self.wm[pos], self.csf[pos]]
    }

    /// 设置单个体素的 `(GM, WM, CSF)`.
    ///
    /// 索引越界时 panic.
    #[inline]
    pub fn set_voxel(&mut self, pos: Idx3d, [g, w, c]: [f64; 3]) {
        self.gm[pos] = g;
        self.wm[pos] = w;
        self.csf[pos] = c;
    }

    /// 对每个体素的 `[GM, WM, CSF]` 原地执行 `f`.
    pub fn map_inplace<F>(&mut self, f: F)
    where
        F: Fn(&mut [f64; 3]) + Sync + Send,
    {
        let zip = Zip::from(&mut self.gm)
            .and(&mut self.wm)
            .and(&mut self.csf);
        let apply = |g: &mut f64, w: &mut f64, c: &mut f64| {
            let mut v = [*g, *w, *c];
            f(&mut v);
            [*g, *w, *c] = v;
        };
        cfg_if::cfg_if! {
            if #[cfg(feature = "rayon")] {
                zip.par_for_each(apply);
            } else {
                zip.for_each(apply);
            }
        }
    }

    /// 按体素顺序找到第一个满足 `pred` 的体素.
    fn find_voxel<F>(&self, pred: F) -> Option<(Idx3d, [f64; 3])>
    where
        F: Fn(&[f64; 3]) -> bool,
    {
        Zip::indexed(&self.gm)
            .and(&self.wm)
            .and(&self.csf)
            .fold_while(None, |_, idx, g, w, c| {
                let v = [*g, *w, *c];
                if pred(&v) {
                    FoldWhile::Done(Some((idx, v)))
                } else {
                    FoldWhile::Continue(None)
                }
            })
            .into_inner()
    }

    /// 检查划分不变量: 每个体素三者之和与 1 的偏差不超过 `tol`,
    /// 各分量大于 `-tol` 且小于 `1 + tol`.
    ///
    /// 依次检查求和, 负值, 过大值; 返回第一个被破坏的不变量及体素.
    #[allow(clippy::neg_cmp_op_on_partial_ord)]
    pub fn check_partition(&self, tol: f64) -> PvResult<()> {
        // 写成 "不满足" 的形式, NaN 在每一项上都判为违反.
        let checks: [(Violation, &dyn Fn(&[f64; 3]) -> bool); 3] = [
            (Violation::Sum, &|v: &[f64; 3]| !((v.iter().sum::<f64>() - 1.0).abs() < tol)),
            (Violation::Negative, &|v: &[f64; 3]| v.iter().any(|x| !(*x > -tol))),
            (Violation::Large, &|v: &[f64; 3]| v.iter().any(|x| !(*x < 1.0 + tol))),
        ];
        for (kind, pred) in checks {
            if let Some((voxel, value)) = self.find_voxel(pred) {
                return Err(PvError::FusionInvariant(InvariantViolation {
                    kind,
                    voxel,
                    value,
                }));
            }
        }
        Ok(())
    }

    /// 检查所有分量都是有限值, 否则返回第一个含 NaN 或无穷大的体素.
    pub fn check_finite(&self) -> PvResult<()> {
        match self.find_voxel(|v| v.iter().any(|x| !x.is_finite())) {
            Some((voxel, value)) => Err(PvError::FusionInvariant(InvariantViolation {
                kind: Violation::NonFinite,
                voxel,
                value,
            })),
            None => Ok(()),
        }
    }

    /// 负分量置 0. NaN 保持不变.
    pub fn clamp_negative(&mut self) {
        self.map_inplace(|v| v.iter_mut().filter(|x| **x < 0.0).for_each(|x| *x = 0.0));
    }

    /// 每个体素除以三者之和. 和为 0 的体素保持不变.
    pub fn renormalize(&mut self) {
        self.map_inplace(|v| {
            let sum: f64 = v.iter().sum();
            if sum > 0.0 {
                v.iter_mut().for_each(|x| *x /= sum);
            }
        });
    }

    /// 所有分量中的最小值.
    pub fn min(&self) -> f64 {
        [&self.gm, &self.wm, &self.csf]
            .iter()
            .flat_map(|a| a.iter())
            .fold(f64::INFINITY, |m, v| m.min(*v))
    }

    /// 所有分量中的最大值.
    pub fn max(&self) -> f64 {
        [&self.gm, &self.wm, &self.csf]
            .iter()
            .flat_map(|a| a.iter())
            .fold(f64::NEG_INFINITY, |m, v| m.max(*v))
    }

    /// 某种组织在所有体素上的总和 (以体素为单位的体积).
    #[inline]
    pub fn total(&self, tissue: TissueClass) -> f64 {
        self.get(tissue).sum()
    }

    /// 浮点噪声清理: 若所有分量的最小值大于 `CLEANUP_MIN_FLOOR`,
    /// 则把小于 `CLEANUP_NOISE` 的分量置 0. 返回是否执行了清理.
    ///
    /// 注意: 当存在精确为 0 的分量时不做任何处理.
    pub fn squash_noise(&mut self) -> bool {
        if self.min() > CLEANUP_MIN_FLOOR {
            self.map_inplace(|v| {
                v.iter_mut()
                    .filter(|x| **x < CLEANUP_NOISE)
                    .for_each(|x| *x = 0.0)
            });
            true
        } else {
            false
        }
    }
}
