//! 曲线拟合.
//!
//! 给定一系列点 `(x, y)`, 该模块可以拟合出一条多项式曲线.

use crate::PvResult;
use ndarray::ArrayView1;

mod polynomial;

pub use polynomial::Polynomial;

type VecPair<T> = (Vec<T>, Vec<T>);

/// 基于最小二乘法拟合 n 次多项式.
///
/// `x` 是自变量数组, `y` 是对应函数值, `degree` 是多项式次数 (最小为 1).
/// 含 NaN 的点不参与拟合.
pub fn polyfit<'a>(x: ArrayView1<'a, f64>, y: ArrayView1<'a, f64>, degree: u32) -> PvResult<Polynomial> {
    polynomial::PolyImp::new(x, y, degree)?.fit()
}

/// 在 `[start, start + step * points)` 上等距采样 `points` 个点并求值.
pub fn sample_curve(poly: &Polynomial, start: f64, step: f64, points: usize) -> VecPair<f64> {
    (0..points)
        .map(|i| {
            let x = start + step * i as f64;
            (x, poly.eval(x))
        })
        .unzip()
}
