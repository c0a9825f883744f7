//! 多项式曲线.

use crate::{PvError, PvResult};
use nalgebra::{DMatrix, DVector};
use ndarray::ArrayView1;

/// 多项式, 系数按次数升序保存.
#[derive(Clone, Debug, PartialEq)]
pub struct Polynomial(Vec<f64>);

impl Polynomial {
    /// 由升序系数创建.
    #[inline]
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self(coefficients)
    }

    /// 升序系数.
    #[inline]
    pub fn coefficients(&self) -> &[f64] {
        &self.0
    }

    /// 常数项.
    #[inline]
    pub fn intercept(&self) -> f64 {
        self.0.first().copied().unwrap_or(0.0)
    }

    /// 在 `x` 处求值 (Horner).
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        self.0.iter().rev().fold(0.0, |acc, &cur| acc * x + cur)
    }
}

pub(crate) struct PolyImp<'a> {
    x: ArrayView1<'a, f64>,
    y: ArrayView1<'a, f64>,
    degree: u32,
}

impl<'a> PolyImp<'a> {
    /// `degree` 是多项式次数. 含 NaN 的点会被跳过.
    pub fn new(x: ArrayView1<'a, f64>, y: ArrayView1<'a, f64>, degree: u32) -> PvResult<Self> {
        if x.len() != y.len() {
            return Err(PvError::Configuration(format!(
                "x and y must have the same length, got {} and {}",
                x.len(),
                y.len()
            )));
        }
        if degree == 0 {
            return Err(PvError::Configuration(
                "polynomial degree must be at least 1".to_string(),
            ));
        }
        Ok(Self { x, y, degree })
    }

    /// 最小二乘拟合: 求解正规方程 `VᵀV θ = Vᵀy`.
    pub fn fit(&self) -> PvResult<Polynomial> {
        let points: Vec<(f64, f64)> = self
            .x
            .iter()
            .zip(self.y.iter())
            .filter(|(x, y)| !x.is_nan() && !y.is_nan())
            .map(|(x, y)| (*x, *y))
            .collect();
        let n = self.degree as usize + 1;
        if points.len() < n {
            return Err(PvError::Configuration(format!(
                "fitting a degree {} polynomial needs at least {n} valid points, got {}",
                self.degree,
                points.len()
            )));
        }

        let v_mat = self.vandermonde(&points);
        let y = DVector::from_iterator(points.len(), points.iter().map(|p| p.1));
        let v_mat_t = v_mat.transpose();
        let theta = (&v_mat_t * &v_mat)
            .try_inverse()
            .ok_or_else(|| {
                PvError::Configuration("singular normal equations in polynomial fit".to_string())
            })?
            * (v_mat_t * y);

        debug_assert_eq!(theta.len(), n);
        Ok(Polynomial(theta.iter().copied().collect()))
    }

    fn vandermonde(&self, points: &[(f64, f64)]) -> DMatrix<f64> {
        // shape: (m, n); m = points.len(), n = self.degree + 1
        DMatrix::from_fn(points.len(), self.degree as usize + 1, |m, n| {
            points[m].0.powi(n as i32)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    #[test]
    fn test_exact_line() {
        let x = Array1::range(0.0, 10.0, 1.0);
        let y = x.mapv(|v| 3.0 - 0.5 * v);
        let p = PolyImp::new(x.view(), y.view(), 1).unwrap().fit().unwrap();
        assert!((p.intercept() - 3.0).abs() < 1e-9);
        assert!((p.coefficients()[1] + 0.5).abs() < 1e-9);
        assert!((p.eval(4.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_quadratic_and_nan() {
        let x = Array1::range(-3.0, 4.0, 1.0);
        let mut y = x.mapv(|v| 1.0 + 2.0 * v + v * v);
        y[2] = f64::NAN;
        let p = PolyImp::new(x.view(), y.view(), 2).unwrap().fit().unwrap();
        for (c, e) in p.coefficients().iter().zip([1.0, 2.0, 1.0]) {
            assert!((c - e).abs() < 1e-8);
        }
    }

    #[test]
    fn test_invalid_input() {
        let x = Array1::from(vec![0.0, 1.0]);
        let y = Array1::from(vec![0.0]);
        assert!(PolyImp::new(x.view(), y.view(), 1).is_err());
        let y = Array1::from(vec![0.0, f64::NAN]);
        assert!(PolyImp::new(x.view(), y.view(), 1).unwrap().fit().is_err());
        assert!(PolyImp::new(x.view(), x.view(), 0).is_err());
    }
}
