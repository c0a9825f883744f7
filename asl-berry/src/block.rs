//! 分块求和.
//!
//! 将 n 维数组沿每个轴划分为互不重叠的连续块, 并对每块求和. 常用于把超采样的
//! 0/1 掩膜 (或概率掩膜) 降采样为目标分辨率上的部分容积分数.

use crate::{PvError, PvResult};
use ndarray::{Array, ArrayBase, Data, Dimension, Zip};

/// 检查块大小并计算输出形状.
///
/// - `block.len()` 与数组维数不一致, 或存在为 0 的块大小时, 返回 `PvError::Configuration`;
/// - 某一维长度不能被对应块大小整除时, 返回 `PvError::Shape`.
fn checked_out_dim<D: Dimension>(dim: &D, block: &[usize]) -> PvResult<D> {
    if block.len() != dim.ndim() {
        return Err(PvError::Configuration(format!(
            "block size vector has length {}, but array has {} dimensions",
            block.len(),
            dim.ndim()
        )));
    }
    if block.iter().any(|b| *b == 0) {
        return Err(PvError::Configuration(format!(
            "block sizes must be positive integers, got {block:?}"
        )));
    }

    let mut out = dim.clone();
    for (axis, (len, b)) in out.slice_mut().iter_mut().zip(block).enumerate() {
        if *len % *b != 0 {
            return Err(PvError::Shape {
                axis,
                len: *len,
                block: *b,
            });
        }
        *len /= *b;
    }
    Ok(out)
}

/// 对 `array` 按照块大小 `block` 分块求和.
///
/// 输出形状为输入形状逐维除以块大小. 输出所有元素之和等于输入所有元素之和.
///
/// # 返回值
///
/// - 当 `block.len()` 与维数不一致, 或存在为 0 的块大小时, 返回 `Err(PvError::Configuration)`;
/// - 当某一维不能被整除时, 返回 `Err(PvError::Shape)`, 而不是静默截断.
pub fn sum_blocks<A, S, D>(array: &ArrayBase<S, D>, block: &[usize]) -> PvResult<Array<A, D>>
where
    A: num::Float + Send + Sync,
    S: Data<Elem = A>,
    D: Dimension,
{
    let out_dim = checked_out_dim(&array.raw_dim(), block)?;

    let mut chunk = D::zeros(array.ndim());
    chunk.slice_mut().copy_from_slice(block);

    let mut out = Array::<A, D>::zeros(out_dim);
    let zip = Zip::from(&mut out).and(array.exact_chunks(chunk));

    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            zip.par_for_each(|o, c| *o = c.sum());
        } else {
            zip.for_each(|o, c| *o = c.sum());
        }
    }
    Ok(out)
}

/// 对 `array` 按照块大小 `block` 分块求平均值, 即块和除以块内元素个数.
///
/// 错误条件同 [`sum_blocks`].
pub fn mean_blocks<A, S, D>(array: &ArrayBase<S, D>, block: &[usize]) -> PvResult<Array<A, D>>
where
    A: num::Float + Send + Sync,
    S: Data<Elem = A>,
    D: Dimension,
{
    let mut out = sum_blocks(array, block)?;
    let count = block.iter().product::<usize>();
    let count = A::from(count).ok_or_else(|| {
        PvError::Configuration(format!("block volume {count} is not representable"))
    })?;
    out.mapv_inplace(|v| v / count);
    Ok(out)
}
