//! 数据路径约定.

use std::env;
use std::path::{Path, PathBuf};

/// HCP 受试者根目录环境变量.
pub const HCP_DIR_ENV: &str = "HCP_DIR";

/// 获取 HCP Aging 受试者根目录.
///
/// 1. 若环境变量 `$HCP_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/Documents/Data/HCP_data/Aging`;
/// 3. 找不到主目录时返回 `None`.
pub fn hcp_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var(HCP_DIR_ENV) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => dirs::home_dir().map(|h| h.join("Documents").join("Data").join("HCP_data").join("Aging")),
    }
}

/// MT 估计结果目录: `<root>/MTEstimation`.
pub fn mt_output_dir<P: AsRef<Path>>(root: P) -> PathBuf {
    root.as_ref().join("MTEstimation")
}

/// 标定图像对应的缩放因子图路径: `<parent>/MTEstimation/MTcorr_SFs_{tissue}.nii.gz`.
pub fn scaling_factor_path<P: AsRef<Path>>(calib: P, tissue: &str) -> PathBuf {
    let parent = calib.as_ref().parent().unwrap_or_else(|| Path::new("."));
    mt_output_dir(parent).join(format!("MTcorr_SFs_{tissue}.nii.gz"))
}
