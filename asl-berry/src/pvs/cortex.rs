//! 皮层表面 PV 估计器.
//!
//! 皮层 PV 由基于表面的外部工具在参考网格上估计, 这里只定义接口与两种接入方式.

use crate::data::{check_shape, into_4d, read_volume_f64, write_volume};
use crate::{PvError, PvField, PvResult, VoxelGrid};
use log::{debug, info};
use ndarray::Array3;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// 在参考网格上估计皮层 GM/WM/非脑组织 PV.
pub trait CortexEstimator {
    /// 返回形状与 `reference` 一致的三组织 PV 图.
    fn estimate(&self, reference: &VoxelGrid) -> PvResult<PvField>;
}

impl<F> CortexEstimator for F
where
    F: Fn(&VoxelGrid) -> PvResult<PvField>,
{
    #[inline]
    fn estimate(&self, reference: &VoxelGrid) -> PvResult<PvField> {
        self(reference)
    }
}

/// 左右半球的白质表面与软脑膜表面.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surfaces {
    /// 左白质表面.
    pub lws: PathBuf,
    /// 左软脑膜表面.
    pub lps: PathBuf,
    /// 右白质表面.
    pub rws: PathBuf,
    /// 右软脑膜表面.
    pub rps: PathBuf,
}

impl Surfaces {
    /// 依次为 LWS, LPS, RWS, RPS.
    #[inline]
    pub fn as_array(&self) -> [&Path; 4] {
        [&self.lws, &self.lps, &self.rws, &self.rps].map(PathBuf::as_path)
    }
}

/// 从已有的四维 nii 文件 (最后一维为 GM, WM, 非脑组织) 读取皮层估计.
#[derive(Debug, Clone)]
pub struct PrecomputedCortex {
    path: PathBuf,
}

impl PrecomputedCortex {
    /// 使用 `path` 处的估计结果.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// 估计结果路径.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CortexEstimator for PrecomputedCortex {
    fn estimate(&self, reference: &VoxelGrid) -> PvResult<PvField> {
        info!("loading cortical PV estimate from {}", self.path.display());
        let (_, data) = read_volume_f64(&self.path)?;
        let data = into_4d(data)?;
        check_shape(reference, data.shape())?;
        PvField::from_stacked(&data)
    }
}

/// 调用外部程序估计皮层 PV.
///
/// 在临时目录中写出参考网格 `ref.nii.gz`, 以
/// `<program> <ref.nii.gz> <LWS> <LPS> <RWS> <RPS> <out.nii.gz>`
/// 的形式运行, 成功后读取 `out.nii.gz`.
#[derive(Debug, Clone)]
pub struct CommandCortex {
    program: OsString,
    surfaces: Surfaces,
    cores: usize,
}

impl CommandCortex {
    /// 线程数 `cores` 通过环境变量 `ASL_BERRY_CORES` 传给外部程序.
    pub fn new<S: Into<OsString>>(program: S, surfaces: Surfaces, cores: usize) -> Self {
        Self {
            program: program.into(),
            surfaces,
            cores,
        }
    }
}

impl CortexEstimator for CommandCortex {
    fn estimate(&self, reference: &VoxelGrid) -> PvResult<PvField> {
        let dir = tempfile::tempdir()?;
        let ref_path = dir.path().join("ref.nii.gz");
        let out_path = dir.path().join("out.nii.gz");
        write_volume(&ref_path, reference, &Array3::<f32>::zeros(reference.shape()))?;

        let mut cmd = Command::new(&self.program);
        cmd.arg(&ref_path)
            .args(self.surfaces.as_array())
            .arg(&out_path)
            .env("ASL_BERRY_CORES", self.cores.to_string());
        debug!("running {cmd:?}");

        let program = self.program.to_string_lossy();
        let output = cmd
            .output()
            .map_err(|e| PvError::External(format!("cannot run `{program}`: {e}")))?;
        if !output.status.success() {
            return Err(PvError::External(format!(
                "`{program}` exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !out_path.exists() {
            return Err(PvError::External(format!(
                "`{program}` did not write {}",
                out_path.display()
            )));
        }
        PrecomputedCortex::new(out_path).estimate(reference)
    }
}
