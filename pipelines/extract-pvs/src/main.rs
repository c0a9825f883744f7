//! 由 FreeSurfer 分割与皮层表面估计 ASL 分辨率上的组织 PV.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

mod result;
mod runner;

/// 默认的皮层表面估计程序.
const DEFAULT_CORTEX_CMD: &str = "estimate_cortex";

/// 由 FreeSurfer `aparc+aseg` 与皮层表面估计 ASL 分辨率上的 GM/WM/CSF 部分容积.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// FreeSurfer `aparc+aseg` 分割 (T1 空间).
    #[arg(long)]
    pub aparcseg: PathBuf,

    /// 左半球白质表面.
    #[arg(long, required_unless_present = "cortex_pvs")]
    pub lws: Option<PathBuf>,

    /// 左半球软脑膜表面.
    #[arg(long, required_unless_present = "cortex_pvs")]
    pub lps: Option<PathBuf>,

    /// 右半球白质表面.
    #[arg(long, required_unless_present = "cortex_pvs")]
    pub rws: Option<PathBuf>,

    /// 右半球软脑膜表面.
    #[arg(long, required_unless_present = "cortex_pvs")]
    pub rps: Option<PathBuf>,

    /// T1 结构像, 只使用其网格.
    #[arg(long)]
    pub t1: PathBuf,

    /// ASL 图像, 只使用其体素大小.
    #[arg(long)]
    pub asl: PathBuf,

    /// 输出路径. 不加 `--stack` 时写出 `*_GM`, `*_WM`, `*_CSF` 三个文件.
    #[arg(long)]
    pub out: PathBuf,

    /// 将三种组织堆叠为一个四维文件.
    #[arg(long)]
    pub stack: bool,

    /// 超采样倍数.
    #[arg(long = "super", default_value_t = 2)]
    pub superfactor: usize,

    /// 线程数, 默认使用 `$ASL_BERRY_CORES` 或全部核心.
    #[arg(long)]
    pub cores: Option<usize>,

    /// 使用参考网格上预先计算好的皮层 PV (四维 GM/WM/非脑组织), 不再运行表面估计.
    #[arg(long, conflicts_with = "cortex_cmd")]
    pub cortex_pvs: Option<PathBuf>,

    /// 皮层表面估计程序.
    #[arg(long, default_value = DEFAULT_CORTEX_CMD)]
    pub cortex_cmd: String,

    /// 将每种组织的中间轴位层写成 PNG 预览.
    #[arg(long)]
    pub preview: Option<PathBuf>,

    /// 输出调试日志.
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::init_logger(cli.verbose);

    let summary = runner::run(&cli)?;
    summary.report();
    Ok(())
}
