//! 工具程序依赖的通用组件.

use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::env;

pub mod loader;

const SEP: &str = "--------------------------------------------------------";

/// 线程数环境变量.
pub const CORES_ENV: &str = "ASL_BERRY_CORES";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 简单分隔线.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) -> std::io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 获取工作线程数.
///
/// 1. 若环境变量 `$ASL_BERRY_CORES` 是正整数, 则返回其值;
/// 2. 否则, 返回 [`cpus`].
pub fn cores_from_env_or_all() -> usize {
    env::var(CORES_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(cpus)
}

/// 初始化日志. `verbose` 为真时输出 `debug` 级别.
///
/// 重复初始化会被忽略.
pub fn init_logger(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if SimpleLogger::new().with_level(level).init().is_err() {
        log::debug!("logger already initialized");
    }
}
