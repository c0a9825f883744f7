//! 由组织掩膜后的多频带标定图像估计 MT 层间缩放因子.

use anyhow::{bail, Context, Result};
use asl_berry::prelude::*;
use clap::Parser;
use log::info;
use ndarray::Array3;
use nifti::NiftiHeader;
use std::fs;
use std::path::{Path, PathBuf};
use utils::loader;

fn parse_tissue(s: &str) -> Result<MtTissue, String> {
    MtTissue::from_name(s).ok_or_else(|| format!("unknown tissue `{s}`, expected wm, gm, csf or combined"))
}

fn parse_method(s: &str) -> Result<MtMethod, String> {
    match s.to_ascii_lowercase().as_str() {
        "separate" => Ok(MtMethod::Separate),
        "together" => Ok(MtMethod::Together),
        _ => Err(format!("unknown method `{s}`, expected separate or together")),
    }
}

/// 由组织掩膜后的多频带标定图像估计 MT 层间缩放因子.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// 组织: wm, gm, csf 或 combined.
    #[arg(long, value_parser = parse_tissue)]
    tissue: MtTissue,

    /// 单一组织掩膜后的标定图像.
    #[arg(required_unless_present = "gm")]
    calib: Vec<PathBuf>,

    /// `combined` 时 GM 掩膜后的标定图像.
    #[arg(long, num_args = 1.., requires = "wm")]
    gm: Vec<PathBuf>,

    /// `combined` 时 WM 掩膜后的标定图像, 与 `--gm` 一一对应.
    #[arg(long, num_args = 1.., requires = "gm")]
    wm: Vec<PathBuf>,

    /// 拟合方式: separate 或 together.
    #[arg(long, default_value = "separate", value_parser = parse_method)]
    method: MtMethod,

    /// 名义重复时间 (秒).
    #[arg(long, default_value_t = 8.0)]
    tr: f64,

    /// 预测曲线每个频带的采样点数.
    #[arg(long, default_value_t = 10_000)]
    resolution: usize,

    /// 对缩放因子撤销层时间校正.
    #[arg(long)]
    undo_slicetime: bool,

    /// 均值与拟合曲线的输出目录, 默认 `$HCP_DIR/MTEstimation`.
    #[arg(long)]
    out: Option<PathBuf>,

    /// 输出调试日志.
    #[arg(short, long)]
    verbose: bool,
}

/// 读取一幅三维标定图像及其头部. 缩放因子图沿用这个头部写出.
fn load_calib(path: &Path) -> Result<(NiftiHeader, Array3<f64>)> {
    let (header, data) = read_volume_f64(path).with_context(|| format!("cannot load {}", path.display()))?;
    let data = into_3d(data).with_context(|| format!("{} is not a 3D image", path.display()))?;
    Ok((header, data))
}

/// 组织输入, 返回每幅输入的 (缩放因子路径所依据的图像, 头部) 与估计输入.
fn collect_inputs(cli: &Cli) -> Result<(Vec<(PathBuf, NiftiHeader)>, Vec<CalibInput>)> {
    let mut refs = Vec::new();
    let mut inputs = Vec::new();
    if cli.tissue == MtTissue::Combined {
        if cli.gm.is_empty() || cli.gm.len() != cli.wm.len() {
            bail!("`combined` needs the same number of --gm and --wm images");
        }
        for (gm, wm) in cli.gm.iter().zip(cli.wm.iter()) {
            let (header, gm_data) = load_calib(gm)?;
            let (_, wm_data) = load_calib(wm)?;
            refs.push((gm.clone(), header));
            inputs.push(CalibInput::Combined {
                gm: gm_data,
                wm: wm_data,
            });
        }
    } else {
        if cli.calib.is_empty() {
            bail!("no calibration images given");
        }
        for p in cli.calib.iter() {
            let (header, data) = load_calib(p)?;
            refs.push((p.clone(), header));
            inputs.push(CalibInput::Single(data));
        }
    }
    Ok((refs, inputs))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::init_logger(cli.verbose);

    let out_dir = match &cli.out {
        Some(d) => d.clone(),
        None => loader::mt_output_dir(
            loader::hcp_dir_from_env_or_home().context("cannot locate the HCP data directory")?,
        ),
    };

    let config = MtConfig {
        tr: cli.tr,
        method: cli.method,
        resolution: cli.resolution,
        undo_slicetime: cli.undo_slicetime,
    };
    let (refs, inputs) = collect_inputs(&cli)?;
    info!("estimating `{}` scaling factors from {} images", cli.tissue, inputs.len());
    let est = estimate_mt(&inputs, cli.tissue, &config).context("MT estimation failed")?;

    let factors = est.scaling_factors.mapv(|v| v as f32);
    for (calib, header) in refs.iter() {
        let path = loader::scaling_factor_path(calib, cli.tissue.name());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_volume_like(&path, header, &factors).with_context(|| format!("cannot write {}", path.display()))?;
        info!("written {}", path.display());
    }

    fs::create_dir_all(&out_dir)?;
    let arrays = est
        .save_arrays(&out_dir, cli.tissue)
        .with_context(|| format!("cannot write arrays into {}", out_dir.display()))?;

    utils::sep();
    println!("Tissue: {}, method: {}, TR: {} s", cli.tissue, cli.method, cli.tr);
    for p in refs.iter().map(|(c, _)| loader::scaling_factor_path(c, cli.tissue.name())).chain(arrays) {
        println!("Written: {}", p.display());
    }
    utils::sep();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse() {
        let cli = Cli::try_parse_from(["mt-estimate", "--tissue", "WM", "a.nii.gz", "b.nii.gz"]).unwrap();
        assert_eq!(cli.tissue, MtTissue::Wm);
        assert_eq!(cli.calib.len(), 2);
        assert_eq!(cli.method, MtMethod::Separate);
        assert_eq!(cli.resolution, 10_000);

        let cli = Cli::try_parse_from([
            "mt-estimate", "--tissue", "combined", "--gm", "g0", "g1", "--wm", "w0", "w1", "--method", "together",
        ])
        .unwrap();
        assert_eq!(cli.gm.len(), 2);
        assert_eq!(cli.method, MtMethod::Together);

        assert!(Cli::try_parse_from(["mt-estimate", "--tissue", "brain", "a.nii.gz"]).is_err());
        assert!(Cli::try_parse_from(["mt-estimate", "--tissue", "gm"]).is_err());
    }

    #[test]
    fn test_factors_keep_calib_header() {
        let dir = tempfile::tempdir().unwrap();
        let grid = VoxelGrid::from_vox_size([3, 2, 60], [2.0, 2.0, 2.0]);
        let mut calib = grid.to_header();
        calib.qform_code = 1;
        calib.slice_duration = 0.059;
        calib.xyzt_units = 10;
        let calib_path = dir.path().join("calib_wm.nii.gz");
        write_volume_like(&calib_path, &calib, &Array3::<f32>::ones((3, 2, 60))).unwrap();

        let (header, data) = load_calib(&calib_path).unwrap();
        assert_eq!(data.dim(), (3, 2, 60));
        let out = loader::scaling_factor_path(&calib_path, "wm");
        fs::create_dir_all(out.parent().unwrap()).unwrap();
        write_volume_like(&out, &header, &Array3::<f32>::ones((3, 2, 60))).unwrap();

        let (written, _) = read_volume_f64(&out).unwrap();
        assert_eq!(written.qform_code, 1);
        assert_eq!(written.slice_duration, 0.059);
        assert_eq!(written.xyzt_units, 10);
        assert_eq!(written.srow_z, calib.srow_z);
    }
}
