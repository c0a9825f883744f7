//! 程序运行函数.

use crate::result::ExtractSummary;
use crate::Cli;
use anyhow::{bail, Context, Result};
use asl_berry::prelude::*;
use log::info;

/// 根据命令行参数选择皮层估计器.
fn cortex_estimator(cli: &Cli, cores: usize) -> Result<Box<dyn CortexEstimator>> {
    if let Some(p) = &cli.cortex_pvs {
        info!("using precomputed cortical PVs from {}", p.display());
        return Ok(Box::new(PrecomputedCortex::new(p)));
    }
    let (Some(lws), Some(lps), Some(rws), Some(rps)) = (&cli.lws, &cli.lps, &cli.rws, &cli.rps) else {
        bail!("all four surfaces are required without --cortex-pvs");
    };
    let surfaces = Surfaces {
        lws: lws.clone(),
        lps: lps.clone(),
        rws: rws.clone(),
        rps: rps.clone(),
    };
    Ok(Box::new(CommandCortex::new(&cli.cortex_cmd, surfaces, cores)))
}

/// 实际运行. 所有输出只在估计成功后写出.
pub fn run(cli: &Cli) -> Result<ExtractSummary> {
    let cores = cli.cores.unwrap_or_else(utils::cores_from_env_or_all);
    let config = ExtractConfig {
        superfactor: cli.superfactor,
        cores,
    };
    config.validate().context("invalid arguments")?;

    let aseg = LabelVolume::open(&cli.aparcseg)
        .with_context(|| format!("cannot load segmentation {}", cli.aparcseg.display()))?;
    let t1 = VoxelGrid::open(&cli.t1).with_context(|| format!("cannot load {}", cli.t1.display()))?;
    let asl = VoxelGrid::open(&cli.asl).with_context(|| format!("cannot load {}", cli.asl.display()))?;
    let cortex = cortex_estimator(cli, cores)?;

    info!("running with {cores} cores, supersampling factor {}", cli.superfactor);
    let output = extract_fs_pvs(&aseg, &t1, &asl, &*cortex, &config)
        .context("PV estimation failed")?;

    let written = if cli.stack {
        output
            .pvs
            .save_stacked(&cli.out, &output.grid)
            .with_context(|| format!("cannot write {}", cli.out.display()))?;
        vec![cli.out.clone()]
    } else {
        output
            .pvs
            .save_split(&cli.out, &output.grid)
            .with_context(|| format!("cannot write split outputs of {}", cli.out.display()))?
            .to_vec()
    };

    if let Some(dir) = &cli.preview {
        std::fs::create_dir_all(dir)?;
        output
            .pvs
            .save_previews(dir)
            .with_context(|| format!("cannot write previews into {}", dir.display()))?;
    }

    Ok(ExtractSummary::new(output, written))
}
