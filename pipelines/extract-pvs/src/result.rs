//! 运行结果.

use asl_berry::prelude::*;
use std::io::{self, Write};
use std::path::PathBuf;

/// 将 `output` 的概要写进 `w` 中.
fn describe_into<W: Write>(output: &ExtractOutput, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    let [x, y, z] = output.grid.size();
    let [dx, dy, dz] = output.grid.vox_size();
    writeln!(w, "Reference grid: {x}x{y}x{z} @ {dx:.3}x{dy:.3}x{dz:.3} mm")?;
    for t in TissueClass::ALL {
        writeln!(w, "{S4}{t} total: {:.3}", output.pvs.total(t))?;
    }
    writeln!(w, "{S4}Value range: [{:.6}, {:.6}]", output.pvs.min(), output.pvs.max())?;
    if output.unrecognized.is_empty() {
        write!(w, "{S4}Unrecognized labels: /")?;
    } else {
        let codes: Vec<String> = output.unrecognized.iter().map(|u| u.0.to_string()).collect();
        write!(w, "{S4}Unrecognized labels: {}", codes.join(", "))?;
    }
    Ok(())
}

/// 估计完成后的概要.
pub struct ExtractSummary {
    output: ExtractOutput,
    written: Vec<PathBuf>,
}

impl ExtractSummary {
    pub fn new(output: ExtractOutput, written: Vec<PathBuf>) -> Self {
        Self { output, written }
    }

    /// 打印概要.
    pub fn report(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);
        match describe_into(&self.output, &mut buf) {
            Ok(()) => println!("{}", String::from_utf8_lossy(&buf)),
            Err(e) => log::error!("cannot format summary: {e}"),
        }
        utils::sep();
        for p in self.written.iter() {
            println!("Written: {}", p.display());
        }
    }
}
