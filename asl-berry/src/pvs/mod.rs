//! 组织部分容积估计.
//!
//! 流程入口为 [`extract_fs_pvs`]. 各阶段也可单独使用:
//!
//! 1. [`volumetric_pvs`]: 由分割标签得到 GM/WM/CSF 体积 PV;
//! 2. [`subcortical_pvs`]: 每个皮层下结构的 PV 掩膜;
//! 3. [`CortexEstimator`]: 皮层表面估计的接入点;
//! 4. [`stack_images`]: 融合以上三者.

mod cortex;
mod extract;
mod fusion;
mod subcortical;
mod volumetric;

pub use cortex::{CommandCortex, CortexEstimator, PrecomputedCortex, Surfaces};
pub use extract::{extract_fs_pvs, reference_grid, ExtractConfig, ExtractOutput};
pub use fusion::stack_images;
pub use subcortical::{subcortical_pvs, StructureMasks};
pub use volumetric::volumetric_pvs;
