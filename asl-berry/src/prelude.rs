//! 🫐欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::data::{into_3d, read_volume_f64, read_volume_i32, split_paths, write_volume, write_volume_like};
pub use crate::data::ImgWriteVis;
pub use crate::data::{LabelVolume, PvField, Rounding, VoxelGrid};

pub use crate::label::{classify, classify_volume, ClassifiedLabels, LabelClass, Structure};
pub use crate::label::{TissueClass, UnrecognizedLabel};

pub use crate::block::{mean_blocks, sum_blocks};
pub use crate::resample::{AffineResampler, Interpolation, Resample};

pub use crate::pvs::{extract_fs_pvs, reference_grid, ExtractConfig, ExtractOutput};
pub use crate::pvs::{stack_images, subcortical_pvs, volumetric_pvs, StructureMasks};
pub use crate::pvs::{CommandCortex, CortexEstimator, PrecomputedCortex, Surfaces};

pub use crate::mt::{estimate_mt, CalibInput, MtConfig, MtEstimate, MtMethod, MtTissue};

pub use crate::{InvariantViolation, PvError, PvResult, Violation};
