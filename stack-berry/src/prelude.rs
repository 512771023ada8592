//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::{
    BinaryMask, BitDepth, Calibration, ImgWriteVis, LabelDepth, LabelVolume, VolumeAttr,
    VolumeImage,
};

pub use crate::{StackError, StackResult};

pub use crate::consts::gray::{LABEL_BACKGROUND, MASK_BACKGROUND, MASK_FOREGROUND};
pub use crate::consts::ElemType;

pub use crate::dataset::{self, home_dataset_dir_with, StackDirLoader};

pub use crate::io::{read_stack, write_labels, write_table, OutputPaths};

pub use crate::neighbour::Connectivity;

pub use crate::process::{
    AutoThreshold, BackgroundSubtractor, Binarizer, ComponentLabeler, FloodFillLabeler,
    Morphometry, Polarity, RegionAnalyzer, RegionRecord, RegionTable, RollingBall,
    ThresholdMethod,
};

pub use crate::pipeline::{CancelToken, Pipeline, PipelineConfig, RunSummary};
