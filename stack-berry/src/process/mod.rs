//! 单个栈的处理步骤. 每个重计算步骤都以 trait 对象的形式出现, 方便替换.

pub mod background;
mod border;
mod label;
mod regions;
mod threshold;

pub use background::{subtractor_for, BackgroundSubtractor, NoSubtraction, RollingBall};
pub use border::{border_labels, remove_border_labels};
pub use label::{ComponentLabeler, FloodFillLabeler};
pub use regions::{
    BoundingBox, Ellipsoid, IntensityStats, Morphometry, RegionAnalyzer, RegionRecord, RegionTable,
};
pub use threshold::{
    AutoThreshold, Binarizer, Polarity, StackHistogram, Threshold, ThresholdMethod,
};
