use crate::consts::{DEFAULT_MASK_MARKER, DEFAULT_ROLLING_BALL_RADIUS, MAX_ROLLING_BALL_RADIUS};
use crate::neighbour::Connectivity;
use crate::process::{Polarity, ThresholdMethod};
use crate::{LabelDepth, StackError, StackResult};
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 批处理配置.
///
/// 启用 `serde` feature 时可以从配置文件反序列化, 缺省字段取默认值.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// 输入目录.
    pub input_dir: PathBuf,

    /// 输出目录. `None` 时输出写在输入文件旁边.
    pub output_dir: Option<PathBuf>,

    /// rolling ball 半径 (像素). 不大于 0 时不扣除背景, 上限为
    /// [`MAX_ROLLING_BALL_RADIUS`].
    pub rolling_ball_radius: f64,

    /// 滚球前是否做 3x3 均值平滑.
    pub presmooth: bool,

    /// 自动阈值方法.
    pub threshold_method: ThresholdMethod,

    /// 前景极性.
    pub polarity: Polarity,

    /// 连通规则.
    pub connectivity: Connectivity,

    /// 标签位深.
    pub label_depth: LabelDepth,

    /// 掩膜文件名标记. 含该子串的文件不作为输入.
    pub mask_marker: String,

    /// 是否做区域分析并写出统计表.
    pub run_region_analysis: bool,

    /// 区域分析时是否测量灰度.
    pub measure_intensity: bool,

    /// 边界过滤后是否把标签重新编号为连续的 `1..=K`.
    pub relabel: bool,

    /// 是否额外写出 z 投影预览图.
    pub write_projection: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::new(),
            output_dir: None,
            rolling_ball_radius: DEFAULT_ROLLING_BALL_RADIUS,
            presmooth: true,
            threshold_method: ThresholdMethod::Default,
            polarity: Polarity::Dark,
            connectivity: Connectivity::TwentySix,
            label_depth: LabelDepth::Sixteen,
            mask_marker: DEFAULT_MASK_MARKER.to_owned(),
            run_region_analysis: true,
            measure_intensity: true,
            relabel: false,
            write_projection: false,
        }
    }
}

impl PipelineConfig {
    /// 以 `input_dir` 为输入目录, 其余取默认值.
    pub fn new<P: AsRef<Path>>(input_dir: P) -> Self {
        Self {
            input_dir: input_dir.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// 实际输出目录.
    #[inline]
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// 检查取值范围. 开始处理任何文件之前调用.
    ///
    /// # 错误
    ///
    /// rolling ball 半径不是有限值或超过 [`MAX_ROLLING_BALL_RADIUS`] 时,
    /// 返回 `StackError::InvalidConfig`.
    pub fn validate(&self) -> StackResult<()> {
        let r = self.rolling_ball_radius;
        if !r.is_finite() || r > MAX_ROLLING_BALL_RADIUS {
            return Err(StackError::InvalidConfig {
                field: "rolling_ball_radius",
                reason: format!("{r} 不在 (-inf, {MAX_ROLLING_BALL_RADIUS}] 内"),
            });
        }
        Ok(())
    }
}
