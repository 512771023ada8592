//! 命令行参数与配置合并.

use anyhow::{anyhow, Context};
use clap::Parser;
use stack_berry::neighbour::Connectivity;
use stack_berry::pipeline::PipelineConfig;
use stack_berry::process::{Polarity, ThresholdMethod};
use stack_berry::LabelDepth;
use std::path::PathBuf;

fn parse_connectivity(s: &str) -> Result<Connectivity, String> {
    s.parse::<u8>()
        .ok()
        .and_then(Connectivity::from_count)
        .ok_or_else(|| format!("连通规则只能是 6, 18 或 26, 而不是 '{s}'"))
}

fn parse_label_depth(s: &str) -> Result<LabelDepth, String> {
    s.parse::<u8>()
        .ok()
        .and_then(LabelDepth::from_bits)
        .ok_or_else(|| format!("标签位深只能是 8, 16 或 32, 而不是 '{s}'"))
}

/// 批量分割目录中的 3D 显微 TIFF 栈.
///
/// 对每个栈依次做 rolling ball 背景扣除, 全栈自动阈值 (结果取反), 三维连通域标记,
/// 删除接触边界的区域, 区域统计. 结果写为 `<stem>_mask.<ext>` 和 `<stem>.csv`.
///
/// 注意: 同名输出文件会被直接覆盖.
#[derive(Debug, Parser)]
#[command(name = "segment3d", version)]
pub struct Cli {
    /// 输入目录. 缺省时依次尝试 `$STACK_BERRY_INPUT_DIR` 和 `$HOME/dataset/stacks`.
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// 输出目录 (不存在时自动创建). 缺省时写在输入文件旁边.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// TOML 配置文件. 命令行显式给出的参数优先.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// rolling ball 半径 (像素), 0 表示不扣除背景.
    #[arg(long)]
    pub radius: Option<f64>,

    /// 滚球前不做 3x3 均值平滑.
    #[arg(long)]
    pub no_presmooth: bool,

    /// 自动阈值方法: default, otsu, mean.
    #[arg(long)]
    pub threshold: Option<ThresholdMethod>,

    /// 前景极性: dark, light.
    #[arg(long)]
    pub polarity: Option<Polarity>,

    /// 连通规则: 6, 18, 26.
    #[arg(long, value_parser = parse_connectivity)]
    pub connectivity: Option<Connectivity>,

    /// 标签位深: 8, 16, 32.
    #[arg(long, value_parser = parse_label_depth)]
    pub label_depth: Option<LabelDepth>,

    /// 掩膜文件名标记. 文件名含该子串的文件不作为输入.
    #[arg(long)]
    pub marker: Option<String>,

    /// 不做区域分析, 不写统计表.
    #[arg(long)]
    pub no_regions: bool,

    /// 区域分析时不测量灰度.
    #[arg(long)]
    pub no_intensity: bool,

    /// 边界过滤后把标签重新编号为连续的 1..=K.
    #[arg(long)]
    pub relabel: bool,

    /// 额外写出 z 最大值投影预览 `<stem>_mask_zproj.png`.
    #[arg(long)]
    pub projection: bool,

    /// 并行处理的文件数. 1 为顺序处理, 0 为使用全部核心.
    #[arg(long, short, default_value_t = 1)]
    pub jobs: usize,

    /// 日志级别.
    #[arg(long, default_value = "info")]
    pub log_level: log::LevelFilter,
}

impl Cli {
    /// 合并配置文件与命令行参数.
    ///
    /// `default_input` 仅在命令行和配置文件都没有给出输入目录时使用.
    pub fn to_config(&self, default_input: Option<PathBuf>) -> anyhow::Result<PipelineConfig> {
        let mut c = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("无法读取配置文件 '{}'", path.display()))?;
                toml::from_str::<PipelineConfig>(&text)
                    .with_context(|| format!("无法解析配置文件 '{}'", path.display()))?
            }
            None => PipelineConfig::default(),
        };

        if let Some(d) = &self.input {
            c.input_dir = d.clone();
        }
        if c.input_dir.as_os_str().is_empty() {
            c.input_dir = default_input.ok_or_else(|| anyhow!("未指定输入目录, 且无法确定主目录"))?;
        }
        if let Some(d) = &self.output {
            c.output_dir = Some(d.clone());
        }
        if let Some(r) = self.radius {
            c.rolling_ball_radius = r;
        }
        if self.no_presmooth {
            c.presmooth = false;
        }
        if let Some(m) = self.threshold {
            c.threshold_method = m;
        }
        if let Some(p) = self.polarity {
            c.polarity = p;
        }
        if let Some(conn) = self.connectivity {
            c.connectivity = conn;
        }
        if let Some(d) = self.label_depth {
            c.label_depth = d;
        }
        if let Some(m) = &self.marker {
            c.mask_marker = m.clone();
        }
        if self.no_regions {
            c.run_region_analysis = false;
        }
        if self.no_intensity {
            c.measure_intensity = false;
        }
        if self.relabel {
            c.relabel = true;
        }
        if self.projection {
            c.write_projection = true;
        }
        Ok(c)
    }
}
