//! 批处理流水线: 把加载、处理和写出串联起来.
//!
//! 单个文件内部严格按顺序执行各步骤; 文件之间互不共享状态.

mod cancel;
mod config;
mod report;

pub use cancel::CancelToken;
pub use config::PipelineConfig;
pub use report::{FileOutcome, FileReport, ProcessedFile, RunSummary};

use crate::consts::gray::MASK_FOREGROUND;
use crate::dataset::StackDirLoader;
use crate::io::{self, OutputPaths};
use crate::process::*;
use crate::{ImgWriteVis, StackError, StackResult, VolumeAttr};
use std::path::{Path, PathBuf};

/// 批处理流水线. 每个重计算步骤都可以通过 `with_*` 替换.
pub struct Pipeline {
    config: PipelineConfig,
    background: Box<dyn BackgroundSubtractor>,
    binarizer: Binarizer,
    labeler: Box<dyn ComponentLabeler>,
    analyzer: Box<dyn RegionAnalyzer>,
}

impl Pipeline {
    /// 按配置组装默认策略.
    pub fn new(config: PipelineConfig) -> Self {
        let background = subtractor_for(config.rolling_ball_radius, config.presmooth);
        let binarizer = Binarizer::new(Box::new(config.threshold_method), config.polarity);
        let labeler = Box::new(FloodFillLabeler::new(config.connectivity, config.label_depth));
        Self {
            config,
            background,
            binarizer,
            labeler,
            analyzer: Box::new(Morphometry),
        }
    }

    /// 替换背景扣除策略.
    pub fn with_background(mut self, background: Box<dyn BackgroundSubtractor>) -> Self {
        self.background = background;
        self
    }

    /// 替换自动阈值策略. 极性不变.
    pub fn with_threshold(mut self, method: Box<dyn AutoThreshold>) -> Self {
        self.binarizer = self.binarizer.with_method(method);
        self
    }

    /// 替换连通域标记策略.
    pub fn with_labeler(mut self, labeler: Box<dyn ComponentLabeler>) -> Self {
        self.labeler = labeler;
        self
    }

    /// 替换区域分析策略.
    pub fn with_analyzer(mut self, analyzer: Box<dyn RegionAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// 当前配置.
    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 完整处理一个输入文件并写出结果.
    pub fn process_file(&self, input: &Path) -> StackResult<ProcessedFile> {
        let outputs = OutputPaths::derive(input, self.config.output_dir());

        let image = io::read_stack(input)?;
        log::debug!(
            "'{}': {:?}, {}-bit, 体素 {:?}",
            image.title(),
            image.shape(),
            image.bit_depth().bits(),
            image.calibration()
        );
        let subtracted = self.background.subtract(&image);
        drop(image);

        let (threshold, mask) = self.binarizer.binarize(&subtracted);
        let side = match self.binarizer.polarity() {
            Polarity::Dark => ">=",
            Polarity::Light => "<",
        };
        log::debug!(
            "阈值 bin {} (前景像素值 {side} {:.1}), 取反后前景 {} 个体素",
            threshold.level,
            threshold.cut,
            mask.count_foreground()
        );

        let mut labels = self.labeler.label(&mask, MASK_FOREGROUND)?;
        drop(mask);
        let labels_found = labels.max_label();
        log::debug!("标记得到 {labels_found} 个连通域");

        let removed = remove_border_labels(&mut labels);
        if self.config.relabel {
            let k = labels.relabel();
            log::debug!("重新编号为 1..={k}");
        }

        let table = self.config.run_region_analysis.then(|| {
            let intensity = self.config.measure_intensity.then_some(&subtracted);
            let records = self.analyzer.analyze(&labels, intensity);
            RegionTable::new(subtracted.title(), records)
                .with_intensity_columns(self.config.measure_intensity)
        });

        if let Some(dir) = self.config.output_dir() {
            std::fs::create_dir_all(dir).map_err(|source| StackError::Io {
                path: dir.to_owned(),
                source,
            })?;
        }
        let written = [Some(&outputs.mask), table.as_ref().map(|_| &outputs.table)];
        for path in written.into_iter().flatten().filter(|p| p.exists()) {
            log::debug!("覆盖已有文件 '{}'", path.display());
        }

        io::write_labels(&outputs.mask, &labels)?;
        if let Some(table) = &table {
            io::write_table(&outputs.table, table)?;
        }
        if self.config.write_projection {
            labels
                .save(&outputs.projection)
                .map_err(|source| StackError::Image {
                    path: outputs.projection.clone(),
                    source,
                })?;
        }

        Ok(ProcessedFile {
            outputs,
            threshold,
            labels_found,
            border_removed: removed.len(),
            regions: table.map(|t| t.len()),
        })
    }

    /// 处理一个文件, 并记录日志与结果分类.
    fn report_for(&self, input: PathBuf, cancel: &CancelToken) -> FileReport {
        if cancel.is_cancelled() {
            return FileReport {
                input,
                outcome: FileOutcome::NotStarted,
            };
        }
        log::info!("开始处理 '{}'", input.display());
        let outcome = FileOutcome::from_result(self.process_file(&input));
        match &outcome {
            FileOutcome::Processed(p) => log::info!(
                "完成 '{}': {} 个区域存活",
                input.display(),
                p.labels_found as usize - p.border_removed
            ),
            FileOutcome::Skipped(e) => log::warn!("跳过: {e}"),
            FileOutcome::Failed(e) => log::error!("失败: {e}"),
            FileOutcome::NotStarted => {}
        }
        FileReport { input, outcome }
    }

    /// 检查配置并枚举输入目录.
    fn loader(&self) -> StackResult<StackDirLoader> {
        self.config.validate()?;
        StackDirLoader::open(&self.config.input_dir, self.config.mask_marker.as_str())
    }

    /// 逐个文件顺序处理整个输入目录.
    ///
    /// 只有输入目录不可用时返回 `Err`; 单个文件的错误记录在 [`RunSummary`] 中.
    pub fn run(&self, cancel: &CancelToken) -> StackResult<RunSummary> {
        let loader = self.loader()?;
        let reports = loader.map(|p| self.report_for(p, cancel)).collect();
        Ok(RunSummary::new(&self.config.input_dir, reports))
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl Pipeline {
    /// 借助 `rayon`, 并行地处理多个文件. 每个文件内部步骤顺序不变,
    /// 报告顺序与文件枚举顺序一致.
    pub fn par_run(&self, cancel: &CancelToken) -> StackResult<RunSummary> {
        let inputs: Vec<PathBuf> = self.loader()?.collect();
        let reports = inputs
            .into_par_iter()
            .map(|p| self.report_for(p, cancel))
            .collect();
        Ok(RunSummary::new(&self.config.input_dir, reports))
    }
}
