use crate::io::OutputPaths;
use crate::process::Threshold;
use crate::{StackError, StackResult};
use std::path::{Path, PathBuf};

/// 成功处理一个文件后的摘要.
#[derive(Clone, Debug)]
pub struct ProcessedFile {
    /// 写出的文件路径.
    pub outputs: OutputPaths,

    /// 实际使用的阈值.
    pub threshold: Threshold,

    /// 标记得到的连通域个数 (边界过滤前).
    pub labels_found: u32,

    /// 被边界过滤删除的连通域个数.
    pub border_removed: usize,

    /// 统计表行数. 未做区域分析时为 `None`.
    pub regions: Option<usize>,
}

/// 单个文件的处理结果.
#[derive(Debug)]
pub enum FileOutcome {
    /// 成功.
    Processed(ProcessedFile),

    /// 输入不受支持, 已跳过.
    Skipped(StackError),

    /// 处理失败.
    Failed(StackError),

    /// 由于取消而没有开始.
    NotStarted,
}

impl FileOutcome {
    /// 按错误类型区分跳过与失败.
    pub fn from_result(result: StackResult<ProcessedFile>) -> Self {
        match result {
            Ok(p) => Self::Processed(p),
            Err(e) if e.is_unsupported_input() => Self::Skipped(e),
            Err(e) => Self::Failed(e),
        }
    }
}

/// 单个文件的报告.
#[derive(Debug)]
pub struct FileReport {
    /// 输入路径.
    pub input: PathBuf,

    /// 处理结果.
    pub outcome: FileOutcome,
}

impl FileReport {
    /// 输入文件名, 用于展示.
    pub fn file_name(&self) -> String {
        self.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string())
    }
}

/// 一次批处理的汇总. 报告顺序即文件枚举顺序.
#[derive(Debug, Default)]
pub struct RunSummary {
    input_dir: PathBuf,
    reports: Vec<FileReport>,
}

impl RunSummary {
    pub(crate) fn new(input_dir: &Path, reports: Vec<FileReport>) -> Self {
        Self {
            input_dir: input_dir.to_owned(),
            reports,
        }
    }

    /// 输入目录.
    #[inline]
    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// 全部报告.
    #[inline]
    pub fn reports(&self) -> &[FileReport] {
        &self.reports
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// 成功处理的文件数.
    pub fn processed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Processed(_)))
    }

    /// 跳过的文件数.
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped(_)))
    }

    /// 失败的文件数.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed(_)))
    }

    /// 因取消而未开始的文件数.
    pub fn not_started(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::NotStarted))
    }

    /// 是否有文件失败?
    #[inline]
    pub fn has_failures(&self) -> bool {
        self.failed() != 0
    }
}
