//! 运行时错误.

use std::path::PathBuf;
use thiserror::Error;

/// 本 crate 的统一结果类型.
pub type StackResult<T> = Result<T, StackError>;

/// 处理 3D 栈时可能发生的错误.
///
/// 按照影响范围分为三类:
///
/// - 配置错误 (`InvalidConfig`, `InputDir`): 整个批处理立即终止;
/// - 输入不受支持 (见 [`StackError::is_unsupported_input`]): 跳过该文件;
/// - 其它错误 (算法上限, 读写失败): 该文件记为失败, 批处理继续.
#[derive(Debug, Error)]
pub enum StackError {
    /// 配置项取值非法.
    #[error("配置项 `{field}` 非法: {reason}")]
    InvalidConfig {
        /// 配置项名称.
        field: &'static str,

        /// 原因.
        reason: String,
    },

    /// 输入目录不存在, 不是目录或不可读.
    #[error("输入目录 '{path}' 不可用: {source}")]
    InputDir {
        /// 目录路径.
        path: PathBuf,

        /// 底层 I/O 错误.
        source: std::io::Error,
    },

    /// 底层 I/O 错误.
    #[error("读写 '{path}' 失败: {source}")]
    Io {
        /// 文件路径.
        path: PathBuf,

        /// 底层 I/O 错误.
        source: std::io::Error,
    },

    /// TIFF 解码错误 (文件损坏或格式不受支持).
    #[error("TIFF 文件 '{path}' 解码失败: {source}")]
    Tiff {
        /// 文件路径.
        path: PathBuf,

        /// 底层 TIFF 错误.
        source: tiff::TiffError,
    },

    /// TIFF 编码错误.
    #[error("写出 TIFF 文件 '{path}' 失败: {source}")]
    TiffWrite {
        /// 文件路径.
        path: PathBuf,

        /// 底层 TIFF 错误.
        source: tiff::TiffError,
    },

    /// 文件不是三维栈 (少于两个平面).
    #[error("'{path}' 不是三维栈: 只有 {planes} 个平面")]
    NotAStack {
        /// 文件路径.
        path: PathBuf,

        /// 实际平面个数.
        planes: usize,
    },

    /// 不支持的像素格式. 目前只支持 8/16-bit 单通道灰度.
    #[error("'{path}' 的像素格式 {found} 不受支持, 只支持 8/16-bit 灰度")]
    UnsupportedSampleFormat {
        /// 文件路径.
        path: PathBuf,

        /// 实际格式描述.
        found: String,
    },

    /// 各平面尺寸或位深不一致.
    #[error("'{path}' 第 {plane} 个平面与第一个平面的尺寸或位深不一致")]
    InconsistentPlanes {
        /// 文件路径.
        path: PathBuf,

        /// 出错平面索引.
        plane: usize,
    },

    /// 连通域个数超出标签位深的表示范围.
    #[error("连通域个数超过标签位深上限 {limit}")]
    TooManyLabels {
        /// 标签位深允许的最大标签值.
        limit: u32,
    },

    /// CSV 写出错误.
    #[error("写出统计表 '{path}' 失败: {source}")]
    Csv {
        /// 文件路径.
        path: PathBuf,

        /// 底层 CSV 错误.
        source: csv::Error,
    },

    /// 预览图写出错误.
    #[error("写出预览图 '{path}' 失败: {source}")]
    Image {
        /// 文件路径.
        path: PathBuf,

        /// 底层图像错误.
        source: image::ImageError,
    },
}

impl StackError {
    /// 该错误是否意味着输入文件本身不受支持 (应跳过而非记为失败)?
    ///
    /// 解码时读到文件末尾或数据非法 (截断, 损坏) 都算作不受支持;
    /// 其它底层 I/O 错误 (例如磁盘读失败) 不算在内.
    pub fn is_unsupported_input(&self) -> bool {
        match self {
            Self::Tiff { source, .. } => match source {
                tiff::TiffError::IoError(e) => matches!(
                    e.kind(),
                    std::io::ErrorKind::UnexpectedEof | std::io::ErrorKind::InvalidData
                ),
                _ => true,
            },
            Self::NotAStack { .. }
            | Self::UnsupportedSampleFormat { .. }
            | Self::InconsistentPlanes { .. } => true,
            _ => false,
        }
    }

    /// 该错误是否是配置错误 (应终止整个批处理)?
    #[inline]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InputDir { .. } | Self::InvalidConfig { .. })
    }
}
