//! 通用常量.

/// 单通道颜色.
pub mod gray {
    /// 二值掩膜中, 背景的像素值.
    pub const MASK_BACKGROUND: u8 = 0;

    /// 二值掩膜中, 前景的像素值.
    pub const MASK_FOREGROUND: u8 = 255;

    /// 标签体中, 背景的标签值.
    pub const LABEL_BACKGROUND: u32 = 0;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 掩膜像素是否是前景?
    #[inline]
    pub const fn is_mask_foreground(p: u8) -> bool {
        matches!(p, MASK_FOREGROUND)
    }

    /// 标签是否是背景?
    #[inline]
    pub const fn is_label_background(label: u32) -> bool {
        label == LABEL_BACKGROUND
    }
}

/// 默认 rolling ball 半径 (像素).
pub const DEFAULT_ROLLING_BALL_RADIUS: f64 = 50.0;

/// rolling ball 半径上限 (像素). 缩小后的球不超过 `2501 x 2501`.
pub const MAX_ROLLING_BALL_RADIUS: f64 = 10_000.0;

/// 默认掩膜文件名标记. 文件名包含该子串的文件被视为之前的输出, 不会再作为输入.
pub const DEFAULT_MASK_MARKER: &str = "mask";

/// 掩膜输出文件名的后缀 (位于原文件名主干之后, 扩展名之前).
pub const MASK_SUFFIX: &str = "_mask";

/// Z 投影预览文件名的后缀.
pub const PROJECTION_SUFFIX: &str = "_mask_zproj";

/// 统计表的扩展名.
pub const TABLE_EXTENSION: &str = "csv";

/// 可识别的栈文件扩展名 (小写, 比较时大小写不敏感).
pub const STACK_EXTENSIONS: [&str; 2] = ["tif", "tiff"];

/// 自动阈值使用的直方图 bin 个数.
pub const HISTOGRAM_BINS: usize = 256;

/// 体素类型.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ElemType {
    /// `MASK_BACKGROUND`, 代表背景.
    Background,

    /// `MASK_FOREGROUND`, 代表前景.
    Foreground,
}

impl ElemType {
    /// 转为掩膜像素值.
    #[inline]
    pub fn to_mask(self) -> u8 {
        match self {
            Self::Foreground => gray::MASK_FOREGROUND,
            Self::Background => gray::MASK_BACKGROUND,
        }
    }
}
