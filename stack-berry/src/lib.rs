#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 对目录中的 3D 显微 TIFF 栈 (stack) 做批量分割, 输出三维标签掩膜和区域统计表.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 处理流程
//!
//! 每个输入文件严格按照以下顺序处理, 文件之间不共享任何状态:
//!
//! 1. 加载 (`dataset::StackDirLoader`): 枚举目录下的 `.tif/.tiff` 文件,
//!   跳过文件名含有掩膜标记 (默认 `"mask"`) 的文件.
//! 2. 背景扣除 (`process::background`): 对每个 z 平面独立地做 rolling ball 背景估计并扣除.
//! 3. 二值化 (`process::threshold`): 全栈自动阈值, 转为 0/255 掩膜, 然后 **取反**.
//! 4. 连通域标记 (`process::label`): 26-邻域洪泛标记, 默认 16-bit 标签.
//! 5. 边界过滤 (`process::border`): 任何接触六个表面的标签整体清零.
//! 6. 区域分析 (`process::regions`): 按标签升序计算形态学/灰度统计量.
//! 7. 写出 (`io`): `<stem>_mask.<ext>` 标签栈和 `<stem>.csv` 统计表.
//!
//! 整个流程由 [`pipeline::Pipeline`] 串联. 每个重计算步骤都是 trait 对象,
//! 可以单独替换和测试.
//!
//! # 注意
//!
//! 1. 所有三维数据均按照 `(z, y, x)` 顺序索引, 即 (切片, 行, 列).
//! 2. 输出文件名只由原始输入路径决定, 与任何中间图像的标题无关.
//! 3. 重复运行会覆盖同名输出文件.
//!
//! # 开发计划
//!
//! ### rolling ball 背景扣除 ✅
//!
//! 缩小 - 滚球 - 双线性放大, 与 ImageJ 的参数选择一致.
//!
//! ### 全栈直方图自动阈值 ✅
//!
//! `Default` (ImageJ 旧版 IsoData), `Otsu`, `Mean`.
//!
//! ### 三维连通域标记 ✅
//!
//! 6/18/26-邻域, 8/16/32-bit 标签, 溢出时报错而非回绕.
//!
//! ### 区域统计 ✅
//!
//! 体积, 表面积, 球形度, 质心, 包围盒, 灰度矩.
//!
//! ### ImageJ 元数据读写 ✅
//!
//! 读取并写回体素尺寸, 输出可被 Fiji 直接识别为定标的栈.
//!
//! ### 等效椭球 / Euler 数 ✅
//!
//! 二阶中心矩的闭式特征分解; 体素复形上的 `V - E + F - C`.
//!
//! ### 平均宽度 / 最大内切球 ⌛️
//!
//! 需要离散 Crofton 公式和三维距离变换, 暂未实现.

/// 二维索引 `(y, x)`.
pub type Idx2d = (usize, usize);

/// 三维索引 `(z, y, x)`.
pub type Idx3d = (usize, usize, usize);

/// 三维体数据基础结构.
mod data;

pub use data::{
    BinaryMask, BitDepth, Calibration, ImgWriteVis, LabelDepth, LabelVolume, VolumeAttr,
    VolumeImage,
};

pub mod consts;

pub mod dataset;

mod error;

pub use error::{StackError, StackResult};

pub mod io;

pub mod neighbour;

pub mod pipeline;

pub mod prelude;

pub mod process;
