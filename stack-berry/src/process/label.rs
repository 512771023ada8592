//! 三维连通域标记.

use crate::consts::gray::LABEL_BACKGROUND;
use crate::neighbour::{neighbours, Connectivity};
use crate::{BinaryMask, LabelDepth, LabelVolume, StackError, StackResult, VolumeAttr};
use ndarray::Array3;
use std::collections::VecDeque;

/// 连通域标记策略.
pub trait ComponentLabeler: Send + Sync {
    /// 对 `mask` 中值为 `foreground` 的体素做连通域标记. 其它值都是背景.
    ///
    /// 连通域个数超过标签位深上限时返回 `Err(StackError::TooManyLabels)`.
    fn label(&self, mask: &BinaryMask, foreground: u8) -> StackResult<LabelVolume>;
}

/// 洪泛填充标记器.
///
/// 按 z, y, x 顺序扫描, 每遇到一个未标记的前景体素, 就以下一个标签值为种子做 BFS.
/// 因此标签值确定且连续 (`1..=K`), 顺序与扫描顺序一致.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct FloodFillLabeler {
    /// 连通规则.
    pub connectivity: Connectivity,

    /// 标签位深.
    pub depth: LabelDepth,
}

impl FloodFillLabeler {
    /// 构造.
    #[inline]
    pub fn new(connectivity: Connectivity, depth: LabelDepth) -> Self {
        Self {
            connectivity,
            depth,
        }
    }
}

impl ComponentLabeler for FloodFillLabeler {
    fn label(&self, mask: &BinaryMask, foreground: u8) -> StackResult<LabelVolume> {
        let shape = mask.shape();
        let src = mask.data();
        let limit = self.depth.max_label();

        let mut labels = Array3::from_elem(shape, LABEL_BACKGROUND);
        let mut next = LABEL_BACKGROUND;
        let mut q = VecDeque::new();
        for (seed, &p) in src.indexed_iter() {
            if p != foreground || labels[seed] != LABEL_BACKGROUND {
                continue;
            }
            if next == limit {
                return Err(StackError::TooManyLabels { limit });
            }
            next += 1;
            labels[seed] = next;
            q.push_back(seed);
            while let Some(cur) = q.pop_front() {
                for n in neighbours(cur, self.connectivity, shape) {
                    if src[n] == foreground && labels[n] == LABEL_BACKGROUND {
                        labels[n] = next;
                        q.push_back(n);
                    }
                }
            }
        }

        Ok(LabelVolume::new(labels, self.depth).with_calibration(mask.calibration().clone()))
    }
}
