use std::collections::BTreeSet;
use std::ops::Index;

use ndarray::{Array3, ArrayView, ArrayView2, ArrayViewMut2, Axis, Ix3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::gray::*;
use crate::{Idx2d, Idx3d};

mod calibration;
mod save;

pub use calibration::Calibration;
pub use save::ImgWriteVis;

/// 灰度图像的位深.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BitDepth {
    /// 8-bit, 取值 `0..=255`.
    Eight,

    /// 16-bit, 取值 `0..=65535`.
    Sixteen,
}

impl BitDepth {
    /// 该位深允许的最大像素值.
    #[inline]
    pub const fn max_value(&self) -> u16 {
        match self {
            Self::Eight => u8::MAX as u16,
            Self::Sixteen => u16::MAX,
        }
    }

    /// 每个像素占用的比特数.
    #[inline]
    pub const fn bits(&self) -> u8 {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
        }
    }
}

/// 标签体的位深. 决定了最多能表示多少个连通域.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LabelDepth {
    /// 最多 255 个标签.
    Eight,

    /// 最多 65535 个标签.
    #[default]
    Sixteen,

    /// 最多 `u32::MAX` 个标签.
    ThirtyTwo,
}

impl LabelDepth {
    /// 从比特数构造. 只接受 8, 16, 32.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(Self::Eight),
            16 => Some(Self::Sixteen),
            32 => Some(Self::ThirtyTwo),
            _ => None,
        }
    }

    /// 该位深允许的最大标签值.
    #[inline]
    pub const fn max_label(&self) -> u32 {
        match self {
            Self::Eight => u8::MAX as u32,
            Self::Sixteen => u16::MAX as u32,
            Self::ThirtyTwo => u32::MAX,
        }
    }

    /// 每个体素占用的比特数.
    #[inline]
    pub const fn bits(&self) -> u8 {
        match self {
            Self::Eight => 8,
            Self::Sixteen => 16,
            Self::ThirtyTwo => 32,
        }
    }
}

/// 三维体数据的共用属性和部分通用操作.
pub trait VolumeAttr {
    /// 获取数据形状大小 `(z, y, x)`.
    fn shape(&self) -> Idx3d;

    /// 获取体素定标信息.
    fn calibration(&self) -> &Calibration;

    /// 获取数据水平切片形状大小 `(y, x)`.
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 判断一个 (合法) 索引是否位于体数据的外壳上, 即六个表面之一.
    #[inline]
    fn is_on_border(&self, &(z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        z0 == 0
            || h0 == 0
            || w0 == 0
            || z0.saturating_add(1) == z
            || h0.saturating_add(1) == h
            || w0.saturating_add(1) == w
    }
}

/// 由 `Array3` 的形状得到 `(z, y, x)`.
#[inline]
fn shape_of<T>(data: &Array3<T>) -> Idx3d {
    data.dim()
}

macro_rules! impl_volume_common {
    ($volume: ty, $elem: ty) => {
        impl VolumeAttr for $volume {
            #[inline]
            fn shape(&self) -> Idx3d {
                shape_of(&self.data)
            }

            #[inline]
            fn calibration(&self) -> &Calibration {
                &self.calibration
            }
        }

        impl Index<Idx3d> for $volume {
            type Output = $elem;

            #[inline]
            fn index(&self, index: Idx3d) -> &Self::Output {
                &self.data[index]
            }
        }

        impl $volume {
            /// 获得数据的一份不可变 shallow copy.
            #[inline]
            pub fn data(&self) -> ArrayView<'_, $elem, Ix3> {
                self.data.view()
            }

            /// 消费自我, 获得底层数据.
            #[inline]
            pub fn into_data(self) -> Array3<$elem> {
                self.data
            }

            /// 替换定标信息.
            #[inline]
            pub fn with_calibration(mut self, calibration: Calibration) -> Self {
                self.calibration = calibration;
                self
            }

            /// 获取能按升序迭代水平不可变切片的迭代器.
            #[inline]
            pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ArrayView2<'_, $elem>> {
                self.data.axis_iter(Axis(0))
            }

            /// 获取能按升序迭代水平可变切片的迭代器.
            #[inline]
            pub fn slice_iter_mut(
                &mut self,
            ) -> impl ExactSizeIterator<Item = ArrayViewMut2<'_, $elem>> {
                self.data.axis_iter_mut(Axis(0))
            }
        }
    };
}

/// 3D 灰度体数据 (显微栈), 包括标题、位深、定标和像素值. 像素以 `u16` 保存,
/// 8-bit 数据也同样如此, 但保证不超过 `bit_depth.max_value()`.
#[derive(Debug, Clone)]
pub struct VolumeImage {
    title: String,
    depth: BitDepth,
    calibration: Calibration,
    data: Array3<u16>,
}

impl_volume_common!(VolumeImage, u16);

impl VolumeImage {
    /// 由标题、位深和 `(z, y, x)` 数据构造. 超出位深的值会被截断到最大值.
    pub fn new(title: impl Into<String>, depth: BitDepth, mut data: Array3<u16>) -> Self {
        let max = depth.max_value();
        data.mapv_inplace(|v| v.min(max));
        Self {
            title: title.into(),
            depth,
            calibration: Calibration::default(),
            data,
        }
    }

    /// 显示用标题, 通常为源文件名.
    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// 位深.
    #[inline]
    pub fn bit_depth(&self) -> BitDepth {
        self.depth
    }

    /// 以相同标题、位深和定标包装新数据, 用于逐步处理时生成新图像.
    ///
    /// 如果 `data` 形状与 `self` 不同, 则程序 panic.
    pub fn derive(&self, data: Array3<u16>) -> Self {
        assert_eq!(self.shape(), shape_of(&data), "派生数据形状不一致");
        Self::new(self.title.clone(), self.depth, data).with_calibration(self.calibration.clone())
    }

    /// 全栈最小值和最大值. 空数据返回 `None`.
    pub fn min_max(&self) -> Option<(u16, u16)> {
        let mut it = self.data.iter().copied();
        let first = it.next()?;
        Some(it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

/// 3D 二值掩膜. 体素值只能为 `MASK_BACKGROUND` (0) 或 `MASK_FOREGROUND` (255).
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask {
    calibration: Calibration,
    data: Array3<u8>,
}

impl_volume_common!(BinaryMask, u8);

impl BinaryMask {
    /// 直接由 0/255 数据创建. 非零值一律视为前景.
    pub fn new(mut data: Array3<u8>) -> Self {
        data.mapv_inplace(|p| if p == 0 { MASK_BACKGROUND } else { MASK_FOREGROUND });
        Self {
            calibration: Calibration::default(),
            data,
        }
    }

    /// 按谓词创建. `f((z, y, x))` 为 `true` 的位置是前景.
    pub fn from_shape_fn(shape: Idx3d, f: impl Fn(Idx3d) -> bool) -> Self {
        let data = Array3::from_shape_fn(shape, |pos| {
            if f(pos) {
                MASK_FOREGROUND
            } else {
                MASK_BACKGROUND
            }
        });
        Self {
            calibration: Calibration::default(),
            data,
        }
    }

    /// 前景与背景互换.
    pub fn invert(&mut self) {
        self.data.mapv_inplace(|p| {
            if is_mask_foreground(p) {
                MASK_BACKGROUND
            } else {
                MASK_FOREGROUND
            }
        });
    }

    /// 前景体素个数.
    #[inline]
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|p| is_mask_foreground(**p)).count()
    }

    /// 是否全为前景?
    #[inline]
    pub fn is_all_foreground(&self) -> bool {
        self.data.iter().copied().all(is_mask_foreground)
    }
}

/// 3D 标签体. `0` 是背景, 每个正整数代表一个连通区域.
///
/// 刚完成标记时标签连续 (`1..=K`); 经过边界过滤后可能出现空洞,
/// 下游代码不能假设连续性.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelVolume {
    depth: LabelDepth,
    calibration: Calibration,
    data: Array3<u32>,
}

impl_volume_common!(LabelVolume, u32);

impl LabelVolume {
    /// 直接由标签数据创建.
    ///
    /// # 注意
    ///
    /// `data` 中的标签不应超过 `depth.max_label()`, 否则写出时会被截断.
    #[inline]
    pub fn new(data: Array3<u32>, depth: LabelDepth) -> Self {
        debug_assert!(data.iter().all(|l| *l <= depth.max_label()));
        Self {
            depth,
            calibration: Calibration::default(),
            data,
        }
    }

    /// 标签位深.
    #[inline]
    pub fn label_depth(&self) -> LabelDepth {
        self.depth
    }

    /// 最大标签值. 全背景时为 0.
    #[inline]
    pub fn max_label(&self) -> u32 {
        self.data.iter().copied().max().unwrap_or(LABEL_BACKGROUND)
    }

    /// 收集所有出现过的非背景标签, 升序.
    pub fn labels(&self) -> BTreeSet<u32> {
        self.data
            .iter()
            .copied()
            .filter(|l| !is_label_background(*l))
            .collect()
    }

    /// 获取值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u32) -> usize {
        self.data.iter().filter(|l| **l == label).count()
    }

    /// 非背景体素个数.
    #[inline]
    pub fn count_foreground(&self) -> usize {
        self.data
            .iter()
            .filter(|l| !is_label_background(**l))
            .count()
    }

    /// 收集值为 `label` 的所有体素下标, 结果按行优先存储.
    pub fn positions_of(&self, label: u32) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, l)| (*l == label).then_some(pos))
            .collect()
    }

    /// 将 `labels` 中的标签全部替换为背景.
    ///
    /// 返回总共被清零的体素个数.
    pub fn clear_labels(&mut self, labels: &BTreeSet<u32>) -> usize {
        if labels.is_empty() {
            return 0;
        }
        let mut cnt = 0usize;
        self.data
            .iter_mut()
            .filter(|l| labels.contains(&**l))
            .for_each(|l| {
                cnt += 1;
                *l = LABEL_BACKGROUND;
            });
        cnt
    }

    /// 将剩余标签按首次出现的行优先顺序重新编号为 `1..=K`.
    ///
    /// 返回重新编号后的标签个数 `K`.
    pub fn relabel(&mut self) -> u32 {
        let mut mapping = std::collections::HashMap::new();
        let mut next = LABEL_BACKGROUND;
        for l in self.data.iter_mut().filter(|l| !is_label_background(**l)) {
            *l = *mapping.entry(*l).or_insert_with(|| {
                next += 1;
                next
            });
        }
        next
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl VolumeImage {
    /// 借助 `rayon`, 并行地对每个水平可变切片实施 `op` 操作.
    pub fn par_for_each_slice_mut<F>(&mut self, op: F)
    where
        F: Fn(ArrayViewMut2<u16>) + Sync + Send,
    {
        self.data
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(op);
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl LabelVolume {
    /// 借助 `rayon`, 并行地将 `labels` 中的标签全部替换为背景.
    ///
    /// 返回总共被清零的体素个数.
    pub fn par_clear_labels(&mut self, labels: &BTreeSet<u32>) -> usize {
        if labels.is_empty() {
            return 0;
        }
        let cnt = AtomicUsize::new(0);
        self.data
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .for_each(|mut sli| {
                let mut local = 0usize;
                sli.iter_mut().filter(|l| labels.contains(&**l)).for_each(|l| {
                    local += 1;
                    *l = LABEL_BACKGROUND;
                });
                cnt.fetch_add(local, Ordering::Release);
            });
        cnt.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_volume_clamps_to_depth() {
        let data = Array3::from_elem((2, 2, 2), 1000u16);
        let v = VolumeImage::new("a.tif", BitDepth::Eight, data);
        assert!(v.data().iter().all(|p| *p == 255));
        assert_eq!(v.min_max(), Some((255, 255)));
        assert_eq!(v.title(), "a.tif");
    }

    #[test]
    fn test_border_predicate() {
        let v = VolumeImage::new("b", BitDepth::Sixteen, Array3::zeros((3, 4, 5)));
        assert!(v.is_on_border(&(0, 1, 1)));
        assert!(v.is_on_border(&(2, 1, 1)));
        assert!(v.is_on_border(&(1, 3, 1)));
        assert!(v.is_on_border(&(1, 1, 4)));
        assert!(!v.is_on_border(&(1, 1, 1)));
        assert!(!v.is_on_border(&(1, 2, 3)));
        assert_eq!(v.size(), 60);
        assert_eq!(v.slice_shape(), (4, 5));
    }

    #[test]
    fn test_mask_invert() {
        let mut m = BinaryMask::from_shape_fn((2, 2, 2), |(z, _, _)| z == 0);
        assert_eq!(m.count_foreground(), 4);
        m.invert();
        assert_eq!(m.count_foreground(), 4);
        assert_eq!(m[(0, 0, 0)], MASK_BACKGROUND);
        assert_eq!(m[(1, 1, 1)], MASK_FOREGROUND);
        assert!(!m.is_all_foreground());
    }

    #[test]
    fn test_relabel_compacts_in_scan_order() {
        let mut data = Array3::zeros((1, 1, 6));
        data[(0, 0, 1)] = 7;
        data[(0, 0, 2)] = 3;
        data[(0, 0, 4)] = 7;
        data[(0, 0, 5)] = 9;
        let mut lv = LabelVolume::new(data, LabelDepth::Sixteen);
        assert_eq!(lv.relabel(), 3);
        assert_eq!(
            lv.data().iter().copied().collect::<Vec<_>>(),
            vec![0, 1, 2, 0, 1, 3]
        );
    }

    #[test]
    fn test_clear_labels() {
        let data = Array3::from_shape_fn((2, 2, 2), |(z, y, _)| (z * 2 + y) as u32);
        let mut lv = LabelVolume::new(data, LabelDepth::Eight);
        let removed: BTreeSet<u32> = [1, 3].into_iter().collect();
        assert_eq!(lv.clear_labels(&removed), 4);
        assert_eq!(lv.labels(), [2].into_iter().collect());
        assert_eq!(lv.count(0), 6);
        assert_eq!(lv.positions_of(2), vec![(1, 0, 0), (1, 0, 1)]);
    }

    #[test]
    fn test_label_depth_bits() {
        assert_eq!(LabelDepth::from_bits(16), Some(LabelDepth::Sixteen));
        assert_eq!(LabelDepth::from_bits(12), None);
        assert_eq!(LabelDepth::Eight.max_label(), 255);
        assert_eq!(LabelDepth::default().max_label(), 65535);
    }
}
