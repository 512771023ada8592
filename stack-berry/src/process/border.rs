//! 边界过滤: 删除接触体数据外壳的区域.

use crate::consts::gray::is_label_background;
use crate::{LabelVolume, VolumeAttr};
use ndarray::Axis;
use std::collections::BTreeSet;

/// 收集出现在六个表面上的全部非背景标签.
pub fn border_labels(labels: &LabelVolume) -> BTreeSet<u32> {
    let mut ans = BTreeSet::new();
    if labels.size() == 0 {
        return ans;
    }
    let (z, h, w) = labels.shape();
    let data = labels.data();
    macro_rules! collect_face {
        ($axis: expr, $index: expr) => {
            ans.extend(
                data.index_axis(Axis($axis), $index)
                    .iter()
                    .copied()
                    .filter(|l| !is_label_background(*l)),
            );
        };
    }
    collect_face!(0, 0);
    collect_face!(0, z - 1);
    collect_face!(1, 0);
    collect_face!(1, h - 1);
    collect_face!(2, 0);
    collect_face!(2, w - 1);
    ans
}

/// 将任何接触六个表面之一的标签 **整体** 清零 (哪怕只有一个体素接触).
///
/// 返回被删除的标签集合. 该操作幂等, 且只会删除不会新增标签.
pub fn remove_border_labels(labels: &mut LabelVolume) -> BTreeSet<u32> {
    let removed = border_labels(labels);
    #[cfg(feature = "rayon")]
    let voxels = labels.par_clear_labels(&removed);
    #[cfg(not(feature = "rayon"))]
    let voxels = labels.clear_labels(&removed);
    log::debug!("边界过滤: 删除 {} 个标签, 共 {voxels} 个体素", removed.len());
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LabelDepth;
    use ndarray::{s, Array3};

    fn sample() -> LabelVolume {
        let mut data = Array3::zeros((10, 10, 10));
        // 接触 z = 0 表面的小块.
        data.slice_mut(s![0..2, 0..2, 0..2]).fill(1u32);
        // 内部立方体.
        data.slice_mut(s![4..7, 4..7, 4..7]).fill(2u32);
        // 只有一个体素接触 x = 9 表面的长条.
        data.slice_mut(s![5, 2, 3..10]).fill(3u32);
        LabelVolume::new(data, LabelDepth::Sixteen)
    }

    #[test]
    fn test_border_regions_removed() {
        let mut labels = sample();
        let removed = remove_border_labels(&mut labels);
        assert_eq!(removed, [1, 3].into_iter().collect());
        assert_eq!(labels.labels(), [2].into_iter().collect());
        assert_eq!(labels.count(2), 27);
        assert!(labels
            .data()
            .indexed_iter()
            .all(|(pos, l)| *l == 0 || !labels.is_on_border(&pos)));
    }

    #[test]
    fn test_idempotent_and_subset() {
        let before = sample();
        let mut once = before.clone();
        remove_border_labels(&mut once);
        assert!(once.labels().is_subset(&before.labels()));

        let mut twice = once.clone();
        assert!(remove_border_labels(&mut twice).is_empty());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_everything_on_border() {
        // 2 x 2 x 2 的体数据中每个体素都在外壳上.
        let data = Array3::from_elem((2, 2, 2), 7u32);
        let mut labels = LabelVolume::new(data, LabelDepth::Eight);
        assert_eq!(remove_border_labels(&mut labels), [7].into_iter().collect());
        assert_eq!(labels.count_foreground(), 0);
    }
}
