//! 体数据的可视化持久化存储.

use crate::consts::gray::*;
use crate::{LabelVolume, VolumeAttr};
use image::ImageResult;
use ndarray::{ArrayView3, Axis};
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的体数据对象.
///
/// `ImgWriteVis` trait 的意图是, 三维数据将以 "可视化友好" 的二维方式保存,
/// 而不是 "as is" 的方式: 沿 z 方向做最大值投影, 所有非背景标签
/// 位置映射为白色, 其余为黑色. 图像格式由 `path` 的扩展名决定.
pub trait ImgWriteVis {
    /// 按照可视化规则将 z 投影保存到 `path` 路径.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 沿 z 方向投影, `pred` 为真的列映射为白色.
fn save_projection<T: Copy, P: AsRef<Path>>(
    data: ArrayView3<T>,
    pred: impl Fn(T) -> bool,
    path: P,
) -> ImageResult<()> {
    let (_, height, width) = data.dim();
    let mut buf = image::GrayImage::new(width as u32, height as u32);
    for sli in data.axis_iter(Axis(0)) {
        for ((h, w), &pix) in sli.indexed_iter() {
            if pred(pix) {
                buf.put_pixel(w as u32, h as u32, image::Luma([WHITE]));
            }
        }
    }
    buf.save(path)
}

/// 任何非背景标签都映射为白色.
impl ImgWriteVis for LabelVolume {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        debug_assert_ne!(self.size(), 0);
        save_projection(self.data(), |l| !is_label_background(l), path)
    }
}

#[cfg(test)]
mod tests {
    use super::ImgWriteVis;
    use crate::{LabelDepth, LabelVolume};
    use ndarray::Array3;

    #[test]
    fn test_label_projection_png() {
        let mut data = Array3::zeros((3, 4, 5));
        data[(2, 1, 3)] = 9u32;
        let lv = LabelVolume::new(data, LabelDepth::Sixteen);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p_mask_zproj.png");
        lv.save(&path).unwrap();

        let img = image::open(&path).unwrap().into_luma8();
        assert_eq!(img.dimensions(), (5, 4));
        assert_eq!(img.get_pixel(3, 1).0, [255]);
        assert_eq!(img.get_pixel(0, 0).0, [0]);
    }
}
