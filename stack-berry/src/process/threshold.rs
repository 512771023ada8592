//! 全栈直方图自动阈值与二值化.

use crate::consts::{ElemType, HISTOGRAM_BINS};
use crate::{BinaryMask, BitDepth, VolumeAttr, VolumeImage};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 全栈 256-bin 直方图.
///
/// - 8-bit: bin 即像素值本身;
/// - 16-bit: bin 线性覆盖 `[全栈最小值, 全栈最大值]`, 常量栈全部落在 bin 0.
#[derive(Clone, Debug)]
pub struct StackHistogram {
    counts: [u64; HISTOGRAM_BINS],
    depth: BitDepth,
    min: u16,
    max: u16,
}

impl StackHistogram {
    /// 统计整个栈.
    pub fn of(image: &VolumeImage) -> Self {
        let (min, max) = image.min_max().unwrap_or((0, 0));
        let mut ans = Self {
            counts: [0; HISTOGRAM_BINS],
            depth: image.bit_depth(),
            min,
            max,
        };
        for v in image.data().iter() {
            ans.counts[ans.bin_of(*v)] += 1;
        }
        ans
    }

    /// 各 bin 计数.
    #[inline]
    pub fn counts(&self) -> &[u64; HISTOGRAM_BINS] {
        &self.counts
    }

    /// 像素值 `v` 所在的 bin.
    #[inline]
    pub fn bin_of(&self, v: u16) -> usize {
        match self.depth {
            BitDepth::Eight => v.min(u8::MAX as u16) as usize,
            BitDepth::Sixteen if self.max > self.min => {
                let offset = v.saturating_sub(self.min) as u64;
                let bin = offset * HISTOGRAM_BINS as u64 / (self.max - self.min) as u64;
                (bin as usize).min(HISTOGRAM_BINS - 1)
            }
            BitDepth::Sixteen => 0,
        }
    }

    /// bin `level` 起点对应的原始像素值.
    pub fn value_of(&self, level: usize) -> f64 {
        match self.depth {
            BitDepth::Eight => level as f64,
            BitDepth::Sixteen => {
                let span = (self.max - self.min) as f64;
                self.min as f64 + level as f64 * span / HISTOGRAM_BINS as f64
            }
        }
    }
}

/// 自动阈值策略. 由直方图计算阈值所在的 bin.
pub trait AutoThreshold: Send + Sync {
    /// 返回阈值 bin, 取值 `0..HISTOGRAM_BINS`.
    fn level(&self, counts: &[u64; HISTOGRAM_BINS]) -> usize;
}

/// 内置自动阈值方法.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ThresholdMethod {
    /// ImageJ 的默认方法 (旧版迭代 IsoData). 两端 bin 不参与计算.
    #[default]
    Default,

    /// 最大类间方差.
    Otsu,

    /// 灰度均值.
    Mean,
}

impl fmt::Display for ThresholdMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Default => "default",
            Self::Otsu => "otsu",
            Self::Mean => "mean",
        };
        f.write_str(s)
    }
}

impl FromStr for ThresholdMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" | "isodata" => Ok(Self::Default),
            "otsu" => Ok(Self::Otsu),
            "mean" => Ok(Self::Mean),
            _ => Err(format!("未知的阈值方法 '{s}', 可选: default, otsu, mean")),
        }
    }
}

impl AutoThreshold for ThresholdMethod {
    fn level(&self, counts: &[u64; HISTOGRAM_BINS]) -> usize {
        match self {
            Self::Default => iso_data(counts),
            Self::Otsu => otsu(counts),
            Self::Mean => mean(counts),
        }
    }
}

/// 两端 bin 清零后迭代: 阈值取下方均值与上方均值的中点, 直到收敛.
/// 有效 bin 少于两个时返回中点 128.
fn iso_data(counts: &[u64; HISTOGRAM_BINS]) -> usize {
    let last = HISTOGRAM_BINS - 1;
    let mut data = *counts;
    data[0] = 0;
    data[last] = 0;

    let mut min = 0;
    while data[min] == 0 && min < last {
        min += 1;
    }
    let mut max = last;
    while data[max] == 0 && max > 0 {
        max -= 1;
    }
    if min >= max {
        return HISTOGRAM_BINS / 2;
    }

    let mut moving = min;
    let mut result;
    loop {
        let (mut sum1, mut sum2, mut sum3, mut sum4) = (0.0, 0.0, 0.0, 0.0);
        for (i, c) in data.iter().enumerate().take(moving + 1).skip(min) {
            sum1 += i as f64 * *c as f64;
            sum2 += *c as f64;
        }
        for (i, c) in data.iter().enumerate().take(max + 1).skip(moving + 1) {
            sum3 += i as f64 * *c as f64;
            sum4 += *c as f64;
        }
        result = (sum1 / sum2 + sum3 / sum4) / 2.0;
        moving += 1;
        if !((moving + 1) as f64 <= result && moving < max - 1) {
            break;
        }
    }
    (result + 0.5).floor() as usize
}

fn otsu(counts: &[u64; HISTOGRAM_BINS]) -> usize {
    let total: f64 = counts.iter().map(|c| *c as f64).sum();
    let sum: f64 = counts
        .iter()
        .enumerate()
        .map(|(i, c)| i as f64 * *c as f64)
        .sum();

    let (mut w_b, mut sum_b) = (0.0, 0.0);
    let (mut best, mut best_var) = (0, 0.0);
    for (t, c) in counts.iter().enumerate() {
        w_b += *c as f64;
        if w_b == 0.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f == 0.0 {
            break;
        }
        sum_b += t as f64 * *c as f64;
        let diff = sum_b / w_b - (sum - sum_b) / w_f;
        let var = w_b * w_f * diff * diff;
        if var > best_var {
            best_var = var;
            best = t;
        }
    }
    best
}

fn mean(counts: &[u64; HISTOGRAM_BINS]) -> usize {
    let total: f64 = counts.iter().map(|c| *c as f64).sum();
    if total == 0.0 {
        return 0;
    }
    let sum: f64 = counts
        .iter()
        .enumerate()
        .map(|(i, c)| i as f64 * *c as f64)
        .sum();
    (sum / total).floor() as usize
}

/// 前景极性.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Polarity {
    /// 暗背景: bin 大于阈值的是前景.
    #[default]
    Dark,

    /// 亮背景: bin 不大于阈值的是前景.
    Light,
}

impl Polarity {
    /// 按阈值 `level` 判断 `bin` 的类型.
    #[inline]
    pub fn classify(&self, bin: usize, level: usize) -> ElemType {
        let above = bin > level;
        match (self, above) {
            (Self::Dark, true) | (Self::Light, false) => ElemType::Foreground,
            _ => ElemType::Background,
        }
    }
}

impl FromStr for Polarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            _ => Err(format!("未知的极性 '{s}', 可选: dark, light")),
        }
    }
}

/// 一次二值化实际使用的阈值.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Threshold {
    /// 阈值 bin.
    pub level: usize,

    /// 分界像素值, 即 bin `level + 1` 的起点. 暗背景时不小于它的是前景,
    /// 亮背景时小于它的是前景.
    pub cut: f64,
}

/// 二值化器: 全栈阈值, 转为 0/255 掩膜, 然后 **总是取反**.
pub struct Binarizer {
    method: Box<dyn AutoThreshold>,
    polarity: Polarity,
}

impl Default for Binarizer {
    fn default() -> Self {
        Self::new(Box::new(ThresholdMethod::Default), Polarity::Dark)
    }
}

impl Binarizer {
    /// 由阈值策略和极性构造.
    pub fn new(method: Box<dyn AutoThreshold>, polarity: Polarity) -> Self {
        Self { method, polarity }
    }

    /// 替换阈值策略.
    pub fn with_method(self, method: Box<dyn AutoThreshold>) -> Self {
        Self { method, ..self }
    }

    /// 极性.
    #[inline]
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// 二值化 `image` 的一份拷贝, `image` 本身不变.
    ///
    /// 返回的掩膜已经取反: 按极性判为前景的体素最终为 0, 其余为 255.
    pub fn binarize(&self, image: &VolumeImage) -> (Threshold, BinaryMask) {
        let hist = StackHistogram::of(image);
        let level = self.method.level(hist.counts()).min(HISTOGRAM_BINS - 1);
        let data = image
            .data()
            .mapv(|v| self.polarity.classify(hist.bin_of(v), level).to_mask());
        let mut mask = BinaryMask::new(data).with_calibration(image.calibration().clone());
        mask.invert();
        let threshold = Threshold {
            level,
            cut: hist.value_of(level + 1),
        };
        (threshold, mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn bimodal() -> VolumeImage {
        let data = Array3::from_shape_fn((4, 6, 6), |(z, _, _)| if z < 2 { 20 } else { 200 });
        VolumeImage::new("bimodal", BitDepth::Eight, data)
    }

    #[test]
    fn test_degenerate_histogram_is_midpoint() {
        let mut counts = [0u64; HISTOGRAM_BINS];
        assert_eq!(ThresholdMethod::Default.level(&counts), 128);
        counts[0] = 1000;
        counts[255] = 10;
        assert_eq!(ThresholdMethod::Default.level(&counts), 128);
        counts[40] = 3;
        assert_eq!(ThresholdMethod::Default.level(&counts), 128);
    }

    #[test]
    fn test_bimodal_levels() {
        let hist = StackHistogram::of(&bimodal());
        assert_eq!(hist.counts()[20], 72);
        assert_eq!(hist.counts()[200], 72);
        assert_eq!(ThresholdMethod::Default.level(hist.counts()), 110);
        assert_eq!(ThresholdMethod::Mean.level(hist.counts()), 110);
        assert_eq!(ThresholdMethod::Otsu.level(hist.counts()), 20);
    }

    #[test]
    fn test_all_zero_stack_inverts_to_full_mask() {
        let img = VolumeImage::new("zero", BitDepth::Eight, Array3::zeros((10, 10, 10)));
        let (th, mask) = Binarizer::default().binarize(&img);
        assert_eq!(th.level, 128);
        assert!(mask.is_all_foreground());
    }

    #[test]
    fn test_binarize_inverts() {
        let img = bimodal();
        let (th, mask) = Binarizer::default().binarize(&img);
        assert_eq!(th.level, 110);
        // bin 110 属于背景, 前景从 111 开始.
        assert_eq!(th.cut, 111.0);
        for (v, m) in img.data().iter().zip(mask.data().iter()) {
            assert_eq!(*v as f64 >= th.cut, *m == 0);
        }
        // 亮的一半是前景, 取反后暗的一半为 255.
        assert_eq!(mask.count_foreground(), 72);
        assert_eq!(mask[(0, 0, 0)], 255);
        assert_eq!(mask[(3, 0, 0)], 0);

        let (_, light) = Binarizer::new(Box::new(ThresholdMethod::Default), Polarity::Light)
            .binarize(&img);
        assert_eq!(light[(0, 0, 0)], 0);
        assert_eq!(light[(3, 0, 0)], 255);
    }

    #[test]
    fn test_sixteen_bit_bins() {
        let data = Array3::from_shape_fn((2, 1, 3), |(_, _, x)| 1000 + 1000 * x as u16);
        let hist = StackHistogram::of(&VolumeImage::new("h", BitDepth::Sixteen, data.clone()));
        assert_eq!(hist.bin_of(1000), 0);
        assert_eq!(hist.bin_of(2000), 128);
        assert_eq!(hist.bin_of(3000), 255);
        assert_eq!(hist.value_of(128), 2000.0);

        // 暗背景下前景恰好是不小于分界值的像素.
        let img = VolumeImage::new("h", BitDepth::Sixteen, data);
        let (th, mask) = Binarizer::default().binarize(&img);
        for (v, m) in img.data().iter().zip(mask.data().iter()) {
            assert_eq!(*v as f64 >= th.cut, *m == 0, "{v} vs {}", th.cut);
        }

        let flat = VolumeImage::new("f", BitDepth::Sixteen, Array3::from_elem((2, 2, 2), 700));
        assert_eq!(StackHistogram::of(&flat).counts()[0], 8);
    }

    #[test]
    fn test_parse_method() {
        assert_eq!("Otsu".parse::<ThresholdMethod>(), Ok(ThresholdMethod::Otsu));
        assert_eq!("default".parse::<ThresholdMethod>(), Ok(ThresholdMethod::Default));
        assert!("triangle".parse::<ThresholdMethod>().is_err());
        assert_eq!(ThresholdMethod::Mean.to_string(), "mean");
        assert_eq!("LIGHT".parse::<Polarity>(), Ok(Polarity::Light));
    }
}
