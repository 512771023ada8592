//! ImageJ 风格 TIFF 描述 (`ImageDescription` 标签) 的解析与生成.
//!
//! ImageJ 把栈的结构和 z 方向定标写在第一个 IFD 的描述字符串中, 形如:
//!
//! ```text
//! ImageJ=1.54f
//! images=12
//! slices=12
//! unit=micron
//! spacing=0.5
//! loop=false
//! ```

use crate::Calibration;

/// 描述字符串的首行前缀.
const IMAGEJ_PREFIX: &str = "ImageJ=";

/// 写出时使用的版本号.
const IMAGEJ_VERSION: &str = "1.54f";

/// 从 ImageJ 描述中解析出的栈信息.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageJDescription {
    /// 图像 (页) 总数.
    pub images: Option<usize>,

    /// z 切片数.
    pub slices: Option<usize>,

    /// 通道数.
    pub channels: Option<usize>,

    /// 时间帧数.
    pub frames: Option<usize>,

    /// 长度单位.
    pub unit: Option<String>,

    /// z 方向体素尺寸.
    pub spacing: Option<f64>,
}

impl ImageJDescription {
    /// 解析描述字符串. 不是 ImageJ 描述时返回 `None`.
    ///
    /// 无法解析的键值对会被忽略.
    pub fn parse(text: &str) -> Option<Self> {
        if !text.starts_with(IMAGEJ_PREFIX) {
            return None;
        }
        let mut ans = Self::default();
        for (key, value) in text
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
        {
            match key {
                "images" => ans.images = value.parse().ok(),
                "slices" => ans.slices = value.parse().ok(),
                "channels" => ans.channels = value.parse().ok(),
                "frames" => ans.frames = value.parse().ok(),
                "unit" => ans.unit = Some(unescape_unit(value)),
                "spacing" => ans.spacing = value.parse().ok(),
                _ => {}
            }
        }
        Some(ans)
    }

    /// 是否是多通道或多帧的超栈?
    #[inline]
    pub fn is_hyperstack(&self) -> bool {
        self.channels.is_some_and(|c| c > 1) || self.frames.is_some_and(|f| f > 1)
    }
}

/// ImageJ 用 `\u00B5m` 表示微米.
fn unescape_unit(unit: &str) -> String {
    unit.replace("\\u00B5", "µ")
}

/// 生成单通道 z 栈的 ImageJ 描述.
///
/// `max` 为显示范围上限.
pub fn format_description(slices: usize, calibration: &Calibration, max: f64) -> String {
    let mut ans = format!("{IMAGEJ_PREFIX}{IMAGEJ_VERSION}\nimages={slices}\nslices={slices}\n");
    if !calibration.is_uncalibrated() || calibration.unit != "pixel" {
        ans.push_str(&format!(
            "unit={}\nspacing={}\n",
            calibration.unit.replace('µ', "\\u00B5"),
            calibration.z
        ));
    }
    ans.push_str(&format!("loop=false\nmin=0.0\nmax={max:.1}\n"));
    ans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_imagej_description() {
        let text = "ImageJ=1.53t\nimages=24\nchannels=2\nslices=12\nhyperstack=true\n\
                    unit=\\u00B5m\nspacing=0.35\nloop=false\n";
        let d = ImageJDescription::parse(text).unwrap();
        assert_eq!(d.images, Some(24));
        assert_eq!(d.slices, Some(12));
        assert_eq!(d.channels, Some(2));
        assert_eq!(d.frames, None);
        assert_eq!(d.unit.as_deref(), Some("µm"));
        assert_eq!(d.spacing, Some(0.35));
        assert!(d.is_hyperstack());
    }

    #[test]
    fn test_parse_foreign_description() {
        assert_eq!(ImageJDescription::parse("OME-XML ..."), None);
    }

    #[test]
    fn test_format_description() {
        let plain = format_description(5, &Calibration::default(), 3.0);
        assert!(plain.starts_with("ImageJ=1.54f\nimages=5\nslices=5\n"));
        assert!(!plain.contains("spacing"));

        let c = Calibration::new(0.2, 0.2, 1.5, "µm");
        let d = ImageJDescription::parse(&format_description(7, &c, 65535.0)).unwrap();
        assert_eq!(d.slices, Some(7));
        assert_eq!(d.spacing, Some(1.5));
        assert_eq!(d.unit.as_deref(), Some("µm"));
        assert!(!d.is_hyperstack());
    }
}
