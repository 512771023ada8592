#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 体素的物理尺寸与单位.
///
/// 默认各方向均为 `1.0`, 单位为 `"pixel"`, 即未定标.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Calibration {
    /// 宽度方向 (x) 的体素尺寸.
    pub x: f64,

    /// 高度方向 (y) 的体素尺寸.
    pub y: f64,

    /// 切片方向 (z) 的体素尺寸.
    pub z: f64,

    /// 长度单位.
    pub unit: String,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            x: 1.0,
            y: 1.0,
            z: 1.0,
            unit: String::from("pixel"),
        }
    }
}

impl Calibration {
    /// 构造定标信息. 非有限或非正的尺寸会被替换为 `1.0`.
    pub fn new(x: f64, y: f64, z: f64, unit: impl Into<String>) -> Self {
        #[inline]
        fn sane(v: f64) -> f64 {
            if v.is_finite() && v > 0.0 {
                v
            } else {
                1.0
            }
        }
        Self {
            x: sane(x),
            y: sane(y),
            z: sane(z),
            unit: unit.into(),
        }
    }

    /// 单个体素的体积.
    #[inline]
    pub fn voxel_volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// 法向为 x 的体素面面积.
    #[inline]
    pub fn face_area_x(&self) -> f64 {
        self.y * self.z
    }

    /// 法向为 y 的体素面面积.
    #[inline]
    pub fn face_area_y(&self) -> f64 {
        self.x * self.z
    }

    /// 法向为 z 的体素面面积.
    #[inline]
    pub fn face_area_z(&self) -> f64 {
        self.x * self.y
    }

    /// 是否未定标 (单位为像素且尺寸全为 1)?
    #[inline]
    pub fn is_uncalibrated(&self) -> bool {
        self.x == 1.0 && self.y == 1.0 && self.z == 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::Calibration;

    #[test]
    fn test_calibration_sanitize() {
        let c = Calibration::new(0.5, f64::NAN, -2.0, "micron");
        assert_eq!(c.x, 0.5);
        assert_eq!(c.y, 1.0);
        assert_eq!(c.z, 1.0);
        assert_eq!(c.unit, "micron");
        assert!(!c.is_uncalibrated());
        assert!(Calibration::default().is_uncalibrated());
    }

    #[test]
    fn test_calibration_areas() {
        let c = Calibration::new(0.5, 0.25, 2.0, "micron");
        assert_eq!(c.voxel_volume(), 0.25);
        assert_eq!(c.face_area_x(), 0.5);
        assert_eq!(c.face_area_y(), 1.0);
        assert_eq!(c.face_area_z(), 0.125);
    }
}
