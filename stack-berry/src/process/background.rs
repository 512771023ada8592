//! 逐平面 rolling ball 背景扣除.
//!
//! 算法流程与 ImageJ 的 "Subtract Background" 一致: 可选的 3x3 均值预平滑,
//! 按块最小值缩小, 在缩小后的图像下方滚球 (灰度开运算), 双线性放大回原尺寸,
//! 最后从原图中扣除.

use crate::consts::MAX_ROLLING_BALL_RADIUS;
use crate::{Idx2d, VolumeImage};
use ndarray::{s, Array2, ArrayViewMut2, Zip};

/// 背景扣除策略.
pub trait BackgroundSubtractor: Send + Sync {
    /// 返回扣除背景后的新图像. 形状、位深、标题和定标都与 `image` 相同.
    fn subtract(&self, image: &VolumeImage) -> VolumeImage;
}

/// 不做任何扣除, 原样返回.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoSubtraction;

impl BackgroundSubtractor for NoSubtraction {
    #[inline]
    fn subtract(&self, image: &VolumeImage) -> VolumeImage {
        image.clone()
    }
}

/// rolling ball 背景扣除, 对每个 z 平面独立进行.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RollingBall {
    /// 球半径 (像素).
    pub radius: f64,

    /// 滚球前是否做 3x3 均值平滑.
    pub presmooth: bool,
}

impl Default for RollingBall {
    fn default() -> Self {
        Self {
            radius: crate::consts::DEFAULT_ROLLING_BALL_RADIUS,
            presmooth: true,
        }
    }
}

/// 按半径选择策略: 半径不是正数时不扣除背景.
pub fn subtractor_for(radius: f64, presmooth: bool) -> Box<dyn BackgroundSubtractor> {
    if radius > 0.0 {
        Box::new(RollingBall { radius, presmooth })
    } else {
        Box::new(NoSubtraction)
    }
}

/// 缩小后的球面高度表.
#[derive(Debug)]
struct Ball {
    /// `width x width` 的高度, 中心最高.
    heights: Array2<f32>,

    /// 缩小倍数.
    shrink: usize,
}

impl Ball {
    fn new(radius: f64) -> Self {
        let radius = radius.min(MAX_ROLLING_BALL_RADIUS);
        let (shrink, arc_trim) = if radius <= 10.0 {
            (1, 24)
        } else if radius <= 30.0 {
            (2, 24)
        } else if radius <= 100.0 {
            (4, 32)
        } else {
            (8, 40)
        };
        let r = (radius / shrink as f64).max(1.0);
        let r2 = r * r;
        let xtrim = (arc_trim as f64 * r) as i64 / 100;
        let half = (r - xtrim as f64).round() as i64;
        let width = (2 * half + 1) as usize;
        let heights = Array2::from_shape_fn((width, width), |(y, x)| {
            let dy = y as i64 - half;
            let dx = x as i64 - half;
            let t = r2 - (dx * dx + dy * dy) as f64;
            if t > 0.0 {
                t.sqrt() as f32
            } else {
                0.0
            }
        });
        Self { heights, shrink }
    }

    #[inline]
    fn half(&self) -> isize {
        (self.heights.nrows() / 2) as isize
    }
}

/// 可分离的 3x3 均值滤波, 边缘复制.
fn smooth3x3(src: &Array2<f32>) -> Array2<f32> {
    let (h, w) = src.dim();
    let clip = |v: isize, len: usize| v.clamp(0, len as isize - 1) as usize;
    let rows = Array2::from_shape_fn((h, w), |(y, x)| {
        let x = x as isize;
        (src[(y, clip(x - 1, w))] + src[(y, clip(x, w))] + src[(y, clip(x + 1, w))]) / 3.0
    });
    Array2::from_shape_fn((h, w), |(y, x)| {
        let y = y as isize;
        (rows[(clip(y - 1, h), x)] + rows[(clip(y, h), x)] + rows[(clip(y + 1, h), x)]) / 3.0
    })
}

/// 按 `factor x factor` 块取最小值缩小. 边缘不完整的块同样参与.
fn shrink(src: &Array2<f32>, factor: usize) -> Array2<f32> {
    let (h, w) = src.dim();
    Array2::from_shape_fn((h.div_ceil(factor), w.div_ceil(factor)), |(y, x)| {
        src.slice(s![
            y * factor..((y + 1) * factor).min(h),
            x * factor..((x + 1) * factor).min(w)
        ])
        .fold(f32::MAX, |acc, v| acc.min(*v))
    })
}

/// 在 `src` 下方滚球, 返回球能到达的最高位置 (灰度开运算).
///
/// 球心遍历 `[-half, len + half)`, 越界部分的球面被裁掉.
fn roll_ball(src: &Array2<f32>, ball: &Ball) -> Array2<f32> {
    let (h, w) = src.dim();
    let (hi, wi) = (h as isize, w as isize);
    let r = ball.half();
    let mut out = Array2::from_elem((h, w), f32::MIN);

    for cy in -r..hi + r {
        let (y0, y1) = ((cy - r).max(0), (cy + r).min(hi - 1));
        for cx in -r..wi + r {
            let (x0, x1) = ((cx - r).max(0), (cx + r).min(wi - 1));
            let height = |y: isize, x: isize| ball.heights[((y - cy + r) as usize, (x - cx + r) as usize)];

            let mut z = f32::MAX;
            for y in y0..=y1 {
                for x in x0..=x1 {
                    z = z.min(src[(y as usize, x as usize)] - height(y, x));
                }
            }
            for y in y0..=y1 {
                for x in x0..=x1 {
                    let p = &mut out[(y as usize, x as usize)];
                    *p = p.max(z + height(y, x));
                }
            }
        }
    }
    out
}

/// 双线性放大的插值表: `(下标, 下一个下标, 下标的权重)`. 以像素中心对齐.
fn interpolation(len: usize, small_len: usize, factor: usize) -> Vec<(usize, usize, f32)> {
    let (f, last) = (factor as i64, small_len as i64 - 1);
    (0..len as i64)
        .map(|i| {
            let idx = ((i - f / 2) / f).min(last - 1).max(0);
            let weight = 1.0 - ((i as f32 + 0.5) / factor as f32 - (idx as f32 + 0.5));
            (idx as usize, (idx + 1).min(last) as usize, weight)
        })
        .collect()
}

fn enlarge(small: &Array2<f32>, (h, w): Idx2d, factor: usize) -> Array2<f32> {
    let (sh, sw) = small.dim();
    let ys = interpolation(h, sh, factor);
    let xs = interpolation(w, sw, factor);
    Array2::from_shape_fn((h, w), |(y, x)| {
        let (y0, y1, wy) = ys[y];
        let (x0, x1, wx) = xs[x];
        let line = |row: usize| small[(row, x0)] * wx + small[(row, x1)] * (1.0 - wx);
        line(y0) * wy + line(y1) * (1.0 - wy)
    })
}

impl RollingBall {
    /// 估计单个平面的背景.
    fn background(&self, plane: &Array2<f32>, ball: &Ball) -> Array2<f32> {
        let smoothed;
        let base = if self.presmooth {
            smoothed = smooth3x3(plane);
            &smoothed
        } else {
            plane
        };
        if ball.shrink > 1 {
            let rolled = roll_ball(&shrink(base, ball.shrink), ball);
            enlarge(&rolled, plane.dim(), ball.shrink)
        } else {
            roll_ball(base, ball)
        }
    }

    /// 原地扣除单个平面的背景. 背景被限制在 `[0, 原值]` 内.
    fn subtract_plane(&self, plane: ArrayViewMut2<u16>, ball: &Ball, max: f32) {
        let orig = plane.mapv(|v| v as f32);
        let bg = self.background(&orig, ball);
        Zip::from(plane)
            .and(&orig)
            .and(&bg)
            .for_each(|p, &o, &b| {
                let b = num::clamp(b, 0.0, o);
                *p = num::clamp((o - b + 0.5).floor(), 0.0, max) as u16;
            });
    }
}

impl BackgroundSubtractor for RollingBall {
    fn subtract(&self, image: &VolumeImage) -> VolumeImage {
        let ball = Ball::new(self.radius);
        let max = image.bit_depth().max_value() as f32;
        let mut out = image.clone();
        #[cfg(feature = "rayon")]
        out.par_for_each_slice_mut(|plane| self.subtract_plane(plane, &ball, max));
        #[cfg(not(feature = "rayon"))]
        for plane in out.slice_iter_mut() {
            self.subtract_plane(plane, &ball, max);
        }
        out
    }
}
