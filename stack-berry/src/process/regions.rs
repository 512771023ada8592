//! 三维区域统计 (形态学与灰度).

use crate::consts::gray::*;
use crate::neighbour::{shifted, Offset3d};
use crate::{Idx3d, LabelVolume, VolumeAttr, VolumeImage};
use itertools::iproduct;
use std::collections::BTreeMap;
use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 体素坐标轴向的包围盒, 闭区间, 单位为体素.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    /// `(x, y, z)` 方向的最小下标.
    pub min: [usize; 3],

    /// `(x, y, z)` 方向的最大下标.
    pub max: [usize; 3],
}

impl BoundingBox {
    #[inline]
    fn at((z, y, x): Idx3d) -> Self {
        Self {
            min: [x, y, z],
            max: [x, y, z],
        }
    }

    #[inline]
    fn expand(&mut self, (z, y, x): Idx3d) {
        for (axis, v) in [x, y, z].into_iter().enumerate() {
            self.min[axis] = self.min[axis].min(v);
            self.max[axis] = self.max[axis].max(v);
        }
    }
}

/// 区域内的灰度统计量, 取自背景扣除后的图像.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntensityStats {
    /// 均值.
    pub mean: f64,

    /// 总体标准差.
    pub std_dev: f64,

    /// 最小值.
    pub min: u16,

    /// 最大值.
    pub max: u16,
}

/// 等效椭球: 与区域具有相同二阶中心矩的实心椭球.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ellipsoid {
    /// 三个半轴长 (定标单位), 降序.
    pub radii: [f64; 3],

    /// 伸长率 `R1/R2`, `R1/R3`, `R2/R3`, 均不小于 1.
    pub elongations: [f64; 3],
}

impl Ellipsoid {
    /// 由协方差矩阵构造. 实心椭球沿半轴 `r` 的方差为 `r² / 5`.
    fn from_covariance(cov: [[f64; 3]; 3]) -> Self {
        let radii = sym3_eigenvalues(cov).map(|l| (5.0 * l.max(0.0)).sqrt());
        let ratio = |a: f64, b: f64| if b > 0.0 { a / b } else { 0.0 };
        Self {
            radii,
            elongations: [
                ratio(radii[0], radii[1]),
                ratio(radii[0], radii[2]),
                ratio(radii[1], radii[2]),
            ],
        }
    }
}

/// 3x3 实对称矩阵的特征值, 降序. 三角函数闭式解.
fn sym3_eigenvalues(a: [[f64; 3]; 3]) -> [f64; 3] {
    let p1 = a[0][1].powi(2) + a[0][2].powi(2) + a[1][2].powi(2);
    let q = (a[0][0] + a[1][1] + a[2][2]) / 3.0;
    let p2 = (0..3).map(|i| (a[i][i] - q).powi(2)).sum::<f64>() + 2.0 * p1;
    if p2 <= f64::EPSILON * q.abs().max(1.0) {
        // 已是 (近似) 标量矩阵.
        let mut d = [a[0][0], a[1][1], a[2][2]];
        d.sort_by(|x, y| y.total_cmp(x));
        return d;
    }
    let p = (p2 / 6.0).sqrt();
    let b = |i: usize, j: usize| (a[i][j] - if i == j { q } else { 0.0 }) / p;
    let det = b(0, 0) * (b(1, 1) * b(2, 2) - b(1, 2) * b(2, 1))
        - b(0, 1) * (b(1, 0) * b(2, 2) - b(1, 2) * b(2, 0))
        + b(0, 2) * (b(1, 0) * b(2, 1) - b(1, 1) * b(2, 0));
    let phi = num::clamp(det / 2.0, -1.0, 1.0).acos() / 3.0;
    let e1 = q + 2.0 * p * phi.cos();
    let e3 = q + 2.0 * p * (phi + 2.0 * PI / 3.0).cos();
    [e1, 3.0 * q - e1 - e3, e3]
}

/// 一个存活区域的统计结果.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionRecord {
    /// 标签值.
    pub label: u32,

    /// 体素个数.
    pub voxel_count: usize,

    /// 定标体积 (`voxel_count * 体素体积`).
    pub volume: f64,

    /// 定标表面积.
    pub surface_area: f64,

    /// 球形度 `36πV² / S³`, 球为 1.
    pub sphericity: f64,

    /// 定标质心 `(x, y, z)`.
    pub centroid: [f64; 3],

    /// 包围盒.
    pub bounding_box: BoundingBox,

    /// 26-连通意义下的 Euler 特征数: 连通分量数 - 隧道数 + 空腔数.
    pub euler_number: i64,

    /// 等效椭球.
    pub ellipsoid: Ellipsoid,

    /// 灰度统计. 未提供灰度图像时为 `None`.
    pub intensity: Option<IntensityStats>,
}

/// 单个输入文件的区域统计表, 行按标签升序排列.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionTable {
    title: String,
    with_intensity: bool,
    records: Vec<RegionRecord>,
}

impl RegionTable {
    /// 由标题和已排序的记录构造.
    ///
    /// 是否输出灰度列由第一条记录决定; 空表可用 `with_intensity_columns` 指定.
    pub fn new(title: impl Into<String>, records: Vec<RegionRecord>) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].label < w[1].label));
        let with_intensity = records.first().is_some_and(|r| r.intensity.is_some());
        Self {
            title: title.into(),
            with_intensity,
            records,
        }
    }

    /// 指定是否输出灰度列.
    #[inline]
    pub fn with_intensity_columns(mut self, yes: bool) -> Self {
        self.with_intensity = yes;
        self
    }

    /// 来源标题.
    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// 是否包含灰度列?
    #[inline]
    pub fn has_intensity(&self) -> bool {
        self.with_intensity
    }

    /// 全部记录.
    #[inline]
    pub fn records(&self) -> &[RegionRecord] {
        &self.records
    }

    /// 记录条数.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 是否为空表?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 区域分析策略.
pub trait RegionAnalyzer: Send + Sync {
    /// 对 `labels` 中每个非背景标签计算一行统计量, 按标签升序返回.
    /// 提供 `intensity` 时同时计算灰度统计, 其形状必须与 `labels` 相同.
    fn analyze(&self, labels: &LabelVolume, intensity: Option<&VolumeImage>) -> Vec<RegionRecord>;
}

/// 默认的形态学分析器. 单次行优先扫描, 逐标签累加.
#[derive(Copy, Clone, Debug, Default)]
pub struct Morphometry;

/// 六个面法向, 与对应面的定标面积下标 (0: x, 1: y, 2: z).
const FACES: [(Offset3d, usize); 6] = [
    ((-1, 0, 0), 2),
    ((1, 0, 0), 2),
    ((0, -1, 0), 1),
    ((0, 1, 0), 1),
    ((0, 0, -1), 0),
    ((0, 0, 1), 0),
];

/// 单个标签的累加器. 坐标分量顺序为 `(x, y, z)`.
struct Accumulator {
    count: usize,
    sum_pos: [f64; 3],
    sum_prod: [[f64; 3]; 3],
    faces: [usize; 3],
    bbox: BoundingBox,
    sum: f64,
    sum_sq: f64,
    min: u16,
    max: u16,
}

impl Accumulator {
    fn new(pos: Idx3d) -> Self {
        Self {
            count: 0,
            sum_pos: [0.0; 3],
            sum_prod: [[0.0; 3]; 3],
            faces: [0; 3],
            bbox: BoundingBox::at(pos),
            sum: 0.0,
            sum_sq: 0.0,
            min: u16::MAX,
            max: u16::MIN,
        }
    }
}

impl RegionAnalyzer for Morphometry {
    fn analyze(&self, labels: &LabelVolume, intensity: Option<&VolumeImage>) -> Vec<RegionRecord> {
        if let Some(img) = intensity {
            assert_eq!(img.shape(), labels.shape(), "灰度图像与标签体形状不一致");
        }
        let shape = labels.shape();
        let data = labels.data();

        let mut acc: BTreeMap<u32, Accumulator> = BTreeMap::new();
        for (pos, &l) in data.indexed_iter() {
            if is_label_background(l) {
                continue;
            }
            let (z, y, x) = pos;
            let p = [x as f64, y as f64, z as f64];
            let a = acc.entry(l).or_insert_with(|| Accumulator::new(pos));
            a.count += 1;
            for i in 0..3 {
                a.sum_pos[i] += p[i];
                for j in i..3 {
                    a.sum_prod[i][j] += p[i] * p[j];
                }
            }
            a.bbox.expand(pos);
            for (off, axis) in FACES {
                let exposed = match shifted(pos, off, shape) {
                    Some(n) => data[n] != l,
                    None => true,
                };
                if exposed {
                    a.faces[axis] += 1;
                }
            }
            if let Some(img) = intensity {
                let v = img[pos];
                a.sum += v as f64;
                a.sum_sq += (v as f64) * (v as f64);
                a.min = a.min.min(v);
                a.max = a.max.max(v);
            }
        }

        let mut euler = euler_numbers(labels);
        let cal = labels.calibration();
        let spacing = [cal.x, cal.y, cal.z];
        let face_area = [cal.face_area_x(), cal.face_area_y(), cal.face_area_z()];
        acc.into_iter()
            .map(|(label, a)| {
                let n = a.count as f64;
                let volume = n * cal.voxel_volume();
                let surface_area: f64 = a
                    .faces
                    .iter()
                    .zip(face_area)
                    .map(|(cnt, area)| *cnt as f64 * area)
                    .sum();
                let sphericity = if surface_area > 0.0 {
                    36.0 * PI * volume * volume / surface_area.powi(3)
                } else {
                    0.0
                };
                let centroid = [0, 1, 2].map(|i| a.sum_pos[i] / n * spacing[i]);
                let ellipsoid = Ellipsoid::from_covariance(covariance(&a, spacing));
                let intensity = intensity.map(|_| {
                    let mean = a.sum / n;
                    // 浮点误差可能使方差略小于 0.
                    let var = (a.sum_sq / n - mean * mean).max(0.0);
                    IntensityStats {
                        mean,
                        std_dev: var.sqrt(),
                        min: a.min,
                        max: a.max,
                    }
                });
                RegionRecord {
                    label,
                    voxel_count: a.count,
                    volume,
                    surface_area,
                    sphericity,
                    centroid,
                    bounding_box: a.bbox,
                    euler_number: euler.remove(&label).unwrap_or_default(),
                    ellipsoid,
                    intensity,
                }
            })
            .collect()
    }
}

/// 定标坐标下的协方差矩阵.
///
/// 每个体素视为均匀实心长方体, 对角线额外加上体素自身的方差 `s² / 12`,
/// 使单个体素也有非零半径.
fn covariance(a: &Accumulator, spacing: [f64; 3]) -> [[f64; 3]; 3] {
    let n = a.count as f64;
    let mut cov = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in i..3 {
            let c = a.sum_prod[i][j] / n - (a.sum_pos[i] / n) * (a.sum_pos[j] / n);
            cov[i][j] = c * spacing[i] * spacing[j];
            cov[j][i] = cov[i][j];
        }
        cov[i][i] += spacing[i] * spacing[i] / 12.0;
    }
    cov
}

/// 逐标签计算体素复形的 Euler 特征数.
///
/// 每个体素视为闭单位立方体, 前景因此是 26-连通的. 遍历所有顶点, 棱, 面和体胞腔,
/// 对每个胞腔统计与之相邻的不同标签, 按 `V - E + F - C` 累加.
fn euler_numbers(labels: &LabelVolume) -> BTreeMap<u32, i64> {
    let data = labels.data();
    let (nz, ny, nx) = labels.shape();
    let len = [nz, ny, nx];
    let mut euler = BTreeMap::new();
    let mut near: Vec<u32> = Vec::with_capacity(8);

    // `spanned` 的第 k 位表示胞腔沿第 k 个轴 (z, y, x) 延伸.
    for spanned in 0u8..8 {
        let sign = if spanned.count_ones() % 2 == 0 { 1 } else { -1 };
        let along = |axis: usize| (spanned & (1 << axis)) != 0;
        let extent = |axis: usize| if along(axis) { len[axis] } else { len[axis] + 1 };
        // 胞腔在第 `axis` 轴的格点坐标 `c` 对应的相邻体素下标.
        let voxels = |axis: usize, c: usize| -> [Option<usize>; 2] {
            if along(axis) {
                [Some(c), None]
            } else {
                [c.checked_sub(1), (c < len[axis]).then_some(c)]
            }
        };

        for (k, j, i) in iproduct!(0..extent(0), 0..extent(1), 0..extent(2)) {
            near.clear();
            for (vz, vy, vx) in iproduct!(voxels(0, k), voxels(1, j), voxels(2, i)) {
                if let (Some(vz), Some(vy), Some(vx)) = (vz, vy, vx) {
                    let l = data[(vz, vy, vx)];
                    if !is_label_background(l) {
                        near.push(l);
                    }
                }
            }
            near.sort_unstable();
            near.dedup();
            for &l in &near {
                *euler.entry(l).or_insert(0) += sign;
            }
        }
    }
    euler
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BitDepth, Calibration, LabelDepth};
    use ndarray::{s, Array3};

    fn two_cubes() -> LabelVolume {
        let mut data = Array3::zeros((8, 8, 8));
        data.slice_mut(s![1..4, 1..4, 1..4]).fill(2u32);
        data.slice_mut(s![5..7, 5..7, 4..7]).fill(5u32);
        LabelVolume::new(data, LabelDepth::Sixteen)
    }

    #[test]
    fn test_cube_morphometry() {
        let records = Morphometry.analyze(&two_cubes(), None);
        assert_eq!(records.len(), 2);

        let cube = &records[0];
        assert_eq!(cube.label, 2);
        assert_eq!(cube.voxel_count, 27);
        assert_eq!(cube.volume, 27.0);
        assert_eq!(cube.surface_area, 54.0);
        assert!((cube.sphericity - PI / 6.0).abs() < 1e-9);
        assert_eq!(cube.centroid, [2.0, 2.0, 2.0]);
        assert_eq!(
            cube.bounding_box,
            BoundingBox {
                min: [1, 1, 1],
                max: [3, 3, 3]
            }
        );
        assert_eq!(cube.intensity, None);
        assert_eq!(cube.euler_number, 1);
        // 每个轴向方差 2/3 + 1/12 = 3/4.
        for r in cube.ellipsoid.radii {
            assert!((r - 3.75f64.sqrt()).abs() < 1e-9);
        }
        for e in cube.ellipsoid.elongations {
            assert!((e - 1.0).abs() < 1e-9);
        }

        let block = &records[1];
        assert_eq!(block.label, 5);
        assert_eq!(block.voxel_count, 12);
        // 2 x 2 x 3 长方体: 2 * (4 + 6 + 6).
        assert_eq!(block.surface_area, 32.0);
        assert_eq!(block.bounding_box.min, [4, 5, 5]);
        assert_eq!(block.bounding_box.max, [6, 6, 6]);
        assert_eq!(block.euler_number, 1);
        // 长轴 3 个体素 (方差 3/4), 短轴 2 个体素 (方差 1/3).
        let [r1, r2, r3] = block.ellipsoid.radii;
        assert!((r1 - 3.75f64.sqrt()).abs() < 1e-9);
        assert!((r2 - (5.0f64 / 3.0).sqrt()).abs() < 1e-9);
        assert!((r3 - r2).abs() < 1e-9);
        assert!((block.ellipsoid.elongations[0] - 1.5).abs() < 1e-9);
        assert!((block.ellipsoid.elongations[2] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_euler_number_topology() {
        let mut data = Array3::zeros((9, 9, 9));
        // 空心球壳: 1 个分量, 1 个空腔.
        data.slice_mut(s![1..6, 1..6, 1..6]).fill(1u32);
        data.slice_mut(s![2..5, 2..5, 2..5]).fill(0);
        // 单层圆环: 1 个分量, 1 个隧道.
        data.slice_mut(s![7, 1..4, 1..4]).fill(2);
        data[(7, 2, 2)] = 0;
        // 仅以顶点相接的两个体素, 26-连通下是一个分量.
        data[(7, 6, 6)] = 3;
        data[(8, 7, 7)] = 3;
        let records = Morphometry.analyze(&LabelVolume::new(data, LabelDepth::Eight), None);

        let euler: Vec<i64> = records.iter().map(|r| r.euler_number).collect();
        assert_eq!(euler, vec![2, 0, 1]);

        let shell = &records[0].ellipsoid;
        assert!((shell.radii[0] - shell.radii[2]).abs() < 1e-9);
        assert!(shell.radii[0] > 3.75f64.sqrt());
    }

    #[test]
    fn test_eigenvalues_of_rotated_matrix() {
        // diag(4, 2, 1) 绕 z 轴旋转 45 度.
        let m = [[3.0, 1.0, 0.0], [1.0, 3.0, 0.0], [0.0, 0.0, 1.0]];
        let e = sym3_eigenvalues(m);
        for (got, want) in e.iter().zip([4.0, 2.0, 1.0]) {
            assert!((got - want).abs() < 1e-9, "{e:?}");
        }
        assert_eq!(sym3_eigenvalues([[2.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 2.0]]), [2.0; 3]);
    }

    #[test]
    fn test_calibrated_measures() {
        let labels = two_cubes().with_calibration(Calibration::new(0.5, 0.5, 2.0, "micron"));
        let cube = &Morphometry.analyze(&labels, None)[0];
        assert!((cube.volume - 27.0 * 0.5).abs() < 1e-12);
        // xy 面 18 个 (0.25), xz/yz 面各 18 个 (1.0).
        assert!((cube.surface_area - (18.0 * 0.25 + 36.0)).abs() < 1e-12);
        assert_eq!(cube.centroid, [1.0, 1.0, 4.0]);
    }

    #[test]
    fn test_intensity_stats() {
        let labels = two_cubes();
        let data = Array3::from_shape_fn((8, 8, 8), |(_, _, x)| x as u16 * 10);
        let img = VolumeImage::new("i", BitDepth::Eight, data);

        let records = Morphometry.analyze(&labels, Some(&img));
        let stats = records[0].intensity.unwrap();
        assert!((stats.mean - 20.0).abs() < 1e-9);
        assert_eq!((stats.min, stats.max), (10, 30));
        assert!((stats.std_dev - (200.0f64 / 3.0).sqrt()).abs() < 1e-9);

        let table = RegionTable::new("i", records);
        assert!(table.has_intensity());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_cleared_labels_absent() {
        let mut labels = two_cubes();
        labels.clear_labels(&[2].into_iter().collect());
        let records = Morphometry.analyze(&labels, None);
        assert_eq!(records.iter().map(|r| r.label).collect::<Vec<_>>(), vec![5]);

        let empty = Morphometry.analyze(&LabelVolume::new(Array3::zeros((2, 2, 2)), LabelDepth::Eight), None);
        assert!(empty.is_empty());
        assert!(!RegionTable::new("e", empty).has_intensity());
    }
}
