//! 三维邻域规则.

use crate::Idx3d;
use itertools::iproduct;
use once_cell::sync::Lazy;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 三维偏移量 `(dz, dy, dx)`.
pub type Offset3d = (isize, isize, isize);

/// 三维连通规则.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Connectivity {
    /// 仅共面 (前后上下左右).
    Six,

    /// 共面或共棱.
    Eighteen,

    /// 共面、共棱或共顶点, 即三个方向坐标差都不超过 1.
    #[default]
    TwentySix,
}

/// 按 `|dz| + |dy| + |dx| <= max_manhattan` 生成非零偏移. 顺序为 `(dz, dy, dx)` 的字典序.
fn offsets_within(max_manhattan: usize) -> Vec<Offset3d> {
    iproduct!(-1isize..=1, -1isize..=1, -1isize..=1)
        .filter(|&(dz, dy, dx)| {
            let m = (dz.abs() + dy.abs() + dx.abs()) as usize;
            m != 0 && m <= max_manhattan
        })
        .collect()
}

static OFFSETS_6: Lazy<Vec<Offset3d>> = Lazy::new(|| offsets_within(1));
static OFFSETS_18: Lazy<Vec<Offset3d>> = Lazy::new(|| offsets_within(2));
static OFFSETS_26: Lazy<Vec<Offset3d>> = Lazy::new(|| offsets_within(3));

impl Connectivity {
    /// 从邻居个数构造. 只接受 6, 18, 26.
    pub fn from_count(n: u8) -> Option<Self> {
        match n {
            6 => Some(Self::Six),
            18 => Some(Self::Eighteen),
            26 => Some(Self::TwentySix),
            _ => None,
        }
    }

    /// 邻居个数.
    #[inline]
    pub fn count(&self) -> u8 {
        match self {
            Self::Six => 6,
            Self::Eighteen => 18,
            Self::TwentySix => 26,
        }
    }

    /// 该规则下的全部邻居偏移.
    #[inline]
    pub fn offsets(&self) -> &'static [Offset3d] {
        match self {
            Self::Six => OFFSETS_6.as_slice(),
            Self::Eighteen => OFFSETS_18.as_slice(),
            Self::TwentySix => OFFSETS_26.as_slice(),
        }
    }
}

/// 将偏移 `(dz, dy, dx)` 作用于 `pos`. 结果越界 (含下溢) 时返回 `None`.
#[inline]
pub fn shifted((z, y, x): Idx3d, (dz, dy, dx): Offset3d, (lz, ly, lx): Idx3d) -> Option<Idx3d> {
    let nz = z.checked_add_signed(dz).filter(|v| *v < lz)?;
    let ny = y.checked_add_signed(dy).filter(|v| *v < ly)?;
    let nx = x.checked_add_signed(dx).filter(|v| *v < lx)?;
    Some((nz, ny, nx))
}

/// 收集 `pos` 在 `conn` 规则下、位于 `shape` 范围内的全部邻居.
pub fn neighbours(pos: Idx3d, conn: Connectivity, shape: Idx3d) -> impl Iterator<Item = Idx3d> {
    conn.offsets()
        .iter()
        .filter_map(move |off| shifted(pos, *off, shape))
}
