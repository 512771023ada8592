//! 栈文件与统计表的读写, 以及输出文件命名.

use crate::consts::{MASK_SUFFIX, PROJECTION_SUFFIX, TABLE_EXTENSION};
use std::path::{Path, PathBuf};

pub mod imagej;
mod table;
mod tiff_stack;

pub use table::{write_table, TABLE_HEADER, TABLE_INTENSITY_HEADER};
pub use tiff_stack::{read_stack, write_labels, write_volume};

/// 一个输入文件对应的全部输出路径.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutputPaths {
    /// 标签掩膜栈 `<stem>_mask.<ext>`.
    pub mask: PathBuf,

    /// 统计表 `<stem>.csv`.
    pub table: PathBuf,

    /// Z 投影预览 `<stem>_mask_zproj.png`.
    pub projection: PathBuf,
}

impl OutputPaths {
    /// 由 **原始输入路径** 推导输出路径. 扩展名保持与输入一致 (包括大小写).
    ///
    /// `output_dir` 为 `None` 时写在输入文件旁边.
    pub fn derive(input: &Path, output_dir: Option<&Path>) -> Self {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = input
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tif".to_owned());
        let dir = match output_dir {
            Some(d) => d.to_owned(),
            None => input.parent().map(Path::to_owned).unwrap_or_default(),
        };
        Self {
            mask: dir.join(format!("{stem}{MASK_SUFFIX}.{ext}")),
            table: dir.join(format!("{stem}.{TABLE_EXTENSION}")),
            projection: dir.join(format!("{stem}{PROJECTION_SUFFIX}.png")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OutputPaths;
    use std::path::Path;

    #[test]
    fn test_output_paths() {
        let p = OutputPaths::derive(Path::new("/data/run1/sample.tif"), None);
        assert_eq!(p.mask, Path::new("/data/run1/sample_mask.tif"));
        assert_eq!(p.table, Path::new("/data/run1/sample.csv"));
        assert_eq!(p.projection, Path::new("/data/run1/sample_mask_zproj.png"));

        let p = OutputPaths::derive(Path::new("/data/run1/a.b.TIFF"), Some(Path::new("/out")));
        assert_eq!(p.mask, Path::new("/out/a.b_mask.TIFF"));
        assert_eq!(p.table, Path::new("/out/a.b.csv"));
    }
}
