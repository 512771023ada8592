//! 目录栈文件加载器.
//!
//! 提供迭代器风格的候选文件获取模式.

use crate::consts::STACK_EXTENSIONS;
use crate::{StackError, StackResult};
use std::fs::ReadDir;
use std::path::{Path, PathBuf};

/// 判断文件名 `name` 是否是一个候选输入栈.
///
/// 1. 扩展名必须是可识别的栈扩展名 (`tif`, `tiff`, 大小写不敏感);
/// 2. 文件名不能包含 `marker` (大小写敏感). 包含者被视为之前运行的输出.
pub fn is_stack_file(name: &str, marker: &str) -> bool {
    let has_ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            STACK_EXTENSIONS
                .iter()
                .any(|known| e.eq_ignore_ascii_case(known))
        });
    has_ext && (marker.is_empty() || !name.contains(marker))
}

/// 惰性枚举目录中候选栈文件的加载器.
///
/// 迭代顺序即文件系统原生的目录列举顺序, **不保证有序**.
/// 调用者不应依赖该顺序, 输出文件名也与之无关.
#[derive(Debug)]
pub struct StackDirLoader {
    dir: PathBuf,
    marker: String,
    entries: ReadDir,
}

impl StackDirLoader {
    /// 打开目录 `dir`. `marker` 为掩膜文件名标记, 为空时不排除任何文件.
    ///
    /// 目录不存在、不是目录或不可读时返回 `Err(StackError::InputDir)`.
    /// 这是配置错误, 不会重试.
    pub fn open<P: AsRef<Path>>(dir: P, marker: impl Into<String>) -> StackResult<Self> {
        let dir = dir.as_ref().to_owned();
        let entries = std::fs::read_dir(&dir).map_err(|source| StackError::InputDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            marker: marker.into(),
            entries,
        })
    }

    /// 被枚举的目录.
    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Iterator for StackDirLoader {
    type Item = PathBuf;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("跳过 '{}' 中无法读取的目录项: {e}", self.dir.display());
                    continue;
                }
            };
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                log::warn!("跳过非 UTF-8 文件名: '{}'", path.display());
                continue;
            };
            if !is_stack_file(name, &self.marker) {
                log::trace!("忽略 '{name}'");
                continue;
            }
            if !path.is_file() {
                continue;
            }
            return Some(path);
        }
    }
}
