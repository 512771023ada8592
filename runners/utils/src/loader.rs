//! 对 `stack-berry::dataset` 的更一层封装. 提供更直接的输入目录.

use stack_berry::dataset;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

/// 指定输入目录的环境变量.
pub const INPUT_DIR_ENV: &str = "STACK_BERRY_INPUT_DIR";

/// 环境变量值非空时使用它, 否则回退到 `$HOME/dataset/stacks`.
fn input_dir_from(env_value: Option<OsString>) -> Option<PathBuf> {
    match env_value {
        Some(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => dataset::home_dataset_dir_with(["stacks"]),
    }
}

/// 获取默认输入目录.
///
/// 1. 若环境变量 `$STACK_BERRY_INPUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/stacks`. 无法确定主目录时返回 `None`.
pub fn input_dir_from_env_or_home() -> Option<PathBuf> {
    input_dir_from(env::var_os(INPUT_DIR_ENV))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_dir_choice() {
        assert_eq!(
            input_dir_from(Some(OsString::from("/srv/stacks"))),
            Some(PathBuf::from("/srv/stacks"))
        );
        assert_eq!(
            input_dir_from(Some(OsString::new())),
            dataset::home_dataset_dir_with(["stacks"])
        );
        if let Some(d) = input_dir_from(None) {
            assert!(d.ends_with("dataset/stacks"));
        }
    }
}
