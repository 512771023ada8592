mod cli;
mod result;
mod runner;

use clap::Parser;
use simple_logger::SimpleLogger;
use stack_berry::pipeline::CancelToken;
use std::process::ExitCode;

/// 有文件处理失败.
const EXIT_FAILED_FILES: u8 = 1;

/// 配置错误, 没有处理任何文件.
const EXIT_CONFIG: u8 = 2;

/// Ctrl-C 时取消尚未开始的文件. 正在处理的文件会正常完成并写出.
fn on_interrupt(cancel: CancelToken) -> impl FnMut() + Send + 'static {
    move || {
        if !cancel.is_cancelled() {
            log::warn!("收到中断信号, 当前文件完成后停止");
        }
        cancel.cancel();
    }
}

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    if let Err(e) = SimpleLogger::new().with_level(cli.log_level).init() {
        eprintln!("无法初始化日志: {e}");
    }

    let config = match cli.to_config(utils::loader::input_dir_from_env_or_home()) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let cancel = CancelToken::new();
    if let Err(e) = ctrlc::set_handler(on_interrupt(cancel.clone())) {
        log::warn!("无法注册 Ctrl-C 处理函数: {e}");
    }

    match runner::run(config, cli.jobs, &cancel) {
        Ok(summary) => {
            result::print_summary(&summary);
            if summary.has_failures() {
                ExitCode::from(EXIT_FAILED_FILES)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            log::error!("{e}");
            if e.is_config_error() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::result::summarize_into;
    use stack_berry::pipeline::{CancelToken, PipelineConfig};

    #[test]
    fn test_run_and_summarize_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let summary =
            crate::runner::run(PipelineConfig::new(dir.path()), 2, &CancelToken::new()).unwrap();
        assert_eq!(summary.reports().len(), 0);

        let mut buf = Vec::new();
        summarize_into(&summary, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with("Processed: 0, skipped: 0, failed: 0, not started: 0"));
    }

    #[test]
    fn test_interrupt_cancels_pending_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.tif", "b.tif"] {
            std::fs::write(dir.path().join(name), b"not read").unwrap();
        }
        let cancel = CancelToken::new();
        let mut handler = crate::on_interrupt(cancel.clone());
        handler();
        assert!(cancel.is_cancelled());

        let summary =
            crate::runner::run(PipelineConfig::new(dir.path()), 1, &cancel).unwrap();
        assert_eq!(summary.not_started(), 2);
        assert!(!summary.has_failures());
    }

    #[test]
    fn test_run_missing_dir_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = crate::runner::run(
            PipelineConfig::new(dir.path().join("absent")),
            1,
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_run_rejects_infinite_radius() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            rolling_ball_radius: f64::INFINITY,
            ..PipelineConfig::new(dir.path())
        };
        let err = crate::runner::run(config, 1, &CancelToken::new()).unwrap_err();
        assert!(err.is_config_error());
    }
}
