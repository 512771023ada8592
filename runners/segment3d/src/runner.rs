//! 程序运行函数.

use stack_berry::pipeline::{CancelToken, Pipeline, PipelineConfig, RunSummary};
use stack_berry::StackResult;

/// 实际运行.
///
/// `jobs` 为 1 时逐个文件顺序处理; 否则在 `jobs` 个线程 (0 表示全部核心) 上并行处理文件.
pub fn run(config: PipelineConfig, jobs: usize, cancel: &CancelToken) -> StackResult<RunSummary> {
    log::info!("输入目录: '{}'", config.input_dir.display());
    if let Some(d) = config.output_dir() {
        log::info!("输出目录: '{}'", d.display());
    }
    let pipeline = Pipeline::new(config);

    let jobs = if jobs == 0 { utils::cpus() } else { jobs };
    if jobs == 1 {
        return pipeline.run(cancel);
    }

    log::info!("并行处理, {jobs} 个线程");
    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(|| pipeline.par_run(cancel)),
        Err(e) => {
            log::warn!("无法创建线程池 ({e}), 改为顺序处理");
            pipeline.run(cancel)
        }
    }
}
