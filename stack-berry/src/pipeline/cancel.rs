use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 文件粒度的取消标志. 可以跨线程克隆共享.
///
/// 批处理在开始每个文件之前检查该标志; 已经开始的文件总会完整处理完.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// 创建一个未取消的标志.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 请求取消.
    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// 是否已请求取消?
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
