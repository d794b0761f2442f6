//! 协作式停止
//!
//! 信号回调只写、主循环只读：
//! - 第一次信号：设置停止标记，当前文件上传完成后在下一个文件开始前退出
//! - 后续信号：无额外效果
//! - 达到阈值：立即关闭同步记录库，由调用方终止进程

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::persistence::SyncStateStore;

/// 强制终止的信号次数
pub const FORCE_TERMINATE_THRESHOLD: usize = 3;

/// 单次信号的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// 首次请求停止
    StopRequested,
    /// 已在停止中，未达到阈值
    AlreadyStopping,
    /// 达到阈值，同步记录库已关闭，调用方应立即退出
    ForceTerminate,
}

struct StopState {
    stop_requested: AtomicBool,
    signal_count: AtomicUsize,
    threshold: usize,
    store: Arc<SyncStateStore>,
}

/// 停止句柄（可跨线程克隆）
#[derive(Clone)]
pub struct StopHandle {
    inner: Arc<StopState>,
}

impl StopHandle {
    pub fn new(store: Arc<SyncStateStore>) -> Self {
        Self::with_threshold(store, FORCE_TERMINATE_THRESHOLD)
    }

    pub fn with_threshold(store: Arc<SyncStateStore>, threshold: usize) -> Self {
        Self {
            inner: Arc::new(StopState {
                stop_requested: AtomicBool::new(false),
                signal_count: AtomicUsize::new(0),
                threshold: threshold.max(1),
                store,
            }),
        }
    }

    /// 请求停止（不中断正在上传的文件）
    pub fn request_stop(&self) {
        self.inner.stop_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.stop_requested.load(Ordering::SeqCst)
    }

    /// 已收到的信号次数
    pub fn signal_count(&self) -> usize {
        self.inner.signal_count.load(Ordering::SeqCst)
    }

    /// 处理一次外部停止信号
    pub fn on_signal(&self) -> SignalOutcome {
        let count = self.inner.signal_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.request_stop();

        if count >= self.inner.threshold {
            warn!("收到第 {} 次停止信号，强制关闭同步记录库", count);
            self.force_close();
            SignalOutcome::ForceTerminate
        } else if count == 1 {
            info!(
                "收到停止信号，当前文件完成后停止（再按 {} 次强制退出）",
                self.inner.threshold - count
            );
            SignalOutcome::StopRequested
        } else {
            warn!(
                "正在停止中（{}/{}）",
                count, self.inner.threshold
            );
            SignalOutcome::AlreadyStopping
        }
    }

    /// 立即关闭同步记录库
    pub fn force_close(&self) {
        self.inner.store.close();
    }
}
