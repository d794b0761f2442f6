// 远端调用重试策略
//
// 默认不重试：失败即放弃当前文件，下次运行再从头上传。
// 配置了 max_retries 时按指数退避重试同一个调用

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::glacier::RemoteError;

/// 初始退避延迟（毫秒）
const INITIAL_BACKOFF_MS: u64 = 100;

/// 最大退避延迟（毫秒）
const MAX_BACKOFF_MS: u64 = 5000;

/// 计算指数退避延迟
///
/// # 延迟序列
/// - retry_count=0: 100ms
/// - retry_count=1: 200ms
/// - retry_count=2: 400ms
/// - 最大: 5000ms
pub fn calculate_backoff_delay(retry_count: u32) -> u64 {
    2u64.checked_pow(retry_count)
        .and_then(|factor| INITIAL_BACKOFF_MS.checked_mul(factor))
        .unwrap_or(MAX_BACKOFF_MS)
        .min(MAX_BACKOFF_MS)
}

/// 重试策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大重试次数（0 表示不重试）
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// 执行远端调用，失败时按策略重试
    pub async fn run<T, F, Fut>(&self, mut call: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut retry = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if retry < self.max_retries => {
                    let backoff_ms = calculate_backoff_delay(retry);
                    warn!(
                        "{}，等待 {}ms 后重试 ({}/{})",
                        e,
                        backoff_ms,
                        retry + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    retry += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_calculate_backoff_delay() {
        assert_eq!(calculate_backoff_delay(0), 100);
        assert_eq!(calculate_backoff_delay(1), 200);
        assert_eq!(calculate_backoff_delay(2), 400);
        assert_eq!(calculate_backoff_delay(3), 800);
        assert_eq!(calculate_backoff_delay(10), 5000); // 超过最大值
        assert_eq!(calculate_backoff_delay(80), 5000); // 不会溢出
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::default()
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::new("initiate_multipart_upload", "boom"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::new(3)
            .run(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(RemoteError::new("upload_multipart_part", "timeout"))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::new(2)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::new("complete_multipart_upload", "503"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
