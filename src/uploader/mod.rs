// 上传模块
//
// - part_size: 分片大小决策
// - retry: 远端调用重试策略
// - session: 单文件分片上传会话

pub mod part_size;
pub mod retry;
pub mod session;

pub use part_size::{
    decide_part_size, is_valid_part_size, DEFAULT_PART_SIZE, MAX_PARTS, MAX_PART_SIZE,
    MIN_PART_SIZE,
};
pub use retry::{calculate_backoff_delay, RetryPolicy};
pub use session::{SessionState, UploadError, UploadSession};
