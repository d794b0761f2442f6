//! 备份模块
//!
//! - scanner: 枚举候选文件
//! - shutdown: 协作式停止与强制终止
//! - orchestrator: 逐文件去重、压缩、上传、记录

pub mod orchestrator;
pub mod scanner;
pub mod shutdown;

pub use orchestrator::{BackupOrchestrator, BackupSummary};
pub use scanner::{file_mtime, format_bytes, scan_source};
pub use shutdown::{SignalOutcome, StopHandle, FORCE_TERMINATE_THRESHOLD};
