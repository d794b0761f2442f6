//! 日志系统配置
//!
//! 支持控制台输出和文件持久化，文件按天滚动，超出保留数量的旧文件自动清理

use crate::config::LogConfig;
use std::fs;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// 日志文件名前缀
const LOG_FILE_PREFIX: &str = "grsync";

/// 日志时间格式
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 日志系统守卫
/// 必须保持存活，否则日志写入线程会终止
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// 创建按天滚动的日志文件写入器
///
/// 文件名格式: grsync.YYYY-MM-DD.log，最多保留 `retention_days` 个文件
fn build_file_appender(config: &LogConfig) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(config.retention_days.max(1) as usize)
        .build(&config.log_dir)
}

/// 初始化日志系统
///
/// # Arguments
/// * `config` - 日志配置
///
/// # Returns
/// * `LogGuard` - 日志守卫，需要保持存活直到程序结束
pub fn init_logging(config: &LogConfig) -> LogGuard {
    // RUST_LOG 优先，其次是配置的级别
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    // 控制台输出层
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_ansi(true);

    if !config.enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();
        return LogGuard { _file_guard: None };
    }

    // 确保日志目录存在，失败时回退到只使用控制台输出
    let appender = fs::create_dir_all(&config.log_dir)
        .map_err(|e| e.to_string())
        .and_then(|_| build_file_appender(config).map_err(|e| e.to_string()));

    let appender = match appender {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("创建日志文件失败: {:?}, 错误: {}，回退到仅控制台输出", config.log_dir, e);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .init();
            return LogGuard { _file_guard: None };
        }
    };

    // 创建非阻塞写入器
    let (non_blocking, file_guard) = tracing_appender::non_blocking(appender);

    // 文件输出层（不带 ANSI 颜色）
    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!(
        "日志系统初始化完成: 目录={:?}, 保留文件数={}, 级别={}",
        config.log_dir, config.retention_days, config.level
    );

    LogGuard {
        _file_guard: Some(file_guard),
    }
}
