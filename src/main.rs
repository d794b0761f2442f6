use clap::Parser;
use glacier_rsync_rust::{
    logging, AppConfig, AwsGlacierClient, BackupOrchestrator, CliArgs, SignalOutcome,
    SyncStateStore,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 配置错误退出码（EX_USAGE）
const EXIT_CONFIG_ERROR: u8 = 64;

/// 强制终止退出码
const EXIT_FORCE_TERMINATED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    // 配置错误在任何远端调用之前报告
    let config = match AppConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    // 初始化日志系统（必须保持 _log_guard 存活）
    let _log_guard = logging::init_logging(&config.log);

    info!("grsync v{} 启动中...", env!("CARGO_PKG_VERSION"));
    info!(
        "vault={}, region={}, src={:?}, compression={}, part_size={}",
        config.backup.vault,
        config.backup.region,
        config.backup.src,
        config.backup.compression,
        config.backup.part_size
    );

    let store = match SyncStateStore::new(&config.backup.db) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("无法创建同步记录库: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    let client = Arc::new(AwsGlacierClient::from_region(&config.backup.region).await);
    let orchestrator = BackupOrchestrator::new(client, store, config.backup.clone());

    // 停止信号：第一次等待当前文件完成，达到阈值后立即退出
    let stop_handle = orchestrator.stop_handle();
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("监听停止信号失败: {}", e);
                return;
            }
            if stop_handle.on_signal() == SignalOutcome::ForceTerminate {
                std::process::exit(i32::from(EXIT_FORCE_TERMINATED));
            }
        }
    });

    match orchestrator.backup().await {
        Ok(summary) => {
            if summary.stopped_early {
                info!("备份已提前停止");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("同步记录库错误，终止运行: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
