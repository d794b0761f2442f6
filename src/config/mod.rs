// 配置管理模块
//
// 配置来源（优先级从高到低）：
// 1. 命令行参数
// 2. --config 指定的 TOML 文件
// 3. 内置默认值

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::compression::Compression;
use crate::uploader::{is_valid_part_size, DEFAULT_PART_SIZE, MAX_PART_SIZE, MIN_PART_SIZE};

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 备份配置
    #[serde(default)]
    pub backup: BackupConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 备份配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Glacier 保险库名称
    #[serde(default)]
    pub vault: String,
    /// AWS 区域
    #[serde(default)]
    pub region: String,
    /// 备份源（文件或目录）
    #[serde(default)]
    pub src: PathBuf,
    /// 同步记录库路径
    #[serde(default = "default_db_path")]
    pub db: PathBuf,
    /// 压缩算法
    #[serde(default)]
    pub compression: Compression,
    /// 期望分片大小（字节）
    #[serde(default = "default_part_size")]
    pub part_size: u64,
    /// 写入归档描述的用户说明
    #[serde(default)]
    pub description: Option<String>,
    /// 远端调用最大重试次数（0 表示不重试）
    #[serde(default)]
    pub max_retries: u32,
    /// 是否在本地核对每个分片的校验和
    #[serde(default)]
    pub verify_parts: bool,
    /// 不超过该大小（字节）的文件走单次上传，0 表示始终分片上传
    #[serde(default)]
    pub single_shot_max: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("glacier.db")
}

fn default_part_size() -> u64 {
    DEFAULT_PART_SIZE
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            vault: String::new(),
            region: String::new(),
            src: PathBuf::new(),
            db: default_db_path(),
            compression: Compression::default(),
            part_size: default_part_size(),
            description: None,
            max_retries: 0,
            verify_parts: false,
            single_shot_max: 0,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default)]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

/// 配置错误（在任何远端调用之前报告）
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("缺少必填参数: {0}")]
    Missing(&'static str),

    #[error("分片大小 {0} 无效：必须是 2 的幂，范围 {min} ~ {max} 字节", min = MIN_PART_SIZE, max = MAX_PART_SIZE)]
    InvalidPartSize(u64),

    #[error("当前构建未包含 {0} 编解码器")]
    CodecUnavailable(Compression),

    #[error("无效的日志级别: {0}")]
    InvalidLogLevel(String),
}

/// 命令行参数
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "grsync", version, about = "类 rsync 的 Glacier 增量备份工具")]
pub struct CliArgs {
    /// 备份源（文件或目录）
    pub src: Option<PathBuf>,

    /// Glacier 保险库名称
    #[arg(long)]
    pub vault: Option<String>,

    /// AWS 区域
    #[arg(long)]
    pub region: Option<String>,

    /// 同步记录库路径（默认 glacier.db）
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// 压缩算法
    #[arg(long, value_enum)]
    pub compress: Option<Compression>,

    /// 期望分片大小（字节，1MB 的 2 的幂倍）
    #[arg(long)]
    pub part_size: Option<u64>,

    /// 写入归档描述的说明文字
    #[arg(long)]
    pub desc: Option<String>,

    /// 日志级别（TRACE/DEBUG/INFO/WARN/ERROR）
    #[arg(long)]
    pub loglevel: Option<String>,

    /// TOML 配置文件
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 远端调用最大重试次数
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// 核对每个分片的校验和
    #[arg(long)]
    pub verify_parts: bool,

    /// 不超过该大小（字节）的文件走单次上传
    #[arg(long)]
    pub single_shot_max: Option<u64>,

    /// 日志文件目录（指定后启用文件日志）
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// 从 TOML 文件加载配置
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        Ok(config)
    }

    /// 合并配置文件与命令行参数，并校验
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate().context("配置校验失败")?;
        Ok(config)
    }

    /// 用命令行参数覆盖配置
    pub fn apply_args(&mut self, args: &CliArgs) {
        let backup = &mut self.backup;
        if let Some(vault) = &args.vault {
            backup.vault = vault.clone();
        }
        if let Some(region) = &args.region {
            backup.region = region.clone();
        }
        if let Some(src) = &args.src {
            backup.src = src.clone();
        }
        if let Some(db) = &args.db {
            backup.db = db.clone();
        }
        if let Some(compression) = args.compress {
            backup.compression = compression;
        }
        if let Some(part_size) = args.part_size {
            backup.part_size = part_size;
        }
        if args.desc.is_some() {
            backup.description = args.desc.clone();
        }
        if let Some(max_retries) = args.max_retries {
            backup.max_retries = max_retries;
        }
        if args.verify_parts {
            backup.verify_parts = true;
        }
        if let Some(single_shot_max) = args.single_shot_max {
            backup.single_shot_max = single_shot_max;
        }

        if let Some(level) = &args.loglevel {
            self.log.level = level.to_lowercase();
        }
        if let Some(log_dir) = &args.log_dir {
            self.log.log_dir = log_dir.clone();
            self.log.enabled = true;
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let backup = &self.backup;
        if backup.vault.is_empty() {
            return Err(ConfigError::Missing("vault"));
        }
        if backup.region.is_empty() {
            return Err(ConfigError::Missing("region"));
        }
        if backup.src.as_os_str().is_empty() {
            return Err(ConfigError::Missing("src"));
        }
        if !is_valid_part_size(backup.part_size) {
            return Err(ConfigError::InvalidPartSize(backup.part_size));
        }
        if !backup.compression.is_available() {
            return Err(ConfigError::CodecUnavailable(backup.compression));
        }
        const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
        if !LEVELS.contains(&self.log.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.log.level.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MB: u64 = 1024 * 1024;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("grsync").chain(args.iter().copied())).unwrap()
    }

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.backup.vault = "photos".to_string();
        config.backup.region = "eu-west-1".to_string();
        config.backup.src = PathBuf::from("/data");
        config
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.backup.db, PathBuf::from("glacier.db"));
        assert_eq!(config.backup.part_size, MB);
        assert_eq!(config.backup.compression, Compression::Plain);
        assert_eq!(config.backup.max_retries, 0);
        assert_eq!(config.backup.single_shot_max, 0);
        assert!(!config.log.enabled);
        assert_eq!(config.log.log_dir, PathBuf::from("logs"));
        assert_eq!(config.log.retention_days, 7);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_cli_args_apply() {
        let args = parse(&[
            "--vault",
            "photos",
            "--region",
            "eu-west-1",
            "--compress",
            "zstd",
            "--part-size",
            "8388608",
            "--desc",
            "nightly",
            "--loglevel",
            "DEBUG",
            "--max-retries",
            "2",
            "--verify-parts",
            "/data/photos",
        ]);

        let mut config = AppConfig::default();
        config.apply_args(&args);

        assert_eq!(config.backup.vault, "photos");
        assert_eq!(config.backup.region, "eu-west-1");
        assert_eq!(config.backup.src, PathBuf::from("/data/photos"));
        assert_eq!(config.backup.compression, Compression::Zstd);
        assert_eq!(config.backup.part_size, 8 * MB);
        assert_eq!(config.backup.description.as_deref(), Some("nightly"));
        assert_eq!(config.backup.max_retries, 2);
        assert!(config.backup.verify_parts);
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_plain_is_not_a_cli_choice() {
        let result = CliArgs::try_parse_from(["grsync", "--compress", "plain", "/data"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_toml_and_cli_override() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("grsync.toml");
        std::fs::write(
            &path,
            r#"
[backup]
vault = "from-file"
region = "us-east-1"
src = "/srv"
part_size = 4194304
single_shot_max = 1048576

[log]
enabled = true
log_dir = "/var/log/grsync"
retention_days = 30
"#,
        )
        .unwrap();

        let args = parse(&[
            "--config",
            path.to_str().unwrap(),
            "--vault",
            "from-cli",
        ]);
        let config = AppConfig::from_args(&args).unwrap();

        assert_eq!(config.backup.vault, "from-cli");
        assert_eq!(config.backup.region, "us-east-1");
        assert_eq!(config.backup.src, PathBuf::from("/srv"));
        assert_eq!(config.backup.part_size, 4 * MB);
        assert_eq!(config.backup.single_shot_max, MB);
        // 未写的字段使用默认值
        assert_eq!(config.backup.db, PathBuf::from("glacier.db"));
        assert!(config.log.enabled);
        assert_eq!(config.log.retention_days, 30);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_missing_config_file() {
        let args = parse(&["--config", "/nonexistent/grsync.toml"]);
        assert!(AppConfig::from_args(&args).is_err());
    }

    #[test]
    fn test_validate_required_fields() {
        assert!(valid_config().validate().is_ok());

        let mut config = valid_config();
        config.backup.vault.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("vault"))));

        let mut config = valid_config();
        config.backup.src = PathBuf::new();
        assert!(matches!(config.validate(), Err(ConfigError::Missing("src"))));
    }

    #[test]
    fn test_validate_part_size() {
        for part_size in [0, 1000, 3 * MB, 512 * 1024, 8 * 1024 * MB] {
            let mut config = valid_config();
            config.backup.part_size = part_size;
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidPartSize(p)) if p == part_size),
                "part_size={}",
                part_size
            );
        }

        let mut config = valid_config();
        config.backup.part_size = 4 * 1024 * MB;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_codec_availability() {
        let mut config = valid_config();
        config.backup.compression = Compression::Zstd;
        assert_eq!(config.validate().is_ok(), cfg!(feature = "zstd"));
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = valid_config();
        config.log.level = "verbose".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidLogLevel(_))));
    }
}
