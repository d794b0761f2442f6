//! 同步记录 SQLite 数据库
//!
//! 单表 `sync_history`，记录每个已归档的文件版本：
//! - 路径 + 大小 + 修改时间完全一致才视为已归档
//! - 文件变化后重新上传，插入新记录，旧记录保留
//!
//! 任何数据库错误都会终止整次运行，不同操作对应不同的退出码

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use super::types::SyncRecord;
use crate::compression::Compression;
use crate::glacier::ArchiveResult;

/// 数据库中保存的路径文本
fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// 同步记录库错误
#[derive(Debug, thiserror::Error)]
pub enum SyncDbError {
    #[error("创建同步记录表失败: {0}")]
    Create(#[source] rusqlite::Error),

    #[error("查询同步记录失败: {0}")]
    Lookup(#[source] rusqlite::Error),

    #[error("写入同步记录失败: {0}")]
    Insert(#[source] rusqlite::Error),

    /// 连接已被关闭（正常结束或强制终止）
    #[error("同步记录库已关闭")]
    Closed,

    #[error("创建数据库目录失败: {0}")]
    Io(#[from] io::Error),
}

impl SyncDbError {
    /// 进程退出码
    ///
    /// - 1: 写入失败
    /// - 2: 建表失败（含目录创建失败）
    /// - 3: 查询失败
    /// - 130: 强制终止后连接已关闭
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncDbError::Insert(_) => 1,
            SyncDbError::Create(_) | SyncDbError::Io(_) => 2,
            SyncDbError::Lookup(_) => 3,
            SyncDbError::Closed => 130,
        }
    }
}

/// 同步记录库
///
/// 持有一个贯穿整个进程生命周期的连接，正常结束或强制终止时显式关闭
pub struct SyncStateStore {
    /// SQLite 连接，关闭后为 None
    conn: Mutex<Option<Connection>>,
    db_path: PathBuf,
}

impl SyncStateStore {
    /// 打开（必要时创建）同步记录库
    pub fn new(db_path: &Path) -> Result<Self, SyncDbError> {
        // 确保父目录存在
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path).map_err(SyncDbError::Create)?;
        let store = Self::with_connection(conn, db_path.to_path_buf())?;
        info!("同步记录库已打开: {:?}", db_path);
        Ok(store)
    }

    /// 内存数据库
    pub fn open_in_memory() -> Result<Self, SyncDbError> {
        let conn = Connection::open_in_memory().map_err(SyncDbError::Create)?;
        Self::with_connection(conn, PathBuf::from(":memory:"))
    }

    fn with_connection(conn: Connection, db_path: PathBuf) -> Result<Self, SyncDbError> {
        Self::init_tables(&conn).map_err(SyncDbError::Create)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            db_path,
        })
    }

    /// 初始化数据库表（幂等）
    fn init_tables(conn: &Connection) -> rusqlite::Result<()> {
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        debug!("journal_mode={}", mode);

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS sync_history (
                id INTEGER PRIMARY KEY,
                path TEXT,
                file_size INTEGER,
                mtime REAL,
                archive_id TEXT,
                location TEXT,
                checksum TEXT,
                compression TEXT,
                timestamp TEXT
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sync_history_path ON sync_history(path, file_size, mtime)",
            [],
        )?;

        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        // 持锁期间只做同步的 SQLite 调用，中毒时沿用内部状态
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 是否已归档
    ///
    /// 路径、大小、修改时间必须完全一致（修改时间精确到浮点值）
    pub fn is_archived(&self, path: &Path, file_size: u64, mtime: f64) -> Result<bool, SyncDbError> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(SyncDbError::Closed)?;

        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sync_history WHERE path = ?1 AND file_size = ?2 AND mtime = ?3)",
                params![path_key(path), file_size as i64, mtime],
                |row| row.get(0),
            )
            .map_err(SyncDbError::Lookup)?;

        Ok(exists)
    }

    /// 写入一条归档记录
    ///
    /// `archive` 为 None（上传失败）时只记录日志，不写入任何数据，文件在下次运行时重试
    pub fn record_archived(
        &self,
        path: &Path,
        file_size: u64,
        mtime: f64,
        archive: Option<&ArchiveResult>,
        compression: Compression,
    ) -> Result<(), SyncDbError> {
        let Some(archive) = archive else {
            warn!("未获得归档结果，不写入同步记录: {:?}", path);
            return Ok(());
        };

        let guard = self.lock();
        let conn = guard.as_ref().ok_or(SyncDbError::Closed)?;

        conn.execute(
            r#"
            INSERT INTO sync_history
                (path, file_size, mtime, archive_id, location, checksum, compression, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                path_key(path),
                file_size as i64,
                mtime,
                archive.archive_id,
                archive.location,
                archive.checksum,
                compression.tag(),
                archive.timestamp,
            ],
        )
        .map_err(SyncDbError::Insert)?;

        debug!("写入同步记录: {:?} -> {}", path, archive.archive_id);
        Ok(())
    }

    /// 记录总数
    pub fn record_count(&self) -> Result<u64, SyncDbError> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(SyncDbError::Closed)?;

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sync_history", [], |row| row.get(0))
            .map_err(SyncDbError::Lookup)?;
        Ok(count.max(0) as u64)
    }

    /// 某个路径的全部记录（按写入顺序）
    pub fn records_for_path(&self, path: &Path) -> Result<Vec<SyncRecord>, SyncDbError> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(SyncDbError::Closed)?;

        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, path, file_size, mtime, archive_id, location, checksum, compression, timestamp
                FROM sync_history
                WHERE path = ?1
                ORDER BY id
                "#,
            )
            .map_err(SyncDbError::Lookup)?;

        let rows = stmt
            .query_map(params![path_key(path)], |row| {
                Ok(SyncRecord {
                    id: row.get(0)?,
                    path: row.get(1)?,
                    file_size: row.get::<_, i64>(2)?.max(0) as u64,
                    mtime: row.get(3)?,
                    archive_id: row.get(4)?,
                    location: row.get(5)?,
                    checksum: row.get(6)?,
                    compression: row.get(7)?,
                    timestamp: row.get(8)?,
                })
            })
            .map_err(SyncDbError::Lookup)?;

        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(SyncDbError::Lookup)
    }

    /// 连接是否已关闭
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// 关闭连接（可重复调用）
    pub fn close(&self) {
        let Some(conn) = self.lock().take() else {
            return;
        };

        match conn.close() {
            Ok(()) => info!("同步记录库已关闭: {:?}", self.db_path),
            Err((_, e)) => warn!("关闭同步记录库失败: {}", e),
        }
    }
}
