//! 备份源扫描
//!
//! - 源路径是目录：递归收集所有常规文件的绝对路径；指向常规文件的符号链接
//!   按链接路径收集，指向目录的符号链接不进入
//! - 源路径是单个文件（或不存在）：候选列表只有它自己，
//!   是否可读留给后续逐文件处理时判断

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// 枚举候选文件，目录内的文件按路径排序
pub fn scan_source(source: &Path) -> Vec<PathBuf> {
    let root = absolutize(source);

    if !root.is_dir() {
        debug!("备份源是单个路径: {}", root.display());
        return vec![root];
    }

    info!("开始扫描文件夹: {}", root.display());

    let mut files = Vec::new();
    let mut total_size = 0u64;
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("读取目录条目失败，跳过: {}", e);
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }

        // 符号链接取目标的状态
        let metadata = if file_type.is_symlink() {
            std::fs::metadata(entry.path()).ok()
        } else {
            entry.metadata().ok()
        };

        match metadata {
            Some(metadata) if metadata.is_file() => {
                total_size += metadata.len();
                files.push(entry.into_path());
            }
            _ => debug!("跳过非常规文件: {}", entry.path().display()),
        }
    }

    info!(
        "文件夹扫描完成: {} 个文件，总大小 {}",
        files.len(),
        format_bytes(total_size)
    );

    files
}

/// 转为绝对路径（不解析符号链接）
fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// 文件修改时间（秒，保留小数部分）
pub fn file_mtime(metadata: &Metadata) -> io::Result<f64> {
    let modified = metadata.modified()?;
    Ok(match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    })
}

/// 格式化字节大小
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// 创建测试目录结构
    fn create_test_folder() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        // root/
        // ├── b.txt
        // ├── a.txt
        // ├── sub1/
        // │   └── c.txt
        // └── sub2/
        //     └── deep/
        //         └── d.txt
        fs::write(root.join("b.txt"), "b").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::create_dir_all(root.join("sub1")).unwrap();
        fs::write(root.join("sub1/c.txt"), "c").unwrap();
        fs::create_dir_all(root.join("sub2/deep")).unwrap();
        fs::write(root.join("sub2/deep/d.txt"), "d").unwrap();

        temp_dir
    }

    #[test]
    fn test_scan_directory_recursively_sorted() {
        let temp_dir = create_test_folder();
        let files = scan_source(temp_dir.path());

        let root = temp_dir.path();
        assert_eq!(
            files,
            vec![
                root.join("a.txt"),
                root.join("b.txt"),
                root.join("sub1").join("c.txt"),
                root.join("sub2").join("deep").join("d.txt"),
            ]
        );
        assert!(files.iter().all(|p| p.is_absolute()));
    }

    #[test]
    fn test_scan_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("only.bin");
        fs::write(&file, "x").unwrap();

        assert_eq!(scan_source(&file), vec![file]);
    }

    #[test]
    fn test_scan_missing_path_is_single_candidate() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.bin");

        assert_eq!(scan_source(&missing), vec![missing]);
    }

    #[test]
    fn test_scan_relative_path_is_absolutized() {
        let files = scan_source(Path::new("Cargo.toml"));
        assert_eq!(files.len(), 1);
        assert!(files[0].is_absolute());
        assert!(files[0].ends_with("Cargo.toml"));
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        assert!(scan_source(temp_dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_includes_file_symlinks_only() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("real.txt"), "r").unwrap();
        fs::create_dir_all(root.join("dir")).unwrap();
        fs::write(root.join("dir/inner.txt"), "i").unwrap();
        std::os::unix::fs::symlink(root.join("real.txt"), root.join("link.txt")).unwrap();
        std::os::unix::fs::symlink(root.join("dir"), root.join("linkdir")).unwrap();
        std::os::unix::fs::symlink(root.join("gone.txt"), root.join("broken.txt")).unwrap();

        // 文件链接按链接路径收集，目录链接不进入，悬空链接跳过
        let files = scan_source(root);
        assert_eq!(
            files,
            vec![
                root.join("dir").join("inner.txt"),
                root.join("link.txt"),
                root.join("real.txt"),
            ]
        );
    }

    #[test]
    fn test_file_mtime_has_subsecond_precision() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("t.txt");
        fs::write(&file, "t").unwrap();
        filetime::set_file_mtime(&file, filetime::FileTime::from_unix_time(1_700_000_000, 500_000_000))
            .unwrap();

        let mtime = file_mtime(&fs::metadata(&file).unwrap()).unwrap();
        assert_eq!(mtime, 1_700_000_000.5);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
        assert_eq!(format_bytes(1536 * 1024 * 1024), "1.50 GB");
    }
}
