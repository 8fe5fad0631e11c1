pub mod file;
pub mod memory;
pub mod remote;

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::DbError;

/// 表文件的扩展名
pub const TABLE_EXTENSION: &str = "table";
/// 改写表时使用的临时文件扩展名
pub const TEMP_EXTENSION: &str = "tmp";

/// 表的后备字节流：按行读取，可回绕到起点。
/// 本地文件、内存缓冲和远程HTTP响应体各实现一种。
pub trait TableStream {
    /// 读取下一行（不含行尾符）。流结束时返回None。
    fn read_line(&mut self) -> Result<Option<String>, DbError>;

    /// 回绕到流的起点。远程流不支持回绕。
    fn rewind(&mut self) -> Result<(), DbError>;
}

/// 存放表文件的目录。作为配置传入执行器，而不是全局常量。
#[derive(Debug, Clone)]
pub struct TableDirectory {
    root: PathBuf,
}

impl TableDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        TableDirectory { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.root.join(format!("{table_name}.{TABLE_EXTENSION}"))
    }

    pub fn temp_path(&self, table_name: &str) -> PathBuf {
        self.root.join(format!("{table_name}.{TEMP_EXTENSION}"))
    }

    pub fn table_exists(&self, table_name: &str) -> bool {
        self.table_path(table_name).exists()
    }

    /// 第一次CREATE时惰性建目录。
    pub fn ensure_exists(&self) -> Result<(), DbError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// 枚举目录下的所有表文件，用于反向引用扫描。
    /// 排序保证扫描顺序稳定。
    pub fn table_files(&self) -> Result<Vec<PathBuf>, DbError> {
        let mut files = Vec::new();
        if !self.root.exists() {
            return Ok(files);
        }
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == TABLE_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn test_paths() {
        let dir = TableDirectory::new("./tables");
        assert_eq!(dir.table_path("users"), PathBuf::from("./tables/users.table"));
        assert_eq!(dir.temp_path("users"), PathBuf::from("./tables/users.tmp"));
    }

    #[test]
    fn test_table_files_filters_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = TableDirectory::new(tmp.path());
        File::create(tmp.path().join("users.table"))
            .unwrap()
            .write_all(b"x\n")
            .unwrap();
        File::create(tmp.path().join("users.tmp"))
            .unwrap()
            .write_all(b"x\n")
            .unwrap();
        File::create(tmp.path().join("notes.txt"))
            .unwrap()
            .write_all(b"x\n")
            .unwrap();
        let files = dir.table_files().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("users.table"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TableDirectory::new("/nonexistent/filesql-test");
        assert!(dir.table_files().unwrap().is_empty());
        assert!(!dir.table_exists("users"));
    }
}
