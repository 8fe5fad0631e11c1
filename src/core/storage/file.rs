use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::{TableDirectory, TableStream};
use crate::core::error::DbError;

/// 本地表文件上的读取流。
/// 追加写入走独立的文件句柄，不影响这里的读游标。
pub struct FileStream {
    reader: BufReader<File>,
}

impl FileStream {
    pub fn open(path: &Path) -> Result<FileStream, DbError> {
        let file = File::open(path)?;
        Ok(FileStream {
            reader: BufReader::new(file),
        })
    }
}

impl TableStream for FileStream {
    fn read_line(&mut self) -> Result<Option<String>, DbError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    fn rewind(&mut self) -> Result<(), DbError> {
        self.reader.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

/// 在表文件末尾追加一行。
pub fn append_line(path: &Path, line: &str) -> Result<(), DbError> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// 写时复制的表改写器：所有行先写进同名.tmp文件，
/// 成功后原子地改名覆盖原表；失败时删除临时文件。
pub struct TableRewriter {
    temp_path: PathBuf,
    table_path: PathBuf,
    writer: BufWriter<File>,
}

impl TableRewriter {
    pub fn create(dir: &TableDirectory, table_name: &str) -> Result<TableRewriter, DbError> {
        let temp_path = dir.temp_path(table_name);
        let table_path = dir.table_path(table_name);
        let writer = BufWriter::new(File::create(&temp_path)?);
        Ok(TableRewriter {
            temp_path,
            table_path,
            writer,
        })
    }

    pub fn write_line(&mut self, line: &str) -> Result<(), DbError> {
        writeln!(self.writer, "{line}")?;
        Ok(())
    }

    /// 落盘并用临时文件替换原表。
    pub fn commit(self) -> Result<(), DbError> {
        let TableRewriter {
            temp_path,
            table_path,
            mut writer,
        } = self;
        writer.flush()?;
        drop(writer);
        fs::rename(&temp_path, &table_path)?;
        Ok(())
    }

    /// 放弃改写，清掉临时文件。
    pub fn abort(self) {
        let TableRewriter {
            temp_path, writer, ..
        } = self;
        drop(writer);
        let _ = fs::remove_file(&temp_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_lines_and_rewind() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.table");
        fs::write(&path, "header\nrow1\nrow2\n").unwrap();
        let mut stream = FileStream::open(&path).unwrap();
        assert_eq!(stream.read_line().unwrap().unwrap(), "header");
        assert_eq!(stream.read_line().unwrap().unwrap(), "row1");
        stream.rewind().unwrap();
        assert_eq!(stream.read_line().unwrap().unwrap(), "header");
        assert_eq!(stream.read_line().unwrap().unwrap(), "row1");
        assert_eq!(stream.read_line().unwrap().unwrap(), "row2");
        assert!(stream.read_line().unwrap().is_none());
    }

    #[test]
    fn test_append_does_not_move_cursor() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.table");
        fs::write(&path, "header\nrow1\n").unwrap();
        let mut stream = FileStream::open(&path).unwrap();
        assert_eq!(stream.read_line().unwrap().unwrap(), "header");
        append_line(&path, "row2").unwrap();
        assert_eq!(stream.read_line().unwrap().unwrap(), "row1");
        assert_eq!(stream.read_line().unwrap().unwrap(), "row2");
    }

    #[test]
    fn test_rewriter_commit_replaces_table() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = TableDirectory::new(tmp.path());
        fs::write(dir.table_path("t"), "old\n").unwrap();
        let mut rewriter = TableRewriter::create(&dir, "t").unwrap();
        rewriter.write_line("new header").unwrap();
        rewriter.write_line("new row").unwrap();
        rewriter.commit().unwrap();
        assert_eq!(
            fs::read_to_string(dir.table_path("t")).unwrap(),
            "new header\nnew row\n"
        );
        assert!(!dir.temp_path("t").exists());
    }

    #[test]
    fn test_rewriter_abort_removes_temp() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = TableDirectory::new(tmp.path());
        fs::write(dir.table_path("t"), "old\n").unwrap();
        let mut rewriter = TableRewriter::create(&dir, "t").unwrap();
        rewriter.write_line("partial").unwrap();
        rewriter.abort();
        assert!(!dir.temp_path("t").exists());
        assert_eq!(fs::read_to_string(dir.table_path("t")).unwrap(), "old\n");
    }
}
