use std::io::{BufRead, Cursor};

use super::TableStream;
use crate::core::error::DbError;

/// 内存中的表流。ORDER BY物化时用它替换原来的文件流。
pub struct MemoryStream {
    cursor: Cursor<Vec<u8>>,
}

impl MemoryStream {
    pub fn new(content: String) -> MemoryStream {
        MemoryStream {
            cursor: Cursor::new(content.into_bytes()),
        }
    }
}

impl TableStream for MemoryStream {
    fn read_line(&mut self) -> Result<Option<String>, DbError> {
        let mut buf = Vec::new();
        if self.cursor.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') {
            buf.pop();
        }
        let line = String::from_utf8(buf)
            .map_err(|_| DbError::MalformedQuery("Table data is not valid UTF-8".to_string()))?;
        Ok(Some(line))
    }

    fn rewind(&mut self) -> Result<(), DbError> {
        self.cursor.set_position(0);
        Ok(())
    }
}
