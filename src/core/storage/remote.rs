use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;

use super::TableStream;
use crate::core::error::DbError;
use crate::core::schema::{ColumnMetadata, Schema};
use crate::core::strutil;
use crate::core::types::DataType;

/// 远程表的HTTP响应体流。打开后游标已经指向第一个数据行。
/// 远程表只读，也不支持回绕。
pub struct RemoteStream {
    reader: BufReader<TcpStream>,
}

impl TableStream for RemoteStream {
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
        Err(DbError::NotPermittedOnRemote("rewind"))
    }
}

/// 抓取一个http://host[:port]/path形式的远程表。
/// 发送一次GET请求，校验200状态，跳过响应头，
/// 把响应体第一行当作以空白分隔的列名清单。
/// 返回合成的模式和指向第一个数据行的流。
pub fn fetch(url: &str) -> Result<(RemoteStream, Schema), DbError> {
    let rest = url
        .strip_prefix("http://")
        .ok_or_else(|| DbError::MalformedQuery(format!("Unsupported URL: {url}")))?;
    let (host_port, resource) = match rest.find('/') {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, "/"),
    };
    let (host, port) = match host_port.split_once(':') {
        Some((host, port)) => (
            host,
            port.parse::<u16>()
                .map_err(|_| DbError::MalformedQuery(format!("Unsupported URL: {url}")))?,
        ),
        None => (host_port, 80),
    };

    let stream = TcpStream::connect((host, port))?;
    let mut writer = stream.try_clone()?;
    write!(
        writer,
        "GET {resource} HTTP/1.1\r\nHost: {host}\r\nConnection: Close\r\n\r\n"
    )?;
    writer.flush()?;

    let mut remote = RemoteStream {
        reader: BufReader::new(stream),
    };
    let status = remote
        .read_line()?
        .ok_or_else(|| DbError::NotFound(url.to_string()))?;
    if !status.contains("200 OK") {
        return Err(DbError::NotFound(url.to_string()));
    }
    // 响应头到第一个空行为止
    while let Some(line) = remote.read_line()? {
        if line.is_empty() {
            break;
        }
    }
    let header = remote
        .read_line()?
        .ok_or_else(|| DbError::NotFound(url.to_string()))?;
    Ok((remote, synthesize_schema(url, &header)))
}

/// 远程表没有模式头，把列名清单合成为可空、
/// 无引用、无主键的varchar(25)列。
pub fn synthesize_schema(url: &str, column_names: &str) -> Schema {
    let table_name = crate::core::schema::display_table_name(url);
    let mut schema = Schema::new();
    for name in column_names.split_whitespace() {
        schema.add_column(ColumnMetadata::new(
            strutil::extract_quoted(name),
            table_name,
            DataType::Varchar(25),
            "",
            false,
            false,
        ));
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_schema() {
        let schema = synthesize_schema("http://example.com/data/people", "id name city");
        assert_eq!(schema.len(), 3);
        let col = &schema.columns()[1];
        assert_eq!(col.column_name(), "name");
        assert_eq!(col.table_name(), "people");
        assert_eq!(*col.column_type(), DataType::Varchar(25));
        assert!(!col.is_primary_key());
        assert!(!col.is_not_null());
        assert_eq!(col.referenced_column(), "");
    }

    #[test]
    fn test_synthesized_header_line_parses_back() {
        let schema = synthesize_schema("http://h/t", "a b");
        let line = schema.serialize();
        let parsed = Schema::parse("t", &line).unwrap();
        assert_eq!(parsed.columns(), schema.columns());
    }
}
