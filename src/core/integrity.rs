use std::path::Path;

use crate::core::error::DbError;
use crate::core::row::Row;
use crate::core::schema::{ColumnMetadata, Schema};
use crate::core::storage::file::FileStream;
use crate::core::storage::{TableDirectory, TableStream};
use crate::core::strutil;
use crate::core::types::{parse_date, parse_time, DataType, NULL_VALUE};

/// 打开表文件并解析首行模式。
pub fn read_table_file(path: &Path, table_name: &str) -> Result<(Schema, FileStream), DbError> {
    let mut stream = FileStream::open(path)?;
    let header = stream
        .read_line()?
        .ok_or_else(|| DbError::MalformedQuery(format!("Table {table_name} has no header")))?;
    let schema = Schema::parse(table_name, &header)?;
    Ok((schema, stream))
}

/// 校验一个值能否按列的声明类型解析。字符串类型要求带引号的字面量。
pub fn validate_data_type(metadata: &ColumnMetadata, value: &str) -> Result<(), DbError> {
    if value == NULL_VALUE {
        return Ok(());
    }
    let ok = match metadata.column_type() {
        DataType::Int => value.parse::<i32>().is_ok(),
        DataType::BigInt => value.parse::<i64>().is_ok(),
        DataType::Float => value.parse::<f32>().is_ok(),
        DataType::Double => value.parse::<f64>().is_ok(),
        DataType::Date => parse_date(strutil::extract_quoted(value)).is_some(),
        DataType::Time => parse_time(strutil::extract_quoted(value)).is_some(),
        DataType::Char(_) | DataType::Varchar(_) => strutil::extract_quoted(value) != value,
    };
    if ok {
        Ok(())
    } else {
        Err(DbError::TypeMismatch(format!(
            "Invalid data type: expected {} for column {}",
            metadata.column_type(),
            metadata.column_name()
        )))
    }
}

/// 把查询里的值规整成存储形式：
/// 日期和时间归一化为ISO写法，字符串剥引号并处理转义，
/// char右侧补空格到声明长度，varchar超长直接拒绝。
pub fn format_column_value(metadata: &ColumnMetadata, value: &str) -> Result<String, DbError> {
    if value == NULL_VALUE {
        return Ok(value.to_string());
    }
    match metadata.column_type() {
        DataType::Date => {
            let date = parse_date(strutil::extract_quoted(value)).ok_or_else(|| {
                DbError::TypeMismatch(format!(
                    "Invalid data type: expected date for column {}",
                    metadata.column_name()
                ))
            })?;
            Ok(date.format("%Y-%m-%d").to_string())
        }
        DataType::Time => {
            let time = parse_time(strutil::extract_quoted(value)).ok_or_else(|| {
                DbError::TypeMismatch(format!(
                    "Invalid data type: expected time for column {}",
                    metadata.column_name()
                ))
            })?;
            Ok(time.format("%H:%M:%S").to_string())
        }
        DataType::Char(limit) => {
            let mut text: String = strutil::unescape(strutil::extract_quoted(value))?
                .chars()
                .take(*limit)
                .collect();
            while text.chars().count() < *limit {
                text.push(' ');
            }
            Ok(text)
        }
        DataType::Varchar(limit) => {
            let text = strutil::unescape(strutil::extract_quoted(value))?;
            if text.chars().count() > *limit {
                return Err(DbError::TypeMismatch(format!(
                    "Value too long for column {}",
                    metadata.column_name()
                )));
            }
            Ok(text)
        }
        _ => Ok(value.to_string()),
    }
}

/// 外键正向检查：被引用表里必须存在一个非空且相等的值。
/// 传入的值应当已经是存储形式。
pub fn validate_referenced_column(
    dir: &TableDirectory,
    metadata: &ColumnMetadata,
    value: &str,
) -> Result<(), DbError> {
    let references = metadata.referenced_column();
    if references.is_empty() {
        return Ok(());
    }
    let dangling = || DbError::DanglingReference {
        value: value.to_string(),
        referenced: references.to_string(),
    };
    let Some((table, ref_col)) = references.split_once('.') else {
        return Err(dangling());
    };
    let path = dir.table_path(table);
    if !path.exists() {
        return Err(dangling());
    }
    let (schema, mut stream) = read_table_file(&path, table)?;
    while let Some(line) = stream.read_line()? {
        let row = Row::parse(&schema, &line);
        let col = row.get_column(ref_col)?;
        if !col.is_null() && col.value() == value {
            return Ok(());
        }
    }
    Err(dangling())
}

/// 外键反向检查：遍历目录里的每个表，若有列引用本列
/// 且仍存放着旧值，则拒绝修改或删除。
pub fn validate_referenced_by(
    dir: &TableDirectory,
    metadata: &ColumnMetadata,
    old_value: &str,
) -> Result<(), DbError> {
    let target = format!("{}.{}", metadata.table_name(), metadata.column_name());
    for path in dir.table_files()? {
        let table_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let (schema, mut stream) = read_table_file(&path, &table_name)?;
        for other in schema.columns() {
            if other.referenced_column() != target {
                continue;
            }
            while let Some(line) = stream.read_line()? {
                let row = Row::parse(&schema, &line);
                let col = row.get_column(other.column_name())?;
                if !col.is_null() && col.value() == old_value {
                    return Err(DbError::ReferencedBy(format!(
                        "{}.{}",
                        other.table_name(),
                        other.column_name()
                    )));
                }
            }
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn int_col(name: &str) -> ColumnMetadata {
        ColumnMetadata::new(name, "t", DataType::Int, "", false, false)
    }

    #[test]
    fn test_validate_data_type() {
        assert!(validate_data_type(&int_col("id"), "42").is_ok());
        assert!(validate_data_type(&int_col("id"), "x").is_err());
        assert!(validate_data_type(&int_col("id"), NULL_VALUE).is_ok());

        let big = ColumnMetadata::new("n", "t", DataType::BigInt, "", false, false);
        assert!(validate_data_type(&big, "9223372036854775807").is_ok());
        // i32范围之外的int被拒绝
        assert!(validate_data_type(&int_col("id"), "9223372036854775807").is_err());

        let name = ColumnMetadata::new("name", "t", DataType::Varchar(5), "", false, false);
        assert!(validate_data_type(&name, "\"Ada\"").is_ok());
        // 字符串值必须带引号
        assert!(validate_data_type(&name, "Ada").is_err());

        let day = ColumnMetadata::new("d", "t", DataType::Date, "", false, false);
        assert!(validate_data_type(&day, "2024-01-15").is_ok());
        assert!(validate_data_type(&day, "\"2024-01-15\"").is_ok());
        assert!(validate_data_type(&day, "yesterday").is_err());
    }

    #[test]
    fn test_format_char_padding() {
        let c = ColumnMetadata::new("c", "t", DataType::Char(5), "", false, false);
        assert_eq!(format_column_value(&c, "\"ab\"").unwrap(), "ab   ");
        // 超长的char截断到声明长度
        assert_eq!(format_column_value(&c, "\"abcdefgh\"").unwrap(), "abcde");
    }

    #[test]
    fn test_format_varchar_rejects_overflow() {
        let v = ColumnMetadata::new("v", "t", DataType::Varchar(3), "", false, false);
        assert_eq!(format_column_value(&v, "\"ab\"").unwrap(), "ab");
        assert!(format_column_value(&v, "\"abcd\"").is_err());
    }

    #[test]
    fn test_format_normalizes_date_and_time() {
        let d = ColumnMetadata::new("d", "t", DataType::Date, "", false, false);
        assert_eq!(format_column_value(&d, "2024-1-5").unwrap(), "2024-01-05");
        let t = ColumnMetadata::new("t", "t", DataType::Time, "", false, false);
        assert_eq!(format_column_value(&t, "9:5:0").unwrap(), "09:05:00");
    }

    #[test]
    fn test_format_unescapes_text() {
        let v = ColumnMetadata::new("v", "t", DataType::Varchar(10), "", false, false);
        assert_eq!(format_column_value(&v, r#""a\"b""#).unwrap(), "a\"b");
    }

    fn write_users(dir: &TableDirectory) {
        let header = "\"id\" \"int\" \"\" true true\t\"name\" \"varchar(10)\" \"\" false false";
        fs::write(
            dir.table_path("users"),
            format!("{header}\n\"1\" \"Ada\"\n\"2\" \"Bob\"\n"),
        )
        .unwrap();
    }

    fn write_orders(dir: &TableDirectory) {
        let header = "\"oid\" \"int\" \"\" false false\t\"uid\" \"int\" \"users.id\" false false";
        fs::write(dir.table_path("orders"), format!("{header}\n\"7\" \"1\"\n")).unwrap();
    }

    #[test]
    fn test_referenced_column_check() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = TableDirectory::new(tmp.path());
        write_users(&dir);
        let uid = ColumnMetadata::new("uid", "orders", DataType::Int, "users.id", false, false);
        assert!(validate_referenced_column(&dir, &uid, "1").is_ok());
        assert!(matches!(
            validate_referenced_column(&dir, &uid, "99"),
            Err(DbError::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_referenced_by_check() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = TableDirectory::new(tmp.path());
        write_users(&dir);
        write_orders(&dir);
        let id = ColumnMetadata::new("id", "users", DataType::Int, "", true, true);
        // 用户1被orders引用，用户2没有
        assert!(matches!(
            validate_referenced_by(&dir, &id, "1"),
            Err(DbError::ReferencedBy(msg)) if msg == "orders.uid"
        ));
        assert!(validate_referenced_by(&dir, &id, "2").is_ok());
    }
}
