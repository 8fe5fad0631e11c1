use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;

use crate::core::error::DbError;
use crate::core::strutil;

/// 表示NULL的哨兵值：单字节0x00，直接作为列的原始值存储。
pub const NULL_VALUE: &str = "\u{0}";

/// 列的声明类型。文本形式与模式头中出现的类型名一一对应。
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Int,
    BigInt,
    Float,
    Double,
    Date,
    Time,
    Char(usize),
    Varchar(usize),
}

impl DataType {
    /// 从类型名解析。char/varchar必须带正整数长度。
    pub fn parse(s: &str) -> Result<DataType, DbError> {
        match s {
            "int" => return Ok(DataType::Int),
            "bigint" => return Ok(DataType::BigInt),
            "float" => return Ok(DataType::Float),
            "double" => return Ok(DataType::Double),
            "date" => return Ok(DataType::Date),
            "time" => return Ok(DataType::Time),
            _ => {}
        }
        for (prefix, is_char) in [("char(", true), ("varchar(", false)] {
            if let Some(rest) = s.strip_prefix(prefix) {
                if let Some(digits) = rest.strip_suffix(')') {
                    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                        let limit: usize = digits
                            .parse()
                            .map_err(|_| DbError::MalformedQuery(format!("Invalid data type {s}")))?;
                        if limit > 0 {
                            return Ok(if is_char {
                                DataType::Char(limit)
                            } else {
                                DataType::Varchar(limit)
                            });
                        }
                    }
                }
            }
        }
        Err(DbError::MalformedQuery(format!("Invalid data type {s}")))
    }

    /// char和varchar相互兼容（长度无关），其余类型必须完全一致。
    pub fn compatible_with(&self, other: &DataType) -> bool {
        if self.is_text() {
            return other.is_text();
        }
        self == other
    }

    pub fn is_text(&self) -> bool {
        matches!(self, DataType::Char(_) | DataType::Varchar(_))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "int"),
            DataType::BigInt => write!(f, "bigint"),
            DataType::Float => write!(f, "float"),
            DataType::Double => write!(f, "double"),
            DataType::Date => write!(f, "date"),
            DataType::Time => write!(f, "time"),
            DataType::Char(n) => write!(f, "char({n})"),
            DataType::Varchar(n) => write!(f, "varchar({n})"),
        }
    }
}

/// 带类型标签的比较值。比较和序列化都在变体上做模式匹配，
/// 避免在每个比较点上重复按类型名分派。
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    Text(String),
}

impl Value {
    /// 按声明类型解析原始存储值。空值哨兵解析为Null。
    pub fn parse(raw: &str, data_type: &DataType) -> Result<Value, DbError> {
        if raw == NULL_VALUE {
            return Ok(Value::Null);
        }
        match data_type {
            DataType::Int | DataType::BigInt => raw
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| type_error(raw, data_type)),
            DataType::Float | DataType::Double => raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| type_error(raw, data_type)),
            DataType::Date => parse_date(raw)
                .map(Value::Date)
                .ok_or_else(|| type_error(raw, data_type)),
            DataType::Time => parse_time(raw)
                .map(Value::Time)
                .ok_or_else(|| type_error(raw, data_type)),
            DataType::Char(_) | DataType::Varchar(_) => Ok(Value::Text(raw.to_string())),
        }
    }

    /// 同变体之间的全序比较。Null与任何值（包括Null）都不可比。
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            // NaN按相等处理，保证排序不会崩溃
            (Value::Float(a), Value::Float(b)) => Some(a.partial_cmp(b).unwrap_or(Ordering::Equal)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Value) -> Option<Ordering> {
        self.compare(other)
    }
}

fn type_error(raw: &str, data_type: &DataType) -> DbError {
    DbError::TypeMismatch(format!("Value {raw} cannot be read as {data_type}"))
}

/// 解析日期，接受连字符和斜杠两种写法，位数不要求补零。
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .ok()
}

/// 解析时分秒形式的时间。
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S").ok()
}

/// SQL LIKE匹配：%匹配任意序列，_匹配单个字符，整串匹配。
pub fn like_match(value: &str, pattern: &str) -> Result<bool, DbError> {
    let escaped = strutil::escape_regex(pattern);
    let regex_str = format!("^{}$", escaped.replace('%', ".*").replace('_', "."));
    let regex = Regex::new(&regex_str)
        .map_err(|_| DbError::InvalidOperand(pattern.to_string()))?;
    Ok(regex.is_match(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_parse() {
        assert_eq!(DataType::parse("int").unwrap(), DataType::Int);
        assert_eq!(DataType::parse("bigint").unwrap(), DataType::BigInt);
        assert_eq!(DataType::parse("char(5)").unwrap(), DataType::Char(5));
        assert_eq!(DataType::parse("varchar(25)").unwrap(), DataType::Varchar(25));
        assert!(DataType::parse("text").is_err());
        assert!(DataType::parse("char()").is_err());
        assert!(DataType::parse("char(0)").is_err());
        assert!(DataType::parse("varchar(x)").is_err());
    }

    #[test]
    fn test_data_type_display_roundtrip() {
        for name in ["int", "bigint", "float", "double", "date", "time", "char(3)", "varchar(10)"] {
            assert_eq!(DataType::parse(name).unwrap().to_string(), name);
        }
    }

    #[test]
    fn test_type_compatibility() {
        assert!(DataType::Char(5).compatible_with(&DataType::Varchar(9)));
        assert!(DataType::Varchar(1).compatible_with(&DataType::Char(2)));
        assert!(DataType::Int.compatible_with(&DataType::Int));
        assert!(!DataType::Int.compatible_with(&DataType::BigInt));
        assert!(!DataType::Float.compatible_with(&DataType::Double));
        assert!(!DataType::Date.compatible_with(&DataType::Time));
    }

    #[test]
    fn test_value_parse_and_compare() {
        let ty = DataType::Int;
        let a = Value::parse("3", &ty).unwrap();
        let b = Value::parse("10", &ty).unwrap();
        assert_eq!(a.compare(&b), Some(Ordering::Less));

        let ty = DataType::Date;
        let a = Value::parse("2024-01-15", &ty).unwrap();
        let b = Value::parse("2024-02-01", &ty).unwrap();
        assert_eq!(a.compare(&b), Some(Ordering::Less));

        assert_eq!(Value::parse(NULL_VALUE, &ty).unwrap(), Value::Null);
        assert_eq!(Value::Null.compare(&Value::Null), None);
        assert!(Value::parse("nonsense", &DataType::Int).is_err());
    }

    #[test]
    fn test_parse_date_forms() {
        assert!(parse_date("2024-01-15").is_some());
        assert!(parse_date("2024/1/5").is_some());
        assert!(parse_date("2024-1-5").is_some());
        assert!(parse_date("Jan 15 2024").is_none());
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("Ada", "A%").unwrap());
        assert!(like_match("Ada", "A_a").unwrap());
        assert!(!like_match("Bob", "A%").unwrap());
        assert!(like_match("Ada", "Ada").unwrap());
        assert!(!like_match("Adamant", "Ada").unwrap());
        // 模式中的正则元字符按字面处理
        assert!(like_match("a.b", "a.b").unwrap());
        assert!(!like_match("axb", "a.b").unwrap());
    }
}
