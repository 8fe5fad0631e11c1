pub mod formatter;
pub mod parser;

use std::collections::HashMap;

use crate::core::error::DbError;

/// 语句类型，由查询串的第一个关键字决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Create,
    Drop,
    Insert,
    Update,
    Delete,
    Select,
}

/// 解析后的查询描述符：语句类型加上一组字符串属性。
/// 列表类属性以逗号连接存放，执行器按需再拆开。
///
/// 各语句填充的属性：
/// - CREATE: tableName、schema（序列化的模式文本）
/// - DROP: tableName
/// - INSERT: tableName、columnNames、columnValues
/// - UPDATE: tableName、columns、values、restrictions
/// - DELETE: tableName、restrictions
/// - SELECT: distinct（标记）、columnNames、tableNames、restrictions、
///   joinConditions、orderBy、desc（标记）
#[derive(Debug)]
pub struct Query {
    query_string: String,
    query_type: QueryType,
    properties: HashMap<String, String>,
}

impl Query {
    /// 规整查询文本并解析出描述符。
    pub fn parse(text: &str) -> Result<Query, DbError> {
        let formatted = formatter::format_query(text);
        parser::parse(formatted)
    }

    pub(crate) fn new(
        query_string: String,
        query_type: QueryType,
        properties: HashMap<String, String>,
    ) -> Query {
        Query {
            query_string,
            query_type,
            properties,
        }
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    pub fn query_string(&self) -> &str {
        &self.query_string
    }

    /// 取属性值，不存在时返回空串。
    pub fn property(&self, name: &str) -> &str {
        self.properties.get(name).map(String::as_str).unwrap_or("")
    }

    /// distinct、desc这类标记属性只看有没有定义。
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }
}
