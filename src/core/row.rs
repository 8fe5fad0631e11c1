use std::cmp::Ordering;

use crate::core::error::DbError;
use crate::core::schema::{split_qualified, ColumnMetadata, Schema};
use crate::core::strutil;
use crate::core::types::{Value, NULL_VALUE};

/// 行中的一个单元格：原始文本值加上所属列的元数据。
/// 比较时按元数据里声明的类型解析。
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    value: String,
    metadata: ColumnMetadata,
}

impl Column {
    pub fn new(value: impl Into<String>, metadata: ColumnMetadata) -> Self {
        Column {
            value: value.into(),
            metadata,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn metadata(&self) -> &ColumnMetadata {
        &self.metadata
    }

    pub fn is_null(&self) -> bool {
        self.value == NULL_VALUE
    }

    /// 按声明类型解析出带标签的比较值。
    pub fn typed(&self) -> Result<Value, DbError> {
        Value::parse(&self.value, self.metadata.column_type())
    }

    /// 排序用比较。NULL排在所有值之前，两个NULL视为相等。
    pub fn compare(&self, other: &Column) -> Result<Ordering, DbError> {
        let a = self.typed()?;
        let b = other.typed()?;
        Ok(match (&a, &b) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            _ => a.compare(&b).unwrap_or(Ordering::Equal),
        })
    }
}

/// 表中的一行：绑定到模式的有序单元格序列。
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<Column>,
    schema: Schema,
}

impl Row {
    pub fn new(schema: Schema) -> Self {
        Row {
            columns: Vec::new(),
            schema,
        }
    }

    /// 从一个行文本解析。词法单元与模式列按位置配对，多余的单元被忽略。
    pub fn parse(schema: &Schema, line: &str) -> Row {
        let tokens = strutil::split_quoted_tokens(line);
        let columns = tokens
            .into_iter()
            .zip(schema.columns().iter())
            .map(|(value, metadata)| Column::new(value, metadata.clone()))
            .collect();
        Row {
            columns,
            schema: schema.clone(),
        }
    }

    /// 从查询提供的原始值构造，值按模式顺序排列。
    pub fn from_values(schema: &Schema, values: &[String]) -> Row {
        let columns = values
            .iter()
            .zip(schema.columns().iter())
            .map(|(value, metadata)| Column::new(value.clone(), metadata.clone()))
            .collect();
        Row {
            columns,
            schema: schema.clone(),
        }
    }

    /// 每个模式列一个空白单元格，用于外连接中未命中的一侧。
    pub fn blank(schema: &Schema) -> Row {
        let columns = schema
            .columns()
            .iter()
            .map(|metadata| Column::new("", metadata.clone()))
            .collect();
        Row {
            columns,
            schema: schema.clone(),
        }
    }

    /// 行的存储形式：各值加引号后用单个空格连接。
    pub fn serialize(&self) -> String {
        self.columns
            .iter()
            .map(|col| strutil::quote(&col.value))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_index(&self, col_name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.metadata.column_name() == col_name)
    }

    /// 按名字取单元格。接受"表名.列名"限定；
    /// 未加限定且同名列分属不同表时报歧义。
    pub fn get_column(&self, col_name: &str) -> Result<&Column, DbError> {
        let (table, name) = split_qualified(col_name);
        let table = strutil::extract_quoted(table);
        let name = strutil::extract_quoted(name);
        let mut found: Option<&Column> = None;
        for col in &self.columns {
            if col.metadata.column_name() != name {
                continue;
            }
            if table.is_empty() {
                if found.is_some() {
                    return Err(DbError::AmbiguousColumn(name.to_string()));
                }
                found = Some(col);
            } else if col.metadata.table_name() == table {
                found = Some(col);
            }
        }
        found.ok_or_else(|| DbError::UnknownColumn(col_name.to_string()))
    }

    /// 投影：把单元格改写为给定列名的顺序。空列表不做任何事。
    pub fn order_and_filter(&mut self, col_names: &[String]) -> Result<(), DbError> {
        if col_names.is_empty() {
            return Ok(());
        }
        let mut new_columns = Vec::with_capacity(col_names.len());
        for name in col_names {
            new_columns.push(self.get_column(name)?.clone());
        }
        self.columns = new_columns;
        Ok(())
    }

    /// 连接合并：把另一行的单元格接到本行后面。
    pub fn merge(&mut self, other: &Row) {
        self.columns.extend(other.columns.iter().cloned());
    }
}
