use crate::core::error::DbError;
use crate::core::strutil;
use crate::core::types::DataType;

/// 单个列的元数据。写操作的合法性检查都以它为依据。
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
    col_name: String,
    table_name: String,
    col_type: DataType,
    /// 空字符串或"表名.列名"形式的被引用列
    references: String,
    primary_key: bool,
    not_null: bool,
}

impl ColumnMetadata {
    /// 主键隐含非空，构造时直接收紧。
    pub fn new(
        col_name: impl Into<String>,
        table_name: impl Into<String>,
        col_type: DataType,
        references: impl Into<String>,
        primary_key: bool,
        not_null: bool,
    ) -> Self {
        ColumnMetadata {
            col_name: col_name.into(),
            table_name: table_name.into(),
            col_type,
            references: references.into(),
            primary_key,
            not_null: primary_key || not_null,
        }
    }

    pub fn column_name(&self) -> &str {
        &self.col_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn column_type(&self) -> &DataType {
        &self.col_type
    }

    pub fn referenced_column(&self) -> &str {
        &self.references
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_not_null(&self) -> bool {
        self.not_null
    }

    /// CREATE解析阶段回填：PRIMARY KEY ( col ) 子句同时置主键和非空标志。
    pub fn mark_primary_key(&mut self) {
        self.primary_key = true;
        self.not_null = true;
    }

    /// 五个以空格分隔的字段：三个带引号的字符串和两个布尔字面量。
    pub fn serialize(&self) -> String {
        format!(
            "{} {} {} {} {}",
            strutil::quote(&self.col_name),
            strutil::quote(&self.col_type.to_string()),
            strutil::quote(&self.references),
            self.primary_key,
            self.not_null
        )
    }

    /// serialize的逆操作。表名不在序列化形式中，由调用方注入。
    pub fn parse(s: &str, table_name: &str) -> Result<ColumnMetadata, DbError> {
        let tokens = strutil::split_quoted_tokens(s);
        if tokens.len() != 5 {
            return Err(DbError::MalformedQuery(format!(
                "Invalid column metadata: {s}"
            )));
        }
        let col_type = DataType::parse(&tokens[1])?;
        let primary_key = parse_bool(&tokens[3])?;
        let not_null = parse_bool(&tokens[4])?;
        Ok(ColumnMetadata::new(
            tokens[0].clone(),
            table_name,
            col_type,
            tokens[2].clone(),
            primary_key,
            not_null,
        ))
    }
}

fn parse_bool(s: &str) -> Result<bool, DbError> {
    match s {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(DbError::MalformedQuery(format!(
            "Invalid boolean literal: {other}"
        ))),
    }
}

/// 一张表的有序列描述。序列化为表文件的首行。
#[derive(Debug, Clone, Default)]
pub struct Schema {
    metadata: Vec<ColumnMetadata>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    /// 从模式头行加载。URL形式的表名只保留最后一段。
    pub fn parse(table_name: &str, line: &str) -> Result<Schema, DbError> {
        let table_name = display_table_name(table_name);
        let mut schema = Schema::new();
        for part in strutil::split(line, '\t', false) {
            schema.add_column(ColumnMetadata::parse(&part, table_name)?);
        }
        Ok(schema)
    }

    pub fn serialize(&self) -> String {
        self.metadata
            .iter()
            .map(ColumnMetadata::serialize)
            .collect::<Vec<_>>()
            .join("\t")
    }

    pub fn add_column(&mut self, metadata: ColumnMetadata) {
        self.metadata.push(metadata);
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.metadata
    }

    pub fn column_index(&self, col_name: &str) -> Option<usize> {
        self.metadata.iter().position(|m| m.col_name == col_name)
    }

    /// 是否包含指定列。接受"表名.列名"的限定写法，
    /// 此时列的所属表名也必须吻合。
    pub fn has_column(&self, col_name: &str) -> bool {
        let (table, name) = split_qualified(col_name);
        self.metadata.iter().any(|m| {
            m.col_name == name && (table.is_empty() || m.table_name == table)
        })
    }

    pub fn column_metadata(&self, col_name: &str) -> Result<&ColumnMetadata, DbError> {
        self.metadata
            .iter()
            .find(|m| m.col_name == col_name)
            .ok_or_else(|| DbError::UnknownColumn(col_name.to_string()))
    }

    /// 把另一个模式的列并入本模式，用于连接结果。
    pub fn merge(&mut self, other: &Schema) {
        self.metadata.extend(other.metadata.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }
}

/// 拆出"表名.列名"限定。没有点时表名为空。
pub fn split_qualified(col_name: &str) -> (&str, &str) {
    match col_name.split_once('.') {
        Some((table, name)) => (table, name),
        None => ("", col_name),
    }
}

/// URL表名只取最后一个斜杠之后的部分。
pub fn display_table_name(table_name: &str) -> &str {
    if table_name.starts_with("http://") {
        match table_name.rfind('/') {
            Some(pos) => &table_name[pos + 1..],
            None => table_name,
        }
    } else {
        table_name
    }
}
