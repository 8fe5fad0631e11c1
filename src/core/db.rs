use std::collections::HashMap;
use std::fs;

use crate::core::error::DbError;
use crate::core::integrity::{self, read_table_file};
use crate::core::join::JoinedTable;
use crate::core::row::Row;
use crate::core::schema::Schema;
use crate::core::sql::{Query, QueryType};
use crate::core::storage::{remote, TableDirectory, TableStream};
use crate::core::strutil;
use crate::core::table::{RowSource, Table};

/// 数据库执行器：把查询描述符绑定到表管道上。
/// 表目录作为配置注入，全部状态都在磁盘上。
pub struct Database {
    dir: TableDirectory,
}

impl Database {
    pub fn new(dir: TableDirectory) -> Database {
        Database { dir }
    }

    pub fn table_directory(&self) -> &TableDirectory {
        &self.dir
    }

    /// 解析并执行一条查询。失败只中止当前查询，不影响后续执行。
    pub fn execute(&self, text: &str) -> Result<QueryResult, DbError> {
        let query = Query::parse(text)?;
        match query.query_type() {
            QueryType::Create => self.execute_create(&query).map(|_| QueryResult::empty()),
            QueryType::Drop => self.execute_drop(&query).map(|_| QueryResult::empty()),
            QueryType::Insert => self.execute_insert(&query).map(|_| QueryResult::empty()),
            QueryType::Update => self.execute_update(&query).map(|_| QueryResult::empty()),
            QueryType::Delete => self.execute_delete(&query).map(|_| QueryResult::empty()),
            QueryType::Select => self.execute_select(&query),
        }
    }

    /// 列出目录下的全部表名。
    pub fn list_tables(&self) -> Result<Vec<String>, DbError> {
        let mut names = Vec::new();
        for path in self.dir.table_files()? {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        Ok(names)
    }

    fn execute_create(&self, query: &Query) -> Result<(), DbError> {
        let table_name = query.property("tableName");
        let schema = Schema::parse(table_name, query.property("schema"))?;
        self.check_referenced_columns(&schema)?;
        if self.dir.table_exists(table_name) {
            return Err(DbError::AlreadyExists(table_name.to_string()));
        }
        self.dir.ensure_exists()?;
        fs::write(
            self.dir.table_path(table_name),
            format!("{}\n", query.property("schema")),
        )?;
        Ok(())
    }

    /// CREATE时校验外键声明：被引用列要么在本模式里，
    /// 要么在已存在的表里，且类型必须一致。
    fn check_referenced_columns(&self, schema: &Schema) -> Result<(), DbError> {
        for metadata in schema.columns() {
            let references = metadata.referenced_column();
            if references.is_empty() {
                continue;
            }
            match references.split_once('.') {
                None => {
                    if !schema.has_column(references) {
                        return Err(DbError::UnknownColumn(references.to_string()));
                    }
                    let referenced = schema.column_metadata(references)?;
                    if referenced.column_type() != metadata.column_type() {
                        return Err(DbError::TypeMismatch(format!(
                            "Column {references} does not have data type {}",
                            metadata.column_type()
                        )));
                    }
                }
                Some((table, col)) => {
                    let path = self.dir.table_path(table);
                    if !path.exists() {
                        return Err(DbError::NotFound(format!("Table {table}")));
                    }
                    let (ref_schema, _) = read_table_file(&path, table)?;
                    if !ref_schema.has_column(col) {
                        return Err(DbError::UnknownColumn(format!("{col} in table {table}")));
                    }
                    if ref_schema.column_metadata(col)?.column_type() != metadata.column_type() {
                        return Err(DbError::TypeMismatch(format!(
                            "Column {references} does not have data type {}",
                            metadata.column_type()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn execute_drop(&self, query: &Query) -> Result<(), DbError> {
        let table_name = query.property("tableName");
        let path = self.dir.table_path(table_name);
        if !path.exists() {
            return Err(DbError::UnknownTable(table_name.to_string()));
        }
        // 任何一行的值仍被别的表引用时不允许删表
        let (schema, mut stream) = read_table_file(&path, table_name)?;
        while let Some(line) = stream.read_line()? {
            let row = Row::parse(&schema, &line);
            for col in row.columns() {
                integrity::validate_referenced_by(&self.dir, col.metadata(), col.value())?;
            }
        }
        fs::remove_file(path)?;
        Ok(())
    }

    fn execute_insert(&self, query: &Query) -> Result<(), DbError> {
        let table_name = query.property("tableName");
        if !self.dir.table_exists(table_name) {
            return Err(DbError::UnknownTable(table_name.to_string()));
        }
        let col_names = strutil::split(query.property("columnNames"), ',', false);
        let col_values = strutil::split(query.property("columnValues"), ',', true);
        if col_names.len() != col_values.len() {
            return Err(DbError::MalformedQuery(
                "Number of columns and values must match".to_string(),
            ));
        }
        let mut table = Table::open(&self.dir, table_name)?;
        for name in &col_names {
            if !table.schema().has_column(name) {
                return Err(DbError::UnknownColumn(name.clone()));
            }
        }
        // 值按模式列序重排；模式里的列一个都不能少
        let mut ordered = Vec::with_capacity(table.schema().len());
        for metadata in table.schema().columns() {
            let position = col_names
                .iter()
                .position(|n| n == metadata.column_name())
                .ok_or_else(|| {
                    DbError::MalformedQuery(format!(
                        "Column not specified: {}",
                        metadata.column_name()
                    ))
                })?;
            ordered.push(col_values[position].clone());
        }
        let mut row = Row::from_values(table.schema(), &ordered);
        table.insert_row(&mut row)
    }

    fn execute_update(&self, query: &Query) -> Result<(), DbError> {
        let table_name = query.property("tableName");
        if !self.dir.table_exists(table_name) {
            return Err(DbError::UnknownTable(table_name.to_string()));
        }
        let col_names = strutil::split(query.property("columns"), ',', true);
        let col_values = strutil::split(query.property("values"), ',', true);
        let updates: HashMap<String, String> = col_names
            .into_iter()
            .zip(col_values.into_iter())
            .collect();
        let mut table = Table::open(&self.dir, table_name)?;
        let restrictions = query.property("restrictions");
        if !restrictions.is_empty() {
            table.set_restriction(restrictions)?;
        }
        table.update_rows(&updates)
    }

    fn execute_delete(&self, query: &Query) -> Result<(), DbError> {
        let table_name = query.property("tableName");
        if !self.dir.table_exists(table_name) {
            return Err(DbError::UnknownTable(table_name.to_string()));
        }
        let mut table = Table::open(&self.dir, table_name)?;
        let restrictions = query.property("restrictions");
        if !restrictions.is_empty() {
            table.set_restriction(restrictions)?;
        }
        table.delete_rows()
    }

    /// SELECT：解析出的表从左到右折叠成连接管道，
    /// 然后依次挂上限制、排序、去重和投影。
    fn execute_select(&self, query: &Query) -> Result<QueryResult, DbError> {
        let table_names = strutil::split(query.property("tableNames"), ',', false);
        let mut source: Option<Box<dyn RowSource>> = None;
        for name in &table_names {
            let table = if name.starts_with("http://") {
                let (stream, schema) = remote::fetch(name)?;
                Table::from_remote(&self.dir, Box::new(stream), name, schema)
            } else {
                if !self.dir.table_exists(name) {
                    return Err(DbError::UnknownTable(name.clone()));
                }
                Table::open(&self.dir, name)?
            };
            source = Some(match source {
                None => Box::new(table),
                Some(left) => Box::new(JoinedTable::new(
                    left,
                    Box::new(table),
                    query.property("joinConditions"),
                )?),
            });
        }
        let mut source =
            source.ok_or_else(|| DbError::MalformedQuery("Malformed query".to_string()))?;
        let restrictions = query.property("restrictions");
        if !restrictions.is_empty() {
            source.set_restriction(restrictions)?;
        }
        source.order_by(query.property("orderBy"), query.has_property("desc"))?;
        source.filter_distinct(query.has_property("distinct"));
        source.filter_columns(query.property("columnNames"));
        Ok(QueryResult::with_source(source))
    }
}

/// 查询结果：逐行取出的接口。写语句产生空结果。
pub struct QueryResult {
    source: Option<Box<dyn RowSource>>,
}

impl QueryResult {
    fn empty() -> QueryResult {
        QueryResult { source: None }
    }

    fn with_source(source: Box<dyn RowSource>) -> QueryResult {
        QueryResult {
            source: Some(source),
        }
    }

    pub fn next_row(&mut self) -> Result<Option<Row>, DbError> {
        match &mut self.source {
            Some(source) => source.next_row(),
            None => Ok(None),
        }
    }
}
