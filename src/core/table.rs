use std::collections::{HashMap, HashSet};

use crate::core::error::DbError;
use crate::core::integrity;
use crate::core::restriction::Restriction;
use crate::core::row::Row;
use crate::core::schema::{display_table_name, Schema};
use crate::core::storage::file::{self, FileStream, TableRewriter};
use crate::core::storage::memory::MemoryStream;
use crate::core::storage::{TableDirectory, TableStream};
use crate::core::strutil;
use crate::core::types::NULL_VALUE;

/// 行来源的能力集合。Table和JoinedTable都实现它；
/// 写操作只存在于Table上。
pub trait RowSource {
    /// 取出满足当前限制条件的下一行，流结束时返回None。
    fn next_row(&mut self) -> Result<Option<Row>, DbError>;

    fn schema(&self) -> &Schema;

    fn row_count(&self) -> u64;

    /// 回绕到第一行。
    fn reset(&mut self) -> Result<(), DbError>;

    fn set_restriction(&mut self, text: &str) -> Result<(), DbError>;

    /// 设置投影列。"*"不做改动，空串清除投影。
    fn filter_columns(&mut self, col_names: &str);

    fn filter_distinct(&mut self, distinct: bool);

    /// 物化剩余的行并按给定列排序。
    fn order_by(&mut self, col_names: &str, desc: bool) -> Result<(), DbError>;
}

/// Table和JoinedTable共用的行出口：投影和DISTINCT去重。
#[derive(Default)]
pub(crate) struct RowEmitter {
    col_filter: Vec<String>,
    distinct: bool,
    columns_found: HashSet<String>,
}

impl RowEmitter {
    pub(crate) fn set_filter(&mut self, col_names: &str) {
        if col_names.is_empty() {
            self.col_filter.clear();
        } else if col_names != "*" {
            self.col_filter = strutil::split(col_names, ',', false);
        }
    }

    pub(crate) fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    /// 对行应用投影；DISTINCT启用时按投影后的
    /// "列名=值;"签名去重，重复的行拒收。
    pub(crate) fn admit(&mut self, row: &mut Row) -> Result<bool, DbError> {
        row.order_and_filter(&self.col_filter)?;
        if !self.distinct {
            return Ok(true);
        }
        let mut signature = String::new();
        for col in row.columns() {
            signature.push_str(col.metadata().column_name());
            signature.push('=');
            signature.push_str(col.value());
            signature.push(';');
        }
        Ok(self.columns_found.insert(signature))
    }
}

/// 按行排序比较：依次比较各列，遇到不相等即定序。
/// 取列失败或类型无法解析时按相等处理，保持排序稳定。
pub(crate) fn compare_rows(
    a: &Row,
    b: &Row,
    col_names: &[String],
    desc: bool,
) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    for name in col_names {
        let (Ok(col_a), Ok(col_b)) = (a.get_column(name), b.get_column(name)) else {
            continue;
        };
        let ordering = col_a.compare(col_b).unwrap_or(Ordering::Equal);
        if ordering != Ordering::Equal {
            return if desc { ordering.reverse() } else { ordering };
        }
    }
    Ordering::Equal
}

/// 一张表上的流式行迭代器。本地表背靠表文件；
/// ORDER BY之后背靠内存缓冲；远程表背靠HTTP响应体。
pub struct Table {
    schema: Schema,
    table_name: String,
    dir: TableDirectory,
    stream: Box<dyn TableStream>,
    restriction: Restriction,
    emitter: RowEmitter,
    row_count: u64,
    from_url: bool,
    /// 流的首行是否为模式头（远程流直接从数据行开始）
    has_header: bool,
    header_pending: bool,
}

impl Table {
    /// 打开本地表：读模式头、数行、回绕。
    pub fn open(dir: &TableDirectory, table_name: &str) -> Result<Table, DbError> {
        let path = dir.table_path(table_name);
        let (schema, mut stream) = integrity::read_table_file(&path, table_name)?;
        let mut row_count = 0;
        while stream.read_line()?.is_some() {
            row_count += 1;
        }
        stream.rewind()?;
        Ok(Table {
            schema,
            table_name: table_name.to_string(),
            dir: dir.clone(),
            stream: Box::new(stream),
            restriction: Restriction::empty(),
            emitter: RowEmitter::default(),
            row_count,
            from_url: false,
            has_header: true,
            header_pending: true,
        })
    }

    /// 由HTTP响应体构造远程表。流已经指向第一个数据行，
    /// 行数按无界处理，连接时永远充当探测侧。
    pub fn from_remote(
        dir: &TableDirectory,
        stream: Box<dyn TableStream>,
        url: &str,
        schema: Schema,
    ) -> Table {
        Table {
            schema,
            table_name: display_table_name(url).to_string(),
            dir: dir.clone(),
            stream,
            restriction: Restriction::empty(),
            emitter: RowEmitter::default(),
            row_count: u64::MAX,
            from_url: true,
            has_header: false,
            header_pending: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.table_name
    }

    /// 插入一行。逐列校验类型、非空、主键唯一和外键，
    /// 然后把值规整成存储形式追加到文件末尾。
    pub fn insert_row(&mut self, row: &mut Row) -> Result<(), DbError> {
        if self.from_url {
            return Err(DbError::NotPermittedOnRemote("insert into"));
        }
        for index in 0..row.columns().len() {
            let metadata = row.columns()[index].metadata().clone();
            let value = row.columns()[index].value().to_string();
            integrity::validate_data_type(&metadata, &value)?;
            if value == NULL_VALUE {
                if metadata.is_not_null() {
                    return Err(DbError::NotNullViolation(
                        metadata.column_name().to_string(),
                    ));
                }
                continue;
            }
            let formatted = integrity::format_column_value(&metadata, &value)?;
            if metadata.is_primary_key() {
                self.check_for_duplicate(&formatted, index)?;
            }
            integrity::validate_referenced_column(&self.dir, &metadata, &formatted)?;
            row.columns_mut()[index].set_value(formatted);
        }
        file::append_line(&self.dir.table_path(&self.table_name), &row.serialize())?;
        self.row_count += 1;
        Ok(())
    }

    /// 更新满足限制条件的行。没有限制条件时更新全表，
    /// 因此主键列的无条件更新直接拒绝。
    pub fn update_rows(&mut self, updates: &HashMap<String, String>) -> Result<(), DbError> {
        if self.from_url {
            return Err(DbError::NotPermittedOnRemote("update"));
        }
        let mut formatted: HashMap<String, String> = HashMap::new();
        for (name, value) in updates {
            let metadata = self.schema.column_metadata(name)?.clone();
            if metadata.is_primary_key() && self.restriction.is_empty() {
                return Err(DbError::PrimaryKeyNotUnique);
            }
            integrity::validate_data_type(&metadata, value)?;
            if value == NULL_VALUE {
                if metadata.is_not_null() {
                    return Err(DbError::NotNullViolation(
                        metadata.column_name().to_string(),
                    ));
                }
                formatted.insert(name.clone(), value.clone());
                continue;
            }
            let new_value = integrity::format_column_value(&metadata, value)?;
            if metadata.is_primary_key() {
                let index = self
                    .schema
                    .column_index(name)
                    .ok_or_else(|| DbError::UnknownColumn(name.clone()))?;
                self.check_for_duplicate(&new_value, index)?;
            }
            integrity::validate_referenced_column(&self.dir, &metadata, &new_value)?;
            formatted.insert(name.clone(), new_value);
        }
        let mut rewriter = TableRewriter::create(&self.dir, &self.table_name)?;
        match self.write_updated_rows(&mut rewriter, &formatted) {
            Ok(()) => rewriter.commit(),
            Err(err) => {
                rewriter.abort();
                Err(err)
            }
        }
    }

    fn write_updated_rows(
        &mut self,
        rewriter: &mut TableRewriter,
        updates: &HashMap<String, String>,
    ) -> Result<(), DbError> {
        rewriter.write_line(&self.schema.serialize())?;
        let mut stream = self.fresh_stream()?;
        while let Some(line) = stream.read_line()? {
            let mut row = Row::parse(&self.schema, &line);
            if !self.restriction.apply(&row)? {
                rewriter.write_line(&row.serialize())?;
                continue;
            }
            for col in row.columns_mut() {
                let Some(new_value) = updates.get(col.metadata().column_name()) else {
                    continue;
                };
                // 旧值被别的表引用时不允许改掉
                integrity::validate_referenced_by(&self.dir, col.metadata(), col.value())?;
                col.set_value(new_value.clone());
            }
            rewriter.write_line(&row.serialize())?;
        }
        Ok(())
    }

    /// 删除满足限制条件的行。没有限制条件时清空全表。
    pub fn delete_rows(&mut self) -> Result<(), DbError> {
        if self.from_url {
            return Err(DbError::NotPermittedOnRemote("delete from"));
        }
        let mut rewriter = TableRewriter::create(&self.dir, &self.table_name)?;
        match self.write_undeleted_rows(&mut rewriter) {
            Ok(removed) => {
                rewriter.commit()?;
                self.row_count = self.row_count.saturating_sub(removed);
                Ok(())
            }
            Err(err) => {
                rewriter.abort();
                Err(err)
            }
        }
    }

    fn write_undeleted_rows(&mut self, rewriter: &mut TableRewriter) -> Result<u64, DbError> {
        rewriter.write_line(&self.schema.serialize())?;
        let mut stream = self.fresh_stream()?;
        let mut removed = 0;
        while let Some(line) = stream.read_line()? {
            let row = Row::parse(&self.schema, &line);
            if !self.restriction.apply(&row)? {
                rewriter.write_line(&row.serialize())?;
                continue;
            }
            for col in row.columns() {
                integrity::validate_referenced_by(&self.dir, col.metadata(), col.value())?;
            }
            removed += 1;
        }
        Ok(removed)
    }

    /// 在独立的游标上重开表文件，跳过模式头。
    /// 主键扫描和改写都从头读整张表，不动主游标。
    fn fresh_stream(&self) -> Result<FileStream, DbError> {
        let mut stream = FileStream::open(&self.dir.table_path(&self.table_name))?;
        stream.read_line()?;
        Ok(stream)
    }

    /// 主键唯一性：扫描文件里对应列的位置找重复值。
    fn check_for_duplicate(&self, value: &str, index: usize) -> Result<(), DbError> {
        let mut stream = self.fresh_stream()?;
        while let Some(line) = stream.read_line()? {
            let tokens = strutil::split_quoted_tokens(&line);
            if tokens.get(index).map(String::as_str) == Some(value) {
                return Err(DbError::PrimaryKeyNotUnique);
            }
        }
        Ok(())
    }
}

impl RowSource for Table {
    fn next_row(&mut self) -> Result<Option<Row>, DbError> {
        loop {
            if self.header_pending && self.has_header {
                self.stream.read_line()?;
                self.header_pending = false;
            }
            let Some(line) = self.stream.read_line()? else {
                return Ok(None);
            };
            let mut row = Row::parse(&self.schema, &line);
            if !self.restriction.apply(&row)? {
                continue;
            }
            if !self.emitter.admit(&mut row)? {
                continue;
            }
            return Ok(Some(row));
        }
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn reset(&mut self) -> Result<(), DbError> {
        self.stream.rewind()?;
        self.header_pending = true;
        Ok(())
    }

    fn set_restriction(&mut self, text: &str) -> Result<(), DbError> {
        self.restriction = Restriction::new(text)?;
        Ok(())
    }

    fn filter_columns(&mut self, col_names: &str) {
        self.emitter.set_filter(col_names);
    }

    fn filter_distinct(&mut self, distinct: bool) {
        self.emitter.set_distinct(distinct);
    }

    /// 物化剩余的行、稳定排序，然后把后备流换成
    /// "模式头+有序行"的内存缓冲。
    fn order_by(&mut self, col_names: &str, desc: bool) -> Result<(), DbError> {
        if col_names.is_empty() {
            return Ok(());
        }
        let names = strutil::split(col_names, ',', false);
        let mut rows = Vec::new();
        while let Some(row) = self.next_row()? {
            rows.push(row);
        }
        rows.sort_by(|a, b| compare_rows(a, b, &names, desc));
        let mut content = String::with_capacity(256);
        content.push_str(&self.schema.serialize());
        content.push('\n');
        for row in &rows {
            content.push_str(&row.serialize());
            content.push('\n');
        }
        self.stream = Box::new(MemoryStream::new(content));
        self.has_header = true;
        self.header_pending = true;
        Ok(())
    }
}
