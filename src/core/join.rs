use std::collections::HashMap;

use crate::core::error::DbError;
use crate::core::restriction::Restriction;
use crate::core::row::Row;
use crate::core::schema::Schema;
use crate::core::storage::memory::MemoryStream;
use crate::core::storage::TableStream;
use crate::core::table::{compare_rows, RowEmitter, RowSource};
use crate::core::strutil;

/// 两个行来源的哈希等值连接。
/// 行数较少的一侧作为构建侧整个装进哈希表，
/// 较多的一侧作为探测侧逐行查找；未命中时合并空白行，
/// 让WHERE里的连接条件把它过滤掉。
pub struct JoinedTable {
    probe: Box<dyn RowSource>,
    build: Box<dyn RowSource>,
    schema: Schema,
    /// 探测侧列名到构建侧列名的映射
    column_map: HashMap<String, String>,
    /// "构建列=值"到构建行的映射
    join_map: HashMap<String, Row>,
    restriction: Restriction,
    emitter: RowEmitter,
    /// ORDER BY之后的物化缓冲（不含模式头）
    materialized: Option<MemoryStream>,
}

impl JoinedTable {
    /// 连接条件是空格分隔的"左 = 右"三元组序列。
    /// 只支持等值连接，其他算子直接拒绝。
    pub fn new(
        left: Box<dyn RowSource>,
        right: Box<dyn RowSource>,
        join_condition: &str,
    ) -> Result<JoinedTable, DbError> {
        let (build, probe) = if left.row_count() > right.row_count() {
            (right, left)
        } else {
            (left, right)
        };
        let mut schema = probe.schema().clone();
        schema.merge(build.schema());
        let mut joined = JoinedTable {
            probe,
            build,
            schema,
            column_map: HashMap::new(),
            join_map: HashMap::new(),
            restriction: Restriction::empty(),
            emitter: RowEmitter::default(),
            materialized: None,
        };
        if !join_condition.is_empty() {
            let parts = strutil::split(join_condition, ' ', true);
            joined.parse_join_condition(&parts)?;
        }
        Ok(joined)
    }

    /// 每个子句里属于构建侧模式的一边成为构建键，
    /// 另一边作为探测键记入column_map。
    fn parse_join_condition(&mut self, parts: &[String]) -> Result<(), DbError> {
        let mut build_columns = Vec::new();
        let mut i = 0;
        while i + 3 <= parts.len() {
            if parts[i + 1] != "=" {
                return Err(DbError::UnsupportedJoinOperator);
            }
            if self.build.schema().has_column(&parts[i]) {
                self.column_map.insert(parts[i + 2].clone(), parts[i].clone());
                build_columns.push(parts[i].clone());
            } else {
                self.column_map.insert(parts[i].clone(), parts[i + 2].clone());
                build_columns.push(parts[i + 2].clone());
            }
            i += 3;
        }
        self.build_join_map(&build_columns)
    }

    /// 构建阶段：把构建侧的每一行按键列装进哈希表。
    fn build_join_map(&mut self, build_columns: &[String]) -> Result<(), DbError> {
        self.build.reset()?;
        while let Some(row) = self.build.next_row()? {
            for name in build_columns {
                if let Ok(col) = row.get_column(name) {
                    let key = format!("{name}={}", col.value());
                    self.join_map.insert(key, row.clone());
                }
            }
        }
        self.build.reset()
    }

    /// 探测一行：用第一个命中的键列合并构建行，
    /// 全部未命中时合并构建侧宽度的空白行。
    fn probe_joined(&self, row: &mut Row) -> Result<(), DbError> {
        let mut matched: Option<Row> = None;
        for col in row.columns() {
            let mut col_name = col.metadata().column_name().to_string();
            if !self.column_map.contains_key(&col_name) {
                col_name = format!("{}.{}", col.metadata().table_name(), col_name);
            }
            if let Some(build_col) = self.column_map.get(&col_name) {
                let key = format!("{build_col}={}", col.value());
                if let Some(build_row) = self.join_map.get(&key) {
                    matched = Some(build_row.clone());
                    break;
                }
            }
        }
        match matched {
            Some(build_row) => row.merge(&build_row),
            None => row.merge(&Row::blank(self.build.schema())),
        }
        Ok(())
    }

    // 连接结果上不允许任何写操作

    pub fn insert_row(&mut self, _row: &mut Row) -> Result<(), DbError> {
        Err(DbError::NotPermittedOnJoin("insert"))
    }

    pub fn update_rows(&mut self, _updates: &HashMap<String, String>) -> Result<(), DbError> {
        Err(DbError::NotPermittedOnJoin("update"))
    }

    pub fn delete_rows(&mut self) -> Result<(), DbError> {
        Err(DbError::NotPermittedOnJoin("delete"))
    }
}

impl RowSource for JoinedTable {
    fn next_row(&mut self) -> Result<Option<Row>, DbError> {
        loop {
            let mut row = if let Some(stream) = &mut self.materialized {
                let Some(line) = stream.read_line()? else {
                    return Ok(None);
                };
                Row::parse(&self.schema, &line)
            } else {
                let Some(mut probe_row) = self.probe.next_row()? else {
                    return Ok(None);
                };
                if self.column_map.is_empty() && self.join_map.is_empty() {
                    // 无连接条件：构建侧游标循环推进，
                    // 耗尽时回绕再取（沿用原有的滑动配对语义）
                    let build_row = match self.build.next_row()? {
                        Some(row) => Some(row),
                        None => {
                            self.build.reset()?;
                            self.build.next_row()?
                        }
                    };
                    if let Some(build_row) = build_row {
                        probe_row.merge(&build_row);
                    }
                } else {
                    self.probe_joined(&mut probe_row)?;
                }
                probe_row
            };
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
        self.probe.row_count()
    }

    fn reset(&mut self) -> Result<(), DbError> {
        if let Some(stream) = &mut self.materialized {
            return stream.rewind();
        }
        self.probe.reset()?;
        self.build.reset()
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

    /// 物化为不带模式头的内存缓冲；之后的读取按合并模式解析。
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
        for row in &rows {
            content.push_str(&row.serialize());
            content.push('\n');
        }
        self.materialized = Some(MemoryStream::new(content));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::ColumnMetadata;
    use crate::core::storage::TableDirectory;
    use crate::core::table::Table;
    use crate::core::types::DataType;
    use std::fs;

    fn users_schema() -> Schema {
        let mut schema = Schema::new();
        schema.add_column(ColumnMetadata::new("id", "users", DataType::Int, "", true, true));
        schema.add_column(ColumnMetadata::new(
            "name",
            "users",
            DataType::Varchar(10),
            "",
            false,
            false,
        ));
        schema
    }

    fn orders_schema() -> Schema {
        let mut schema = Schema::new();
        schema.add_column(ColumnMetadata::new("oid", "orders", DataType::Int, "", false, false));
        schema.add_column(ColumnMetadata::new(
            "uid",
            "orders",
            DataType::Int,
            "users.id",
            false,
            false,
        ));
        schema
    }

    fn setup(dir: &TableDirectory) {
        let mut users = users_schema().serialize();
        users.push_str("\n\"1\" \"Ada\"\n\"2\" \"Bob\"\n");
        fs::write(dir.table_path("users"), users).unwrap();
        let mut orders = orders_schema().serialize();
        orders.push_str("\n\"7\" \"1\"\n\"8\" \"1\"\n\"9\" \"99\"\n");
        fs::write(dir.table_path("orders"), orders).unwrap();
    }

    fn open_join(dir: &TableDirectory, condition: &str) -> JoinedTable {
        let users = Box::new(Table::open(dir, "users").unwrap());
        let orders = Box::new(Table::open(dir, "orders").unwrap());
        JoinedTable::new(users, orders, condition).unwrap()
    }

    #[test]
    fn test_build_side_is_smaller_table() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = TableDirectory::new(tmp.path());
        setup(&dir);
        let joined = open_join(&dir, "users.id = orders.uid");
        // users两行、orders三行：users是构建侧，探测侧行数为3
        assert_eq!(joined.row_count(), 3);
        // 合并模式：探测侧在前
        assert_eq!(joined.schema().columns()[0].table_name(), "orders");
        assert_eq!(joined.schema().columns()[2].table_name(), "users");
    }

    #[test]
    fn test_equi_join_with_where_filter() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = TableDirectory::new(tmp.path());
        setup(&dir);
        let mut joined = open_join(&dir, "users.id = orders.uid");
        joined.set_restriction("users.id = orders.uid").unwrap();
        joined.filter_columns("users.name,orders.oid");
        let mut results = Vec::new();
        while let Some(row) = joined.next_row().unwrap() {
            results.push(format!(
                "{} {}",
                row.columns()[0].value(),
                row.columns()[1].value()
            ));
        }
        // uid=99的订单没有对应用户，被连接条件过滤掉
        assert_eq!(results, vec!["Ada 7", "Ada 8"]);
    }

    #[test]
    fn test_unmatched_probe_row_merges_blanks() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = TableDirectory::new(tmp.path());
        setup(&dir);
        let mut joined = open_join(&dir, "users.id = orders.uid");
        let mut widths = Vec::new();
        while let Some(row) = joined.next_row().unwrap() {
            widths.push(row.columns().len());
        }
        // 没有WHERE过滤时未命中的探测行带着空白构建列输出
        assert_eq!(widths, vec![4, 4, 4]);
    }

    #[test]
    fn test_join_rejects_other_operators() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = TableDirectory::new(tmp.path());
        setup(&dir);
        let users = Box::new(Table::open(&dir, "users").unwrap());
        let orders = Box::new(Table::open(&dir, "orders").unwrap());
        assert!(matches!(
            JoinedTable::new(users, orders, "users.id != orders.uid"),
            Err(DbError::UnsupportedJoinOperator)
        ));
    }

    #[test]
    fn test_no_condition_pairs_with_sliding_build_cursor() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = TableDirectory::new(tmp.path());
        setup(&dir);
        let mut joined = open_join(&dir, "");
        let mut pairs = Vec::new();
        while let Some(row) = joined.next_row().unwrap() {
            pairs.push(format!(
                "{}-{}",
                row.columns()[0].value(),
                row.columns()[2].value()
            ));
        }
        // 探测三行，构建侧两行循环推进：1,2,1
        assert_eq!(pairs, vec!["7-1", "8-2", "9-1"]);
    }

    #[test]
    fn test_order_by_on_join() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = TableDirectory::new(tmp.path());
        setup(&dir);
        let mut joined = open_join(&dir, "users.id = orders.uid");
        joined.set_restriction("users.id = orders.uid").unwrap();
        joined.order_by("orders.oid", true).unwrap();
        let mut oids = Vec::new();
        while let Some(row) = joined.next_row().unwrap() {
            oids.push(row.columns()[0].value().to_string());
        }
        assert_eq!(oids, vec!["8", "7"]);
    }

    #[test]
    fn test_distinct_on_join() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = TableDirectory::new(tmp.path());
        setup(&dir);
        let mut joined = open_join(&dir, "users.id = orders.uid");
        joined.set_restriction("users.id = orders.uid").unwrap();
        joined.filter_columns("users.name");
        joined.filter_distinct(true);
        let mut names = Vec::new();
        while let Some(row) = joined.next_row().unwrap() {
            names.push(row.columns()[0].value().to_string());
        }
        assert_eq!(names, vec!["Ada"]);
    }

    #[test]
    fn test_mutations_not_permitted() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = TableDirectory::new(tmp.path());
        setup(&dir);
        let mut joined = open_join(&dir, "users.id = orders.uid");
        let mut row = Row::new(joined.schema().clone());
        assert!(matches!(
            joined.insert_row(&mut row),
            Err(DbError::NotPermittedOnJoin(_))
        ));
        assert!(matches!(
            joined.update_rows(&HashMap::new()),
            Err(DbError::NotPermittedOnJoin(_))
        ));
        assert!(matches!(
            joined.delete_rows(),
            Err(DbError::NotPermittedOnJoin(_))
        ));
    }
}
