pub mod cli;
pub mod core;

use std::path::PathBuf;

pub use crate::core::db::{Database, QueryResult};
pub use crate::core::error::DbError;
pub use crate::core::row::Row;
pub use crate::core::sql::{Query, QueryType};
pub use crate::core::storage::TableDirectory;

/// 执行单条查询的便捷入口。
///
/// # 参数
/// * `query` - 要执行的查询
/// * `table_dir` - 可选的表目录，不提供时使用默认的./tables
///
/// # 返回值
/// * `bool` - 执行成功返回true，失败返回false
pub fn execute_query(query: &str, table_dir: Option<PathBuf>) -> bool {
    let dir = table_dir.unwrap_or_else(|| PathBuf::from("./tables"));
    let db = Database::new(TableDirectory::new(dir));
    db.execute(query).is_ok()
}
