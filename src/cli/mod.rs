use clap::Parser;
use std::io::{self, BufRead, Write};

use crate::core::db::{Database, QueryResult};
use crate::core::error::DbError;
use crate::core::row::Row;
use crate::core::storage::TableDirectory;
use crate::core::types::DataType;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 表文件所在的目录
    #[arg(short, long, default_value = "./tables")]
    table_dir: String,
}

impl Cli {
    /// 交互循环：逐行读查询、执行、打印结果。
    /// 一条查询失败只打印错误，循环继续。
    pub fn run(&self) -> Result<(), DbError> {
        let db = Database::new(TableDirectory::new(&self.table_dir));

        println!("FileSQL - 把表存在行式文本文件里的小型数据库");
        println!("输入 'help' 查看帮助，'quit' 退出");

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        print!("query> ");
        stdout.flush()?;

        for line in stdin.lock().lines() {
            let line = line?;
            let input = line.trim();
            match input {
                "quit" => break,
                "" => {}
                "help" => print_help(),
                "list" => match db.list_tables() {
                    Ok(tables) if tables.is_empty() => println!("没有表"),
                    Ok(tables) => {
                        println!("表列表:");
                        for table in tables {
                            println!("  {table}");
                        }
                    }
                    Err(e) => println!("Error: {e}"),
                },
                query => match db.execute(query) {
                    Ok(mut result) => {
                        if let Err(e) = print_result(&mut result) {
                            println!("Error: {e}");
                        }
                    }
                    Err(e) => println!("Error: {e}"),
                },
            }
            print!("query> ");
            stdout.flush()?;
        }
        Ok(())
    }
}

fn print_help() {
    println!("可用命令:");
    println!("  help - 显示帮助信息");
    println!("  list - 列出所有表");
    println!("  quit - 退出程序");
    println!("SQL语句: (以分号结束)");
    println!("  CREATE TABLE t ( col type [NOT NULL] [REFERENCES ( t.col )] , ... , PRIMARY KEY ( col ) ) ;");
    println!("  DROP TABLE t ;");
    println!("  INSERT INTO t ( col , ... ) VALUES ( val , ... ) ;");
    println!("  UPDATE t SET col = val , ... [WHERE 条件] ;");
    println!("  DELETE FROM t [WHERE 条件] ;");
    println!("  SELECT [DISTINCT] col , ... FROM t , ... [WHERE 条件] [ORDER BY col , ... [DESC]] ;");
    println!("  远程表: SELECT ... FROM http://主机/路径 ;");
}

fn print_result(result: &mut QueryResult) -> Result<(), DbError> {
    let mut first_line = true;
    while let Some(row) = result.next_row()? {
        if first_line {
            println!();
            print_column_headers(&row);
            println!();
            first_line = false;
        }
        print_row(&row);
        println!();
    }
    Ok(())
}

/// 列的显示宽度由声明类型决定。
/// int最长11位（-2147483648），bigint最长20位，
/// float/double取15位够常见场景用，日期10位，时间8位，
/// 字符串类型用声明的长度。
fn column_width(data_type: &DataType) -> usize {
    match data_type {
        DataType::Int => 11,
        DataType::BigInt => 20,
        DataType::Float | DataType::Double => 15,
        DataType::Date => 10,
        DataType::Time => 8,
        DataType::Char(n) | DataType::Varchar(n) => *n,
    }
}

fn print_column_headers(row: &Row) {
    for col in row.columns() {
        let width = column_width(col.metadata().column_type());
        let header = format!(
            "{}.{}",
            col.metadata().table_name(),
            col.metadata().column_name()
        );
        print!("{header:<width$}  ");
    }
    println!();
}

fn print_row(row: &Row) {
    for col in row.columns() {
        let width = column_width(col.metadata().column_type());
        let value = if col.is_null() { "NULL" } else { col.value() };
        print!("{value:<width$}  ");
    }
    println!();
}
