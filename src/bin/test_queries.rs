use std::fs;

use filesql::{Database, TableDirectory};

fn main() {
    // 每次运行都从干净的目录开始
    let dir = std::env::temp_dir().join("filesql-demo");
    let _ = fs::remove_dir_all(&dir);
    let db = Database::new(TableDirectory::new(&dir));

    // 第一组测试：基本功能测试
    println!("\n=== 基本功能测试 ===");
    let basic_tests = vec![
        // 建表
        "CREATE TABLE users ( id int , name varchar(20) NOT NULL , age int , PRIMARY KEY ( id ) ) ;",
        "CREATE TABLE products ( pid int , name varchar(30) , price double , PRIMARY KEY ( pid ) ) ;",
        // 插入数据
        "INSERT INTO users ( id , name , age ) VALUES ( 1 , \"Alice\" , 25 ) ;",
        "INSERT INTO users ( id , name , age ) VALUES ( 2 , \"Bob\" , 30 ) ;",
        "INSERT INTO users ( id , name , age ) VALUES ( 3 , \"Charlie\" , NULL ) ;",
        "INSERT INTO products ( pid , name , price ) VALUES ( 1 , \"Laptop\" , 999.5 ) ;",
        "INSERT INTO products ( pid , name , price ) VALUES ( 2 , \"Mouse\" , 29.0 ) ;",
        // 条件查询
        "SELECT id , name FROM users WHERE age > 26 ;",
        "SELECT name FROM users WHERE age = NULL ;",
        "SELECT name , price FROM products WHERE price < 100 ;",
        // 更新和删除
        "UPDATE users SET age = 26 WHERE id = 1 ;",
        "DELETE FROM products WHERE pid = 2 ;",
        "SELECT * FROM users ORDER BY age DESC ;",
    ];

    // 第二组测试：错误处理测试
    println!("\n=== 错误处理测试 ===");
    let error_tests = vec![
        // 表已存在
        "CREATE TABLE users ( id int ) ;",
        // 未知表
        "SELECT * FROM unknown_table ;",
        // 主键冲突
        "INSERT INTO users ( id , name , age ) VALUES ( 1 , \"Dup\" , 1 ) ;",
        // 非空约束
        "INSERT INTO users ( id , name , age ) VALUES ( 9 , NULL , 1 ) ;",
        // 类型不匹配
        "INSERT INTO users ( id , name , age ) VALUES ( \"x\" , \"E\" , 1 ) ;",
        // 语法错误
        "SELEC * FROM users ;",
        "SELECT * FROM users",
        "INSERT INTO users ( id VALUES ( 1 ) ;",
    ];

    for (i, query) in basic_tests.iter().chain(error_tests.iter()).enumerate() {
        println!("\n测试 #{}: {}", i + 1, query);
        match db.execute(query) {
            Ok(mut result) => {
                let mut count = 0;
                loop {
                    match result.next_row() {
                        Ok(Some(row)) => {
                            let values: Vec<&str> =
                                row.columns().iter().map(|c| c.value()).collect();
                            println!("  行: {values:?}");
                            count += 1;
                        }
                        Ok(None) => break,
                        Err(e) => {
                            println!("执行失败: {e}");
                            break;
                        }
                    }
                }
                println!("执行成功 ({count}行)");
            }
            Err(e) => println!("执行失败: {e}"),
        }
    }
}
