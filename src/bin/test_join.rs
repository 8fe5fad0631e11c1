use std::fs;

use filesql::{Database, TableDirectory};

/// 连接、外键和去重的演示程序。
fn main() {
    let dir = std::env::temp_dir().join("filesql-join-demo");
    let _ = fs::remove_dir_all(&dir);
    let db = Database::new(TableDirectory::new(&dir));

    let setup = vec![
        "CREATE TABLE users ( id int , name varchar(10) , PRIMARY KEY ( id ) ) ;",
        "CREATE TABLE orders ( oid int , uid int REFERENCES ( users.id ) , item varchar(20) ) ;",
        "INSERT INTO users ( id , name ) VALUES ( 1 , \"Ada\" ) ;",
        "INSERT INTO users ( id , name ) VALUES ( 2 , \"Bob\" ) ;",
        "INSERT INTO orders ( oid , uid , item ) VALUES ( 7 , 1 , \"Laptop\" ) ;",
        "INSERT INTO orders ( oid , uid , item ) VALUES ( 8 , 1 , \"Mouse\" ) ;",
        "INSERT INTO orders ( oid , uid , item ) VALUES ( 9 , 2 , \"Screen\" ) ;",
        // 悬挂引用应当失败
        "INSERT INTO orders ( oid , uid , item ) VALUES ( 10 , 99 , \"Ghost\" ) ;",
        // 被引用的用户不允许删除
        "DELETE FROM users WHERE id = 1 ;",
    ];
    for query in &setup {
        println!("\n> {query}");
        match db.execute(query) {
            Ok(_) => println!("执行成功"),
            Err(e) => println!("执行失败: {e}"),
        }
    }

    let selects = vec![
        "SELECT users.name , orders.item FROM users , orders WHERE users.id = orders.uid ;",
        "SELECT DISTINCT users.name FROM users , orders WHERE users.id = orders.uid ;",
        "SELECT users.name , orders.oid FROM users , orders \
         WHERE users.id = orders.uid ORDER BY orders.oid DESC ;",
    ];
    for query in &selects {
        println!("\n> {query}");
        match db.execute(query) {
            Ok(mut result) => loop {
                match result.next_row() {
                    Ok(Some(row)) => {
                        let values: Vec<&str> = row.columns().iter().map(|c| c.value()).collect();
                        println!("  {values:?}");
                    }
                    Ok(None) => break,
                    Err(e) => {
                        println!("执行失败: {e}");
                        break;
                    }
                }
            },
            Err(e) => println!("执行失败: {e}"),
        }
    }
}
