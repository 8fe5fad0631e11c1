use std::collections::{BTreeSet, HashMap};

use super::{Query, QueryType};
use crate::core::error::DbError;
use crate::core::schema::{ColumnMetadata, Schema};
use crate::core::strutil;
use crate::core::types::{DataType, NULL_VALUE};

type Properties = HashMap<String, String>;

fn malformed() -> DbError {
    DbError::MalformedQuery("Malformed query".to_string())
}

fn get(parts: &[String], index: usize) -> Result<&str, DbError> {
    parts.get(index).map(String::as_str).ok_or_else(malformed)
}

/// 解析一条已规整的查询。先做整体校验（分号收尾、括号
/// 和引号配对），再按第一个关键字分派给各语句的解析器。
pub(super) fn parse(query_string: String) -> Result<Query, DbError> {
    match query_string.find(';') {
        Some(pos) if pos == query_string.len() - 1 => {}
        _ => {
            return Err(DbError::MalformedQuery(
                "Missing semicolon at end".to_string(),
            ))
        }
    }
    if !is_balanced(&query_string) {
        return Err(DbError::MalformedQuery(
            "Unbalanced parentheses or quotes".to_string(),
        ));
    }
    let lowered = query_string.to_lowercase();
    if lowered.starts_with("create") {
        parse_create(query_string)
    } else if lowered.starts_with("drop") {
        parse_drop(query_string)
    } else if lowered.starts_with("insert") {
        parse_insert(query_string)
    } else if lowered.starts_with("update") {
        parse_update(query_string)
    } else if lowered.starts_with("delete") {
        parse_delete(query_string)
    } else if lowered.starts_with("select") {
        parse_select(query_string)
    } else {
        Err(DbError::MalformedQuery("Invalid query".to_string()))
    }
}

/// 双引号外的括号必须配对；两种引号各自的未转义出现次数必须为偶数
/// （按切分段数的奇偶判断）。
fn is_balanced(query: &str) -> bool {
    let mut depth: u32 = 0;
    let mut ignore = false;
    let mut escaped = false;
    for c in query.chars() {
        if c == '"' && !escaped {
            ignore = !ignore;
        }
        escaped = if c == '\\' { !escaped } else { false };
        if ignore {
            continue;
        }
        if c == '(' {
            depth += 1;
        } else if c == ')' {
            if depth == 0 {
                return false;
            }
            depth -= 1;
        }
    }
    depth == 0
        && strutil::split(query, '"', true).len() % 2 == 1
        && strutil::split(query, '\'', true).len() % 2 == 1
}

// --- CREATE ---

fn parse_create(query_string: String) -> Result<Query, DbError> {
    let parts = strutil::split(&query_string, ' ', false);
    // 最短形式：CREATE TABLE t ( col type ) ;
    if parts.len() < 8 {
        return Err(malformed());
    }
    let table_name = parts[2].clone();
    if !parts[1].eq_ignore_ascii_case("table") || parts[3] != "(" || parts[parts.len() - 2] != ")" {
        return Err(malformed());
    }
    let mut metadata_vec: Vec<ColumnMetadata> = Vec::new();
    let mut index = 4;
    while index < parts.len() - 2 {
        if parts[index].eq_ignore_ascii_case("primary") {
            parse_primary_key(&parts, &mut metadata_vec, &mut index)?;
        } else {
            metadata_vec.push(create_column_metadata(&table_name, &parts, &mut index)?);
        }
    }
    let mut schema = Schema::new();
    let mut primary_key_found = false;
    let mut col_names = BTreeSet::new();
    for metadata in metadata_vec {
        if metadata.is_primary_key() {
            if primary_key_found {
                return Err(DbError::MalformedQuery(
                    "Table cannot have more than one primary key".to_string(),
                ));
            }
            primary_key_found = true;
        }
        if !col_names.insert(metadata.column_name().to_string()) {
            return Err(DbError::MalformedQuery(
                "Column names must be unique".to_string(),
            ));
        }
        schema.add_column(metadata);
    }
    let mut properties = Properties::new();
    properties.insert("tableName".to_string(), table_name);
    properties.insert("schema".to_string(), schema.serialize());
    Ok(Query::new(query_string, QueryType::Create, properties))
}

/// 读取下一列的定义：列名、类型（可带长度）、列选项。
/// 主键标志一律初始化为假，由PRIMARY KEY子句回填。
fn create_column_metadata(
    table_name: &str,
    parts: &[String],
    index: &mut usize,
) -> Result<ColumnMetadata, DbError> {
    let col_name = get(parts, *index)?.to_string();
    *index += 1;
    let mut data_type = get(parts, *index)?.to_lowercase();
    *index += 1;
    if parts.get(*index).map(String::as_str) == Some("(") {
        let length = get(parts, *index + 1)?;
        let close = get(parts, *index + 2)?;
        data_type = format!("{data_type}({length}{close}");
        *index += 3;
    }
    let data_type = DataType::parse(&data_type)?;
    let mut references = String::new();
    let mut not_null = false;
    extract_column_options(parts, index, &col_name, &mut references, &mut not_null)?;
    *index += 1;
    Ok(ColumnMetadata::new(
        col_name, table_name, data_type, references, false, not_null,
    ))
}

/// 解析NOT NULL和REFERENCES ( 表.列 ) 这两种列选项。
fn extract_column_options(
    parts: &[String],
    index: &mut usize,
    col_name: &str,
    references: &mut String,
    not_null: &mut bool,
) -> Result<(), DbError> {
    while *index < parts.len() - 2 && parts[*index] != "," {
        let token = &parts[*index];
        if token.eq_ignore_ascii_case("not") {
            if get(parts, *index + 1)?.eq_ignore_ascii_case("null") {
                *not_null = true;
                *index += 2;
            } else {
                return Err(DbError::MalformedQuery(format!(
                    "Expected 'null' for column {col_name}"
                )));
            }
        } else if token.eq_ignore_ascii_case("references") {
            if parts.get(*index + 1).map(String::as_str) == Some("(")
                && parts.get(*index + 3).map(String::as_str) == Some(")")
            {
                *references = parts[*index + 2].clone();
                *index += 4;
            } else {
                return Err(DbError::MalformedQuery(format!(
                    "Missing brackets for column {col_name}"
                )));
            }
        } else {
            return Err(DbError::MalformedQuery(format!(
                "Unexpected symbol {token} for column {col_name}"
            )));
        }
    }
    Ok(())
}

/// PRIMARY KEY ( col )：在已经解析出的列上回填主键标志。
fn parse_primary_key(
    parts: &[String],
    metadata_vec: &mut [ColumnMetadata],
    index: &mut usize,
) -> Result<(), DbError> {
    if !get(parts, *index + 1)?.eq_ignore_ascii_case("key") {
        return Err(DbError::MalformedQuery(
            "Expected 'key' after 'primary'".to_string(),
        ));
    }
    if get(parts, *index + 2)? != "(" || get(parts, *index + 4)? != ")" {
        return Err(DbError::MalformedQuery(
            "Expected parentheses after primary key declaration".to_string(),
        ));
    }
    let key_column = get(parts, *index + 3)?.to_string();
    for metadata in metadata_vec.iter_mut() {
        if metadata.column_name() == key_column {
            metadata.mark_primary_key();
        }
    }
    *index += if parts.get(*index + 5).map(String::as_str) == Some(",") {
        6
    } else {
        5
    };
    Ok(())
}

// --- DROP ---

fn parse_drop(query_string: String) -> Result<Query, DbError> {
    let parts = strutil::split(&query_string, ' ', false);
    // DROP TABLE t ;
    if parts.len() != 4 {
        return Err(malformed());
    }
    if !parts[1].eq_ignore_ascii_case("table") {
        return Err(DbError::MalformedQuery(format!(
            "Expected 'table' but got {}",
            parts[1]
        )));
    }
    let mut properties = Properties::new();
    properties.insert("tableName".to_string(), parts[2].clone());
    Ok(Query::new(query_string, QueryType::Drop, properties))
}

// --- INSERT ---

fn parse_insert(query_string: String) -> Result<Query, DbError> {
    let parts = strutil::split(&query_string, ' ', true);
    // INSERT INTO t ( col ) VALUES ( val ) ;
    if parts.len() < 11 {
        if parts.get(3).map(String::as_str) != Some("(") {
            return Err(DbError::MalformedQuery(
                "Expected column names after table name".to_string(),
            ));
        }
        return Err(malformed());
    }
    if !parts[1].eq_ignore_ascii_case("into") {
        return Err(DbError::MalformedQuery(
            "Expected 'into' after insert keyword".to_string(),
        ));
    }
    if parts[3] != "(" {
        return Err(DbError::MalformedQuery(
            "Expected column names after table name".to_string(),
        ));
    }
    // 括号之间的单元原样拼接；逗号本身就是其中的单元，
    // 拼出来直接是逗号分隔的清单
    let mut index = 4;
    let mut column_names = String::new();
    while get(&parts, index)? != ")" {
        column_names.push_str(&parts[index]);
        index += 1;
    }
    if index == parts.len() - 1 || !get(&parts, index + 1)?.eq_ignore_ascii_case("values") {
        return Err(DbError::MalformedQuery(
            "Expected 'values' after column declarations".to_string(),
        ));
    }
    if get(&parts, index + 2)? != "(" {
        return Err(DbError::MalformedQuery(
            "Expected value declarations within parentheses".to_string(),
        ));
    }
    index += 3;
    let mut column_values = String::new();
    while get(&parts, index)? != ")" {
        if parts[index].eq_ignore_ascii_case("null") {
            column_values.push_str(NULL_VALUE);
        } else {
            column_values.push_str(&parts[index]);
        }
        index += 1;
    }
    let mut properties = Properties::new();
    properties.insert("tableName".to_string(), parts[2].clone());
    properties.insert("columnNames".to_string(), column_names);
    properties.insert("columnValues".to_string(), column_values);
    Ok(Query::new(query_string, QueryType::Insert, properties))
}

// --- UPDATE ---

fn parse_update(query_string: String) -> Result<Query, DbError> {
    let parts = strutil::split(&query_string, ' ', true);
    // UPDATE t SET col = val ;
    if parts.len() < 7 || !parts[2].eq_ignore_ascii_case("set") {
        return Err(malformed());
    }
    let mut columns = String::new();
    let mut values = String::new();
    let mut index = 3;
    loop {
        let token = get(&parts, index)?;
        if token == ";" || token.eq_ignore_ascii_case("where") {
            break;
        }
        columns.push_str(token);
        columns.push(',');
        index += 1;
        if get(&parts, index)? != "=" {
            return Err(DbError::MalformedQuery(
                "Expected = after column name".to_string(),
            ));
        }
        index += 1;
        let value = get(&parts, index)?;
        if value.eq_ignore_ascii_case("null") {
            values.push_str(NULL_VALUE);
        } else {
            values.push_str(value);
        }
        values.push(',');
        index += 1;
        if parts.get(index).map(String::as_str) == Some(",") {
            index += 1;
        }
    }
    if columns.ends_with(',') {
        columns.pop();
    }
    if values.ends_with(',') {
        values.pop();
    }
    let restrictions = parse_restrictions(&parts, &mut index)?;
    let mut properties = Properties::new();
    properties.insert("tableName".to_string(), parts[1].clone());
    properties.insert("columns".to_string(), columns);
    properties.insert("values".to_string(), values);
    properties.insert("restrictions".to_string(), restrictions);
    Ok(Query::new(query_string, QueryType::Update, properties))
}

// --- DELETE ---

fn parse_delete(query_string: String) -> Result<Query, DbError> {
    let parts = strutil::split(&query_string, ' ', true);
    // DELETE FROM t ;
    if parts.len() < 4 || !parts[1].eq_ignore_ascii_case("from") {
        return Err(malformed());
    }
    let mut index = 3;
    let restrictions = parse_restrictions(&parts, &mut index)?;
    let mut properties = Properties::new();
    properties.insert("tableName".to_string(), parts[2].clone());
    properties.insert("restrictions".to_string(), restrictions);
    Ok(Query::new(query_string, QueryType::Delete, properties))
}

// --- SELECT ---

fn parse_select(query_string: String) -> Result<Query, DbError> {
    let parts = strutil::split(&query_string, ' ', true);
    // SELECT col FROM t ;
    if parts.len() < 5 || !query_string.to_lowercase().contains(" from ") {
        return Err(malformed());
    }
    let mut properties = Properties::new();
    let mut index = 1;
    if parts[1].eq_ignore_ascii_case("distinct") {
        index = 2;
        properties.insert("distinct".to_string(), String::new());
    }
    let mut column_names = String::new();
    loop {
        let token = get(&parts, index)?;
        if token.eq_ignore_ascii_case("from") {
            break;
        }
        column_names.push_str(strutil::extract_quoted(token));
        index += 1;
    }
    index += 1;
    let mut table_names = String::new();
    loop {
        let token = get(&parts, index)?;
        if token == ";" || token.eq_ignore_ascii_case("where") || token.eq_ignore_ascii_case("order")
        {
            break;
        }
        table_names.push_str(strutil::extract_quoted(token));
        index += 1;
    }
    let restrictions = parse_restrictions(&parts, &mut index)?;
    let join_conditions = extract_join_conditions(&restrictions);
    let order_by = parse_order_by(&parts, &mut index)?;
    if parts
        .get(index)
        .is_some_and(|p| p.eq_ignore_ascii_case("desc"))
    {
        properties.insert("desc".to_string(), String::new());
    }
    properties.insert("columnNames".to_string(), column_names);
    properties.insert("tableNames".to_string(), table_names);
    properties.insert("restrictions".to_string(), restrictions);
    properties.insert("joinConditions".to_string(), join_conditions);
    properties.insert("orderBy".to_string(), order_by);
    Ok(Query::new(query_string, QueryType::Select, properties))
}

/// WHERE之后的单元原样收集，以空格连接，直到分号或ORDER BY。
fn parse_restrictions(parts: &[String], index: &mut usize) -> Result<String, DbError> {
    let token = get(parts, *index)?;
    if token.eq_ignore_ascii_case("where") {
        *index += 1;
        let mut restrictions = String::new();
        loop {
            let token = get(parts, *index)?;
            if token == ";" || token.eq_ignore_ascii_case("order") {
                break;
            }
            restrictions.push_str(token);
            restrictions.push(' ');
            *index += 1;
        }
        if restrictions.ends_with(' ') {
            restrictions.pop();
        }
        Ok(restrictions)
    } else if token != ";" && !token.eq_ignore_ascii_case("order") {
        Err(malformed())
    } else {
        Ok(String::new())
    }
}

fn parse_order_by(parts: &[String], index: &mut usize) -> Result<String, DbError> {
    let mut order_by = String::new();
    if get(parts, *index)?.eq_ignore_ascii_case("order") {
        *index += 1;
        if !get(parts, *index)?.eq_ignore_ascii_case("by") {
            return Err(DbError::MalformedQuery(
                "Expected 'by' after 'order'".to_string(),
            ));
        }
        *index += 1;
        loop {
            let token = get(parts, *index)?;
            if token == ";" || token.eq_ignore_ascii_case("desc") {
                break;
            }
            order_by.push_str(token);
            *index += 1;
        }
    }
    Ok(order_by)
}

/// 从WHERE子句里抽出连接条件：两边都像列名的三元组。
/// 括号只是分组记号，先剔除再扫描。
fn extract_join_conditions(restrictions: &str) -> String {
    if restrictions.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = strutil::split(restrictions, ' ', true)
        .into_iter()
        .filter(|p| p != "(" && p != ")")
        .collect();
    let mut join_conditions = String::new();
    let mut index = 0;
    while index + 3 <= parts.len() {
        let left = &parts[index];
        let right = &parts[index + 2];
        let keep = is_column_name(left) && is_column_name(right);
        if keep {
            join_conditions.push_str(left);
            join_conditions.push(' ');
            join_conditions.push_str(&parts[index + 1]);
            join_conditions.push(' ');
            join_conditions.push_str(right);
        }
        index += 3;
        if index < parts.len()
            && (parts[index].eq_ignore_ascii_case("and") || parts[index].eq_ignore_ascii_case("or"))
        {
            if keep {
                join_conditions.push(' ');
            }
            index += 1;
        }
    }
    while join_conditions.ends_with(' ') {
        join_conditions.pop();
    }
    join_conditions
}

/// 不带引号也不像数字的单元当作列名。
fn is_column_name(s: &str) -> bool {
    !s.starts_with('"') && !s.starts_with('\'') && !strutil::looks_numeric(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_semicolon() {
        assert!(matches!(
            Query::parse("SELECT * FROM users"),
            Err(DbError::MalformedQuery(msg)) if msg.contains("semicolon")
        ));
        // 分号必须是最后一个字符
        assert!(Query::parse("SELECT * FROM users ; extra").is_err());
    }

    #[test]
    fn test_unbalanced() {
        assert!(Query::parse("CREATE TABLE t ( a int ;").is_err());
        assert!(Query::parse("SELECT * FROM t WHERE n = \"x ;").is_err());
        assert!(Query::parse("SELECT * FROM t WHERE n = 'x ;").is_err());
    }

    #[test]
    fn test_unknown_statement() {
        assert!(matches!(
            Query::parse("SELEC * FROM users ;"),
            Err(DbError::MalformedQuery(msg)) if msg == "Invalid query"
        ));
    }

    #[test]
    fn test_parse_create() {
        let query = Query::parse(
            "CREATE TABLE users ( id int , name varchar(10) NOT NULL , PRIMARY KEY ( id ) ) ;",
        )
        .unwrap();
        assert_eq!(query.query_type(), QueryType::Create);
        assert_eq!(query.property("tableName"), "users");
        let schema = Schema::parse("users", query.property("schema")).unwrap();
        assert_eq!(schema.len(), 2);
        let id = &schema.columns()[0];
        assert!(id.is_primary_key());
        assert!(id.is_not_null());
        let name = &schema.columns()[1];
        assert!(!name.is_primary_key());
        assert!(name.is_not_null());
        assert_eq!(*name.column_type(), DataType::Varchar(10));
    }

    #[test]
    fn test_parse_create_references() {
        let query = Query::parse(
            "CREATE TABLE orders ( oid int , uid int REFERENCES ( users.id ) ) ;",
        )
        .unwrap();
        let schema = Schema::parse("orders", query.property("schema")).unwrap();
        assert_eq!(schema.columns()[1].referenced_column(), "users.id");
    }

    #[test]
    fn test_create_rejects_duplicate_columns_and_keys() {
        assert!(Query::parse("CREATE TABLE t ( a int , a int ) ;").is_err());
        assert!(Query::parse(
            "CREATE TABLE t ( a int , b int , PRIMARY KEY ( a ) , PRIMARY KEY ( b ) ) ;"
        )
        .is_err());
        assert!(matches!(
            Query::parse("CREATE TABLE t ( a blob ) ;"),
            Err(DbError::MalformedQuery(msg)) if msg.contains("Invalid data type")
        ));
    }

    #[test]
    fn test_parse_insert() {
        let query =
            Query::parse("INSERT INTO users ( id , name ) VALUES ( 1 , \"Ada\" ) ;").unwrap();
        assert_eq!(query.query_type(), QueryType::Insert);
        assert_eq!(query.property("tableName"), "users");
        assert_eq!(query.property("columnNames"), "id,name");
        assert_eq!(query.property("columnValues"), "1,\"Ada\"");
    }

    #[test]
    fn test_parse_insert_compact_parentheses() {
        // 规整器会把紧凑写法拆开
        let query = Query::parse("INSERT INTO users (id,name) VALUES (1,\"Ada\");").unwrap();
        assert_eq!(query.property("columnNames"), "id,name");
        assert_eq!(query.property("columnValues"), "1,\"Ada\"");
    }

    #[test]
    fn test_parse_insert_null_value() {
        let query =
            Query::parse("INSERT INTO users ( id , name ) VALUES ( 1 , NULL ) ;").unwrap();
        assert_eq!(query.property("columnValues"), format!("1,{NULL_VALUE}"));
    }

    #[test]
    fn test_parse_update() {
        let query =
            Query::parse("UPDATE users SET name = \"Max\" , id = 5 WHERE id = 2 ;").unwrap();
        assert_eq!(query.query_type(), QueryType::Update);
        assert_eq!(query.property("tableName"), "users");
        assert_eq!(query.property("columns"), "name,id");
        assert_eq!(query.property("values"), "\"Max\",5");
        assert_eq!(query.property("restrictions"), "id = 2");
    }

    #[test]
    fn test_parse_delete() {
        let query = Query::parse("DELETE FROM users WHERE id = 1 ;").unwrap();
        assert_eq!(query.query_type(), QueryType::Delete);
        assert_eq!(query.property("tableName"), "users");
        assert_eq!(query.property("restrictions"), "id = 1");
        let query = Query::parse("DELETE FROM users ;").unwrap();
        assert_eq!(query.property("restrictions"), "");
    }

    #[test]
    fn test_parse_select_full() {
        let query = Query::parse(
            "SELECT DISTINCT name , id FROM users WHERE id > 1 ORDER BY name , id DESC ;",
        )
        .unwrap();
        assert_eq!(query.query_type(), QueryType::Select);
        assert!(query.has_property("distinct"));
        assert!(query.has_property("desc"));
        assert_eq!(query.property("columnNames"), "name,id");
        assert_eq!(query.property("tableNames"), "users");
        assert_eq!(query.property("restrictions"), "id > 1");
        assert_eq!(query.property("orderBy"), "name,id");
    }

    #[test]
    fn test_parse_select_star() {
        let query = Query::parse("SELECT * FROM users ;").unwrap();
        assert_eq!(query.property("columnNames"), "*");
        assert!(!query.has_property("distinct"));
        assert_eq!(query.property("restrictions"), "");
        assert_eq!(query.property("orderBy"), "");
    }

    #[test]
    fn test_select_requires_from() {
        assert!(Query::parse("SELECT a , b ;").is_err());
    }

    #[test]
    fn test_join_condition_extraction() {
        let query = Query::parse(
            "SELECT users.name , orders.oid FROM users , orders WHERE users.id = orders.uid ;",
        )
        .unwrap();
        assert_eq!(query.property("tableNames"), "users,orders");
        assert_eq!(query.property("joinConditions"), "users.id = orders.uid");
    }

    #[test]
    fn test_join_condition_skips_literals() {
        let query = Query::parse(
            "SELECT * FROM users , orders WHERE users.id = orders.uid AND name = \"Ada\" AND oid = 7 ;",
        )
        .unwrap();
        assert_eq!(query.property("joinConditions"), "users.id = orders.uid");
        // 限制条件保留原始大小写，and/or在Restriction解析时才折叠
        assert_eq!(
            query.property("restrictions"),
            "users.id = orders.uid AND name = \"Ada\" AND oid = 7"
        );
    }

    #[test]
    fn test_restrictions_keep_parenthesized_form() {
        let query =
            Query::parse("SELECT * FROM t WHERE ( a = 1 or b = 2 ) and c = 3 ;").unwrap();
        assert_eq!(query.property("restrictions"), "( a = 1 or b = 2 ) and c = 3");
        assert_eq!(query.property("joinConditions"), "");
    }
}
