use crate::core::error::DbError;
use crate::core::row::Row;
use crate::core::strutil;
use crate::core::types::{like_match, DataType, Value, NULL_VALUE};

/// WHERE子句的求值器。
/// 解析时先用调度场算法把条件变换成后缀形式存放；
/// 对行求值时顺序扫描后缀序列，用一个布尔栈归约。
#[derive(Debug, Clone)]
pub struct Restriction {
    postfix: String,
}

impl Restriction {
    pub fn empty() -> Self {
        Restriction {
            postfix: String::new(),
        }
    }

    /// 变换为后缀表达式："a = 1 and ( b = 2 or c = 3 )"
    /// 变成"a = 1 b = 2 c = 3 or and"。and/or和左括号入栈，
    /// 右括号弹栈到配对的左括号，其余单元直接输出。
    pub fn new(text: &str) -> Result<Restriction, DbError> {
        if text.is_empty() {
            return Ok(Restriction::empty());
        }
        let mut operators: Vec<String> = Vec::new();
        let mut output: Vec<String> = Vec::new();
        for part in strutil::split(text, ' ', true) {
            let lowered = part.to_lowercase();
            if lowered == "and" || lowered == "or" || part == "(" {
                operators.push(lowered);
            } else if part == ")" {
                loop {
                    let Some(op) = operators.pop() else {
                        return Err(DbError::MalformedQuery(
                            "Unbalanced parentheses in restriction".to_string(),
                        ));
                    };
                    if op == "(" {
                        break;
                    }
                    output.push(op);
                }
            } else {
                output.push(part);
            }
        }
        while let Some(op) = operators.pop() {
            if op == "(" {
                return Err(DbError::MalformedQuery(
                    "Unbalanced parentheses in restriction".to_string(),
                ));
            }
            output.push(op);
        }
        Ok(Restriction {
            postfix: output.join(" "),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.postfix.is_empty()
    }

    /// 空条件恒为真。后缀序列里每个操作数三元组先于其组合算子出现。
    pub fn apply(&self, row: &Row) -> Result<bool, DbError> {
        if self.postfix.is_empty() {
            return Ok(true);
        }
        let parts = strutil::split(&self.postfix, ' ', true);
        let mut results: Vec<bool> = Vec::new();
        let mut i = 0;
        while i < parts.len() {
            if parts[i] != "and" && parts[i] != "or" {
                if i + 2 >= parts.len() {
                    return Err(DbError::MalformedQuery(format!(
                        "Incomplete condition near {}",
                        parts[i]
                    )));
                }
                let result = evaluate(&parts[i], &parts[i + 1], &parts[i + 2], row)?;
                results.push(result);
                i += 3;
            }
            if i < parts.len() && (parts[i] == "and" || parts[i] == "or") {
                let (b, a) = (pop(&mut results)?, pop(&mut results)?);
                results.push(if parts[i] == "and" { a && b } else { a || b });
                i += 1;
            }
        }
        pop(&mut results)
    }
}

fn pop(stack: &mut Vec<bool>) -> Result<bool, DbError> {
    stack
        .pop()
        .ok_or_else(|| DbError::MalformedQuery("Malformed restriction".to_string()))
}

/// 解析一个操作数：NULL字面量、行里的列、带引号的字符串或数字字面量。
/// 返回原始值和列的声明类型（字面量没有类型）。
fn resolve(token: &str, row: &Row) -> Result<(String, Option<DataType>), DbError> {
    if token.eq_ignore_ascii_case("null") {
        return Ok((NULL_VALUE.to_string(), None));
    }
    match row.get_column(token) {
        Ok(col) => Ok((
            col.value().to_string(),
            Some(col.metadata().column_type().clone()),
        )),
        Err(err @ DbError::AmbiguousColumn(_)) => Err(err),
        Err(_) => {
            if token.starts_with('"') || token.starts_with('\'') || strutil::looks_numeric(token) {
                Ok((token.to_string(), None))
            } else {
                Err(DbError::InvalidOperand(token.to_string()))
            }
        }
    }
}

/// 求值一个"左 算子 右"三元组。
fn evaluate(first: &str, op: &str, second: &str, row: &Row) -> Result<bool, DbError> {
    let (v1, t1) = resolve(first, row)?;
    let (v2, t2) = resolve(second, row)?;
    if let (Some(a), Some(b)) = (&t1, &t2) {
        if !a.compatible_with(b) {
            return Err(DbError::TypeMismatch(format!(
                "{first} and {second} do not have the same types"
            )));
        }
    }
    // NULL只在两边都是NULL且算子为=时成立
    if v1 == NULL_VALUE || v2 == NULL_VALUE {
        return Ok(op == "=" && v1 == NULL_VALUE && v2 == NULL_VALUE);
    }
    let data_type = t1.or(t2);
    let typed = matches!(&data_type, Some(ty) if !ty.is_text());
    // 空字符串来自外连接的空白单元，退回字符串比较
    if typed && !v1.is_empty() && !v2.is_empty() {
        let ty = data_type.as_ref().unwrap();
        let a = Value::parse(strutil::extract_quoted(&v1), ty)?;
        let b = Value::parse(strutil::extract_quoted(&v2), ty)?;
        apply_op(&a, op, &b)
    } else {
        let a = strutil::extract_quoted(&v1);
        let b = strutil::extract_quoted(&v2);
        if op.eq_ignore_ascii_case("like") {
            like_match(a, b)
        } else {
            apply_op(&a, op, &b)
        }
    }
}

fn apply_op<T: PartialOrd + PartialEq>(a: &T, op: &str, b: &T) -> Result<bool, DbError> {
    match op {
        "=" => Ok(a == b),
        "!=" => Ok(a != b),
        "<" => Ok(a < b),
        "<=" => Ok(a <= b),
        ">" => Ok(a > b),
        ">=" => Ok(a >= b),
        _ => Err(DbError::MalformedQuery(format!("Invalid operator: {op}"))),
    }
}
