use std::io;
use thiserror::Error;

/// 数据库统一错误类型。
/// REPL层直接打印Display输出，因此每个变体的消息都是面向用户的。
#[derive(Error, Debug)]
pub enum DbError {
    #[error("{0}")]
    Io(#[from] io::Error),

    /// 语法错误：缺少分号、括号/引号不配对、出现意外的词法单元等
    #[error("{0}")]
    MalformedQuery(String),

    #[error("Column {0} does not exist")]
    UnknownColumn(String),

    #[error("Table {0} does not exist")]
    UnknownTable(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    /// 值无法按声明的列类型解析，或比较双方类型不一致
    #[error("{0}")]
    TypeMismatch(String),

    #[error("{0} cannot be null")]
    NotNullViolation(String),

    #[error("Primary key must be unique")]
    PrimaryKeyNotUnique,

    /// 外键正向检查失败：插入/更新的值在被引用表中不存在
    #[error("Value {value} does not reference {referenced}")]
    DanglingReference { value: String, referenced: String },

    /// 外键反向检查失败：被修改/删除的值仍被其他表引用
    #[error("Column {0} references a value being modified or deleted")]
    ReferencedBy(String),

    #[error("Joins currently only support the = operator")]
    UnsupportedJoinOperator,

    #[error("Cannot {0} rows in a joined table")]
    NotPermittedOnJoin(&'static str),

    #[error("Cannot {0} a remote table")]
    NotPermittedOnRemote(&'static str),

    /// 限制条件中的词法单元既不是列名、数字，也不是带引号的字符串
    #[error("Invalid value/column name: {0}")]
    InvalidOperand(String),

    #[error("Cannot escape character {0}")]
    BadEscape(char),

    #[error("Ambiguous column: {0}")]
    AmbiguousColumn(String),
}
