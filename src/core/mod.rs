pub mod db;
pub mod error;
pub mod integrity;
pub mod join;
pub mod restriction;
pub mod row;
pub mod schema;
pub mod sql;
pub mod storage;
pub mod strutil;
pub mod table;
pub mod types;
