// Copyright 2022 SphereEx Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The execution layer a connection drives. Sessions, prepared statements
//! and results are owned by the SQL engine; the front end only consumes
//! them through these traits.

use async_trait::async_trait;
use mysql_protocol::{server::err::MySQLError, value::Value};

/// Compatibility marker passed to the engine for every MySQL session.
pub const MYSQL_MODE: &str = "MySQL";

/// Everything the engine needs to open a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub database: String,
    pub user: String,
    pub password: String,
    pub mode: String,
}

impl ConnectionInfo {
    pub fn new(database: &str, user: &str, password: &str) -> ConnectionInfo {
        ConnectionInfo {
            database: database.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            mode: MYSQL_MODE.to_string(),
        }
    }
}

/// Engine side column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Null,
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Decimal,
    Float,
    Double,
    Date,
    Time,
    Timestamp,
    Char,
    Varchar,
    Clob,
    Bytes,
    Blob,
    Json,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub sql_type: SqlType,
}

impl ColumnMeta {
    pub fn new(name: &str, sql_type: SqlType) -> ColumnMeta {
        ColumnMeta { name: name.to_string(), sql_type }
    }
}

pub trait PreparedStatement: Send + Sync {
    fn sql(&self) -> &str;

    fn is_query(&self) -> bool;

    /// Visible result columns, empty for statements that return no rows.
    fn columns(&self) -> Vec<ColumnMeta>;

    fn parameter_count(&self) -> usize;

    fn close(&self);
}

/// A forward only cursor. `next` advances, `current_row` reads the row it
/// advanced to.
pub trait QueryResult: Send {
    fn column_count(&self) -> usize;

    fn column_name(&self, idx: usize) -> &str;

    fn column_type(&self, idx: usize) -> SqlType;

    /// Number of rows when known up front, `None` streams until `next`
    /// returns false.
    fn row_count(&self) -> Option<usize>;

    fn next(&mut self) -> Result<bool, MySQLError>;

    fn current_row(&self) -> &[Value];
}

#[async_trait]
pub trait Session: Send {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement>, MySQLError>;

    /// `max_rows` of -1 means no limit.
    async fn execute_query(
        &mut self,
        stmt: &dyn PreparedStatement,
        params: &[Value],
        max_rows: i64,
    ) -> Result<Box<dyn QueryResult>, MySQLError>;

    async fn execute_update(
        &mut self,
        stmt: &dyn PreparedStatement,
        params: &[Value],
    ) -> Result<u64, MySQLError>;

    fn close(&mut self);
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create_session(&self, info: &ConnectionInfo) -> Result<Box<dyn Session>, MySQLError>;
}
