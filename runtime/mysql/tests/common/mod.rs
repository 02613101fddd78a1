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

use std::sync::Arc;

use async_trait::async_trait;
use mysql_protocol::{server::err::MySQLError, value::Value};
use parking_lot::Mutex;
use runtime_mysql::session::*;

/// What the engine saw, inspected by the tests.
#[derive(Debug, Default)]
pub struct Journal {
    pub sessions: Vec<ConnectionInfo>,
    pub closed_sessions: Vec<String>,
    pub closed_stmts: Vec<String>,
}

#[derive(Default, Clone)]
pub struct TestFactory {
    pub journal: Arc<Mutex<Journal>>,
}

#[async_trait]
impl SessionFactory for TestFactory {
    async fn create_session(&self, info: &ConnectionInfo) -> Result<Box<dyn Session>, MySQLError> {
        if info.user == "denied" {
            return Err(MySQLError::new(1045, "28000", "Access denied for user 'denied'@'localhost'"));
        }
        if info.database == "nope" {
            return Err(MySQLError::new(1049, "42000", "Unknown database 'nope'"));
        }

        self.journal.lock().sessions.push(info.clone());
        Ok(Box::new(TestSession { database: info.database.clone(), journal: self.journal.clone() }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    SelectOne,
    SelectParams,
    Echo,
    SelectDatabase,
    Users,
    Broken,
    Insert,
}

struct TestStatement {
    sql: String,
    kind: Kind,
    params: usize,
    journal: Arc<Mutex<Journal>>,
}

impl PreparedStatement for TestStatement {
    fn sql(&self) -> &str {
        &self.sql
    }

    fn is_query(&self) -> bool {
        self.kind != Kind::Insert
    }

    fn columns(&self) -> Vec<ColumnMeta> {
        match self.kind {
            Kind::SelectOne => vec![ColumnMeta::new("1", SqlType::BigInt)],
            Kind::SelectParams => (0..self.params).map(|_| ColumnMeta::new("?", SqlType::BigInt)).collect(),
            Kind::Echo => (0..self.params).map(|_| ColumnMeta::new("echo", SqlType::Varchar)).collect(),
            Kind::SelectDatabase => vec![ColumnMeta::new("DATABASE()", SqlType::Varchar)],
            Kind::Users | Kind::Broken => {
                vec![ColumnMeta::new("ID", SqlType::Int), ColumnMeta::new("NAME", SqlType::Varchar)]
            }
            Kind::Insert => vec![],
        }
    }

    fn parameter_count(&self) -> usize {
        self.params
    }

    fn close(&self) {
        self.journal.lock().closed_stmts.push(self.sql.clone());
    }
}

struct TestResult {
    columns: Vec<ColumnMeta>,
    rows: Vec<Vec<Value>>,
    pos: usize,
    fail_at: Option<usize>,
}

impl QueryResult for TestResult {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, idx: usize) -> &str {
        &self.columns[idx].name
    }

    fn column_type(&self, idx: usize) -> SqlType {
        self.columns[idx].sql_type
    }

    fn row_count(&self) -> Option<usize> {
        None
    }

    fn next(&mut self) -> Result<bool, MySQLError> {
        if self.fail_at == Some(self.pos) {
            return Err(MySQLError::new(1317, "70100", "Query execution was interrupted"));
        }
        self.pos += 1;
        Ok(self.pos <= self.rows.len())
    }

    fn current_row(&self) -> &[Value] {
        &self.rows[self.pos - 1]
    }
}

struct TestSession {
    database: String,
    journal: Arc<Mutex<Journal>>,
}

#[async_trait]
impl Session for TestSession {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement>, MySQLError> {
        let lower = sql.trim().to_lowercase();
        let params = sql.matches('?').count();

        let kind = if lower.contains("missing") {
            return Err(MySQLError::new(
                1146,
                "42S02",
                format!("Table '{}.missing' doesn't exist", self.database),
            ));
        } else if lower == "select 1" {
            Kind::SelectOne
        } else if lower == "select database()" {
            Kind::SelectDatabase
        } else if lower.starts_with("select ?") {
            Kind::SelectParams
        } else if lower.starts_with("select echo(") {
            Kind::Echo
        } else if lower == "select * from users" {
            Kind::Users
        } else if lower == "select * from broken" {
            Kind::Broken
        } else if lower.starts_with("insert") {
            Kind::Insert
        } else {
            return Err(MySQLError::new(1064, "42000", format!("You have an error in your SQL syntax near '{}'", sql)));
        };

        Ok(Box::new(TestStatement { sql: sql.to_string(), kind, params, journal: self.journal.clone() }))
    }

    async fn execute_query(
        &mut self,
        stmt: &dyn PreparedStatement,
        params: &[Value],
        max_rows: i64,
    ) -> Result<Box<dyn QueryResult>, MySQLError> {
        assert_eq!(max_rows, -1);

        let columns = stmt.columns();
        let sql = stmt.sql().trim().to_lowercase();
        let users = vec![vec![Value::Int(1), Value::Text("alice".to_string())], vec![Value::Int(2), Value::Null]];

        let (rows, fail_at) = if sql == "select 1" {
            (vec![vec![Value::Int(1)]], None)
        } else if sql == "select database()" {
            (vec![vec![Value::Text(self.database.clone())]], None)
        } else if sql.starts_with("select ?") || sql.starts_with("select echo(") {
            (vec![params.to_vec()], None)
        } else if sql == "select * from broken" {
            (users, Some(1))
        } else {
            (users, None)
        };

        Ok(Box::new(TestResult { columns, rows, pos: 0, fail_at }))
    }

    async fn execute_update(
        &mut self,
        stmt: &dyn PreparedStatement,
        _params: &[Value],
    ) -> Result<u64, MySQLError> {
        Ok(stmt.sql().matches("), (").count() as u64 + 1)
    }

    fn close(&mut self) {
        self.journal.lock().closed_sessions.push(self.database.clone());
    }
}
