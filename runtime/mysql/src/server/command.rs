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

use std::{sync::Arc, time::Instant};

use bytes::BytesMut;
use mysql_protocol::{
    column::ColumnInfo,
    mysql_const::{Com, ER_UNKNOWN_COM_ERROR, SQL_STATE_COMMUNICATION},
    server::{
        auth::AuthPacket,
        command::{Command, ExecutePacket},
        err::MySQLError,
        packet::{EofPacket, OkPacket, PreparedOkPacket, ServerPacket},
        stream::PacketStream,
    },
};
use regex::Regex;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error};
use xsql_error::error::{Error, ErrorKind};

use super::{
    auth,
    metrics::MySqlServerMetricsCollector,
    resultset::{execute_statement, ResultEncoding, RowFormat},
    stmt_cache::StmtCache,
    util::make_column_info,
};
use crate::session::{Session, SessionFactory};

lazy_static! {
    static ref USE_DB: Regex = Regex::new(r"(?i)^\s*use\s+`?([^`;\s]+)`?\s*;?\s*$").unwrap();
}

/// What the connection does after a command was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Handles the frames of the command phase.
pub struct CommandHandler {
    factory: Arc<dyn SessionFactory>,
    session: Box<dyn Session>,
    auth: AuthPacket,
    database: String,
    stmt_cache: StmtCache,
    next_stmt_id: u32,
    encoding: ResultEncoding,
    metrics: MySqlServerMetricsCollector,
}

impl CommandHandler {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        session: Box<dyn Session>,
        auth: AuthPacket,
        database: &str,
        encoding: ResultEncoding,
        metrics: MySqlServerMetricsCollector,
    ) -> Self {
        CommandHandler {
            factory,
            session,
            auth,
            database: database.to_string(),
            stmt_cache: StmtCache::new(),
            next_stmt_id: 1,
            encoding,
            metrics,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn stmt_cache(&self) -> &StmtCache {
        &self.stmt_cache
    }

    /// Handles one command frame. Recoverable errors are answered with an
    /// error packet; only fatal errors are returned.
    pub async fn handle<S>(&mut self, stream: &mut PacketStream<S>, mut payload: BytesMut) -> Result<Flow, Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let cmd = Command::decode(&mut payload)?;
        let name = cmd.name();
        let now = Instant::now();

        debug!("handle command {}", name);

        let res = match self.dispatch(stream, cmd).await {
            Err(err) if !err.is_fatal() => {
                error!("command {} error: {}", name, err);
                stream.write_err(&err.to_mysql_error()).await?;
                Ok(Flow::Continue)
            }
            res => res,
        };

        self.metrics.set_command_processed_total(name);
        self.metrics.set_command_processed_duration(name, now);

        res
    }

    async fn dispatch<S>(&mut self, stream: &mut PacketStream<S>, cmd: Command) -> Result<Flow, Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match cmd {
            Command::Quit => return Ok(Flow::Quit),
            Command::Ping => stream.write_ok(OkPacket::default()).await?,
            Command::InitDb(db) => self.init_db(stream, &db).await?,
            Command::Query(sql) => self.query(stream, &sql).await?,
            Command::Prepare(sql) => self.prepare(stream, &sql).await?,
            Command::Execute(packet) => self.execute(stream, packet).await?,
            Command::SendLongData { statement_id, param_id, data } => {
                self.send_long_data(statement_id, param_id, &data)
            }
            Command::Close(id) => self.close_stmt(id),
            Command::Reset(id) => {
                self.stmt_cache.get_mut(id, "mysqld_stmt_reset")?.reset();
                stream.write_ok(OkPacket::default()).await?
            }
            Command::FieldList(_) => return Err(unsupported(Com::FieldList as u8)),
            Command::Unsupported(cmd) => return Err(unsupported(cmd)),
        }

        Ok(Flow::Continue)
    }

    async fn prepare<S>(&mut self, stream: &mut PacketStream<S>, sql: &str) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let stmt = self.session.prepare(sql).map_err(|e| Error::new(ErrorKind::Compile(e)))?;
        let columns = stmt.columns();
        let params = stmt.parameter_count();

        let (column_count, param_count) = match (u16::try_from(columns.len()), u16::try_from(params)) {
            (Ok(c), Ok(p)) => (c, p),
            _ => {
                stmt.close();
                return Err(Error::internal(format!(
                    "prepared statement has {} columns and {} params, at most {} each",
                    columns.len(),
                    params,
                    u16::MAX
                )));
            }
        };

        let statement_id = self.next_stmt_id;
        self.next_stmt_id = self.next_stmt_id.wrapping_add(1);
        self.stmt_cache.put(statement_id, stmt)?;

        debug!("prepared statement {} columns {} params {}", statement_id, column_count, param_count);

        stream
            .feed(ServerPacket::PreparedOk(PreparedOkPacket {
                statement_id,
                columns: column_count,
                params: param_count,
                warnings: 0,
            }))
            .await?;

        if params > 0 {
            for _ in 0..params {
                stream.feed(ServerPacket::Field(ColumnInfo::param(), None)).await?;
            }
            stream.feed(ServerPacket::Eof(EofPacket::default())).await?;
        }

        if !columns.is_empty() {
            for column in &columns {
                let info = make_column_info(&column.name, column.sql_type, self.encoding.collation_id);
                stream.feed(ServerPacket::Field(info, self.encoding.charset)).await?;
            }
            stream.feed(ServerPacket::Eof(EofPacket::default())).await?;
        }

        stream.flush().await?;
        Ok(())
    }

    async fn execute<S>(&mut self, stream: &mut PacketStream<S>, packet: ExecutePacket) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let entry = self.stmt_cache.get_mut(packet.statement_id, "mysqld_stmt_execute")?;
        let long_data = std::mem::take(&mut entry.long_data);
        let (params, types) = packet.decode_params(entry.stmt.parameter_count(), &entry.param_types, &long_data)?;
        entry.param_types = types;

        execute_statement(
            stream,
            self.session.as_mut(),
            entry.stmt.as_ref(),
            &params,
            RowFormat::Binary,
            self.encoding,
        )
        .await
    }

    async fn query<S>(&mut self, stream: &mut PacketStream<S>, sql: &str) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if let Some(db) = use_database(sql) {
            return self.init_db(stream, &db).await;
        }

        let stmt = self.session.prepare(sql).map_err(|e| Error::new(ErrorKind::Compile(e)))?;
        let res =
            execute_statement(stream, self.session.as_mut(), stmt.as_ref(), &[], RowFormat::Text, self.encoding)
                .await;
        stmt.close();
        res
    }

    /// Opens a session on `db` with the credentials of the auth packet and
    /// replaces the current one. The current session survives a failure.
    async fn init_db<S>(&mut self, stream: &mut PacketStream<S>, db: &str) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let session = auth::create_session(self.factory.as_ref(), &self.auth, db)
            .await
            .map_err(|e| Error::new(ErrorKind::Execution(e)))?;

        let mut old = std::mem::replace(&mut self.session, session);
        self.close_stmts();
        old.close();
        self.database = db.to_string();

        debug!("switch database to {}", db);
        stream.write_ok(OkPacket::default()).await?;
        Ok(())
    }

    // COM_STMT_SEND_LONG_DATA has no response, chunks for unknown
    // statements are dropped.
    fn send_long_data(&mut self, statement_id: u32, param_id: u16, data: &[u8]) {
        match self.stmt_cache.get_mut(statement_id, "mysqld_stmt_send_long_data") {
            Ok(entry) if (param_id as usize) < entry.stmt.parameter_count() => {
                entry.append_long_data(param_id, data)
            }
            Ok(_) => debug!("drop long data for statement {} param {}", statement_id, param_id),
            Err(err) => debug!("drop long data: {}", err),
        }
    }

    fn close_stmt(&mut self, id: u32) {
        if let Some(entry) = self.stmt_cache.remove(id) {
            entry.stmt.close();
        }
    }

    fn close_stmts(&mut self) {
        for entry in self.stmt_cache.drain() {
            entry.stmt.close();
        }
    }

    /// Closes every cached statement and the session.
    pub fn close(&mut self) {
        self.close_stmts();
        self.session.close();
    }
}

fn use_database(sql: &str) -> Option<String> {
    USE_DB.captures(sql).and_then(|caps| caps.get(1)).map(|m| m.as_str().to_string())
}

fn unsupported(cmd: u8) -> Error {
    Error::new(ErrorKind::Execution(MySQLError::new(
        ER_UNKNOWN_COM_ERROR,
        SQL_STATE_COMMUNICATION,
        format!("command {} not support", cmd),
    )))
}
