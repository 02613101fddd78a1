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

use std::io::Error as IoError;

use mysql_protocol::{
    err::ProtocolError,
    mysql_const::{ER_UNKNOWN_ERROR, ER_UNKNOWN_STMT_HANDLER, SQL_STATE_GENERAL},
    server::err::MySQLError,
};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ErrorKind {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("stdio error: {0:?}")]
    Io(#[from] IoError),

    #[error("auth failed: {0}")]
    Auth(MySQLError),

    #[error("unknown prepared statement handler ({id}) given to {method}")]
    UnknownStatement { id: u32, method: String },

    #[error("compile error: {0}")]
    Compile(MySQLError),

    #[error("execution error: {0}")]
    Execution(MySQLError),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, ThisError)]
#[error("{kind}")]
pub struct Error {
    kind: ErrorKind,
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::new(ErrorKind::Protocol(err))
    }
}

impl From<IoError> for Error {
    fn from(err: IoError) -> Self {
        Error::new(ErrorKind::Io(err))
    }
}

impl Error {
    pub fn new(kind: ErrorKind) -> Error {
        Error { kind }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn unknown_statement(id: u32, method: &str) -> Error {
        Error::new(ErrorKind::UnknownStatement { id, method: method.to_string() })
    }

    pub fn internal<M: Into<String>>(msg: M) -> Error {
        Error::new(ErrorKind::Internal(msg.into()))
    }

    /// Fatal errors end the connection: the frame stream is out of sync,
    /// the transport failed, or authentication was rejected.
    pub fn is_fatal(&self) -> bool {
        match &self.kind {
            ErrorKind::Protocol(e) => e.is_fatal(),
            ErrorKind::Io(_) | ErrorKind::Auth(_) => true,
            _ => false,
        }
    }

    /// The error as reported to the client in an error packet.
    pub fn to_mysql_error(&self) -> MySQLError {
        match &self.kind {
            ErrorKind::Auth(e) | ErrorKind::Compile(e) | ErrorKind::Execution(e) => e.clone(),
            ErrorKind::UnknownStatement { id, method } => MySQLError::new(
                ER_UNKNOWN_STMT_HANDLER,
                SQL_STATE_GENERAL,
                format!("Unknown prepared statement handler ({}) given to {}", id, method),
            ),
            ErrorKind::Internal(msg) => MySQLError::new(ER_UNKNOWN_ERROR, SQL_STATE_GENERAL, msg.clone()),
            ErrorKind::Protocol(e) => MySQLError::new(ER_UNKNOWN_ERROR, SQL_STATE_GENERAL, e.to_string()),
            ErrorKind::Io(e) => MySQLError::new(ER_UNKNOWN_ERROR, SQL_STATE_GENERAL, e.to_string()),
        }
    }
}
