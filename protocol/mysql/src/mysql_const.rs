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

use iota::iota;
use num_derive::FromPrimitive;

pub const PROTOCOL_VERSION: u8 = 10;
pub const MAX_PAYLOAD_LEN: usize = (1 << 24) - 1;

pub const OK_HEADER: u8 = 0x00;
pub const ERR_HEADER: u8 = 0xff;
pub const EOF_HEADER: u8 = 0xfe;
pub const NULL_VALUE: u8 = 0xfb;

pub const SERVER_STATUS_IN_TRANS: u16 = 0x0001;
pub const SERVER_STATUS_AUTOCOMMIT: u16 = 0x0002;
pub const SERVER_MORE_RESULTS_EXISTS: u16 = 0x0008;
pub const SERVER_STATUS_NO_GOOD_INDEX_USED: u16 = 0x0010;
pub const SERVER_STATUS_NO_INDEX_USED: u16 = 0x0020;
pub const SERVER_STATUS_CURSOR_EXISTS: u16 = 0x0040;
pub const SERVER_STATUS_LAST_ROW_SEND: u16 = 0x0080;

pub const AUTH_NATIVE_PASSWORD: &str = "mysql_native_password";

// Error codes and states sent back to clients, see
// https://dev.mysql.com/doc/mysql-errors/5.7/en/server-error-reference.html
pub const ER_ACCESS_DENIED_ERROR: u16 = 1045;
pub const ER_UNKNOWN_COM_ERROR: u16 = 1047;
pub const ER_BAD_DB_ERROR: u16 = 1049;
pub const ER_UNKNOWN_ERROR: u16 = 1105;
pub const ER_UNKNOWN_STMT_HANDLER: u16 = 1243;

pub const SQL_STATE_GENERAL: &str = "HY000";
pub const SQL_STATE_ACCESS_DENIED: &str = "28000";
pub const SQL_STATE_SYNTAX: &str = "42000";
pub const SQL_STATE_COMMUNICATION: &str = "08S01";

iota! {
    pub const CLIENT_LONG_PASSWORD: u32 = 1 << iota;
         ,CLIENT_FOUND_ROWS
         ,CLIENT_LONG_FLAG
         ,CLIENT_CONNECT_WITH_DB
         ,CLIENT_NO_SCHEMA
         ,CLIENT_COMPRESS
         ,CLIENT_ODBC
         ,CLIENT_LOCAL_FILES
         ,CLIENT_IGNORE_SPACE
         ,CLIENT_PROTOCOL_41
         ,CLIENT_INTERACTIVE
         ,CLIENT_SSL
         ,CLIENT_IGNORE_SIGPIPE
         ,CLIENT_TRANSACTIONS
         ,CLIENT_RESERVED
         ,CLIENT_SECURE_CONNECTION
         ,CLIENT_MULTI_STATEMENTS
         ,CLIENT_MULTI_RESULTS
         ,CLIENT_PS_MULTI_RESULTS
         ,CLIENT_PLUGIN_AUTH
         ,CLIENT_CONNECT_ATTRS
         ,CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA
         ,CLIENT_CAN_HANDLE_EXPIRED_PASSWORDS
         ,CLIENT_SESSION_TRACK
}

// No SSL, compression or multi statements.
pub const DEFAULT_CAPABILITY: u32 = CLIENT_LONG_PASSWORD
    | CLIENT_FOUND_ROWS
    | CLIENT_LONG_FLAG
    | CLIENT_CONNECT_WITH_DB
    | CLIENT_PROTOCOL_41
    | CLIENT_INTERACTIVE
    | CLIENT_TRANSACTIONS
    | CLIENT_SECURE_CONNECTION
    | CLIENT_PLUGIN_AUTH
    | CLIENT_CONNECT_ATTRS
    | CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum ColumnType {
    MYSQL_TYPE_DECIMAL,
    MYSQL_TYPE_TINY,
    MYSQL_TYPE_SHORT,
    MYSQL_TYPE_LONG,
    MYSQL_TYPE_FLOAT,
    MYSQL_TYPE_DOUBLE,
    MYSQL_TYPE_NULL,
    MYSQL_TYPE_TIMESTAMP,
    MYSQL_TYPE_LONGLONG,
    MYSQL_TYPE_INT24,
    MYSQL_TYPE_DATE,
    MYSQL_TYPE_TIME,
    MYSQL_TYPE_DATETIME,
    MYSQL_TYPE_YEAR,
    MYSQL_TYPE_NEWDATE,
    MYSQL_TYPE_VARCHAR,
    MYSQL_TYPE_BIT,
    MYSQL_TYPE_JSON = 0xf5,
    MYSQL_TYPE_NEWDECIMAL,
    MYSQL_TYPE_ENUM,
    MYSQL_TYPE_SET,
    MYSQL_TYPE_TINY_BLOB,
    MYSQL_TYPE_MEDIUM_BLOB,
    MYSQL_TYPE_LONG_BLOB,
    MYSQL_TYPE_BLOB,
    MYSQL_TYPE_VAR_STRING,
    MYSQL_TYPE_STRING,
    MYSQL_TYPE_GEOMETRY,
}

impl AsRef<str> for ColumnType {
    #[inline]
    fn as_ref(&self) -> &str {
        match self {
            ColumnType::MYSQL_TYPE_DECIMAL => "decimal",
            ColumnType::MYSQL_TYPE_TINY => "tiny",
            ColumnType::MYSQL_TYPE_SHORT => "short",
            ColumnType::MYSQL_TYPE_LONG => "long",
            ColumnType::MYSQL_TYPE_FLOAT => "float",
            ColumnType::MYSQL_TYPE_DOUBLE => "double",
            ColumnType::MYSQL_TYPE_NULL => "null",
            ColumnType::MYSQL_TYPE_TIMESTAMP => "timestamp",
            ColumnType::MYSQL_TYPE_LONGLONG => "longlong",
            ColumnType::MYSQL_TYPE_INT24 => "int24",
            ColumnType::MYSQL_TYPE_DATE => "date",
            ColumnType::MYSQL_TYPE_TIME => "time",
            ColumnType::MYSQL_TYPE_DATETIME => "datetime",
            ColumnType::MYSQL_TYPE_YEAR => "year",
            ColumnType::MYSQL_TYPE_NEWDATE => "newdate",
            ColumnType::MYSQL_TYPE_VARCHAR => "varchar",
            ColumnType::MYSQL_TYPE_BIT => "bit",
            ColumnType::MYSQL_TYPE_JSON => "json",
            ColumnType::MYSQL_TYPE_NEWDECIMAL => "new_decimal",
            ColumnType::MYSQL_TYPE_ENUM => "enum",
            ColumnType::MYSQL_TYPE_SET => "set",
            ColumnType::MYSQL_TYPE_TINY_BLOB => "tiny_blob",
            ColumnType::MYSQL_TYPE_MEDIUM_BLOB => "medium_blob",
            ColumnType::MYSQL_TYPE_LONG_BLOB => "long_blob",
            ColumnType::MYSQL_TYPE_BLOB => "blob",
            ColumnType::MYSQL_TYPE_VAR_STRING => "var",
            ColumnType::MYSQL_TYPE_STRING => "string",
            ColumnType::MYSQL_TYPE_GEOMETRY => "geometry",
        }
    }
}

// Column flag, see https://dev.mysql.com/doc/dev/mysql-server/latest/group__group__cs__column__definition__flags.html
// Column flag is 2 bytes
pub const NOT_NULL_FLAG: u16 = 1;
pub const BLOB_FLAG: u16 = 16;
pub const UNSIGNED_FLAG: u16 = 32;
pub const BINARY_FLAG: u16 = 128;
pub const NUM_FLAG: u16 = 32768;

#[derive(Debug, Clone, Copy, Eq, PartialEq, FromPrimitive)]
#[repr(u8)]
pub enum Com {
    Sleep = 0,
    Quit,
    InitDb,
    Query,
    FieldList,
    CreateDb,
    DropDb,
    Refresh,
    Shutdown,
    Statistics,
    ProcessInfo,
    Connect,
    ProcessKill,
    Debug,
    Ping,
    Time,
    DelayedInsert,
    ChangeUser,
    BinlogDump,
    TableDump,
    ConnectOut,
    RegisterSlave,
    StmtPrepare,
    StmtExecute,
    StmtSendLongData,
    StmtClose,
    StmtReset,
    SetOption,
    StmtFetch,
    Daemon,
    BinlogDumpGtid,
    ResetConnection,
}
