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

use mysql_protocol::{
    charset::BINARY_COLLATION_ID,
    column::ColumnInfo,
    mysql_const::{ColumnType, BINARY_FLAG},
};

use crate::session::SqlType;

pub fn column_type(sql_type: SqlType) -> ColumnType {
    match sql_type {
        SqlType::Null => ColumnType::MYSQL_TYPE_NULL,
        SqlType::Boolean | SqlType::TinyInt => ColumnType::MYSQL_TYPE_TINY,
        SqlType::SmallInt => ColumnType::MYSQL_TYPE_SHORT,
        SqlType::Int => ColumnType::MYSQL_TYPE_LONG,
        SqlType::BigInt => ColumnType::MYSQL_TYPE_LONGLONG,
        SqlType::Decimal => ColumnType::MYSQL_TYPE_NEWDECIMAL,
        SqlType::Float => ColumnType::MYSQL_TYPE_FLOAT,
        SqlType::Double => ColumnType::MYSQL_TYPE_DOUBLE,
        SqlType::Date => ColumnType::MYSQL_TYPE_DATE,
        SqlType::Time => ColumnType::MYSQL_TYPE_TIME,
        SqlType::Timestamp => ColumnType::MYSQL_TYPE_DATETIME,
        SqlType::Char => ColumnType::MYSQL_TYPE_STRING,
        SqlType::Varchar | SqlType::Unknown => ColumnType::MYSQL_TYPE_VAR_STRING,
        SqlType::Clob | SqlType::Blob => ColumnType::MYSQL_TYPE_BLOB,
        SqlType::Bytes => ColumnType::MYSQL_TYPE_VAR_STRING,
        SqlType::Json => ColumnType::MYSQL_TYPE_JSON,
    }
}

#[inline]
fn is_binary(sql_type: SqlType) -> bool {
    !matches!(
        sql_type,
        SqlType::Char | SqlType::Varchar | SqlType::Clob | SqlType::Json | SqlType::Unknown
    )
}

/// Field packet of a result column. Names go out lower cased, non text
/// columns carry the binary collation.
pub fn make_column_info(name: &str, sql_type: SqlType, collation_id: u8) -> ColumnInfo {
    let name = name.to_lowercase();
    if is_binary(sql_type) {
        ColumnInfo {
            column_flag: BINARY_FLAG,
            ..ColumnInfo::new(&name, column_type(sql_type), BINARY_COLLATION_ID as u16)
        }
    } else {
        ColumnInfo::new(&name, column_type(sql_type), collation_id as u16)
    }
}
