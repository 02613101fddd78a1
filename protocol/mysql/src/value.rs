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

use std::fmt;

use bytes::{Buf, BufMut};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::{
    charset::encode_string,
    err::ProtocolError,
    mysql_const::ColumnType,
    util::{malformed, BufExt, BufMutExt},
};

/// A nullable cell of a result row or a bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(Duration),
}

/// Wire type of a bound parameter: the column type plus the unsigned bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamType {
    pub column_type: ColumnType,
    pub unsigned: bool,
}

impl ParamType {
    pub fn new(column_type: ColumnType, unsigned: bool) -> ParamType {
        ParamType { column_type, unsigned }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Decimal(v) | Value::Text(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "{}", String::from_utf8_lossy(v)),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => {
                if dt.nanosecond() == 0 {
                    write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
                } else {
                    write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.6f"))
                }
            }
            Value::Time(d) => {
                let (negative, days, hours, minutes, seconds, micros) = split_duration(d);
                let sign = if negative { "-" } else { "" };
                let hours = days as u64 * 24 + hours as u64;
                if micros == 0 {
                    write!(f, "{}{:02}:{:02}:{:02}", sign, hours, minutes, seconds)
                } else {
                    write!(f, "{}{:02}:{:02}:{:02}.{:06}", sign, hours, minutes, seconds, micros)
                }
            }
        }
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text protocol form of the value, `None` for NULL.
    pub fn encode_text(&self, charset: Option<&str>) -> Option<Vec<u8>> {
        match self {
            Value::Null => None,
            Value::Bytes(v) => Some(v.clone()),
            Value::Decimal(v) | Value::Text(v) => Some(encode_string(v, charset)),
            other => Some(other.to_string().into_bytes()),
        }
    }

    /// Wire type used when the value is sent as a statement parameter.
    pub fn param_type(&self) -> ParamType {
        match self {
            Value::Null => ParamType::new(ColumnType::MYSQL_TYPE_NULL, false),
            Value::Int(_) => ParamType::new(ColumnType::MYSQL_TYPE_LONGLONG, false),
            Value::UInt(_) => ParamType::new(ColumnType::MYSQL_TYPE_LONGLONG, true),
            Value::Float(_) => ParamType::new(ColumnType::MYSQL_TYPE_FLOAT, false),
            Value::Double(_) => ParamType::new(ColumnType::MYSQL_TYPE_DOUBLE, false),
            Value::Decimal(_) => ParamType::new(ColumnType::MYSQL_TYPE_NEWDECIMAL, false),
            Value::Text(_) => ParamType::new(ColumnType::MYSQL_TYPE_VAR_STRING, false),
            Value::Bytes(_) => ParamType::new(ColumnType::MYSQL_TYPE_BLOB, false),
            Value::Date(_) => ParamType::new(ColumnType::MYSQL_TYPE_DATE, false),
            Value::DateTime(_) => ParamType::new(ColumnType::MYSQL_TYPE_DATETIME, false),
            Value::Time(_) => ParamType::new(ColumnType::MYSQL_TYPE_TIME, false),
        }
    }

    /// Converts the value into the representation used by the binary
    /// protocol for `column_type`. Integers are narrowed to the column
    /// width, strings go through the connection charset.
    pub fn coerce(self, column_type: ColumnType, charset: Option<&str>) -> Result<Value, ProtocolError> {
        if self.is_null() {
            return Ok(Value::Null);
        }

        match column_type {
            ColumnType::MYSQL_TYPE_TINY => self.to_i64(column_type).map(|v| Value::Int(v as i8 as i64)),
            ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => {
                self.to_i64(column_type).map(|v| Value::Int(v as i16 as i64))
            }
            ColumnType::MYSQL_TYPE_LONG | ColumnType::MYSQL_TYPE_INT24 => {
                self.to_i64(column_type).map(|v| Value::Int(v as i32 as i64))
            }
            ColumnType::MYSQL_TYPE_LONGLONG => self.to_i64(column_type).map(Value::Int),
            ColumnType::MYSQL_TYPE_FLOAT => self.to_f64(column_type).map(|v| Value::Float(v as f32)),
            ColumnType::MYSQL_TYPE_DOUBLE => self.to_f64(column_type).map(Value::Double),
            ColumnType::MYSQL_TYPE_DATE => self.to_datetime(column_type).map(|v| Value::Date(v.date())),
            ColumnType::MYSQL_TYPE_DATETIME | ColumnType::MYSQL_TYPE_TIMESTAMP => {
                self.to_datetime(column_type).map(Value::DateTime)
            }
            ColumnType::MYSQL_TYPE_TIME => match self {
                Value::Time(d) => Ok(Value::Time(d)),
                other => Err(conversion(&other, column_type)),
            },
            ColumnType::MYSQL_TYPE_NULL => Ok(Value::Null),
            ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => match self {
                Value::Bytes(v) => Ok(Value::Decimal(String::from_utf8_lossy(&v).into_owned())),
                other => Ok(Value::Decimal(other.to_string())),
            },
            _ => {
                let data = self.encode_text(charset).unwrap_or_default();
                Ok(bytes_value(data))
            }
        }
    }

    /// Writes a coerced, non NULL value in the binary protocol form of `column_type`.
    /// See https://dev.mysql.com/doc/internals/en/binary-protocol-value.html
    pub fn encode_binary<B: BufMut>(&self, column_type: ColumnType, buf: &mut B) {
        match (column_type, self) {
            (ColumnType::MYSQL_TYPE_TINY, Value::Int(v)) => buf.put_i8(*v as i8),
            (ColumnType::MYSQL_TYPE_TINY, Value::UInt(v)) => buf.put_u8(*v as u8),
            (ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR, Value::Int(v)) => {
                buf.put_i16_le(*v as i16)
            }
            (ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR, Value::UInt(v)) => {
                buf.put_u16_le(*v as u16)
            }
            (ColumnType::MYSQL_TYPE_LONG | ColumnType::MYSQL_TYPE_INT24, Value::Int(v)) => {
                buf.put_i32_le(*v as i32)
            }
            (ColumnType::MYSQL_TYPE_LONG | ColumnType::MYSQL_TYPE_INT24, Value::UInt(v)) => {
                buf.put_u32_le(*v as u32)
            }
            (ColumnType::MYSQL_TYPE_LONGLONG, Value::Int(v)) => buf.put_i64_le(*v),
            (ColumnType::MYSQL_TYPE_LONGLONG, Value::UInt(v)) => buf.put_u64_le(*v),
            (ColumnType::MYSQL_TYPE_FLOAT, Value::Float(v)) => buf.put_f32_le(*v),
            (ColumnType::MYSQL_TYPE_DOUBLE, Value::Double(v)) => buf.put_f64_le(*v),
            (_, Value::Date(d)) => {
                buf.put_u8(4);
                put_date(d, buf);
            }
            (_, Value::DateTime(dt)) => {
                let micros = dt.nanosecond() / 1_000;
                if micros == 0 {
                    buf.put_u8(7);
                } else {
                    buf.put_u8(11);
                }
                put_date(&dt.date(), buf);
                buf.put_u8(dt.hour() as u8);
                buf.put_u8(dt.minute() as u8);
                buf.put_u8(dt.second() as u8);
                if micros != 0 {
                    buf.put_u32_le(micros);
                }
            }
            (_, Value::Time(d)) => {
                let (negative, days, hours, minutes, seconds, micros) = split_duration(d);
                if *d == Duration::zero() {
                    buf.put_u8(0);
                    return;
                }
                buf.put_u8(if micros == 0 { 8 } else { 12 });
                buf.put_u8(negative as u8);
                buf.put_u32_le(days);
                buf.put_u8(hours);
                buf.put_u8(minutes);
                buf.put_u8(seconds);
                if micros != 0 {
                    buf.put_u32_le(micros);
                }
            }
            (_, Value::Null) => {}
            (_, Value::Bytes(v)) => buf.put_lenc_bytes(v),
            (_, other) => buf.put_lenc_bytes(other.to_string().as_bytes()),
        }
    }

    /// Reads one binary protocol value, used for execute parameters and
    /// binary result rows.
    /// Value of a parameter streamed with COM_STMT_SEND_LONG_DATA. The
    /// chunks carry the raw bytes without a length prefix.
    pub fn from_long_data(data: Vec<u8>, param: ParamType) -> Result<Value, ProtocolError> {
        match param.column_type {
            ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                Ok(Value::Decimal(String::from_utf8_lossy(&data).into_owned()))
            }
            ColumnType::MYSQL_TYPE_NULL
            | ColumnType::MYSQL_TYPE_TINY
            | ColumnType::MYSQL_TYPE_SHORT
            | ColumnType::MYSQL_TYPE_YEAR
            | ColumnType::MYSQL_TYPE_LONG
            | ColumnType::MYSQL_TYPE_INT24
            | ColumnType::MYSQL_TYPE_LONGLONG
            | ColumnType::MYSQL_TYPE_FLOAT
            | ColumnType::MYSQL_TYPE_DOUBLE
            | ColumnType::MYSQL_TYPE_DATE
            | ColumnType::MYSQL_TYPE_NEWDATE
            | ColumnType::MYSQL_TYPE_DATETIME
            | ColumnType::MYSQL_TYPE_TIMESTAMP
            | ColumnType::MYSQL_TYPE_TIME => Value::decode_binary(&mut &data[..], param),
            _ => Ok(bytes_value(data)),
        }
    }

    pub fn decode_binary<B: Buf>(buf: &mut B, param: ParamType) -> Result<Value, ProtocolError> {
        let method = "decode_binary_value";
        let unsigned = param.unsigned;

        let value = match param.column_type {
            ColumnType::MYSQL_TYPE_NULL => Value::Null,
            ColumnType::MYSQL_TYPE_TINY => {
                let v = buf.checked_u8(method)?;
                if unsigned { Value::UInt(v as u64) } else { Value::Int(v as i8 as i64) }
            }
            ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => {
                let v = buf.checked_u16_le(method)?;
                if unsigned { Value::UInt(v as u64) } else { Value::Int(v as i16 as i64) }
            }
            ColumnType::MYSQL_TYPE_LONG | ColumnType::MYSQL_TYPE_INT24 => {
                let v = buf.checked_u32_le(method)?;
                if unsigned { Value::UInt(v as u64) } else { Value::Int(v as i32 as i64) }
            }
            ColumnType::MYSQL_TYPE_LONGLONG => {
                let v = buf.checked_uint_le(8, method)?;
                if unsigned { Value::UInt(v) } else { Value::Int(v as i64) }
            }
            ColumnType::MYSQL_TYPE_FLOAT => {
                Value::Float(f32::from_bits(buf.checked_u32_le(method)?))
            }
            ColumnType::MYSQL_TYPE_DOUBLE => {
                Value::Double(f64::from_bits(buf.checked_uint_le(8, method)?))
            }
            ColumnType::MYSQL_TYPE_DATE
            | ColumnType::MYSQL_TYPE_NEWDATE
            | ColumnType::MYSQL_TYPE_DATETIME
            | ColumnType::MYSQL_TYPE_TIMESTAMP => {
                let length = buf.checked_u8(method)? as usize;
                let data = buf.checked_bytes(length, method)?;
                decode_datetime(&data, param.column_type)?
            }
            ColumnType::MYSQL_TYPE_TIME => {
                let length = buf.checked_u8(method)? as usize;
                let data = buf.checked_bytes(length, method)?;
                decode_time(&data)?
            }
            ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
                let data = lenc_required(buf, method)?;
                Value::Decimal(String::from_utf8_lossy(&data).into_owned())
            }
            _ => bytes_value(lenc_required(buf, method)?),
        };

        Ok(value)
    }

    fn to_i64(&self, column_type: ColumnType) -> Result<i64, ProtocolError> {
        match self {
            Value::Int(v) => Ok(*v),
            Value::UInt(v) => Ok(*v as i64),
            Value::Float(v) => Ok(*v as i64),
            Value::Double(v) => Ok(*v as i64),
            Value::Decimal(v) | Value::Text(v) => {
                v.trim().parse::<i64>().map_err(|_| conversion(self, column_type))
            }
            Value::Bytes(v) => std::str::from_utf8(v)
                .ok()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .ok_or_else(|| conversion(self, column_type)),
            _ => Err(conversion(self, column_type)),
        }
    }

    fn to_f64(&self, column_type: ColumnType) -> Result<f64, ProtocolError> {
        match self {
            Value::Int(v) => Ok(*v as f64),
            Value::UInt(v) => Ok(*v as f64),
            Value::Float(v) => Ok(*v as f64),
            Value::Double(v) => Ok(*v),
            Value::Decimal(v) | Value::Text(v) => {
                v.trim().parse::<f64>().map_err(|_| conversion(self, column_type))
            }
            _ => Err(conversion(self, column_type)),
        }
    }

    fn to_datetime(&self, column_type: ColumnType) -> Result<NaiveDateTime, ProtocolError> {
        match self {
            Value::Date(d) => midnight(d).ok_or_else(|| conversion(self, column_type)),
            Value::DateTime(dt) => Ok(*dt),
            Value::Text(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().and_then(|d| midnight(&d)))
                .ok_or_else(|| conversion(self, column_type)),
            _ => Err(conversion(self, column_type)),
        }
    }
}

fn conversion(value: &Value, column_type: ColumnType) -> ProtocolError {
    ProtocolError::Conversion { value: value.to_string(), column_type: column_type.as_ref().to_string() }
}

fn midnight(d: &NaiveDate) -> Option<NaiveDateTime> {
    d.and_hms_opt(0, 0, 0)
}

fn bytes_value(data: Vec<u8>) -> Value {
    match String::from_utf8(data) {
        Ok(s) => Value::Text(s),
        Err(e) => Value::Bytes(e.into_bytes()),
    }
}

fn lenc_required<B: Buf>(buf: &mut B, method: &str) -> Result<Vec<u8>, ProtocolError> {
    buf.get_lenc_bytes(method)?.ok_or_else(|| malformed(method, [0xfb]))
}

fn put_date<B: BufMut>(d: &NaiveDate, buf: &mut B) {
    buf.put_u16_le(d.year() as u16);
    buf.put_u8(d.month() as u8);
    buf.put_u8(d.day() as u8);
}

// (negative, days, hours, minutes, seconds, microseconds)
fn split_duration(d: &Duration) -> (bool, u32, u8, u8, u8, u32) {
    let negative = *d < Duration::zero();
    let total_micros = d.num_microseconds().unwrap_or(i64::MAX).unsigned_abs();
    let micros = (total_micros % 1_000_000) as u32;
    let total_seconds = total_micros / 1_000_000;
    let seconds = (total_seconds % 60) as u8;
    let minutes = (total_seconds / 60 % 60) as u8;
    let hours = (total_seconds / 3600 % 24) as u8;
    let days = (total_seconds / 86400) as u32;
    (negative, days, hours, minutes, seconds, micros)
}

fn decode_datetime(data: &[u8], column_type: ColumnType) -> Result<Value, ProtocolError> {
    let method = "decode_datetime";
    let mut buf = data;

    // Zero date has no representation.
    if buf.is_empty() {
        return Ok(Value::Null);
    }

    let year = buf.checked_u16_le(method)? as i32;
    let month = buf.checked_u8(method)? as u32;
    let day = buf.checked_u8(method)? as u32;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| malformed(method, data))?;

    if column_type == ColumnType::MYSQL_TYPE_DATE || column_type == ColumnType::MYSQL_TYPE_NEWDATE {
        return Ok(Value::Date(date));
    }

    let (hour, minute, second) = if buf.has_remaining() {
        (buf.checked_u8(method)? as u32, buf.checked_u8(method)? as u32, buf.checked_u8(method)? as u32)
    } else {
        (0, 0, 0)
    };
    let micros = if buf.has_remaining() { buf.checked_u32_le(method)? } else { 0 };

    date.and_hms_micro_opt(hour, minute, second, micros)
        .map(Value::DateTime)
        .ok_or_else(|| malformed(method, data))
}

fn decode_time(data: &[u8]) -> Result<Value, ProtocolError> {
    let method = "decode_time";
    let mut buf = data;

    if buf.is_empty() {
        return Ok(Value::Time(Duration::zero()));
    }

    let negative = buf.checked_u8(method)? == 1;
    let days = buf.checked_u32_le(method)? as i64;
    let hours = buf.checked_u8(method)? as i64;
    let minutes = buf.checked_u8(method)? as i64;
    let seconds = buf.checked_u8(method)? as i64;
    let micros = if buf.has_remaining() { buf.checked_u32_le(method)? as i64 } else { 0 };

    let total = ((days * 24 + hours) * 60 + minutes) * 60 + seconds;
    let d = Duration::microseconds(total * 1_000_000 + micros);
    Ok(Value::Time(if negative { -d } else { d }))
}
