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

use std::collections::HashMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_traits::FromPrimitive;

use crate::{
    err::ProtocolError,
    mysql_const::{ColumnType, Com},
    util::{malformed, BufExt},
    value::{ParamType, Value},
};

/// Inbound command packet of the command phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    InitDb(String),
    Query(String),
    FieldList(Bytes),
    Ping,
    Prepare(String),
    Execute(ExecutePacket),
    SendLongData { statement_id: u32, param_id: u16, data: Bytes },
    Close(u32),
    Reset(u32),
    Unsupported(u8),
}

// COM_STMT_EXECUTE, see https://dev.mysql.com/doc/internals/en/com-stmt-execute.html
// Parameters stay raw until the statement's parameter count is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutePacket {
    pub statement_id: u32,
    pub flags: u8,
    pub iteration_count: u32,
    pub params: Bytes,
}

impl Command {
    pub fn decode(buf: &mut BytesMut) -> Result<Command, ProtocolError> {
        let method = "decode_command";
        let cmd = buf.checked_u8(method)?;

        let command = match Com::from_u8(cmd) {
            Some(Com::Quit) => Command::Quit,
            Some(Com::InitDb) => Command::InitDb(text(buf)),
            Some(Com::Query) => Command::Query(text(buf)),
            Some(Com::FieldList) => Command::FieldList(buf.split().freeze()),
            Some(Com::Ping) => Command::Ping,
            Some(Com::StmtPrepare) => Command::Prepare(text(buf)),
            Some(Com::StmtExecute) => {
                let statement_id = buf.checked_u32_le(method)?;
                let flags = buf.checked_u8(method)?;
                let iteration_count = buf.checked_u32_le(method)?;
                Command::Execute(ExecutePacket {
                    statement_id,
                    flags,
                    iteration_count,
                    params: buf.split().freeze(),
                })
            }
            Some(Com::StmtSendLongData) => {
                let statement_id = buf.checked_u32_le(method)?;
                let param_id = buf.checked_u16_le(method)?;
                Command::SendLongData { statement_id, param_id, data: buf.split().freeze() }
            }
            Some(Com::StmtClose) => Command::Close(buf.checked_u32_le(method)?),
            Some(Com::StmtReset) => Command::Reset(buf.checked_u32_le(method)?),
            _ => Command::Unsupported(cmd),
        };

        Ok(command)
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Command::Quit => buf.put_u8(Com::Quit as u8),
            Command::InitDb(db) => {
                buf.put_u8(Com::InitDb as u8);
                buf.put_slice(db.as_bytes());
            }
            Command::Query(sql) => {
                buf.put_u8(Com::Query as u8);
                buf.put_slice(sql.as_bytes());
            }
            Command::FieldList(data) => {
                buf.put_u8(Com::FieldList as u8);
                buf.put_slice(data);
            }
            Command::Ping => buf.put_u8(Com::Ping as u8),
            Command::Prepare(sql) => {
                buf.put_u8(Com::StmtPrepare as u8);
                buf.put_slice(sql.as_bytes());
            }
            Command::Execute(execute) => {
                buf.put_u8(Com::StmtExecute as u8);
                buf.put_u32_le(execute.statement_id);
                buf.put_u8(execute.flags);
                buf.put_u32_le(execute.iteration_count);
                buf.put_slice(&execute.params);
            }
            Command::SendLongData { statement_id, param_id, data } => {
                buf.put_u8(Com::StmtSendLongData as u8);
                buf.put_u32_le(*statement_id);
                buf.put_u16_le(*param_id);
                buf.put_slice(data);
            }
            Command::Close(id) => {
                buf.put_u8(Com::StmtClose as u8);
                buf.put_u32_le(*id);
            }
            Command::Reset(id) => {
                buf.put_u8(Com::StmtReset as u8);
                buf.put_u32_le(*id);
            }
            Command::Unsupported(cmd) => buf.put_u8(*cmd),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Quit => "quit",
            Command::InitDb(_) => "init_db",
            Command::Query(_) => "query",
            Command::FieldList(_) => "field_list",
            Command::Ping => "ping",
            Command::Prepare(_) => "prepare",
            Command::Execute(_) => "execute",
            Command::SendLongData { .. } => "send_long_data",
            Command::Close(_) => "close",
            Command::Reset(_) => "reset",
            Command::Unsupported(_) => "unsupported",
        }
    }
}

fn text(buf: &mut BytesMut) -> String {
    String::from_utf8_lossy(&buf.split()).into_owned()
}

impl ExecutePacket {
    /// Builds an execute packet binding `params`, wire types follow the values.
    pub fn new(statement_id: u32, params: &[Value]) -> ExecutePacket {
        let mut buf = BytesMut::new();

        if !params.is_empty() {
            let mut null_map = vec![0u8; (params.len() + 7) / 8];
            for (idx, value) in params.iter().enumerate() {
                if value.is_null() {
                    null_map[idx / 8] |= 1 << (idx % 8);
                }
            }
            buf.put_slice(&null_map);

            // new-params-bound-flag
            buf.put_u8(1);
            for value in params {
                let param = value.param_type();
                buf.put_u8(param.column_type as u8);
                buf.put_u8(if param.unsigned { 0x80 } else { 0 });
            }

            for value in params {
                if !value.is_null() {
                    value.encode_binary(value.param_type().column_type, &mut buf);
                }
            }
        }

        ExecutePacket { statement_id, flags: 0, iteration_count: 1, params: buf.freeze() }
    }

    /// Decodes the bound values. `prior_types` are the types sent with an
    /// earlier execute of the same statement, used when the client does not
    /// send them again. Parameters found in `long_data` were streamed with
    /// COM_STMT_SEND_LONG_DATA and have no value in the packet. Returns the
    /// values and the types in effect.
    pub fn decode_params(
        &self,
        param_count: usize,
        prior_types: &[ParamType],
        long_data: &HashMap<u16, Vec<u8>>,
    ) -> Result<(Vec<Value>, Vec<ParamType>), ProtocolError> {
        let method = "decode_execute_params";

        if param_count == 0 {
            return Ok((vec![], vec![]));
        }

        let mut buf = &self.params[..];
        let null_map = buf.checked_bytes((param_count + 7) / 8, method)?;
        let new_params_bound = buf.checked_u8(method)?;

        let types = if new_params_bound == 1 {
            let mut types = Vec::with_capacity(param_count);
            for _ in 0..param_count {
                let type_byte = buf.checked_u8(method)?;
                let flag = buf.checked_u8(method)?;
                let column_type = ColumnType::from_u8(type_byte).ok_or_else(|| malformed(method, [type_byte]))?;
                types.push(ParamType::new(column_type, flag & 0x80 > 0));
            }
            types
        } else if prior_types.len() == param_count {
            prior_types.to_vec()
        } else {
            return Err(malformed(method, &self.params[..]));
        };

        let mut values = Vec::with_capacity(param_count);
        for (idx, param) in types.iter().enumerate() {
            if let Some(data) = long_data.get(&(idx as u16)) {
                values.push(Value::from_long_data(data.clone(), *param)?);
                continue;
            }
            if null_map[idx / 8] & (1 << (idx % 8)) > 0 {
                values.push(Value::Null);
                continue;
            }
            values.push(Value::decode_binary(&mut buf, *param)?);
        }

        if buf.has_remaining() {
            return Err(malformed(method, buf));
        }

        Ok((values, types))
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use bytes::{Bytes, BytesMut};

    use super::{Command, ExecutePacket};
    use crate::{
        mysql_const::ColumnType,
        value::{ParamType, Value},
    };

    fn roundtrip(cmd: Command) {
        let mut buf = BytesMut::new();
        cmd.encode(&mut buf);
        assert_eq!(Command::decode(&mut buf).unwrap(), cmd);
    }

    #[test]
    fn test_decode_query() {
        let mut buf = BytesMut::from(&b"\x03select 1"[..]);
        assert_eq!(Command::decode(&mut buf).unwrap(), Command::Query("select 1".to_string()));
    }

    #[test]
    fn test_command_roundtrip() {
        roundtrip(Command::Quit);
        roundtrip(Command::Ping);
        roundtrip(Command::InitDb("test".to_string()));
        roundtrip(Command::Prepare("SELECT ?".to_string()));
        roundtrip(Command::Close(3));
        roundtrip(Command::Reset(4));
        roundtrip(Command::FieldList(Bytes::from_static(b"t\0")));
        roundtrip(Command::SendLongData { statement_id: 2, param_id: 1, data: Bytes::from_static(b"chunk") });
        roundtrip(Command::Execute(ExecutePacket::new(1, &[Value::Int(1), Value::Null])));
    }

    #[test]
    fn test_decode_unsupported() {
        let mut buf = BytesMut::from(&[0x1b, 0x00, 0x00][..]);
        assert_eq!(Command::decode(&mut buf).unwrap(), Command::Unsupported(0x1b));

        let mut buf = BytesMut::from(&[0xee][..]);
        assert_eq!(Command::decode(&mut buf).unwrap(), Command::Unsupported(0xee));
    }

    #[test]
    fn test_decode_empty() {
        let mut buf = BytesMut::new();
        assert!(Command::decode(&mut buf).is_err());

        let mut buf = BytesMut::from(&[0x19, 0x01][..]);
        assert!(Command::decode(&mut buf).is_err());
    }

    #[test]
    fn test_execute_params() {
        let params = vec![
            Value::Int(-5),
            Value::Null,
            Value::Text("abc".to_string()),
            Value::UInt(u64::MAX),
            Value::Double(2.5),
        ];
        let execute = ExecutePacket::new(7, &params);
        let (values, types) = execute.decode_params(params.len(), &[], &HashMap::new()).unwrap();
        assert_eq!(values, params);
        assert_eq!(types[3], ParamType::new(ColumnType::MYSQL_TYPE_LONGLONG, true));
    }

    #[test]
    fn test_execute_prior_types() {
        let types = vec![ParamType::new(ColumnType::MYSQL_TYPE_LONG, false)];
        // null map, new-params-bound 0, value
        let execute = ExecutePacket {
            statement_id: 1,
            flags: 0,
            iteration_count: 1,
            params: Bytes::from_static(&[0x00, 0x00, 0x2a, 0x00, 0x00, 0x00]),
        };
        let (values, _) = execute.decode_params(1, &types, &HashMap::new()).unwrap();
        assert_eq!(values, vec![Value::Int(42)]);

        // no types bound yet
        assert!(execute.decode_params(1, &[], &HashMap::new()).is_err());
    }

    #[test]
    fn test_execute_truncated_params() {
        let execute = ExecutePacket {
            statement_id: 1,
            flags: 0,
            iteration_count: 1,
            params: Bytes::from_static(&[0x00, 0x01, 0x08, 0x00, 0x01]),
        };
        assert!(execute.decode_params(1, &[], &HashMap::new()).is_err());
    }

    #[test]
    fn test_decode_send_long_data() {
        let mut buf = BytesMut::from(&[0x18, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, b'x'][..]);
        assert_eq!(
            Command::decode(&mut buf).unwrap(),
            Command::SendLongData { statement_id: 1, param_id: 0, data: Bytes::from_static(b"x") }
        );

        let mut buf = BytesMut::from(&[0x18, 0x01, 0x00, 0x00, 0x00, 0x00][..]);
        assert!(Command::decode(&mut buf).is_err());
    }

    #[test]
    fn test_execute_long_data_params() {
        // null map, new-params-bound 1, blob then long, only the long value follows
        let execute = ExecutePacket {
            statement_id: 1,
            flags: 0,
            iteration_count: 1,
            params: Bytes::from_static(&[0x00, 0x01, 0xfc, 0x00, 0x03, 0x00, 0x07, 0x00, 0x00, 0x00]),
        };

        let mut long_data = HashMap::new();
        long_data.insert(0u16, b"hello world".to_vec());

        let (values, types) = execute.decode_params(2, &[], &long_data).unwrap();
        assert_eq!(values, vec![Value::Text("hello world".to_string()), Value::Int(7)]);
        assert_eq!(types[0], ParamType::new(ColumnType::MYSQL_TYPE_BLOB, false));

        // without the streamed data the blob value is missing
        assert!(execute.decode_params(2, &[], &HashMap::new()).is_err());
    }
}
