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

use bytes::{Buf, BufMut, BytesMut};

use crate::{
    err::ProtocolError,
    mysql_const::{ColumnType, NULL_VALUE, OK_HEADER},
    util::{malformed, BufExt, BufMutExt},
    value::{ParamType, Value},
};

// For ProtocolText::ResultsetRow, every cell is a length encoded string or 0xfb for NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDataPacket {
    pub values: Vec<Option<Vec<u8>>>,
}

impl RowDataPacket {
    pub fn new(values: &[Value], charset: Option<&str>) -> RowDataPacket {
        RowDataPacket { values: values.iter().map(|v| v.encode_text(charset)).collect() }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        for value in &self.values {
            match value {
                Some(data) => buf.put_lenc_bytes(data),
                None => buf.put_u8(NULL_VALUE),
            }
        }
    }

    pub fn decode(buf: &mut BytesMut) -> Result<RowDataPacket, ProtocolError> {
        let mut values = vec![];
        while buf.has_remaining() {
            values.push(buf.get_lenc_bytes("decode_text_row")?);
        }
        Ok(RowDataPacket { values })
    }
}

// For ProtocolBinary::ResultsetRow.
// See https://dev.mysql.com/doc/internals/en/binary-protocol-resultset-row.html
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryRowPacket {
    pub column_types: Vec<ColumnType>,
    pub values: Vec<Value>,
}

#[inline]
fn null_map_length(column_count: usize) -> usize {
    // NULL Bitmap length: (column-count + 7 + 2) / 8
    (column_count + 7 + 2) >> 3
}

impl BinaryRowPacket {
    /// Coerces every value to the wire form of its column. Fails when a
    /// value can not be represented in its column type.
    pub fn new(
        column_types: Vec<ColumnType>,
        values: Vec<Value>,
        charset: Option<&str>,
    ) -> Result<BinaryRowPacket, ProtocolError> {
        let values = values
            .into_iter()
            .zip(column_types.iter())
            .map(|(v, t)| v.coerce(*t, charset))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BinaryRowPacket { column_types, values })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(OK_HEADER);

        let mut null_map = vec![0u8; null_map_length(self.column_types.len())];
        for (idx, value) in self.values.iter().enumerate() {
            if value.is_null() {
                null_map[(idx + 2) >> 3] |= 1 << ((idx + 2) & 7);
            }
        }
        buf.put_slice(&null_map);

        for (value, column_type) in self.values.iter().zip(self.column_types.iter()) {
            if !value.is_null() {
                value.encode_binary(*column_type, buf);
            }
        }
    }

    pub fn decode(buf: &mut BytesMut, column_types: &[ColumnType]) -> Result<BinaryRowPacket, ProtocolError> {
        let method = "decode_binary_row";

        if buf.checked_u8(method)? != OK_HEADER {
            return Err(malformed(method, &buf[..]));
        }

        let null_map = buf.checked_bytes(null_map_length(column_types.len()), method)?;

        let mut values = Vec::with_capacity(column_types.len());
        for (idx, column_type) in column_types.iter().enumerate() {
            if null_map[(idx + 2) >> 3] & (1 << ((idx + 2) & 7)) > 0 {
                values.push(Value::Null);
                continue;
            }
            values.push(Value::decode_binary(buf, ParamType::new(*column_type, false))?);
        }

        Ok(BinaryRowPacket { column_types: column_types.to_vec(), values })
    }
}
