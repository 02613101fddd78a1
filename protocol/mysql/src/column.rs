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

use bytes::{BufMut, BytesMut};
use num_traits::FromPrimitive;

use crate::{
    charset::{encode_string, BINARY_COLLATION_ID},
    err::ProtocolError,
    mysql_const::{ColumnType, BINARY_FLAG},
    util::{malformed, BufExt, BufMutExt},
};

/// Field packet of a result set or a prepare response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub schema: Option<String>,
    pub table_name: Option<String>,
    pub column_name: String,
    pub charset: u16,
    pub column_length: u32,
    pub column_type: ColumnType,
    pub column_flag: u16,
    pub decimals: u8,
}

impl ColumnInfo {
    pub fn new(column_name: &str, column_type: ColumnType, charset: u16) -> ColumnInfo {
        ColumnInfo {
            schema: None,
            table_name: None,
            column_name: column_name.to_string(),
            charset,
            column_length: 0,
            column_type,
            column_flag: 0,
            decimals: 0,
        }
    }

    // Definition sent for every `?` of a prepared statement.
    pub fn param() -> ColumnInfo {
        ColumnInfo {
            column_flag: BINARY_FLAG,
            ..ColumnInfo::new("?", ColumnType::MYSQL_TYPE_VAR_STRING, BINARY_COLLATION_ID as u16)
        }
    }

    // Column definition 41, see https://dev.mysql.com/doc/internals/en/com-query-response.html#packet-Protocol::ColumnDefinition41
    pub fn encode_with_charset(&self, buf: &mut BytesMut, charset: Option<&str>) {
        //Catalog
        buf.put_lenc_bytes(b"def");

        //Schema
        buf.put_lenc_bytes(&encode_string(self.schema.as_deref().unwrap_or(""), charset));

        //Table -- virtual table-name
        buf.put_lenc_bytes(&encode_string(self.table_name.as_deref().unwrap_or(""), charset));

        //Org table -- physical table-name
        buf.put_lenc_int(0);

        //Name -- virtual column name
        buf.put_lenc_bytes(&encode_string(&self.column_name, charset));

        //Org name -- physical column name
        buf.put_lenc_int(0);

        //Next length -- length of the following fields (always 0x0c)
        buf.put_u8(0x0c);

        buf.put_u16_le(self.charset);
        buf.put_u32_le(self.column_length);
        buf.put_u8(self.column_type as u8);
        buf.put_u16_le(self.column_flag);
        buf.put_u8(self.decimals);

        //filler - [00] [00]
        buf.put_u16_le(0);
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        self.encode_with_charset(buf, None)
    }

    pub fn decode(buf: &mut BytesMut) -> Result<ColumnInfo, ProtocolError> {
        let method = "decode_column";

        let _catalog = buf.get_lenc_bytes(method)?;
        let schema = lenc_string(buf, method)?;
        let table_name = lenc_string(buf, method)?;
        let _org_table = buf.get_lenc_bytes(method)?;
        let column_name = lenc_string(buf, method)?.unwrap_or_default();
        let _org_name = buf.get_lenc_bytes(method)?;

        if buf.checked_u8(method)? != 0x0c {
            return Err(malformed(method, &buf[..]));
        }

        let charset = buf.checked_u16_le(method)?;
        let column_length = buf.checked_u32_le(method)?;
        let type_byte = buf.checked_u8(method)?;
        let column_type =
            ColumnType::from_u8(type_byte).ok_or_else(|| malformed(method, [type_byte]))?;
        let column_flag = buf.checked_u16_le(method)?;
        let decimals = buf.checked_u8(method)?;
        let _filler = buf.checked_u16_le(method)?;

        Ok(ColumnInfo {
            schema,
            table_name,
            column_name,
            charset,
            column_length,
            column_type,
            column_flag,
            decimals,
        })
    }
}

// Empty and NULL strings both decode to `None`.
fn lenc_string(buf: &mut BytesMut, method: &str) -> Result<Option<String>, ProtocolError> {
    match buf.get_lenc_bytes(method)? {
        Some(data) if !data.is_empty() => String::from_utf8(data)
            .map(Some)
            .map_err(|e| malformed(method, e.into_bytes())),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;

    use super::ColumnInfo;
    use crate::mysql_const::ColumnType;

    #[test]
    fn test_decode_encode_column_info() {
        let data = [
            0x03, 0x64, 0x65, 0x66, 0x00, 0x00, 0x00, 0x01, 0x3f, 0x00, 0x0c, 0x3f, 0x00, 0x00,
            0x00, 0x00, 0x00, 0xfd, 0x80, 0x00, 0x00, 0x00, 0x00,
        ];

        let mut buf = BytesMut::from(&data[..]);
        let info = ColumnInfo::decode(&mut buf).unwrap();
        assert_eq!(info.charset, 0x3f);
        assert_eq!(info.column_name, "?");
        assert_eq!(info.column_type, ColumnType::MYSQL_TYPE_VAR_STRING);
        assert_eq!(info.column_flag, 0x80);
        assert_eq!(info.column_length, 0);
        assert_eq!(info, ColumnInfo::param());

        let mut encode_buf = BytesMut::new();
        info.encode(&mut encode_buf);
        assert_eq!(&data[..], &encode_buf[..]);
    }

    #[test]
    fn test_column_with_schema() {
        let mut info = ColumnInfo::new("id", ColumnType::MYSQL_TYPE_LONGLONG, 33);
        info.schema = Some("test".to_string());
        info.table_name = Some("user".to_string());

        let mut buf = BytesMut::new();
        info.encode(&mut buf);
        assert_eq!(ColumnInfo::decode(&mut buf).unwrap(), info);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_truncated_column() {
        let data = [0x03, 0x64, 0x65, 0x66, 0x00, 0x00, 0x00, 0x01, 0x3f, 0x00, 0x0c, 0x3f];
        let mut buf = BytesMut::from(&data[..]);
        assert!(ColumnInfo::decode(&mut buf).is_err());
    }
}
