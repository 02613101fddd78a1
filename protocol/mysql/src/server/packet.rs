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

use super::{auth::HandshakePacket, err::MySQLError};
use crate::{
    column::ColumnInfo,
    err::ProtocolError,
    mysql_const::*,
    row::{BinaryRowPacket, RowDataPacket},
    util::{malformed, BufExt, BufMutExt},
};

// See https://dev.mysql.com/doc/internals/en/packet-OK_Packet.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status: u16,
    pub warnings: u16,
    pub info: String,
}

impl Default for OkPacket {
    fn default() -> Self {
        OkPacket {
            affected_rows: 0,
            last_insert_id: 0,
            status: SERVER_STATUS_AUTOCOMMIT,
            warnings: 0,
            info: String::new(),
        }
    }
}

impl OkPacket {
    pub fn with_affected_rows(affected_rows: u64) -> OkPacket {
        OkPacket { affected_rows, ..Default::default() }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(OK_HEADER);
        buf.put_lenc_int(self.affected_rows);
        buf.put_lenc_int(self.last_insert_id);
        buf.put_u16_le(self.status);
        buf.put_u16_le(self.warnings);
        buf.put_slice(self.info.as_bytes());
    }

    pub fn decode(buf: &mut BytesMut) -> Result<OkPacket, ProtocolError> {
        let method = "decode_ok";
        if buf.checked_u8(method)? != OK_HEADER {
            return Err(malformed(method, &buf[..]));
        }

        let (affected_rows, _) = buf.get_lenc_int(method)?;
        let (last_insert_id, _) = buf.get_lenc_int(method)?;
        let status = buf.checked_u16_le(method)?;
        let warnings = buf.checked_u16_le(method)?;
        let info = String::from_utf8(buf.get_rest()).map_err(|e| malformed(method, e.into_bytes()))?;

        Ok(OkPacket { affected_rows, last_insert_id, status, warnings, info })
    }
}

// See https://dev.mysql.com/doc/internals/en/packet-ERR_Packet.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrPacket {
    pub code: u16,
    pub state: String,
    pub message: String,
}

impl ErrPacket {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(ERR_HEADER);
        buf.put_u16_le(self.code);
        buf.put_u8(b'#');

        // SQL state is always 5 bytes
        let mut state = [b'0'; 5];
        for (dst, src) in state.iter_mut().zip(self.state.bytes()) {
            *dst = src;
        }
        buf.put_slice(&state);

        // Messages are always UTF-8
        buf.put_slice(self.message.as_bytes());
    }

    pub fn decode(buf: &mut BytesMut) -> Result<ErrPacket, ProtocolError> {
        let method = "decode_err";
        if buf.checked_u8(method)? != ERR_HEADER {
            return Err(malformed(method, &buf[..]));
        }

        let code = buf.checked_u16_le(method)?;
        if buf.checked_u8(method)? != b'#' {
            return Err(malformed(method, &buf[..]));
        }
        let state = String::from_utf8(buf.checked_bytes(5, method)?)
            .map_err(|e| malformed(method, e.into_bytes()))?;
        let message = String::from_utf8_lossy(&buf.get_rest()).into_owned();

        Ok(ErrPacket { code, state, message })
    }
}

impl From<MySQLError> for ErrPacket {
    fn from(err: MySQLError) -> Self {
        ErrPacket { code: err.code, state: err.state, message: err.msg }
    }
}

impl From<&MySQLError> for ErrPacket {
    fn from(err: &MySQLError) -> Self {
        err.clone().into()
    }
}

// See https://dev.mysql.com/doc/internals/en/packet-EOF_Packet.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EofPacket {
    pub warnings: u16,
    pub status: u16,
}

impl Default for EofPacket {
    fn default() -> Self {
        EofPacket { warnings: 0, status: SERVER_STATUS_AUTOCOMMIT }
    }
}

impl EofPacket {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(EOF_HEADER);
        buf.put_u16_le(self.warnings);
        buf.put_u16_le(self.status);
    }

    pub fn decode(buf: &mut BytesMut) -> Result<EofPacket, ProtocolError> {
        let method = "decode_eof";
        if buf.checked_u8(method)? != EOF_HEADER {
            return Err(malformed(method, &buf[..]));
        }
        let warnings = buf.checked_u16_le(method)?;
        let status = buf.checked_u16_le(method)?;
        Ok(EofPacket { warnings, status })
    }
}

// COM_STMT_PREPARE_OK, see https://dev.mysql.com/doc/internals/en/com-stmt-prepare-response.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedOkPacket {
    pub statement_id: u32,
    pub columns: u16,
    pub params: u16,
    pub warnings: u16,
}

impl PreparedOkPacket {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(OK_HEADER);
        buf.put_u32_le(self.statement_id);
        buf.put_u16_le(self.columns);
        buf.put_u16_le(self.params);
        // reserved_1
        buf.put_u8(0);
        buf.put_u16_le(self.warnings);
    }

    pub fn decode(buf: &mut BytesMut) -> Result<PreparedOkPacket, ProtocolError> {
        let method = "decode_prepared_ok";
        if buf.checked_u8(method)? != OK_HEADER {
            return Err(malformed(method, &buf[..]));
        }
        let statement_id = buf.checked_u32_le(method)?;
        let columns = buf.checked_u16_le(method)?;
        let params = buf.checked_u16_le(method)?;
        let _ = buf.checked_u8(method)?;
        let warnings = buf.checked_u16_le(method)?;
        Ok(PreparedOkPacket { statement_id, columns, params, warnings })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSetHeaderPacket {
    pub column_count: u64,
}

impl ResultSetHeaderPacket {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_lenc_int(self.column_count);
    }

    pub fn decode(buf: &mut BytesMut) -> Result<ResultSetHeaderPacket, ProtocolError> {
        let (column_count, is_null) = buf.get_lenc_int("decode_result_set_header")?;
        if is_null {
            return Err(malformed("decode_result_set_header", &buf[..]));
        }
        Ok(ResultSetHeaderPacket { column_count })
    }
}

/// Every packet the server writes. The codec assigns the sequence id.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    Handshake(HandshakePacket),
    Ok(OkPacket),
    Err(ErrPacket),
    Eof(EofPacket),
    PreparedOk(PreparedOkPacket),
    ResultSetHeader(ResultSetHeaderPacket),
    // column definition and the charset its names are encoded in
    Field(ColumnInfo, Option<&'static str>),
    Row(RowDataPacket),
    BinaryRow(BinaryRowPacket),
}

impl ServerPacket {
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            ServerPacket::Handshake(p) => p.encode(buf),
            ServerPacket::Ok(p) => p.encode(buf),
            ServerPacket::Err(p) => p.encode(buf),
            ServerPacket::Eof(p) => p.encode(buf),
            ServerPacket::PreparedOk(p) => p.encode(buf),
            ServerPacket::ResultSetHeader(p) => p.encode(buf),
            ServerPacket::Field(p, charset) => p.encode_with_charset(buf, *charset),
            ServerPacket::Row(p) => p.encode(buf),
            ServerPacket::BinaryRow(p) => p.encode(buf),
        }
    }
}

impl From<MySQLError> for ServerPacket {
    fn from(err: MySQLError) -> Self {
        ServerPacket::Err(err.into())
    }
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;

    use super::*;

    #[test]
    fn test_ok_packet() {
        let ok = OkPacket::default();
        let mut buf = BytesMut::new();
        ok.encode(&mut buf);
        // body of the "auth accepted" frame
        assert_eq!(&buf[..], &[0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00]);
        assert_eq!(OkPacket::decode(&mut buf).unwrap(), ok);

        let ok = OkPacket { affected_rows: 300, last_insert_id: 7, info: "Rows matched".to_string(), ..Default::default() };
        let mut buf = BytesMut::new();
        ok.encode(&mut buf);
        assert_eq!(OkPacket::decode(&mut buf).unwrap(), ok);
    }

    #[test]
    fn test_err_packet() {
        let err: ErrPacket = MySQLError::new(1146, "42S02", "Table 'test.t' doesn't exist").into();
        let mut buf = BytesMut::new();
        err.encode(&mut buf);
        assert_eq!(&buf[..9], &[0xff, 0x7a, 0x04, b'#', b'4', b'2', b'S', b'0', b'2']);
        assert_eq!(&buf[9..], b"Table 'test.t' doesn't exist");
        assert_eq!(ErrPacket::decode(&mut buf).unwrap(), err);
    }

    #[test]
    fn test_eof_packet() {
        let eof = EofPacket::default();
        let mut buf = BytesMut::new();
        eof.encode(&mut buf);
        assert_eq!(&buf[..], &[0xfe, 0x00, 0x00, 0x02, 0x00]);
        assert_eq!(EofPacket::decode(&mut buf).unwrap(), eof);
    }

    #[test]
    fn test_prepared_ok_packet() {
        let ok = PreparedOkPacket { statement_id: 1, columns: 1, params: 2, warnings: 0 };
        let mut buf = BytesMut::new();
        ok.encode(&mut buf);
        assert_eq!(&buf[..], &[0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(PreparedOkPacket::decode(&mut buf).unwrap(), ok);
    }

    #[test]
    fn test_result_set_header() {
        let header = ResultSetHeaderPacket { column_count: 3 };
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(&buf[..], &[0x03]);
        assert_eq!(ResultSetHeaderPacket::decode(&mut buf).unwrap(), header);
    }

    #[test]
    fn test_decode_wrong_header() {
        let mut buf = BytesMut::from(&[0xff, 0x00][..]);
        assert!(OkPacket::decode(&mut buf).is_err());
        let mut buf = BytesMut::from(&[0xfe, 0x00][..]);
        assert!(EofPacket::decode(&mut buf).is_err());
    }
}
