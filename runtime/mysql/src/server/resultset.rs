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
    mysql_const::ColumnType,
    row::{BinaryRowPacket, RowDataPacket},
    server::{
        err::MySQLError,
        packet::{EofPacket, OkPacket, ResultSetHeaderPacket, ServerPacket},
        stream::PacketStream,
    },
    value::Value,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;
use xsql_error::error::{Error, ErrorKind};

use super::util::make_column_info;
use crate::session::{PreparedStatement, QueryResult, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFormat {
    // COM_QUERY
    Text,
    // COM_STMT_EXECUTE
    Binary,
}

/// Connection wide settings of the result encoding.
#[derive(Debug, Clone, Copy)]
pub struct ResultEncoding {
    pub charset: Option<&'static str>,
    pub collation_id: u8,
}

/// Runs `stmt` and writes its response: a result set for queries, an OK
/// packet with the affected rows otherwise.
pub async fn execute_statement<S>(
    stream: &mut PacketStream<S>,
    session: &mut dyn Session,
    stmt: &dyn PreparedStatement,
    params: &[Value],
    format: RowFormat,
    encoding: ResultEncoding,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if stmt.is_query() {
        let mut result = session.execute_query(stmt, params, -1).await.map_err(execution)?;
        write_query_result(stream, result.as_mut(), format, encoding).await
    } else {
        let affected_rows = session.execute_update(stmt, params).await.map_err(execution)?;
        stream.write_ok(OkPacket::with_affected_rows(affected_rows)).await?;
        Ok(())
    }
}

/// Header, field packets, EOF, rows, EOF. Rows fed before an iteration
/// error stay on the wire and the error packet follows them.
pub async fn write_query_result<S>(
    stream: &mut PacketStream<S>,
    result: &mut dyn QueryResult,
    format: RowFormat,
    encoding: ResultEncoding,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let column_count = result.column_count();
    stream.feed(ServerPacket::ResultSetHeader(ResultSetHeaderPacket { column_count: column_count as u64 })).await?;

    let mut column_types: Vec<ColumnType> = Vec::with_capacity(column_count);
    for idx in 0..column_count {
        let column = make_column_info(result.column_name(idx), result.column_type(idx), encoding.collation_id);
        column_types.push(column.column_type);
        stream.feed(ServerPacket::Field(column, encoding.charset)).await?;
    }
    stream.feed(ServerPacket::Eof(EofPacket::default())).await?;

    let mut remaining = result.row_count();
    let mut rows = 0;
    while remaining != Some(0) {
        if !result.next().map_err(execution)? {
            break;
        }

        let values = result.current_row();
        let packet = match format {
            RowFormat::Text => ServerPacket::Row(RowDataPacket::new(values, encoding.charset)),
            RowFormat::Binary => ServerPacket::BinaryRow(
                BinaryRowPacket::new(column_types.clone(), values.to_vec(), encoding.charset)
                    .map_err(|e| execution(MySQLError::unknown(e.to_string())))?,
            ),
        };
        stream.feed(packet).await?;

        rows += 1;
        remaining = remaining.map(|n| n - 1);
    }

    stream.feed(ServerPacket::Eof(EofPacket::default())).await?;
    stream.flush().await?;

    debug!("wrote result set, columns {} rows {}", column_count, rows);
    Ok(())
}

#[inline]
fn execution(err: MySQLError) -> Error {
    Error::new(ErrorKind::Execution(err))
}

#[cfg(test)]
mod test {
    use bytes::BytesMut;
    use mysql_protocol::{
        row::RowDataPacket,
        server::{
            codec::DEFAULT_MAX_PACKET_SIZE,
            err::MySQLError,
            packet::{EofPacket, ResultSetHeaderPacket},
            stream::PacketStream,
        },
        value::Value,
    };

    use super::*;
    use crate::session::SqlType;

    struct Rows {
        names: [&'static str; 2],
        rows: Vec<Vec<Value>>,
        pos: usize,
        row_count: Option<usize>,
        fail_at: Option<usize>,
    }

    impl QueryResult for Rows {
        fn column_count(&self) -> usize {
            2
        }

        fn column_name(&self, idx: usize) -> &str {
            self.names[idx]
        }

        fn column_type(&self, idx: usize) -> SqlType {
            [SqlType::Int, SqlType::Varchar][idx]
        }

        fn row_count(&self) -> Option<usize> {
            self.row_count
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

    fn rows(row_count: Option<usize>, fail_at: Option<usize>) -> Rows {
        Rows {
            names: ["ID", "Name"],
            rows: vec![
                vec![Value::Int(1), Value::Text("a".to_string())],
                vec![Value::Int(2), Value::Null],
            ],
            pos: 0,
            row_count,
            fail_at,
        }
    }

    async fn read_all(
        client: &mut PacketStream<tokio::io::DuplexStream>,
    ) -> Vec<(u8, BytesMut)> {
        let mut frames = vec![];
        while let Some(frame) = client.read_frame().await {
            let frame = frame.unwrap();
            frames.push((frame.seq, frame.payload));
        }
        frames
    }

    fn encoding() -> ResultEncoding {
        ResultEncoding { charset: Some("utf8"), collation_id: 33 }
    }

    #[tokio::test]
    async fn test_text_result_set() {
        let (client, server) = tokio::io::duplex(4096);
        let mut client = PacketStream::new(client, DEFAULT_MAX_PACKET_SIZE, 1024);
        let mut server = PacketStream::new(server, DEFAULT_MAX_PACKET_SIZE, 1024);

        let mut result = rows(None, None);
        write_query_result(&mut server, &mut result, RowFormat::Text, encoding()).await.unwrap();
        server.close().await.unwrap();

        let mut frames = read_all(&mut client).await;
        // header, 2 fields, eof, 2 rows, eof
        assert_eq!(frames.len(), 7);
        for (idx, (seq, _)) in frames.iter().enumerate() {
            assert_eq!(*seq as usize, idx);
        }

        assert_eq!(ResultSetHeaderPacket::decode(&mut frames[0].1).unwrap().column_count, 2);
        let row = RowDataPacket::decode(&mut frames[5].1).unwrap();
        assert_eq!(row.values, vec![Some(b"2".to_vec()), None]);
        assert!(EofPacket::decode(&mut frames[6].1).is_ok());
    }

    #[tokio::test]
    async fn test_row_count_limit() {
        let (client, server) = tokio::io::duplex(4096);
        let mut client = PacketStream::new(client, DEFAULT_MAX_PACKET_SIZE, 1024);
        let mut server = PacketStream::new(server, DEFAULT_MAX_PACKET_SIZE, 1024);

        let mut result = rows(Some(1), None);
        write_query_result(&mut server, &mut result, RowFormat::Binary, encoding()).await.unwrap();
        server.close().await.unwrap();

        let frames = read_all(&mut client).await;
        assert_eq!(frames.len(), 6);
        assert_eq!(frames[4].1[0], 0x00);
    }

    #[tokio::test]
    async fn test_iteration_error() {
        let (client, server) = tokio::io::duplex(4096);
        let mut client = PacketStream::new(client, DEFAULT_MAX_PACKET_SIZE, 1024);
        let mut server = PacketStream::new(server, DEFAULT_MAX_PACKET_SIZE, 1024);

        let mut result = rows(None, Some(1));
        let err = write_query_result(&mut server, &mut result, RowFormat::Text, encoding()).await.err().unwrap();
        assert!(!err.is_fatal());
        assert_eq!(err.to_mysql_error().code, 1317);

        server.write_err(&err.to_mysql_error()).await.unwrap();
        server.close().await.unwrap();

        let frames = read_all(&mut client).await;
        // header, 2 fields, eof, 1 row, error
        assert_eq!(frames.len(), 6);
        assert_eq!(frames[5].0, 5);
        assert_eq!(frames[5].1[0], 0xff);
    }

    #[tokio::test]
    async fn test_field_names_follow_connection_charset() {
        let (client, server) = tokio::io::duplex(4096);
        let mut client = PacketStream::new(client, DEFAULT_MAX_PACKET_SIZE, 1024);
        let mut server = PacketStream::new(server, DEFAULT_MAX_PACKET_SIZE, 1024);

        let mut result = Rows {
            names: ["ID", "Café"],
            rows: vec![vec![Value::Int(1), Value::Text("café".to_string())]],
            pos: 0,
            row_count: None,
            fail_at: None,
        };
        let latin1 = ResultEncoding { charset: Some("latin1"), collation_id: 8 };
        write_query_result(&mut server, &mut result, RowFormat::Text, latin1).await.unwrap();
        server.close().await.unwrap();

        let mut frames = read_all(&mut client).await;
        assert_eq!(frames.len(), 6);

        // catalog "def", empty schema and table, no org table, then the name
        let field = &frames[2].1;
        assert_eq!(&field[..8], &[0x03, b'd', b'e', b'f', 0x00, 0x00, 0x00, 0x04]);
        assert_eq!(&field[8..12], &[b'c', b'a', b'f', 0xe9]);
        // org name, next length, collation
        assert_eq!(&field[12..16], &[0x00, 0x0c, 0x08, 0x00]);

        let row = RowDataPacket::decode(&mut frames[4].1).unwrap();
        assert_eq!(row.values[1], Some(vec![b'c', b'a', b'f', 0xe9]));
    }
}
