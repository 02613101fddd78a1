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

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use tracing::debug;

use super::{
    codec::{Frame, PacketCodec},
    err::MySQLError,
    packet::{OkPacket, ServerPacket},
};
use crate::err::ProtocolError;

pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 16 * 1024;

/// Framed packet stream of one client connection.
///
/// Packets are fed into the write buffer without flushing. The buffer is
/// flushed once it grows past `write_buffer_size` and at the end of every
/// response via `flush`.
pub struct PacketStream<S> {
    framed: Framed<S, PacketCodec>,
    write_buffer_size: usize,
}

impl<S> PacketStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: S, max_packet_size: usize, write_buffer_size: usize) -> Self {
        PacketStream { framed: Framed::new(io, PacketCodec::new(max_packet_size)), write_buffer_size }
    }

    /// Next client frame, `None` once the peer closed the connection.
    pub async fn read_frame(&mut self) -> Option<Result<Frame, ProtocolError>> {
        self.framed.next().await
    }

    pub async fn feed(&mut self, packet: ServerPacket) -> Result<(), ProtocolError> {
        self.framed.feed(packet).await?;

        if self.framed.write_buffer().len() >= self.write_buffer_size {
            debug!("rotate write buffer, len {}", self.framed.write_buffer().len());
            SinkExt::<ServerPacket>::flush(&mut self.framed).await?;
        }

        Ok(())
    }

    pub async fn flush(&mut self) -> Result<(), ProtocolError> {
        SinkExt::<ServerPacket>::flush(&mut self.framed).await
    }

    pub async fn send(&mut self, packet: ServerPacket) -> Result<(), ProtocolError> {
        self.feed(packet).await?;
        self.flush().await
    }

    pub async fn write_ok(&mut self, ok: OkPacket) -> Result<(), ProtocolError> {
        self.send(ServerPacket::Ok(ok)).await
    }

    pub async fn write_err(&mut self, err: &MySQLError) -> Result<(), ProtocolError> {
        self.send(ServerPacket::Err(err.into())).await
    }

    #[inline]
    pub fn reset_seq(&mut self) {
        self.framed.codec_mut().reset_seq()
    }

    #[inline]
    pub fn seq(&self) -> u8 {
        self.framed.codec().seq()
    }

    /// Flushes pending packets and shuts down the write side of the transport.
    pub async fn close(&mut self) -> Result<(), ProtocolError> {
        SinkExt::<ServerPacket>::close(&mut self.framed).await
    }

    pub fn get_ref(&self) -> &S {
        self.framed.get_ref()
    }
}
