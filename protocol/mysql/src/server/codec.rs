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
use tokio_util::codec::{Decoder, Encoder};

use super::packet::ServerPacket;
use crate::{
    err::ProtocolError,
    mysql_const::MAX_PAYLOAD_LEN,
    util::{get_length, malformed},
};

pub const DEFAULT_MAX_PACKET_SIZE: usize = 16 * 1024 * 1024;

/// One logical client packet: sequence id of its first frame and the
/// reassembled payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: u8,
    pub payload: BytesMut,
}

/// Frame codec shared by the read and write sides of a connection.
///
/// Both directions use the same sequence counter: a frame read with id `n`
/// makes `n + 1` the id of the next frame written, and the other way round.
pub struct PacketCodec {
    // Scratch space for the frame header, cleared once consumed.
    header: [u8; 4],
    has_header: bool,
    body_length: usize,
    first_seq: Option<u8>,
    payload: BytesMut,
    seq: u8,
    max_packet_size: usize,
}

impl PacketCodec {
    pub fn new(max_packet_size: usize) -> Self {
        Self {
            header: [0; 4],
            has_header: false,
            body_length: 0,
            first_seq: None,
            payload: BytesMut::new(),
            seq: 0,
            max_packet_size,
        }
    }

    #[inline]
    pub fn reset_seq(&mut self) {
        self.seq = 0
    }

    #[inline]
    pub fn seq(&self) -> u8 {
        self.seq
    }

    #[inline]
    pub fn set_seq(&mut self, seq: u8) {
        self.seq = seq
    }

    // Writes `payload` as one or more frames. A payload whose last chunk is
    // exactly MAX_PAYLOAD_LEN is terminated by an empty frame.
    pub fn encode_payload(&mut self, payload: &[u8], dst: &mut BytesMut) {
        dst.reserve(payload.len() + 4 * (payload.len() / MAX_PAYLOAD_LEN + 1));

        let mut remain = payload;
        loop {
            let length = remain.len().min(MAX_PAYLOAD_LEN);
            dst.put_uint_le(length as u64, 3);
            dst.put_u8(self.seq);
            self.seq = self.seq.wrapping_add(1);
            dst.put_slice(&remain[..length]);
            remain = &remain[length..];

            if length < MAX_PAYLOAD_LEN {
                break;
            }
        }
    }

    fn is_idle(&self) -> bool {
        !self.has_header && self.payload.is_empty() && self.first_seq.is_none()
    }
}

impl Decoder for PacketCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if !self.has_header {
                if src.len() < 4 {
                    return Ok(None);
                }

                self.header.copy_from_slice(&src[..4]);
                src.advance(4);

                let length = get_length(&self.header);
                let seq = self.header[3];
                self.header = [0; 4];

                if self.payload.len() + length > self.max_packet_size {
                    return Err(malformed("decode_frame_length", (length as u32).to_le_bytes()));
                }

                if seq != self.seq {
                    return Err(malformed("decode_frame_sequence", [seq, self.seq]));
                }

                self.seq = seq.wrapping_add(1);
                self.first_seq.get_or_insert(seq);
                self.body_length = length;
                self.has_header = true;
            }

            if src.len() < self.body_length {
                src.reserve(self.body_length - src.len());
                return Ok(None);
            }

            self.payload.extend_from_slice(&src.split_to(self.body_length));
            self.has_header = false;

            if self.body_length == MAX_PAYLOAD_LEN {
                continue;
            }

            let seq = self.first_seq.take().unwrap_or_default();
            return Ok(Some(Frame { seq, payload: self.payload.split() }));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() && self.is_idle() => Ok(None),
            None => Err(malformed("decode_eof", &buf[..])),
        }
    }
}

impl Encoder<ServerPacket> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: ServerPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut body = BytesMut::with_capacity(64);
        item.encode(&mut body);
        self.encode_payload(&body, dst);
        Ok(())
    }
}
