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

use byteorder::{ByteOrder, LittleEndian};
use bytes::{Buf, BufMut};
use chrono::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::err::ProtocolError;

// random_buf: generate random byte vector, used as the auth scramble.
// Zero and '$' are avoided so the scramble can be NUL terminated.
#[inline]
pub fn random_buf(size: usize) -> Vec<u8> {
    let mut r = StdRng::seed_from_u64(Utc::now().timestamp_subsec_nanos().into());
    (0..size)
        .map(|_| {
            let b: u8 = r.gen_range(1..127);
            if b == b'$' {
                b + 1
            } else {
                b
            }
        })
        .collect()
}

// Read the 3 bytes little endian payload length of a frame header.
#[inline]
pub fn get_length(header: &[u8]) -> usize {
    LittleEndian::read_u24(header) as usize
}

#[inline]
pub fn malformed<T: AsRef<[u8]>>(method: &str, data: T) -> ProtocolError {
    ProtocolError::MalformedPacket { method: method.to_string(), data: data.as_ref().to_vec() }
}

/// Checked readers for packet payloads. A read past the end of the payload
/// is reported as a malformed packet instead of panicking.
pub trait BufExt: Buf {
    fn checked_u8(&mut self, method: &str) -> Result<u8, ProtocolError> {
        if self.remaining() < 1 {
            return Err(malformed(method, self.chunk()));
        }
        Ok(self.get_u8())
    }

    fn checked_u16_le(&mut self, method: &str) -> Result<u16, ProtocolError> {
        if self.remaining() < 2 {
            return Err(malformed(method, self.chunk()));
        }
        Ok(self.get_u16_le())
    }

    fn checked_u32_le(&mut self, method: &str) -> Result<u32, ProtocolError> {
        if self.remaining() < 4 {
            return Err(malformed(method, self.chunk()));
        }
        Ok(self.get_u32_le())
    }

    fn checked_uint_le(&mut self, n: usize, method: &str) -> Result<u64, ProtocolError> {
        if self.remaining() < n {
            return Err(malformed(method, self.chunk()));
        }
        Ok(self.get_uint_le(n))
    }

    fn checked_bytes(&mut self, n: usize, method: &str) -> Result<Vec<u8>, ProtocolError> {
        if self.remaining() < n {
            return Err(malformed(method, self.chunk()));
        }
        let mut out = vec![0; n];
        self.copy_to_slice(&mut out);
        Ok(out)
    }

    // Length encoded integer, returns (value, is_null).
    // See https://dev.mysql.com/doc/internals/en/integer.html#length-encoded-integer
    fn get_lenc_int(&mut self, method: &str) -> Result<(u64, bool), ProtocolError> {
        let first = self.checked_u8(method)?;
        match first {
            0xfb => Ok((0, true)),
            0xfc => Ok((self.checked_uint_le(2, method)?, false)),
            0xfd => Ok((self.checked_uint_le(3, method)?, false)),
            0xfe => Ok((self.checked_uint_le(8, method)?, false)),
            x => Ok((x as u64, false)),
        }
    }

    // Length encoded string, `None` when the field is NULL.
    fn get_lenc_bytes(&mut self, method: &str) -> Result<Option<Vec<u8>>, ProtocolError> {
        let (length, is_null) = self.get_lenc_int(method)?;
        if is_null {
            return Ok(None);
        }
        self.checked_bytes(length as usize, method).map(Some)
    }

    fn get_null_terminated(&mut self, method: &str) -> Result<Vec<u8>, ProtocolError> {
        let pos = match self.chunk().iter().position(|b| *b == 0) {
            Some(pos) => pos,
            None => return Err(malformed(method, self.chunk())),
        };
        let out = self.chunk()[..pos].to_vec();
        self.advance(pos + 1);
        Ok(out)
    }

    fn get_rest(&mut self) -> Vec<u8> {
        let out = self.chunk().to_vec();
        self.advance(out.len());
        out
    }
}

impl<T: Buf> BufExt for T {}

pub trait BufMutExt: BufMut {
    fn put_lenc_int(&mut self, n: u64) {
        if n < 251 {
            self.put_u8(n as u8);
        } else if n <= 0xffff {
            self.put_u8(0xfc);
            self.put_uint_le(n, 2);
        } else if n <= 0xffffff {
            self.put_u8(0xfd);
            self.put_uint_le(n, 3);
        } else {
            self.put_u8(0xfe);
            self.put_uint_le(n, 8);
        }
    }

    fn put_lenc_bytes(&mut self, data: &[u8]) {
        self.put_lenc_int(data.len() as u64);
        self.put_slice(data);
    }

    fn put_null_terminated(&mut self, data: &[u8]) {
        self.put_slice(data);
        self.put_u8(0);
    }
}

impl<T: BufMut> BufMutExt for T {}
