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

use std::sync::atomic::{AtomicU32, Ordering};

use bytes::{Buf, BufMut, BytesMut};

use crate::{
    err::ProtocolError,
    mysql_const::*,
    util::{malformed, random_buf, BufExt, BufMutExt},
};

lazy_static! {
    static ref CONNECTION_ID: AtomicU32 = AtomicU32::new(0);
}

/// Allocates a process wide connection id, starting at 1.
pub fn next_connection_id() -> u32 {
    CONNECTION_ID.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
}

// Initial handshake V10, see https://dev.mysql.com/doc/internals/en/connection-phase-packets.html#packet-Protocol::HandshakeV10
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakePacket {
    pub protocol_version: u8,
    pub server_version: String,
    pub connection_id: u32,
    pub scramble: Vec<u8>,
    pub capability: u32,
    pub charset: u8,
    pub status: u16,
    pub auth_plugin_name: String,
}

impl HandshakePacket {
    pub fn new(server_version: &str, connection_id: u32, charset: u8) -> HandshakePacket {
        HandshakePacket {
            protocol_version: PROTOCOL_VERSION,
            server_version: server_version.to_string(),
            connection_id,
            scramble: random_buf(20),
            capability: DEFAULT_CAPABILITY,
            charset,
            status: SERVER_STATUS_AUTOCOMMIT,
            auth_plugin_name: AUTH_NATIVE_PASSWORD.to_string(),
        }
    }

    pub fn encode(&self, data: &mut BytesMut) {
        // min version 10
        data.put_u8(self.protocol_version);

        // server version
        data.put_null_terminated(self.server_version.as_bytes());

        // connection id
        data.put_u32_le(self.connection_id);

        // auth-plugin-data-part-1
        let split = self.scramble.len().min(8);
        data.put_slice(&self.scramble[..split]);

        // filler [00]
        data.put_u8(0);

        // capability flag lower 2 bytes
        data.put_u16_le(self.capability as u16);

        data.put_u8(self.charset);
        data.put_u16_le(self.status);

        // capability flag upper 2 bytes
        data.put_u16_le((self.capability >> 16) as u16);

        // length of auth-plugin-data
        data.put_u8(self.scramble.len() as u8 + 1);

        // reserved 10 [00]
        data.put_bytes(0, 10);

        // auth-plugin-data-part-2
        data.put_null_terminated(&self.scramble[split..]);

        data.put_null_terminated(self.auth_plugin_name.as_bytes());
    }

    pub fn decode(data: &mut BytesMut) -> Result<HandshakePacket, ProtocolError> {
        let method = "decode_handshake";

        let protocol_version = data.checked_u8(method)?;
        let server_version = utf8(data.get_null_terminated(method)?, method)?;
        let connection_id = data.checked_u32_le(method)?;
        let mut scramble = data.checked_bytes(8, method)?;
        let _ = data.checked_u8(method)?;
        let capability_low = data.checked_u16_le(method)? as u32;
        let charset = data.checked_u8(method)?;
        let status = data.checked_u16_le(method)?;
        let capability_high = data.checked_u16_le(method)? as u32;
        let auth_data_length = data.checked_u8(method)? as usize;
        let _ = data.checked_bytes(10, method)?;

        let rest = auth_data_length.saturating_sub(8 + 1);
        scramble.extend_from_slice(&data.checked_bytes(rest, method)?);
        let _ = data.checked_u8(method)?;

        let auth_plugin_name = utf8(data.get_null_terminated(method)?, method)?;

        Ok(HandshakePacket {
            protocol_version,
            server_version,
            connection_id,
            scramble,
            capability: capability_low | capability_high << 16,
            charset,
            status,
            auth_plugin_name,
        })
    }
}

// HandshakeResponse41, see https://dev.mysql.com/doc/internals/en/connection-phase-packets.html#packet-Protocol::HandshakeResponse
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPacket {
    pub capability: u32,
    pub max_packet_size: u32,
    pub charset: u8,
    pub user: String,
    pub auth_response: Vec<u8>,
    pub database: Option<String>,
    pub auth_plugin_name: Option<String>,
}

impl AuthPacket {
    pub fn encode(&self, data: &mut BytesMut) {
        data.put_u32_le(self.capability);
        data.put_u32_le(self.max_packet_size);
        data.put_u8(self.charset);
        data.put_bytes(0, 23);
        data.put_null_terminated(self.user.as_bytes());

        if self.capability & CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA > 0 {
            data.put_lenc_bytes(&self.auth_response);
        } else if self.capability & CLIENT_SECURE_CONNECTION > 0 {
            data.put_u8(self.auth_response.len() as u8);
            data.put_slice(&self.auth_response);
        } else {
            data.put_null_terminated(&self.auth_response);
        }

        if self.capability & CLIENT_CONNECT_WITH_DB > 0 {
            data.put_null_terminated(self.database.as_deref().unwrap_or("").as_bytes());
        }

        if self.capability & CLIENT_PLUGIN_AUTH > 0 {
            data.put_null_terminated(self.auth_plugin_name.as_deref().unwrap_or("").as_bytes());
        }
    }

    pub fn decode(data: &mut BytesMut) -> Result<AuthPacket, ProtocolError> {
        let method = "decode_handshake_response";

        let capability = data.checked_u32_le(method)?;
        if capability & CLIENT_PROTOCOL_41 == 0 {
            return Err(malformed(method, &data[..]));
        }

        let max_packet_size = data.checked_u32_le(method)?;
        let charset = data.checked_u8(method)?;

        // skip reserved 23[00]
        let _ = data.checked_bytes(23, method)?;

        // A bare SSL request ends here and has no user.
        let user = utf8(data.get_null_terminated(method)?, method)?;

        let auth_response = if capability & CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA > 0 {
            data.get_lenc_bytes(method)?.unwrap_or_default()
        } else if capability & CLIENT_SECURE_CONNECTION > 0 {
            let n = data.checked_u8(method)? as usize;
            data.checked_bytes(n, method)?
        } else {
            data.get_null_terminated(method)?
        };

        let mut database = None;
        if capability & CLIENT_CONNECT_WITH_DB > 0 && data.has_remaining() {
            let db = utf8(data.get_null_terminated(method)?, method)?;
            if !db.is_empty() {
                database = Some(db);
            }
        }

        let mut auth_plugin_name = None;
        if capability & CLIENT_PLUGIN_AUTH > 0 && data.has_remaining() {
            let name = utf8(data.get_null_terminated(method)?, method)?;
            if !name.is_empty() {
                auth_plugin_name = Some(name);
            }
        }

        // Connection attributes are not used.
        data.clear();

        Ok(AuthPacket { capability, max_packet_size, charset, user, auth_response, database, auth_plugin_name })
    }
}

fn utf8(data: Vec<u8>, method: &str) -> Result<String, ProtocolError> {
    String::from_utf8(data).map_err(|e| malformed(method, e.into_bytes()))
}
