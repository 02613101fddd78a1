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

//! Character set handling for text sent to the client.
//!
//! Clients announce a collation id in the handshake response. Strings are
//! encoded in that collation's charset when it is known, otherwise in UTF-8.
//! A value that the requested charset cannot represent also falls back to
//! UTF-8, so encoding never fails.

use std::collections::HashMap;

pub const DEFAULT_CHARSET: &str = "utf8";
pub const DEFAULT_COLLATION_ID: u8 = 33;
pub const BINARY_COLLATION_ID: u8 = 63;

lazy_static! {
    static ref COLLATIONS: HashMap<u8, &'static str> = {
        let mut m = HashMap::new();
        m.insert(8, "latin1");
        m.insert(11, "ascii");
        m.insert(28, "gbk");
        m.insert(33, "utf8");
        m.insert(45, "utf8mb4");
        m.insert(46, "utf8mb4");
        m.insert(47, "latin1");
        m.insert(48, "latin1");
        m.insert(63, "binary");
        m.insert(65, "ascii");
        m.insert(76, "utf8");
        m.insert(83, "utf8");
        m.insert(87, "gbk");
        m.insert(192, "utf8");
        m.insert(224, "utf8mb4");
        m.insert(255, "utf8mb4");
        m
    };
}

/// Charset name of a collation id, `None` for ids this server does not know.
pub fn charset_name(collation_id: u8) -> Option<&'static str> {
    COLLATIONS.get(&collation_id).copied()
}

/// Default collation id of a charset name.
pub fn collation_id(charset: &str) -> Option<u8> {
    match charset.to_ascii_lowercase().as_str() {
        "utf8" | "utf8mb3" => Some(33),
        "utf8mb4" => Some(45),
        "latin1" => Some(8),
        "ascii" => Some(11),
        "gbk" => Some(28),
        "binary" => Some(63),
        _ => None,
    }
}

pub fn encode_string(s: &str, charset: Option<&str>) -> Vec<u8> {
    let charset = charset.unwrap_or(DEFAULT_CHARSET).to_ascii_lowercase();
    match charset.as_str() {
        "latin1" => encode_single_byte(s, 0xff).unwrap_or_else(|| s.as_bytes().to_vec()),
        "ascii" => encode_single_byte(s, 0x7f).unwrap_or_else(|| s.as_bytes().to_vec()),
        _ => s.as_bytes().to_vec(),
    }
}

fn encode_single_byte(s: &str, max: u32) -> Option<Vec<u8>> {
    s.chars()
        .map(|c| {
            let code = c as u32;
            if code <= max {
                Some(code as u8)
            } else {
                None
            }
        })
        .collect()
}
