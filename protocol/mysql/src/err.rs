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

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    #[error("method: {:?} invalid packet {:?}", .method, .data)]
    MalformedPacket { method: String, data: Vec<u8> },

    #[error("can not convert {value} to column type {column_type}")]
    Conversion { value: String, column_type: String },

    #[error("stdio error: {0:?}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    // Conversion errors only affect the current response, the frame
    // stream itself is still in sync.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ProtocolError::Conversion { .. })
    }
}
