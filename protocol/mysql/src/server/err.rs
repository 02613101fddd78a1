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

use std::fmt;

use crate::mysql_const::{ER_UNKNOWN_ERROR, SQL_STATE_GENERAL};

/// An error reported to the client: code, 5 byte SQL state and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySQLError {
    pub code: u16,
    pub state: String,
    pub msg: String,
}

impl MySQLError {
    pub fn new<S: Into<String>, M: Into<String>>(code: u16, state: S, msg: M) -> MySQLError {
        MySQLError { code, state: state.into(), msg: msg.into() }
    }

    pub fn unknown<M: Into<String>>(msg: M) -> MySQLError {
        MySQLError::new(ER_UNKNOWN_ERROR, SQL_STATE_GENERAL, msg)
    }
}

impl fmt::Display for MySQLError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.state, self.msg)
    }
}

impl std::error::Error for MySQLError {}
