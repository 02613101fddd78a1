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

pub const DEFAULT_XSQL_LOG_LEVEL: &str = "INFO";
pub const DEFAULT_XSQL_MYSQL_LISTEN_ADDR: &str = "0.0.0.0:3306";
pub const DEFAULT_XSQL_MYSQL_DEFAULT_DB: &str = "test";

pub const ENV_XSQL_CONFIG: &str = "XSQL_CONFIG";
pub const ENV_XSQL_LOG_LEVEL: &str = "XSQL_LOG_LEVEL";
pub const ENV_XSQL_MYSQL_LISTEN_ADDR: &str = "XSQL_MYSQL_LISTEN_ADDR";
pub const ENV_XSQL_MYSQL_DEFAULT_DB: &str = "XSQL_MYSQL_DEFAULT_DB";
pub const ENV_XSQL_MYSQL_MAX_PACKET_SIZE: &str = "XSQL_MYSQL_MAX_PACKET_SIZE";
