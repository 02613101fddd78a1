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

use std::{env, fs::File, io::prelude::*};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::env_const::*;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path:?} error: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("parse config error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

#[derive(Default, Clone)]
pub struct XsqlConfigBuilder {
    pub _config_path: String,
    pub _log_level: String,
    pub _listen_addr: String,
    pub _default_db: String,
    pub _max_packet_size: String,
}

impl XsqlConfigBuilder {
    pub fn new() -> Self {
        XsqlConfigBuilder::default()
    }

    pub fn build_from_file(&self, path: &str) -> Result<XsqlConfig, ConfigError> {
        let mut file =
            File::open(path).map_err(|e| ConfigError::Io { path: path.to_string(), source: e })?;

        let mut config_str = String::new();
        file.read_to_string(&mut config_str)
            .map_err(|e| ConfigError::Io { path: path.to_string(), source: e })?;

        XsqlConfig::from_toml(&config_str)
    }

    pub fn build_from_env(mut self) -> Self {
        self._config_path = env::var(ENV_XSQL_CONFIG).unwrap_or_default();
        self._log_level = env::var(ENV_XSQL_LOG_LEVEL).unwrap_or_default();
        self._listen_addr = env::var(ENV_XSQL_MYSQL_LISTEN_ADDR).unwrap_or_default();
        self._default_db = env::var(ENV_XSQL_MYSQL_DEFAULT_DB).unwrap_or_default();
        self._max_packet_size = env::var(ENV_XSQL_MYSQL_MAX_PACKET_SIZE).unwrap_or_default();
        self
    }

    /// Applies the non empty builder values on top of `config`.
    pub fn apply(&self, config: &mut XsqlConfig) -> Result<(), ConfigError> {
        if !self._log_level.is_empty() {
            config.admin.log_level = self._log_level.clone();
        }
        if !self._listen_addr.is_empty() {
            config.mysql.listen_addr = self._listen_addr.clone();
        }
        if !self._default_db.is_empty() {
            config.mysql.default_db = self._default_db.clone();
        }
        if !self._max_packet_size.is_empty() {
            config.mysql.max_packet_size = self._max_packet_size.parse::<usize>().map_err(|_| {
                ConfigError::InvalidValue {
                    key: ENV_XSQL_MYSQL_MAX_PACKET_SIZE.to_string(),
                    value: self._max_packet_size.clone(),
                }
            })?;
        }
        Ok(())
    }

    /// Loads the config file named by `XSQL_CONFIG` (defaults when unset)
    /// and applies the environment overrides.
    pub fn load_config(self) -> Result<XsqlConfig, ConfigError> {
        let env_builder = self.build_from_env();

        let mut config = if env_builder._config_path.is_empty() {
            XsqlConfig::default()
        } else {
            env_builder.build_from_file(&env_builder._config_path)?
        };

        env_builder.apply(&mut config)?;

        trace!("configs: {:#?}", config);
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct XsqlConfig {
    #[serde(default)]
    pub admin: Admin,
    #[serde(default)]
    pub mysql: MySqlServerConfig,
}

impl XsqlConfig {
    pub fn from_toml(s: &str) -> Result<XsqlConfig, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn get_admin(&self) -> &Admin {
        &self.admin
    }

    pub fn get_mysql(&self) -> &MySqlServerConfig {
        &self.mysql
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Admin {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Admin {
    fn default() -> Self {
        Admin { log_level: default_log_level() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MySqlServerConfig {
    #[serde(default = "default_mysql_name")]
    pub name: String,
    #[serde(default = "default_mysql_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_mysql_server_version")]
    pub server_version: String,
    #[serde(default = "default_mysql_db")]
    pub default_db: String,
    #[serde(default = "default_mysql_charset")]
    pub charset: String,
    #[serde(default = "default_mysql_max_packet_size")]
    pub max_packet_size: usize,
    #[serde(default = "default_mysql_write_buffer_size")]
    pub write_buffer_size: usize,
}

impl Default for MySqlServerConfig {
    fn default() -> Self {
        MySqlServerConfig {
            name: default_mysql_name(),
            listen_addr: default_mysql_listen_addr(),
            server_version: default_mysql_server_version(),
            default_db: default_mysql_db(),
            charset: default_mysql_charset(),
            max_packet_size: default_mysql_max_packet_size(),
            write_buffer_size: default_mysql_write_buffer_size(),
        }
    }
}

fn default_log_level() -> String {
    DEFAULT_XSQL_LOG_LEVEL.into()
}

fn default_mysql_name() -> String {
    "mysql".into()
}

fn default_mysql_listen_addr() -> String {
    DEFAULT_XSQL_MYSQL_LISTEN_ADDR.into()
}

fn default_mysql_server_version() -> String {
    "5.7.37-xsql".into()
}

fn default_mysql_db() -> String {
    DEFAULT_XSQL_MYSQL_DEFAULT_DB.into()
}

fn default_mysql_charset() -> String {
    "utf8".into()
}

fn default_mysql_max_packet_size() -> usize {
    16 * 1024 * 1024
}

fn default_mysql_write_buffer_size() -> usize {
    16 * 1024
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = XsqlConfig::from_toml("").unwrap();
        assert_eq!(config, XsqlConfig::default());
        assert_eq!(config.mysql.listen_addr, "0.0.0.0:3306");
        assert_eq!(config.mysql.write_buffer_size, 16384);
        assert_eq!(config.admin.log_level, "INFO");
    }

    #[test]
    fn test_parse_config() {
        let s = r#"
            [admin]
            log_level = "DEBUG"

            [mysql]
            listen_addr = "127.0.0.1:9306"
            default_db = "shop"
            max_packet_size = 1024
        "#;

        let config = XsqlConfig::from_toml(s).unwrap();
        assert_eq!(config.admin.log_level, "DEBUG");
        assert_eq!(config.mysql.listen_addr, "127.0.0.1:9306");
        assert_eq!(config.mysql.default_db, "shop");
        assert_eq!(config.mysql.max_packet_size, 1024);
        assert_eq!(config.mysql.charset, "utf8");
    }

    #[test]
    fn test_parse_invalid_config() {
        assert!(XsqlConfig::from_toml("[mysql]\nmax_packet_size = \"big\"").is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let builder = XsqlConfigBuilder {
            _listen_addr: "127.0.0.1:3307".to_string(),
            _max_packet_size: "2048".to_string(),
            ..Default::default()
        };

        let mut config = XsqlConfig::default();
        builder.apply(&mut config).unwrap();
        assert_eq!(config.mysql.listen_addr, "127.0.0.1:3307");
        assert_eq!(config.mysql.max_packet_size, 2048);
        assert_eq!(config.mysql.default_db, "test");

        let builder = XsqlConfigBuilder { _max_packet_size: "x".to_string(), ..Default::default() };
        assert!(builder.apply(&mut config).is_err());
    }

    #[test]
    fn test_build_from_missing_file() {
        let builder = XsqlConfigBuilder::new();
        assert!(builder.build_from_file("/nonexistent/xsql.toml").is_err());
    }
}
