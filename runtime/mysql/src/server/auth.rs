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

use std::sync::Arc;

use bytes::BytesMut;
use mysql_protocol::{server::auth::AuthPacket, server::err::MySQLError};
use tracing::{debug, error};
use xsql_error::error::{Error, ErrorKind};

use crate::session::{ConnectionInfo, Session, SessionFactory};

/// Handles the single client frame of the auth phase.
pub struct AuthHandler {
    factory: Arc<dyn SessionFactory>,
    default_db: String,
}

impl AuthHandler {
    pub fn new(factory: Arc<dyn SessionFactory>, default_db: &str) -> Self {
        AuthHandler { factory, default_db: default_db.to_string() }
    }

    /// Decodes the handshake response and opens a session for it.
    ///
    /// A frame that is not a handshake response is a fatal protocol error.
    /// A rejected session is returned as `ErrorKind::Auth` carrying the
    /// engine's error.
    pub async fn authenticate(
        &self,
        mut payload: BytesMut,
    ) -> Result<(Box<dyn Session>, AuthPacket), Error> {
        let packet = AuthPacket::decode(&mut payload)?;
        let db = packet.database.clone().unwrap_or_else(|| self.default_db.clone());

        debug!("auth user {:?} db {:?} charset {}", packet.user, db, packet.charset);

        match create_session(self.factory.as_ref(), &packet, &db).await {
            Ok(session) => Ok((session, packet)),
            Err(err) => {
                error!("create session for user {:?} error: {}", packet.user, err);
                Err(Error::new(ErrorKind::Auth(err)))
            }
        }
    }
}

// The client scramble can not be checked against the engine's credentials,
// so every response is accepted and an empty password forwarded.
fn password(_packet: &AuthPacket) -> String {
    String::new()
}

pub fn connection_info(packet: &AuthPacket, db: &str) -> ConnectionInfo {
    ConnectionInfo::new(db, &packet.user, &password(packet))
}

pub async fn create_session(
    factory: &dyn SessionFactory,
    packet: &AuthPacket,
    db: &str,
) -> Result<Box<dyn Session>, MySQLError> {
    factory.create_session(&connection_info(packet, db)).await
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::BytesMut;
    use mysql_protocol::{
        mysql_const::*,
        server::{auth::AuthPacket, err::MySQLError},
        value::Value,
    };
    use parking_lot::Mutex;
    use xsql_error::error::ErrorKind;

    use super::AuthHandler;
    use crate::session::*;

    struct NoopSession;

    #[async_trait]
    impl Session for NoopSession {
        fn prepare(&mut self, _sql: &str) -> Result<Box<dyn PreparedStatement>, MySQLError> {
            Err(MySQLError::unknown("not supported"))
        }

        async fn execute_query(
            &mut self,
            _stmt: &dyn PreparedStatement,
            _params: &[Value],
            _max_rows: i64,
        ) -> Result<Box<dyn QueryResult>, MySQLError> {
            Err(MySQLError::unknown("not supported"))
        }

        async fn execute_update(
            &mut self,
            _stmt: &dyn PreparedStatement,
            _params: &[Value],
        ) -> Result<u64, MySQLError> {
            Ok(0)
        }

        fn close(&mut self) {}
    }

    #[derive(Default)]
    struct Factory {
        seen: Mutex<Vec<ConnectionInfo>>,
    }

    #[async_trait]
    impl SessionFactory for Factory {
        async fn create_session(&self, info: &ConnectionInfo) -> Result<Box<dyn Session>, MySQLError> {
            self.seen.lock().push(info.clone());
            if info.user == "denied" {
                return Err(MySQLError::new(
                    ER_ACCESS_DENIED_ERROR,
                    SQL_STATE_ACCESS_DENIED,
                    "Access denied for user 'denied'",
                ));
            }
            Ok(Box::new(NoopSession))
        }
    }

    fn auth_payload(user: &str, db: Option<&str>) -> BytesMut {
        let mut capability = CLIENT_PROTOCOL_41 | CLIENT_SECURE_CONNECTION | CLIENT_PLUGIN_AUTH;
        if db.is_some() {
            capability |= CLIENT_CONNECT_WITH_DB;
        }

        let packet = AuthPacket {
            capability,
            max_packet_size: 1 << 24,
            charset: 33,
            user: user.to_string(),
            auth_response: vec![1; 20],
            database: db.map(|s| s.to_string()),
            auth_plugin_name: Some(AUTH_NATIVE_PASSWORD.to_string()),
        };

        let mut buf = BytesMut::new();
        packet.encode(&mut buf);
        buf
    }

    #[tokio::test]
    async fn test_authenticate() {
        let factory = Arc::new(Factory::default());
        let handler = AuthHandler::new(factory.clone(), "test");

        let (_, packet) = handler.authenticate(auth_payload("root", Some("shop"))).await.unwrap();
        assert_eq!(packet.user, "root");

        handler.authenticate(auth_payload("root", None)).await.unwrap();

        let seen = factory.seen.lock();
        assert_eq!(seen[0], ConnectionInfo::new("shop", "root", ""));
        assert_eq!(seen[0].mode, "MySQL");
        assert_eq!(seen[1].database, "test");
    }

    #[tokio::test]
    async fn test_authenticate_denied() {
        let handler = AuthHandler::new(Arc::new(Factory::default()), "test");

        let err = handler.authenticate(auth_payload("denied", None)).await.err().unwrap();
        assert!(err.is_fatal());
        match err.kind() {
            ErrorKind::Auth(e) => assert_eq!(e.code, ER_ACCESS_DENIED_ERROR),
            kind => panic!("unexpected error {:?}", kind),
        }
    }

    #[tokio::test]
    async fn test_authenticate_malformed() {
        let handler = AuthHandler::new(Arc::new(Factory::default()), "test");

        let err = handler.authenticate(BytesMut::from(&[0x0f, 0x00][..])).await.err().unwrap();
        assert!(matches!(err.kind(), ErrorKind::Protocol(_)));
        assert!(err.is_fatal());
    }
}
