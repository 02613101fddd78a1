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

use std::{net::SocketAddr, sync::Arc};

use config::config::MySqlServerConfig;
use tokio::net::TcpListener;
use tracing::{error, info, info_span};
use tracing_futures::Instrument;
use xsql_error::error::{Error, ErrorKind};

use super::{
    conn::{Connection, ServerContext},
    registry::ConnectionRegistry,
};
use crate::session::SessionFactory;

pub struct MySqlServerBuilder {
    _config: MySqlServerConfig,
    _factory: Arc<dyn SessionFactory>,
}

impl MySqlServerBuilder {
    pub fn new(factory: Arc<dyn SessionFactory>) -> MySqlServerBuilder {
        MySqlServerBuilder { _config: MySqlServerConfig::default(), _factory: factory }
    }

    pub fn with_config(mut self, config: MySqlServerConfig) -> MySqlServerBuilder {
        self._config = config;
        self
    }

    pub fn with_listen_addr(mut self, addr: &str) -> MySqlServerBuilder {
        self._config.listen_addr = addr.to_string();
        self
    }

    /// Binds the listen address.
    pub async fn build(self) -> Result<MySqlServer, Error> {
        let listener = TcpListener::bind(&self._config.listen_addr).await.map_err(ErrorKind::Io)?;
        Ok(MySqlServer { ctx: ServerContext::new(self._config, self._factory), listener })
    }
}

pub struct MySqlServer {
    ctx: ServerContext,
    listener: TcpListener,
}

impl MySqlServer {
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> ConnectionRegistry {
        self.ctx.registry.clone()
    }

    /// Accepts clients until the listener fails, one task per connection.
    pub async fn start(self) -> Result<(), Error> {
        info!("{} server listening on {}", self.ctx.config.name, self.local_addr()?);

        loop {
            let (socket, peer_addr) = self.listener.accept().await.map_err(ErrorKind::Io)?;
            if let Err(err) = socket.set_nodelay(true) {
                error!("set nodelay for {} error: {}", peer_addr, err);
            }

            let mut conn = Connection::new(socket, Some(peer_addr), self.ctx.clone());
            let span = info_span!("connection", id = conn.id(), peer = %peer_addr);

            tokio::spawn(
                async move {
                    // errors are logged by the connection
                    let _ = conn.run().await;
                }
                .instrument(span),
            );
        }
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use bytes::BytesMut;
    use mysql_protocol::server::{auth::HandshakePacket, err::MySQLError};
    use tokio::{io::AsyncReadExt, net::TcpStream};

    use super::MySqlServerBuilder;
    use crate::session::{ConnectionInfo, Session, SessionFactory};

    struct Closed;

    #[async_trait]
    impl SessionFactory for Closed {
        async fn create_session(&self, _info: &ConnectionInfo) -> Result<Box<dyn Session>, MySQLError> {
            Err(MySQLError::unknown("closed"))
        }
    }

    #[tokio::test]
    async fn test_accept_registers_connection() {
        let server =
            MySqlServerBuilder::new(Arc::new(Closed)).with_listen_addr("127.0.0.1:0").build().await.unwrap();
        let addr = server.local_addr().unwrap();
        let registry = server.registry();
        tokio::spawn(server.start());

        let mut client = TcpStream::connect(addr).await.unwrap();

        let mut header = [0u8; 4];
        client.read_exact(&mut header).await.unwrap();
        assert_eq!(header[3], 0);

        let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
        let mut payload = vec![0u8; len];
        client.read_exact(&mut payload).await.unwrap();
        let handshake = HandshakePacket::decode(&mut BytesMut::from(&payload[..])).unwrap();
        assert_eq!(handshake.server_version, "5.7.37-xsql");

        assert_eq!(registry.len(), 1);
        let entry = registry.get(handshake.connection_id).unwrap();
        assert_eq!(entry.peer_addr, Some(client.local_addr().unwrap()));
        assert_eq!(entry.user, None);

        // the peer leaving ends the connection
        drop(client);
        for _ in 0..200 {
            if registry.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_build_bad_address() {
        let res = MySqlServerBuilder::new(Arc::new(Closed)).with_listen_addr("not an address").build().await;
        assert!(res.is_err());
    }
}
