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
use mysql_protocol::{
    charset::{charset_name, collation_id, DEFAULT_COLLATION_ID},
    server::{
        auth::{next_connection_id, AuthPacket, HandshakePacket},
        packet::{OkPacket, ServerPacket},
        stream::PacketStream,
    },
};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info};
use xsql_error::error::{Error, ErrorKind};

use super::{
    auth::AuthHandler,
    command::{CommandHandler, Flow},
    metrics::MySqlServerMetricsCollector,
    registry::ConnectionRegistry,
    resultset::ResultEncoding,
};
use crate::session::{Session, SessionFactory};

/// State shared by every connection of a server.
#[derive(Clone)]
pub struct ServerContext {
    pub config: Arc<MySqlServerConfig>,
    pub factory: Arc<dyn SessionFactory>,
    pub registry: ConnectionRegistry,
    pub metrics: MySqlServerMetricsCollector,
}

impl ServerContext {
    pub fn new(config: MySqlServerConfig, factory: Arc<dyn SessionFactory>) -> Self {
        let metrics = MySqlServerMetricsCollector::new(&config.name);
        ServerContext { config: Arc::new(config), factory, registry: ConnectionRegistry::new(), metrics }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingAuth,
    Authenticated,
    Closed,
}

pub enum ActiveHandler {
    Auth(AuthHandler),
    Command(Box<CommandHandler>),
}

pub struct Connection<S> {
    id: u32,
    stream: PacketStream<S>,
    phase: Phase,
    handler: ActiveHandler,
    ctx: ServerContext,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an accepted transport and registers it under a fresh id.
    pub fn new(io: S, peer_addr: Option<SocketAddr>, ctx: ServerContext) -> Self {
        let id = next_connection_id();
        ctx.registry.register(id, peer_addr);
        ctx.metrics.set_connections_active_inc();

        Connection {
            id,
            stream: PacketStream::new(io, ctx.config.max_packet_size, ctx.config.write_buffer_size),
            phase: Phase::AwaitingAuth,
            handler: ActiveHandler::Auth(AuthHandler::new(ctx.factory.clone(), &ctx.config.default_db)),
            ctx,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Serves the connection until the client quits, the transport closes or
    /// a fatal error occurs, then closes it.
    pub async fn run(&mut self) -> Result<(), Error> {
        let res = self.serve().await;
        if let Err(err) = &res {
            error!("connection {} error: {}", self.id, err);
        }

        self.close().await;
        res
    }

    async fn serve(&mut self) -> Result<(), Error> {
        self.handshake().await?;

        loop {
            if self.phase == Phase::Authenticated {
                self.stream.reset_seq();
            }

            let frame = match self.stream.read_frame().await {
                Some(frame) => frame?,
                None => {
                    debug!("connection {} closed by peer", self.id);
                    return Ok(());
                }
            };

            let auth = match &mut self.handler {
                ActiveHandler::Auth(handler) => handler.authenticate(frame.payload).await,
                ActiveHandler::Command(handler) => {
                    match handler.handle(&mut self.stream, frame.payload).await? {
                        Flow::Continue => continue,
                        Flow::Quit => {
                            debug!("connection {} quit", self.id);
                            return Ok(());
                        }
                    }
                }
            };

            match auth {
                Ok((session, packet)) => self.authenticated(session, packet).await?,
                Err(err) => {
                    if let ErrorKind::Auth(e) = err.kind() {
                        self.stream.write_err(e).await?;
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn handshake(&mut self) -> Result<(), Error> {
        let charset = collation_id(&self.ctx.config.charset).unwrap_or(DEFAULT_COLLATION_ID);
        let packet = HandshakePacket::new(&self.ctx.config.server_version, self.id, charset);

        self.stream.send(ServerPacket::Handshake(packet)).await?;
        Ok(())
    }

    async fn authenticated(&mut self, session: Box<dyn Session>, packet: AuthPacket) -> Result<(), Error> {
        self.ctx.registry.set_user(self.id, &packet.user);
        self.stream.write_ok(OkPacket::default()).await?;

        let encoding = match charset_name(packet.charset) {
            Some(charset) => ResultEncoding { charset: Some(charset), collation_id: packet.charset },
            None => ResultEncoding { charset: None, collation_id: DEFAULT_COLLATION_ID },
        };
        let database = packet.database.clone().unwrap_or_else(|| self.ctx.config.default_db.clone());

        info!("connection {} authenticated, user {:?} db {:?}", self.id, packet.user, database);

        self.handler = ActiveHandler::Command(Box::new(CommandHandler::new(
            self.ctx.factory.clone(),
            session,
            packet,
            &database,
            encoding,
            self.ctx.metrics.clone(),
        )));
        self.phase = Phase::Authenticated;

        Ok(())
    }

    /// Idempotent. Shuts the transport down, closes the session and its
    /// statements and deregisters the connection.
    pub async fn close(&mut self) {
        if self.phase == Phase::Closed {
            return;
        }
        self.phase = Phase::Closed;

        if let Err(err) = self.stream.close().await {
            debug!("connection {} shutdown error: {}", self.id, err);
        }

        if let ActiveHandler::Command(handler) = &mut self.handler {
            handler.close();
        }

        self.ctx.registry.deregister(self.id);
        self.ctx.metrics.set_connections_active_dec();
        debug!("connection {} closed", self.id);
    }
}
