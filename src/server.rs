//! WebSocket relay server: session registry, server-level hooks and the
//! TCP accept loop.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::registry::{ClientQuery, ConnectedClients, Outgoing, SessionRegistry};
use crate::session::{ClientSession, ErrorCallback, LifecycleCallback, MessageCallback};
use crate::topology::{
    FullDuplexConnection, HalfDuplexConnection, SimplexConnection, Topology,
};
use crate::transport::Transport;

/// Server-level subscribers. Read at dispatch time, so hooks registered
/// after a client connected still apply to it.
#[derive(Default)]
struct ServerHooks {
    connect: RwLock<Option<LifecycleCallback>>,
    disconnect: RwLock<Option<LifecycleCallback>>,
    message: RwLock<Option<MessageCallback>>,
    error: RwLock<Option<ErrorCallback>>,
    end: RwLock<Option<LifecycleCallback>>,
}

/// Accepts connections, tracks them and offers relay topologies over them.
///
/// Clones share the same registry and hooks.
///
/// ## Example
///
/// ```no_run
/// use wsrelay::{ServerConfig, WebSocketServer};
///
/// # async fn run() -> wsrelay::Result<()> {
/// let server = WebSocketServer::new(ServerConfig::default().with_port(9001));
/// server.on_client_message(|message, session| {
///     let _ = session.send(message);
/// });
/// let handle = server.listen().await?;
/// println!("listening on {}", handle.local_addr());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WebSocketServer {
    config: Arc<ServerConfig>,
    registry: SessionRegistry,
    hooks: Arc<ServerHooks>,
}

impl Default for WebSocketServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

impl WebSocketServer {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config: Arc::new(config),
            registry: SessionRegistry::new(),
            hooks: Arc::new(ServerHooks::default()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Called once a client completed its handshake.
    pub fn on_client_connect<F>(&self, callback: F) -> &Self
    where
        F: Fn(&ClientSession) + Send + Sync + 'static,
    {
        *self.hooks.connect.write() = Some(Arc::new(callback));
        self
    }

    /// Called after a client was removed from the registry.
    pub fn on_client_disconnect<F>(&self, callback: F) -> &Self
    where
        F: Fn(&ClientSession) + Send + Sync + 'static,
    {
        *self.hooks.disconnect.write() = Some(Arc::new(callback));
        self
    }

    /// Called with every message of every client.
    pub fn on_client_message<F>(&self, callback: F) -> &Self
    where
        F: Fn(&str, &ClientSession) + Send + Sync + 'static,
    {
        *self.hooks.message.write() = Some(Arc::new(callback));
        self
    }

    pub fn on_client_socket_error<F>(&self, callback: F) -> &Self
    where
        F: Fn(&Error, &ClientSession) + Send + Sync + 'static,
    {
        *self.hooks.error.write() = Some(Arc::new(callback));
        self
    }

    pub fn on_client_socket_end<F>(&self, callback: F) -> &Self
    where
        F: Fn(&ClientSession) + Send + Sync + 'static,
    {
        *self.hooks.end.write() = Some(Arc::new(callback));
        self
    }

    /// Wrap `transport` in a new session wired to the server hooks and add
    /// it to the registry.
    ///
    /// The session's connect, error and end slots are taken by the server.
    /// Registering on them directly replaces the server hook for that
    /// session.
    pub fn accept(&self, transport: Arc<dyn Transport>) -> ClientSession {
        let session = ClientSession::with_limits(transport, self.config.limits.clone());

        let hooks = self.hooks.clone();
        session.on_message(move |message, session| {
            let hook = hooks.message.read().clone();
            if let Some(hook) = hook {
                hook(message, session);
            }
        });

        let hooks = self.hooks.clone();
        session.on_error(move |error, session| {
            let hook = hooks.error.read().clone();
            if let Some(hook) = hook {
                hook(error, session);
            }
        });

        let hooks = self.hooks.clone();
        session.on_end(move |session| {
            let hook = hooks.end.read().clone();
            if let Some(hook) = hook {
                hook(session);
            }
        });

        let hooks = self.hooks.clone();
        session.on_connect(move |session| {
            let hook = hooks.connect.read().clone();
            if let Some(hook) = hook {
                hook(session);
            }
        });

        self.registry.add(session.clone());
        info!(
            session_id = %session.id(),
            peer = ?session.peer_addr(),
            clients = self.registry.len(),
            "client accepted"
        );
        session
    }

    /// Close `session` and remove it from the registry. The disconnect hook
    /// runs once, for sessions that were registered.
    pub fn disconnect(&self, session: &ClientSession) {
        session.handle_close();
        if !self.registry.remove(session) {
            return;
        }
        info!(
            session_id = %session.id(),
            clients = self.registry.len(),
            "client disconnected"
        );
        let hook = self.hooks.disconnect.read().clone();
        if let Some(hook) = hook {
            hook(session);
        }
    }

    /// Select connected clients.
    #[must_use]
    pub fn connected_clients(&self, query: ClientQuery) -> ConnectedClients {
        self.registry.query(query)
    }

    /// Send `message` to every client, or to those `filter` selects.
    /// Returns the number of clients written.
    pub fn broadcast(
        &self,
        message: &Outgoing,
        filter: Option<&dyn Fn(&ClientSession, usize) -> bool>,
    ) -> usize {
        self.registry.broadcast(message, filter)
    }

    /// Build a full-duplex topology over `sessions` and open its channels.
    ///
    /// # Errors
    ///
    /// Returns `Error::TopologyTooSmall` with fewer than two sessions.
    pub fn full_duplex_connection(
        &self,
        sessions: Vec<ClientSession>,
    ) -> Result<FullDuplexConnection> {
        let topology = FullDuplexConnection::new(sessions)?;
        topology.open_communication_channels();
        debug!(members = topology.members().len(), "full-duplex connection opened");
        Ok(topology)
    }

    /// Build a half-duplex topology over `sessions` and open its channels.
    ///
    /// # Errors
    ///
    /// Returns `Error::TopologyTooSmall` with fewer than two sessions.
    pub fn half_duplex_connection(
        &self,
        sessions: Vec<ClientSession>,
    ) -> Result<HalfDuplexConnection> {
        let topology = HalfDuplexConnection::new(sessions)?;
        topology.open_communication_channels();
        debug!(members = topology.members().len(), "half-duplex connection opened");
        Ok(topology)
    }

    /// Build a simplex topology from `announcer` to `receivers` and open its
    /// channels.
    pub fn simplex_connection(
        &self,
        announcer: ClientSession,
        receivers: Vec<ClientSession>,
    ) -> SimplexConnection {
        let topology = SimplexConnection::new(announcer, receivers);
        topology.open_communication_channels();
        debug!(receivers = topology.receivers().len(), "simplex connection opened");
        topology
    }
}

impl std::fmt::Debug for WebSocketServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketServer")
            .field("config", &self.config)
            .field("clients", &self.registry.len())
            .finish()
    }
}

#[cfg(feature = "async-tokio")]
mod listener {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use tokio::net::{TcpListener, TcpStream, lookup_host};
    use tokio::sync::Notify;
    use tokio::task::JoinHandle;
    use tracing::{debug, info, warn};

    use super::WebSocketServer;
    use crate::error::{Error, Result};
    use crate::transport::TcpTransport;

    /// Handle to a running accept loop.
    #[derive(Debug)]
    pub struct ServerHandle {
        local_addr: SocketAddr,
        stop: Arc<Notify>,
        task: JoinHandle<()>,
    }

    impl ServerHandle {
        /// Address the listener is bound to.
        #[must_use]
        pub fn local_addr(&self) -> SocketAddr {
            self.local_addr
        }

        /// Stop accepting, tear down every connected client and wait for
        /// the accept loop to finish.
        pub async fn shutdown(self) {
            self.stop.notify_one();
            if let Err(e) = self.task.await {
                warn!(error = %e, "accept loop did not finish cleanly");
            }
        }
    }

    impl WebSocketServer {
        /// Bind the configured address and start accepting clients.
        ///
        /// The address may be an IP literal or a host name. Resolved
        /// addresses are tried in order until one binds.
        ///
        /// # Errors
        ///
        /// - `Error::InvalidConfig` if the address does not resolve
        /// - `Error::Io` if no resolved address can be bound
        pub async fn listen(&self) -> Result<ServerHandle> {
            let listener = self.bind().await?;
            self.serve(listener)
        }

        async fn bind(&self) -> Result<TcpListener> {
            let address = self.config.address.as_str();
            let resolved = lookup_host((address, self.config.port))
                .await
                .map_err(|e| Error::InvalidConfig(format!("cannot resolve {address}: {e}")))?;

            let mut last_error = None;
            for addr in resolved {
                match TcpListener::bind(addr).await {
                    Ok(listener) => return Ok(listener),
                    Err(e) => {
                        debug!(%addr, error = %e, "bind failed, trying next address");
                        last_error = Some(e);
                    }
                }
            }
            Err(match last_error {
                Some(e) => e.into(),
                None => Error::InvalidConfig(format!("{address} resolved to no addresses")),
            })
        }

        /// Start accepting clients on an already bound listener.
        ///
        /// # Errors
        ///
        /// Returns `Error::Io` if the listener has no local address.
        pub fn serve(&self, listener: TcpListener) -> Result<ServerHandle> {
            let local_addr = listener.local_addr()?;
            let stop = Arc::new(Notify::new());
            let task = tokio::spawn(accept_loop(self.clone(), listener, stop.clone()));
            info!(%local_addr, "websocket server listening");
            Ok(ServerHandle {
                local_addr,
                stop,
                task,
            })
        }

        fn spawn_connection(&self, stream: TcpStream) {
            if let Err(e) = stream.set_nodelay(true) {
                warn!(error = %e, "failed to set TCP_NODELAY");
            }
            let (transport, reader) = TcpTransport::spawn(stream, self.config.read_buffer_size);
            let session = self.accept(transport);
            let server = self.clone();
            tokio::spawn(async move {
                reader.drive(&session).await;
                server.disconnect(&session);
            });
        }
    }

    async fn accept_loop(server: WebSocketServer, listener: TcpListener, stop: Arc<Notify>) {
        loop {
            tokio::select! {
                () = stop.notified() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _peer)) => server.spawn_connection(stream),
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                },
            }
        }

        for session in server.registry.snapshot() {
            session.destroy();
        }
        info!("websocket server stopped");
    }
}

#[cfg(feature = "async-tokio")]
pub use listener::ServerHandle;
