//! WebSocket World Server
//!
//! Async WebSocket front end over the [`WorldService`].
//! Routes client requests, pushes world events to every connection and
//! drives the simulation with a background tick loop.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::core::time::{Clock, SystemClock};
use crate::network::protocol::{ClientMessage, ErrorCode, ServerError, ServerMessage};
use crate::network::service::{ServiceError, WorldService};

/// Default location of the world snapshot.
pub const DEFAULT_STATE_PATH: &str = "/var/lib/bonfire/state.json";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// World snapshot file.
    pub state_path: PathBuf,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// How often the background loop asks the world to tick.
    pub tick_interval: Duration,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            max_connections: 1000,
            tick_interval: Duration::from_millis(1000),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables.
    ///
    /// Unset variables keep their defaults; unparsable ones are logged
    /// and ignored. A zero tick interval is ignored too.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_parse("BONFIRE_BIND_ADDR").unwrap_or(defaults.bind_addr),
            state_path: std::env::var("BONFIRE_STATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_path),
            max_connections: env_parse("BONFIRE_MAX_CONNECTIONS")
                .unwrap_or(defaults.max_connections),
            tick_interval: env_parse::<u64>("BONFIRE_TICK_INTERVAL_MS")
                .and_then(|ms| nonzero_interval("BONFIRE_TICK_INTERVAL_MS", ms))
                .unwrap_or(defaults.tick_interval),
            version: defaults.version,
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid {}={:?}", key, raw);
            None
        }
    }
}

/// `interval` panics on a zero period.
fn nonzero_interval(key: &str, ms: u64) -> Option<Duration> {
    if ms == 0 {
        warn!("Ignoring {}=0, the tick interval must be positive", key);
        None
    } else {
        Some(Duration::from_millis(ms))
    }
}

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum BonfireServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Connection time.
    connected_at: Instant,
    /// Last activity.
    last_activity: Instant,
}

/// The world server.
pub struct BonfireServer {
    /// Server configuration.
    config: ServerConfig,
    /// Shared world.
    world: Arc<WorldService>,
    /// Time source for pongs.
    clock: Arc<dyn Clock>,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl BonfireServer {
    /// Create a new server over an existing world.
    pub fn new(config: ServerConfig, world: Arc<WorldService>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            world,
            clock: Arc::new(SystemClock),
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Shared world handle.
    pub fn world(&self) -> &Arc<WorldService> {
        &self.world
    }

    /// Run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), BonfireServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Bonfire server listening on {}", self.config.bind_addr);

        let tick_world = self.world.clone();
        let tick_interval = self.config.tick_interval;
        let tick_handle = tokio::spawn(async move {
            Self::run_tick_loop(tick_world, tick_interval).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                tokio::spawn(Self::reject_overloaded(stream, addr));
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        tick_handle.abort();

        Ok(())
    }

    /// Tell a client over the connection limit why it is being dropped.
    async fn reject_overloaded(stream: TcpStream, addr: SocketAddr) {
        let mut ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                debug!("Handshake with rejected client {} failed: {}", addr, e);
                return;
            }
        };

        let reply = ServerMessage::Error(ServerError::new(
            ErrorCode::ServerOverloaded,
            "Too many connections",
        ));
        if let Ok(text) = reply.to_json() {
            let _ = ws_stream.send(Message::Text(text)).await;
        }
        let _ = ws_stream.close(None).await;
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let world = self.world.clone();
        let clock = self.clock.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);

            // Register client
            {
                let mut clients = clients.write().await;
                clients.insert(addr, ConnectedClient {
                    connected_at: Instant::now(),
                    last_activity: Instant::now(),
                });
            }

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
            });

            // Forward world events to this client
            let mut events = world.subscribe();
            let event_tx = msg_tx.clone();
            let event_task = tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => {
                            if event_tx.send(ServerMessage::Event { event }).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!("Client {} lagged, skipped {} events", addr, skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let reply = match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => {
                                        {
                                            let mut clients = clients.write().await;
                                            if let Some(client) = clients.get_mut(&addr) {
                                                client.last_activity = Instant::now();
                                            }
                                        }
                                        Self::handle_client_message(client_msg, &world, clock.as_ref()).await
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        ServerMessage::Error(ServerError::new(
                                            ErrorCode::InvalidInput,
                                            "Invalid message format",
                                        ))
                                    }
                                };
                                if msg_tx.send(reply).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Binary(_))) => {
                                let _ = msg_tx.send(ServerMessage::Error(ServerError::new(
                                    ErrorCode::UnsupportedFormat,
                                    "Binary frames are not supported",
                                ))).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup
            event_task.abort();
            drop(msg_tx);
            // Let queued replies (including a shutdown notice) flush
            let _ = sender_task.await;

            let removed = clients.write().await.remove(&addr);
            if let Some(client) = removed {
                info!(
                    "Client {} cleaned up after {:?} (idle {:?})",
                    addr,
                    client.connected_at.elapsed(),
                    client.last_activity.elapsed()
                );
            }
        });
    }

    /// Route one client request to the world.
    async fn handle_client_message(
        msg: ClientMessage,
        world: &WorldService,
        clock: &dyn Clock,
    ) -> ServerMessage {
        match msg {
            ClientMessage::GetState => ServerMessage::State {
                state: world.get_state().await,
            },
            ClientMessage::Action { user_id, action } => {
                match world.perform_action(&user_id, &action).await {
                    Ok(outcome) => ServerMessage::ActionResult(outcome),
                    Err(e) => error_reply(e),
                }
            }
            ClientMessage::Chat { user_id, message } => {
                match world.add_chat_message(&user_id, &message).await {
                    Ok(()) => ServerMessage::ChatAccepted,
                    Err(e) => error_reply(e),
                }
            }
            ClientMessage::Tick => match world.advance_tick().await {
                Ok(outcome) => ServerMessage::Ticked {
                    advanced: outcome.advanced(),
                },
                Err(e) => error_reply(e),
            },
            ClientMessage::Leaderboard { action } => match world.leaderboard(&action).await {
                Ok(entries) => ServerMessage::Leaderboard { action, entries },
                Err(e) => error_reply(e),
            },
            ClientMessage::Ping { timestamp } => ServerMessage::Pong {
                timestamp,
                server_time: clock.now(),
            },
        }
    }

    /// Run the background tick loop.
    async fn run_tick_loop(world: Arc<WorldService>, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = world.advance_tick().await {
                error!("Tick failed: {}", e);
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

/// Map a service failure to a wire error.
fn error_reply(err: ServiceError) -> ServerMessage {
    let code = match &err {
        ServiceError::Store(_) => ErrorCode::StorageFailed,
        ServiceError::UnknownAction(_) => ErrorCode::UnknownAction,
        ServiceError::InvalidUser | ServiceError::Chat(_) => ErrorCode::InvalidInput,
    };
    ServerMessage::Error(ServerError::new(code, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    use crate::core::time::ManualClock;
    use crate::game::GameConfig;
    use crate::store::SnapshotStore;

    fn test_world(prefix: &str) -> Arc<WorldService> {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("duration")
            .as_nanos();
        let path = std::env::temp_dir()
            .join(format!("bonfire-server-tests-{prefix}-{unique}"))
            .join("state.json");
        Arc::new(WorldService::new(
            SnapshotStore::new(path),
            Arc::new(ManualClock::new(1_700_000_000_000)),
            GameConfig::default(),
        ))
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.tick_interval, Duration::from_millis(1000));
        assert_eq!(config.state_path, PathBuf::from(DEFAULT_STATE_PATH));
    }

    #[test]
    fn test_zero_tick_interval_is_ignored() {
        assert_eq!(nonzero_interval("BONFIRE_TICK_INTERVAL_MS", 0), None);
        assert_eq!(
            nonzero_interval("BONFIRE_TICK_INTERVAL_MS", 250),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_from_env_falls_back_on_zero_interval() {
        std::env::set_var("BONFIRE_TICK_INTERVAL_MS", "0");
        let config = ServerConfig::from_env();
        std::env::remove_var("BONFIRE_TICK_INTERVAL_MS");

        assert_eq!(config.tick_interval, Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_overloaded_client_gets_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, peer) = listener.accept().await.unwrap();
            BonfireServer::reject_overloaded(stream, peer).await;
        });

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();
        match ws.next().await {
            Some(Ok(Message::Text(text))) => match ServerMessage::from_json(&text).unwrap() {
                ServerMessage::Error(err) => assert_eq!(err.code, ErrorCode::ServerOverloaded),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = BonfireServer::new(config, test_world("create"));

        assert_eq!(server.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = BonfireServer::new(config, test_world("shutdown"));
        server.shutdown();
        // Should not panic
    }

    #[tokio::test]
    async fn test_route_action_and_state() {
        let world = test_world("route");
        let clock = ManualClock::new(0);

        let reply = BonfireServer::handle_client_message(
            ClientMessage::Action { user_id: "kai".into(), action: "chop".into() },
            &world,
            &clock,
        )
        .await;
        assert!(matches!(reply, ServerMessage::ActionResult(ref o) if o.success));

        let reply = BonfireServer::handle_client_message(ClientMessage::GetState, &world, &clock).await;
        match reply {
            ServerMessage::State { state } => assert_eq!(state.wood_storage, 105),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_route_errors() {
        let world = test_world("route-errors");
        let clock = ManualClock::new(0);

        let reply = BonfireServer::handle_client_message(
            ClientMessage::Chat { user_id: "".into(), message: "hi".into() },
            &world,
            &clock,
        )
        .await;
        assert!(matches!(reply, ServerMessage::Error(ref e) if e.code == ErrorCode::InvalidInput));

        let reply = BonfireServer::handle_client_message(
            ClientMessage::Leaderboard { action: "swim".into() },
            &world,
            &clock,
        )
        .await;
        assert!(matches!(reply, ServerMessage::Error(ref e) if e.code == ErrorCode::UnknownAction));
    }

    #[tokio::test]
    async fn test_route_ping() {
        let world = test_world("ping");
        let clock = ManualClock::new(77);

        let reply = BonfireServer::handle_client_message(
            ClientMessage::Ping { timestamp: 5 },
            &world,
            &clock,
        )
        .await;
        assert!(matches!(reply, ServerMessage::Pong { timestamp: 5, server_time: 77 }));
    }
}
