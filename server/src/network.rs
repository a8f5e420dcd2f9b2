//! UDP transport and the scheduler that owns the world.
//!
//! One JSON message per datagram. A receiver task decodes datagrams and
//! forwards them to the main loop, a sender task drains the outbound queue
//! (the only writer to the socket), and a timeout task sweeps silent
//! sessions. The main loop owns the [`GameState`] and multiplexes inbound
//! messages with the simulation, broadcast and autosave intervals.

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::entity::SessionId;
use crate::game::{GameState, Outbound, Recipient};
use crate::persistence::SnapshotStore;
use crate::utils::get_timestamp;
use log::{debug, error, info, warn};
use shared::{decode, Inbound, ServerEvent};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};

/// Messages sent from network tasks to the main loop
#[derive(Debug)]
pub enum ServerMessage {
    Received { inbound: Inbound, addr: SocketAddr },
    ClientTimeout { session: SessionId },
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    Send { event: ServerEvent, addr: SocketAddr },
    Broadcast { event: ServerEvent },
}

pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game: GameState,
    config: ServerConfig,
    store: Arc<SnapshotStore>,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        config: ServerConfig,
        game: GameState,
        store: SnapshotStore,
    ) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            game,
            config,
            store: Arc::new(store),
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; 8192];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode(&buffer[..len]) {
                        Ok(inbound) => {
                            if server_tx
                                .send(ServerMessage::Received { inbound, addr })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping datagram from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::Send { event, addr } => {
                        if let Err(e) = send_event(&socket, &event, addr).await {
                            error!("Failed to send to {}: {}", addr, e);
                        }
                    }
                    GameMessage::Broadcast { event } => {
                        let client_addrs = clients.read().await.get_client_addrs();
                        for (session, addr) in client_addrs {
                            if let Err(e) = send_event(&socket, &event, addr).await {
                                error!("Failed to send to {}: {}", session, e);
                            }
                        }
                    }
                }
            }
        });
    }

    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let timeout = self.config.session_timeout;

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = clients.write().await.check_timeouts(timeout);
                for session in timed_out {
                    info!("Session {} timed out", session);
                    if server_tx
                        .send(ServerMessage::ClientTimeout { session })
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    fn queue(&self, message: GameMessage) {
        if let Err(e) = self.game_tx.send(message) {
            error!("Failed to queue outbound event: {}", e);
        }
    }

    /// Routes world events to their recipients.
    async fn dispatch(&self, outbound: Vec<Outbound>) {
        if outbound.is_empty() {
            return;
        }
        let clients = self.clients.read().await;
        for Outbound { to, event } in outbound {
            match to {
                Recipient::All => self.queue(GameMessage::Broadcast { event }),
                Recipient::Session(session) => match clients.addr_of(&session) {
                    Some(addr) => self.queue(GameMessage::Send { event, addr }),
                    None => debug!("No address for session {}", session),
                },
            }
        }
    }

    async fn handle_inbound(&mut self, inbound: Inbound, addr: SocketAddr) {
        if let Inbound::Connect { name } = inbound {
            let admitted = self.clients.write().await.add_client(addr, name);
            match admitted {
                Ok(session) => {
                    let sync = self.game.connect(&session);
                    self.dispatch(sync).await;
                }
                Err(e) => {
                    info!("Rejected connection from {}: {}", addr, e);
                    self.queue(GameMessage::Send {
                        event: ServerEvent::Rejected {
                            reason: e.to_string(),
                        },
                        addr,
                    });
                }
            }
            return;
        }

        let session = {
            let mut clients = self.clients.write().await;
            let session = clients.find_client_by_addr(addr);
            if let Some(session) = &session {
                clients.touch(session);
            }
            session
        };
        let Some(session) = session else {
            debug!("Ignoring datagram from unknown address {}", addr);
            return;
        };

        match inbound {
            Inbound::Connect { .. } | Inbound::Heartbeat => {}
            Inbound::Disconnect => {
                self.clients.write().await.remove_client(&session);
                self.game.disconnect(&session);
            }
            Inbound::Action(action) => {
                let outbound = self.game.handle_action(&session, action, get_timestamp());
                self.dispatch(outbound).await;
            }
        }
    }

    async fn broadcast_world(&self) {
        if self.clients.read().await.is_empty() {
            return;
        }
        self.dispatch(self.game.broadcast()).await;
    }

    /// Saves in the background so the loop never waits on disk.
    fn spawn_save(&self) {
        let snapshot = self.game.snapshot(get_timestamp());
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = store.save(&snapshot) {
                error!("Autosave failed: {}", e);
            }
        });
    }

    async fn final_save(&self) {
        let snapshot = self.game.snapshot(get_timestamp());
        let store = Arc::clone(&self.store);
        match tokio::task::spawn_blocking(move || store.save(&snapshot)).await {
            Ok(Ok(())) => info!("Final snapshot saved"),
            Ok(Err(e)) => error!("Final save failed: {}", e),
            Err(e) => error!("Final save task failed: {}", e),
        }
    }

    /// Main server loop. Returns after Ctrl-C, once the final save is done.
    pub async fn run(&mut self) -> io::Result<()> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut sim_interval = interval(self.config.sim_tick);
        sim_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut broadcast_interval = interval(self.config.broadcast_tick);
        broadcast_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let save_every = self.config.save_interval;
        let mut save_interval = interval_at(Instant::now() + save_every, save_every);
        save_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Received { inbound, addr }) => {
                            self.handle_inbound(inbound, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { session }) => {
                            self.game.disconnect(&session);
                        },
                        None => break,
                    }
                },

                _ = sim_interval.tick() => {
                    self.game.step(get_timestamp());

                    if self.game.tick % 200 == 0 {
                        debug!(
                            "Tick {}: {} players, {} monsters, {} objects",
                            self.game.tick,
                            self.game.players.len(),
                            self.game.monsters.len(),
                            self.game.objects.len()
                        );
                    }
                },

                _ = broadcast_interval.tick() => {
                    self.broadcast_world().await;
                },

                _ = save_interval.tick() => {
                    self.spawn_save();
                },

                result = &mut shutdown => {
                    if let Err(e) = result {
                        error!("Failed to listen for shutdown signal: {}", e);
                    }
                    info!("Server shutting down");
                    break;
                },
            }
        }

        self.final_save().await;
        Ok(())
    }
}

async fn send_event(socket: &UdpSocket, event: &ServerEvent, addr: SocketAddr) -> io::Result<()> {
    let data = serde_json::to_vec(event)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use serde_json::Value;
    use shared::Terrain;
    use std::path::PathBuf;

    fn scratch_store(name: &str) -> SnapshotStore {
        let path: PathBuf = std::env::temp_dir().join(format!(
            "wildgrove-network-{}-{}-{}.json",
            name,
            std::process::id(),
            get_timestamp()
        ));
        SnapshotStore::new(path)
    }

    async fn start(name: &str, max_clients: usize) -> SocketAddr {
        let config = ServerConfig {
            max_clients,
            ..ServerConfig::default()
        };
        let game = GameState::new(Terrain::default(), Tuning::default(), Some(1));
        let mut server = Server::new("127.0.0.1:0", config, game, scratch_store(name))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr
    }

    async fn recv_json(socket: &UdpSocket) -> Value {
        let mut buffer = vec![0u8; 65536];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .expect("timed out waiting for a datagram")
            .unwrap();
        serde_json::from_slice(&buffer[..len]).unwrap()
    }

    /// Next datagram that is not a periodic position update.
    async fn recv_event(socket: &UdpSocket) -> Value {
        loop {
            let value = recv_json(socket).await;
            if value["event"] != "position_update" {
                return value;
            }
        }
    }

    #[test]
    fn test_message_construction() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let msg = ServerMessage::Received {
            inbound: Inbound::Heartbeat,
            addr,
        };
        match msg {
            ServerMessage::Received { inbound, addr: a } => {
                assert_eq!(inbound, Inbound::Heartbeat);
                assert_eq!(a, addr);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_receives_initial_sync() {
        let server = start("sync", 4).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        client
            .send_to(br#"{"action":"connect","name":"ana"}"#, server)
            .await
            .unwrap();

        let connected = recv_event(&client).await;
        assert_eq!(connected["event"], "connected");
        assert_eq!(connected["sessionId"], "ana");
        let inventory = recv_event(&client).await;
        assert_eq!(inventory["event"], "inventory_update");
        assert_eq!(inventory["items"]["Crafting Table"], 1);
        let objects = recv_event(&client).await;
        assert_eq!(objects["event"], "world_objects");
    }

    #[tokio::test]
    async fn test_malformed_datagram_is_ignored() {
        let server = start("malformed", 4).await;
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        client.send_to(b"{not json", server).await.unwrap();
        client
            .send_to(br#"{"action":"place_object","type":"Castle","x":1,"y":1}"#, server)
            .await
            .unwrap();
        client
            .send_to(br#"{"action":"connect"}"#, server)
            .await
            .unwrap();

        let connected = recv_event(&client).await;
        assert_eq!(connected["event"], "connected");
        assert_eq!(connected["sessionId"], "guest-1");
    }

    #[tokio::test]
    async fn test_full_server_rejects() {
        let server = start("full", 1).await;
        let first = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let second = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        first
            .send_to(br#"{"action":"connect"}"#, server)
            .await
            .unwrap();
        assert_eq!(recv_event(&first).await["event"], "connected");

        second
            .send_to(br#"{"action":"connect"}"#, server)
            .await
            .unwrap();
        let rejected = recv_event(&second).await;
        assert_eq!(rejected["event"], "rejected");
        assert_eq!(rejected["reason"], "server full");
    }
}
