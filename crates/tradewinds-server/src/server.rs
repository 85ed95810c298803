//! WebSocket server and connection handling.

use crate::config::ServerConfig;
use crate::protocol::{ClientMessage, RoomInfo, ServerMessage};
use crate::room::{GameRoom, RoomError};
use crate::store::StateStore;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use tradewinds_core::{GameEvent, PlayerAction, Snapshot};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState {
    pub config: ServerConfig,
    store: Arc<dyn StateStore>,
    /// All active rooms by name
    pub rooms: DashMap<String, GameRoom>,
    /// Connection ID to the room it is in
    pub member_rooms: DashMap<Uuid, String>,
    /// Connection ID to the username it identified as
    pub usernames: DashMap<Uuid, String>,
    /// Username to the connection holding it
    pub names: DashMap<String, Uuid>,
    /// Connection ID to its outgoing message channel
    pub senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
}

impl ServerState {
    pub fn new(config: ServerConfig, store: Arc<dyn StateStore>) -> Self {
        Self {
            config,
            store,
            rooms: DashMap::new(),
            member_rooms: DashMap::new(),
            usernames: DashMap::new(),
            names: DashMap::new(),
            senders: DashMap::new(),
        }
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, connection: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.senders.get(&connection) {
            let _ = sender.send(msg);
        }
    }

    /// Send a message to each of the given connections.
    pub fn send_to_all(&self, connections: &[Uuid], msg: &ServerMessage) {
        for connection in connections {
            self.send_to(*connection, msg.clone());
        }
    }

    /// Send a message to every connection on the server.
    pub fn broadcast(&self, msg: ServerMessage) {
        for sender in self.senders.iter() {
            let _ = sender.send(msg.clone());
        }
    }

    /// Rooms that currently have members, sorted by name.
    pub fn room_list(&self) -> Vec<RoomInfo> {
        let mut rooms: Vec<RoomInfo> = self
            .rooms
            .iter()
            .filter(|r| !r.is_empty())
            .map(|r| r.to_info())
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        rooms
    }

    fn broadcast_room_list(&self) {
        self.broadcast(ServerMessage::RoomList {
            rooms: self.room_list(),
        });
    }

    /// Username and room of a connection, or an error message for it.
    fn seat_of(&self, connection: Uuid) -> Result<(String, String), ServerMessage> {
        let username = self
            .usernames
            .get(&connection)
            .map(|u| u.value().clone())
            .ok_or_else(|| ServerMessage::error("Identify first"))?;
        let room = self
            .member_rooms
            .get(&connection)
            .map(|r| r.value().clone())
            .ok_or_else(|| ServerMessage::error(RoomError::PlayerNotInRoom))?;
        Ok((username, room))
    }

    /// Remove a connection from its room, dropping the room and its stored
    /// match once nobody is left.
    fn leave_room(&self, connection: Uuid) -> Option<String> {
        let (_, room_name) = self.member_rooms.remove(&connection)?;

        let now_empty = match self.rooms.get_mut(&room_name) {
            Some(mut room) => room.remove_member(connection).unwrap_or(false),
            None => false,
        };
        if now_empty {
            self.rooms.remove(&room_name);
            if let Err(e) = self.store.remove(&room_name) {
                error!("Failed to drop state for room {}: {}", room_name, e);
            }
            info!("Room {} closed", room_name);
        }
        Some(room_name)
    }
}

/// Run the WebSocket server.
pub async fn run_server(state: Arc<ServerState>) -> anyhow::Result<()> {
    let addr = state.config.addr;
    let listener = TcpListener::bind(addr).await?;
    info!("Tradewinds server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let connection = Uuid::new_v4();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.senders.insert(connection, tx);

    let welcome = serde_json::to_string(&ServerMessage::Welcome { connection })?;
    ws_sender.send(Message::Text(welcome)).await?;

    // Forward queued messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to encode message: {}", e),
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(connection, client_msg, &state),
                Err(e) => {
                    warn!("Invalid message from {}: {}", connection, e);
                    state.send_to(connection, ServerMessage::error(e));
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", connection);
                break;
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", connection, e);
                break;
            }
            _ => {}
        }
    }

    handle_disconnect(connection, &state);
    send_task.abort();

    info!("Connection closed for {}", connection);
    Ok(())
}

/// Handle a client message.
fn handle_message(connection: Uuid, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        ClientMessage::Identify { username } => identify(connection, username, state),

        ClientMessage::JoinRoom { room } => join_room(connection, room, state),

        ClientMessage::LeaveRoom => {
            if let Some(room) = state.leave_room(connection) {
                info!("Connection {} left room {}", connection, room);
                state.broadcast_room_list();
            }
        }

        ClientMessage::StartGame => start_game(connection, state),

        ClientMessage::RequestSnapshot => {
            let reply = match state.seat_of(connection) {
                Ok((username, room_name)) => match state.rooms.get(&room_name) {
                    Some(room) => room
                        .snapshot(state.store.as_ref(), &username)
                        .map_err(ServerMessage::error),
                    None => Err(ServerMessage::error("Room not found")),
                },
                Err(msg) => Err(msg),
            };
            match reply {
                Ok(snapshot) => send_snapshot(state, connection, snapshot),
                Err(msg) => state.send_to(connection, msg),
            }
        }

        ClientMessage::Action { action } => handle_action(connection, action, state),

        ClientMessage::ListRooms => {
            state.send_to(
                connection,
                ServerMessage::RoomList {
                    rooms: state.room_list(),
                },
            );
        }

        ClientMessage::Ping => state.send_to(connection, ServerMessage::Pong),
    }
}

fn identify(connection: Uuid, username: String, state: &Arc<ServerState>) {
    let username = username.trim().to_string();
    if username.is_empty() {
        state.send_to(connection, ServerMessage::error("Username must not be empty"));
        return;
    }
    if state.member_rooms.contains_key(&connection) {
        state.send_to(connection, ServerMessage::error("Leave your room before renaming"));
        return;
    }

    // Claim the name under its entry lock so two connections cannot both win
    match state.names.entry(username.clone()) {
        Entry::Occupied(holder) if *holder.get() != connection => {
            state.send_to(connection, ServerMessage::error("Username already connected"));
            return;
        }
        Entry::Occupied(_) => {}
        Entry::Vacant(slot) => {
            slot.insert(connection);
        }
    }

    info!("{} connected as {}", connection, username);
    if let Some(previous) = state.usernames.insert(connection, username.clone()) {
        if previous != username {
            state.names.remove_if(&previous, |_, holder| *holder == connection);
        }
    }
    state.send_to(
        connection,
        ServerMessage::RoomList {
            rooms: state.room_list(),
        },
    );
}

fn join_room(connection: Uuid, room_name: String, state: &Arc<ServerState>) {
    let Some(username) = state.usernames.get(&connection).map(|u| u.value().clone()) else {
        state.send_to(connection, ServerMessage::error("Identify first"));
        return;
    };
    if state.member_rooms.contains_key(&connection) {
        state.leave_room(connection);
    }

    let result = state
        .rooms
        .entry(room_name.clone())
        .or_insert_with(|| GameRoom::new(room_name.clone(), state.config.game.clone()))
        .add_member(connection, username.clone());

    match result {
        Ok(()) => {
            state.member_rooms.insert(connection, room_name.clone());
            info!("{} joined room {}", username, room_name);
            state.broadcast_room_list();
        }
        Err(e) => {
            // Drop a room created just for this failed join
            state.rooms.remove_if(&room_name, |_, room| room.is_empty());
            state.send_to(connection, ServerMessage::error(e));
        }
    }
}

fn start_game(connection: Uuid, state: &Arc<ServerState>) {
    let (_, room_name) = match state.seat_of(connection) {
        Ok(seat) => seat,
        Err(msg) => return state.send_to(connection, msg),
    };

    let started = match state.rooms.get_mut(&room_name) {
        Some(mut room) => room
            .start(state.store.as_ref(), &mut rand::thread_rng())
            .map(|()| room.members.clone()),
        None => Err(RoomError::PlayerNotInRoom),
    };

    match started {
        Ok(members) => {
            info!("Starting match in {}", room_name);
            let connections: Vec<Uuid> = members.iter().map(|m| m.connection).collect();
            state.send_to_all(
                &connections,
                &ServerMessage::GameStarted {
                    room: room_name.clone(),
                },
            );
            state.broadcast_room_list();
        }
        Err(RoomError::Store(e)) => {
            error!("State store failed starting room {}: {}", room_name, e);
            state.send_to(connection, ServerMessage::error(e));
        }
        Err(e) => state.send_to(connection, ServerMessage::error(e)),
    }
}

fn handle_action(connection: Uuid, action: PlayerAction, state: &Arc<ServerState>) {
    let (username, room_name) = match state.seat_of(connection) {
        Ok(seat) => seat,
        Err(msg) => return state.send_to(connection, msg),
    };

    // The entry lock is held across load, apply and store
    let outcome = match state.rooms.get_mut(&room_name) {
        Some(mut room) => room
            .apply_action(state.store.as_ref(), &username, &action)
            .and_then(|events| {
                // The drawn card only reaches the drawer, inside their own snapshot
                let private = if events
                    .iter()
                    .any(|e| matches!(e, GameEvent::DevelopmentCardDrawn { .. }))
                {
                    Some(room.snapshot(state.store.as_ref(), &username)?)
                } else {
                    None
                };
                Ok((events, private, room.connections().collect::<Vec<_>>()))
            }),
        None => Err(RoomError::PlayerNotInRoom),
    };

    match outcome {
        Ok((events, private, connections)) => {
            info!("Handled {}'s {} in room {}", username, action.kind(), room_name);
            state.send_to_all(&connections, &ServerMessage::Update { events });
            if let Some(snapshot) = private {
                send_snapshot(state, connection, snapshot);
            }
        }
        Err(RoomError::Rejected(reason)) => {
            debug!("{}'s {} rejected: {}", username, action.kind(), reason);
            state.send_to(connection, ServerMessage::rejected(reason));
        }
        Err(RoomError::Store(e)) => {
            error!("State store failed in room {}: {}", room_name, e);
            state.send_to(connection, ServerMessage::error(e));
        }
        Err(e) => state.send_to(connection, ServerMessage::error(e)),
    }
}

fn send_snapshot(state: &ServerState, connection: Uuid, snapshot: Snapshot) {
    state.send_to(
        connection,
        ServerMessage::Snapshot {
            snapshot: Box::new(snapshot),
        },
    );
}

/// Handle a dropped connection.
fn handle_disconnect(connection: Uuid, state: &Arc<ServerState>) {
    let left = state.leave_room(connection);
    state.senders.remove(&connection);
    if let Some((_, username)) = state.usernames.remove(&connection) {
        state.names.remove_if(&username, |_, holder| *holder == connection);
        info!("{} disconnected", username);
    }
    if left.is_some() {
        state.broadcast_room_list();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RoomStatus;
    use crate::store::MemoryStore;
    use tradewinds_core::{costs, GameConfig, Phase};

    fn server() -> Arc<ServerState> {
        let config = ServerConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            game: GameConfig::default(),
        };
        Arc::new(ServerState::new(config, Arc::new(MemoryStore::new())))
    }

    /// Register a fake connection and return its inbox
    fn connect(
        state: &Arc<ServerState>,
        username: &str,
    ) -> (Uuid, mpsc::UnboundedReceiver<ServerMessage>) {
        let connection = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        state.senders.insert(connection, tx);
        handle_message(
            connection,
            ClientMessage::Identify {
                username: username.into(),
            },
            state,
        );
        (connection, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn join(state: &Arc<ServerState>, connection: Uuid, room: &str) {
        handle_message(connection, ClientMessage::JoinRoom { room: room.into() }, state);
    }

    #[test]
    fn test_join_requires_identity() {
        let state = server();
        let connection = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.senders.insert(connection, tx);

        join(&state, connection, "harbor");
        assert!(matches!(drain(&mut rx)[..], [ServerMessage::Error { .. }]));
        assert!(state.rooms.is_empty());
    }

    #[test]
    fn test_duplicate_username_refused() {
        let state = server();
        let (first, _rx) = connect(&state, "ana");
        let (second, mut rx) = connect(&state, "ana");
        assert!(matches!(drain(&mut rx)[..], [ServerMessage::Error { .. }]));
        assert!(!state.usernames.contains_key(&second));
        assert_eq!(*state.names.get("ana").unwrap(), first);

        // Renaming frees the old name, disconnecting frees the new one
        handle_message(
            first,
            ClientMessage::Identify {
                username: "ana2".into(),
            },
            &state,
        );
        assert!(!state.names.contains_key("ana"));
        handle_disconnect(first, &state);
        assert!(state.names.is_empty());

        handle_message(
            second,
            ClientMessage::Identify {
                username: "ana".into(),
            },
            &state,
        );
        assert_eq!(*state.names.get("ana").unwrap(), second);
    }

    #[test]
    fn test_simultaneous_identify_has_one_winner() {
        let state = server();
        let connections: Vec<_> = (0..8)
            .map(|_| {
                let connection = Uuid::new_v4();
                let (tx, rx) = mpsc::unbounded_channel();
                state.senders.insert(connection, tx);
                (connection, rx)
            })
            .collect();

        std::thread::scope(|scope| {
            for (connection, _) in &connections {
                let state = Arc::clone(&state);
                let connection = *connection;
                scope.spawn(move || {
                    handle_message(
                        connection,
                        ClientMessage::Identify {
                            username: "ana".into(),
                        },
                        &state,
                    );
                });
            }
        });

        assert_eq!(state.usernames.len(), 1);
        assert_eq!(state.names.len(), 1);
        let winner = *state.names.get("ana").unwrap();
        assert!(state.usernames.contains_key(&winner));
    }

    #[test]
    fn test_drawn_card_goes_only_to_drawer() {
        let state = server();
        let mut players: Vec<_> = ["ana", "bo", "cy"]
            .iter()
            .map(|name| connect(&state, name))
            .collect();
        for (connection, _) in &players {
            join(&state, *connection, "harbor");
        }
        handle_message(players[0].0, ClientMessage::StartGame, &state);

        let mut game = state.store.load_existing("harbor").unwrap();
        game.phase = Phase::Main;
        game.players[0].resources = costs::development_card();
        let top = *game.development_deck.last().unwrap();
        state.store.save("harbor", &game).unwrap();
        for (_, rx) in players.iter_mut() {
            drain(rx);
        }

        handle_message(
            players[0].0,
            ClientMessage::Action {
                action: PlayerAction::DrawDevelopmentCard,
            },
            &state,
        );
        match &drain(&mut players[0].1)[..] {
            [ServerMessage::Update { .. }, ServerMessage::Snapshot { snapshot }] => {
                assert_eq!(snapshot.my_index, Some(0));
                assert_eq!(snapshot.state.players[0].development_cards[0].card, top);
                assert_eq!(snapshot.deck_size, 24);
            }
            other => panic!("unexpected {other:?}"),
        }
        for (_, rx) in players[1..].iter_mut() {
            assert!(matches!(drain(rx)[..], [ServerMessage::Update { .. }]));
        }
    }

    #[test]
    fn test_full_match_flow() {
        let state = server();
        let mut players: Vec<_> = ["ana", "bo", "cy"]
            .iter()
            .map(|name| connect(&state, name))
            .collect();
        for (connection, _) in &players {
            join(&state, *connection, "harbor");
        }
        assert_eq!(state.room_list()[0].members.len(), 3);

        handle_message(players[0].0, ClientMessage::StartGame, &state);
        assert_eq!(state.room_list()[0].status, RoomStatus::Playing);
        for (_, rx) in players.iter_mut() {
            assert!(drain(rx)
                .iter()
                .any(|m| matches!(m, ServerMessage::GameStarted { room } if room == "harbor")));
        }

        // Out of turn goes back to the actor only
        handle_message(
            players[1].0,
            ClientMessage::Action {
                action: PlayerAction::FinishStep,
            },
            &state,
        );
        assert!(matches!(
            drain(&mut players[1].1)[..],
            [ServerMessage::Rejected { .. }]
        ));
        assert!(drain(&mut players[0].1).is_empty());

        handle_message(
            players[0].0,
            ClientMessage::Action {
                action: PlayerAction::FinishStep,
            },
            &state,
        );
        for (_, rx) in players.iter_mut() {
            assert!(matches!(drain(rx)[..], [ServerMessage::Update { .. }]));
        }

        handle_message(players[2].0, ClientMessage::RequestSnapshot, &state);
        match &drain(&mut players[2].1)[..] {
            [ServerMessage::Snapshot { snapshot }] => {
                assert_eq!(snapshot.my_index, Some(2));
                assert_eq!(snapshot.state.current_player, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_last_member_leaving_closes_room() {
        let state = server();
        let (ana, _rx) = connect(&state, "ana");
        join(&state, ana, "harbor");
        assert_eq!(state.room_list().len(), 1);

        handle_disconnect(ana, &state);
        assert!(state.rooms.is_empty());
        assert!(state.usernames.is_empty());
        assert!(state.names.is_empty());
        assert!(state.member_rooms.is_empty());
    }
}
