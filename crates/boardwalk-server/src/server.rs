//! WebSocket server and connection handling.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::{GameRegistry, RegistryError, Session};
use boardwalk_core::GameAction;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
#[derive(Default)]
pub struct ServerState {
    pub registry: GameRegistry,
}

impl ServerState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Per-connection context: the outgoing channel and the task forwarding
/// the current game's state.
struct Connection {
    id: Uuid,
    tx: mpsc::UnboundedSender<ServerMessage>,
    forwarder: Option<JoinHandle<()>>,
}

impl Connection {
    fn send(&self, msg: ServerMessage) {
        let _ = self.tx.send(msg);
    }

    fn send_error(&self, message: impl ToString) {
        self.send(ServerMessage::Error {
            message: message.to_string(),
        });
    }

    /// Announce the seat and start pushing that game's state.
    fn seated(&mut self, state: &ServerState, session: Session) {
        self.send(ServerMessage::GameJoined {
            game_id: session.game_id,
            player_id: session.player_id,
        });
        self.stop_forwarding();

        let Some(room) = state.registry.room(session.game_id) else {
            return;
        };
        let mut updates = room.subscribe();
        let tx = self.tx.clone();
        self.forwarder = Some(tokio::spawn(async move {
            loop {
                let snapshot = updates.borrow_and_update().clone();
                let msg = ServerMessage::GameState {
                    state: (*snapshot).clone(),
                };
                if tx.send(msg).is_err() || updates.changed().await.is_err() {
                    break;
                }
            }
        }));
    }

    fn stop_forwarding(&mut self) {
        if let Some(task) = self.forwarder.take() {
            task.abort();
        }
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Boardwalk server listening on {}", addr);

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

    let connection_id = Uuid::new_v4();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Send welcome message
    let welcome = ServerMessage::Welcome { connection_id };
    let msg_text = serde_json::to_string(&welcome)?;
    ws_sender.send(Message::Text(msg_text)).await?;

    // Spawn task to forward messages from channel to WebSocket
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

    let mut conn = Connection {
        id: connection_id,
        tx,
        forwarder: None,
    };

    // Handle incoming messages
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(&mut conn, client_msg, &state).await,
                Err(e) => {
                    warn!("Invalid message from {}: {}", connection_id, e);
                    conn.send_error("Invalid message");
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", connection_id);
                break;
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", connection_id, e);
                break;
            }
            _ => {}
        }
    }

    // Clean up on disconnect; the seat stays reserved in a running game
    conn.stop_forwarding();
    if let Some(session) = state.registry.leave(connection_id).await {
        debug!(game = %session.game_id, player = session.player_id, "seat released");
    }
    send_task.abort();

    info!("Connection closed for {}", connection_id);
    Ok(())
}

/// Handle a client message.
async fn handle_message(conn: &mut Connection, msg: ClientMessage, state: &ServerState) {
    match msg {
        ClientMessage::CreateGame {
            player_name,
            game_name,
            password,
            house_rules,
        } => {
            match state
                .registry
                .create_game(conn.id, &player_name, &game_name, password, house_rules)
            {
                Ok(session) => conn.seated(state, session),
                Err(e) => conn.send_error(e),
            }
        }

        ClientMessage::JoinGame {
            game_id,
            player_name,
            password,
        } => {
            match state
                .registry
                .join_game(conn.id, game_id, &player_name, password)
                .await
            {
                Ok(session) => conn.seated(state, session),
                Err(e) => conn.send_error(e),
            }
        }

        ClientMessage::LeaveGame => {
            conn.stop_forwarding();
            match state.registry.leave(conn.id).await {
                Some(_) => conn.send(ServerMessage::LeftGame),
                None => conn.send_error(RegistryError::NotInGame),
            }
        }

        ClientMessage::ListGames => {
            let games = state.registry.lobby_list();
            conn.send(ServerMessage::GameList { games });
        }

        ClientMessage::StartGame => match state.registry.seat(conn.id) {
            Ok((room, player)) => {
                if let Err(e) = room.start(player).await {
                    conn.send_error(e);
                }
            }
            Err(e) => conn.send_error(e),
        },

        ClientMessage::Action { action } => act(conn, state, action).await,

        ClientMessage::Chat { text } => act(conn, state, GameAction::Chat { text }).await,

        ClientMessage::Ping => conn.send(ServerMessage::Pong),
    }
}

/// Forward an action to the connection's room. State changes reach every
/// player through the forwarders; only the actor gets the events.
async fn act(conn: &Connection, state: &ServerState, action: GameAction) {
    let (room, player) = match state.registry.seat(conn.id) {
        Ok(seat) => seat,
        Err(e) => return conn.send_error(e),
    };
    match room.act(player, action).await {
        Ok(events) => conn.send(ServerMessage::ActionResult { events }),
        Err(e) => conn.send_error(e),
    }
}
