//! WebSocket protocol messages for Boardwalk multiplayer.

use boardwalk_core::{GameAction, GameEvent, GamePhase, GameState, HouseRules, PlayerId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Create a new game and join it as host
    CreateGame {
        player_name: String,
        game_name: String,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        house_rules: HouseRules,
    },

    /// Join an existing game, or retake a seat left by a dropped connection
    JoinGame {
        game_id: Uuid,
        player_name: String,
        #[serde(default)]
        password: Option<String>,
    },

    /// Leave current game
    LeaveGame,

    /// Request game list
    ListGames,

    /// Start the game (host only)
    StartGame,

    /// Submit a game action
    Action { action: GameAction },

    /// Send chat message
    Chat { text: String },

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with the connection's id
    Welcome { connection_id: Uuid },

    /// Seated in a game
    GameJoined { game_id: Uuid, player_id: PlayerId },

    /// Left the game
    LeftGame,

    /// Full game state, sent after every change
    GameState { state: GameState },

    /// Events produced by the sender's own action
    ActionResult { events: Vec<GameEvent> },

    /// List of games
    GameList { games: Vec<LobbyGame> },

    /// Error occurred
    Error { message: String },

    /// Pong response
    Pong,
}

/// Game summary for the lobby list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyGame {
    pub id: Uuid,
    pub name: String,
    pub player_count: usize,
    pub max_players: usize,
    pub has_password: bool,
    pub phase: GamePhase,
}
