//! Games and sessions.
//!
//! The registry owns a handle to every running room and remembers which
//! game and seat each connection holds.

use boardwalk_core::{GamePhase, GameState, HouseRules, PlayerId};
use dashmap::DashMap;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::protocol::LobbyGame;
use crate::room::{spawn_room, RoomError, RoomHandle, HOST_PLAYER_ID};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Game not found")]
    GameNotFound,

    #[error("Already in a game")]
    AlreadyInGame,

    #[error("Not in a game")]
    NotInGame,

    #[error(transparent)]
    Room(#[from] RoomError),
}

/// The seat a connection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub game_id: Uuid,
    pub player_id: PlayerId,
}

#[derive(Default)]
pub struct GameRegistry {
    games: DashMap<Uuid, RoomHandle>,
    sessions: DashMap<Uuid, Session>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new game with the connection seated as host.
    pub fn create_game(
        &self,
        connection: Uuid,
        player_name: &str,
        game_name: &str,
        password: Option<String>,
        rules: HouseRules,
    ) -> Result<Session, RegistryError> {
        if self.sessions.contains_key(&connection) {
            return Err(RegistryError::AlreadyInGame);
        }

        let game_id = Uuid::new_v4();
        let room = spawn_room(game_id, player_name, game_name, password, rules);
        self.games.insert(game_id, room);

        let session = Session {
            game_id,
            player_id: HOST_PLAYER_ID,
        };
        self.sessions.insert(connection, session);
        info!(game = %game_id, %connection, "game created");
        Ok(session)
    }

    /// Join a game, or reclaim a dropped seat with the same name.
    pub async fn join_game(
        &self,
        connection: Uuid,
        game_id: Uuid,
        player_name: &str,
        password: Option<String>,
    ) -> Result<Session, RegistryError> {
        if self.sessions.contains_key(&connection) {
            return Err(RegistryError::AlreadyInGame);
        }
        let room = self.room(game_id).ok_or(RegistryError::GameNotFound)?;
        self.join_room(connection, &room, player_name, password).await
    }

    async fn join_room(
        &self,
        connection: Uuid,
        room: &RoomHandle,
        player_name: &str,
        password: Option<String>,
    ) -> Result<Session, RegistryError> {
        let game_id = room.id;
        let player_id = room.join(player_name, password).await?;

        // The game may have been evicted while the join was queued
        if !self.games.contains_key(&game_id) {
            let _ = room.leave(player_id).await;
            return Err(RegistryError::GameNotFound);
        }

        let session = Session { game_id, player_id };
        self.sessions.insert(connection, session);
        info!(game = %game_id, %connection, player_id, "joined game");
        Ok(session)
    }

    pub fn session(&self, connection: Uuid) -> Option<Session> {
        self.sessions.get(&connection).map(|s| *s)
    }

    pub fn room(&self, game_id: Uuid) -> Option<RoomHandle> {
        self.games.get(&game_id).map(|r| r.clone())
    }

    /// The room and seat held by a connection
    pub fn seat(&self, connection: Uuid) -> Result<(RoomHandle, PlayerId), RegistryError> {
        let session = self.session(connection).ok_or(RegistryError::NotInGame)?;
        let room = self
            .room(session.game_id)
            .ok_or(RegistryError::GameNotFound)?;
        Ok((room, session.player_id))
    }

    /// Drop the connection's session and release its seat. Used both for
    /// an explicit leave and for a closed connection.
    pub async fn leave(&self, connection: Uuid) -> Option<Session> {
        let (_, session) = self.sessions.remove(&connection)?;
        if let Some(room) = self.room(session.game_id) {
            // A closed room has nothing left to release
            let _ = room.leave(session.player_id).await;
        }
        self.evict_if_idle(session.game_id);
        Some(session)
    }

    /// Every game, for the lobby screen
    pub fn lobby_list(&self) -> Vec<LobbyGame> {
        let mut games: Vec<LobbyGame> = self.games.iter().map(|r| r.to_lobby_game()).collect();
        games.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        games
    }

    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    fn evict_if_idle(&self, game_id: Uuid) {
        if self
            .games
            .remove_if(&game_id, |_, room| is_idle(&room.snapshot()))
            .is_some()
        {
            info!(game = %game_id, "game evicted");
        }
    }
}

/// Lobbies and finished games with nobody connected are dropped, which
/// closes their room task. Running games wait for reconnects.
fn is_idle(state: &GameState) -> bool {
    state.phase != GamePhase::Playing && state.players.iter().all(|p| !p.connected)
}
