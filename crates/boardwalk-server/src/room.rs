//! Game rooms.
//!
//! Each room is a tokio task that exclusively owns one [`Game`]. Commands
//! arrive over an mpsc channel and are applied one at a time, and a one
//! second interval in the same loop drives the turn timer. After every
//! accepted change the room publishes a fresh snapshot on a watch channel.

use std::sync::Arc;
use std::time::Duration;

use boardwalk_core::{Game, GameAction, GameError, GameEvent, GamePhase, GameState, HouseRules, PlayerId};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use uuid::Uuid;

use crate::protocol::LobbyGame;

/// Player id given to whoever creates the room.
pub const HOST_PLAYER_ID: PlayerId = 1;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Wrong password")]
    WrongPassword,

    #[error("Room is closed")]
    Closed,

    #[error(transparent)]
    Game(#[from] GameError),
}

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Commands handled by a room task.
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        name: String,
        password: Option<String>,
        reply: Reply<PlayerId>,
    },
    Start {
        player: PlayerId,
        reply: Reply<Vec<GameEvent>>,
    },
    Act {
        player: PlayerId,
        action: GameAction,
        reply: Reply<Vec<GameEvent>>,
    },
    /// Leave the lobby, or give up the connection to a running game
    Leave {
        player: PlayerId,
        reply: Reply<()>,
    },
}

/// Cheap, cloneable handle to a running room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    pub has_password: bool,
    commands: mpsc::UnboundedSender<RoomCommand>,
    state: watch::Receiver<Arc<GameState>>,
}

impl RoomHandle {
    /// Seat a player, reclaiming a dropped seat with the same name if one
    /// exists.
    pub async fn join(&self, name: &str, password: Option<String>) -> Result<PlayerId, RoomError> {
        self.request(|reply| RoomCommand::Join {
            name: name.to_string(),
            password,
            reply,
        })
        .await
    }

    pub async fn start(&self, player: PlayerId) -> Result<Vec<GameEvent>, RoomError> {
        self.request(|reply| RoomCommand::Start { player, reply }).await
    }

    pub async fn act(&self, player: PlayerId, action: GameAction) -> Result<Vec<GameEvent>, RoomError> {
        self.request(|reply| RoomCommand::Act {
            player,
            action,
            reply,
        })
        .await
    }

    pub async fn leave(&self, player: PlayerId) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Leave { player, reply }).await
    }

    /// Latest published state
    pub fn snapshot(&self) -> Arc<GameState> {
        self.state.borrow().clone()
    }

    /// Receiver that wakes on every published state
    pub fn subscribe(&self) -> watch::Receiver<Arc<GameState>> {
        self.state.clone()
    }

    pub fn to_lobby_game(&self) -> LobbyGame {
        let state = self.snapshot();
        LobbyGame {
            id: self.id,
            name: state.name.clone(),
            player_count: state.players.len(),
            max_players: state.rules.max_players,
            has_password: self.has_password,
            phase: state.phase,
        }
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> RoomCommand) -> Result<T, RoomError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| RoomError::Closed)?;
        response.await.map_err(|_| RoomError::Closed)?
    }
}

/// Spawn a room task with its creator seated as host.
///
/// The task runs until every handle has been dropped.
pub fn spawn_room(
    id: Uuid,
    host_name: &str,
    game_name: &str,
    password: Option<String>,
    rules: HouseRules,
) -> RoomHandle {
    let game = Game::new(HOST_PLAYER_ID, host_name, game_name, rules);
    let password = password.filter(|p| !p.is_empty());
    let (commands, receiver) = mpsc::unbounded_channel();
    let (publisher, state) = watch::channel(Arc::new(game.state.clone()));
    let handle = RoomHandle {
        id,
        has_password: password.is_some(),
        commands,
        state,
    };

    let room = Room {
        id,
        game,
        password,
        next_player_id: HOST_PLAYER_ID + 1,
        publisher,
    };
    info!(room = %id, "room opened");
    tokio::spawn(room.run(receiver));
    handle
}

struct Room {
    id: Uuid,
    game: Game,
    password: Option<String>,
    next_player_id: PlayerId,
    publisher: watch::Sender<Arc<GameState>>,
}

impl Room {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<RoomCommand>) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = ticker.tick() => self.tick(),
            }
        }
        info!(room = %self.id, "room closed");
    }

    fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join {
                name,
                password,
                reply,
            } => {
                let result = self.join(&name, password);
                self.respond(reply, result);
            }
            RoomCommand::Start { player, reply } => {
                let result = self.game.start_game(player).map_err(RoomError::from);
                self.respond(reply, result);
            }
            RoomCommand::Act {
                player,
                action,
                reply,
            } => {
                let result = self.game.apply_action(player, action).map_err(RoomError::from);
                if let Err(e) = &result {
                    debug!(room = %self.id, player, error = %e, "action rejected");
                }
                self.respond(reply, result);
            }
            RoomCommand::Leave { player, reply } => {
                let result = self.leave(player);
                self.respond(reply, result);
            }
        }
    }

    fn join(&mut self, name: &str, password: Option<String>) -> Result<PlayerId, RoomError> {
        if let Some(expected) = &self.password {
            if password.as_deref() != Some(expected.as_str()) {
                return Err(RoomError::WrongPassword);
            }
        }

        if let Some(player) = self.game.find_disconnected_by_name(name) {
            self.game.reconnect_player(player)?;
            info!(room = %self.id, player, "player reconnected");
            return Ok(player);
        }

        let player = self.next_player_id;
        self.game.add_player(player, name)?;
        self.next_player_id += 1;
        info!(room = %self.id, player, "player joined");
        Ok(player)
    }

    /// Lobby seats are freed; seats in a running game are held for
    /// reconnection.
    fn leave(&mut self, player: PlayerId) -> Result<(), RoomError> {
        if self.game.state.phase == GamePhase::Waiting {
            self.game.remove_player(player)?;
        } else {
            self.game.disconnect_player(player)?;
        }
        info!(room = %self.id, player, "player left");
        Ok(())
    }

    fn tick(&mut self) {
        if let Some(events) = self.game.tick() {
            if !events.is_empty() {
                debug!(room = %self.id, events = events.len(), "turn timer expired");
            }
            self.publish();
        }
    }

    /// Publish before replying so the caller sees its own change.
    fn respond<T>(&mut self, reply: Reply<T>, result: Result<T, RoomError>) {
        if result.is_ok() {
            self.publish();
        }
        let _ = reply.send(result);
    }

    fn publish(&self) {
        self.publisher.send_replace(Arc::new(self.game.state.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn untimed() -> HouseRules {
        HouseRules {
            turn_timer_secs: 0,
            ..HouseRules::default()
        }
    }

    fn open(password: Option<&str>) -> RoomHandle {
        spawn_room(
            Uuid::new_v4(),
            "Alice",
            "Test Room",
            password.map(str::to_string),
            untimed(),
        )
    }

    #[tokio::test]
    async fn test_join_assigns_sequential_ids() {
        let room = open(None);
        assert_eq!(room.join("Bob", None).await.unwrap(), 2);
        assert_eq!(room.join("Carol", None).await.unwrap(), 3);

        let state = room.snapshot();
        assert_eq!(state.players.len(), 3);
        assert_eq!(state.host(), Some(HOST_PLAYER_ID));
    }

    #[tokio::test]
    async fn test_password_checked() {
        let room = open(Some("secret"));
        assert!(room.has_password);
        assert!(matches!(
            room.join("Bob", None).await,
            Err(RoomError::WrongPassword)
        ));
        assert!(matches!(
            room.join("Bob", Some("guess".into())).await,
            Err(RoomError::WrongPassword)
        ));
        assert_eq!(room.join("Bob", Some("secret".into())).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_password_means_open() {
        let room = open(Some(""));
        assert!(!room.has_password);
        assert!(room.join("Bob", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let room = open(None);
        assert!(matches!(
            room.join("Alice", None).await,
            Err(RoomError::Game(GameError::DuplicatePlayer))
        ));
    }

    #[tokio::test]
    async fn test_start_and_act() {
        let room = open(None);
        room.join("Bob", None).await.unwrap();

        assert!(matches!(
            room.start(2).await,
            Err(RoomError::Game(GameError::NotHost))
        ));
        room.start(HOST_PLAYER_ID).await.unwrap();
        assert_eq!(room.snapshot().phase, GamePhase::Playing);

        assert!(matches!(
            room.act(2, GameAction::RollDice).await,
            Err(RoomError::Game(GameError::NotYourTurn))
        ));
        let events = room.act(HOST_PLAYER_ID, GameAction::RollDice).await.unwrap();
        assert!(matches!(events[0], GameEvent::DiceRolled { player: 1, .. }));
        assert!(room.snapshot().last_dice.is_some());
    }

    #[tokio::test]
    async fn test_subscriber_sees_changes() {
        let room = open(None);
        let mut updates = room.subscribe();
        updates.borrow_and_update();

        room.join("Bob", None).await.unwrap();
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().players.len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_command_publishes_nothing() {
        let room = open(None);
        let mut updates = room.subscribe();
        updates.borrow_and_update();

        assert!(room.start(HOST_PLAYER_ID).await.is_err());
        assert!(!updates.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_leave_lobby_frees_seat() {
        let room = open(None);
        room.join("Bob", None).await.unwrap();
        room.leave(HOST_PLAYER_ID).await.unwrap();

        let state = room.snapshot();
        assert_eq!(state.players.len(), 1);
        assert_eq!(state.host(), Some(2));
    }

    #[tokio::test]
    async fn test_reconnect_by_name() {
        let room = open(None);
        room.join("Bob", None).await.unwrap();
        room.start(HOST_PLAYER_ID).await.unwrap();

        room.leave(2).await.unwrap();
        assert!(!room.snapshot().get_player(2).unwrap().connected);

        assert_eq!(room.join("Bob", None).await.unwrap(), 2);
        assert!(room.snapshot().get_player(2).unwrap().connected);
        // New names cannot join a running game
        assert!(matches!(
            room.join("Dave", None).await,
            Err(RoomError::Game(GameError::InvalidPhase))
        ));
    }

    #[tokio::test]
    async fn test_timer_drives_turns() {
        let rules = HouseRules {
            turn_timer_secs: 1,
            ..HouseRules::default()
        };
        let room = spawn_room(Uuid::new_v4(), "Alice", "Timed", None, rules);
        room.join("Bob", None).await.unwrap();
        room.start(HOST_PLAYER_ID).await.unwrap();
        assert_eq!(room.snapshot().current_player_id(), Some(1));

        let mut updates = room.subscribe();
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            while updates.borrow_and_update().current_player_id() == Some(1) {
                updates.changed().await.unwrap();
            }
        })
        .await;
        assert!(waited.is_ok());
        assert_eq!(room.snapshot().current_player_id(), Some(2));
    }

    #[tokio::test]
    async fn test_lobby_summary() {
        let room = open(Some("pw"));
        let summary = room.to_lobby_game();
        assert_eq!(summary.name, "Test Room");
        assert_eq!(summary.player_count, 1);
        assert_eq!(summary.max_players, 4);
        assert!(summary.has_password);
        assert_eq!(summary.phase, GamePhase::Waiting);
    }
}
