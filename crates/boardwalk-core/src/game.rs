//! Core game state machine.
//!
//! This module contains the serializable `GameState`, the `Game` that owns it
//! together with the private decks and RNG, and all turn logic: dice,
//! movement, landing resolution, jail, purchases, building, mortgages, turn
//! rotation and the turn timer. Auctions, trades and debt live in their own
//! modules as further `impl Game` blocks.

use crate::actions::{GameAction, GameEvent, JailExit, TradeOffer};
use crate::auction::Auction;
use crate::board::{
    tile, Money, PlayerId, Tile, TileIndex, TileKind, BOARD_SIZE, GO_SALARY, JAIL_FINE,
    MAX_HOUSES, MAX_JAIL_TURNS,
};
use crate::cards::{Card, CardEffect, Deck, DeckKind};
use crate::config::{HouseRules, MIN_PLAYERS};
use crate::debt::Payee;
use crate::ownership::{OwnedProperty, Ownership};
use crate::player::Player;
use crate::rules;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, warn};

/// Entries kept in the in-game log
pub const MAX_LOG_ENTRIES: usize = 200;

/// Longest chat message, in characters
pub const MAX_CHAT_LEN: usize = 200;

/// Longest display name, in characters
pub const MAX_NAME_LEN: usize = 24;

/// Doubles in a row that send a player to jail
const MAX_DOUBLES: u8 = 3;

/// Upper bound on chained landing steps in one move
const MAX_RESOLUTION_STEPS: usize = 16;

/// Lifecycle of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Lobby: players joining, waiting for the host to start
    Waiting,
    Playing,
    Finished,
}

/// Sub-state of the current turn, gating which actions are valid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    /// Must roll (or leave jail) first
    PreRoll,
    /// Landed on an unowned tile; must buy or decline
    AwaitingBuy,
    /// May build, mortgage, trade or end the turn
    PostRoll,
    /// A declined tile is being auctioned
    Auction(Auction),
    /// A trade offer is waiting for an answer
    Trade(TradeOffer),
}

/// Kind of in-game log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    System,
    Action,
    Chat,
}

/// One line in the in-game log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Milliseconds since the Unix epoch
    pub ts: u64,
    pub kind: LogKind,
    pub message: String,
    pub player: Option<PlayerId>,
}

/// Errors that can occur when applying actions
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Not your turn")]
    NotYourTurn,

    #[error("Invalid action for current phase")]
    InvalidPhase,

    #[error("Game has not started")]
    GameNotInProgress,

    #[error("Insufficient funds")]
    InsufficientFunds,

    #[error("That tile cannot be bought")]
    NotPurchasable,

    #[error("That tile is already owned")]
    AlreadyOwned,

    #[error("You do not own that tile")]
    NotOwner,

    #[error("Already mortgaged")]
    AlreadyMortgaged,

    #[error("Not mortgaged")]
    NotMortgaged,

    #[error("Sell all houses in the color group first")]
    HousesPresent,

    #[error("Cannot build there")]
    CannotBuild,

    #[error("Cannot sell a house there")]
    CannotSell,

    #[error("Not in jail")]
    NotInJail,

    #[error("No Get Out of Jail Free cards")]
    NoJailTokens,

    #[error("A trade is already pending")]
    TradePending,

    #[error("No active trade")]
    NoActiveTrade,

    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    #[error("No auction in progress")]
    NoAuction,

    #[error("You are not in this auction")]
    NotInAuction,

    #[error("Bid must beat the current bid")]
    BidTooLow,

    #[error("Unknown player")]
    UnknownPlayer,

    #[error("Player already in game")]
    DuplicatePlayer,

    #[error("Game is full")]
    GameFull,

    #[error("Only the host can do that")]
    NotHost,

    #[error("Need at least two players")]
    NotEnoughPlayers,

    #[error("You are bankrupt")]
    PlayerBankrupt,

    #[error("Dice must show 1 to 6")]
    InvalidDice,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Game is over")]
    GameOver,
}

/// The complete, serializable game state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub name: String,
    pub phase: GamePhase,
    /// All players, in turn order. The first is the host.
    pub players: Vec<Player>,
    /// Index into `players` of whoever's turn it is
    pub current_player: usize,
    pub turn: TurnPhase,
    /// Starts at 1 when the game starts
    pub turn_number: u32,
    pub ownership: Ownership,
    pub last_dice: Option<(u8, u8)>,
    /// Doubles rolled in a row this turn
    pub doubles_count: u8,
    pub last_card: Option<Card>,
    pub rules: HouseRules,
    pub free_parking_pool: Money,
    pub log: VecDeque<LogEntry>,
    /// Seconds left on the turn timer, when enabled
    pub turn_time_left: Option<u32>,
    pub winner: Option<PlayerId>,
}

impl GameState {
    /// Look up a player by id
    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Position of a player in turn order
    pub fn player_index(&self, id: PlayerId) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    /// The host is whoever sits first
    pub fn host(&self) -> Option<PlayerId> {
        self.players.first().map(|p| p.id)
    }

    /// Id of the player whose turn it is
    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.players.get(self.current_player).map(|p| p.id)
    }

    /// Players still in the game
    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_active())
    }

    pub fn is_finished(&self) -> bool {
        self.phase == GamePhase::Finished
    }

    /// The running auction, if any
    pub fn auction(&self) -> Option<&Auction> {
        match &self.turn {
            TurnPhase::Auction(auction) => Some(auction),
            _ => None,
        }
    }

    /// The pending trade, if any
    pub fn pending_trade(&self) -> Option<&TradeOffer> {
        match &self.turn {
            TurnPhase::Trade(offer) => Some(offer),
            _ => None,
        }
    }
}

/// A single game: its state plus the private decks and dice
#[derive(Debug, Clone)]
pub struct Game {
    pub state: GameState,
    chance: Deck,
    chest: Deck,
    rng: StdRng,
}

/// One pending unit of landing resolution
#[derive(Debug)]
enum Step {
    Land,
    Draw(DeckKind),
    Apply(Card),
}

impl Game {
    /// Create a game in the lobby with its host seated
    pub fn new(host_id: PlayerId, host_name: &str, name: &str, rules: HouseRules) -> Self {
        Self::from_rng(host_id, host_name, name, rules, StdRng::from_entropy())
    }

    /// Create a game with reproducible dice and decks
    pub fn with_seed(
        host_id: PlayerId,
        host_name: &str,
        name: &str,
        rules: HouseRules,
        seed: u64,
    ) -> Self {
        Self::from_rng(host_id, host_name, name, rules, StdRng::seed_from_u64(seed))
    }

    fn from_rng(
        host_id: PlayerId,
        host_name: &str,
        name: &str,
        rules: HouseRules,
        mut rng: StdRng,
    ) -> Self {
        let rules = rules.normalized();
        let chance = Deck::new(DeckKind::Chance, &mut rng);
        let chest = Deck::new(DeckKind::Chest, &mut rng);
        let host = Player::new(
            host_id,
            clean_name(host_name, 0),
            0,
            rules.starting_cash,
        );

        let mut game = Self {
            state: GameState {
                name: name.trim().to_string(),
                phase: GamePhase::Waiting,
                players: vec![host],
                current_player: 0,
                turn: TurnPhase::PreRoll,
                turn_number: 0,
                ownership: Ownership::new(),
                last_dice: None,
                doubles_count: 0,
                last_card: None,
                rules,
                free_parking_pool: 0,
                log: VecDeque::new(),
                turn_time_left: None,
                winner: None,
            },
            chance,
            chest,
            rng,
        };
        let message = format!("{} created the game", game.state.players[0].name);
        game.log(LogKind::System, message, Some(host_id));
        game
    }

    // ==================== Lobby ====================

    /// Seat a new player in the lobby
    pub fn add_player(&mut self, id: PlayerId, name: &str) -> Result<Vec<GameEvent>, GameError> {
        match self.state.phase {
            GamePhase::Waiting => {}
            GamePhase::Playing => return Err(GameError::InvalidPhase),
            GamePhase::Finished => return Err(GameError::GameOver),
        }
        let seat = self.state.players.len();
        let name = clean_name(name, seat);
        if self
            .state
            .players
            .iter()
            .any(|p| p.id == id || p.name == name)
        {
            return Err(GameError::DuplicatePlayer);
        }
        if seat >= self.state.rules.max_players {
            return Err(GameError::GameFull);
        }

        self.state
            .players
            .push(Player::new(id, name.clone(), seat, self.state.rules.starting_cash));
        self.log(LogKind::System, format!("{} joined", name), Some(id));
        Ok(vec![GameEvent::PlayerJoined { player: id, name }])
    }

    /// Mark a seated player as connected again
    pub fn reconnect_player(&mut self, id: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.index_of(id)?;
        self.state.players[idx].connected = true;
        let message = format!("{} reconnected", self.state.players[idx].name);
        self.log(LogKind::System, message, Some(id));
        Ok(vec![GameEvent::PlayerReconnected { player: id }])
    }

    /// Mark a player as disconnected; they keep their seat
    pub fn disconnect_player(&mut self, id: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.index_of(id)?;
        self.state.players[idx].connected = false;
        let message = format!("{} disconnected", self.state.players[idx].name);
        self.log(LogKind::System, message, Some(id));
        Ok(vec![GameEvent::PlayerDisconnected { player: id }])
    }

    /// Remove a player from the lobby. The next player becomes host if the
    /// host leaves.
    pub fn remove_player(&mut self, id: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        if self.state.phase != GamePhase::Waiting {
            return Err(GameError::InvalidPhase);
        }
        let idx = self.index_of(id)?;
        let removed = self.state.players.remove(idx);
        self.log(LogKind::System, format!("{} left", removed.name), Some(id));
        if idx == 0 {
            if let Some(host) = self.state.players.first() {
                let message = format!("{} is now the host", host.name);
                let host_id = host.id;
                self.log(LogKind::System, message, Some(host_id));
            }
        }
        Ok(vec![GameEvent::PlayerRemoved { player: id }])
    }

    /// Seated, disconnected player with this display name
    pub fn find_disconnected_by_name(&self, name: &str) -> Option<PlayerId> {
        let name = name.trim();
        self.state
            .players
            .iter()
            .find(|p| !p.connected && p.name == name)
            .map(|p| p.id)
    }

    /// Start play. Host only, with at least two players seated.
    pub fn start_game(&mut self, requester: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        match self.state.phase {
            GamePhase::Waiting => {}
            GamePhase::Playing => return Err(GameError::InvalidPhase),
            GamePhase::Finished => return Err(GameError::GameOver),
        }
        self.index_of(requester)?;
        if self.state.host() != Some(requester) {
            return Err(GameError::NotHost);
        }
        if self.state.players.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers);
        }

        self.state.phase = GamePhase::Playing;
        self.state.current_player = 0;
        self.state.turn = TurnPhase::PreRoll;
        self.state.turn_number = 1;
        self.restart_timer();

        let first = self.state.players[0].id;
        let message = format!("Game started. {} goes first", self.state.players[0].name);
        self.log(LogKind::System, message, None);
        debug!(game = %self.state.name, players = self.state.players.len(), "game started");
        Ok(vec![GameEvent::GameStarted {
            first_player: first,
        }])
    }

    // ==================== Actions ====================

    /// Apply an action to the game state
    pub fn apply_action(
        &mut self,
        player: PlayerId,
        action: GameAction,
    ) -> Result<Vec<GameEvent>, GameError> {
        let chat = matches!(action, GameAction::Chat { .. });
        if !chat {
            self.require_playing()?;
            let idx = self.index_of(player)?;
            if self.state.players[idx].bankrupt {
                return Err(GameError::PlayerBankrupt);
            }
        }

        let mut events = match action {
            GameAction::RollDice => {
                let dice = (self.rng.gen_range(1..=6), self.rng.gen_range(1..=6));
                self.roll(player, dice)?
            }
            GameAction::PayJailFine => self.pay_jail_fine(player)?,
            GameAction::UseJailToken => self.use_jail_token(player)?,
            GameAction::EndTurn => self.end_turn(player)?,
            GameAction::BuyProperty => self.buy_property(player)?,
            GameAction::DeclineProperty => self.decline_property(player)?,
            GameAction::PlaceBid { amount } => self.place_bid(player, amount)?,
            GameAction::WithdrawBid => self.withdraw_bid(player)?,
            GameAction::BuildHouse { tile } => self.build_house(player, tile)?,
            GameAction::SellHouse { tile } => self.sell_house(player, tile)?,
            GameAction::Mortgage { tile } => self.mortgage(player, tile)?,
            GameAction::Unmortgage { tile } => self.unmortgage(player, tile)?,
            GameAction::ProposeTrade(offer) => self.propose_trade(player, offer)?,
            GameAction::AcceptTrade => self.accept_trade(player)?,
            GameAction::RejectTrade => self.reject_trade(player)?,
            GameAction::Chat { text } => return self.send_chat(player, &text),
        };
        self.settle(&mut events);
        Ok(events)
    }

    /// Roll with known dice. `RollDice` draws dice from the game's RNG and
    /// goes through the same path.
    pub fn apply_roll(
        &mut self,
        player: PlayerId,
        dice: (u8, u8),
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_playing()?;
        let mut events = self.roll(player, dice)?;
        self.settle(&mut events);
        Ok(events)
    }

    /// Post chat to the log. Allowed in any phase.
    pub fn send_chat(&mut self, player: PlayerId, text: &str) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.index_of(player)?;
        let text: String = text.trim().chars().take(MAX_CHAT_LEN).collect();
        if text.is_empty() {
            return Err(GameError::EmptyMessage);
        }
        let message = format!("{}: {}", self.state.players[idx].name, text);
        self.log(LogKind::Chat, message, Some(player));
        Ok(vec![GameEvent::ChatMessage { player, text }])
    }

    // ==================== Dice & Movement ====================

    fn roll(&mut self, player: PlayerId, dice: (u8, u8)) -> Result<Vec<GameEvent>, GameError> {
        let (d1, d2) = dice;
        if !(1..=6).contains(&d1) || !(1..=6).contains(&d2) {
            return Err(GameError::InvalidDice);
        }
        let idx = self.require_current(player)?;
        if self.state.turn != TurnPhase::PreRoll {
            return Err(GameError::InvalidPhase);
        }

        let total = d1 + d2;
        let doubles = d1 == d2;
        let mut events = vec![GameEvent::DiceRolled {
            player,
            dice,
            total,
        }];
        self.state.last_dice = Some(dice);
        self.state.last_card = None;
        let message = format!("{} rolled {} + {}", self.state.players[idx].name, d1, d2);
        self.log(LogKind::Action, message, Some(player));

        if self.state.players[idx].in_jail {
            if doubles {
                self.state.players[idx].release_from_jail();
                self.state.doubles_count = 0;
                events.push(GameEvent::ReleasedFromJail {
                    player,
                    exit: JailExit::Doubles,
                });
            } else {
                self.state.players[idx].jail_turns += 1;
                if self.state.players[idx].jail_turns < MAX_JAIL_TURNS {
                    self.state.turn = TurnPhase::PostRoll;
                    return Ok(events);
                }

                let payee = self.fine_payee();
                if !self.charge(idx, JAIL_FINE, payee, &mut events) {
                    self.state.turn = TurnPhase::PostRoll;
                    return Ok(events);
                }
                self.state.players[idx].release_from_jail();
                events.push(GameEvent::ReleasedFromJail {
                    player,
                    exit: JailExit::Fine,
                });
            }
        } else if doubles {
            self.state.doubles_count += 1;
            if self.state.doubles_count >= MAX_DOUBLES {
                self.jail(idx, &mut events);
                self.state.turn = TurnPhase::PostRoll;
                return Ok(events);
            }
        } else {
            self.state.doubles_count = 0;
        }

        self.advance_player(idx, total as usize, &mut events);
        self.resolve_landing(idx, &mut events);
        Ok(events)
    }

    /// Move forward, paying salary if GO is reached or passed
    fn advance_player(&mut self, idx: usize, spaces: usize, events: &mut Vec<GameEvent>) {
        let from = self.state.players[idx].position;
        let passed_go = self.state.players[idx].advance(spaces);
        if passed_go {
            self.pay_salary(idx, events);
        }
        events.push(GameEvent::Moved {
            player: self.state.players[idx].id,
            from,
            to: self.state.players[idx].position,
        });
    }

    /// Jump to an absolute tile
    fn move_to(
        &mut self,
        idx: usize,
        target: TileIndex,
        collect_go: bool,
        events: &mut Vec<GameEvent>,
    ) {
        let from = self.state.players[idx].position;
        self.state.players[idx].position = target % BOARD_SIZE;
        if collect_go && target < from {
            self.pay_salary(idx, events);
        }
        events.push(GameEvent::Moved {
            player: self.state.players[idx].id,
            from,
            to: self.state.players[idx].position,
        });
    }

    fn pay_salary(&mut self, idx: usize, events: &mut Vec<GameEvent>) {
        let player = &mut self.state.players[idx];
        let salary = if player.position == 0 && self.state.rules.double_on_go {
            GO_SALARY * 2
        } else {
            GO_SALARY
        };
        player.cash += salary;
        events.push(GameEvent::PassedGo {
            player: player.id,
            salary,
        });
    }

    fn jail(&mut self, idx: usize, events: &mut Vec<GameEvent>) {
        self.state.players[idx].send_to_jail();
        self.state.doubles_count = 0;
        let player = self.state.players[idx].id;
        let message = format!("{} was sent to jail", self.state.players[idx].name);
        self.log(LogKind::Action, message, Some(player));
        events.push(GameEvent::SentToJail { player });
    }

    // ==================== Landing Resolution ====================

    /// Resolve where the player stands, following card chains until settled.
    /// Ends in `AwaitingBuy` or `PostRoll`.
    fn resolve_landing(&mut self, idx: usize, events: &mut Vec<GameEvent>) {
        self.state.turn = TurnPhase::PostRoll;
        let mut queue = VecDeque::from([Step::Land]);
        let mut steps = 0;

        while let Some(step) = queue.pop_front() {
            steps += 1;
            if steps > MAX_RESOLUTION_STEPS {
                warn!(
                    game = %self.state.name,
                    player = self.state.players[idx].id,
                    "landing resolution step limit reached"
                );
                self.state.turn = TurnPhase::PostRoll;
                break;
            }

            let next = match step {
                Step::Land => self.land(idx, events),
                Step::Draw(kind) => Some(self.draw_card(idx, kind, events)),
                Step::Apply(card) => self.apply_card(idx, card, events),
            };

            if self.state.players[idx].bankrupt || self.state.phase != GamePhase::Playing {
                break;
            }
            queue.extend(next);
        }
    }

    /// Apply the effect of the tile under the player
    fn land(&mut self, idx: usize, events: &mut Vec<GameEvent>) -> Option<Step> {
        let position = self.state.players[idx].position;
        let player = self.state.players[idx].id;

        match tile(position).kind {
            TileKind::Go | TileKind::Jail => None,
            TileKind::FreeParking => {
                let pool = self.state.free_parking_pool;
                if self.state.rules.free_parking && pool > 0 {
                    self.state.free_parking_pool = 0;
                    self.state.players[idx].cash += pool;
                    let message =
                        format!("{} collected ${} from Free Parking", self.state.players[idx].name, pool);
                    self.log(LogKind::Action, message, Some(player));
                    events.push(GameEvent::FreeParkingCollected {
                        player,
                        amount: pool,
                    });
                }
                None
            }
            TileKind::GoToJail => {
                self.jail(idx, events);
                None
            }
            TileKind::Chance => Some(Step::Draw(DeckKind::Chance)),
            TileKind::Chest => Some(Step::Draw(DeckKind::Chest)),
            TileKind::Tax { amount } => {
                events.push(GameEvent::TaxPaid { player, amount });
                let message = format!("{} paid ${} tax", self.state.players[idx].name, amount);
                self.log(LogKind::Action, message, Some(player));
                let payee = self.fine_payee();
                self.charge(idx, amount, payee, events);
                None
            }
            TileKind::Property(_) | TileKind::Station { .. } | TileKind::Utility { .. } => {
                match self.state.ownership.get(position).copied() {
                    None => self.state.turn = TurnPhase::AwaitingBuy,
                    Some(deed) if deed.owner == player || deed.mortgaged => {}
                    Some(deed) => {
                        let dice_total = self
                            .state
                            .last_dice
                            .map(|(a, b)| a + b)
                            .unwrap_or(0);
                        let amount = rules::rent(position, &self.state.ownership, dice_total);
                        let owner_idx = self
                            .state
                            .player_index(deed.owner)
                            .expect("tile owner is seated");
                        if amount > 0 {
                            events.push(GameEvent::RentPaid {
                                from: player,
                                to: deed.owner,
                                tile: position,
                                amount,
                            });
                            let message = format!(
                                "{} paid ${} rent to {}",
                                self.state.players[idx].name,
                                amount,
                                self.state.players[owner_idx].name
                            );
                            self.log(LogKind::Action, message, Some(player));
                            self.charge(idx, amount, Payee::Player(owner_idx), events);
                        }
                    }
                }
                None
            }
        }
    }

    fn draw_card(&mut self, idx: usize, kind: DeckKind, events: &mut Vec<GameEvent>) -> Step {
        let card = match kind {
            DeckKind::Chance => self.chance.draw(&mut self.rng),
            DeckKind::Chest => self.chest.draw(&mut self.rng),
        };
        let player = self.state.players[idx].id;
        let message = format!(
            "{} drew {}: {}",
            self.state.players[idx].name,
            kind.name(),
            card.text
        );
        self.log(LogKind::Action, message, Some(player));
        events.push(GameEvent::CardDrawn {
            player,
            deck: kind,
            card_id: card.id.clone(),
            text: card.text.clone(),
        });
        self.state.last_card = Some(card.clone());
        Step::Apply(card)
    }

    fn apply_card(&mut self, idx: usize, card: Card, events: &mut Vec<GameEvent>) -> Option<Step> {
        let player = self.state.players[idx].id;
        match card.effect {
            CardEffect::Collect { amount } => {
                self.state.players[idx].cash += amount;
                events.push(GameEvent::CashReceived { player, amount });
                None
            }
            CardEffect::Pay { amount } => {
                events.push(GameEvent::CashPaid { player, amount });
                let payee = self.fine_payee();
                self.charge(idx, amount, payee, events);
                None
            }
            CardEffect::MoveTo {
                position,
                collect_go,
            } => {
                self.move_to(idx, position, collect_go, events);
                Some(Step::Land)
            }
            CardEffect::MoveBack { spaces } => {
                let from = self.state.players[idx].position;
                self.state.players[idx].retreat(spaces);
                events.push(GameEvent::Moved {
                    player,
                    from,
                    to: self.state.players[idx].position,
                });
                Some(Step::Land)
            }
            CardEffect::GoToJail => {
                self.jail(idx, events);
                None
            }
            CardEffect::JailRelease => {
                self.state.players[idx].jail_release_tokens += 1;
                None
            }
            CardEffect::CollectFromEach { amount } => {
                let others: Vec<usize> = self.other_active(idx);
                for other in others {
                    self.charge(other, amount, Payee::Player(idx), events);
                }
                None
            }
            CardEffect::PayEach { amount } => {
                let others = self.other_active(idx);
                let total = amount * others.len() as Money;
                events.push(GameEvent::CashPaid {
                    player,
                    amount: total,
                });
                if self.charge(idx, total, Payee::Bank, events) {
                    for other in others {
                        self.state.players[other].cash += amount;
                    }
                }
                None
            }
            CardEffect::Repairs {
                per_house,
                per_hotel,
            } => {
                let cost: Money = self
                    .state
                    .ownership
                    .owned_by(player)
                    .map(|d| {
                        if d.has_hotel() {
                            per_hotel
                        } else {
                            d.houses as Money * per_house
                        }
                    })
                    .sum();
                if cost > 0 {
                    events.push(GameEvent::CashPaid {
                        player,
                        amount: cost,
                    });
                    let payee = self.fine_payee();
                    self.charge(idx, cost, payee, events);
                }
                None
            }
            CardEffect::AdvanceToNearest { kind } => {
                let target = rules::nearest(self.state.players[idx].position, kind);
                self.move_to(idx, target, true, events);
                Some(Step::Land)
            }
        }
    }

    // ==================== Jail ====================

    fn pay_jail_fine(&mut self, player: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.require_current(player)?;
        if self.state.turn != TurnPhase::PreRoll {
            return Err(GameError::InvalidPhase);
        }
        if !self.state.players[idx].in_jail {
            return Err(GameError::NotInJail);
        }
        if !self.state.players[idx].can_afford(JAIL_FINE) {
            return Err(GameError::InsufficientFunds);
        }

        self.state.players[idx].cash -= JAIL_FINE;
        if self.state.rules.free_parking {
            self.state.free_parking_pool += JAIL_FINE;
        }
        self.state.players[idx].release_from_jail();
        let message = format!("{} paid ${} to leave jail", self.state.players[idx].name, JAIL_FINE);
        self.log(LogKind::Action, message, Some(player));
        Ok(vec![GameEvent::ReleasedFromJail {
            player,
            exit: JailExit::Fine,
        }])
    }

    fn use_jail_token(&mut self, player: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.require_current(player)?;
        if self.state.turn != TurnPhase::PreRoll {
            return Err(GameError::InvalidPhase);
        }
        if !self.state.players[idx].in_jail {
            return Err(GameError::NotInJail);
        }
        if self.state.players[idx].jail_release_tokens == 0 {
            return Err(GameError::NoJailTokens);
        }

        self.state.players[idx].jail_release_tokens -= 1;
        self.state.players[idx].release_from_jail();
        let message = format!("{} used a Get Out of Jail Free card", self.state.players[idx].name);
        self.log(LogKind::Action, message, Some(player));
        Ok(vec![GameEvent::ReleasedFromJail {
            player,
            exit: JailExit::Token,
        }])
    }

    // ==================== Buying ====================

    fn buy_property(&mut self, player: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.require_current(player)?;
        if self.state.turn != TurnPhase::AwaitingBuy {
            return Err(GameError::InvalidPhase);
        }
        let position = self.state.players[idx].position;
        let price = tile(position).price().ok_or(GameError::NotPurchasable)?;
        if self.state.ownership.is_owned(position) {
            return Err(GameError::AlreadyOwned);
        }
        if !self.state.players[idx].can_afford(price) {
            return Err(GameError::InsufficientFunds);
        }

        self.state.players[idx].cash -= price;
        self.grant_tile(position, idx);
        self.state.turn = TurnPhase::PostRoll;
        let message = format!(
            "{} bought {} for ${}",
            self.state.players[idx].name,
            tile(position).name,
            price
        );
        self.log(LogKind::Action, message, Some(player));
        Ok(vec![GameEvent::PropertyBought {
            player,
            tile: position,
            price,
        }])
    }

    fn decline_property(&mut self, player: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.require_current(player)?;
        if self.state.turn != TurnPhase::AwaitingBuy {
            return Err(GameError::InvalidPhase);
        }
        let mut events = Vec::new();
        self.decline_purchase(idx, &mut events);
        Ok(events)
    }

    /// Pass on the pending purchase, auctioning it if the rules say so
    fn decline_purchase(&mut self, idx: usize, events: &mut Vec<GameEvent>) {
        let position = self.state.players[idx].position;
        let player = self.state.players[idx].id;
        events.push(GameEvent::PropertyDeclined {
            player,
            tile: position,
        });
        let message = format!(
            "{} declined {}",
            self.state.players[idx].name,
            tile(position).name
        );
        self.log(LogKind::Action, message, Some(player));

        if self.state.rules.auction_on_decline {
            self.start_auction(position, events);
        } else {
            self.state.turn = TurnPhase::PostRoll;
        }
    }

    // ==================== Building ====================

    fn build_house(&mut self, player: PlayerId, tile_index: TileIndex) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.require_current(player)?;
        if !matches!(self.state.turn, TurnPhase::PreRoll | TurnPhase::PostRoll) {
            return Err(GameError::InvalidPhase);
        }
        let info = *check_tile(tile_index)?
            .property_info()
            .ok_or(GameError::CannotBuild)?;
        if self.state.ownership.owner_of(tile_index) != Some(player) {
            return Err(GameError::NotOwner);
        }
        if !rules::can_build_house(tile_index, player, &self.state.ownership) {
            return Err(GameError::CannotBuild);
        }
        if !self.state.players[idx].can_afford(info.house_cost) {
            return Err(GameError::InsufficientFunds);
        }

        self.state.players[idx].cash -= info.house_cost;
        let deed = self.deed_mut(tile_index);
        deed.houses += 1;
        let houses = deed.houses;
        let what = if houses == MAX_HOUSES { "a hotel" } else { "a house" };
        let message = format!(
            "{} built {} on {}",
            self.state.players[idx].name,
            what,
            tile(tile_index).name
        );
        self.log(LogKind::Action, message, Some(player));
        Ok(vec![GameEvent::HouseBuilt {
            player,
            tile: tile_index,
            houses,
        }])
    }

    fn sell_house(&mut self, player: PlayerId, tile_index: TileIndex) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.require_current(player)?;
        let info = *check_tile(tile_index)?
            .property_info()
            .ok_or(GameError::CannotSell)?;
        if self.state.ownership.owner_of(tile_index) != Some(player) {
            return Err(GameError::NotOwner);
        }
        if !rules::can_sell_house(tile_index, player, &self.state.ownership) {
            return Err(GameError::CannotSell);
        }

        let refund = rules::house_sale_value(&info);
        let deed = self.deed_mut(tile_index);
        deed.houses -= 1;
        let houses = deed.houses;
        self.state.players[idx].cash += refund;
        let message = format!(
            "{} sold a house on {} for ${}",
            self.state.players[idx].name,
            tile(tile_index).name,
            refund
        );
        self.log(LogKind::Action, message, Some(player));
        Ok(vec![GameEvent::HouseSold {
            player,
            tile: tile_index,
            houses,
        }])
    }

    // ==================== Mortgages ====================

    fn mortgage(&mut self, player: PlayerId, tile_index: TileIndex) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.index_of(player)?;
        let t = check_tile(tile_index)?;
        let value = t.mortgage_value().ok_or(GameError::NotPurchasable)?;
        let deed = self
            .state
            .ownership
            .get(tile_index)
            .filter(|d| d.owner == player)
            .ok_or(GameError::NotOwner)?;
        if deed.mortgaged {
            return Err(GameError::AlreadyMortgaged);
        }
        if let Some(info) = t.property_info() {
            if rules::group_has_houses(info.group, &self.state.ownership) {
                return Err(GameError::HousesPresent);
            }
        }

        self.deed_mut(tile_index).mortgaged = true;
        self.state.players[idx].cash += value;
        let message = format!(
            "{} mortgaged {} for ${}",
            self.state.players[idx].name, t.name, value
        );
        self.log(LogKind::Action, message, Some(player));
        Ok(vec![GameEvent::Mortgaged {
            player,
            tile: tile_index,
            amount: value,
        }])
    }

    fn unmortgage(&mut self, player: PlayerId, tile_index: TileIndex) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.index_of(player)?;
        let t = check_tile(tile_index)?;
        let value = t.mortgage_value().ok_or(GameError::NotPurchasable)?;
        let deed = self
            .state
            .ownership
            .get(tile_index)
            .filter(|d| d.owner == player)
            .ok_or(GameError::NotOwner)?;
        if !deed.mortgaged {
            return Err(GameError::NotMortgaged);
        }
        // A live bid was validated against the bidder's cash
        if matches!(self.state.turn, TurnPhase::Auction(_)) {
            return Err(GameError::InvalidPhase);
        }
        let cost = rules::unmortgage_cost(value);
        if !self.state.players[idx].can_afford(cost) {
            return Err(GameError::InsufficientFunds);
        }

        self.state.players[idx].cash -= cost;
        self.deed_mut(tile_index).mortgaged = false;
        let message = format!(
            "{} unmortgaged {} for ${}",
            self.state.players[idx].name, t.name, cost
        );
        self.log(LogKind::Action, message, Some(player));
        Ok(vec![GameEvent::Unmortgaged {
            player,
            tile: tile_index,
            cost,
        }])
    }

    // ==================== Turn Flow ====================

    fn end_turn(&mut self, player: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.require_current(player)?;
        if self.state.turn != TurnPhase::PostRoll {
            return Err(GameError::InvalidPhase);
        }

        let mut events = Vec::new();
        if self.state.doubles_count > 0 && !self.state.players[idx].in_jail {
            self.state.turn = TurnPhase::PreRoll;
            self.state.last_dice = None;
            self.restart_timer();
            let message = format!("{} rolled doubles and goes again", self.state.players[idx].name);
            self.log(LogKind::System, message, Some(player));
            events.push(GameEvent::RollAgain { player });
        } else {
            self.advance_turn(&mut events);
        }
        Ok(events)
    }

    /// Hand the turn to the next player still in the game
    pub(crate) fn advance_turn(&mut self, events: &mut Vec<GameEvent>) {
        let count = self.state.players.len();
        let previous = self.state.players[self.state.current_player].id;
        let mut next = self.state.current_player;
        for _ in 0..count {
            next = (next + 1) % count;
            if !self.state.players[next].bankrupt {
                break;
            }
        }

        self.state.current_player = next;
        self.state.turn = TurnPhase::PreRoll;
        self.state.last_dice = None;
        self.state.doubles_count = 0;
        self.state.last_card = None;
        self.state.turn_number += 1;
        self.restart_timer();

        let next_id = self.state.players[next].id;
        let message = format!("It is {}'s turn", self.state.players[next].name);
        self.log(LogKind::System, message, Some(next_id));
        events.push(GameEvent::TurnEnded {
            player: previous,
            next: next_id,
        });
    }

    /// Clean up after a command: a bankrupt current player loses the turn
    /// and an auction with no contest left is closed.
    fn settle(&mut self, events: &mut Vec<GameEvent>) {
        if self.state.phase != GamePhase::Playing {
            return;
        }
        if self
            .state
            .auction()
            .is_some_and(|a| a.bidders.len() <= 1)
        {
            self.resolve_auction(events);
        }
        if self.state.players[self.state.current_player].bankrupt {
            self.advance_turn(events);
        }
    }

    // ==================== Timer ====================

    /// Advance the turn timer by one second.
    ///
    /// Returns `None` when nothing changed. On expiry the turn is forced
    /// forward: a pending purchase is declined, an auction closed, a trade
    /// rejected, and the turn passes on.
    pub fn tick(&mut self) -> Option<Vec<GameEvent>> {
        if self.state.phase != GamePhase::Playing {
            return None;
        }
        let left = self.state.turn_time_left?;
        if left > 1 {
            self.state.turn_time_left = Some(left - 1);
            return Some(Vec::new());
        }
        self.state.turn_time_left = Some(0);
        Some(self.expire_turn())
    }

    fn expire_turn(&mut self) -> Vec<GameEvent> {
        let idx = self.state.current_player;
        let player = self.state.players[idx].id;
        let mut events = vec![GameEvent::TurnTimedOut { player }];
        let message = format!("{} ran out of time", self.state.players[idx].name);
        self.log(LogKind::System, message, Some(player));

        if self.state.turn == TurnPhase::AwaitingBuy {
            self.decline_purchase(idx, &mut events);
        }
        if matches!(self.state.turn, TurnPhase::Auction(_)) {
            self.resolve_auction(&mut events);
        }
        if let TurnPhase::Trade(offer) = &self.state.turn {
            let by = offer.to;
            self.state.turn = TurnPhase::PostRoll;
            events.push(GameEvent::TradeRejected { by });
        }

        self.state.doubles_count = 0;
        if self.state.phase == GamePhase::Playing {
            self.advance_turn(&mut events);
        }
        events
    }

    pub(crate) fn restart_timer(&mut self) {
        self.state.turn_time_left = self
            .state
            .rules
            .timer_enabled()
            .then_some(self.state.rules.turn_timer_secs);
    }

    // ==================== Helpers ====================

    pub(crate) fn require_playing(&self) -> Result<(), GameError> {
        match self.state.phase {
            GamePhase::Playing => Ok(()),
            GamePhase::Waiting => Err(GameError::GameNotInProgress),
            GamePhase::Finished => Err(GameError::GameOver),
        }
    }

    pub(crate) fn index_of(&self, player: PlayerId) -> Result<usize, GameError> {
        self.state
            .player_index(player)
            .ok_or(GameError::UnknownPlayer)
    }

    /// Index of `player`, who must be the active current player
    pub(crate) fn require_current(&self, player: PlayerId) -> Result<usize, GameError> {
        let idx = self.index_of(player)?;
        if self.state.players[idx].bankrupt {
            return Err(GameError::PlayerBankrupt);
        }
        if idx != self.state.current_player {
            return Err(GameError::NotYourTurn);
        }
        Ok(idx)
    }

    /// Indices of active players other than `idx`, in turn order
    fn other_active(&self, idx: usize) -> Vec<usize> {
        (0..self.state.players.len())
            .filter(|&i| i != idx && self.state.players[i].is_active())
            .collect()
    }

    /// Where fines and card payments go
    fn fine_payee(&self) -> Payee {
        if self.state.rules.free_parking {
            Payee::Pool
        } else {
            Payee::Bank
        }
    }

    pub(crate) fn deed_mut(&mut self, tile_index: TileIndex) -> &mut OwnedProperty {
        self.state
            .ownership
            .get_mut(tile_index)
            .expect("ownership record exists")
    }

    /// Give an unowned tile to a player
    pub(crate) fn grant_tile(&mut self, tile_index: TileIndex, to: usize) {
        let owner = self.state.players[to].id;
        self.state
            .ownership
            .insert(OwnedProperty::new(tile_index, owner));
        self.state.players[to].add_property(tile_index);
    }

    /// Move an owned tile to another player, keeping improvements and mortgage
    pub(crate) fn transfer_tile(&mut self, tile_index: TileIndex, to: usize) {
        let new_owner = self.state.players[to].id;
        let deed = self.deed_mut(tile_index);
        let old_owner = deed.owner;
        deed.owner = new_owner;
        if let Some(from) = self.state.player_index(old_owner) {
            self.state.players[from].remove_property(tile_index);
        }
        self.state.players[to].add_property(tile_index);
    }

    /// Append to the in-game log, dropping the oldest entries past the cap
    pub(crate) fn log(&mut self, kind: LogKind, message: String, player: Option<PlayerId>) {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.state.log.push_back(LogEntry {
            ts,
            kind,
            message,
            player,
        });
        while self.state.log.len() > MAX_LOG_ENTRIES {
            self.state.log.pop_front();
        }
    }
}

/// Reject tile indices off the board
fn check_tile(tile_index: TileIndex) -> Result<&'static Tile, GameError> {
    if tile_index >= BOARD_SIZE {
        return Err(GameError::NotPurchasable);
    }
    Ok(tile(tile_index))
}

/// Trim and shorten a display name, falling back to a seat label
fn clean_name(name: &str, seat: usize) -> String {
    let name: String = name.trim().chars().take(MAX_NAME_LEN).collect();
    if name.is_empty() {
        format!("Player {}", seat + 1)
    } else {
        name
    }
}
