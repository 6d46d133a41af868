//! Boardwalk - a property trading board game engine
//!
//! This crate provides the authoritative game logic for Boardwalk, including:
//! - The 40-tile board and the Chance / Community Chest decks
//! - Pure rule functions for rent, building, and liquidation
//! - Player state and house rules
//! - The game state machine with full rule enforcement
//!
//! # Architecture
//!
//! The engine is synchronous and does no I/O. Every command returns either
//! the events it produced or a `GameError` explaining the rejection, and a
//! rejected command leaves the state untouched. The turn timer is driven by
//! calling [`Game::tick`] once per second from whatever owns the game.
//!
//! # Modules
//!
//! - [`board`]: Static tile data and game constants
//! - [`cards`]: Card effects, catalogs, and draw piles
//! - [`ownership`]: Who owns which tile, with houses and mortgages
//! - [`rules`]: Rent, monopoly, build/sell eligibility, liquidation value
//! - [`player`]: Player state
//! - [`config`]: Per-game house rules
//! - [`actions`]: Player actions and resulting events
//! - [`game`]: Game state machine
//! - [`auction`]: Auctions for declined tiles
//!
//! Trades and debt resolution are further `impl Game` blocks in private
//! modules.

pub mod actions;
pub mod auction;
pub mod board;
pub mod cards;
pub mod config;
mod debt;
pub mod game;
pub mod ownership;
pub mod player;
pub mod rules;
mod trade;

// Re-export commonly used types
pub use actions::{GameAction, GameEvent, JailExit, TradeOffer};
pub use auction::Auction;
pub use board::{ColorGroup, Money, PlayerId, Tile, TileIndex, TileKind, TILES};
pub use cards::{Card, CardEffect, DeckKind};
pub use config::HouseRules;
pub use game::{Game, GameError, GamePhase, GameState, LogEntry, LogKind, TurnPhase};
pub use ownership::{OwnedProperty, Ownership};
pub use player::{Player, PlayerColor};
