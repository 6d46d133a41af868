//! Player state.
//!
//! This module contains:
//! - Player struct with cash, position, jail status, and holdings
//! - Player colors, assigned by seat

use crate::board::{Money, PlayerId, TileIndex, BOARD_SIZE, JAIL_POSITION};
use serde::{Deserialize, Serialize};

/// Player color for UI rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerColor {
    Red,
    Blue,
    Green,
    Orange,
    Purple,
    Teal,
}

impl PlayerColor {
    /// One color per seat
    pub const ALL: [PlayerColor; 6] = [
        PlayerColor::Red,
        PlayerColor::Blue,
        PlayerColor::Green,
        PlayerColor::Orange,
        PlayerColor::Purple,
        PlayerColor::Teal,
    ];

    /// Get color for a seat (join order)
    pub fn for_seat(seat: usize) -> Self {
        Self::ALL[seat % Self::ALL.len()]
    }

    /// Get hex color code for rendering
    pub fn hex_code(&self) -> u32 {
        match self {
            PlayerColor::Red => 0xE74C3C,
            PlayerColor::Blue => 0x3498DB,
            PlayerColor::Green => 0x2ECC71,
            PlayerColor::Orange => 0xF39C12,
            PlayerColor::Purple => 0x9B59B6,
            PlayerColor::Teal => 0x1ABC9C,
        }
    }
}

/// A player in the game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    /// Only negative while a debt is being settled inside a command
    pub cash: Money,
    /// Board position (0-39)
    pub position: TileIndex,
    /// Owned tile indices, ascending
    pub properties: Vec<TileIndex>,
    pub in_jail: bool,
    /// Failed attempts to roll out of jail this stay (0-3)
    pub jail_turns: u8,
    /// Get Out of Jail Free cards held
    pub jail_release_tokens: u32,
    pub bankrupt: bool,
    pub connected: bool,
}

impl Player {
    /// Create a new player at GO
    pub fn new(id: PlayerId, name: String, seat: usize, cash: Money) -> Self {
        Self {
            id,
            name,
            color: PlayerColor::for_seat(seat),
            cash,
            position: 0,
            properties: Vec::new(),
            in_jail: false,
            jail_turns: 0,
            jail_release_tokens: 0,
            bankrupt: false,
            connected: true,
        }
    }

    /// Still in the game
    pub fn is_active(&self) -> bool {
        !self.bankrupt
    }

    pub fn can_afford(&self, amount: Money) -> bool {
        self.cash >= amount
    }

    /// Move forward, returning true if the move wrapped past GO
    pub fn advance(&mut self, spaces: usize) -> bool {
        let old = self.position;
        self.position = (self.position + spaces) % BOARD_SIZE;
        self.position < old
    }

    /// Move backward. Never passes GO.
    pub fn retreat(&mut self, spaces: usize) {
        self.position = (self.position + BOARD_SIZE - spaces % BOARD_SIZE) % BOARD_SIZE;
    }

    /// Lock up in jail
    pub fn send_to_jail(&mut self) {
        self.position = JAIL_POSITION;
        self.in_jail = true;
        self.jail_turns = 0;
    }

    /// Walk out of jail, staying on the jail tile
    pub fn release_from_jail(&mut self) {
        self.in_jail = false;
        self.jail_turns = 0;
    }

    /// Record a newly acquired tile
    pub fn add_property(&mut self, tile: TileIndex) {
        if let Err(pos) = self.properties.binary_search(&tile) {
            self.properties.insert(pos, tile);
        }
    }

    /// Forget a tile that changed hands
    pub fn remove_property(&mut self, tile: TileIndex) {
        self.properties.retain(|&t| t != tile);
    }
}
