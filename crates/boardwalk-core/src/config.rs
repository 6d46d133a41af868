//! Per-game house rules, fixed when the game is created.

use crate::board::Money;
use crate::player::PlayerColor;
use serde::{Deserialize, Serialize};

/// Fewest players a game can start with
pub const MIN_PLAYERS: usize = 2;

/// House rules toggles.
///
/// Deserializes from a partial object; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HouseRules {
    /// Taxes, card payments, and jail fines go into a pool paid out on Free Parking
    pub free_parking: bool,
    /// Landing exactly on GO pays double salary
    pub double_on_go: bool,
    /// Declining a purchase puts the tile up for auction
    pub auction_on_decline: bool,
    /// Seconds per turn; 0 disables the timer
    pub turn_timer_secs: u32,
    pub starting_cash: Money,
    pub max_players: usize,
}

impl Default for HouseRules {
    fn default() -> Self {
        Self {
            free_parking: false,
            double_on_go: false,
            auction_on_decline: true,
            turn_timer_secs: 60,
            starting_cash: 1500,
            max_players: 4,
        }
    }
}

impl HouseRules {
    /// Clamp values into their playable ranges
    pub fn normalized(mut self) -> Self {
        self.max_players = self
            .max_players
            .clamp(MIN_PLAYERS, PlayerColor::ALL.len());
        self.starting_cash = self.starting_cash.max(0);
        self
    }

    /// Whether turns are timed
    pub fn timer_enabled(&self) -> bool {
        self.turn_timer_secs > 0
    }
}
