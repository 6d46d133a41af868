//! The game board: tiles, color groups, and fixed game constants.
//!
//! This module contains:
//! - Id and money type aliases shared across the crate
//! - Tile types (properties, stations, utilities, taxes, specials)
//! - The 40-tile board, indexed clockwise from GO
//! - Color groups and their member tiles
//!
//! The board is immutable. Everything that changes during play (ownership,
//! houses, mortgages) lives in [`crate::ownership`].

use serde::Serialize;

/// Player identifier, assigned by whoever hosts the game
pub type PlayerId = u32;

/// Position on the board (0-39)
pub type TileIndex = usize;

/// Cash amounts. Signed because a balance may dip below zero while a debt
/// is being resolved.
pub type Money = i64;

/// Number of tiles on the board
pub const BOARD_SIZE: usize = 40;

/// Salary for passing GO
pub const GO_SALARY: Money = 200;

/// Fine to leave jail
pub const JAIL_FINE: Money = 50;

/// Jail / Just Visiting
pub const JAIL_POSITION: TileIndex = 10;

/// "Go To Jail" corner
pub const GO_TO_JAIL_POSITION: TileIndex = 30;

/// Failed doubles attempts before the fine is forced
pub const MAX_JAIL_TURNS: u8 = 3;

/// Houses on a property; 5 means a hotel
pub const MAX_HOUSES: u8 = 5;

/// Station tiles in ascending order
pub const STATION_INDICES: [TileIndex; 4] = [5, 15, 25, 35];

/// Utility tiles in ascending order
pub const UTILITY_INDICES: [TileIndex; 2] = [12, 28];

/// Color sets of properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorGroup {
    Brown,
    LightBlue,
    Pink,
    Orange,
    Red,
    Yellow,
    Green,
    DarkBlue,
}

impl ColorGroup {
    /// All color groups, in board order
    pub const ALL: [ColorGroup; 8] = [
        ColorGroup::Brown,
        ColorGroup::LightBlue,
        ColorGroup::Pink,
        ColorGroup::Orange,
        ColorGroup::Red,
        ColorGroup::Yellow,
        ColorGroup::Green,
        ColorGroup::DarkBlue,
    ];

    /// Tile indices belonging to this group
    pub fn tiles(&self) -> &'static [TileIndex] {
        match self {
            ColorGroup::Brown => &[1, 3],
            ColorGroup::LightBlue => &[6, 8, 9],
            ColorGroup::Pink => &[11, 13, 14],
            ColorGroup::Orange => &[16, 18, 19],
            ColorGroup::Red => &[21, 23, 24],
            ColorGroup::Yellow => &[26, 27, 29],
            ColorGroup::Green => &[31, 32, 34],
            ColorGroup::DarkBlue => &[37, 39],
        }
    }

    /// Hex color code for rendering
    pub fn hex_code(&self) -> u32 {
        match self {
            ColorGroup::Brown => 0x8B4513,
            ColorGroup::LightBlue => 0x87CEEB,
            ColorGroup::Pink => 0xFF69B4,
            ColorGroup::Orange => 0xFFA500,
            ColorGroup::Red => 0xFF0000,
            ColorGroup::Yellow => 0xFFD700,
            ColorGroup::Green => 0x228B22,
            ColorGroup::DarkBlue => 0x00008B,
        }
    }
}

/// Price and rent data for a buildable property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PropertyInfo {
    pub group: ColorGroup,
    pub price: Money,
    /// Base rent, then 1-4 houses, then hotel
    pub rent: [Money; 6],
    pub house_cost: Money,
    pub mortgage: Money,
}

/// What a tile is and what happens when a player lands on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TileKind {
    Go,
    Jail,
    FreeParking,
    GoToJail,
    Chance,
    Chest,
    Tax { amount: Money },
    Property(PropertyInfo),
    Station { price: Money, mortgage: Money },
    Utility { price: Money, mortgage: Money },
}

/// A single tile on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tile {
    pub name: &'static str,
    #[serde(flatten)]
    pub kind: TileKind,
}

impl Tile {
    const fn special(name: &'static str, kind: TileKind) -> Self {
        Self { name, kind }
    }

    const fn property(
        name: &'static str,
        group: ColorGroup,
        price: Money,
        rent: [Money; 6],
        house_cost: Money,
        mortgage: Money,
    ) -> Self {
        Self {
            name,
            kind: TileKind::Property(PropertyInfo {
                group,
                price,
                rent,
                house_cost,
                mortgage,
            }),
        }
    }

    const fn station(name: &'static str) -> Self {
        Self {
            name,
            kind: TileKind::Station {
                price: 200,
                mortgage: 100,
            },
        }
    }

    const fn utility(name: &'static str) -> Self {
        Self {
            name,
            kind: TileKind::Utility {
                price: 150,
                mortgage: 75,
            },
        }
    }

    /// Whether this tile can be bought
    pub fn is_purchasable(&self) -> bool {
        matches!(
            self.kind,
            TileKind::Property(_) | TileKind::Station { .. } | TileKind::Utility { .. }
        )
    }

    /// Purchase price, if the tile can be bought
    pub fn price(&self) -> Option<Money> {
        match self.kind {
            TileKind::Property(info) => Some(info.price),
            TileKind::Station { price, .. } | TileKind::Utility { price, .. } => Some(price),
            _ => None,
        }
    }

    /// Cash raised by mortgaging, if the tile can be owned
    pub fn mortgage_value(&self) -> Option<Money> {
        match self.kind {
            TileKind::Property(info) => Some(info.mortgage),
            TileKind::Station { mortgage, .. } | TileKind::Utility { mortgage, .. } => {
                Some(mortgage)
            }
            _ => None,
        }
    }

    /// Property data, if this is a buildable property
    pub fn property_info(&self) -> Option<&PropertyInfo> {
        match &self.kind {
            TileKind::Property(info) => Some(info),
            _ => None,
        }
    }
}

/// Look up a tile, wrapping around the board
pub fn tile(index: TileIndex) -> &'static Tile {
    &TILES[index % BOARD_SIZE]
}

/// The standard board, clockwise from GO
pub static TILES: [Tile; BOARD_SIZE] = [
    /* 0  */ Tile::special("GO", TileKind::Go),
    /* 1  */ Tile::property("Mill Lane", ColorGroup::Brown, 60, [2, 10, 30, 90, 160, 250], 50, 30),
    /* 2  */ Tile::special("Community Chest", TileKind::Chest),
    /* 3  */ Tile::property("Baker Row", ColorGroup::Brown, 60, [4, 20, 60, 180, 320, 450], 50, 30),
    /* 4  */ Tile::special("Income Tax", TileKind::Tax { amount: 200 }),
    /* 5  */ Tile::station("North Station"),
    /* 6  */ Tile::property("Harbor Street", ColorGroup::LightBlue, 100, [6, 30, 90, 270, 400, 550], 50, 50),
    /* 7  */ Tile::special("Chance", TileKind::Chance),
    /* 8  */ Tile::property("Canal Walk", ColorGroup::LightBlue, 100, [6, 30, 90, 270, 400, 550], 50, 50),
    /* 9  */ Tile::property("Ferry Road", ColorGroup::LightBlue, 120, [8, 40, 100, 300, 450, 600], 50, 60),
    /* 10 */ Tile::special("Jail / Just Visiting", TileKind::Jail),
    /* 11 */ Tile::property("Rose Avenue", ColorGroup::Pink, 140, [10, 50, 150, 450, 625, 750], 100, 70),
    /* 12 */ Tile::utility("Electric Utility"),
    /* 13 */ Tile::property("Garden Crescent", ColorGroup::Pink, 140, [10, 50, 150, 450, 625, 750], 100, 70),
    /* 14 */ Tile::property("Orchard Place", ColorGroup::Pink, 160, [12, 60, 180, 500, 700, 900], 100, 80),
    /* 15 */ Tile::station("East Station"),
    /* 16 */ Tile::property("Market Square", ColorGroup::Orange, 180, [14, 70, 200, 550, 750, 950], 100, 90),
    /* 17 */ Tile::special("Community Chest", TileKind::Chest),
    /* 18 */ Tile::property("Lantern Street", ColorGroup::Orange, 180, [14, 70, 200, 550, 750, 950], 100, 90),
    /* 19 */ Tile::property("Clocktower Way", ColorGroup::Orange, 200, [16, 80, 220, 600, 800, 1000], 100, 100),
    /* 20 */ Tile::special("Free Parking", TileKind::FreeParking),
    /* 21 */ Tile::property("Theatre Row", ColorGroup::Red, 220, [18, 90, 250, 700, 875, 1050], 150, 110),
    /* 22 */ Tile::special("Chance", TileKind::Chance),
    /* 23 */ Tile::property("Opera Lane", ColorGroup::Red, 220, [18, 90, 250, 700, 875, 1050], 150, 110),
    /* 24 */ Tile::property("Gallery Road", ColorGroup::Red, 240, [20, 100, 300, 750, 925, 1100], 150, 120),
    /* 25 */ Tile::station("South Station"),
    /* 26 */ Tile::property("Sunset Boulevard", ColorGroup::Yellow, 260, [22, 110, 330, 800, 975, 1150], 150, 130),
    /* 27 */ Tile::property("Meadow Drive", ColorGroup::Yellow, 260, [22, 110, 330, 800, 975, 1150], 150, 130),
    /* 28 */ Tile::utility("Water Utility"),
    /* 29 */ Tile::property("Golden Terrace", ColorGroup::Yellow, 280, [24, 120, 360, 850, 1025, 1200], 150, 140),
    /* 30 */ Tile::special("Go To Jail", TileKind::GoToJail),
    /* 31 */ Tile::property("Cedar Park", ColorGroup::Green, 300, [26, 130, 390, 900, 1100, 1275], 200, 150),
    /* 32 */ Tile::property("Maple Heights", ColorGroup::Green, 300, [26, 130, 390, 900, 1100, 1275], 200, 150),
    /* 33 */ Tile::special("Community Chest", TileKind::Chest),
    /* 34 */ Tile::property("Oakwood Avenue", ColorGroup::Green, 320, [28, 150, 450, 1000, 1200, 1400], 200, 160),
    /* 35 */ Tile::station("West Station"),
    /* 36 */ Tile::special("Chance", TileKind::Chance),
    /* 37 */ Tile::property("Regent Park", ColorGroup::DarkBlue, 350, [35, 175, 500, 1100, 1300, 1500], 200, 175),
    /* 38 */ Tile::special("Luxury Tax", TileKind::Tax { amount: 100 }),
    /* 39 */ Tile::property("Crown Plaza", ColorGroup::DarkBlue, 400, [50, 200, 600, 1400, 1700, 2000], 200, 200),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_has_40_tiles() {
        assert_eq!(TILES.len(), BOARD_SIZE);
        assert_eq!(TILES[0].kind, TileKind::Go);
        assert_eq!(TILES[JAIL_POSITION].kind, TileKind::Jail);
        assert_eq!(TILES[GO_TO_JAIL_POSITION].kind, TileKind::GoToJail);
    }

    #[test]
    fn test_color_groups_match_tiles() {
        for group in ColorGroup::ALL {
            let from_board: Vec<TileIndex> = TILES
                .iter()
                .enumerate()
                .filter(|(_, t)| t.property_info().map(|p| p.group) == Some(group))
                .map(|(i, _)| i)
                .collect();
            assert_eq!(from_board, group.tiles(), "group {:?}", group);
            assert!((2..=3).contains(&from_board.len()));
        }
    }

    #[test]
    fn test_station_and_utility_indices() {
        for i in STATION_INDICES {
            assert!(matches!(TILES[i].kind, TileKind::Station { .. }));
        }
        for i in UTILITY_INDICES {
            assert!(matches!(TILES[i].kind, TileKind::Utility { .. }));
        }
        let stations = TILES
            .iter()
            .filter(|t| matches!(t.kind, TileKind::Station { .. }))
            .count();
        assert_eq!(stations, STATION_INDICES.len());
    }

    #[test]
    fn test_purchasable_tiles_have_price_and_mortgage() {
        let purchasable: Vec<&Tile> = TILES.iter().filter(|t| t.is_purchasable()).collect();
        assert_eq!(purchasable.len(), 28);
        for t in purchasable {
            assert!(t.price().unwrap() > 0);
            assert_eq!(t.mortgage_value().unwrap() * 2, t.price().unwrap());
        }
        assert!(TILES[4].price().is_none());
    }

    #[test]
    fn test_tile_lookup_wraps() {
        assert_eq!(tile(41).name, TILES[1].name);
    }
}
