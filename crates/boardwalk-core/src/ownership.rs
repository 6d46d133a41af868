//! Ownership records for purchasable tiles.
//!
//! Keyed by tile index, so a tile can never have two owners.

use crate::board::{PlayerId, TileIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ownership and improvements on a single tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedProperty {
    pub tile: TileIndex,
    pub owner: PlayerId,
    /// 0-4 houses, 5 = hotel. Only ever non-zero on property tiles.
    pub houses: u8,
    pub mortgaged: bool,
}

impl OwnedProperty {
    /// A freshly bought, unimproved tile
    pub fn new(tile: TileIndex, owner: PlayerId) -> Self {
        Self {
            tile,
            owner,
            houses: 0,
            mortgaged: false,
        }
    }

    /// Whether the tile carries a hotel
    pub fn has_hotel(&self) -> bool {
        self.houses == crate::board::MAX_HOUSES
    }
}

/// Every owned tile in a game
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    deeds: BTreeMap<TileIndex, OwnedProperty>,
}

impl Ownership {
    /// No tiles owned
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of records; later records for the same tile win
    pub fn from_records(records: impl IntoIterator<Item = OwnedProperty>) -> Self {
        Self {
            deeds: records.into_iter().map(|r| (r.tile, r)).collect(),
        }
    }

    /// Record for a tile, if anyone owns it
    pub fn get(&self, tile: TileIndex) -> Option<&OwnedProperty> {
        self.deeds.get(&tile)
    }

    pub fn get_mut(&mut self, tile: TileIndex) -> Option<&mut OwnedProperty> {
        self.deeds.get_mut(&tile)
    }

    /// Owner of a tile
    pub fn owner_of(&self, tile: TileIndex) -> Option<PlayerId> {
        self.deeds.get(&tile).map(|d| d.owner)
    }

    pub fn is_owned(&self, tile: TileIndex) -> bool {
        self.deeds.contains_key(&tile)
    }

    /// Record a new owner for an unowned tile
    pub fn insert(&mut self, record: OwnedProperty) {
        let previous = self.deeds.insert(record.tile, record);
        debug_assert!(previous.is_none(), "tile {} already owned", record.tile);
    }

    /// Return a tile to the bank
    pub fn remove(&mut self, tile: TileIndex) -> Option<OwnedProperty> {
        self.deeds.remove(&tile)
    }

    /// All records, ascending by tile index
    pub fn iter(&self) -> impl Iterator<Item = &OwnedProperty> {
        self.deeds.values()
    }

    /// Records held by one player, ascending by tile index
    pub fn owned_by(&self, player: PlayerId) -> impl Iterator<Item = &OwnedProperty> {
        self.deeds.values().filter(move |d| d.owner == player)
    }

    /// Tile indices held by one player, ascending
    pub fn tiles_of(&self, player: PlayerId) -> Vec<TileIndex> {
        self.owned_by(player).map(|d| d.tile).collect()
    }

    pub fn len(&self) -> usize {
        self.deeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deeds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut ownership = Ownership::new();
        ownership.insert(OwnedProperty::new(3, 1));
        ownership.insert(OwnedProperty::new(1, 1));
        ownership.insert(OwnedProperty::new(5, 2));

        assert_eq!(ownership.owner_of(3), Some(1));
        assert_eq!(ownership.owner_of(4), None);
        assert_eq!(ownership.tiles_of(1), vec![1, 3]);
        assert_eq!(ownership.len(), 3);
    }

    #[test]
    fn test_remove_returns_tile_to_bank() {
        let mut ownership = Ownership::from_records([OwnedProperty::new(5, 2)]);
        assert!(ownership.remove(5).is_some());
        assert!(!ownership.is_owned(5));
        assert!(ownership.is_empty());
    }
}
