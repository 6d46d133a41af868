//! Pure rule functions over an ownership snapshot.
//!
//! Nothing here mutates state. The game calls these to decide rent,
//! building rights, and whether a debt can be covered.

use crate::board::{
    tile, ColorGroup, Money, PlayerId, PropertyInfo, TileIndex, TileKind, MAX_HOUSES,
    STATION_INDICES, UTILITY_INDICES,
};
use crate::cards::NearestKind;
use crate::ownership::Ownership;

/// Base rent for a single station, doubled for each extra station held
pub const STATION_BASE_RENT: Money = 25;

/// Dice multiplier with one utility
pub const UTILITY_SINGLE_MULTIPLIER: Money = 4;

/// Dice multiplier with both utilities
pub const UTILITY_PAIR_MULTIPLIER: Money = 10;

/// Rent owed for landing on `tile_index`.
///
/// Returns 0 for unowned, mortgaged, or non-purchasable tiles. Stations and
/// utilities count only the owner's unmortgaged holdings.
pub fn rent(tile_index: TileIndex, ownership: &Ownership, dice_total: u8) -> Money {
    let deed = match ownership.get(tile_index) {
        Some(d) if !d.mortgaged => d,
        _ => return 0,
    };

    match tile(tile_index).kind {
        TileKind::Property(info) => {
            if deed.houses > 0 {
                info.rent[deed.houses as usize]
            } else if has_monopoly(deed.owner, info.group, ownership) {
                info.rent[0] * 2
            } else {
                info.rent[0]
            }
        }
        TileKind::Station { .. } => {
            let held = count_unmortgaged(deed.owner, &STATION_INDICES, ownership);
            STATION_BASE_RENT << held.saturating_sub(1)
        }
        TileKind::Utility { .. } => {
            let held = count_unmortgaged(deed.owner, &UTILITY_INDICES, ownership);
            let multiplier = if held >= 2 {
                UTILITY_PAIR_MULTIPLIER
            } else {
                UTILITY_SINGLE_MULTIPLIER
            };
            dice_total as Money * multiplier
        }
        _ => 0,
    }
}

fn count_unmortgaged(owner: PlayerId, indices: &[TileIndex], ownership: &Ownership) -> u32 {
    indices
        .iter()
        .filter(|&&i| {
            ownership
                .get(i)
                .is_some_and(|d| d.owner == owner && !d.mortgaged)
        })
        .count() as u32
}

/// Whether `player` owns every tile in `group`
pub fn has_monopoly(player: PlayerId, group: ColorGroup, ownership: &Ownership) -> bool {
    group
        .tiles()
        .iter()
        .all(|&i| ownership.owner_of(i) == Some(player))
}

/// House counts across a group, as seen by `player` (tiles they don't own count as 0)
pub fn group_houses(group: ColorGroup, player: PlayerId, ownership: &Ownership) -> Vec<u8> {
    group
        .tiles()
        .iter()
        .map(|&i| match ownership.get(i) {
            Some(d) if d.owner == player => d.houses,
            _ => 0,
        })
        .collect()
}

/// Whether any tile in the group carries houses
pub fn group_has_houses(group: ColorGroup, ownership: &Ownership) -> bool {
    group
        .tiles()
        .iter()
        .any(|&i| ownership.get(i).is_some_and(|d| d.houses > 0))
}

/// Whether `player` may add a house to `tile_index`
pub fn can_build_house(tile_index: TileIndex, player: PlayerId, ownership: &Ownership) -> bool {
    let info = match tile(tile_index).property_info() {
        Some(info) => info,
        None => return false,
    };
    let deed = match ownership.get(tile_index) {
        Some(d) => d,
        None => return false,
    };
    if deed.owner != player || deed.mortgaged || deed.houses >= MAX_HOUSES {
        return false;
    }
    if !has_monopoly(player, info.group, ownership) {
        return false;
    }

    let any_mortgaged = info
        .group
        .tiles()
        .iter()
        .any(|&i| ownership.get(i).is_some_and(|d| d.mortgaged));
    if any_mortgaged {
        return false;
    }

    // Even building: only the least-developed tiles may grow
    let min = group_houses(info.group, player, ownership)
        .into_iter()
        .min()
        .unwrap_or(0);
    deed.houses <= min
}

/// Whether `player` may sell a house from `tile_index`
pub fn can_sell_house(tile_index: TileIndex, player: PlayerId, ownership: &Ownership) -> bool {
    let info = match tile(tile_index).property_info() {
        Some(info) => info,
        None => return false,
    };
    let deed = match ownership.get(tile_index) {
        Some(d) => d,
        None => return false,
    };
    if deed.owner != player || deed.houses == 0 {
        return false;
    }

    // Even selling: only the most-developed tiles may shrink
    let max = group_houses(info.group, player, ownership)
        .into_iter()
        .max()
        .unwrap_or(0);
    deed.houses >= max
}

/// First station or utility strictly past `position`, wrapping to the first one
pub fn nearest(position: TileIndex, kind: NearestKind) -> TileIndex {
    let indices: &[TileIndex] = match kind {
        NearestKind::Station => &STATION_INDICES,
        NearestKind::Utility => &UTILITY_INDICES,
    };
    indices
        .iter()
        .copied()
        .find(|&i| i > position)
        .unwrap_or(indices[0])
}

/// Cash refunded for selling one house
pub fn house_sale_value(info: &PropertyInfo) -> Money {
    info.house_cost / 2
}

/// Cash needed to lift a mortgage: the mortgage value plus 10%
pub fn unmortgage_cost(mortgage: Money) -> Money {
    mortgage * 11 / 10
}

/// Everything a player could raise right now: cash, plus mortgage value of
/// unmortgaged tiles, plus half the build cost of every house.
pub fn liquidation_value(cash: Money, player: PlayerId, ownership: &Ownership) -> Money {
    let mut total = cash;
    for deed in ownership.owned_by(player) {
        let t = tile(deed.tile);
        if !deed.mortgaged {
            total += t.mortgage_value().unwrap_or(0);
        }
        if let Some(info) = t.property_info() {
            total += deed.houses as Money * house_sale_value(info);
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ownership::OwnedProperty;

    fn deed(tile: TileIndex, owner: PlayerId, houses: u8, mortgaged: bool) -> OwnedProperty {
        OwnedProperty {
            tile,
            owner,
            houses,
            mortgaged,
        }
    }

    #[test]
    fn test_base_rent_without_monopoly() {
        let ownership = Ownership::from_records([deed(1, 1, 0, false)]);
        assert_eq!(rent(1, &ownership, 7), 2);
    }

    #[test]
    fn test_monopoly_doubles_base_rent() {
        for group in ColorGroup::ALL {
            let ownership =
                Ownership::from_records(group.tiles().iter().map(|&i| deed(i, 1, 0, false)));
            for &i in group.tiles() {
                let base = tile(i).property_info().unwrap().rent[0];
                assert_eq!(rent(i, &ownership, 7), base * 2);
            }
        }
    }

    #[test]
    fn test_split_group_pays_base_rent() {
        let ownership = Ownership::from_records([deed(1, 1, 0, false), deed(3, 2, 0, false)]);
        assert_eq!(rent(1, &ownership, 7), 2);
        assert_eq!(rent(3, &ownership, 7), 4);
    }

    #[test]
    fn test_rent_with_houses_uses_table() {
        let ownership = Ownership::from_records([deed(1, 1, 3, false), deed(3, 1, 3, false)]);
        assert_eq!(rent(1, &ownership, 7), 90);

        let ownership = Ownership::from_records([deed(37, 1, 5, false), deed(39, 1, 5, false)]);
        assert_eq!(rent(39, &ownership, 7), 2000);
    }

    #[test]
    fn test_mortgaged_property_has_no_rent() {
        let ownership = Ownership::from_records([deed(1, 1, 0, true), deed(3, 1, 0, false)]);
        assert_eq!(rent(1, &ownership, 7), 0);

        let ownership = Ownership::from_records([deed(5, 1, 0, true)]);
        assert_eq!(rent(5, &ownership, 7), 0);
    }

    #[test]
    fn test_unowned_tile_has_no_rent() {
        assert_eq!(rent(1, &Ownership::new(), 7), 0);
    }

    #[test]
    fn test_station_rent_scales() {
        let expected = [25, 50, 100, 200];
        for held in 1..=4 {
            let ownership = Ownership::from_records(
                STATION_INDICES[..held].iter().map(|&i| deed(i, 1, 0, false)),
            );
            assert_eq!(rent(5, &ownership, 7), expected[held - 1], "{} held", held);
        }
    }

    #[test]
    fn test_station_rent_ignores_other_owners() {
        let ownership = Ownership::from_records([
            deed(5, 1, 0, false),
            deed(15, 2, 0, false),
            deed(25, 2, 0, false),
        ]);
        assert_eq!(rent(5, &ownership, 7), 25);
        assert_eq!(rent(15, &ownership, 7), 50);
    }

    #[test]
    fn test_utility_rent() {
        let one = Ownership::from_records([deed(12, 1, 0, false)]);
        assert_eq!(rent(12, &one, 8), 32);

        let both = Ownership::from_records([deed(12, 1, 0, false), deed(28, 1, 0, false)]);
        assert_eq!(rent(12, &both, 8), 80);
        assert_eq!(rent(28, &both, 3), 30);
    }

    #[test]
    fn test_has_monopoly() {
        let ownership = Ownership::from_records([
            deed(6, 1, 0, false),
            deed(8, 1, 0, false),
            deed(9, 2, 0, false),
        ]);
        assert!(!has_monopoly(1, ColorGroup::LightBlue, &ownership));

        let ownership = Ownership::from_records([
            deed(6, 1, 0, false),
            deed(8, 1, 0, true),
            deed(9, 1, 0, false),
        ]);
        assert!(has_monopoly(1, ColorGroup::LightBlue, &ownership));
    }

    #[test]
    fn test_build_requires_monopoly() {
        let ownership = Ownership::from_records([deed(1, 1, 0, false)]);
        assert!(!can_build_house(1, 1, &ownership));

        let ownership = Ownership::from_records([deed(1, 1, 0, false), deed(3, 1, 0, false)]);
        assert!(can_build_house(1, 1, &ownership));
        assert!(!can_build_house(1, 2, &ownership));
    }

    #[test]
    fn test_build_blocked_by_mortgage_in_group() {
        let ownership = Ownership::from_records([deed(1, 1, 0, false), deed(3, 1, 0, true)]);
        assert!(!can_build_house(1, 1, &ownership));
    }

    #[test]
    fn test_even_building() {
        let ownership = Ownership::from_records([
            deed(6, 1, 1, false),
            deed(8, 1, 0, false),
            deed(9, 1, 0, false),
        ]);
        assert!(!can_build_house(6, 1, &ownership));
        assert!(can_build_house(8, 1, &ownership));
        assert!(can_build_house(9, 1, &ownership));
    }

    #[test]
    fn test_cannot_build_past_hotel() {
        let ownership = Ownership::from_records([deed(1, 1, 5, false), deed(3, 1, 5, false)]);
        assert!(!can_build_house(1, 1, &ownership));
    }

    #[test]
    fn test_cannot_build_on_station() {
        let ownership = Ownership::from_records(STATION_INDICES.map(|i| deed(i, 1, 0, false)));
        assert!(!can_build_house(5, 1, &ownership));
    }

    #[test]
    fn test_even_selling() {
        let ownership = Ownership::from_records([
            deed(6, 1, 2, false),
            deed(8, 1, 1, false),
            deed(9, 1, 1, false),
        ]);
        assert!(can_sell_house(6, 1, &ownership));
        assert!(!can_sell_house(8, 1, &ownership));

        let ownership = Ownership::from_records([deed(1, 1, 0, false), deed(3, 1, 0, false)]);
        assert!(!can_sell_house(1, 1, &ownership));
    }

    #[test]
    fn test_nearest_station_and_utility() {
        assert_eq!(nearest(7, NearestKind::Station), 15);
        assert_eq!(nearest(22, NearestKind::Station), 25);
        assert_eq!(nearest(36, NearestKind::Station), 5);
        assert_eq!(nearest(5, NearestKind::Station), 15);
        assert_eq!(nearest(7, NearestKind::Utility), 12);
        assert_eq!(nearest(22, NearestKind::Utility), 28);
        assert_eq!(nearest(36, NearestKind::Utility), 12);
    }

    #[test]
    fn test_unmortgage_cost_adds_ten_percent() {
        assert_eq!(unmortgage_cost(100), 110);
        assert_eq!(unmortgage_cost(75), 82);
        assert_eq!(unmortgage_cost(30), 33);
    }

    #[test]
    fn test_liquidation_value() {
        let ownership = Ownership::from_records([
            deed(1, 1, 2, false),
            deed(3, 1, 2, false),
            deed(5, 1, 0, true),
            deed(6, 2, 0, false),
        ]);
        // 100 cash + 30 + 30 mortgage + 4 houses * 25
        assert_eq!(liquidation_value(100, 1, &ownership), 260);
        assert_eq!(liquidation_value(-300, 1, &ownership), -140);
    }
}
