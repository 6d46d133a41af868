//! Charging players, covering debts, and bankruptcy.
//!
//! A charge is deducted first. If that leaves the debtor negative, houses are
//! sold and tiles mortgaged in ascending tile order until the debt is
//! covered. If even that cannot cover it, the debtor goes bankrupt and the
//! game checks whether only one player is left.

use crate::actions::GameEvent;
use crate::board::{tile, Money, PlayerId, TileIndex};
use crate::game::{Game, GamePhase, LogKind, TurnPhase};
use crate::rules;
use tracing::{info, warn};

/// Who receives a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Payee {
    Bank,
    /// The free parking pool
    Pool,
    /// Another player, by index
    Player(usize),
}

impl Game {
    /// Take `amount` from the player at `debtor`, liquidating or bankrupting
    /// them if needed. The payee is paid only if the debtor stays solvent.
    ///
    /// Returns false if the debtor went bankrupt.
    pub(crate) fn charge(
        &mut self,
        debtor: usize,
        amount: Money,
        payee: Payee,
        events: &mut Vec<GameEvent>,
    ) -> bool {
        self.state.players[debtor].cash -= amount;

        if self.state.players[debtor].cash < 0 && !self.cover_debt(debtor, events) {
            self.declare_bankrupt(debtor, amount, payee, events);
            return false;
        }

        match payee {
            Payee::Bank => {}
            Payee::Pool => self.state.free_parking_pool += amount,
            Payee::Player(creditor) => self.state.players[creditor].cash += amount,
        }
        true
    }

    /// Sell houses, then mortgage tiles, until cash is non-negative.
    /// Nothing is sold if the debt cannot be covered.
    fn cover_debt(&mut self, debtor: usize, events: &mut Vec<GameEvent>) -> bool {
        let id = self.state.players[debtor].id;
        let cash = self.state.players[debtor].cash;
        if rules::liquidation_value(cash, id, &self.state.ownership) < 0 {
            return false;
        }

        let mut houses_sold = 0;
        while self.state.players[debtor].cash < 0 {
            let next = self
                .state
                .ownership
                .owned_by(id)
                .map(|d| d.tile)
                .find(|&t| rules::can_sell_house(t, id, &self.state.ownership));
            let Some(tile_index) = next else {
                break;
            };
            let info = *tile(tile_index)
                .property_info()
                .expect("only properties carry houses");
            self.deed_mut(tile_index).houses -= 1;
            self.state.players[debtor].cash += rules::house_sale_value(&info);
            houses_sold += 1;
        }

        let mut mortgaged: Vec<TileIndex> = Vec::new();
        while self.state.players[debtor].cash < 0 {
            let next = self
                .state
                .ownership
                .owned_by(id)
                .find(|d| !d.mortgaged && d.houses == 0)
                .map(|d| d.tile);
            let Some(tile_index) = next else {
                break;
            };
            self.deed_mut(tile_index).mortgaged = true;
            self.state.players[debtor].cash += tile(tile_index).mortgage_value().unwrap_or(0);
            mortgaged.push(tile_index);
        }

        if houses_sold > 0 || !mortgaged.is_empty() {
            let message = format!(
                "{} sold {} houses and mortgaged {} tiles to pay a debt",
                self.state.players[debtor].name,
                houses_sold,
                mortgaged.len()
            );
            self.log(LogKind::System, message, Some(id));
            events.push(GameEvent::AssetsLiquidated {
                player: id,
                houses_sold,
                mortgaged,
            });
        }

        self.state.players[debtor].cash >= 0
    }

    /// Remove a player from the game. A player creditor takes the debtor's
    /// tiles with their houses and mortgages, jail cards, and whatever cash
    /// they had before the charge; otherwise the tiles go back to the bank.
    fn declare_bankrupt(
        &mut self,
        debtor: usize,
        amount: Money,
        payee: Payee,
        events: &mut Vec<GameEvent>,
    ) {
        let id = self.state.players[debtor].id;
        let creditor = match payee {
            Payee::Player(c) => Some(c),
            Payee::Bank | Payee::Pool => None,
        };
        let leftover = (self.state.players[debtor].cash + amount).max(0);
        let tokens = std::mem::take(&mut self.state.players[debtor].jail_release_tokens);

        for tile_index in self.state.ownership.tiles_of(id) {
            match creditor {
                Some(c) => self.transfer_tile(tile_index, c),
                None => {
                    self.state.ownership.remove(tile_index);
                }
            }
        }

        let player = &mut self.state.players[debtor];
        player.cash = 0;
        player.properties.clear();
        player.bankrupt = true;
        player.in_jail = false;
        player.jail_turns = 0;

        let creditor_id = creditor.map(|c| {
            let creditor = &mut self.state.players[c];
            creditor.cash += leftover;
            creditor.jail_release_tokens += tokens;
            creditor.id
        });

        if let TurnPhase::Auction(auction) = &mut self.state.turn {
            auction.bidders.retain(|&b| b != id);
        }
        if self
            .state
            .pending_trade()
            .is_some_and(|offer| offer.involves(id))
        {
            self.state.turn = TurnPhase::PostRoll;
        }

        let message = match creditor {
            Some(c) => format!(
                "{} is bankrupt. {} takes their assets",
                self.state.players[debtor].name, self.state.players[c].name
            ),
            None => format!("{} is bankrupt", self.state.players[debtor].name),
        };
        self.log(LogKind::System, message, Some(id));
        warn!(game = %self.state.name, player = id, creditor = ?creditor_id, "player bankrupt");
        events.push(GameEvent::PlayerBankrupt {
            player: id,
            creditor: creditor_id,
        });

        self.check_game_over(events);
    }

    /// Finish the game once at most one player is left
    pub(crate) fn check_game_over(&mut self, events: &mut Vec<GameEvent>) {
        if self.state.phase != GamePhase::Playing {
            return;
        }
        let active: Vec<(PlayerId, String)> = self
            .state
            .active_players()
            .map(|p| (p.id, p.name.clone()))
            .collect();
        if active.len() > 1 {
            return;
        }
        let winner = active.into_iter().next();

        self.state.phase = GamePhase::Finished;
        self.state.turn_time_left = None;
        self.state.winner = winner.as_ref().map(|(id, _)| *id);
        if let Some((id, name)) = winner {
            self.log(LogKind::System, format!("{} wins!", name), Some(id));
            info!(game = %self.state.name, winner = id, "game finished");
            events.push(GameEvent::GameWon { player: id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::GameAction;
    use crate::board::PlayerId;
    use crate::config::HouseRules;
    use crate::game::GameError;
    use pretty_assertions::assert_eq;

    fn game_with(players: &[(PlayerId, &str)]) -> Game {
        let rules = HouseRules {
            turn_timer_secs: 0,
            ..HouseRules::default()
        };
        let (host, name) = players[0];
        let mut game = Game::with_seed(host, name, "Test", rules, 9);
        for &(id, name) in &players[1..] {
            game.add_player(id, name).unwrap();
        }
        game.start_game(host).unwrap();
        game
    }

    fn give(game: &mut Game, tile_index: TileIndex, idx: usize) {
        game.grant_tile(tile_index, idx);
    }

    #[test]
    fn test_solvent_charge_pays_creditor() {
        let mut game = game_with(&[(1, "Alice"), (2, "Bob")]);
        let mut events = Vec::new();
        assert!(game.charge(0, 100, Payee::Player(1), &mut events));
        assert_eq!(game.state.players[0].cash, 1400);
        assert_eq!(game.state.players[1].cash, 1600);
        assert!(events.is_empty());
    }

    #[test]
    fn test_pool_payment() {
        let mut game = game_with(&[(1, "Alice"), (2, "Bob")]);
        let mut events = Vec::new();
        game.charge(0, 75, Payee::Pool, &mut events);
        assert_eq!(game.state.free_parking_pool, 75);
    }

    #[test]
    fn test_debt_sells_houses_evenly_then_mortgages() {
        let mut game = game_with(&[(1, "Alice"), (2, "Bob")]);
        give(&mut game, 1, 0);
        give(&mut game, 3, 0);
        give(&mut game, 5, 0);
        game.deed_mut(1).houses = 2;
        game.deed_mut(3).houses = 2;
        game.state.players[0].cash = 0;

        // 4 houses raise 100, Mill Lane 30, Baker Row 30
        let mut events = Vec::new();
        assert!(game.charge(0, 150, Payee::Bank, &mut events));

        assert_eq!(game.state.ownership.get(1).unwrap().houses, 0);
        assert_eq!(game.state.ownership.get(3).unwrap().houses, 0);
        assert!(game.state.ownership.get(1).unwrap().mortgaged);
        assert!(game.state.ownership.get(3).unwrap().mortgaged);
        assert!(!game.state.ownership.get(5).unwrap().mortgaged);
        assert_eq!(game.state.players[0].cash, 10);
        assert_eq!(
            events,
            vec![GameEvent::AssetsLiquidated {
                player: 1,
                houses_sold: 4,
                mortgaged: vec![1, 3],
            }]
        );
    }

    #[test]
    fn test_liquidation_stops_once_covered() {
        let mut game = game_with(&[(1, "Alice"), (2, "Bob")]);
        give(&mut game, 6, 0);
        give(&mut game, 8, 0);
        give(&mut game, 9, 0);
        for t in [6, 8, 9] {
            game.deed_mut(t).houses = 1;
        }
        game.state.players[0].cash = 10;

        let mut events = Vec::new();
        assert!(game.charge(0, 30, Payee::Bank, &mut events));
        // One house at 25 covers the shortfall of 20
        assert_eq!(game.state.ownership.get(6).unwrap().houses, 0);
        assert_eq!(game.state.ownership.get(8).unwrap().houses, 1);
        assert_eq!(game.state.players[0].cash, 5);
    }

    #[test]
    fn test_bankruptcy_to_player_transfers_everything() {
        let mut game = game_with(&[(1, "Alice"), (2, "Bob"), (3, "Carol")]);
        give(&mut game, 1, 0);
        give(&mut game, 3, 0);
        game.deed_mut(1).houses = 1;
        game.deed_mut(3).mortgaged = true;
        game.deed_mut(3).houses = 0;
        game.state.players[0].cash = 40;
        game.state.players[0].jail_release_tokens = 2;

        // Worth 40 + 30 + 25 = 95
        let mut events = Vec::new();
        assert!(!game.charge(0, 500, Payee::Player(1), &mut events));

        let alice = &game.state.players[0];
        assert!(alice.bankrupt);
        assert_eq!(alice.cash, 0);
        assert!(alice.properties.is_empty());
        assert_eq!(alice.jail_release_tokens, 0);

        let bob = &game.state.players[1];
        assert_eq!(bob.cash, 1540);
        assert_eq!(bob.properties, vec![1, 3]);
        assert_eq!(bob.jail_release_tokens, 2);
        assert_eq!(game.state.ownership.get(1).unwrap().houses, 1);
        assert_eq!(game.state.ownership.owner_of(1), Some(2));
        assert!(game.state.ownership.get(3).unwrap().mortgaged);
        assert!(events.contains(&GameEvent::PlayerBankrupt {
            player: 1,
            creditor: Some(2)
        }));
        assert_eq!(game.state.phase, GamePhase::Playing);
    }

    #[test]
    fn test_creditor_inherits_houses() {
        let mut game = game_with(&[(1, "Alice"), (2, "Bob"), (3, "Carol")]);
        give(&mut game, 1, 0);
        give(&mut game, 3, 0);
        game.deed_mut(1).houses = 2;
        game.deed_mut(3).houses = 2;
        game.state.players[0].cash = 0;

        let mut events = Vec::new();
        assert!(!game.charge(0, 1000, Payee::Player(1), &mut events));

        assert!(game.state.players[0].bankrupt);
        assert_eq!(game.state.players[1].cash, 1500);
        for tile in [1, 3] {
            let deed = game.state.ownership.get(tile).unwrap();
            assert_eq!(deed.owner, 2);
            assert_eq!(deed.houses, 2);
        }
    }

    #[test]
    fn test_bankruptcy_to_bank_returns_tiles() {
        let mut game = game_with(&[(1, "Alice"), (2, "Bob"), (3, "Carol")]);
        give(&mut game, 39, 0);
        game.state.players[0].cash = 10;

        let mut events = Vec::new();
        assert!(!game.charge(0, 400, Payee::Bank, &mut events));
        assert!(!game.state.ownership.is_owned(39));
        assert!(game.state.players[0].bankrupt);
        assert_eq!(game.state.players[1].cash, 1500);
    }

    #[test]
    fn test_pool_not_credited_on_bankruptcy() {
        let mut game = game_with(&[(1, "Alice"), (2, "Bob"), (3, "Carol")]);
        game.state.players[0].cash = 10;
        let mut events = Vec::new();
        game.charge(0, 200, Payee::Pool, &mut events);
        assert_eq!(game.state.free_parking_pool, 0);
    }

    #[test]
    fn test_last_player_standing_wins() {
        let mut game = game_with(&[(1, "Alice"), (2, "Bob")]);
        game.state.players[0].cash = 0;
        let mut events = Vec::new();
        game.charge(0, 100, Payee::Player(1), &mut events);

        assert_eq!(game.state.phase, GamePhase::Finished);
        assert_eq!(game.state.winner, Some(2));
        assert_eq!(game.state.turn_time_left, None);
        assert!(events.contains(&GameEvent::GameWon { player: 2 }));
        assert_eq!(
            game.apply_action(2, GameAction::EndTurn),
            Err(GameError::GameOver)
        );
    }

    #[test]
    fn test_bankrupt_current_player_loses_turn() {
        let mut game = game_with(&[(1, "Alice"), (2, "Bob"), (3, "Carol")]);
        let carol = 2;
        give(&mut game, 39, carol);
        game.state.players[0].cash = 20;
        game.state.players[0].position = 34;

        game.apply_roll(1, (2, 3)).unwrap();
        assert!(game.state.players[0].bankrupt);
        assert_eq!(game.state.players[2].cash, 1520);
        assert_eq!(game.state.current_player, 1);
        assert_eq!(game.state.turn, TurnPhase::PreRoll);
        assert_eq!(
            game.apply_action(1, GameAction::RollDice),
            Err(GameError::PlayerBankrupt)
        );
    }

    #[test]
    fn test_bankrupt_bidder_leaves_auction() {
        let mut game = game_with(&[(1, "Alice"), (2, "Bob"), (3, "Carol")]);
        let mut events = Vec::new();
        game.start_auction(6, &mut events);
        game.state.players[2].cash = 0;
        game.charge(2, 10, Payee::Bank, &mut events);
        assert_eq!(game.state.auction().unwrap().bidders, vec![1, 2]);
    }
}
