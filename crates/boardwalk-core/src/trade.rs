//! Player-to-player trades.
//!
//! One offer may be pending at a time. The offer is checked when proposed
//! and again when accepted, since ownership, houses, and cash may have
//! changed in between. Acceptance swaps everything at once.

use crate::actions::{GameEvent, TradeOffer};
use crate::board::{tile, PlayerId, TileIndex, BOARD_SIZE};
use crate::game::{Game, GameError, LogKind, TurnPhase};
use std::collections::HashSet;

impl Game {
    pub(crate) fn propose_trade(
        &mut self,
        player: PlayerId,
        offer: TradeOffer,
    ) -> Result<Vec<GameEvent>, GameError> {
        match self.state.turn {
            TurnPhase::Trade(_) => return Err(GameError::TradePending),
            TurnPhase::Auction(_) => return Err(GameError::InvalidPhase),
            _ => {}
        }
        if offer.from != player {
            return Err(GameError::InvalidTrade(
                "offer must come from the proposer".into(),
            ));
        }
        if offer.to == offer.from {
            return Err(GameError::InvalidTrade("cannot trade with yourself".into()));
        }
        let to = self.index_of(offer.to)?;
        if self.state.players[to].bankrupt {
            return Err(GameError::PlayerBankrupt);
        }
        if offer.is_empty() {
            return Err(GameError::InvalidTrade("nothing offered or requested".into()));
        }
        self.validate_offer(&offer, false)?;

        let message = format!(
            "{} proposed a trade to {}",
            self.state.players[self.index_of(player)?].name,
            self.state.players[to].name
        );
        self.log(LogKind::Action, message, Some(player));
        let event = GameEvent::TradeProposed {
            from: offer.from,
            to: offer.to,
        };
        self.state.turn = TurnPhase::Trade(offer);
        Ok(vec![event])
    }

    pub(crate) fn accept_trade(&mut self, player: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        let offer = self
            .state
            .pending_trade()
            .ok_or(GameError::NoActiveTrade)?
            .clone();
        if offer.to != player {
            return Err(GameError::InvalidTrade(
                "only the recipient can accept".into(),
            ));
        }
        self.validate_offer(&offer, true)?;

        let from = self.index_of(offer.from)?;
        let to = self.index_of(offer.to)?;

        let net = offer.request_money - offer.offer_money;
        self.state.players[from].cash += net;
        self.state.players[to].cash -= net;

        self.state.players[from].jail_release_tokens -= offer.offer_jail_tokens;
        self.state.players[to].jail_release_tokens += offer.offer_jail_tokens;
        self.state.players[to].jail_release_tokens -= offer.request_jail_tokens;
        self.state.players[from].jail_release_tokens += offer.request_jail_tokens;

        for &tile_index in &offer.offer_properties {
            self.transfer_tile(tile_index, to);
        }
        for &tile_index in &offer.request_properties {
            self.transfer_tile(tile_index, from);
        }

        self.state.turn = TurnPhase::PostRoll;
        let message = format!(
            "{} accepted a trade from {}",
            self.state.players[to].name, self.state.players[from].name
        );
        self.log(LogKind::Action, message, Some(player));
        Ok(vec![GameEvent::TradeAccepted {
            from: offer.from,
            to: offer.to,
        }])
    }

    pub(crate) fn reject_trade(&mut self, player: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        let offer = self.state.pending_trade().ok_or(GameError::NoActiveTrade)?;
        if !offer.involves(player) {
            return Err(GameError::InvalidTrade("not a party to this trade".into()));
        }

        self.state.turn = TurnPhase::PostRoll;
        let name = &self.state.players[self.index_of(player)?].name;
        let message = format!("{} rejected the trade", name);
        self.log(LogKind::Action, message, Some(player));
        Ok(vec![GameEvent::TradeRejected { by: player }])
    }

    /// Check both sides can deliver what the offer names. The recipient's
    /// cash and cards are only checked on acceptance.
    fn validate_offer(&self, offer: &TradeOffer, accepting: bool) -> Result<(), GameError> {
        let invalid = |reason: &str| Err(GameError::InvalidTrade(reason.to_string()));

        if offer.offer_money < 0 || offer.request_money < 0 {
            return invalid("money amounts cannot be negative");
        }

        let from = self
            .state
            .get_player(offer.from)
            .ok_or(GameError::UnknownPlayer)?;
        let to = self
            .state
            .get_player(offer.to)
            .ok_or(GameError::UnknownPlayer)?;

        if from.cash < offer.offer_money {
            return Err(GameError::InsufficientFunds);
        }
        if from.jail_release_tokens < offer.offer_jail_tokens {
            return Err(GameError::NoJailTokens);
        }
        if accepting {
            if to.cash < offer.request_money {
                return Err(GameError::InsufficientFunds);
            }
            if to.jail_release_tokens < offer.request_jail_tokens {
                return Err(GameError::NoJailTokens);
            }
        }

        let mut seen = HashSet::new();
        for &tile_index in offer.offer_properties.iter().chain(&offer.request_properties) {
            if !seen.insert(tile_index) {
                return invalid("a tile is listed twice");
            }
        }
        self.check_tradeable(&offer.offer_properties, offer.from)?;
        self.check_tradeable(&offer.request_properties, offer.to)?;
        Ok(())
    }

    /// Every tile must belong to `owner` and carry no houses
    fn check_tradeable(&self, tiles: &[TileIndex], owner: PlayerId) -> Result<(), GameError> {
        for &tile_index in tiles {
            if tile_index >= BOARD_SIZE {
                return Err(GameError::InvalidTrade(format!("no tile {}", tile_index)));
            }
            let name = tile(tile_index).name;
            match self.state.ownership.get(tile_index) {
                Some(deed) if deed.owner == owner => {
                    if deed.houses > 0 {
                        return Err(GameError::InvalidTrade(format!("{} has houses", name)));
                    }
                }
                _ => {
                    return Err(GameError::InvalidTrade(format!(
                        "{} is not owned by the right player",
                        name
                    )))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::GameAction;
    use crate::config::HouseRules;
    use pretty_assertions::assert_eq;

    fn game() -> Game {
        let rules = HouseRules {
            turn_timer_secs: 0,
            ..HouseRules::default()
        };
        let mut game = Game::with_seed(1, "Alice", "Test", rules, 3);
        game.add_player(2, "Bob").unwrap();
        game.add_player(3, "Carol").unwrap();
        game.start_game(1).unwrap();
        game.grant_tile(1, 0);
        game.grant_tile(6, 1);
        game
    }

    fn swap_offer() -> TradeOffer {
        TradeOffer {
            offer_money: 100,
            offer_properties: vec![1],
            request_properties: vec![6],
            ..TradeOffer::new(1, 2)
        }
    }

    #[test]
    fn test_trade_swaps_everything() {
        let mut game = game();
        game.state.players[1].jail_release_tokens = 1;
        let offer = TradeOffer {
            request_jail_tokens: 1,
            request_money: 30,
            ..swap_offer()
        };
        game.apply_action(1, GameAction::ProposeTrade(offer)).unwrap();
        assert!(game.state.pending_trade().is_some());

        let events = game.apply_action(2, GameAction::AcceptTrade).unwrap();
        assert_eq!(events, vec![GameEvent::TradeAccepted { from: 1, to: 2 }]);

        let alice = &game.state.players[0];
        let bob = &game.state.players[1];
        assert_eq!(alice.cash, 1430);
        assert_eq!(bob.cash, 1570);
        assert_eq!(alice.properties, vec![6]);
        assert_eq!(bob.properties, vec![1]);
        assert_eq!(alice.jail_release_tokens, 1);
        assert_eq!(bob.jail_release_tokens, 0);
        assert_eq!(game.state.ownership.owner_of(1), Some(2));
        assert_eq!(game.state.ownership.owner_of(6), Some(1));
        assert_eq!(game.state.turn, TurnPhase::PostRoll);
    }

    #[test]
    fn test_only_one_trade_at_a_time() {
        let mut game = game();
        game.apply_action(1, GameAction::ProposeTrade(swap_offer())).unwrap();
        let other = TradeOffer {
            offer_money: 10,
            ..TradeOffer::new(3, 1)
        };
        assert_eq!(
            game.apply_action(3, GameAction::ProposeTrade(other)),
            Err(GameError::TradePending)
        );
    }

    #[test]
    fn test_invalid_proposals() {
        let mut game = game();
        let cases = [
            TradeOffer::new(1, 2),
            TradeOffer {
                offer_money: 10,
                ..TradeOffer::new(1, 1)
            },
            TradeOffer {
                offer_properties: vec![6],
                ..TradeOffer::new(1, 2)
            },
            TradeOffer {
                offer_properties: vec![1],
                request_properties: vec![1],
                ..TradeOffer::new(1, 2)
            },
            TradeOffer {
                offer_money: -5,
                ..TradeOffer::new(1, 2)
            },
        ];
        for offer in cases {
            assert!(
                matches!(
                    game.apply_action(1, GameAction::ProposeTrade(offer.clone())),
                    Err(GameError::InvalidTrade(_))
                ),
                "{:?}",
                offer
            );
        }

        let broke = TradeOffer {
            offer_money: 5000,
            ..TradeOffer::new(1, 2)
        };
        assert_eq!(
            game.apply_action(1, GameAction::ProposeTrade(broke)),
            Err(GameError::InsufficientFunds)
        );
        assert_eq!(game.state.pending_trade(), None);
    }

    #[test]
    fn test_cannot_offer_on_behalf_of_someone_else() {
        let mut game = game();
        assert!(matches!(
            game.apply_action(3, GameAction::ProposeTrade(swap_offer())),
            Err(GameError::InvalidTrade(_))
        ));
    }

    #[test]
    fn test_stale_trade_cannot_be_accepted() {
        let mut game = game();
        game.grant_tile(8, 1);
        game.grant_tile(9, 1);
        game.apply_action(1, GameAction::ProposeTrade(swap_offer())).unwrap();

        // Bob builds on the requested tile after the offer
        game.deed_mut(6).houses = 1;
        assert!(matches!(
            game.apply_action(2, GameAction::AcceptTrade),
            Err(GameError::InvalidTrade(_))
        ));
        assert_eq!(game.state.ownership.owner_of(1), Some(1));
        assert!(game.state.pending_trade().is_some());
    }

    #[test]
    fn test_owner_change_blocks_accept() {
        let mut game = game();
        game.apply_action(1, GameAction::ProposeTrade(swap_offer())).unwrap();

        // Bob's Harbor Street goes to Carol before he answers
        game.transfer_tile(6, 2);
        let before = game.state.clone();
        assert!(matches!(
            game.apply_action(2, GameAction::AcceptTrade),
            Err(GameError::InvalidTrade(_))
        ));
        assert_eq!(game.state, before);
        assert_eq!(game.state.ownership.owner_of(1), Some(1));
        assert_eq!(game.state.ownership.owner_of(6), Some(3));
    }

    #[test]
    fn test_accept_rechecks_cash() {
        let mut game = game();
        game.apply_action(1, GameAction::ProposeTrade(swap_offer())).unwrap();
        game.state.players[0].cash = 50;
        assert_eq!(
            game.apply_action(2, GameAction::AcceptTrade),
            Err(GameError::InsufficientFunds)
        );
    }

    #[test]
    fn test_only_recipient_accepts_either_party_rejects() {
        let mut game = game();
        game.apply_action(1, GameAction::ProposeTrade(swap_offer())).unwrap();
        assert!(matches!(
            game.apply_action(1, GameAction::AcceptTrade),
            Err(GameError::InvalidTrade(_))
        ));
        assert!(matches!(
            game.apply_action(3, GameAction::RejectTrade),
            Err(GameError::InvalidTrade(_))
        ));

        game.apply_action(1, GameAction::RejectTrade).unwrap();
        assert_eq!(game.state.turn, TurnPhase::PostRoll);
        assert_eq!(game.state.players[0].cash, 1500);
        assert_eq!(
            game.apply_action(2, GameAction::AcceptTrade),
            Err(GameError::NoActiveTrade)
        );
    }

    #[test]
    fn test_trade_during_auction_rejected() {
        let mut game = game();
        let mut events = Vec::new();
        game.start_auction(5, &mut events);
        assert_eq!(
            game.apply_action(1, GameAction::ProposeTrade(swap_offer())),
            Err(GameError::InvalidPhase)
        );
    }

    #[test]
    fn test_accepting_before_roll_skips_to_post_roll() {
        let mut game = game();
        assert_eq!(game.state.turn, TurnPhase::PreRoll);
        game.apply_action(1, GameAction::ProposeTrade(swap_offer())).unwrap();
        game.apply_action(2, GameAction::AcceptTrade).unwrap();
        assert_eq!(game.state.turn, TurnPhase::PostRoll);
    }
}
