//! Game actions that players can take.
//!
//! This module defines every command a player can send during play and the
//! events that result from applying them.

use crate::board::{Money, PlayerId, TileIndex};
use crate::cards::DeckKind;
use serde::{Deserialize, Serialize};

/// All possible actions a player can take once seated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameAction {
    // ==================== Turn Actions ====================
    /// Roll the dice (pre-roll only)
    RollDice,
    /// Pay the fine to leave jail before rolling
    PayJailFine,
    /// Spend a Get Out of Jail Free card before rolling
    UseJailToken,
    /// End your turn (post-roll only)
    EndTurn,

    // ==================== Purchase Decision ====================
    /// Buy the tile you landed on
    BuyProperty,
    /// Pass on the tile you landed on
    DeclineProperty,

    // ==================== Auction ====================
    PlaceBid { amount: Money },
    WithdrawBid,

    // ==================== Improvements ====================
    BuildHouse { tile: TileIndex },
    SellHouse { tile: TileIndex },
    Mortgage { tile: TileIndex },
    Unmortgage { tile: TileIndex },

    // ==================== Trading ====================
    /// Offer a trade to another player
    ProposeTrade(TradeOffer),
    /// Accept the pending trade (recipient only)
    AcceptTrade,
    /// Reject the pending trade (either party)
    RejectTrade,

    // ==================== Social ====================
    Chat { text: String },
}

/// A trade offer between two players
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeOffer {
    /// Player making the offer
    pub from: PlayerId,
    /// Player receiving the offer
    pub to: PlayerId,
    pub offer_money: Money,
    pub offer_properties: Vec<TileIndex>,
    pub offer_jail_tokens: u32,
    pub request_money: Money,
    pub request_properties: Vec<TileIndex>,
    pub request_jail_tokens: u32,
}

impl TradeOffer {
    /// Create an empty offer between two players
    pub fn new(from: PlayerId, to: PlayerId) -> Self {
        Self {
            from,
            to,
            ..Self::default()
        }
    }

    /// Check if nothing changes hands
    pub fn is_empty(&self) -> bool {
        self.offer_money == 0
            && self.request_money == 0
            && self.offer_jail_tokens == 0
            && self.request_jail_tokens == 0
            && self.offer_properties.is_empty()
            && self.request_properties.is_empty()
    }

    /// Whether `player` is one of the two parties
    pub fn involves(&self, player: PlayerId) -> bool {
        self.from == player || self.to == player
    }
}

/// How a player got out of jail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JailExit {
    Doubles,
    Fine,
    Token,
}

/// Events that occur as a result of actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    // ==================== Lobby ====================
    PlayerJoined { player: PlayerId, name: String },
    PlayerReconnected { player: PlayerId },
    PlayerDisconnected { player: PlayerId },
    PlayerRemoved { player: PlayerId },
    GameStarted { first_player: PlayerId },

    // ==================== Movement ====================
    /// Dice were rolled
    DiceRolled {
        player: PlayerId,
        dice: (u8, u8),
        total: u8,
    },
    /// Salary paid for passing or landing on GO
    PassedGo { player: PlayerId, salary: Money },
    Moved {
        player: PlayerId,
        from: TileIndex,
        to: TileIndex,
    },
    SentToJail { player: PlayerId },
    ReleasedFromJail { player: PlayerId, exit: JailExit },

    // ==================== Money ====================
    RentPaid {
        from: PlayerId,
        to: PlayerId,
        tile: TileIndex,
        amount: Money,
    },
    TaxPaid { player: PlayerId, amount: Money },
    /// Bank paid the player (card effect)
    CashReceived { player: PlayerId, amount: Money },
    /// Player paid the bank or pool (card effect)
    CashPaid { player: PlayerId, amount: Money },
    FreeParkingCollected { player: PlayerId, amount: Money },

    // ==================== Cards ====================
    CardDrawn {
        player: PlayerId,
        deck: DeckKind,
        card_id: String,
        text: String,
    },

    // ==================== Property ====================
    PropertyBought {
        player: PlayerId,
        tile: TileIndex,
        price: Money,
    },
    PropertyDeclined { player: PlayerId, tile: TileIndex },
    HouseBuilt {
        player: PlayerId,
        tile: TileIndex,
        houses: u8,
    },
    HouseSold {
        player: PlayerId,
        tile: TileIndex,
        houses: u8,
    },
    Mortgaged {
        player: PlayerId,
        tile: TileIndex,
        amount: Money,
    },
    Unmortgaged {
        player: PlayerId,
        tile: TileIndex,
        cost: Money,
    },

    // ==================== Auction ====================
    AuctionStarted {
        tile: TileIndex,
        bidders: Vec<PlayerId>,
    },
    BidPlaced { player: PlayerId, amount: Money },
    BidWithdrawn { player: PlayerId },
    AuctionWon {
        player: PlayerId,
        tile: TileIndex,
        amount: Money,
    },
    AuctionUnsold { tile: TileIndex },

    // ==================== Trading ====================
    TradeProposed { from: PlayerId, to: PlayerId },
    TradeAccepted { from: PlayerId, to: PlayerId },
    TradeRejected { by: PlayerId },

    // ==================== Debt ====================
    /// Houses were sold and tiles mortgaged to cover a debt
    AssetsLiquidated {
        player: PlayerId,
        houses_sold: u32,
        mortgaged: Vec<TileIndex>,
    },
    PlayerBankrupt {
        player: PlayerId,
        creditor: Option<PlayerId>,
    },

    // ==================== Turn Flow ====================
    TurnTimedOut { player: PlayerId },
    /// Doubles were rolled; same player goes again
    RollAgain { player: PlayerId },
    TurnEnded { player: PlayerId, next: PlayerId },
    ChatMessage { player: PlayerId, text: String },
    GameWon { player: PlayerId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_offer() {
        let offer = TradeOffer::new(1, 2);
        assert!(offer.is_empty());
        assert!(offer.involves(1));
        assert!(offer.involves(2));
        assert!(!offer.involves(3));

        let offer = TradeOffer {
            request_jail_tokens: 1,
            ..TradeOffer::new(1, 2)
        };
        assert!(!offer.is_empty());
    }

    #[test]
    fn test_action_json_shape() {
        let action: GameAction = serde_json::from_str(r#"{"BuildHouse":{"tile":6}}"#).unwrap();
        assert_eq!(action, GameAction::BuildHouse { tile: 6 });

        let action: GameAction = serde_json::from_str(r#""RollDice""#).unwrap();
        assert_eq!(action, GameAction::RollDice);
    }

    #[test]
    fn test_partial_trade_offer_deserializes() {
        let action: GameAction = serde_json::from_str(
            r#"{"ProposeTrade":{"from":1,"to":2,"offer_money":50,"request_properties":[6]}}"#,
        )
        .unwrap();
        let GameAction::ProposeTrade(offer) = action else {
            panic!("expected a trade proposal");
        };
        assert_eq!(offer.offer_money, 50);
        assert_eq!(offer.request_properties, vec![6]);
        assert!(offer.offer_properties.is_empty());
    }
}
