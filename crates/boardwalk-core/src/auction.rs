//! Auctions for declined tiles.
//!
//! Every active player may bid, including the one who declined. The auction
//! closes as soon as at most one bidder is left in it; the highest bid wins
//! even if that bidder has since withdrawn.

use crate::actions::GameEvent;
use crate::board::{tile, Money, PlayerId, TileIndex};
use crate::game::{Game, GameError, LogKind, TurnPhase};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Countdown shown when an auction opens
pub const AUCTION_OPENING_SECS: u32 = 15;

/// Countdown shown after each bid
pub const AUCTION_BID_SECS: u32 = 10;

/// A live auction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    pub tile: TileIndex,
    /// 0 until the first bid
    pub current_bid: Money,
    pub high_bidder: Option<PlayerId>,
    /// Players still in the auction
    pub bidders: Vec<PlayerId>,
    /// Display countdown; never enforced
    pub timer: u32,
}

impl Auction {
    pub fn new(tile: TileIndex, bidders: Vec<PlayerId>) -> Self {
        Self {
            tile,
            current_bid: 0,
            high_bidder: None,
            bidders,
            timer: AUCTION_OPENING_SECS,
        }
    }

    pub fn is_bidding(&self, player: PlayerId) -> bool {
        self.bidders.contains(&player)
    }
}

impl Game {
    /// Open an auction on `tile_index` with every active player bidding
    pub(crate) fn start_auction(&mut self, tile_index: TileIndex, events: &mut Vec<GameEvent>) {
        let bidders: Vec<PlayerId> = self.state.active_players().map(|p| p.id).collect();
        self.log(
            LogKind::System,
            format!("Auction opened for {}", tile(tile_index).name),
            None,
        );
        events.push(GameEvent::AuctionStarted {
            tile: tile_index,
            bidders: bidders.clone(),
        });
        self.state.turn = TurnPhase::Auction(Auction::new(tile_index, bidders));
    }

    pub(crate) fn place_bid(
        &mut self,
        player: PlayerId,
        amount: Money,
    ) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.index_of(player)?;
        let auction = self.state.auction().ok_or(GameError::NoAuction)?;
        if !auction.is_bidding(player) {
            return Err(GameError::NotInAuction);
        }
        if amount <= auction.current_bid {
            return Err(GameError::BidTooLow);
        }
        if !self.state.players[idx].can_afford(amount) {
            return Err(GameError::InsufficientFunds);
        }

        if let TurnPhase::Auction(auction) = &mut self.state.turn {
            auction.current_bid = amount;
            auction.high_bidder = Some(player);
            auction.timer = AUCTION_BID_SECS;
        }
        let message = format!("{} bid ${}", self.state.players[idx].name, amount);
        self.log(LogKind::Action, message, Some(player));
        Ok(vec![GameEvent::BidPlaced { player, amount }])
    }

    pub(crate) fn withdraw_bid(&mut self, player: PlayerId) -> Result<Vec<GameEvent>, GameError> {
        let idx = self.index_of(player)?;
        let auction = self.state.auction().ok_or(GameError::NoAuction)?;
        if !auction.is_bidding(player) {
            return Err(GameError::NotInAuction);
        }

        let mut remaining = 0;
        if let TurnPhase::Auction(auction) = &mut self.state.turn {
            auction.bidders.retain(|&b| b != player);
            remaining = auction.bidders.len();
        }
        let message = format!("{} withdrew from the auction", self.state.players[idx].name);
        self.log(LogKind::Action, message, Some(player));

        let mut events = vec![GameEvent::BidWithdrawn { player }];
        if remaining <= 1 {
            self.resolve_auction(&mut events);
        }
        Ok(events)
    }

    /// Close the auction: the high bidder pays and takes the tile, or it
    /// stays with the bank. The turn returns to post-roll.
    pub(crate) fn resolve_auction(&mut self, events: &mut Vec<GameEvent>) {
        let auction = match std::mem::replace(&mut self.state.turn, TurnPhase::PostRoll) {
            TurnPhase::Auction(auction) => auction,
            other => {
                self.state.turn = other;
                return;
            }
        };

        let winner = auction.high_bidder.and_then(|id| {
            self.state
                .player_index(id)
                .filter(|&i| {
                    let p = &self.state.players[i];
                    p.is_active() && p.can_afford(auction.current_bid)
                })
                .map(|i| (id, i))
        });

        match winner {
            Some((player, idx)) => {
                self.state.players[idx].cash -= auction.current_bid;
                self.grant_tile(auction.tile, idx);
                let message = format!(
                    "{} won {} for ${}",
                    self.state.players[idx].name,
                    tile(auction.tile).name,
                    auction.current_bid
                );
                self.log(LogKind::Action, message, Some(player));
                debug!(tile = auction.tile, player, amount = auction.current_bid, "auction won");
                events.push(GameEvent::AuctionWon {
                    player,
                    tile: auction.tile,
                    amount: auction.current_bid,
                });
            }
            None => {
                self.log(
                    LogKind::System,
                    format!("{} went unsold", tile(auction.tile).name),
                    None,
                );
                events.push(GameEvent::AuctionUnsold { tile: auction.tile });
            }
        }
    }
}
