//! Chance and Community Chest cards.
//!
//! This module contains:
//! - Card effects as a single sum type, resolved by the game
//! - The two 16-card catalogs
//! - Draw piles and their refill policy

use crate::board::{Money, TileIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Which deck a card belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeckKind {
    Chance,
    Chest,
}

impl DeckKind {
    /// Display name
    pub fn name(&self) -> &'static str {
        match self {
            DeckKind::Chance => "Chance",
            DeckKind::Chest => "Community Chest",
        }
    }

    /// The full, unshuffled catalog for this deck
    pub fn catalog(&self) -> Vec<Card> {
        match self {
            DeckKind::Chance => chance_cards(),
            DeckKind::Chest => chest_cards(),
        }
    }
}

/// Tile family targeted by an "advance to nearest" card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NearestKind {
    Station,
    Utility,
}

/// What a card does when drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardEffect {
    /// Bank pays the player
    Collect { amount: Money },
    /// Player pays the bank
    Pay { amount: Money },
    /// Move to an absolute tile, optionally collecting salary on the way past GO
    MoveTo { position: TileIndex, collect_go: bool },
    /// Move backwards; never collects salary
    MoveBack { spaces: usize },
    /// Straight to jail
    GoToJail,
    /// Keep this card to leave jail for free later
    JailRelease,
    /// Every other active player pays the drawer
    CollectFromEach { amount: Money },
    /// The drawer pays every other active player
    PayEach { amount: Money },
    /// Pay per house and per hotel owned
    Repairs { per_house: Money, per_hotel: Money },
    /// Advance to the next station or utility
    AdvanceToNearest { kind: NearestKind },
}

/// A single card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub deck: DeckKind,
    pub text: String,
    pub effect: CardEffect,
}

impl Card {
    fn new(id: &str, deck: DeckKind, text: &str, effect: CardEffect) -> Self {
        Self {
            id: id.to_string(),
            deck,
            text: text.to_string(),
            effect,
        }
    }

    /// Whether this is a keepable jail release card
    pub fn is_jail_release(&self) -> bool {
        matches!(self.effect, CardEffect::JailRelease)
    }
}

/// The 16 Chance cards
pub fn chance_cards() -> Vec<Card> {
    use CardEffect::*;
    let c = |id, text, effect| Card::new(id, DeckKind::Chance, text, effect);
    vec![
        c("ch1", "Advance to GO. Collect $200.", MoveTo { position: 0, collect_go: true }),
        c("ch2", "Advance to Gallery Road. If you pass GO, collect $200.", MoveTo { position: 24, collect_go: true }),
        c("ch3", "Advance to Rose Avenue. If you pass GO, collect $200.", MoveTo { position: 11, collect_go: true }),
        c("ch4", "Advance to the nearest Station.", AdvanceToNearest { kind: NearestKind::Station }),
        c("ch5", "Advance to the nearest Station.", AdvanceToNearest { kind: NearestKind::Station }),
        c("ch6", "Advance to the nearest Utility.", AdvanceToNearest { kind: NearestKind::Utility }),
        c("ch7", "Bank pays you $50.", Collect { amount: 50 }),
        c("ch8", "Get Out of Jail Free.", JailRelease),
        c("ch9", "Go back 3 spaces.", MoveBack { spaces: 3 }),
        c("ch10", "Go to Jail. Do not pass GO.", GoToJail),
        c("ch11", "Make general repairs: $25 per house, $100 per hotel.", Repairs { per_house: 25, per_hotel: 100 }),
        c("ch12", "Pay poor tax of $15.", Pay { amount: 15 }),
        c("ch13", "Advance to North Station. If you pass GO, collect $200.", MoveTo { position: 5, collect_go: true }),
        c("ch14", "You have been elected chairman. Pay each player $50.", PayEach { amount: 50 }),
        c("ch15", "Your building loan matures. Collect $150.", Collect { amount: 150 }),
        c("ch16", "You have won a crossword competition. Collect $100.", Collect { amount: 100 }),
    ]
}

/// The 16 Community Chest cards
pub fn chest_cards() -> Vec<Card> {
    use CardEffect::*;
    let c = |id, text, effect| Card::new(id, DeckKind::Chest, text, effect);
    vec![
        c("cc1", "Advance to GO. Collect $200.", MoveTo { position: 0, collect_go: true }),
        c("cc2", "Bank error in your favor. Collect $200.", Collect { amount: 200 }),
        c("cc3", "Doctor's fee. Pay $50.", Pay { amount: 50 }),
        c("cc4", "From sale of stock you get $50.", Collect { amount: 50 }),
        c("cc5", "Get Out of Jail Free.", JailRelease),
        c("cc6", "Go to Jail. Do not pass GO.", GoToJail),
        c("cc7", "Holiday fund matures. Collect $100.", Collect { amount: 100 }),
        c("cc8", "Income tax refund. Collect $20.", Collect { amount: 20 }),
        c("cc9", "It is your birthday. Collect $10 from every player.", CollectFromEach { amount: 10 }),
        c("cc10", "Life insurance matures. Collect $100.", Collect { amount: 100 }),
        c("cc11", "Pay hospital fees of $100.", Pay { amount: 100 }),
        c("cc12", "Pay school fees of $50.", Pay { amount: 50 }),
        c("cc13", "Receive $25 consultancy fee.", Collect { amount: 25 }),
        c("cc14", "Street repair assessment: $40 per house, $115 per hotel.", Repairs { per_house: 40, per_hotel: 115 }),
        c("cc15", "You have won second prize in a beauty contest. Collect $10.", Collect { amount: 10 }),
        c("cc16", "You inherit $100.", Collect { amount: 100 }),
    ]
}

/// A shuffled draw pile.
///
/// Drawing takes the front card. An empty pile is refilled with a freshly
/// shuffled copy of the catalog minus its jail release cards, so once the
/// first pile runs out those cards never come back.
#[derive(Debug, Clone)]
pub struct Deck {
    kind: DeckKind,
    pile: VecDeque<Card>,
}

impl Deck {
    /// Create a full, shuffled deck
    pub fn new<R: Rng>(kind: DeckKind, rng: &mut R) -> Self {
        let mut cards = kind.catalog();
        cards.shuffle(rng);
        Self {
            kind,
            pile: cards.into(),
        }
    }

    /// Which deck this is
    pub fn kind(&self) -> DeckKind {
        self.kind
    }

    /// Cards left before the next refill
    pub fn remaining(&self) -> usize {
        self.pile.len()
    }

    /// Draw the top card, refilling first if the pile is empty
    pub fn draw<R: Rng>(&mut self, rng: &mut R) -> Card {
        if self.pile.is_empty() {
            let mut refill: Vec<Card> = self
                .kind
                .catalog()
                .into_iter()
                .filter(|c| !c.is_jail_release())
                .collect();
            refill.shuffle(rng);
            debug!(deck = ?self.kind, cards = refill.len(), "refilled draw pile");
            self.pile = refill.into();
        }

        self.pile
            .pop_front()
            .expect("refilled pile is never empty")
    }

    /// Place a card on top of the pile so it is drawn next
    #[cfg(test)]
    pub(crate) fn put_on_top(&mut self, card: Card) {
        self.pile.push_front(card);
    }
}
