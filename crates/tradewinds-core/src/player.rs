//! Player state and resource management.
//!
//! This module contains:
//! - ResourceHand for resource counts (players and the bank)
//! - Building costs and structure pools
//! - Development and special cards
//! - The per-player record

use crate::board::{EdgeId, NodeId, PlayerId, Resource};
use serde::{Deserialize, Serialize};

/// Development card types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DevelopmentCard {
    /// Moves the robber, counts toward Largest Army
    Knight,
    /// Worth 1 point, never played
    VictoryPoint,
    /// Two free roads
    RoadBuilding,
    /// Two resources from the bank
    YearOfPlenty,
    /// Every other player hands over all of one resource
    Monopoly,
}

impl DevelopmentCard {
    /// Whether this card can be played (victory point cards are only held)
    pub fn is_playable(&self) -> bool {
        !matches!(self, DevelopmentCard::VictoryPoint)
    }
}

/// A development card in hand, with the turn it was drawn on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeldCard {
    pub card: DevelopmentCard,
    pub drawn_on_turn: u32,
}

/// Achievement cards worth bonus points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialCard {
    LargestArmy,
}

/// A multiset of resources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHand {
    pub brick: u32,
    pub lumber: u32,
    pub ore: u32,
    pub grain: u32,
    pub wool: u32,
}

impl ResourceHand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_amounts(brick: u32, lumber: u32, ore: u32, grain: u32, wool: u32) -> Self {
        Self {
            brick,
            lumber,
            ore,
            grain,
            wool,
        }
    }

    /// The same amount of every resource
    pub fn uniform(amount: u32) -> Self {
        Self::with_amounts(amount, amount, amount, amount, amount)
    }

    pub fn single(resource: Resource, amount: u32) -> Self {
        let mut hand = Self::new();
        hand.add(resource, amount);
        hand
    }

    pub fn total(&self) -> u32 {
        self.brick + self.lumber + self.ore + self.grain + self.wool
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn get(&self, resource: Resource) -> u32 {
        match resource {
            Resource::Brick => self.brick,
            Resource::Lumber => self.lumber,
            Resource::Ore => self.ore,
            Resource::Grain => self.grain,
            Resource::Wool => self.wool,
        }
    }

    fn slot(&mut self, resource: Resource) -> &mut u32 {
        match resource {
            Resource::Brick => &mut self.brick,
            Resource::Lumber => &mut self.lumber,
            Resource::Ore => &mut self.ore,
            Resource::Grain => &mut self.grain,
            Resource::Wool => &mut self.wool,
        }
    }

    pub fn set(&mut self, resource: Resource, count: u32) {
        *self.slot(resource) = count;
    }

    pub fn add(&mut self, resource: Resource, amount: u32) {
        *self.slot(resource) += amount;
    }

    pub fn add_hand(&mut self, other: &ResourceHand) {
        for r in Resource::ALL {
            self.add(r, other.get(r));
        }
    }

    pub fn can_afford(&self, cost: &ResourceHand) -> bool {
        Resource::ALL.iter().all(|&r| self.get(r) >= cost.get(r))
    }

    /// `self - cost`, or `None` if any count would go negative
    pub fn checked_sub(&self, cost: &ResourceHand) -> Option<ResourceHand> {
        let mut out = *self;
        for r in Resource::ALL {
            *out.slot(r) = self.get(r).checked_sub(cost.get(r))?;
        }
        Some(out)
    }
}

/// Building costs
pub mod costs {
    use super::ResourceHand;

    /// 1 brick, 1 lumber
    pub fn road() -> ResourceHand {
        ResourceHand::with_amounts(1, 1, 0, 0, 0)
    }

    /// 1 brick, 1 lumber, 1 grain, 1 wool
    pub fn settlement() -> ResourceHand {
        ResourceHand::with_amounts(1, 1, 0, 1, 1)
    }

    /// 3 ore, 2 grain
    pub fn city() -> ResourceHand {
        ResourceHand::with_amounts(0, 0, 3, 2, 0)
    }

    /// 1 ore, 1 grain, 1 wool
    pub fn development_card() -> ResourceHand {
        ResourceHand::with_amounts(0, 0, 1, 1, 1)
    }

    /// Resources handed to the bank per card received
    pub const BANK_TRADE_RATE: u32 = 4;
}

/// Structures a player can still place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructurePools {
    pub roads: u32,
    pub settlements: u32,
    pub cities: u32,
}

impl StructurePools {
    pub const ROADS: u32 = 15;
    pub const SETTLEMENTS: u32 = 5;
    pub const CITIES: u32 = 4;

    pub fn full() -> Self {
        Self {
            roads: Self::ROADS,
            settlements: Self::SETTLEMENTS,
            cities: Self::CITIES,
        }
    }
}

/// A single player's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Index in the turn order
    pub id: PlayerId,
    pub username: String,
    pub resources: ResourceHand,
    pub pools: StructurePools,
    pub settlements: Vec<NodeId>,
    pub cities: Vec<NodeId>,
    pub roads: Vec<EdgeId>,
    pub development_cards: Vec<HeldCard>,
    pub knights_played: u32,
    pub special_cards: Vec<SpecialCard>,
    /// Public victory points
    pub score: u32,
}

impl PlayerState {
    pub fn new(id: PlayerId, username: String) -> Self {
        Self {
            id,
            username,
            resources: ResourceHand::new(),
            pools: StructurePools::full(),
            settlements: Vec::new(),
            cities: Vec::new(),
            roads: Vec::new(),
            development_cards: Vec::new(),
            knights_played: 0,
            special_cards: Vec::new(),
            score: 0,
        }
    }

    /// Victory point cards, hidden from opponents
    pub fn hidden_points(&self) -> u32 {
        self.development_cards
            .iter()
            .filter(|c| c.card == DevelopmentCard::VictoryPoint)
            .count() as u32
    }

    /// Position in hand of a copy of `card` drawn before `turn`. Victory
    /// point cards are never playable.
    pub fn playable_card(&self, card: DevelopmentCard, turn: u32) -> Option<usize> {
        if !card.is_playable() {
            return None;
        }
        self.development_cards
            .iter()
            .position(|held| held.card == card && held.drawn_on_turn < turn)
    }

    pub fn holds(&self, card: DevelopmentCard) -> bool {
        self.development_cards.iter().any(|held| held.card == card)
    }
}
