//! Player actions and the change-events they produce.
//!
//! A `PlayerAction` is what a client asks for; a `GameEvent` is one discrete
//! change the engine made while applying it. Events are what the transport
//! broadcasts so clients can update incrementally.

use crate::board::{EdgeId, HexId, NodeId, PlayerId, Resource};
use crate::game::Phase;
use crate::player::{DevelopmentCard, ResourceHand};
use serde::{Deserialize, Serialize};

/// Identifier of a pending trade offer, unique within a match
pub type TradeId = u32;

/// Everything a player can ask the engine to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerAction {
    BuildSettlement { node: NodeId },
    BuildCity { node: NodeId },
    BuildRoad { edge: EdgeId },
    DrawDevelopmentCard,
    PlayDevelopmentCard { play: CardPlay },
    OfferTrade {
        offered: ResourceHand,
        requested: ResourceHand,
        counterparty: PlayerId,
    },
    AcceptTrade { trade: TradeId },
    RejectTrade { trade: TradeId },
    WithdrawTrade { trade: TradeId },
    RollDice,
    TradeWithBank { give: Resource, receive: Resource },
    FinishStep,
}

impl PlayerAction {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            PlayerAction::BuildSettlement { .. } => "BuildSettlement",
            PlayerAction::BuildCity { .. } => "BuildCity",
            PlayerAction::BuildRoad { .. } => "BuildRoad",
            PlayerAction::DrawDevelopmentCard => "DrawDevelopmentCard",
            PlayerAction::PlayDevelopmentCard { .. } => "PlayDevelopmentCard",
            PlayerAction::OfferTrade { .. } => "OfferTrade",
            PlayerAction::AcceptTrade { .. } => "AcceptTrade",
            PlayerAction::RejectTrade { .. } => "RejectTrade",
            PlayerAction::WithdrawTrade { .. } => "WithdrawTrade",
            PlayerAction::RollDice => "RollDice",
            PlayerAction::TradeWithBank { .. } => "TradeWithBank",
            PlayerAction::FinishStep => "FinishStep",
        }
    }
}

/// A development card together with the choices it needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardPlay {
    Knight { target_hex: HexId },
    YearOfPlenty { first: Resource, second: Resource },
    Monopoly { resource: Resource },
    RoadBuilding,
}

impl CardPlay {
    pub fn card(&self) -> DevelopmentCard {
        match self {
            CardPlay::Knight { .. } => DevelopmentCard::Knight,
            CardPlay::YearOfPlenty { .. } => DevelopmentCard::YearOfPlenty,
            CardPlay::Monopoly { .. } => DevelopmentCard::Monopoly,
            CardPlay::RoadBuilding => DevelopmentCard::RoadBuilding,
        }
    }
}

/// A pending trade between two players
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOffer {
    pub id: TradeId,
    pub from: PlayerId,
    pub to: PlayerId,
    pub offered: ResourceHand,
    pub requested: ResourceHand,
}

/// One discrete state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameEvent {
    SettlementBuilt {
        player: PlayerId,
        node: NodeId,
        score: u32,
    },
    CityBuilt {
        player: PlayerId,
        node: NodeId,
        score: u32,
    },
    RoadBuilt {
        player: PlayerId,
        edge: EdgeId,
    },
    DevelopmentCardDrawn {
        player: PlayerId,
        remaining: usize,
    },
    DevelopmentCardPlayed {
        player: PlayerId,
        card: DevelopmentCard,
    },
    RobberMoved {
        player: PlayerId,
        from: HexId,
        to: HexId,
    },
    LargestArmyAwarded {
        player: PlayerId,
        score: u32,
    },
    /// Resources paid out by the bank (production, Year of Plenty, setup)
    ResourcesReceived {
        player: PlayerId,
        resources: ResourceHand,
    },
    MonopolyCollected {
        player: PlayerId,
        resource: Resource,
        total: u32,
    },
    FreeRoadsGranted {
        player: PlayerId,
        count: u8,
    },
    DiceRolled {
        player: PlayerId,
        roll: (u8, u8),
        total: u8,
    },
    TradeOffered {
        offer: TradeOffer,
    },
    TradeCompleted {
        trade: TradeId,
        from: PlayerId,
        to: PlayerId,
    },
    TradeRejected {
        trade: TradeId,
    },
    TradeWithdrawn {
        trade: TradeId,
    },
    TradesExpired {
        trades: Vec<TradeId>,
    },
    BankTradeCompleted {
        player: PlayerId,
        gave: Resource,
        received: Resource,
    },
    TurnAdvanced {
        player: PlayerId,
        next_player: PlayerId,
        phase: Phase,
    },
}
