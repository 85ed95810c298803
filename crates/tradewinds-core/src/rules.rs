//! Action validation.
//!
//! `validate` answers whether an action is legal for a given actor in a given
//! state without touching anything. The reducer calls it first and only
//! mutates a copy of the state once it passes.

use crate::actions::{CardPlay, PlayerAction, TradeId};
use crate::board::{EdgeId, EdgeOccupant, NodeId, NodeOccupant, PlayerId, Resource};
use crate::game::{GameState, Phase, Rejection};
use crate::player::{costs, PlayerState, ResourceHand};

/// Check an action against the current state.
pub fn validate(state: &GameState, action: &PlayerAction, actor: PlayerId) -> Result<(), Rejection> {
    let player = state.player(actor).ok_or(Rejection::UnknownPlayer)?;

    // Responses to an offer come from the counterparty, whoever's turn it is
    match action {
        PlayerAction::AcceptTrade { trade } => return can_accept_trade(state, *trade, actor),
        PlayerAction::RejectTrade { trade } => return can_reject_trade(state, *trade, actor),
        _ => {}
    }

    if actor != state.current_player {
        return Err(Rejection::NotYourTurn);
    }

    if state.phase.is_setup()
        && !matches!(
            action,
            PlayerAction::BuildSettlement { .. }
                | PlayerAction::BuildRoad { .. }
                | PlayerAction::FinishStep
        )
    {
        return Err(Rejection::InvalidPhase);
    }

    match action {
        PlayerAction::BuildSettlement { node } => can_build_settlement(state, player, *node),
        PlayerAction::BuildCity { node } => can_build_city(state, player, *node),
        PlayerAction::BuildRoad { edge } => can_build_road(state, player, *edge),
        PlayerAction::DrawDevelopmentCard => can_draw_card(state, player),
        PlayerAction::PlayDevelopmentCard { play } => can_play_card(state, player, play),
        PlayerAction::OfferTrade {
            offered,
            requested,
            counterparty,
        } => can_offer_trade(state, player, offered, requested, *counterparty),
        PlayerAction::WithdrawTrade { trade } => can_withdraw_trade(state, *trade, actor),
        PlayerAction::RollDice => {
            if state.turn_state.rolled {
                Err(Rejection::AlreadyRolled)
            } else {
                Ok(())
            }
        }
        PlayerAction::TradeWithBank { give, receive } => {
            can_trade_with_bank(state, player, *give, *receive)
        }
        PlayerAction::FinishStep => Ok(()),
        PlayerAction::AcceptTrade { .. } | PlayerAction::RejectTrade { .. } => Ok(()),
    }
}

// ==================== Costs ====================

/// What a road costs right now: nothing during free setup or while Road
/// Building credits remain.
pub(crate) fn road_cost(state: &GameState) -> ResourceHand {
    let free = match state.phase {
        Phase::Setup1 | Phase::Setup2 => state.config.free_setup_builds,
        Phase::Main => state.turn_state.free_roads > 0,
    };
    if free {
        ResourceHand::new()
    } else {
        costs::road()
    }
}

pub(crate) fn settlement_cost(state: &GameState) -> ResourceHand {
    if state.phase.is_setup() && state.config.free_setup_builds {
        ResourceHand::new()
    } else {
        costs::settlement()
    }
}

// ==================== Building ====================

fn can_build_settlement(
    state: &GameState,
    player: &PlayerState,
    node: NodeId,
) -> Result<(), Rejection> {
    let occupant = state.board.node(node).ok_or(Rejection::UnknownNode)?;
    if occupant != NodeOccupant::Empty {
        return Err(Rejection::Occupied);
    }
    if !state.board.satisfies_distance_rule(node) {
        return Err(Rejection::TooClose);
    }

    if state.phase.is_setup() {
        if state.turn_state.setup_settlement.is_some() {
            return Err(Rejection::SettlementAlreadyPlaced);
        }
    } else if !state.board.touches_own_road(node, player.id) {
        return Err(Rejection::NotConnected);
    }

    if player.pools.settlements == 0 {
        return Err(Rejection::NoPiecesRemaining);
    }
    if !player.resources.can_afford(&settlement_cost(state)) {
        return Err(Rejection::CannotAfford);
    }
    Ok(())
}

fn can_build_city(state: &GameState, player: &PlayerState, node: NodeId) -> Result<(), Rejection> {
    let occupant = state.board.node(node).ok_or(Rejection::UnknownNode)?;
    if occupant != NodeOccupant::Settlement(player.id) {
        return Err(Rejection::NotYourSettlement);
    }
    if player.pools.cities == 0 {
        return Err(Rejection::NoPiecesRemaining);
    }
    if !player.resources.can_afford(&costs::city()) {
        return Err(Rejection::CannotAfford);
    }
    Ok(())
}

fn can_build_road(state: &GameState, player: &PlayerState, edge: EdgeId) -> Result<(), Rejection> {
    let occupant = state.board.edge(edge).ok_or(Rejection::UnknownEdge)?;
    if occupant != EdgeOccupant::Empty {
        return Err(Rejection::Occupied);
    }

    if state.phase.is_setup() {
        let settlement = state
            .turn_state
            .setup_settlement
            .ok_or(Rejection::SettlementFirst)?;
        if state.turn_state.setup_road_placed {
            return Err(Rejection::RoadAlreadyPlaced);
        }
        if !state.board.edge_touches(edge, settlement) {
            return Err(Rejection::NotConnected);
        }
    } else if !state.board.extends_network(edge, player.id) {
        return Err(Rejection::NotConnected);
    }

    if player.pools.roads == 0 {
        return Err(Rejection::NoPiecesRemaining);
    }
    if !player.resources.can_afford(&road_cost(state)) {
        return Err(Rejection::CannotAfford);
    }
    Ok(())
}

// ==================== Development Cards ====================

fn can_draw_card(state: &GameState, player: &PlayerState) -> Result<(), Rejection> {
    if state.development_deck.is_empty() {
        return Err(Rejection::EmptyDeck);
    }
    if !player.resources.can_afford(&costs::development_card()) {
        return Err(Rejection::CannotAfford);
    }
    Ok(())
}

fn can_play_card(state: &GameState, player: &PlayerState, play: &CardPlay) -> Result<(), Rejection> {
    if state.turn_state.development_card_played {
        return Err(Rejection::CardAlreadyPlayed);
    }
    if player.playable_card(play.card(), state.turn).is_none() {
        return Err(Rejection::NoSuchCard);
    }

    match *play {
        CardPlay::Knight { target_hex } => {
            state.board.hex(target_hex).ok_or(Rejection::UnknownHex)?;
            if state.board.robber().hex == target_hex {
                return Err(Rejection::RobberAlreadyThere);
            }
        }
        CardPlay::YearOfPlenty { first, second } => {
            let mut wanted = ResourceHand::single(first, 1);
            wanted.add(second, 1);
            if !state.bank.can_afford(&wanted) {
                return Err(Rejection::BankExhausted);
            }
        }
        CardPlay::RoadBuilding => {
            if player.pools.roads == 0 {
                return Err(Rejection::NoPiecesRemaining);
            }
        }
        CardPlay::Monopoly { .. } => {}
    }
    Ok(())
}

// ==================== Trading ====================

fn can_offer_trade(
    state: &GameState,
    player: &PlayerState,
    offered: &ResourceHand,
    requested: &ResourceHand,
    counterparty: PlayerId,
) -> Result<(), Rejection> {
    if offered.is_empty() || requested.is_empty() || counterparty == player.id {
        return Err(Rejection::InvalidTrade);
    }
    if state.player(counterparty).is_none() {
        return Err(Rejection::InvalidTrade);
    }
    if !player.resources.can_afford(offered) {
        return Err(Rejection::CannotAfford);
    }
    Ok(())
}

fn can_accept_trade(state: &GameState, trade: TradeId, actor: PlayerId) -> Result<(), Rejection> {
    let offer = state.trade(trade).ok_or(Rejection::NoSuchTrade)?;
    if offer.to != actor {
        return Err(Rejection::NotCounterparty);
    }
    // Hands may have changed since the offer was made
    let offerer = state.player(offer.from).ok_or(Rejection::UnknownPlayer)?;
    let accepter = state.player(actor).ok_or(Rejection::UnknownPlayer)?;
    if !offerer.resources.can_afford(&offer.offered)
        || !accepter.resources.can_afford(&offer.requested)
    {
        return Err(Rejection::CannotAfford);
    }
    Ok(())
}

fn can_reject_trade(state: &GameState, trade: TradeId, actor: PlayerId) -> Result<(), Rejection> {
    let offer = state.trade(trade).ok_or(Rejection::NoSuchTrade)?;
    if offer.to != actor {
        return Err(Rejection::NotCounterparty);
    }
    Ok(())
}

fn can_withdraw_trade(state: &GameState, trade: TradeId, actor: PlayerId) -> Result<(), Rejection> {
    let offer = state.trade(trade).ok_or(Rejection::NoSuchTrade)?;
    if offer.from != actor {
        return Err(Rejection::NotOfferer);
    }
    Ok(())
}

fn can_trade_with_bank(
    state: &GameState,
    player: &PlayerState,
    give: Resource,
    receive: Resource,
) -> Result<(), Rejection> {
    if give == receive {
        return Err(Rejection::InvalidTrade);
    }
    if player.resources.get(give) < costs::BANK_TRADE_RATE {
        return Err(Rejection::CannotAfford);
    }
    if state.bank.get(receive) == 0 {
        return Err(Rejection::BankExhausted);
    }
    Ok(())
}
