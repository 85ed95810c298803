//! Applying validated actions.
//!
//! `apply` never touches its input: it validates, clones, and mutates the
//! clone. Every executor below assumes validation already passed, but still
//! refuses rather than panics if an invariant turns out not to hold.

use crate::actions::{CardPlay, GameEvent, PlayerAction, TradeId, TradeOffer};
use crate::board::{EdgeId, HexId, NodeId, PlayerId, Resource};
use crate::game::{GameState, Phase, Rejection};
use crate::player::{costs, HeldCard, PlayerState, ResourceHand, SpecialCard};
use crate::rules::{self, validate};
use crate::turn;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Validate `action` for `actor` and return the next state with its events.
pub fn apply(
    state: &GameState,
    action: &PlayerAction,
    actor: PlayerId,
) -> Result<(GameState, Vec<GameEvent>), Rejection> {
    validate(state, action, actor)?;
    let mut next = state.clone();
    let events = execute(&mut next, action, actor)?;
    Ok((next, events))
}

pub(crate) fn execute(
    state: &mut GameState,
    action: &PlayerAction,
    actor: PlayerId,
) -> Result<Vec<GameEvent>, Rejection> {
    match action {
        PlayerAction::BuildSettlement { node } => build_settlement(state, actor, *node),
        PlayerAction::BuildCity { node } => build_city(state, actor, *node),
        PlayerAction::BuildRoad { edge } => build_road(state, actor, *edge),
        PlayerAction::DrawDevelopmentCard => draw_card(state, actor),
        PlayerAction::PlayDevelopmentCard { play } => play_card(state, actor, play),
        PlayerAction::OfferTrade {
            offered,
            requested,
            counterparty,
        } => Ok(offer_trade(state, actor, *offered, *requested, *counterparty)),
        PlayerAction::AcceptTrade { trade } => accept_trade(state, *trade),
        PlayerAction::RejectTrade { trade } => {
            take_offer(state, *trade)?;
            Ok(vec![GameEvent::TradeRejected { trade: *trade }])
        }
        PlayerAction::WithdrawTrade { trade } => {
            take_offer(state, *trade)?;
            Ok(vec![GameEvent::TradeWithdrawn { trade: *trade }])
        }
        PlayerAction::RollDice => roll_dice(state, actor),
        PlayerAction::TradeWithBank { give, receive } => {
            trade_with_bank(state, actor, *give, *receive)
        }
        PlayerAction::FinishStep => Ok(turn::advance(state)),
    }
}

// ==================== Bank Transfers ====================

fn player_mut(state: &mut GameState, id: PlayerId) -> Result<&mut PlayerState, Rejection> {
    state
        .players
        .get_mut(id as usize)
        .ok_or(Rejection::UnknownPlayer)
}

/// Move `cost` from a player's hand into the bank
fn pay(state: &mut GameState, id: PlayerId, cost: &ResourceHand) -> Result<(), Rejection> {
    let player = player_mut(state, id)?;
    player.resources = player
        .resources
        .checked_sub(cost)
        .ok_or(Rejection::CannotAfford)?;
    state.bank.add_hand(cost);
    Ok(())
}

/// Move `hand` from the bank into a player's hand
fn receive(state: &mut GameState, id: PlayerId, hand: &ResourceHand) -> Result<(), Rejection> {
    state.bank = state.bank.checked_sub(hand).ok_or(Rejection::BankExhausted)?;
    player_mut(state, id)?.resources.add_hand(hand);
    Ok(())
}

// ==================== Building ====================

fn build_settlement(
    state: &mut GameState,
    actor: PlayerId,
    node: NodeId,
) -> Result<Vec<GameEvent>, Rejection> {
    let cost = rules::settlement_cost(state);
    pay(state, actor, &cost)?;
    state.board.place_settlement(node, actor);

    let player = player_mut(state, actor)?;
    player.pools.settlements = player
        .pools
        .settlements
        .checked_sub(1)
        .ok_or(Rejection::NoPiecesRemaining)?;
    player.settlements.push(node);
    player.score += 1;
    let score = player.score;

    let mut events = vec![GameEvent::SettlementBuilt {
        player: actor,
        node,
        score,
    }];

    if state.phase.is_setup() {
        state.turn_state.setup_settlement = Some(node);
        if state.phase == Phase::Setup2 && state.config.free_setup_builds {
            let mut payout = state.board.resources_around(node);
            for r in Resource::ALL {
                payout.set(r, payout.get(r).min(state.bank.get(r)));
            }
            if !payout.is_empty() {
                receive(state, actor, &payout)?;
                events.push(GameEvent::ResourcesReceived {
                    player: actor,
                    resources: payout,
                });
            }
        }
    }
    Ok(events)
}

fn build_city(
    state: &mut GameState,
    actor: PlayerId,
    node: NodeId,
) -> Result<Vec<GameEvent>, Rejection> {
    pay(state, actor, &costs::city())?;
    state.board.upgrade_to_city(node, actor);

    let player = player_mut(state, actor)?;
    player.pools.cities = player
        .pools
        .cities
        .checked_sub(1)
        .ok_or(Rejection::NoPiecesRemaining)?;
    // The settlement piece goes back to the pool
    player.pools.settlements += 1;
    player.settlements.retain(|n| *n != node);
    player.cities.push(node);
    player.score += 1;

    Ok(vec![GameEvent::CityBuilt {
        player: actor,
        node,
        score: player.score,
    }])
}

fn build_road(
    state: &mut GameState,
    actor: PlayerId,
    edge: EdgeId,
) -> Result<Vec<GameEvent>, Rejection> {
    let cost = rules::road_cost(state);
    pay(state, actor, &cost)?;

    match state.phase {
        Phase::Setup1 | Phase::Setup2 => state.turn_state.setup_road_placed = true,
        Phase::Main => {
            state.turn_state.free_roads = state.turn_state.free_roads.saturating_sub(1);
        }
    }
    state.board.place_road(edge, actor);

    let player = player_mut(state, actor)?;
    player.pools.roads = player
        .pools
        .roads
        .checked_sub(1)
        .ok_or(Rejection::NoPiecesRemaining)?;
    player.roads.push(edge);

    Ok(vec![GameEvent::RoadBuilt {
        player: actor,
        edge,
    }])
}

// ==================== Development Cards ====================

fn draw_card(state: &mut GameState, actor: PlayerId) -> Result<Vec<GameEvent>, Rejection> {
    let card = state.development_deck.pop().ok_or(Rejection::EmptyDeck)?;
    pay(state, actor, &costs::development_card())?;

    let turn = state.turn;
    player_mut(state, actor)?.development_cards.push(HeldCard {
        card,
        drawn_on_turn: turn,
    });

    Ok(vec![GameEvent::DevelopmentCardDrawn {
        player: actor,
        remaining: state.development_deck.len(),
    }])
}

fn play_card(
    state: &mut GameState,
    actor: PlayerId,
    play: &CardPlay,
) -> Result<Vec<GameEvent>, Rejection> {
    let card = play.card();
    let turn = state.turn;
    let player = player_mut(state, actor)?;
    let index = player
        .playable_card(card, turn)
        .ok_or(Rejection::NoSuchCard)?;
    player.development_cards.remove(index);
    state.turn_state.development_card_played = true;

    let mut events = vec![GameEvent::DevelopmentCardPlayed {
        player: actor,
        card,
    }];

    match *play {
        CardPlay::Knight { target_hex } => events.extend(play_knight(state, actor, target_hex)?),
        CardPlay::YearOfPlenty { first, second } => {
            let mut hand = ResourceHand::single(first, 1);
            hand.add(second, 1);
            receive(state, actor, &hand)?;
            events.push(GameEvent::ResourcesReceived {
                player: actor,
                resources: hand,
            });
        }
        CardPlay::Monopoly { resource } => {
            let mut total = 0;
            for other in state.players.iter_mut().filter(|p| p.id != actor) {
                total += other.resources.get(resource);
                other.resources.set(resource, 0);
            }
            player_mut(state, actor)?.resources.add(resource, total);
            events.push(GameEvent::MonopolyCollected {
                player: actor,
                resource,
                total,
            });
        }
        CardPlay::RoadBuilding => {
            let count = player_mut(state, actor)?.pools.roads.min(2) as u8;
            state.turn_state.free_roads = count;
            events.push(GameEvent::FreeRoadsGranted {
                player: actor,
                count,
            });
        }
    }
    Ok(events)
}

fn play_knight(
    state: &mut GameState,
    actor: PlayerId,
    target_hex: HexId,
) -> Result<Vec<GameEvent>, Rejection> {
    let mut events = Vec::new();
    let threshold = state.config.largest_army_threshold;
    let unclaimed = state.largest_army.is_none();

    let player = player_mut(state, actor)?;
    player.knights_played += 1;
    if unclaimed && player.knights_played >= threshold {
        player.special_cards.push(SpecialCard::LargestArmy);
        player.score += 2;
        events.push(GameEvent::LargestArmyAwarded {
            player: actor,
            score: player.score,
        });
        state.largest_army = Some(actor);
    }

    let from = state.board.robber().hex;
    state.board.move_robber(target_hex);
    events.push(GameEvent::RobberMoved {
        player: actor,
        from,
        to: target_hex,
    });
    Ok(events)
}

// ==================== Trading ====================

fn offer_trade(
    state: &mut GameState,
    actor: PlayerId,
    offered: ResourceHand,
    requested: ResourceHand,
    counterparty: PlayerId,
) -> Vec<GameEvent> {
    let offer = TradeOffer {
        id: state.next_trade_id,
        from: actor,
        to: counterparty,
        offered,
        requested,
    };
    state.next_trade_id += 1;
    state.trades.push(offer.clone());
    vec![GameEvent::TradeOffered { offer }]
}

fn take_offer(state: &mut GameState, trade: TradeId) -> Result<TradeOffer, Rejection> {
    let index = state
        .trades
        .iter()
        .position(|t| t.id == trade)
        .ok_or(Rejection::NoSuchTrade)?;
    Ok(state.trades.remove(index))
}

fn accept_trade(state: &mut GameState, trade: TradeId) -> Result<Vec<GameEvent>, Rejection> {
    let offer = take_offer(state, trade)?;

    let from = player_mut(state, offer.from)?;
    from.resources = from
        .resources
        .checked_sub(&offer.offered)
        .ok_or(Rejection::CannotAfford)?;
    from.resources.add_hand(&offer.requested);

    let to = player_mut(state, offer.to)?;
    to.resources = to
        .resources
        .checked_sub(&offer.requested)
        .ok_or(Rejection::CannotAfford)?;
    to.resources.add_hand(&offer.offered);

    Ok(vec![GameEvent::TradeCompleted {
        trade,
        from: offer.from,
        to: offer.to,
    }])
}

fn trade_with_bank(
    state: &mut GameState,
    actor: PlayerId,
    give: Resource,
    get: Resource,
) -> Result<Vec<GameEvent>, Rejection> {
    pay(state, actor, &ResourceHand::single(give, costs::BANK_TRADE_RATE))?;
    receive(state, actor, &ResourceHand::single(get, 1))?;
    Ok(vec![GameEvent::BankTradeCompleted {
        player: actor,
        gave: give,
        received: get,
    }])
}

// ==================== Dice ====================

/// Two dice, reproducible from the match seed and the turn number
fn dice_for_turn(seed: u64, turn: u32) -> (u8, u8) {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(u64::from(turn)));
    (rng.gen_range(1..=6), rng.gen_range(1..=6))
}

fn roll_dice(state: &mut GameState, actor: PlayerId) -> Result<Vec<GameEvent>, Rejection> {
    let roll = dice_for_turn(state.dice_seed(), state.turn);
    let total = roll.0 + roll.1;
    state.turn_state.rolled = true;

    let mut events = vec![GameEvent::DiceRolled {
        player: actor,
        roll,
        total,
    }];
    if total == 7 {
        return Ok(events);
    }

    let owed = state.board.production(total);
    // A resource the bank cannot fully cover is paid to nobody
    let short: Vec<Resource> = Resource::ALL
        .into_iter()
        .filter(|&r| owed.iter().map(|(_, hand)| hand.get(r)).sum::<u32>() > state.bank.get(r))
        .collect();

    for (player, mut hand) in owed {
        for r in &short {
            hand.set(*r, 0);
        }
        if hand.is_empty() {
            continue;
        }
        receive(state, player, &hand)?;
        events.push(GameEvent::ResourcesReceived {
            player,
            resources: hand,
        });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::player::DevelopmentCard;
    use pretty_assertions::assert_eq;

    fn game() -> GameState {
        let names: Vec<String> = ["ana", "bo", "cy"].iter().map(|s| s.to_string()).collect();
        let mut state = GameState::new(
            &names,
            GameConfig::default(),
            &mut rand::rngs::StdRng::seed_from_u64(4),
        )
        .unwrap();
        state.phase = Phase::Main;
        state.turn = 10;
        state
    }

    fn hold(state: &mut GameState, player: PlayerId, card: DevelopmentCard) {
        state.players[player as usize]
            .development_cards
            .push(HeldCard { card, drawn_on_turn: 0 });
    }

    #[test]
    fn test_apply_leaves_input_untouched() {
        let state = game();
        let before = state.clone();
        let (next, _) = apply(&state, &PlayerAction::FinishStep, 0).unwrap();
        assert_eq!(state, before);
        assert_eq!(next.current_player, 1);
    }

    #[test]
    fn test_city_replaces_settlement() {
        let mut state = game();
        state.board.place_settlement(7, 0);
        state.players[0].settlements.push(7);
        state.players[0].pools.settlements -= 1;
        state.players[0].score = 1;
        state.players[0].resources = costs::city();
        state.bank = state.bank.checked_sub(&costs::city()).unwrap();

        let (next, events) = apply(&state, &PlayerAction::BuildCity { node: 7 }, 0).unwrap();
        let player = &next.players[0];
        assert_eq!(player.score, 2);
        assert!(player.settlements.is_empty());
        assert_eq!(player.cities, vec![7]);
        assert_eq!(player.pools.settlements, 5);
        assert_eq!(player.pools.cities, 3);
        assert!(player.resources.is_empty());
        assert_eq!(
            events,
            vec![GameEvent::CityBuilt {
                player: 0,
                node: 7,
                score: 2
            }]
        );
    }

    #[test]
    fn test_monopoly_collects_from_everyone() {
        let mut state = game();
        hold(&mut state, 0, DevelopmentCard::Monopoly);
        state.players[1].resources = ResourceHand::single(Resource::Wool, 3);
        state.players[2].resources = ResourceHand::with_amounts(1, 0, 0, 0, 2);

        let play = CardPlay::Monopoly {
            resource: Resource::Wool,
        };
        let (next, events) = apply(&state, &PlayerAction::PlayDevelopmentCard { play }, 0).unwrap();

        assert_eq!(next.players[0].resources.wool, 5);
        assert_eq!(next.players[1].resources.wool, 0);
        assert_eq!(next.players[2].resources, ResourceHand::single(Resource::Brick, 1));
        assert!(events.contains(&GameEvent::MonopolyCollected {
            player: 0,
            resource: Resource::Wool,
            total: 5
        }));
    }

    #[test]
    fn test_road_building_grants_free_roads() {
        let mut state = game();
        hold(&mut state, 0, DevelopmentCard::RoadBuilding);
        state.board.place_settlement(20, 0);

        let play = CardPlay::RoadBuilding;
        let (next, _) = apply(&state, &PlayerAction::PlayDevelopmentCard { play }, 0).unwrap();
        assert_eq!(next.turn_state.free_roads, 2);

        let edge = next.board.topology().node(20).unwrap().edges[0];
        let (next, _) = apply(&next, &PlayerAction::BuildRoad { edge }, 0).unwrap();
        assert_eq!(next.turn_state.free_roads, 1);
        assert!(next.players[0].resources.is_empty());
        assert_eq!(next.players[0].pools.roads, 14);
    }

    #[test]
    fn test_year_of_plenty_draws_from_bank() {
        let mut state = game();
        hold(&mut state, 0, DevelopmentCard::YearOfPlenty);
        let play = CardPlay::YearOfPlenty {
            first: Resource::Ore,
            second: Resource::Ore,
        };
        let (next, _) = apply(&state, &PlayerAction::PlayDevelopmentCard { play }, 0).unwrap();
        assert_eq!(next.players[0].resources.ore, 2);
        assert_eq!(next.bank.ore, state.bank.ore - 2);
    }

    #[test]
    fn test_one_card_per_turn() {
        let mut state = game();
        hold(&mut state, 0, DevelopmentCard::Monopoly);
        hold(&mut state, 0, DevelopmentCard::Monopoly);
        let play = CardPlay::Monopoly {
            resource: Resource::Ore,
        };
        let action = PlayerAction::PlayDevelopmentCard { play };
        let (next, _) = apply(&state, &action, 0).unwrap();
        assert_eq!(apply(&next, &action, 0).unwrap_err(), Rejection::CardAlreadyPlayed);
    }

    #[test]
    fn test_dice_roll_once_per_turn() {
        let state = game();
        let (next, events) = apply(&state, &PlayerAction::RollDice, 0).unwrap();
        match &events[0] {
            GameEvent::DiceRolled { roll, total, .. } => {
                assert!((1..=6).contains(&roll.0) && (1..=6).contains(&roll.1));
                assert_eq!(*total, roll.0 + roll.1);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(
            apply(&next, &PlayerAction::RollDice, 0).unwrap_err(),
            Rejection::AlreadyRolled
        );
    }

    #[test]
    fn test_dice_are_reproducible() {
        assert_eq!(dice_for_turn(42, 3), dice_for_turn(42, 3));
    }

    #[test]
    fn test_accept_rechecks_hands() {
        let mut state = game();
        state.players[0].resources = ResourceHand::single(Resource::Grain, 2);
        state.players[1].resources = ResourceHand::single(Resource::Ore, 1);
        let offer = PlayerAction::OfferTrade {
            offered: ResourceHand::single(Resource::Grain, 2),
            requested: ResourceHand::single(Resource::Ore, 1),
            counterparty: 1,
        };
        let (mut next, _) = apply(&state, &offer, 0).unwrap();
        let trade = next.trades[0].id;

        // Offerer spent the grain after offering
        next.players[0].resources = ResourceHand::new();
        assert_eq!(
            apply(&next, &PlayerAction::AcceptTrade { trade }, 1).unwrap_err(),
            Rejection::CannotAfford
        );

        next.players[0].resources = ResourceHand::single(Resource::Grain, 2);
        let (done, events) = apply(&next, &PlayerAction::AcceptTrade { trade }, 1).unwrap();
        assert_eq!(done.players[0].resources, ResourceHand::single(Resource::Ore, 1));
        assert_eq!(done.players[1].resources, ResourceHand::single(Resource::Grain, 2));
        assert!(done.trades.is_empty());
        assert_eq!(events, vec![GameEvent::TradeCompleted { trade, from: 0, to: 1 }]);
    }
}
