//! Turn order.
//!
//! Setup round 1 runs forward, setup round 2 runs backward starting with the
//! player who closed round 1, and regular play runs forward from seat 0.

use crate::actions::GameEvent;
use crate::board::PlayerId;
use crate::game::{GameState, Phase, TurnState};

/// Seat and phase that follow `current` finishing their turn.
pub fn next_seat(phase: Phase, current: PlayerId, count: usize) -> (PlayerId, Phase) {
    let last = count.saturating_sub(1) as PlayerId;
    match phase {
        Phase::Setup1 if current >= last => (current, Phase::Setup2),
        Phase::Setup1 => (current + 1, Phase::Setup1),
        Phase::Setup2 if current == 0 => (0, Phase::Main),
        Phase::Setup2 => (current - 1, Phase::Setup2),
        Phase::Main => ((current + 1) % count.max(1) as PlayerId, Phase::Main),
    }
}

/// Pass the turn on a copy of `state`.
pub fn advance_turn(state: &GameState) -> GameState {
    let mut next = state.clone();
    advance(&mut next);
    next
}

pub(crate) fn advance(state: &mut GameState) -> Vec<GameEvent> {
    let player = state.current_player;
    let (next_player, phase) = next_seat(state.phase, player, state.player_count());

    let mut events = Vec::new();
    if !state.trades.is_empty() {
        let trades = state.trades.drain(..).map(|t| t.id).collect();
        events.push(GameEvent::TradesExpired { trades });
    }

    state.current_player = next_player;
    state.phase = phase;
    state.turn += 1;
    state.turn_state = TurnState::default();

    events.push(GameEvent::TurnAdvanced {
        player,
        next_player,
        phase,
    });
    events
}
