//! Duel flow driven by gateway messages: queueing, round relay, completion and settlement hand-off.

use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::{
    dto::ws::ScoreReport,
    services::outcome::{self, MatchOutcome, SideFlags, SideReport},
    state::{
        SharedState,
        connection::{ConnectionHandle, ConnectionId},
        outbox::SettlementJob,
        rooms::{CompletionOutcome, JoinOutcome, Participant, RelayOutcome, Room, RoomId},
    },
};

/// Completion report sent by one of the two clients.
#[derive(Debug, Clone)]
pub struct MatchReport {
    /// Room the match was played in.
    pub room_id: String,
    /// Display name of the reporting client.
    pub reporter: String,
    /// Reporter's cumulative scores, or empty to use the relayed rounds.
    pub scores: ScoreReport,
    /// Opponent name as the client knows it; the room is authoritative.
    pub opponent_name: Option<String>,
    /// Opponent scores as the reporter saw them.
    pub opponent_scores: ScoreReport,
    /// Reporter's self-computed achievement flags.
    pub flags: SideFlags,
}

/// Queue `name` for a match using the configured policy.
pub async fn join(
    state: &SharedState,
    connection: &ConnectionHandle,
    name: String,
    trophies: u32,
) -> JoinOutcome {
    let participant = Participant::new(name, trophies, connection.clone());
    state
        .rooms()
        .join(participant, &state.config().matchmaking)
        .await
}

/// Abandon the room of `name` on an explicit disconnect request.
pub async fn leave(state: &SharedState, name: &str) -> Option<Room> {
    let room = state.rooms().leave(name).await;
    match &room {
        Some(room) => info!(room_id = %room.id, name, phase = ?room.phase(), "room abandoned"),
        None => debug!(name, "disconnect for a name without a room"),
    }
    room
}

/// Abandon the room of `name` when the connection that seated it goes away.
pub async fn release(state: &SharedState, name: &str, connection_id: ConnectionId) {
    if let Some(room) = state.rooms().release(name, connection_id).await {
        info!(room_id = %room.id, name, phase = ?room.phase(), "room abandoned on transport close");
    }
}

/// Forward a round score to the sender's opponent.
pub async fn relay_round(
    state: &SharedState,
    room_id: &str,
    sender: &str,
    scores: ScoreReport,
) -> RelayOutcome {
    let outcome = state
        .rooms()
        .relay_round(&RoomId::from(room_id), sender, scores)
        .await;
    match &outcome {
        RelayOutcome::Forwarded { opponent } => {
            debug!(room_id, sender, opponent = %opponent, "round relayed")
        }
        RelayOutcome::OpponentUnreachable { opponent } => {
            warn!(room_id, sender, opponent = %opponent, "opponent connection closed; round not relayed")
        }
        RelayOutcome::NoOpponent | RelayOutcome::UnknownRoom => {
            info!(room_id, sender, "no opponent to relay to; ignoring round")
        }
        RelayOutcome::NotSeated => {
            warn!(room_id, sender, "round reported by a name not seated in the room")
        }
    }
    outcome
}

/// Retire the room, compute the outcome and queue both settlements.
///
/// Returns `None` when the report does not retire a room (duplicate, stranger,
/// or a room still waiting for its opponent); nothing is dispatched then.
pub async fn complete_match(state: &SharedState, report: MatchReport) -> Option<MatchOutcome> {
    let room_id = RoomId::from(report.room_id.as_str());
    let (room, reporter) = match state.rooms().complete(&room_id, &report.reporter).await {
        CompletionOutcome::Completed { room, reporter } => (room, reporter),
        CompletionOutcome::AlreadyRetired => {
            debug!(room_id = %room_id, reporter = %report.reporter, "completion for a retired room; ignoring");
            return None;
        }
        CompletionOutcome::NotSeated => {
            warn!(room_id = %room_id, reporter = %report.reporter, "completion from a name not seated in the room");
            return None;
        }
        CompletionOutcome::NotReady(phase) => {
            warn!(room_id = %room_id, reporter = %report.reporter, ?phase, "completion before the room was matched");
            return None;
        }
    };

    let Some(opponent) = room.opponent_of(&reporter) else {
        warn!(room_id = %room_id, reporter = %reporter, "completed room has no opponent");
        return None;
    };
    if let Some(claimed) = report
        .opponent_name
        .as_deref()
        .filter(|claimed| *claimed != opponent.name)
    {
        warn!(room_id = %room_id, claimed, seated = %opponent.name, "reported opponent name differs from the room");
    }
    let own_rounds = room
        .participants()
        .iter()
        .find(|p| p.name == reporter)
        .map(|p| p.round_scores.clone())
        .unwrap_or_default();

    let outcome = outcome::decide(
        SideReport::new(
            reporter.as_str(),
            reported_or_observed(report.scores, own_rounds),
            report.flags,
        ),
        SideReport::new(
            opponent.name.as_str(),
            reported_or_observed(report.opponent_scores, opponent.round_scores.clone()),
            // Only the first report settles the room, so the opponent's own
            // perfect-score and fast-reflex flags are never seen.
            SideFlags::default(),
        ),
    );

    info!(
        room_id = %room_id,
        winner = %outcome.winner_name,
        loser = %outcome.loser_name,
        draw = outcome.is_draw,
        clutch = ?outcome.clutch_performer,
        "match completed"
    );

    for settlement in outcome::settlements(&outcome, SystemTime::now()) {
        state.outbox().dispatch(SettlementJob {
            room_id: room_id.to_string(),
            settlement,
        });
    }

    Some(outcome)
}

/// Client-reported rounds, or the rounds relayed through the room when the report is empty.
fn reported_or_observed(reported: ScoreReport, observed: Vec<i64>) -> Vec<i64> {
    let rounds = reported.into_rounds();
    if rounds.is_empty() { observed } else { rounds }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{AppConfig, MatchPolicy},
        dao::models::{Achievement, MatchResult},
        state::{AppState, connection::testing::handle, session::SessionPhase},
    };

    fn test_state() -> (SharedState, tokio::sync::mpsc::Receiver<SettlementJob>) {
        AppState::new(AppConfig {
            matchmaking: MatchPolicy::FirstAvailable,
            ..AppConfig::default()
        })
    }

    fn report(room_id: &RoomId, reporter: &str, scores: Vec<i64>, opponent: Vec<i64>) -> MatchReport {
        MatchReport {
            room_id: room_id.to_string(),
            reporter: reporter.into(),
            scores: ScoreReport::Rounds(scores),
            opponent_name: None,
            opponent_scores: ScoreReport::Rounds(opponent),
            flags: SideFlags::default(),
        }
    }

    async fn matched_room(state: &SharedState) -> RoomId {
        let (ada, _) = handle();
        let (bob, _) = handle();
        join(state, &ada, "ada".into(), 0).await;
        join(state, &bob, "bob".into(), 0).await.room_id
    }

    #[tokio::test]
    async fn completion_queues_both_settlements_once() {
        let (state, mut settlements) = test_state();
        let room_id = matched_room(&state).await;

        let outcome = complete_match(&state, report(&room_id, "ada", vec![40, 100], vec![60, 85]))
            .await
            .unwrap();
        assert_eq!(outcome.winner_name, "ada");

        let first = settlements.recv().await.unwrap();
        let second = settlements.recv().await.unwrap();
        assert_eq!(first.settlement.name, "ada");
        assert_eq!(first.settlement.trophy_delta, 5);
        assert_eq!(second.settlement.name, "bob");
        assert_eq!(second.settlement.trophy_delta, -3);
        assert_eq!(second.settlement.history.result, MatchResult::Lost);

        assert!(
            complete_match(&state, report(&room_id, "bob", vec![60, 85], vec![40, 100]))
                .await
                .is_none()
        );
        assert!(settlements.try_recv().is_err());
        assert_eq!(state.rooms().room_count().await, 0);
    }

    #[tokio::test]
    async fn opponent_flags_are_not_settled_from_the_first_report() {
        let (state, mut settlements) = test_state();
        let room_id = matched_room(&state).await;

        let mut first = report(&room_id, "ada", vec![100], vec![90]);
        first.flags.perfect_score = true;
        complete_match(&state, first).await.unwrap();

        let mut late = report(&room_id, "bob", vec![90], vec![100]);
        late.flags.fast_reflex = true;
        assert!(complete_match(&state, late).await.is_none());

        let ada = settlements.recv().await.unwrap().settlement;
        let bob = settlements.recv().await.unwrap().settlement;
        assert!(ada.achievements.contains(&Achievement::PerfectRound));
        assert!(!bob.achievements.contains(&Achievement::LightningReflexes));
        assert!(settlements.try_recv().is_err());
    }

    #[tokio::test]
    async fn empty_reports_fall_back_to_relayed_rounds() {
        let (state, _settlements) = test_state();
        let room_id = matched_room(&state).await;
        relay_round(&state, room_id.as_str(), "ada", ScoreReport::Total(20)).await;
        relay_round(&state, room_id.as_str(), "bob", ScoreReport::Total(50)).await;
        assert_eq!(
            state.rooms().phase_of(&room_id).await,
            Some(SessionPhase::InProgress)
        );

        let outcome = complete_match(&state, report(&room_id, "ada", vec![], vec![]))
            .await
            .unwrap();
        assert_eq!(outcome.winner_name, "bob");
    }

    #[tokio::test]
    async fn completion_of_a_waiting_room_dispatches_nothing() {
        let (state, mut settlements) = test_state();
        let (ada, _) = handle();
        let room_id = join(&state, &ada, "ada".into(), 0).await.room_id;

        assert!(
            complete_match(&state, report(&room_id, "ada", vec![100], vec![0]))
                .await
                .is_none()
        );
        assert!(settlements.try_recv().is_err());
        assert_eq!(state.rooms().room_count().await, 1);
    }

    #[tokio::test]
    async fn leave_abandons_without_settling() {
        let (state, mut settlements) = test_state();
        let room_id = matched_room(&state).await;

        let room = leave(&state, "ada").await.unwrap();
        assert_eq!(room.phase(), SessionPhase::Abandoned);
        assert!(
            complete_match(&state, report(&room_id, "bob", vec![100], vec![0]))
                .await
                .is_none()
        );
        assert!(settlements.try_recv().is_err());
    }
}
