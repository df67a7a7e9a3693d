//! Room registry: the shared table of duel rooms and the matchmaking that fills it.
//!
//! Every operation takes the registry lock for its whole duration. Match-found
//! notices are queued on both connections before the lock is released, so
//! neither side can have a later frame processed before both know about the match.

use std::{collections::HashMap, fmt};

use indexmap::IndexMap;
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    config::MatchPolicy,
    dto::{
        validation::ROOM_ID_LEN,
        ws::{MatchFound, ScoreRelay, ScoreReport},
    },
    state::{
        connection::{ConnectionHandle, ConnectionId},
        session::{SessionEvent, SessionPhase},
    },
};

/// Opaque room token: 16 lowercase hex characters from a CSPRNG.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    fn generate() -> Self {
        let mut bytes = [0u8; ROOM_ID_LEN / 2];
        rand::rng().fill(&mut bytes);
        Self(bytes.iter().map(|byte| format!("{byte:02x}")).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// One side of a room.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Client-supplied display name; also the participant's identity.
    pub name: String,
    /// Trophy count announced on connect, used by proximity matching.
    pub trophies: u32,
    /// Outbound channel to the participant's socket.
    pub connection: ConnectionHandle,
    /// Latest cumulative score reported after each round.
    pub round_scores: Vec<i64>,
}

impl Participant {
    /// Seat a fresh participant with no rounds played.
    pub fn new(name: impl Into<String>, trophies: u32, connection: ConnectionHandle) -> Self {
        Self {
            name: name.into(),
            trophies,
            connection,
            round_scores: Vec::new(),
        }
    }
}

/// A duel session holding at most two participants.
#[derive(Debug, Clone)]
pub struct Room {
    /// Identifier shared with both clients.
    pub id: RoomId,
    participants: Vec<Participant>,
    phase: SessionPhase,
}

impl Room {
    fn new(id: RoomId, host: Participant) -> Self {
        Self {
            id,
            participants: vec![host],
            phase: SessionPhase::Waiting,
        }
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        self.participants.iter().position(|p| p.name == name)
    }

    /// The participant that is not `name`, if both seats are filled.
    pub fn opponent_of(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.name != name)
    }

    fn is_open_for(&self, newcomer: &Participant, policy: &MatchPolicy) -> bool {
        self.phase == SessionPhase::Waiting
            && self.participants.len() == 1
            && self.participants[0].name != newcomer.name
            && policy.accepts(newcomer.trophies, self.participants[0].trophies)
    }

    fn transition(&mut self, event: SessionEvent) -> bool {
        match self.phase.next(event) {
            Ok(next) => {
                self.phase = next;
                true
            }
            Err(err) => {
                debug!(room_id = %self.id, error = %err, "ignoring room event");
                false
            }
        }
    }
}

/// Result of queuing a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Room the participant now sits in.
    pub room_id: RoomId,
    /// `true` when an existing waiting room was completed.
    pub matched: bool,
    /// Name of the player already waiting, when matched.
    pub opponent: Option<String>,
    /// Room previously held under the same name, abandoned by this join.
    pub abandoned: Option<RoomId>,
}

/// Result of relaying a round score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Queued on the opponent's connection.
    Forwarded { opponent: String },
    /// The opponent's writer is already closed.
    OpponentUnreachable { opponent: String },
    /// The room exists but nobody is seated across from the sender.
    NoOpponent,
    /// The room was retired (completed or abandoned) or never existed.
    UnknownRoom,
    /// The sender is not seated in that room.
    NotSeated,
}

/// Result of a match completion report.
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    /// The room was retired by this report; the outcome must be settled.
    Completed { room: Room, reporter: String },
    /// The room no longer exists; duplicate reports land here.
    AlreadyRetired,
    /// The reporter is not seated in that room.
    NotSeated,
    /// The room cannot complete from its current phase (still waiting).
    NotReady(SessionPhase),
}

#[derive(Default)]
struct RegistryInner {
    /// Insertion-ordered so matchmaking scans the oldest room first.
    rooms: IndexMap<RoomId, Room>,
    /// Secondary index: participant name → room id.
    seats: HashMap<String, RoomId>,
}

impl RegistryInner {
    fn fresh_room_id(&self) -> RoomId {
        loop {
            let id = RoomId::generate();
            if !self.rooms.contains_key(&id) {
                return id;
            }
        }
    }

    /// Remove the room containing `name`, freeing every seat in it.
    fn retire_seat_of(&mut self, name: &str, event: SessionEvent) -> Option<Room> {
        let room_id = self.seats.get(name)?.clone();
        self.retire(&room_id, event)
    }

    fn retire(&mut self, room_id: &RoomId, event: SessionEvent) -> Option<Room> {
        let mut room = self.rooms.shift_remove(room_id)?;
        for participant in &room.participants {
            if self.seats.get(&participant.name) == Some(room_id) {
                self.seats.remove(&participant.name);
            }
        }
        room.transition(event);
        Some(room)
    }
}

/// Shared table of in-progress rooms.
#[derive(Default)]
pub struct RoomRegistry {
    inner: Mutex<RegistryInner>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seat `participant` in the oldest waiting room accepted by `policy`, or open a new room.
    ///
    /// A name that is already seated abandons its previous room first.
    pub async fn join(&self, participant: Participant, policy: &MatchPolicy) -> JoinOutcome {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let abandoned = inner
            .retire_seat_of(&participant.name, SessionEvent::ParticipantLeft)
            .map(|room| {
                info!(room_id = %room.id, name = %participant.name, "abandoning previous room on re-join");
                room.id
            });

        let candidate = inner
            .rooms
            .values()
            .position(|room| room.is_open_for(&participant, policy));

        let Some(index) = candidate else {
            let room_id = inner.fresh_room_id();
            info!(room_id = %room_id, name = %participant.name, "opened waiting room");
            inner
                .seats
                .insert(participant.name.clone(), room_id.clone());
            inner
                .rooms
                .insert(room_id.clone(), Room::new(room_id.clone(), participant));
            return JoinOutcome {
                room_id,
                matched: false,
                opponent: None,
                abandoned,
            };
        };

        let room = &mut inner.rooms[index];
        let room_id = room.id.clone();
        room.transition(SessionEvent::OpponentSeated);

        let host = &room.participants[0];
        let host_name = host.name.clone();
        if host
            .connection
            .send_json(&MatchFound::new(&participant.name, room_id.as_str()))
            .is_err()
        {
            warn!(room_id = %room_id, name = %host_name, "host connection closed before match notice");
        }
        if participant
            .connection
            .send_json(&MatchFound::new(&host_name, room_id.as_str()))
            .is_err()
        {
            warn!(room_id = %room_id, name = %participant.name, "joiner connection closed before match notice");
        }

        info!(room_id = %room_id, host = %host_name, joiner = %participant.name, "match found");
        inner
            .seats
            .insert(participant.name.clone(), room_id.clone());
        room.participants.push(participant);

        JoinOutcome {
            room_id,
            matched: true,
            opponent: Some(host_name),
            abandoned,
        }
    }

    /// Abandon the room containing `name`, whatever its phase.
    pub async fn leave(&self, name: &str) -> Option<Room> {
        let mut inner = self.inner.lock().await;
        inner.retire_seat_of(name, SessionEvent::ParticipantLeft)
    }

    /// Abandon the room of `name` only if it is still seated through `connection_id`.
    ///
    /// Used when a transport closes, so a stale socket cannot evict a newer seat
    /// taken under the same name.
    pub async fn release(&self, name: &str, connection_id: ConnectionId) -> Option<Room> {
        let mut inner = self.inner.lock().await;
        let room_id = inner.seats.get(name)?.clone();
        let owned = inner.rooms.get(&room_id).is_some_and(|room| {
            room.participants
                .iter()
                .any(|p| p.name == name && p.connection.id == connection_id)
        });
        if !owned {
            return None;
        }
        inner.retire(&room_id, SessionEvent::ParticipantLeft)
    }

    /// Record `sender`'s round score and forward the report, unmodified, to the other occupant.
    pub async fn relay_round(
        &self,
        room_id: &RoomId,
        sender: &str,
        scores: ScoreReport,
    ) -> RelayOutcome {
        let mut inner = self.inner.lock().await;
        let Some(room) = inner.rooms.get_mut(room_id) else {
            return RelayOutcome::UnknownRoom;
        };
        let Some(index) = room.position_of(sender) else {
            return RelayOutcome::NotSeated;
        };
        if room.participants.len() < 2 {
            return RelayOutcome::NoOpponent;
        }

        room.transition(SessionEvent::RoundReported);
        if let Some(latest) = scores.latest() {
            room.participants[index].round_scores.push(latest);
        }

        let opponent = &room.participants[1 - index];
        let relay = ScoreRelay {
            opponent_total_points: scores,
        };
        match opponent.connection.send_json(&relay) {
            Ok(()) => RelayOutcome::Forwarded {
                opponent: opponent.name.clone(),
            },
            Err(_) => RelayOutcome::OpponentUnreachable {
                opponent: opponent.name.clone(),
            },
        }
    }

    /// Retire a matched room on behalf of `reporter`.
    ///
    /// Only the first report succeeds; the room is gone afterwards, so repeats are no-ops.
    pub async fn complete(&self, room_id: &RoomId, reporter: &str) -> CompletionOutcome {
        let mut inner = self.inner.lock().await;
        let Some(room) = inner.rooms.get(room_id) else {
            return CompletionOutcome::AlreadyRetired;
        };
        if room.position_of(reporter).is_none() {
            return CompletionOutcome::NotSeated;
        }
        if let Err(err) = room.phase.next(SessionEvent::MatchCompleted) {
            return CompletionOutcome::NotReady(err.from);
        }

        match inner.retire(room_id, SessionEvent::MatchCompleted) {
            Some(room) => CompletionOutcome::Completed {
                room,
                reporter: reporter.to_owned(),
            },
            None => CompletionOutcome::AlreadyRetired,
        }
    }

    /// Number of rooms currently tracked.
    pub async fn room_count(&self) -> usize {
        self.inner.lock().await.rooms.len()
    }

    /// Phase of a live room.
    pub async fn phase_of(&self, room_id: &RoomId) -> Option<SessionPhase> {
        self.inner
            .lock()
            .await
            .rooms
            .get(room_id)
            .map(|room| room.phase)
    }

    /// Room currently holding `name`.
    #[cfg(test)]
    pub(crate) async fn room_of(&self, name: &str) -> Option<RoomId> {
        self.inner.lock().await.seats.get(name).cloned()
    }

    /// Copy of every live room, oldest first.
    #[cfg(test)]
    pub(crate) async fn snapshot(&self) -> Vec<Room> {
        self.inner.lock().await.rooms.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::ws::Message;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::state::connection::testing::{drain_json, handle};

    fn player(name: &str, trophies: u32) -> (Participant, UnboundedReceiver<Message>) {
        let (connection, rx) = handle();
        (Participant::new(name, trophies, connection), rx)
    }

    #[tokio::test]
    async fn first_join_opens_a_waiting_room() {
        let registry = RoomRegistry::new();
        let (ada, mut ada_rx) = player("ada", 0);

        let outcome = registry.join(ada, &MatchPolicy::FirstAvailable).await;

        assert!(!outcome.matched);
        assert_eq!(outcome.room_id.as_str().len(), ROOM_ID_LEN);
        assert_eq!(
            registry.phase_of(&outcome.room_id).await,
            Some(SessionPhase::Waiting)
        );
        assert!(drain_json(&mut ada_rx).is_empty());
    }

    #[tokio::test]
    async fn second_join_matches_and_notifies_both_sides() {
        let registry = RoomRegistry::new();
        let (ada, mut ada_rx) = player("ada", 0);
        let (bob, mut bob_rx) = player("bob", 0);

        let first = registry.join(ada, &MatchPolicy::FirstAvailable).await;
        let second = registry.join(bob, &MatchPolicy::FirstAvailable).await;

        assert!(second.matched);
        assert_eq!(second.room_id, first.room_id);
        assert_eq!(second.opponent.as_deref(), Some("ada"));
        assert_eq!(registry.room_count().await, 1);
        assert_eq!(
            registry.phase_of(&first.room_id).await,
            Some(SessionPhase::Matched)
        );

        let room = first.room_id.as_str();
        assert_eq!(
            drain_json(&mut ada_rx),
            vec![json!({"message": "Match found!", "opponentName": "bob", "roomId": room})]
        );
        assert_eq!(
            drain_json(&mut bob_rx),
            vec![json!({"message": "Match found!", "opponentName": "ada", "roomId": room})]
        );
    }

    #[tokio::test]
    async fn trophy_filter_opens_a_new_room_for_distant_players() {
        let registry = RoomRegistry::new();
        let policy = MatchPolicy::TrophyProximity { trophy_window: 100 };
        let (ada, _ada_rx) = player("ada", 0);
        let (bob, _bob_rx) = player("bob", 101);
        let (cid, _cid_rx) = player("cid", 100);

        let first = registry.join(ada, &policy).await;
        let second = registry.join(bob, &policy).await;
        assert!(!second.matched);
        assert_ne!(first.room_id, second.room_id);

        let third = registry.join(cid, &policy).await;
        assert!(third.matched);
        assert_eq!(third.room_id, first.room_id);
    }

    #[tokio::test]
    async fn oldest_waiting_room_is_matched_first() {
        let registry = RoomRegistry::new();
        let strict = MatchPolicy::TrophyProximity { trophy_window: 10 };
        let (ada, _a) = player("ada", 0);
        let (bob, _b) = player("bob", 1_000);
        let (cid, _c) = player("cid", 500);

        let oldest = registry.join(ada, &strict).await;
        let newer = registry.join(bob, &strict).await;
        assert_ne!(oldest.room_id, newer.room_id);

        let outcome = registry.join(cid, &MatchPolicy::FirstAvailable).await;
        assert_eq!(outcome.room_id, oldest.room_id);
        assert_eq!(outcome.opponent.as_deref(), Some("ada"));
    }

    #[tokio::test]
    async fn concurrent_joins_pair_up_without_overfilling() {
        let registry = Arc::new(RoomRegistry::new());
        let mut receivers = Vec::new();
        let mut tasks = Vec::new();

        for index in 0..40 {
            let (participant, rx) = player(&format!("player-{index}"), 0);
            receivers.push(rx);
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.join(participant, &MatchPolicy::FirstAvailable).await
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let rooms = registry.snapshot().await;
        assert_eq!(rooms.len(), 20);
        assert!(rooms.iter().all(|room| room.participants().len() == 2));
        assert!(rooms.iter().all(|room| room.phase() == SessionPhase::Matched));
    }

    #[tokio::test]
    async fn two_simultaneous_joins_share_one_room() {
        let registry = Arc::new(RoomRegistry::new());
        let (ada, mut ada_rx) = player("ada", 0);
        let (bob, mut bob_rx) = player("bob", 0);

        let (left, right) = tokio::join!(
            registry.join(ada, &MatchPolicy::FirstAvailable),
            registry.join(bob, &MatchPolicy::FirstAvailable)
        );

        assert_eq!(left.room_id, right.room_id);
        assert!(left.matched ^ right.matched);
        let ada_notice = drain_json(&mut ada_rx);
        let bob_notice = drain_json(&mut bob_rx);
        assert_eq!(ada_notice[0]["opponentName"], "bob");
        assert_eq!(bob_notice[0]["opponentName"], "ada");
        assert_eq!(ada_notice[0]["roomId"], bob_notice[0]["roomId"]);
    }

    #[tokio::test]
    async fn leaving_removes_the_room_in_any_phase() {
        let registry = RoomRegistry::new();
        let (ada, _a) = player("ada", 0);
        let (bob, _b) = player("bob", 0);
        let room_id = registry.join(ada, &MatchPolicy::FirstAvailable).await.room_id;
        registry.join(bob, &MatchPolicy::FirstAvailable).await;
        registry
            .relay_round(&room_id, "ada", ScoreReport::Rounds(vec![20]))
            .await;
        assert_eq!(
            registry.phase_of(&room_id).await,
            Some(SessionPhase::InProgress)
        );

        let retired = registry.leave("bob").await.unwrap();
        assert_eq!(retired.phase(), SessionPhase::Abandoned);
        assert_eq!(registry.room_count().await, 0);
        assert_eq!(registry.room_of("ada").await, None);
        assert!(registry.leave("ada").await.is_none());
    }

    #[tokio::test]
    async fn release_ignores_stale_connections() {
        let registry = RoomRegistry::new();
        let (old, _old_rx) = player("ada", 0);
        let stale_id = old.connection.id;
        registry.join(old, &MatchPolicy::FirstAvailable).await;

        let (fresh, _fresh_rx) = player("ada", 0);
        let fresh_id = fresh.connection.id;
        let outcome = registry.join(fresh, &MatchPolicy::FirstAvailable).await;
        assert!(outcome.abandoned.is_some());

        assert!(registry.release("ada", stale_id).await.is_none());
        assert_eq!(registry.room_count().await, 1);
        assert!(registry.release("ada", fresh_id).await.is_some());
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn relay_reaches_only_the_opponent() {
        let registry = RoomRegistry::new();
        let (ada, mut ada_rx) = player("ada", 0);
        let (bob, mut bob_rx) = player("bob", 0);
        let room_id = registry.join(ada, &MatchPolicy::FirstAvailable).await.room_id;
        registry.join(bob, &MatchPolicy::FirstAvailable).await;
        drain_json(&mut ada_rx);
        drain_json(&mut bob_rx);

        let outcome = registry
            .relay_round(&room_id, "ada", ScoreReport::Total(60))
            .await;

        assert_eq!(
            outcome,
            RelayOutcome::Forwarded {
                opponent: "bob".into()
            }
        );
        assert_eq!(drain_json(&mut bob_rx), vec![json!({"opponentTotalPoints": 60})]);
        assert!(drain_json(&mut ada_rx).is_empty());

        let rooms = registry.snapshot().await;
        assert_eq!(rooms[0].participants()[0].round_scores, vec![60]);
    }

    #[tokio::test]
    async fn relay_without_opponent_is_a_noop() {
        let registry = RoomRegistry::new();
        let (ada, _a) = player("ada", 0);
        let (bob, _b) = player("bob", 0);
        let room_id = registry.join(ada, &MatchPolicy::FirstAvailable).await.room_id;

        assert_eq!(
            registry
                .relay_round(&room_id, "ada", ScoreReport::Total(20))
                .await,
            RelayOutcome::NoOpponent
        );
        assert_eq!(
            registry
                .relay_round(&room_id, "mallory", ScoreReport::Total(20))
                .await,
            RelayOutcome::NotSeated
        );

        registry.join(bob, &MatchPolicy::FirstAvailable).await;
        registry.leave("bob").await;
        for _ in 0..2 {
            assert_eq!(
                registry
                    .relay_round(&room_id, "ada", ScoreReport::Total(20))
                    .await,
                RelayOutcome::UnknownRoom
            );
        }
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn completion_retires_the_room_once() {
        let registry = RoomRegistry::new();
        let (ada, _a) = player("ada", 0);
        let (bob, _b) = player("bob", 0);
        let room_id = registry.join(ada, &MatchPolicy::FirstAvailable).await.room_id;
        registry.join(bob, &MatchPolicy::FirstAvailable).await;

        match registry.complete(&room_id, "bob").await {
            CompletionOutcome::Completed { room, reporter } => {
                assert_eq!(reporter, "bob");
                assert_eq!(room.phase(), SessionPhase::Completed);
                assert_eq!(room.opponent_of("bob").map(|p| p.name.as_str()), Some("ada"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(matches!(
            registry.complete(&room_id, "ada").await,
            CompletionOutcome::AlreadyRetired
        ));
        assert_eq!(registry.room_of("ada").await, None);
    }

    #[tokio::test]
    async fn completion_needs_a_seated_reporter_and_an_opponent() {
        let registry = RoomRegistry::new();
        let (ada, _a) = player("ada", 0);
        let room_id = registry.join(ada, &MatchPolicy::FirstAvailable).await.room_id;

        assert!(matches!(
            registry.complete(&room_id, "ada").await,
            CompletionOutcome::NotReady(SessionPhase::Waiting)
        ));
        assert!(matches!(
            registry.complete(&room_id, "mallory").await,
            CompletionOutcome::NotSeated
        ));
        assert_eq!(registry.room_count().await, 1);
    }
}
