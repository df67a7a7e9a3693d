use thiserror::Error;

/// Lifecycle stage of a duel room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// One participant seated, waiting for an opponent.
    Waiting,
    /// Both seats filled and both sides notified.
    Matched,
    /// At least one round result has been relayed.
    InProgress,
    /// An outcome was computed and handed to persistence. Terminal.
    Completed,
    /// A participant left before completion; no winner is recorded. Terminal.
    Abandoned,
}

impl SessionPhase {
    /// Whether the room can still change phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Completed | SessionPhase::Abandoned)
    }

    /// Compute the phase reached by applying `event`, if the transition is valid.
    pub fn next(self, event: SessionEvent) -> Result<SessionPhase, InvalidTransition> {
        let next = match (self, event) {
            (SessionPhase::Waiting, SessionEvent::OpponentSeated) => SessionPhase::Matched,
            (
                SessionPhase::Matched | SessionPhase::InProgress,
                SessionEvent::RoundReported,
            ) => SessionPhase::InProgress,
            (
                SessionPhase::Matched | SessionPhase::InProgress,
                SessionEvent::MatchCompleted,
            ) => SessionPhase::Completed,
            (from, SessionEvent::ParticipantLeft) if !from.is_terminal() => SessionPhase::Abandoned,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

/// Events that drive a room through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A second participant joined the waiting room.
    OpponentSeated,
    /// A participant reported a round score.
    RoundReported,
    /// A participant reported the end of the match.
    MatchCompleted,
    /// A participant disconnected or asked to leave.
    ParticipantLeft,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the room was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}
