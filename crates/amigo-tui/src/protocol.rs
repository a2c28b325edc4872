// Messages exchanged between the app orchestrator and the terminal UI.
//
// The UI sends `UserCommand`s; the orchestrator answers with `UiUpdate`s.
// Background insight tasks report back to the orchestrator with
// `InsightEvent`s.

use amigo_core::participant::{Participant, ParticipantId, Snapshot};
use amigo_llm::Insight;

/// An action requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    /// Load the participant list again.
    Reload,
    /// Log in as the given participant.
    SelectIdentity(ParticipantId),
    /// Draw a secret friend for the logged-in participant.
    Draw,
    /// Save the drawn result and reveal it.
    Confirm,
    /// Forget the logged-in participant and any unsaved draw.
    Logout,
    RequestInsight,
    Quit,
}

/// What the UI needs to know about the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionView {
    /// Logged-in participant, if any.
    pub actor: Option<Participant>,
    /// Drawn participant. Only shown once `revealed` is set.
    pub target: Option<Participant>,
    /// The draw has been saved and may be shown.
    pub revealed: bool,
    /// A save is in flight.
    pub saving: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    /// The participant list is being (re)loaded.
    Loading,
    Snapshot(Box<Snapshot>),
    /// Session state changed. Clears any error banner.
    Session(Box<SessionView>),
    /// Message for the error banner.
    Error(String),
    InsightStarted,
    Insight(Box<Insight>),
    /// The insight request failed or insights are disabled.
    InsightUnavailable,
}

/// Result of a background insight request.
#[derive(Debug, Clone, PartialEq)]
pub struct InsightEvent {
    pub insight: Option<Insight>,
    /// Generation of the request that produced this event.
    pub generation: u64,
}
