// Application state and orchestration logic.
//
// The event loop that owns the current participant snapshot and the user's
// draw session. It turns user commands into draw-engine and repository
// calls, runs insight requests in the background, and pushes UI updates to
// the TUI render loop.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use amigo_core::draw::{self, CommitError, DrawError, Proposal};
use amigo_core::participant::{Participant, ParticipantId, Snapshot};
use amigo_core::store::ParticipantRepository;
use amigo_llm::InsightGenerator;

use crate::protocol::{InsightEvent, SessionView, UiUpdate, UserCommand};

// ---------------------------------------------------------------------------
// User-facing messages
// ---------------------------------------------------------------------------

pub const SAVE_FAILED_MESSAGE: &str = "Database error. Please contact the administrator.";
pub const CONFLICT_MESSAGE: &str =
    "That participant was just taken by someone else. Please draw again.";
pub const ALREADY_DRAWN_MESSAGE: &str = "You have already drawn your secret friend.";
pub const UNAVAILABLE_IDENTITY_MESSAGE: &str =
    "That participant is not available. Please choose another name.";
pub const UNKNOWN_ACTOR_MESSAGE: &str =
    "Your name is no longer in the participant list. Please log out and choose again.";

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One user's pass through identify, draw and confirm.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub actor: Option<Participant>,
    /// Drawn but not yet saved (or saved, once `revealed`).
    pub proposal: Option<Proposal>,
    pub revealed: bool,
    pub saving: bool,
    pub error: Option<String>,
}

impl Session {
    pub fn view(&self) -> SessionView {
        SessionView {
            actor: self.actor.clone(),
            target: self.proposal.as_ref().map(|p| p.target.clone()),
            revealed: self.revealed,
            saving: self.saving,
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// The complete application state.
pub struct AppState {
    pub repository: ParticipantRepository,
    /// Shared with spawned insight tasks.
    pub insight: Arc<dyn InsightGenerator>,
    /// Latest participant list. Replaced wholesale on every reload.
    pub snapshot: Snapshot,
    pub session: Session,
    pub insight_task: Option<JoinHandle<()>>,
    /// Incremented for every insight request; results carrying an older
    /// generation are dropped.
    pub insight_generation: u64,
    /// Sender handed to spawned insight tasks.
    pub insight_tx: mpsc::Sender<InsightEvent>,
    rng: StdRng,
}

impl AppState {
    pub fn new(
        repository: ParticipantRepository,
        insight: Arc<dyn InsightGenerator>,
        insight_tx: mpsc::Sender<InsightEvent>,
    ) -> Self {
        AppState {
            repository,
            insight,
            snapshot: Snapshot::empty(),
            session: Session::default(),
            insight_task: None,
            insight_generation: 0,
            insight_tx,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Replace the random source, for reproducible draws.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn cancel_insight_task(&mut self) {
        if let Some(handle) = self.insight_task.take() {
            handle.abort();
            debug!("cancelled previous insight task");
        }
    }

    /// Start a background insight request over the current snapshot.
    /// Returns the generation assigned to it.
    pub fn trigger_insight(&mut self) -> u64 {
        self.cancel_insight_task();
        self.insight_generation += 1;
        let generation = self.insight_generation;

        let generator = Arc::clone(&self.insight);
        let participants = self.snapshot.participants().to_vec();
        let tx = self.insight_tx.clone();

        self.insight_task = Some(tokio::spawn(async move {
            let insight = generator.generate_insight(&participants).await;
            let _ = tx.send(InsightEvent { insight, generation }).await;
        }));

        info!(generation, "insight requested");
        generation
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the main application event loop.
///
/// Loads the participant list once up front, then listens on:
/// 1. User commands from the TUI
/// 2. Insight results from background tasks
///
/// Pushes UI updates through `ui_tx` for the TUI render loop.
pub async fn run(
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    mut insight_rx: mpsc::Receiver<InsightEvent>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut state: AppState,
) -> anyhow::Result<()> {
    info!("Application event loop started");

    reload(&mut state, &ui_tx).await;

    // Stop polling the insight channel once it closes so select! does not
    // spin on it.
    let mut insight_open = true;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => {
                        handle_user_command(&mut state, cmd, &ui_tx).await;
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }

            event = insight_rx.recv(), if insight_open => {
                match event {
                    Some(event) => handle_insight_event(&mut state, event, &ui_tx).await,
                    None => {
                        info!("Insight channel closed");
                        insight_open = false;
                    }
                }
            }
        }
    }

    state.cancel_insight_task();
    info!("Application event loop exiting");
    Ok(())
}

/// Handle a user command from the TUI.
pub async fn handle_user_command(
    state: &mut AppState,
    cmd: UserCommand,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    match cmd {
        UserCommand::Reload => reload(state, ui_tx).await,
        UserCommand::SelectIdentity(id) => select_identity(state, id, ui_tx).await,
        UserCommand::Draw => draw_target(state, ui_tx).await,
        UserCommand::Confirm => confirm(state, ui_tx).await,
        UserCommand::Logout => {
            info!("session logged out");
            state.session = Session::default();
            publish_session(state, ui_tx).await;
        }
        UserCommand::RequestInsight => {
            state.trigger_insight();
            let _ = ui_tx.send(UiUpdate::InsightStarted).await;
        }
        UserCommand::Quit => {
            // Handled in the main loop
        }
    }
}

/// Handle the result of a background insight request.
pub async fn handle_insight_event(
    state: &mut AppState,
    event: InsightEvent,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    if event.generation != state.insight_generation {
        debug!(
            event_generation = event.generation,
            current = state.insight_generation,
            "discarding stale insight"
        );
        return;
    }

    state.insight_task = None;
    let update = match event.insight {
        Some(insight) => UiUpdate::Insight(Box::new(insight)),
        None => UiUpdate::InsightUnavailable,
    };
    let _ = ui_tx.send(update).await;
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn reload(state: &mut AppState, ui_tx: &mpsc::Sender<UiUpdate>) {
    let _ = ui_tx.send(UiUpdate::Loading).await;
    state.snapshot = state.repository.list_participants().await;
    info!(
        participants = state.snapshot.len(),
        assigned = state.snapshot.assigned_count(),
        "participant list loaded"
    );
    let _ = ui_tx
        .send(UiUpdate::Snapshot(Box::new(state.snapshot.clone())))
        .await;
    publish_session(state, ui_tx).await;
}

async fn select_identity(state: &mut AppState, id: ParticipantId, ui_tx: &mpsc::Sender<UiUpdate>) {
    match state.snapshot.get(id) {
        Some(p) if !p.has_secret_assigned => {
            info!(participant = %id, "participant identified");
            state.session = Session {
                actor: Some(p.clone()),
                ..Session::default()
            };
        }
        _ => {
            warn!(participant = %id, "identity not available");
            state.session.error = Some(UNAVAILABLE_IDENTITY_MESSAGE.into());
        }
    }
    publish_session(state, ui_tx).await;
}

async fn draw_target(state: &mut AppState, ui_tx: &mpsc::Sender<UiUpdate>) {
    let Some(logged_in) = state.session.actor.clone() else {
        debug!("draw requested without an identity");
        return;
    };
    let actor_id = logged_in.id;
    if state.session.proposal.is_some() {
        debug!("draw requested while a result is already pending");
        return;
    }

    // Re-draws are refused here; the engine itself would allow them.
    let current = state.snapshot.get(actor_id).cloned();
    if current.as_ref().is_some_and(|a| a.has_secret_assigned) {
        state.session.error = Some(ALREADY_DRAWN_MESSAGE.into());
        publish_session(state, ui_tx).await;
        return;
    }

    let actor = current.unwrap_or(logged_in);
    match draw::propose(state.snapshot.participants(), &actor, &mut state.rng) {
        Ok(proposal) => {
            debug!(participant = %actor_id, "draw proposed");
            state.session.proposal = Some(proposal);
            state.session.error = None;
        }
        Err(e @ DrawError::Exhausted) => {
            warn!(participant = %actor_id, "draw exhausted");
            state.session.error = Some(e.to_string());
        }
        Err(DrawError::UnknownActor(_)) => {
            warn!(participant = %actor_id, "actor missing from participant list");
            state.session.error = Some(UNKNOWN_ACTOR_MESSAGE.into());
        }
    }
    publish_session(state, ui_tx).await;
}

async fn confirm(state: &mut AppState, ui_tx: &mpsc::Sender<UiUpdate>) {
    if state.session.revealed || state.session.saving {
        return;
    }
    let Some(proposal) = state.session.proposal.clone() else {
        debug!("confirm requested without a drawn result");
        return;
    };

    state.session.saving = true;
    state.session.error = None;
    publish_session(state, ui_tx).await;

    let result = draw::commit(&state.repository, &proposal).await;
    state.session.saving = false;

    match result {
        Ok(()) => {
            state.session.revealed = true;
            publish_session(state, ui_tx).await;
            reload(state, ui_tx).await;
        }
        Err(CommitError::Conflict(detail)) => {
            warn!(participant = %proposal.actor.id, %detail, "draw lost a race");
            state.session.proposal = None;
            state.session.error = Some(CONFLICT_MESSAGE.into());
            // Fresh data so the next draw sees the claimed target.
            reload(state, ui_tx).await;
        }
        Err(e) => {
            error!(participant = %proposal.actor.id, "failed to save draw: {e}");
            state.session.error = Some(SAVE_FAILED_MESSAGE.into());
            publish_session(state, ui_tx).await;
        }
    }
}

/// Send the session view, followed by its error if there is one.
async fn publish_session(state: &AppState, ui_tx: &mpsc::Sender<UiUpdate>) {
    let _ = ui_tx
        .send(UiUpdate::Session(Box::new(state.session.view())))
        .await;
    if let Some(message) = &state.session.error {
        let _ = ui_tx.send(UiUpdate::Error(message.clone())).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use amigo_core::store::{AssignmentUpdate, SchemaNaming, SqliteStore};
    use amigo_llm::Insight;
    use async_trait::async_trait;

    struct FixedInsight(Option<Insight>);

    #[async_trait]
    impl InsightGenerator for FixedInsight {
        async fn generate_insight(&self, _participants: &[Participant]) -> Option<Insight> {
            self.0.clone()
        }
    }

    fn sample_insight() -> Insight {
        Insight {
            summary: "Three friends.".into(),
            funny_fact: "Nobody bought wrapping paper.".into(),
            recommendation: "Set a budget.".into(),
        }
    }

    fn repository(names: &[&str]) -> ParticipantRepository {
        let store = SqliteStore::open(":memory:", SchemaNaming::Capitalized).unwrap();
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        store.seed(&names).unwrap();
        ParticipantRepository::active(store, SchemaNaming::Capitalized)
    }

    fn create_state(repository: ParticipantRepository) -> (AppState, mpsc::Receiver<InsightEvent>) {
        let (insight_tx, insight_rx) = mpsc::channel(8);
        let state = AppState::new(
            repository,
            Arc::new(FixedInsight(Some(sample_insight()))),
            insight_tx,
        )
        .with_rng(StdRng::seed_from_u64(11));
        (state, insight_rx)
    }

    async fn loaded_state(names: &[&str]) -> (AppState, mpsc::Receiver<InsightEvent>) {
        let (mut state, insight_rx) = create_state(repository(names));
        state.snapshot = state.repository.list_participants().await;
        (state, insight_rx)
    }

    fn drain(rx: &mut mpsc::Receiver<UiUpdate>) -> Vec<UiUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    fn errors(updates: &[UiUpdate]) -> Vec<String> {
        updates
            .iter()
            .filter_map(|u| match u {
                UiUpdate::Error(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    async fn assign(state: &AppState, actor: i64, target: i64) {
        let target = state.snapshot.get(ParticipantId(target)).unwrap().clone();
        assert!(
            state
                .repository
                .update_participant(ParticipantId(actor), &AssignmentUpdate::for_target(&target))
                .await
        );
    }

    #[tokio::test]
    async fn select_identity_starts_a_session() {
        let (mut state, _rx) = loaded_state(&["Ana", "Bea", "Cid"]).await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);

        handle_user_command(&mut state, UserCommand::SelectIdentity(ParticipantId(2)), &ui_tx).await;

        assert_eq!(state.session.actor.as_ref().unwrap().name, "Bea");
        let updates = drain(&mut ui_rx);
        match &updates[..] {
            [UiUpdate::Session(view)] => assert_eq!(view.actor.as_ref().unwrap().name, "Bea"),
            other => panic!("unexpected updates: {other:?}"),
        }
    }

    #[tokio::test]
    async fn assigned_participant_cannot_log_in() {
        let (mut state, _rx) = loaded_state(&["Ana", "Bea", "Cid"]).await;
        assign(&state, 1, 2).await;
        state.snapshot = state.repository.list_participants().await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);

        handle_user_command(&mut state, UserCommand::SelectIdentity(ParticipantId(1)), &ui_tx).await;

        assert!(state.session.actor.is_none());
        assert_eq!(errors(&drain(&mut ui_rx)), vec![UNAVAILABLE_IDENTITY_MESSAGE]);
    }

    #[tokio::test]
    async fn draw_without_identity_is_ignored() {
        let (mut state, _rx) = loaded_state(&["Ana", "Bea"]).await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);

        handle_user_command(&mut state, UserCommand::Draw, &ui_tx).await;

        assert!(state.session.proposal.is_none());
        assert!(drain(&mut ui_rx).is_empty());
    }

    #[tokio::test]
    async fn draw_proposes_a_hidden_target() {
        let (mut state, _rx) = loaded_state(&["Ana", "Bea", "Cid"]).await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);

        handle_user_command(&mut state, UserCommand::SelectIdentity(ParticipantId(1)), &ui_tx).await;
        handle_user_command(&mut state, UserCommand::Draw, &ui_tx).await;

        let proposal = state.session.proposal.clone().unwrap();
        assert_ne!(proposal.target.id, ParticipantId(1));
        let last = drain(&mut ui_rx).pop().unwrap();
        match last {
            UiUpdate::Session(view) => {
                assert_eq!(view.target, Some(proposal.target.clone()));
                assert!(!view.revealed);
            }
            other => panic!("expected session update, got {other:?}"),
        }

        // A second draw keeps the pending result.
        handle_user_command(&mut state, UserCommand::Draw, &ui_tx).await;
        assert_eq!(proposal_id(&state), proposal.target.id);
    }

    fn proposal_id(state: &AppState) -> ParticipantId {
        state.session.proposal.as_ref().unwrap().target.id
    }

    #[tokio::test]
    async fn exhausted_draw_shows_stable_message() {
        let (mut state, _rx) = loaded_state(&["Ana", "Bea", "Cid"]).await;
        handle_user_command(
            &mut state,
            UserCommand::SelectIdentity(ParticipantId(1)),
            &mpsc::channel(16).0,
        )
        .await;
        assign(&state, 2, 3).await;
        assign(&state, 3, 2).await;
        state.snapshot = state.repository.list_participants().await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);

        handle_user_command(&mut state, UserCommand::Draw, &ui_tx).await;

        assert!(state.session.proposal.is_none());
        assert_eq!(
            errors(&drain(&mut ui_rx)),
            vec!["No participant is available for you to draw."]
        );
    }

    #[tokio::test]
    async fn redraw_is_refused_for_assigned_actor() {
        let (mut state, _rx) = loaded_state(&["Ana", "Bea", "Cid"]).await;
        handle_user_command(
            &mut state,
            UserCommand::SelectIdentity(ParticipantId(1)),
            &mpsc::channel(16).0,
        )
        .await;
        // Ana drew in another session meanwhile.
        assign(&state, 1, 2).await;
        state.snapshot = state.repository.list_participants().await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);

        handle_user_command(&mut state, UserCommand::Draw, &ui_tx).await;

        assert!(state.session.proposal.is_none());
        assert_eq!(errors(&drain(&mut ui_rx)), vec![ALREADY_DRAWN_MESSAGE]);
    }

    #[tokio::test]
    async fn confirm_saves_reveals_and_reloads() {
        let (mut state, _rx) = loaded_state(&["Ana", "Bea", "Cid"]).await;
        let (ui_tx, mut ui_rx) = mpsc::channel(32);
        handle_user_command(&mut state, UserCommand::SelectIdentity(ParticipantId(1)), &ui_tx).await;
        handle_user_command(&mut state, UserCommand::Draw, &ui_tx).await;
        let target = state.session.proposal.as_ref().unwrap().target.clone();
        drain(&mut ui_rx);

        handle_user_command(&mut state, UserCommand::Confirm, &ui_tx).await;

        assert!(state.session.revealed);
        assert!(!state.session.saving);
        let ana = state.snapshot.get(ParticipantId(1)).unwrap();
        assert!(ana.has_secret_assigned);
        assert_eq!(ana.assigned_target_id, Some(target.id));

        let updates = drain(&mut ui_rx);
        assert!(matches!(&updates[0], UiUpdate::Session(v) if v.saving));
        assert!(matches!(&updates[1], UiUpdate::Session(v) if v.revealed && !v.saving));
        assert!(updates.contains(&UiUpdate::Loading));
        assert!(errors(&updates).is_empty());
    }

    #[tokio::test]
    async fn confirm_conflict_clears_proposal() {
        let (mut state, _rx) = loaded_state(&["Ana", "Bea", "Cid"]).await;
        let (ui_tx, mut ui_rx) = mpsc::channel(32);
        handle_user_command(&mut state, UserCommand::SelectIdentity(ParticipantId(1)), &ui_tx).await;
        handle_user_command(&mut state, UserCommand::Draw, &ui_tx).await;
        let target = proposal_id(&state);
        // Somebody else claims the same target before Ana confirms.
        let other = if target == ParticipantId(2) { 3 } else { 2 };
        assign(&state, other, target.0).await;
        drain(&mut ui_rx);

        handle_user_command(&mut state, UserCommand::Confirm, &ui_tx).await;

        assert!(state.session.proposal.is_none());
        assert!(!state.session.revealed);
        assert!(state.session.actor.is_some());
        assert_eq!(errors(&drain(&mut ui_rx)), vec![CONFLICT_MESSAGE]);
        assert!(!state.snapshot.get(ParticipantId(1)).unwrap().has_secret_assigned);
    }

    #[tokio::test]
    async fn confirm_without_store_reports_database_error() {
        let (mut state, _rx) = create_state(ParticipantRepository::Disabled);
        let ana = Participant::new(1, "Ana");
        let bea = Participant::new(2, "Bea");
        state.session = Session {
            actor: Some(ana.clone()),
            proposal: Some(Proposal {
                actor: ana,
                target: bea,
            }),
            ..Session::default()
        };
        let (ui_tx, mut ui_rx) = mpsc::channel(16);

        handle_user_command(&mut state, UserCommand::Confirm, &ui_tx).await;

        assert!(!state.session.revealed);
        assert!(state.session.proposal.is_some(), "retry keeps the same target");
        assert_eq!(errors(&drain(&mut ui_rx)), vec![SAVE_FAILED_MESSAGE]);
    }

    #[tokio::test]
    async fn logout_clears_session() {
        let (mut state, _rx) = loaded_state(&["Ana", "Bea"]).await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);
        handle_user_command(&mut state, UserCommand::SelectIdentity(ParticipantId(1)), &ui_tx).await;
        handle_user_command(&mut state, UserCommand::Draw, &ui_tx).await;
        drain(&mut ui_rx);

        handle_user_command(&mut state, UserCommand::Logout, &ui_tx).await;

        assert!(state.session.actor.is_none());
        assert!(state.session.proposal.is_none());
        assert_eq!(
            drain(&mut ui_rx),
            vec![UiUpdate::Session(Box::new(SessionView::default()))]
        );
    }

    #[tokio::test]
    async fn insight_result_is_forwarded() {
        let (mut state, mut insight_rx) = loaded_state(&["Ana", "Bea"]).await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);

        handle_user_command(&mut state, UserCommand::RequestInsight, &ui_tx).await;
        assert_eq!(drain(&mut ui_rx), vec![UiUpdate::InsightStarted]);

        let event = insight_rx.recv().await.unwrap();
        assert_eq!(event.generation, 1);
        handle_insight_event(&mut state, event, &ui_tx).await;

        assert_eq!(
            drain(&mut ui_rx),
            vec![UiUpdate::Insight(Box::new(sample_insight()))]
        );
    }

    #[tokio::test]
    async fn stale_insight_is_discarded() {
        let (mut state, _insight_rx) = loaded_state(&["Ana", "Bea"]).await;
        let (ui_tx, mut ui_rx) = mpsc::channel(16);
        state.insight_generation = 3;

        let stale = InsightEvent {
            insight: Some(sample_insight()),
            generation: 2,
        };
        handle_insight_event(&mut state, stale, &ui_tx).await;
        assert!(drain(&mut ui_rx).is_empty());

        let failed = InsightEvent {
            insight: None,
            generation: 3,
        };
        handle_insight_event(&mut state, failed, &ui_tx).await;
        assert_eq!(drain(&mut ui_rx), vec![UiUpdate::InsightUnavailable]);
    }
}
