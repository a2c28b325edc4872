// Terminal UI: layout, input handling, and widget rendering.
//
// The TUI owns a `ViewState` that mirrors what the app orchestrator last
// reported. The orchestrator pushes `UiUpdate` messages over an mpsc
// channel; the TUI applies them to `ViewState` and re-renders at ~30 fps.

pub mod input;
pub mod layout;
pub mod widgets;

use std::time::Duration;

use chrono::{DateTime, Local};
use crossterm::event::{Event, EventStream};
use futures_util::StreamExt;
use ratatui::Frame;
use tokio::sync::mpsc;

use amigo_core::participant::{Participant, Snapshot};
use amigo_llm::Insight;

use crate::protocol::{SessionView, UiUpdate, UserCommand};

use layout::build_layout;

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

/// Progress of the optional insight panel.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InsightStatus {
    #[default]
    Idle,
    Loading,
    Ready(Insight),
    Unavailable,
}

/// Which screen the main panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// The first participant list has not arrived yet.
    Loading,
    /// Pick who you are.
    Identify,
    /// Draw, reveal and confirm.
    Draw,
}

/// TUI-local state mirroring the application state for rendering.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    /// A reload is in flight.
    pub loading: bool,
    pub snapshot: Option<Snapshot>,
    /// When the current snapshot arrived.
    pub loaded_at: Option<DateTime<Local>>,
    pub session: SessionView,
    /// Error banner text.
    pub error: Option<String>,
    pub insight: InsightStatus,
    /// Highlighted row on the identify screen.
    pub selected: usize,
    /// Whether the quit confirmation dialog is showing.
    pub confirm_quit: bool,
}

impl ViewState {
    pub fn screen(&self) -> Screen {
        if self.snapshot.is_none() {
            Screen::Loading
        } else if self.session.actor.is_none() {
            Screen::Identify
        } else {
            Screen::Draw
        }
    }

    /// Participants offered on the identify screen.
    pub fn selectable(&self) -> Vec<&Participant> {
        self.snapshot
            .as_ref()
            .map(|s| s.unassigned())
            .unwrap_or_default()
    }

    /// The participant under the cursor on the identify screen.
    pub fn selected_participant(&self) -> Option<&Participant> {
        self.selectable().get(self.selected).copied()
    }

    fn clamp_selection(&mut self) {
        let len = self.selectable().len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }
}

// ---------------------------------------------------------------------------
// UiUpdate processing
// ---------------------------------------------------------------------------

/// Apply a single UiUpdate to the ViewState.
pub fn apply_ui_update(state: &mut ViewState, update: UiUpdate) {
    match update {
        UiUpdate::Loading => {
            state.loading = true;
        }
        UiUpdate::Snapshot(snapshot) => {
            state.loading = false;
            state.snapshot = Some(*snapshot);
            state.loaded_at = Some(Local::now());
            state.clamp_selection();
        }
        UiUpdate::Session(session) => {
            state.session = *session;
            state.error = None;
        }
        UiUpdate::Error(message) => {
            state.error = Some(message);
        }
        UiUpdate::InsightStarted => {
            state.insight = InsightStatus::Loading;
        }
        UiUpdate::Insight(insight) => {
            state.insight = InsightStatus::Ready(*insight);
        }
        UiUpdate::InsightUnavailable => {
            state.insight = InsightStatus::Unavailable;
        }
    }
}

// ---------------------------------------------------------------------------
// Render frame
// ---------------------------------------------------------------------------

/// Render the complete frame.
pub fn render_frame(frame: &mut Frame, state: &ViewState) {
    let layout = build_layout(frame.area(), state.error.is_some());

    widgets::status_bar::render(frame, layout.status_bar, state);
    if let (Some(area), Some(message)) = (layout.error_banner, state.error.as_deref()) {
        widgets::error_banner::render(frame, area, message);
    }

    match state.screen() {
        Screen::Loading => widgets::loading::render(frame, layout.main_panel),
        Screen::Identify => widgets::identity::render(frame, layout.main_panel, state),
        Screen::Draw => widgets::draw_panel::render(frame, layout.main_panel, state),
    }

    widgets::insight::render(frame, layout.insight_panel, state);
    widgets::help_bar::render(frame, layout.help_bar, state);

    if state.confirm_quit {
        widgets::quit_confirm::render(frame, frame.area());
    }
}

// ---------------------------------------------------------------------------
// Main TUI loop
// ---------------------------------------------------------------------------

/// Run the TUI event loop.
///
/// 1. Initializes the terminal (raw mode, alternate screen).
/// 2. Installs a panic hook to restore the terminal on crash.
/// 3. Runs an async select loop: UI updates, keyboard input, render ticks.
/// 4. Restores the terminal on exit.
pub async fn run(
    mut ui_rx: mpsc::Receiver<UiUpdate>,
    cmd_tx: mpsc::Sender<UserCommand>,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = ratatui::restore();
        original_hook(panic_info);
    }));

    let mut view_state = ViewState::default();
    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let result = loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(ui_update) => apply_ui_update(&mut view_state, ui_update),
                    // Channel closed: app is shutting down
                    None => break Ok(()),
                }
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key_event))) => {
                        if let Some(cmd) = input::handle_key(key_event, &mut view_state) {
                            let quit = cmd == UserCommand::Quit;
                            let _ = cmd_tx.send(cmd).await;
                            if quit {
                                break Ok(());
                            }
                        }
                    }
                    Some(Ok(_)) => {
                        // Mouse and resize events; the next tick redraws.
                    }
                    Some(Err(e)) => break Err(anyhow::Error::from(e)),
                    None => break Ok(()),
                }
            }

            _ = render_tick.tick() => {
                if let Err(e) = terminal.draw(|frame| render_frame(frame, &view_state)) {
                    break Err(e.into());
                }
            }
        }
    };

    ratatui::restore();
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
