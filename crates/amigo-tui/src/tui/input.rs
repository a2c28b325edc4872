// Keyboard input handling and command dispatch.
//
// Translates crossterm key events into UserCommand messages for the app
// orchestrator, or into local ViewState changes (cursor movement, quit
// confirmation).

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::{Screen, ViewState};
use crate::protocol::UserCommand;

/// Handle a keyboard event.
///
/// Returns `Some(UserCommand)` when the key press should be forwarded to the
/// app orchestrator. Returns `None` when it was handled locally or ignored.
pub fn handle_key(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    // crossterm reports Release (and Repeat) on some platforms as well.
    if key_event.kind != KeyEventKind::Press {
        return None;
    }

    if key_event.modifiers.contains(KeyModifiers::CONTROL) && key_event.code == KeyCode::Char('c') {
        return Some(UserCommand::Quit);
    }

    if view_state.confirm_quit {
        return handle_confirm_quit(key_event, view_state);
    }

    match key_event.code {
        KeyCode::Char('q') => {
            view_state.confirm_quit = true;
            None
        }
        KeyCode::Char('r') => Some(UserCommand::Reload),
        KeyCode::Char('i') => Some(UserCommand::RequestInsight),
        _ => match view_state.screen() {
            Screen::Loading => None,
            Screen::Identify => handle_identify(key_event, view_state),
            Screen::Draw => handle_draw(key_event, view_state),
        },
    }
}

/// `y`/`q` confirm, `n`/Esc cancel, everything else is swallowed.
fn handle_confirm_quit(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    match key_event.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char('q') | KeyCode::Char('Q') => {
            Some(UserCommand::Quit)
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            view_state.confirm_quit = false;
            None
        }
        _ => None,
    }
}

fn handle_identify(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    let count = view_state.selectable().len();
    match key_event.code {
        KeyCode::Up | KeyCode::Char('k') => {
            view_state.selected = view_state.selected.saturating_sub(1);
            None
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if view_state.selected + 1 < count {
                view_state.selected += 1;
            }
            None
        }
        KeyCode::Home => {
            view_state.selected = 0;
            None
        }
        KeyCode::End => {
            view_state.selected = count.saturating_sub(1);
            None
        }
        KeyCode::Enter => view_state
            .selected_participant()
            .map(|p| UserCommand::SelectIdentity(p.id)),
        _ => None,
    }
}

fn handle_draw(key_event: KeyEvent, view_state: &mut ViewState) -> Option<UserCommand> {
    let session = &view_state.session;
    match key_event.code {
        KeyCode::Char('d') if session.target.is_none() => Some(UserCommand::Draw),
        KeyCode::Char('c') if session.target.is_some() && !session.revealed && !session.saving => {
            Some(UserCommand::Confirm)
        }
        KeyCode::Char('l') | KeyCode::Esc if !session.saving => Some(UserCommand::Logout),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
