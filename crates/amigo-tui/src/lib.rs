// Library root: the app orchestrator, the message protocol between it and
// the terminal UI, and the UI itself. Exposed so integration tests can drive
// the orchestrator over its channels.

pub mod app;
pub mod protocol;
pub mod tui;
