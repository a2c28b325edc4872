// Library root for the draw core: participant model, draw engine, commit
// protocol, participant store adapters, and configuration loading.

pub mod config;
pub mod draw;
pub mod participant;
pub mod store;
