// Optional narrative insight about the draw, generated by a third-party
// text model. Nothing here affects draw correctness.

pub mod client;
pub mod insight;
pub mod prompt;

pub use client::{GeminiClient, InsightClient};
pub use insight::{Insight, InsightError, InsightGenerator};
