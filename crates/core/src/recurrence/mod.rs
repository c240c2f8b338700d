//! Occurrence generation from recurrence rules

mod describe;
mod generator;

pub use describe::describe;
pub use generator::{generate, CandidateSlot};
