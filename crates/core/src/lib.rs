//! # Bookline Core
//!
//! Pure scheduling logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Occurrence generation from recurrence rules
//! - Conflict detection for candidate slots
//! - Series lifecycle management (pause/resume/cancel/reschedule/extend)
//! - Interactive slot selection and drag-reschedule
//! - Port/adapter interfaces (traits)
//!
//! ## Architecture Principles
//! - Only depends on `bookline-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod conflict;
pub mod interaction;
pub mod recurrence;
pub mod scheduling;

// Re-export specific items to avoid ambiguity
pub use conflict::{check_slot, SlotVerdict};
pub use interaction::{classify_instant, EventDrop, InteractionService, SlotSelection};
pub use recurrence::{describe, generate, CandidateSlot};
pub use scheduling::ports::{Clock, SchedulerRepository, SystemClock};
pub use scheduling::{PatternLocks, SeriesService};
