//! 🔄 Transforms — the Rosetta Stone of the sync pipeline 🎭
//!
//! 🎬 COLD OPEN — INT. UNITED NATIONS — SIMULTANEOUS TRANSLATION BOOTH — 2:47 AM
//!
//! On the left screen: a user document written by four different versions of
//! a registration system, none of which agreed on field names. On the right
//! screen: a CRM endpoint with a fixed wire format and a column constraint
//! that bites. In between: this module.
//!
//! "It's just field mapping," they'd said. "How hard can it be?"
//! (Narrator: the fields had opinions.)
//!
//! ## Architecture 📐
//!
//! ```text
//!   Source document            Pure mapping             Wire records
//!  ┌────────────────┐      ┌───────────────┐      ┌──────────────────┐
//!  │ SourceUser     │      │ map_user      │      │ Lead             │
//!  │  (raw Value,   │─────▶│  fallback     │─────▶│  + Vec<Activity  │
//!  │   any casing)  │      │  chains,      │      │      Draft>      │
//!  └────────────────┘      │  enum guard,  │      └──────────────────┘
//!                          │  trial window │          or Skipped
//!                          └───────────────┘       (no email, no entry)
//! ```
//!
//! Everything in here is a pure function: no I/O, no clocks of its own
//! (`now` is handed in), no side effects beyond a trace line. That is what
//! makes the trial-window math and the unit conversion testable down to the
//! exact timestamp.

mod activity;
mod lead;

pub use lead::{MapOutcome, MappedUser, SkipReason, map_user};
