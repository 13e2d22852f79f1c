//! Fill sessions
//!
//! A session owns one template, its detected fields and choices, and the
//! user's edits until it is deleted or expires.

mod engine;
mod manager;
mod types;

pub use engine::FillEngine;
pub use manager::{parse_id, SessionManager};
pub use types::{
    ChoiceUpdate, CreateSessionRequest, FieldUpdate, FillSession, OutputKind, SessionError,
    SessionState, SessionSummary, SynthesisOutput, MAX_SESSIONS, SESSION_EXPIRY_HOURS,
};
