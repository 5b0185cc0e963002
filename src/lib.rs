//! # FEEL Playground Client
//!
//! Headless client for the FEEL playground: edit an expression (and optionally
//! a context document or an input value), send it to the remote evaluation
//! service and display the outcome.
//!
//! ## Components
//!
//! - Session state and evaluate cycle ([`session`])
//! - Remote service seam and its HTTP implementation ([`api_client`])
//! - Wire types and the tagged outcome ([`models`])
//! - Error line/position extraction ([`position`])
//! - Share links ([`share`])
//! - Editable text regions ([`editor`])
//! - Envelope composition ([`envelope`])
//! - Settings ([`config`])
//!
//! ## Evaluate cycle
//!
//! ```text
//! edit texts → prepare (placeholder, local JSON parsing, token)
//!            → EvaluationService::evaluate
//!            → apply (stale tokens dropped) → display + callbacks
//! ```
//!
//! Context parse failures stop at `prepare`; nothing is sent.

pub mod api_client;
pub mod config;
pub mod editor;
pub mod envelope;
pub mod error;
pub mod models;
pub mod position;
pub mod session;
pub mod share;

// Re-exports
pub use error::*;
pub use models::{EvaluationFailure, EvaluationOutcome, FailureKind, Warning};
pub use session::{DisplayState, EvaluationSession, SessionConfig};
