//! # app-rs
//!
//! Native Rust core for the Bahi ledger app. The mobile UI calls into this
//! crate for everything stateful: the session lifecycle, the persisted
//! session record, the typed backend client, input validation, the signup
//! wizard, and local settings.

/// Top-level app state and wiring.
pub mod app;
/// `LedgerClient`: the HTTPS impl of the backend API trait.
pub mod client;
/// Input form validation helpers.
pub mod form;
/// Flat key-value store for small persisted blobs.
pub mod kv;
/// `tracing` logger setup.
pub mod logger;
/// The session state machine and its persisted record.
pub mod session;
/// App settings db, serialization, and persistence.
pub mod settings;
/// The signup wizard state machine.
pub mod signup;
