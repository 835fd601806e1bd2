//! API types, error taxonomy, and REST client plumbing shared by the Bahi
//! app core and any tooling that talks to the Bahi backend.

// `async fn` in trait is fine here; we don't need the futures to be Send
// since the app core runs everything on a single runtime it owns.
#![allow(async_fn_in_trait)]

/// Capped exponential backoff iterators for request retries.
pub mod backoff;
/// The `AppBackendApi` trait: every backend operation the app can perform.
pub mod def;
/// Serializable api error types and error kinds.
pub mod error;
/// Domain records and request/response structs.
pub mod models;
/// `RestClient` and request building/sending helpers.
pub mod rest;
