//! # Briefcast Gateway
//!
//! Minimal admin HTTP surface over an injected scheduler: trigger a run,
//! approve/enable/disable tasks (keeping the live timer map in sync with the
//! store), and inspect run history. No auth — this binds to localhost and
//! fronts an operator, not the public internet.

mod routes;
mod server;

pub use server::{AppState, build_router, serve};
