//! Screenshot factory dispatcher: HTTP service library.
//!
//! Exposes the building blocks (config, state, error handling, the dispatch
//! coordinator, routes) so integration tests and the binary entrypoint can
//! both access them.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
