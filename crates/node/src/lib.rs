//! Bioreactor node service library.
//!
//! Exposes the building blocks (config, state, error handling, hardware
//! abstraction, routes) so integration tests and the binary entrypoint can
//! both access them.

pub mod config;
pub mod error;
pub mod hardware;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
