//! Bioreactor hub service library.
//!
//! The hub is the public entry point for experiment submissions. It owns
//! no hardware and no container runtime; every operation is forwarded to
//! the node service over the remote command transport (or direct HTTP when
//! co-located).

pub mod config;
pub mod error;
pub mod router;
pub mod routes;
pub mod state;
