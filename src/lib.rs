//! Library crate for karaoke-host, exposing modules for the binaries and tests.

mod config;
/// Persistence, single-instance lock and song library.
pub mod dao;
mod dto;
mod error;
/// HTTP and WebSocket route trees for the three servers.
pub mod routes;
/// Business logic sitting between the routes and the state.
pub mod services;
/// Shared application state and the serialized karaoke session.
pub mod state;

pub use config::{DataPaths, Settings, api_port};
pub use error::StartupError;
