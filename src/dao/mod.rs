/// Single-instance lock file with heartbeat.
pub mod instance_lock;
/// Song library scanning and code resolution.
pub mod library;
/// Persisted record definitions.
pub mod models;
/// Pluggable backends for the persisted session.
pub mod state_store;
/// JSON file helpers shared by the stores.
pub mod storage;
