/// State, song-end and playback-control broadcasts to connected sockets.
pub mod broadcast;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Startup and shutdown sequencing.
pub mod lifecycle;
/// Action handling and queue advance.
pub mod playback_service;
/// Settings persistence and application.
pub mod settings_service;
/// Song folder watching and automatic re-indexing.
pub mod song_watcher;
/// WebSocket connection and message handling service.
pub mod websocket_service;
