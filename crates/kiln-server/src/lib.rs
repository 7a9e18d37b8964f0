//! Development server with live reload for kiln.
//!
//! Serves the project directory, watches the source globs, re-runs the
//! matching build task on change, and tells connected browsers to reload
//! over a WebSocket.

pub mod server;
pub mod watcher;
pub mod websocket;

pub use server::{router, DevServer, DevServerConfig, ServerError};
pub use watcher::{classify_event, FileWatcher, Reload, WatchEvent, WatchRule};
pub use websocket::{ReloadHub, ReloadMessage};
