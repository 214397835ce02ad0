pub mod config;
pub mod engine;
pub mod http;
pub mod models;
pub mod store;

use engine::Engine;

/// Shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}
