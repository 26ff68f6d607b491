mod diag;
pub mod dom;
pub mod lobby;
pub mod net_client;

#[cfg(target_family = "wasm")]
mod app;

#[cfg(target_family = "wasm")]
pub use app::LobbyApp;
