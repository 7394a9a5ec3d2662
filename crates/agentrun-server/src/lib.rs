//! HTTP front door for the agentrun runtime.
//!
//! A thin request router: every handler translates a REST call into a
//! runtime call and the result back into JSON. No business logic lives
//! here.

pub mod app;
pub mod config;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod responses;
pub mod state;
pub mod transport;

pub use app::create_router;
pub use config::ServerConfig;
pub use state::AppState;
