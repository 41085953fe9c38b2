pub mod app;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

pub use app::build_app;
pub use auth::{AuthVerifier, JwksVerifier, StaticTokenVerifier};
pub use state::AppState;
