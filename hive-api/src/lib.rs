pub mod chat;
pub mod config;
pub mod events;
pub mod routes;
pub mod state;

pub use config::AppConfig;
pub use routes::router;
pub use state::AppState;
