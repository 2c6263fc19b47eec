pub mod audit;
pub mod config;
pub mod error;
pub mod files;
pub mod generator;
pub mod models;
pub mod page;
pub mod proxy;
pub mod renderer;
pub mod retry;
pub mod routes;
pub mod state;
pub mod store;

pub use config::AppConfig;
pub use routes::create_routes;
pub use state::AppState;
