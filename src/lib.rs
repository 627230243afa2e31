pub mod auth;
pub mod config;
pub mod directory;
pub mod error;
pub mod extractors;
pub mod logging;
pub mod models;
pub mod pagination;
pub mod parser;
pub mod resource;
pub mod schema;
pub mod startup;
pub mod utils;

pub use config::AppConfig;
pub use startup::{bootstrap_directory, build_router, AppState};
