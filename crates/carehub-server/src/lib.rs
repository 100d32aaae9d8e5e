pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod realtime;
pub mod routes;
pub mod server;
pub mod services;

pub use config::{AppConfig, ServerConfig, StorageBackend};
pub use observability::init_tracing;
pub use server::{
    AppState, CarehubServer, ServerBuilder, build_app, build_router, build_state,
    build_state_with_storage,
};
