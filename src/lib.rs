pub mod access;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod resources;
pub mod state;
pub mod store;
pub mod usage;

// In-memory collaborator implementations for tests
pub mod testing;
