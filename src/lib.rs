pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod merge;
pub mod middleware;
pub mod models;
pub mod progress;
pub mod server;
pub mod session;
pub mod state;
pub mod store;
pub mod utils;
pub mod ws;
