pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod models;
pub mod notifier;
pub mod security;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;
