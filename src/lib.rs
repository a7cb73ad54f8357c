// Library crate: every component lives here; main.rs is a thin host.

pub mod adoption;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod models;
pub mod polling;
pub mod registry;
pub mod routes;
pub mod server;
pub mod settings;
pub mod staleness;
pub mod state;
pub mod statistics;
pub mod team_stats;
pub mod workflows;
