pub mod auth;
pub mod checks;
pub mod health;
pub mod services;
pub mod teams;
pub mod workflows;
