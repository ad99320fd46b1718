pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod finance;
pub mod middleware;
pub mod models;
pub mod notice;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod slots;
pub mod table;
