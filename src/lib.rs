pub mod board;
pub mod cache;
pub mod config;
pub mod equality;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod projection;
pub mod session;
pub mod stats;
