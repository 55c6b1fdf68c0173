pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod metrics;
pub mod models;
pub mod query;
pub mod seed;
