pub mod aggregator;
pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod rpc;
