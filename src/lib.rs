pub mod cli;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod context;
pub mod distance;
pub mod error;
pub mod export;
pub mod persistence;
pub mod tree;
pub mod types;
pub mod utils;

pub use error::{ClusterError, Result};
