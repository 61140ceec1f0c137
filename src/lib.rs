// Library exports for the dbcheck health-check daemon

pub mod cli;
pub mod client;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logs;
pub mod probe;
pub mod server;
