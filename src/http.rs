pub mod cancel;
pub mod client;
pub mod config;
