pub mod csrf;
pub mod download;
pub mod server;
pub mod types;
