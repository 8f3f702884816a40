pub mod config;
pub mod loader;
pub mod models;
pub mod processor;
pub mod source;
pub mod storage;
