pub mod loader_config;
pub mod minio_config;

pub use loader_config::*;
pub use minio_config::*;
