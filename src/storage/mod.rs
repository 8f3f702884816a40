pub mod frame;
pub mod local_sink;
pub mod minio_sink;
pub mod row_sink;
pub mod storage_manager;
pub mod table_reader;

pub use frame::*;
pub use local_sink::*;
pub use minio_sink::*;
pub use row_sink::*;
pub use storage_manager::*;
pub use table_reader::*;
