pub mod census;
pub mod discovery;
pub mod reader;
pub mod router;

pub use census::*;
pub use discovery::*;
pub use reader::*;
pub use router::*;
