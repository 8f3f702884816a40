pub mod aggregated;
pub mod map;
pub mod path_context;
pub mod shape;
pub mod top;

pub use aggregated::*;
pub use map::*;
pub use path_context::*;
pub use shape::{Shape, ShapeKind};
pub use top::*;
