pub mod batch;
pub mod engine;

pub use batch::*;
pub use engine::*;
