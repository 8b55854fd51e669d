pub mod csv;
pub mod json;
pub mod report;
pub mod transcript;

pub use csv::*;
pub use json::*;
pub use transcript::*;
