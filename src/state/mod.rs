pub mod ping;
pub mod trace;

pub use ping::*;
pub use trace::*;
