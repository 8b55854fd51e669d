// Public API - engines, data types and export functions
pub mod config;
pub mod error;
pub mod export;
pub mod lookup;
pub mod ping;
pub mod prefs;
pub mod probe;
pub mod state;
pub mod trace;

// Command-line surface of the binary
pub mod cli;
