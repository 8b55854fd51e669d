pub mod rdns;
pub mod resolve;

pub use rdns::*;
pub use resolve::*;

/// Sanitize a string for safe terminal display by removing control characters.
///
/// PTR records are attacker-controlled; this keeps escape sequences out of
/// transcripts.
pub(crate) fn sanitize_display(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control())
        .collect()
}
