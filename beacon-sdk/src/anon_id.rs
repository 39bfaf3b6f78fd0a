//! Stable anonymous installation id.
//!
//! The id is 16 random hex characters with no relation to any user
//! attribute, persisted in a single file so it survives restarts.

use std::fs;
use std::path::Path;

/// Length of an anonymous id in hex characters.
pub const ANON_ID_LEN: usize = 16;

/// Return the id stored at `path`, creating and persisting a new one if
/// the file is missing or malformed.
///
/// Returns `None` if the id cannot be persisted; telemetry then runs
/// without one.
pub fn load_or_create(path: &Path) -> Option<String> {
    if let Ok(existing) = fs::read_to_string(path) {
        let existing = existing.trim();
        if is_valid(existing) {
            return Some(existing.to_string());
        }
        tracing::debug!(path = %path.display(), "replacing malformed anonymous id");
    }

    let id = generate();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent) {
            tracing::debug!(error = %e, "cannot create anonymous id directory");
            return None;
        }
    }
    match fs::write(path, &id) {
        Ok(()) => Some(id),
        Err(e) => {
            tracing::debug!(error = %e, "cannot persist anonymous id");
            None
        }
    }
}

/// A fresh random id.
pub fn generate() -> String {
    format!("{:016x}", rand::random::<u64>())
}

fn is_valid(id: &str) -> bool {
    id.len() == ANON_ID_LEN && id.chars().all(|c| c.is_ascii_hexdigit())
}
