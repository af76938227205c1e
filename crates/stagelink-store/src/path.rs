//! Path addressing for change records.
//!
//! A path names the *container* a change happened in, as wire field names
//! and collection keys joined with `/`, measured from the graph root. The
//! root itself is the empty string. Numeric collection keys travel as
//! decimal strings and are coerced back to numbers where the addressed
//! collection is numerically keyed; string-keyed collections never coerce.

/// Join a parent path and one child segment.
#[must_use]
pub fn join(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_owned()
    } else {
        format!("{parent}/{segment}")
    }
}

/// Split a path into its segments. The root path yields no segments.
#[must_use]
pub fn segments(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('/').collect()
    }
}
