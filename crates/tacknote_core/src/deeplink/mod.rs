//! Deep-link parsing and launch classification.
//!
//! # Responsibility
//! - Parse `notesapp://note/<id>` URIs into navigation targets.
//! - Classify process launch input before anything renders, so a detail
//!   deep link never flashes the list first.
//!
//! # Invariants
//! - Invalid or unparseable input always falls back to the list target.
//! - Accepted identities are strictly positive decimals.

use crate::model::note::NoteId;
use once_cell::sync::Lazy;
use regex::Regex;

/// Deep-link scheme and host, fixed by the external interface contract.
pub const DEEP_LINK_SCHEME: &str = "notesapp";
pub const DEEP_LINK_HOST: &str = "note";

static NOTE_URI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^notesapp://note/([0-9]{1,18})$").expect("valid note uri regex"));

/// Navigation target resolved before first paint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchTarget {
    /// Plain launch or unusable input: show the note list.
    NoteList,
    /// Open one note's detail view directly.
    NoteDetail(NoteId),
}

/// Builds the canonical detail-view URI for one note.
pub fn note_uri(id: NoteId) -> String {
    format!("{DEEP_LINK_SCHEME}://{DEEP_LINK_HOST}/{id}")
}

/// Parses a deep-link URI into a note identity.
///
/// Returns `None` for anything that is not exactly
/// `notesapp://note/<positive decimal>`.
pub fn parse_note_uri(uri: &str) -> Option<NoteId> {
    let captures = NOTE_URI_RE.captures(uri.trim())?;
    let id: NoteId = captures.get(1)?.as_str().parse().ok()?;
    if id > 0 {
        Some(id)
    } else {
        None
    }
}

/// Classifies launch input into a navigation target.
///
/// The structured URI wins over the plain identity parameter when both are
/// present; either one alone is sufficient. Anything invalid resolves to
/// the list target, never an error.
pub fn classify_launch(uri: Option<&str>, note_id_param: Option<NoteId>) -> LaunchTarget {
    if let Some(uri) = uri {
        if let Some(id) = parse_note_uri(uri) {
            return LaunchTarget::NoteDetail(id);
        }
        log::warn!(
            "event=launch_classify module=deeplink status=fallback reason=unparseable_uri"
        );
        return LaunchTarget::NoteList;
    }

    match note_id_param {
        Some(id) if id > 0 => LaunchTarget::NoteDetail(id),
        Some(_) => {
            log::warn!(
                "event=launch_classify module=deeplink status=fallback reason=invalid_id_param"
            );
            LaunchTarget::NoteList
        }
        None => LaunchTarget::NoteList,
    }
}

#[cfg(test)]
mod tests {
    use super::{classify_launch, note_uri, parse_note_uri, LaunchTarget};

    #[test]
    fn parse_accepts_canonical_uri() {
        assert_eq!(parse_note_uri("notesapp://note/42"), Some(42));
        assert_eq!(parse_note_uri(&note_uri(7)), Some(7));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        for uri in [
            "notesapp://note/",
            "notesapp://note/abc",
            "notesapp://note/0",
            "notesapp://notes/42",
            "other://note/42",
            "notesapp://note/42/extra",
            "",
        ] {
            assert_eq!(parse_note_uri(uri), None, "uri `{uri}` should be rejected");
        }
    }

    #[test]
    fn classify_prefers_uri_and_falls_back_to_list() {
        assert_eq!(
            classify_launch(Some("notesapp://note/5"), None),
            LaunchTarget::NoteDetail(5)
        );
        assert_eq!(
            classify_launch(Some("garbage"), Some(5)),
            LaunchTarget::NoteList
        );
        assert_eq!(classify_launch(None, Some(9)), LaunchTarget::NoteDetail(9));
        assert_eq!(classify_launch(None, Some(0)), LaunchTarget::NoteList);
        assert_eq!(classify_launch(None, None), LaunchTarget::NoteList);
    }
}
