use std::sync::LazyLock;

use regex::Regex;

use crate::models::PullRequest;

/// Fenced ```release-note block in a pull request description
static RELEASE_NOTE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```release-note(?P<note>.*?)```").unwrap());

/// Extract the release note of a single pull request, if it has one worth publishing
pub fn release_note(pull: &PullRequest) -> Option<String> {
    let body = pull.body.as_deref()?;
    let captures = RELEASE_NOTE_REGEX.captures(body)?;
    let note = captures["note"].trim();

    if note.is_empty() || note.eq_ignore_ascii_case("none") {
        return None;
    }

    Some(format!("- #{} {}", pull.number, note))
}

/// Build a release body from the notes of `pulls`, in iteration order
pub fn collect_changelog(pulls: &[PullRequest]) -> String {
    let lines: Vec<String> = pulls.iter().filter_map(release_note).collect();
    format!("Changes:\n\n{}", lines.join("\n"))
}
