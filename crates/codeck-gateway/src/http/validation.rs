//! Request-field validation shared across HTTP handlers.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Strip HTML tags from `input`, leaving plain text content behind.
#[must_use]
pub fn strip_html(input: &str) -> String {
    TAG.replace_all(input, "").into_owned()
}

/// Validate a PTY session display name: 1-200 characters after HTML is
/// stripped.
#[must_use]
pub fn validate_session_name(raw: &str) -> Option<String> {
    let stripped = strip_html(raw);
    let trimmed = stripped.trim();
    if trimmed.is_empty() || trimmed.chars().count() > 200 {
        return None;
    }
    Some(trimmed.to_string())
}

/// Validate an agent name: non-empty, at most 50 characters.
#[must_use]
pub fn validate_agent_name(name: &str) -> bool {
    !name.trim().is_empty() && name.chars().count() <= 50
}

/// Validate an agent objective: non-empty, at most 10 000 characters.
#[must_use]
pub fn validate_objective(objective: &str) -> bool {
    !objective.trim().is_empty() && objective.chars().count() <= 10_000
}

/// `true` if `path` exists and is a directory.
#[must_use]
pub fn is_directory(path: &Path) -> bool {
    path.is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_html_removes_tags() {
        assert_eq!(strip_html("<b>hello</b> world"), "hello world");
    }

    #[test]
    fn strip_html_leaves_plain_text_untouched() {
        assert_eq!(strip_html("plain text"), "plain text");
    }

    #[test]
    fn validate_session_name_rejects_empty_after_stripping() {
        assert_eq!(validate_session_name("<script></script>"), None);
    }

    #[test]
    fn validate_session_name_rejects_over_200_chars() {
        let long = "a".repeat(201);
        assert_eq!(validate_session_name(&long), None);
    }

    #[test]
    fn validate_session_name_accepts_reasonable_name() {
        assert_eq!(validate_session_name("  my session  "), Some("my session".to_string()));
    }

    #[test]
    fn validate_agent_name_enforces_length() {
        assert!(validate_agent_name("nightly-build"));
        assert!(!validate_agent_name(""));
        assert!(!validate_agent_name(&"a".repeat(51)));
    }

    #[test]
    fn validate_objective_enforces_length() {
        assert!(validate_objective("do the thing"));
        assert!(!validate_objective(""));
        assert!(!validate_objective(&"a".repeat(10_001)));
    }
}
