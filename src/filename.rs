use crate::templates::{fill_placeholders, format_date};
use chrono::{Datelike, NaiveDate};

pub const MAX_FILENAME_CHARS: usize = 120;
pub const FALLBACK_FILENAME: &str = "chat-export";

const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Makes `name` safe to use as a file name on common filesystems.
///
/// Reserved characters and control characters are dropped, whitespace runs
/// become single spaces and the result is capped at
/// [`MAX_FILENAME_CHARS`] characters. Never returns an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| !FORBIDDEN_CHARS.contains(c) && !c.is_control())
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(MAX_FILENAME_CHARS).collect();
    let capped = capped.trim_end();

    if capped.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        capped.to_string()
    }
}

/// Expands a filename template for a conversation exported on `date`.
/// An empty template yields the sanitized title.
pub fn process_filename(template: &str, title: &str, date: NaiveDate) -> String {
    if template.is_empty() {
        return sanitize_filename(title);
    }

    let title = sanitize_filename(title);
    let formatted_date = format_date(date);
    let year = date.year().to_string();
    let month = format!("{:02}", date.month());
    let day = format!("{:02}", date.day());

    let filename = fill_placeholders(
        template,
        &[
            ("title", title.as_str()),
            ("date", formatted_date.as_str()),
            ("year", year.as_str()),
            ("month", month.as_str()),
            ("day", day.as_str()),
        ],
    );
    sanitize_filename(&filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 9).unwrap()
    }

    #[test]
    fn test_sanitize_drops_reserved_characters() {
        assert_eq!(
            sanitize_filename("  What is <this>: a/b\\c | d? *e*  "),
            "What is this abc d e"
        );
        assert_eq!(sanitize_filename("tab\tand\nnewline\u{1}"), "tab and newline");
    }

    #[test]
    fn test_sanitize_falls_back_when_empty() {
        assert_eq!(sanitize_filename(""), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename("<>:\"/\\|?*"), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename("   "), FALLBACK_FILENAME);
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "word ".repeat(60);
        let name = sanitize_filename(&long);
        assert!(name.chars().count() <= MAX_FILENAME_CHARS);
        assert!(!name.ends_with(' '));
    }

    #[test]
    fn test_process_filename_placeholders() {
        assert_eq!(
            process_filename("{year}-{month}-{day} {title}", "Rust / Lifetimes", date()),
            "2025-01-09 Rust Lifetimes"
        );
        // The formatted date contains slashes, which are dropped.
        assert_eq!(process_filename("{date}", "x", date()), "09012025");
    }

    #[test]
    fn test_process_filename_empty_template_uses_title() {
        assert_eq!(process_filename("", "My: Chat", date()), "My Chat");
        assert_eq!(process_filename("", "", date()), FALLBACK_FILENAME);
    }

    proptest! {
        #[test]
        fn sanitize_filename_is_total(input in any::<String>()) {
            let name = sanitize_filename(&input);
            prop_assert!(!name.is_empty());
            prop_assert!(name.chars().count() <= MAX_FILENAME_CHARS);
            prop_assert!(!name.chars().any(|c| FORBIDDEN_CHARS.contains(&c) || c.is_control()));
        }
    }
}
