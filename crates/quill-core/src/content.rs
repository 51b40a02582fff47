//! Post body utilities: sanitizing, excerpts and reading time.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EXCERPT_LENGTH: usize = 160;
pub const WORDS_PER_MINUTE: usize = 200;

const ELLIPSIS: &str = "...";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid built-in content regex")
}

static SCRIPT_ELEMENT: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<script\b.*?</script>"));
static IFRAME_ELEMENT: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)<iframe\b.*?</iframe>"));
static JAVASCRIPT_SCHEME: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)javascript:"));
static EVENT_HANDLER: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)on[A-Za-z0-9_]+\s*="));

/// Markup rewrites applied in order by [`extract_excerpt`].
/// Images go before links so `![alt](src)` disappears instead of leaving `!alt`.
static MARKUP_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (compile(r"#{1,6}\s+"), ""),
        (compile(r"\*\*(.*?)\*\*"), "${1}"),
        (compile(r"\*(.*?)\*"), "${1}"),
        (compile(r"`(.*?)`"), "${1}"),
        (compile(r"!\[([^\]]*)\]\([^)]+\)"), ""),
        (compile(r"\[([^\]]+)\]\([^)]+\)"), "${1}"),
        (compile(r">\s+"), ""),
        (compile(r"[\r\n]+"), " "),
    ]
});

fn sanitize_pass(content: &str) -> String {
    let text = SCRIPT_ELEMENT.replace_all(content, "");
    let text = IFRAME_ELEMENT.replace_all(&text, "");
    let text = JAVASCRIPT_SCHEME.replace_all(&text, "");
    EVENT_HANDLER.replace_all(&text, "").into_owned()
}

/// Strip `<script>`/`<iframe>` elements, `javascript:` schemes and inline
/// `on*=` handlers from rich text.
///
/// Passes repeat until nothing changes, so fragments that join up after a
/// removal (`<scr<script></script>ipt>`) are caught too and the result is a
/// fixed point. This is a denylist filter, not an HTML security boundary.
pub fn sanitize(content: &str) -> String {
    let mut current = content.to_string();
    loop {
        let next = sanitize_pass(&current);
        // Every rewrite deletes text, so an unchanged length means a fixed point.
        if next.len() == current.len() {
            return next;
        }
        current = next;
    }
}

/// Plain-text summary of Markdown-ish content, at most `max_length`
/// characters plus an ellipsis.
///
/// The cut backs up to the last space when that space sits past 80% of
/// `max_length`; otherwise the text is cut mid-word.
pub fn extract_excerpt(content: &str, max_length: usize) -> String {
    let plain = MARKUP_RULES
        .iter()
        .fold(content.to_string(), |text, (pattern, replacement)| {
            pattern.replace_all(&text, *replacement).into_owned()
        });
    let plain = plain.trim();

    let chars: Vec<char> = plain.chars().collect();
    if chars.len() <= max_length {
        return plain.to_string();
    }

    let window = &chars[..max_length];
    let floor = max_length as f64 * 0.8;
    let end = match window.iter().rposition(|&c| c == ' ') {
        Some(space) if space as f64 > floor => space,
        _ => max_length,
    };

    let mut excerpt: String = chars[..end].iter().collect();
    excerpt.push_str(ELLIPSIS);
    excerpt
}

/// Estimated reading time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingTime {
    pub minutes: usize,
    pub text: String,
}

/// Reading time at [`WORDS_PER_MINUTE`], rounded up, never below one minute.
pub fn reading_time(content: &str) -> ReadingTime {
    let words = content.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    ReadingTime {
        minutes,
        text: format!("{minutes} min read"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_removes_script() {
        assert_eq!(sanitize("<script>alert(1)</script>Hello"), "Hello");
    }

    #[test]
    fn test_sanitize_case_insensitive_multiline() {
        let input = "a<SCRIPT type=\"text/javascript\">\nvar x = 1;\n</Script>b<IFrame src=x>\n</iframe>c";
        assert_eq!(sanitize(input), "abc");
    }

    #[test]
    fn test_sanitize_non_greedy() {
        let input = "<script>1</script>keep<script>2</script>";
        assert_eq!(sanitize(input), "keep");
    }

    #[test]
    fn test_sanitize_strips_schemes_and_handlers() {
        let input = r#"<a href="JavaScript:alert(1)" onclick="x()">link</a><img onerror = "y()">"#;
        assert_eq!(sanitize(input), r#"<a href="alert(1)" "x()">link</a><img  "y()">"#);
    }

    #[test]
    fn test_sanitize_catches_reassembled_payloads() {
        assert_eq!(sanitize("javajavascript:script:alert(1)"), "alert(1)");
        assert_eq!(
            sanitize("<scr<script>x</script>ipt>alert(1)</script>after"),
            "after"
        );
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = [
            "plain text",
            "<script>bad()</script><p>ok</p>",
            "jajavascript:vascript:",
            "oonclick=nclick=go",
            "<iframe><iframe></iframe></iframe>",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_excerpt_strips_markup() {
        assert_eq!(
            extract_excerpt("# Title\n**bold** text", 100),
            "Title bold text"
        );
    }

    #[test]
    fn test_excerpt_links_images_quotes_code() {
        let content = "> quoted\nSee [the docs](https://x.dev) and `code` *now*.\n![logo](a.png)";
        assert_eq!(
            extract_excerpt(content, DEFAULT_EXCERPT_LENGTH),
            "quoted See the docs and code now."
        );
    }

    #[test]
    fn test_excerpt_short_content_unchanged() {
        let content = "Just a short sentence.";
        assert_eq!(extract_excerpt(content, 160), content);
        assert_eq!(extract_excerpt(content, content.len()), content);
    }

    #[test]
    fn test_excerpt_empty() {
        assert_eq!(extract_excerpt("", 160), "");
        assert_eq!(extract_excerpt("  \n\n ", 160), "");
    }

    #[test]
    fn test_excerpt_cuts_at_word_boundary() {
        let content = "aaaa ".repeat(50);
        let excerpt = extract_excerpt(&content, 160);
        assert!(excerpt.ends_with("aaaa..."));
        assert_eq!(excerpt.chars().count(), 159 + ELLIPSIS.len());
    }

    #[test]
    fn test_excerpt_hard_cut_without_late_space() {
        let content = format!("short {}", "b".repeat(200));
        let excerpt = extract_excerpt(&content, 160);
        assert_eq!(excerpt, format!("short {}...", "b".repeat(154)));

        let word = "c".repeat(200);
        assert_eq!(extract_excerpt(&word, 160), format!("{}...", "c".repeat(160)));
    }

    #[test]
    fn test_excerpt_counts_characters_not_bytes() {
        let content = "é".repeat(10);
        assert_eq!(extract_excerpt(&content, 10), content);
        assert_eq!(extract_excerpt(&content, 4), "éééé...");
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time("").minutes, 1);
        assert_eq!(reading_time(&"word ".repeat(200)).minutes, 1);
        let long = reading_time(&"word ".repeat(201));
        assert_eq!(long.minutes, 2);
        assert_eq!(long.text, "2 min read");
    }
}
