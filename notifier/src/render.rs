//! Markdown-to-HTML rendering and subject templating. Pure functions, no
//! I/O, so the formatting contract is unit-testable on its own.

use pulldown_cmark::{Options, Parser, html};

/// Length of the abbreviated commit hash in subjects.
const SHORT_HASH_LEN: usize = 10;

/// Renders the LLM's markdown review into a minimal HTML email body.
/// Fenced code blocks survive as `<pre><code>` with their language class.
pub fn review_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut body = String::with_capacity(markdown.len() * 2);
    html::push_html(&mut body, parser);

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"></head>\n\
         <body>\n{body}</body>\n</html>\n"
    )
}

/// Builds the mail subject. A merge-request reference wins over a commit
/// reference when both are present.
pub fn subject(
    project_key: &str,
    repo_slug: &str,
    commit_id: Option<&str>,
    mr_id: Option<i64>,
) -> String {
    let reference = match (mr_id, commit_id) {
        (Some(mr), _) => format!("PR #{mr}"),
        (None, Some(commit)) => {
            let short: String = commit.chars().take(SHORT_HASH_LEN).collect();
            format!("commit {short}")
        }
        (None, None) => "change".to_string(),
    };
    format!("Code Review: {project_key}/{repo_slug} {reference}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fenced_code_blocks_are_preserved() {
        let md = "Fix this:\n\n```rust\nlet x = 1;\n```\n";
        let html = review_html(md);
        assert!(html.contains("<pre><code class=\"language-rust\">"));
        assert!(html.contains("let x = 1;"));
    }

    #[test]
    fn markup_in_source_is_escaped() {
        let html = review_html("beware of `<script>` tags");
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn body_is_wrapped_in_a_document_shell() {
        let html = review_html("hello");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<p>hello</p>"));
        assert!(html.ends_with("</html>\n"));
    }

    #[test]
    fn subject_uses_short_commit_hash() {
        let s = subject("ACME", "widgets", Some("aaaa00001111222233334444"), None);
        assert_eq!(s, "Code Review: ACME/widgets commit aaaa000011");
    }

    #[test]
    fn subject_prefers_merge_request_reference() {
        let s = subject("ACME", "widgets", Some("aaaa000011"), Some(42));
        assert_eq!(s, "Code Review: ACME/widgets PR #42");
    }

    #[test]
    fn short_commits_are_not_padded() {
        let s = subject("ACME", "widgets", Some("abc"), None);
        assert_eq!(s, "Code Review: ACME/widgets commit abc");
    }
}
