use crate::dom::{HtmlDocument, deep_clone, is_element, siblings, text_content};
use crate::parsing::elements::is_block;
use crate::parsing::rules::{ConversionOptions, RuleSet};
use crate::parsing::whitespace::{collapse_blank_lines, collapse_whitespace};
use markup5ever_rcdom::{Handle, NodeData};

/// Converts an HTML fragment to Markdown.
///
/// Conversion works on a private copy of the input: whitespace is collapsed
/// the way a browser would lay it out, then every node is rendered through
/// the first matching rule of the [`RuleSet`], children before parents, and
/// the pieces are joined with at most one blank line between blocks.
///
/// # Usage
///
/// ```rust
/// use yachexp::parsing::html_to_markdown::HtmlToMarkdownConverter;
/// let converter = HtmlToMarkdownConverter::new();
/// let markdown = converter.convert("<p>Hello <strong>world</strong></p>");
/// assert_eq!(markdown, "Hello **world**");
/// ```
#[derive(Debug, Clone, Default)]
pub struct HtmlToMarkdownConverter {
    rules: RuleSet,
    options: ConversionOptions,
}

impl HtmlToMarkdownConverter {
    pub fn new() -> Self {
        HtmlToMarkdownConverter {
            rules: RuleSet::standard(),
            options: ConversionOptions::default(),
        }
    }

    pub fn with_rules(rules: RuleSet, options: ConversionOptions) -> Self {
        HtmlToMarkdownConverter { rules, options }
    }

    /// Converts an HTML string. Only the body content is rendered.
    pub fn convert(&self, html: &str) -> String {
        let document = HtmlDocument::parse(html);
        match document.body() {
            Some(body) => self.convert_node(&body),
            None => self.convert_node(document.root()),
        }
    }

    /// Converts the children of `node`. The node itself is not rendered and
    /// the caller's tree is left unmodified.
    pub fn convert_node(&self, node: &Handle) -> String {
        let root = deep_clone(node);
        collapse_whitespace(&root);
        let output = self.process(&root);
        collapse_blank_lines(&post_process(&output))
    }

    fn process(&self, parent: &Handle) -> String {
        let children: Vec<Handle> = parent.children.borrow().clone();
        children.iter().fold(String::new(), |output, child| {
            let replacement = match &child.data {
                NodeData::Text { contents } => contents.borrow().to_string(),
                NodeData::Element { .. } => self.replacement_for_node(child),
                _ => String::new(),
            };
            join(&output, &replacement)
        })
    }

    fn replacement_for_node(&self, node: &Handle) -> String {
        let rule = self.rules.for_node(node, &self.options);
        let mut content = self.process(node);
        let (leading, trailing) = flanking_whitespace(node);
        if !leading.is_empty() || !trailing.is_empty() {
            content = content.trim().to_string();
        }
        format!(
            "{leading}{}{trailing}",
            (rule.render)(&content, node, &self.options)
        )
    }
}

fn post_process(output: &str) -> String {
    output
        .trim_start_matches(['\t', '\r', '\n'])
        .trim_end()
        .to_string()
}

/// Concatenates two rendered pieces, keeping the larger of their facing
/// newline runs, capped at two.
fn join(output: &str, replacement: &str) -> String {
    let head = output.trim_end_matches('\n');
    let tail = replacement.trim_start_matches('\n');
    let newlines = (output.len() - head.len())
        .max(replacement.len() - tail.len())
        .min(2);
    format!("{head}{}{tail}", "\n".repeat(newlines))
}

struct EdgeWhitespace {
    leading: String,
    leading_ascii: String,
    leading_non_ascii: String,
    trailing: String,
    trailing_ascii: String,
    trailing_non_ascii: String,
}

fn is_ascii_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn edge_whitespace(text: &str) -> EdgeWhitespace {
    let body_start = text
        .find(|c: char| !c.is_whitespace())
        .unwrap_or(text.len());
    let leading = &text[..body_start];
    let ascii_end = leading
        .find(|c: char| !is_ascii_space(c))
        .unwrap_or(leading.len());

    let rest = &text[body_start..];
    let body_end = rest
        .rfind(|c: char| !c.is_whitespace())
        .map(|i| i + rest[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0);
    let trailing = &rest[body_end..];
    let ascii_start = trailing
        .rfind(|c: char| !is_ascii_space(c))
        .map(|i| i + trailing[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0);

    EdgeWhitespace {
        leading: leading.to_string(),
        leading_ascii: leading[..ascii_end].to_string(),
        leading_non_ascii: leading[ascii_end..].to_string(),
        trailing: trailing.to_string(),
        trailing_ascii: trailing[ascii_start..].to_string(),
        trailing_non_ascii: trailing[..ascii_start].to_string(),
    }
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

fn is_flanked_by_whitespace(side: Side, node: &Handle) -> bool {
    let (previous, next) = siblings(node);
    let sibling = match side {
        Side::Left => previous,
        Side::Right => next,
    };
    let Some(sibling) = sibling else {
        return false;
    };
    let text = match &sibling.data {
        NodeData::Text { contents } => contents.borrow().to_string(),
        NodeData::Element { .. } if !is_block(&sibling) => text_content(&sibling),
        _ => return false,
    };
    match side {
        Side::Left => text.ends_with(' '),
        Side::Right => text.starts_with(' '),
    }
}

/// Whitespace that has to move outside the rendered delimiters of an inline
/// element, e.g. `<em> hi </em>` renders as ` *hi* `.
fn flanking_whitespace(node: &Handle) -> (String, String) {
    if is_block(node) || is_element(node, "pre") {
        return (String::new(), String::new());
    }
    let mut edges = edge_whitespace(&text_content(node));
    if !edges.leading_ascii.is_empty() && is_flanked_by_whitespace(Side::Left, node) {
        edges.leading = edges.leading_non_ascii;
    }
    if !edges.trailing_ascii.is_empty() && is_flanked_by_whitespace(Side::Right, node) {
        edges.trailing = edges.trailing_non_ascii;
    }
    (edges.leading, edges.trailing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(html: &str) -> String {
        HtmlToMarkdownConverter::new().convert(html)
    }

    #[test]
    fn test_paragraphs_and_headings() {
        assert_eq!(
            convert("<h2>Title</h2><p>First   paragraph.</p><p>Second</p>"),
            "## Title\n\nFirst paragraph.\n\nSecond"
        );
    }

    #[test]
    fn test_code_block_keeps_body_exactly() {
        let html = r#"<pre><code class="language-rust">line1
    line2
</code></pre>"#;
        assert_eq!(convert(html), "```rust\nline1\n    line2\n```");
    }

    #[test]
    fn test_code_block_without_language() {
        assert_eq!(
            convert("<pre><code>line1\nline2</code></pre>"),
            "```\nline1\nline2\n```"
        );
    }

    #[test]
    fn test_lists_use_single_space_after_marker() {
        let html = "<ul><li>one</li><li>two<ul><li>nested</li></ul></li></ul><ol><li>first</li><li>second</li></ol>";
        assert_eq!(
            convert(html),
            "- one\n- two\n    - nested\n\n1. first\n2. second"
        );
    }

    #[test]
    fn test_paragraphs_inside_list_items_stay_tight() {
        let html = "<ul><li><p>alpha</p><p>beta</p></li><li><p>gamma</p></li></ul>";
        assert_eq!(convert(html), "- alpha\n    beta\n- gamma");
    }

    #[test]
    fn test_inline_formatting_and_links() {
        assert_eq!(
            convert(r#"<p>A <em>b</em> <strong>c</strong> <code>d</code> <a href="https://x.test/(1)">e</a></p>"#),
            "A *b* **c** `d` [e](https://x.test/\\(1\\))"
        );
    }

    #[test]
    fn test_flanking_whitespace_moves_outside_delimiters() {
        assert_eq!(convert("<p>a<em> b </em>c</p>"), "a *b* c");
    }

    #[test]
    fn test_table_with_header() {
        let html = "<table><thead><tr><th>A</th><th>B</th></tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table>";
        assert_eq!(convert(html), "| A | B |\n| --- | --- |\n| 1 | 2 |");
    }

    #[test]
    fn test_scripts_and_blank_elements_are_dropped() {
        assert_eq!(
            convert("<div><script>alert(1)</script><span>  </span><p>kept</p></div>"),
            "kept"
        );
    }

    #[test]
    fn test_blockquote_and_rule() {
        assert_eq!(
            convert("<blockquote><p>quoted</p></blockquote><hr><p>after</p>"),
            "> quoted\n\n---\n\nafter"
        );
    }

    #[test]
    fn test_output_has_no_triple_newlines() {
        let html = "<div><p>a</p><div><div><p>b</p></div></div><br><br><br><p>c</p></div>";
        let markdown = convert(html);
        assert!(!markdown.contains("\n\n\n"));
        assert!(markdown.starts_with('a'));
        assert!(markdown.ends_with('c'));
    }

    #[test]
    fn test_convert_node_leaves_input_untouched() {
        let document = HtmlDocument::parse("<div><p>  spaced   out </p></div>");
        let body = document.body().unwrap();
        let before = text_content(&body);

        let markdown = HtmlToMarkdownConverter::new().convert_node(&body);

        assert_eq!(markdown, "spaced out");
        assert_eq!(text_content(&body), before);
    }

    #[test]
    fn test_join_caps_newlines() {
        assert_eq!(join("a\n\n\n", "\n\nb"), "a\n\nb");
        assert_eq!(join("a", "b"), "ab");
        assert_eq!(join("a\n", "b"), "a\nb");
    }

    #[test]
    fn test_edge_whitespace_splits_ascii_and_unicode() {
        let edges = edge_whitespace(" \u{A0}x\u{A0} ");
        assert_eq!(edges.leading, " \u{A0}");
        assert_eq!(edges.leading_ascii, " ");
        assert_eq!(edges.trailing, "\u{A0} ");
        assert_eq!(edges.trailing_ascii, " ");
        assert_eq!(edges.trailing_non_ascii, "\u{A0}");
    }
}
