use crate::dom::{is_element, new_element, new_text, remove_node, replace_with};
use crate::parsing::elements::{is_block, is_void};
use markup5ever_rcdom::{Handle, NodeData};
use once_cell::sync::Lazy;
use regex::Regex;

static BLANK_LINE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \r\n\t]+").unwrap());

/// Collapses insignificant whitespace in the tree under `root` the way a
/// browser lays it out: runs become one space, spaces next to block
/// boundaries and line breaks are dropped, and `pre` subtrees are untouched.
/// Comments and other non-element, non-text nodes are removed.
pub fn collapse_whitespace(root: &Handle) {
    if root.children.borrow().is_empty() || is_element(root, "pre") {
        return;
    }
    let mut collapser = Collapser {
        prev_text: None,
        keep_leading_ws: false,
    };
    collapser.walk(root);
    if let Some(prev) = collapser.prev_text.take() {
        trim_trailing_space(&prev);
        if text_of(&prev).is_empty() {
            remove_node(&prev);
        }
    }
}

struct Collapser {
    prev_text: Option<Handle>,
    keep_leading_ws: bool,
}

impl Collapser {
    fn walk(&mut self, node: &Handle) {
        let children: Vec<Handle> = node.children.borrow().clone();
        for child in children {
            match &child.data {
                NodeData::Text { contents } => {
                    let mut text = WHITESPACE_RUN
                        .replace_all(&contents.borrow(), " ")
                        .into_owned();
                    let after_space = match &self.prev_text {
                        None => true,
                        Some(prev) => text_of(prev).ends_with(' '),
                    };
                    if after_space && !self.keep_leading_ws && text.starts_with(' ') {
                        text.remove(0);
                    }
                    if text.is_empty() {
                        remove_node(&child);
                        continue;
                    }
                    *contents.borrow_mut() = text.as_str().into();
                    self.prev_text = Some(child.clone());
                }
                NodeData::Element { .. } => {
                    let had_children = !child.children.borrow().is_empty();
                    self.visit_element(&child);
                    if had_children && !is_element(&child, "pre") {
                        self.walk(&child);
                        self.visit_element(&child);
                    }
                }
                _ => {
                    remove_node(&child);
                }
            }
        }
    }

    fn visit_element(&mut self, node: &Handle) {
        if is_block(node) || is_element(node, "br") {
            if let Some(prev) = self.prev_text.take() {
                trim_trailing_space(&prev);
            }
            self.keep_leading_ws = false;
        } else if is_void(node) || is_element(node, "pre") {
            self.prev_text = None;
            self.keep_leading_ws = true;
        } else if self.prev_text.is_some() {
            self.keep_leading_ws = false;
        }
    }
}

fn text_of(node: &Handle) -> String {
    match &node.data {
        NodeData::Text { contents } => contents.borrow().to_string(),
        _ => String::new(),
    }
}

fn trim_trailing_space(node: &Handle) {
    if let NodeData::Text { contents } = &node.data {
        let mut contents = contents.borrow_mut();
        if contents.ends_with(' ') {
            let trimmed = contents[..contents.len() - 1].to_string();
            *contents = trimmed.as_str().into();
        }
    }
}

/// Replaces literal newlines in text nodes with `<br>` elements so that line
/// structure survives whitespace collapsing. Whitespace-only text and
/// anything inside `pre` or `math` is left alone.
pub fn preserve_line_breaks(root: &Handle) {
    let children: Vec<Handle> = root.children.borrow().clone();
    for child in children {
        match &child.data {
            NodeData::Text { contents } => {
                let text = contents.borrow().to_string();
                if !text.contains('\n') || text.trim().is_empty() {
                    continue;
                }
                let mut replacements = Vec::new();
                for (index, line) in text.split('\n').enumerate() {
                    if index > 0 {
                        replacements.push(new_element("br"));
                    }
                    if !line.is_empty() {
                        replacements.push(new_text(line));
                    }
                }
                replace_with(&child, replacements);
            }
            NodeData::Element { .. }
                if !is_element(&child, "pre") && !is_element(&child, "math") =>
            {
                preserve_line_breaks(&child);
            }
            _ => {}
        }
    }
}

/// Collapses runs of three or more newlines to a blank line and trims the
/// result. Applying it twice gives the same text as applying it once.
pub fn collapse_blank_lines(markdown: &str) -> String {
    BLANK_LINE_RUN
        .replace_all(markdown, "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{HtmlDocument, find_all, find_first, raw_text, text_content};

    #[test]
    fn test_collapse_whitespace_inline_runs() {
        let doc = HtmlDocument::parse("<p>  Hello \n\t  <b> big </b>  world  </p>");
        let p = find_first(doc.root(), |n| is_element(n, "p")).unwrap();

        collapse_whitespace(&p);

        assert_eq!(text_content(&p), "Hello big world");
    }

    #[test]
    fn test_collapse_whitespace_keeps_pre_untouched() {
        let doc = HtmlDocument::parse("<div>\n  <pre><code>a\n    b</code></pre>\n</div>");
        let div = find_first(doc.root(), |n| is_element(n, "div")).unwrap();

        collapse_whitespace(&div);

        assert_eq!(text_content(&div), "a\n    b");
    }

    #[test]
    fn test_collapse_whitespace_drops_text_between_blocks() {
        let doc = HtmlDocument::parse("<ul>\n  <li>one</li>\n  <li>two</li>\n</ul>");
        let ul = find_first(doc.root(), |n| is_element(n, "ul")).unwrap();

        collapse_whitespace(&ul);

        assert_eq!(ul.children.borrow().len(), 2);
        let items = find_all(&ul, |n| is_element(n, "li"));
        assert_eq!(text_content(&items[0]), "one");
    }

    #[test]
    fn test_preserve_line_breaks_skips_pre() {
        let doc =
            HtmlDocument::parse("<div><div>first\nsecond</div><pre><code>x\ny</code></pre></div>");
        let outer = find_first(doc.root(), |n| is_element(n, "div")).unwrap();

        preserve_line_breaks(&outer);

        assert_eq!(find_all(&outer, |n| is_element(n, "br")).len(), 1);
        assert_eq!(raw_text(&outer), "first\nsecondx\ny");
    }

    #[test]
    fn test_preserve_line_breaks_skips_math_annotations() {
        let doc = HtmlDocument::parse(
            "<div>one\ntwo<math><annotation encoding=\"application/x-tex\">a\nb</annotation></math></div>",
        );
        let div = find_first(doc.root(), |n| is_element(n, "div")).unwrap();

        preserve_line_breaks(&div);

        let annotation = find_first(&div, |n| is_element(n, "annotation")).unwrap();
        assert_eq!(text_content(&annotation), "a\nb");
        assert_eq!(find_all(&div, |n| is_element(n, "br")).len(), 1);
    }

    #[test]
    fn test_collapse_blank_lines_is_idempotent() {
        let input = "\n\na\n\n\n\nb\n\n\nc\n";
        let once = collapse_blank_lines(input);
        let twice = collapse_blank_lines(&once);

        assert_eq!(once, "a\n\nb\n\nc");
        assert_eq!(once, twice);
    }
}
