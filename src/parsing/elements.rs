use crate::dom::{tag_name, text_content};
use markup5ever_rcdom::{Handle, Node, NodeData};

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "audio", "blockquote", "body", "canvas", "center", "dd", "dir",
    "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "frameset", "h1", "h2",
    "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "html", "isindex", "li", "main", "menu", "nav",
    "noframes", "noscript", "ol", "output", "p", "pre", "section", "table", "tbody", "td", "tfoot",
    "th", "thead", "tr", "ul",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "command", "embed", "hr", "img", "input", "keygen", "link", "meta",
    "param", "source", "track", "wbr",
];

const MEANINGFUL_WHEN_BLANK: &[&str] = &[
    "a", "table", "thead", "tbody", "tfoot", "th", "td", "iframe", "script", "audio", "video",
];

fn tag_in(node: &Node, list: &[&str]) -> bool {
    tag_name(node).is_some_and(|tag| list.iter().any(|t| tag.eq_ignore_ascii_case(t)))
}

pub fn is_block(node: &Node) -> bool {
    tag_in(node, BLOCK_ELEMENTS)
}

pub fn is_void(node: &Node) -> bool {
    tag_in(node, VOID_ELEMENTS)
}

pub fn is_meaningful_when_blank(node: &Node) -> bool {
    tag_in(node, MEANINGFUL_WHEN_BLANK)
}

fn has_descendant(node: &Handle, predicate: fn(&Node) -> bool) -> bool {
    node.children
        .borrow()
        .iter()
        .any(|child| predicate(child.as_ref()) || has_descendant(child, predicate))
}

/// An element with no text worth keeping and nothing that renders on its own.
pub fn is_blank(node: &Handle) -> bool {
    if !matches!(node.data, NodeData::Element { .. }) {
        return false;
    }
    !is_void(node)
        && !is_meaningful_when_blank(node)
        && text_content(node).trim().is_empty()
        && !has_descendant(node, is_void)
        && !has_descendant(node, is_meaningful_when_blank)
}
