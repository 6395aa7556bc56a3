use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{LocalName, Namespace, QualName, parse_document};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};
use std::cell::RefCell;
use std::rc::Rc;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A parsed HTML page.
///
/// The underlying `RcDom` empties every descendant's child list when the
/// document node is dropped, so handles taken from a document are only
/// meaningful while the `HtmlDocument` itself is alive.
pub struct HtmlDocument {
    dom: RcDom,
}

impl HtmlDocument {
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        HtmlDocument { dom }
    }

    pub fn root(&self) -> &Handle {
        &self.dom.document
    }

    pub fn body(&self) -> Option<Handle> {
        find_first(&self.dom.document, |node| is_element(node, "body"))
    }

    pub fn head(&self) -> Option<Handle> {
        find_first(&self.dom.document, |node| is_element(node, "head"))
    }
}

pub fn tag_name(node: &Node) -> Option<&str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(&*name.local),
        _ => None,
    }
}

pub fn is_element(node: &Node, tag: &str) -> bool {
    tag_name(node).is_some_and(|name| name.eq_ignore_ascii_case(tag))
}

pub fn get_attr_value(node: &Node, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| (*attr.name.local).eq_ignore_ascii_case(attr_name))
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

pub fn has_attr(node: &Node, attr_name: &str) -> bool {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .any(|attr| (*attr.name.local).eq_ignore_ascii_case(attr_name)),
        _ => false,
    }
}

pub fn has_class(node: &Node, class: &str) -> bool {
    get_attr_value(node, "class")
        .is_some_and(|classes| classes.split_ascii_whitespace().any(|c| c == class))
}

pub fn parent(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take()?;
    let parent = weak.upgrade();
    node.parent.set(Some(weak));
    parent
}

pub fn parent_is(node: &Handle, tag: &str) -> bool {
    parent(node).is_some_and(|p| is_element(&p, tag))
}

/// Previous and next sibling of `node`, counting every node kind.
pub fn siblings(node: &Handle) -> (Option<Handle>, Option<Handle>) {
    let Some(parent) = parent(node) else {
        return (None, None);
    };
    let children = parent.children.borrow();
    let Some(index) = children.iter().position(|c| Rc::ptr_eq(c, node)) else {
        return (None, None);
    };
    let previous = index.checked_sub(1).map(|i| children[i].clone());
    let next = children.get(index + 1).cloned();
    (previous, next)
}

pub fn element_children(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|child| matches!(child.data, NodeData::Element { .. }))
        .cloned()
        .collect()
}

/// Position of `node` among its parent's element children.
pub fn element_index(node: &Handle) -> usize {
    parent(node)
        .map(|p| {
            element_children(&p)
                .iter()
                .position(|c| Rc::ptr_eq(c, node))
                .unwrap_or(0)
        })
        .unwrap_or(0)
}

/// All descendants of `root` in document order, `root` excluded.
pub fn descendants(root: &Handle) -> Vec<Handle> {
    fn walk(node: &Handle, out: &mut Vec<Handle>) {
        for child in node.children.borrow().iter() {
            out.push(child.clone());
            walk(child, out);
        }
    }

    let mut out = Vec::new();
    walk(root, &mut out);
    out
}

pub fn find_first(root: &Handle, predicate: impl Fn(&Handle) -> bool) -> Option<Handle> {
    fn walk(node: &Handle, predicate: &dyn Fn(&Handle) -> bool) -> Option<Handle> {
        for child in node.children.borrow().iter() {
            if predicate(child) {
                return Some(child.clone());
            }
            if let Some(found) = walk(child, predicate) {
                return Some(found);
            }
        }
        None
    }

    walk(root, &predicate)
}

pub fn find_all(root: &Handle, predicate: impl Fn(&Handle) -> bool) -> Vec<Handle> {
    descendants(root)
        .into_iter()
        .filter(|node| predicate(node))
        .collect()
}

/// Concatenated text of every descendant text node, like the DOM's `textContent`.
pub fn text_content(node: &Handle) -> String {
    let mut output = String::new();
    collect_text(node, &mut output, false);
    output
}

/// Text content where `<br>` elements count as newlines. Used for code bodies.
pub fn raw_text(node: &Handle) -> String {
    let mut output = String::new();
    collect_text(node, &mut output, true);
    output
}

fn collect_text(node: &Handle, output: &mut String, breaks_as_newlines: bool) {
    match &node.data {
        NodeData::Text { contents } => {
            output.push_str(&contents.borrow());
        }
        NodeData::Element { name, .. } => {
            if breaks_as_newlines && (*name.local).eq_ignore_ascii_case("br") {
                output.push('\n');
            } else {
                for child in node.children.borrow().iter() {
                    collect_text(child, output, breaks_as_newlines);
                }
            }
        }
        NodeData::Document => {
            for child in node.children.borrow().iter() {
                collect_text(child, output, breaks_as_newlines);
            }
        }
        _ => {}
    }
}

pub fn new_text(content: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(content)),
    })
}

pub fn new_element(tag: &str) -> Handle {
    Node::new(NodeData::Element {
        name: QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(tag)),
        attrs: RefCell::new(Vec::new()),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

pub fn append_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Detaches `node` from its parent. Returns false for a root node.
pub fn remove_node(node: &Handle) -> bool {
    let Some(parent) = parent(node) else {
        return false;
    };
    parent.children.borrow_mut().retain(|c| !Rc::ptr_eq(c, node));
    node.parent.set(None);
    true
}

/// Splices `replacements` into the parent's child list where `node` was.
pub fn replace_with(node: &Handle, replacements: Vec<Handle>) -> bool {
    let Some(parent) = parent(node) else {
        return false;
    };
    let mut children = parent.children.borrow_mut();
    let Some(index) = children.iter().position(|c| Rc::ptr_eq(c, node)) else {
        return false;
    };
    for replacement in &replacements {
        replacement.parent.set(Some(Rc::downgrade(&parent)));
    }
    children.splice(index..=index, replacements);
    node.parent.set(None);
    true
}

/// Removes every descendant matching `predicate`, without descending into
/// removed subtrees. Returns how many nodes were removed.
pub fn remove_matching(root: &Handle, predicate: impl Fn(&Handle) -> bool) -> usize {
    fn walk(node: &Handle, predicate: &dyn Fn(&Handle) -> bool) -> usize {
        let children: Vec<Handle> = node.children.borrow().clone();
        let mut removed = 0;
        for child in children {
            if predicate(&child) {
                remove_node(&child);
                removed += 1;
            } else {
                removed += walk(&child, predicate);
            }
        }
        removed
    }

    walk(root, &predicate)
}

/// Deep copy of `node` and its subtree. The copy has no parent.
pub fn deep_clone(node: &Handle) -> Handle {
    let data = match &node.data {
        NodeData::Document => NodeData::Document,
        NodeData::Doctype {
            name,
            public_id,
            system_id,
        } => NodeData::Doctype {
            name: name.clone(),
            public_id: public_id.clone(),
            system_id: system_id.clone(),
        },
        NodeData::Text { contents } => NodeData::Text {
            contents: RefCell::new(contents.borrow().clone()),
        },
        NodeData::Comment { contents } => NodeData::Comment {
            contents: contents.clone(),
        },
        NodeData::Element {
            name,
            attrs,
            template_contents,
            mathml_annotation_xml_integration_point,
        } => NodeData::Element {
            name: name.clone(),
            attrs: RefCell::new(attrs.borrow().clone()),
            template_contents: RefCell::new(template_contents.borrow().as_ref().map(deep_clone)),
            mathml_annotation_xml_integration_point: *mathml_annotation_xml_integration_point,
        },
        NodeData::ProcessingInstruction { target, contents } => {
            NodeData::ProcessingInstruction {
                target: target.clone(),
                contents: contents.clone(),
            }
        }
    };

    let copy = Node::new(data);
    for child in node.children.borrow().iter() {
        append_child(&copy, deep_clone(child));
    }
    copy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_clone_is_detached_from_original() {
        let doc = HtmlDocument::parse("<div id=\"a\"><p>one</p><p>two</p></div>");
        let div = find_first(doc.root(), |n| is_element(n, "div")).unwrap();

        let copy = deep_clone(&div);
        let first_p = find_first(&copy, |n| is_element(n, "p")).unwrap();
        remove_node(&first_p);

        assert_eq!(text_content(&copy), "two");
        assert_eq!(text_content(&div), "onetwo");
        assert_eq!(get_attr_value(&copy, "id").as_deref(), Some("a"));
        assert!(parent(&copy).is_none());
    }

    #[test]
    fn test_replace_with_splices_in_place() {
        let doc = HtmlDocument::parse("<p>a<span>x</span>b</p>");
        let span = find_first(doc.root(), |n| is_element(n, "span")).unwrap();
        let p = parent(&span).unwrap();

        assert!(replace_with(&span, vec![new_text("1"), new_element("br"), new_text("2")]));

        assert_eq!(text_content(&p), "a12b");
        assert_eq!(raw_text(&p), "a1\n2b");
        let br = find_first(&p, |n| is_element(n, "br")).unwrap();
        assert!(Rc::ptr_eq(&parent(&br).unwrap(), &p));
    }

    #[test]
    fn test_siblings_and_element_index() {
        let doc = HtmlDocument::parse("<ul><li>a</li><li>b</li><li>c</li></ul>");
        let items = find_all(doc.root(), |n| is_element(n, "li"));

        assert_eq!(items.len(), 3);
        assert_eq!(element_index(&items[2]), 2);
        let (previous, next) = siblings(&items[1]);
        assert_eq!(text_content(&previous.unwrap()), "a");
        assert_eq!(text_content(&next.unwrap()), "c");
    }

    #[test]
    fn test_attribute_lookup_ignores_case() {
        let doc = HtmlDocument::parse(r#"<p><a HREF="https://x" Aria-Label="go">x</a></p>"#);
        let link = find_first(doc.root(), |n| is_element(n, "A")).unwrap();

        assert_eq!(get_attr_value(&link, "href").as_deref(), Some("https://x"));
        assert!(has_attr(&link, "ARIA-LABEL"));
        assert!(!has_attr(&link, "title"));
    }

    #[test]
    fn test_raw_text_counts_breaks_as_newlines() {
        let doc = HtmlDocument::parse("<code>a<br>b<BR>c</code>");
        let code = find_first(doc.root(), |n| is_element(n, "code")).unwrap();

        assert_eq!(raw_text(&code), "a\nb\nc");
        assert_eq!(text_content(&code), "abc");
    }

    #[test]
    fn test_has_class_matches_whole_tokens() {
        let doc = HtmlDocument::parse(r#"<span class="katex-html other">x</span>"#);
        let span = find_first(doc.root(), |n| is_element(n, "span")).unwrap();

        assert!(has_class(&span, "katex-html"));
        assert!(!has_class(&span, "katex"));
    }
}
