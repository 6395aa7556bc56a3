//! Ordered conversion rules for the HTML → Markdown converter.
//!
//! Every element is rendered by the first rule whose `matches` accepts it, so
//! overrides sit in front of the CommonMark rules they replace and the
//! default rule sits last.

use crate::dom::{
    element_children, element_index, find_first, get_attr_value, is_element, parent, parent_is,
    raw_text, siblings, tag_name,
};
use crate::parsing::elements::{is_blank, is_block};
use crate::parsing::tables;
use markup5ever_rcdom::Handle;
use once_cell::sync::Lazy;
use regex::Regex;
use std::rc::Rc;

static LIST_MARKER_PADDING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\s*)(-|\d+\.)[ \t\u{A0}]+").unwrap());
static ATTRIBUTE_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\n+\s*)+").unwrap());

pub type MatchFn = fn(&Handle, &ConversionOptions) -> bool;
pub type RenderFn = fn(&str, &Handle, &ConversionOptions) -> String;

/// Markdown flavour knobs shared by all rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOptions {
    pub horizontal_rule: String,
    pub bullet_list_marker: char,
    pub fence: String,
    pub em_delimiter: String,
    pub strong_delimiter: String,
    pub line_break: String,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        ConversionOptions {
            horizontal_rule: "---".to_string(),
            bullet_list_marker: '-',
            fence: "```".to_string(),
            em_delimiter: "*".to_string(),
            strong_delimiter: "**".to_string(),
            line_break: "  ".to_string(),
        }
    }
}

/// `render` receives the already converted children of the node.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub matches: MatchFn,
    pub render: RenderFn,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

pub const BLANK: Rule = Rule {
    name: "blank",
    matches: blank_matches,
    render: blank_render,
};

pub const PRE_CODE_BLOCK: Rule = Rule {
    name: "pre-code-block",
    matches: pre_code_matches,
    render: pre_code_render,
};

pub const LIST_ITEM: Rule = Rule {
    name: "list-item",
    matches: list_item_matches,
    render: list_item_render,
};

pub const PARAGRAPH_IN_LIST: Rule = Rule {
    name: "paragraph-in-list",
    matches: paragraph_in_list_matches,
    render: paragraph_in_list_render,
};

pub const DROPPED: Rule = Rule {
    name: "dropped",
    matches: dropped_matches,
    render: |_, _, _| String::new(),
};

pub const PARAGRAPH: Rule = Rule {
    name: "paragraph",
    matches: |node, _| is_element(node, "p"),
    render: |content, _, _| format!("\n\n{content}\n\n"),
};

pub const LINE_BREAK: Rule = Rule {
    name: "line-break",
    matches: |node, _| is_element(node, "br"),
    render: |_, _, options| format!("{}\n", options.line_break),
};

pub const HEADING: Rule = Rule {
    name: "heading",
    matches: |node, _| heading_level(node).is_some(),
    render: heading_render,
};

pub const BLOCKQUOTE: Rule = Rule {
    name: "blockquote",
    matches: |node, _| is_element(node, "blockquote"),
    render: blockquote_render,
};

pub const LIST: Rule = Rule {
    name: "list",
    matches: |node, _| is_element(node, "ul") || is_element(node, "ol"),
    render: list_render,
};

pub const HORIZONTAL_RULE: Rule = Rule {
    name: "horizontal-rule",
    matches: |node, _| is_element(node, "hr"),
    render: |_, _, options| format!("\n\n{}\n\n", options.horizontal_rule),
};

pub const INLINE_LINK: Rule = Rule {
    name: "inline-link",
    matches: |node, _| {
        is_element(node, "a") && get_attr_value(node, "href").is_some_and(|h| !h.is_empty())
    },
    render: inline_link_render,
};

pub const EMPHASIS: Rule = Rule {
    name: "emphasis",
    matches: |node, _| is_element(node, "em") || is_element(node, "i"),
    render: |content, _, options| wrap_non_blank(content, &options.em_delimiter),
};

pub const STRONG: Rule = Rule {
    name: "strong",
    matches: |node, _| is_element(node, "strong") || is_element(node, "b"),
    render: |content, _, options| wrap_non_blank(content, &options.strong_delimiter),
};

pub const INLINE_CODE: Rule = Rule {
    name: "inline-code",
    matches: inline_code_matches,
    render: inline_code_render,
};

pub const IMAGE: Rule = Rule {
    name: "image",
    matches: |node, _| is_element(node, "img"),
    render: image_render,
};

pub const DEFAULT: Rule = Rule {
    name: "default",
    matches: |_, _| true,
    render: |content, node, _| {
        if is_block(node) {
            format!("\n\n{content}\n\n")
        } else {
            content.to_string()
        }
    },
};

/// The ordered rule list the converter consults.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        RuleSet { rules }
    }

    /// Custom overrides, then GFM tables, then CommonMark, then the fallback.
    pub fn standard() -> Self {
        let mut rules = vec![BLANK, PRE_CODE_BLOCK, LIST_ITEM, PARAGRAPH_IN_LIST, DROPPED];
        rules.extend(tables::table_rules());
        rules.extend([
            PARAGRAPH,
            LINE_BREAK,
            HEADING,
            BLOCKQUOTE,
            LIST,
            HORIZONTAL_RULE,
            INLINE_LINK,
            EMPHASIS,
            STRONG,
            INLINE_CODE,
            IMAGE,
            DEFAULT,
        ]);
        RuleSet { rules }
    }

    pub fn for_node(&self, node: &Handle, options: &ConversionOptions) -> &Rule {
        self.rules
            .iter()
            .find(|rule| (rule.matches)(node, options))
            .unwrap_or(&DEFAULT)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name).collect()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}

fn blank_matches(node: &Handle, _: &ConversionOptions) -> bool {
    is_blank(node)
}

fn blank_render(_: &str, node: &Handle, _: &ConversionOptions) -> String {
    if is_block(node) {
        "\n\n".to_string()
    } else {
        String::new()
    }
}

fn pre_code_matches(node: &Handle, _: &ConversionOptions) -> bool {
    is_element(node, "pre") && find_first(node, |n| is_element(n, "code")).is_some()
}

// Uses the raw text of the code element instead of the converted children so
// that indentation and newlines come through untouched.
fn pre_code_render(_: &str, node: &Handle, options: &ConversionOptions) -> String {
    let Some(code) = find_first(node, |n| is_element(n, "code")) else {
        return String::new();
    };
    let mut body = raw_text(&code);
    if body.ends_with('\n') {
        body.pop();
    }
    let language = code_language(&code).unwrap_or_default();
    let fence = fence_for(&body, &options.fence);
    format!("\n\n{fence}{language}\n{body}\n{fence}\n\n")
}

fn code_language(code: &Handle) -> Option<String> {
    get_attr_value(code, "class")?
        .split_ascii_whitespace()
        .find_map(|class| {
            class
                .strip_prefix("language-")
                .or_else(|| class.strip_prefix("lang-"))
        })
        .filter(|language| !language.is_empty())
        .map(str::to_string)
}

/// A fence longer than any run of the fence character inside the code.
fn fence_for(code: &str, base: &str) -> String {
    let Some(fence_char) = base.chars().next() else {
        return base.to_string();
    };
    let longest_run = code
        .split(|c: char| c != fence_char)
        .map(|run| run.chars().count())
        .max()
        .unwrap_or(0);
    let length = base.chars().count().max(longest_run + 1);
    fence_char.to_string().repeat(length)
}

fn list_item_matches(node: &Handle, _: &ConversionOptions) -> bool {
    is_element(node, "li")
}

fn list_item_render(content: &str, node: &Handle, options: &ConversionOptions) -> String {
    collapse_marker_spacing(&default_list_item(content, node, options))
}

/// The stock list item rendering: a padded marker and continuation lines
/// indented by four spaces.
pub fn default_list_item(content: &str, node: &Handle, options: &ConversionOptions) -> String {
    let mut prefix = format!("{}   ", options.bullet_list_marker);
    if let Some(list) = parent(node).filter(|p| is_element(p, "ol")) {
        let index = element_index(node) as i64;
        let start = get_attr_value(&list, "start").and_then(|s| s.trim().parse::<i64>().ok());
        let number = start.map_or(index + 1, |start| start + index);
        prefix = format!("{number}.  ");
    }

    let body = indent_list_content(content);
    let (_, next) = siblings(node);
    let separator = if next.is_some() && !body.ends_with('\n') {
        "\n"
    } else {
        ""
    };
    format!("{prefix}{body}{separator}")
}

fn indent_list_content(content: &str) -> String {
    let without_leading = content.trim_start_matches('\n');
    let body = without_leading.trim_end_matches('\n');
    let mut indented = body
        .split('\n')
        .enumerate()
        .map(|(index, line)| {
            if index == 0 || line.is_empty() {
                line.to_string()
            } else {
                format!("    {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    if body.len() != without_leading.len() {
        indented.push('\n');
    }
    indented
}

/// Collapses the padding after a leading `-` or `N.` marker to one space,
/// keeping any indentation in front of the marker.
pub fn collapse_marker_spacing(markdown: &str) -> String {
    LIST_MARKER_PADDING
        .replace(markdown, "${1}${2} ")
        .into_owned()
}

fn paragraph_in_list_matches(node: &Handle, _: &ConversionOptions) -> bool {
    is_element(node, "p") && parent_is(node, "li")
}

fn paragraph_in_list_render(content: &str, node: &Handle, _: &ConversionOptions) -> String {
    let (_, next) = siblings(node);
    if next.is_some() {
        format!("{content}\n")
    } else {
        content.to_string()
    }
}

fn dropped_matches(node: &Handle, _: &ConversionOptions) -> bool {
    ["script", "style", "head", "template", "noscript"]
        .iter()
        .any(|tag| is_element(node, tag))
}

fn heading_level(node: &Handle) -> Option<usize> {
    match tag_name(node)?.to_ascii_lowercase().as_str() {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn heading_render(content: &str, node: &Handle, _: &ConversionOptions) -> String {
    let level = heading_level(node).unwrap_or(1);
    format!("\n\n{} {content}\n\n", "#".repeat(level))
}

fn blockquote_render(content: &str, _: &Handle, _: &ConversionOptions) -> String {
    let quoted = content
        .trim_matches('\n')
        .split('\n')
        .map(|line| format!("> {line}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n\n{quoted}\n\n")
}

fn list_render(content: &str, node: &Handle, _: &ConversionOptions) -> String {
    let closes_list_item = parent(node).is_some_and(|p| {
        is_element(&p, "li")
            && element_children(&p)
                .last()
                .is_some_and(|last| Rc::ptr_eq(last, node))
    });
    if closes_list_item {
        format!("\n{content}")
    } else {
        format!("\n\n{content}\n\n")
    }
}

fn clean_attribute(value: Option<String>) -> String {
    value
        .map(|v| ATTRIBUTE_NEWLINES.replace_all(&v, "\n").into_owned())
        .unwrap_or_default()
}

fn inline_link_render(content: &str, node: &Handle, _: &ConversionOptions) -> String {
    let href = get_attr_value(node, "href")
        .unwrap_or_default()
        .replace('(', "\\(")
        .replace(')', "\\)");
    let title = clean_attribute(get_attr_value(node, "title"));
    let title = if title.is_empty() {
        String::new()
    } else {
        format!(" \"{}\"", title.replace('"', "\\\""))
    };
    format!("[{content}]({href}{title})")
}

fn wrap_non_blank(content: &str, delimiter: &str) -> String {
    if content.trim().is_empty() {
        String::new()
    } else {
        format!("{delimiter}{content}{delimiter}")
    }
}

fn inline_code_matches(node: &Handle, _: &ConversionOptions) -> bool {
    if !is_element(node, "code") {
        return false;
    }
    let (previous, next) = siblings(node);
    let is_code_block = parent_is(node, "pre") && previous.is_none() && next.is_none();
    !is_code_block
}

fn inline_code_render(content: &str, _: &Handle, _: &ConversionOptions) -> String {
    if content.is_empty() {
        return String::new();
    }
    let content = content.replace("\r\n", " ").replace(['\r', '\n'], " ");

    let padded = content.starts_with('`')
        || content.ends_with('`')
        || (content.len() > 1
            && content.starts_with(' ')
            && content.ends_with(' ')
            && content.trim() != "");
    let extra_space = if padded { " " } else { "" };

    let runs: Vec<usize> = content
        .split(|c: char| c != '`')
        .filter(|run| !run.is_empty())
        .map(str::len)
        .collect();
    let mut delimiter = "`".to_string();
    while runs.contains(&delimiter.len()) {
        delimiter.push('`');
    }
    format!("{delimiter}{extra_space}{content}{extra_space}{delimiter}")
}

fn image_render(_: &str, node: &Handle, _: &ConversionOptions) -> String {
    let src = get_attr_value(node, "src").unwrap_or_default();
    if src.is_empty() {
        return String::new();
    }
    let alt = clean_attribute(get_attr_value(node, "alt"));
    let title = clean_attribute(get_attr_value(node, "title"));
    let title = if title.is_empty() {
        String::new()
    } else {
        format!(" \"{title}\"")
    };
    format!("![{alt}]({src}{title})")
}
