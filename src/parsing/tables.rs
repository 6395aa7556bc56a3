//! GitHub-flavoured table rules.

use crate::dom::{element_children, element_index, find_all, find_first, get_attr_value, is_element, parent};
use crate::parsing::rules::{ConversionOptions, Rule};
use markup5ever_rcdom::Handle;
use once_cell::sync::Lazy;
use regex::Regex;
use std::rc::Rc;

static NEWLINE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").unwrap());
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\n+").unwrap());

pub const TABLE_CELL: Rule = Rule {
    name: "table-cell",
    matches: |node, _| is_element(node, "th") || is_element(node, "td"),
    render: cell_render,
};

pub const TABLE_ROW: Rule = Rule {
    name: "table-row",
    matches: |node, _| is_element(node, "tr"),
    render: row_render,
};

pub const TABLE: Rule = Rule {
    name: "table",
    matches: |node, _| is_element(node, "table"),
    render: table_render,
};

pub const TABLE_SECTION: Rule = Rule {
    name: "table-section",
    matches: |node, _| {
        is_element(node, "thead") || is_element(node, "tbody") || is_element(node, "tfoot")
    },
    render: |content, _, _| content.to_string(),
};

pub fn table_rules() -> [Rule; 4] {
    [TABLE_CELL, TABLE_ROW, TABLE, TABLE_SECTION]
}

fn cell_render(content: &str, node: &Handle, _: &ConversionOptions) -> String {
    let prefix = if element_index(node) == 0 { "| " } else { " " };
    let text = NEWLINE_RUN.replace_all(content.trim(), " ");
    format!("{prefix}{text} |")
}

fn row_render(content: &str, node: &Handle, _: &ConversionOptions) -> String {
    let mut output = format!("\n{content}");
    if is_heading_row(node) {
        let border: String = element_children(node)
            .iter()
            .enumerate()
            .map(|(index, cell)| {
                let prefix = if index == 0 { "| " } else { " " };
                format!("{prefix}{} |", alignment_border(cell))
            })
            .collect();
        output.push('\n');
        output.push_str(&border);
    }
    output
}

fn alignment_border(cell: &Handle) -> &'static str {
    match get_attr_value(cell, "align")
        .map(|a| a.trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("left") => ":--",
        Some("right") => "--:",
        Some("center") => ":-:",
        _ => "---",
    }
}

fn table_render(content: &str, _: &Handle, _: &ConversionOptions) -> String {
    let rows = BLANK_LINES.replace_all(content.trim_matches('\n'), "\n");
    format!("\n\n{rows}\n\n")
}

fn enclosing_table(node: &Handle) -> Option<Handle> {
    let mut current = parent(node);
    while let Some(candidate) = current {
        if is_element(&candidate, "table") {
            return Some(candidate);
        }
        current = parent(&candidate);
    }
    None
}

/// A row inside `thead`, or the first row of a table that has no `thead`
/// rows at all.
pub fn is_heading_row(row: &Handle) -> bool {
    let Some(section) = parent(row) else {
        return false;
    };
    if is_element(&section, "thead") {
        return true;
    }
    let Some(table) = enclosing_table(row) else {
        return false;
    };
    let has_head_rows = find_all(&table, |n| is_element(n, "thead"))
        .iter()
        .any(|head| find_first(head, |n| is_element(n, "tr")).is_some());
    if has_head_rows {
        return false;
    }
    find_first(&table, |n| is_element(n, "tr")).is_some_and(|first| Rc::ptr_eq(&first, row))
}
