//! Replaces rendered math with LaTeX source taken from its TeX annotation.

use crate::dom::{
    find_all, find_first, get_attr_value, has_class, is_element, new_element, new_text,
    remove_matching, remove_node, replace_with, text_content,
};
use crate::templates::fill_placeholders;
use log::debug;
use markup5ever_rcdom::Handle;

/// What a rewrite pass did to a tree.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MathStats {
    pub inline: usize,
    pub display: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone)]
pub struct MathRewriter {
    inline_template: String,
    display_template: String,
}

impl MathRewriter {
    pub fn new(inline_template: impl Into<String>, display_template: impl Into<String>) -> Self {
        MathRewriter {
            inline_template: inline_template.into(),
            display_template: display_template.into(),
        }
    }

    /// Rewrites every `math` element under `root` in place. Call it on a
    /// cloned tree.
    pub fn rewrite(&self, root: &Handle) -> MathStats {
        remove_matching(root, |node| {
            is_element(node, "span") && has_class(node, "katex-html")
        });

        let mut stats = MathStats::default();
        for math in find_all(root, |node| is_element(node, "math")) {
            let Some(latex) = tex_annotation(&math) else {
                remove_node(&math);
                stats.dropped += 1;
                continue;
            };

            let display = get_attr_value(&math, "display")
                .is_some_and(|d| d.eq_ignore_ascii_case("block"))
                || latex.contains('\n');
            let template = if display {
                stats.display += 1;
                &self.display_template
            } else {
                stats.inline += 1;
                &self.inline_template
            };

            let rendered = fill_placeholders(template, &[("latex", latex.as_str())]);
            replace_with(&math, line_nodes(&rendered));
        }

        if stats != MathStats::default() {
            debug!(
                "Rewrote math: {} inline, {} display, {} dropped",
                stats.inline, stats.display, stats.dropped
            );
        }
        stats
    }
}

fn tex_annotation(math: &Handle) -> Option<String> {
    let annotation = find_first(math, |node| {
        is_element(node, "annotation")
            && get_attr_value(node, "encoding")
                .is_some_and(|encoding| encoding.to_ascii_lowercase().contains("tex"))
    })?;
    let latex = text_content(&annotation);
    if latex.trim().is_empty() {
        None
    } else {
        Some(latex)
    }
}

// Newlines become <br> elements so whitespace collapsing keeps the layout.
fn line_nodes(text: &str) -> Vec<Handle> {
    let mut nodes = Vec::new();
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            nodes.push(new_element("br"));
        }
        if !line.is_empty() {
            nodes.push(new_text(line));
        }
    }
    nodes
}
