use crate::dom::{deep_clone, get_attr_value, has_attr, has_class, is_element, remove_matching};
use log::trace;
use markup5ever_rcdom::Handle;

const NOISE_TAGS: &[&str] = &["nav", "button", "svg"];

/// Screen-reader text, toolbars, icons and anything carrying an
/// `aria-label`.
pub fn is_noise(node: &Handle) -> bool {
    NOISE_TAGS.iter().any(|tag| is_element(node, tag))
        || has_attr(node, "aria-label")
        || has_class(node, "sr-only")
        || get_attr_value(node, "role").is_some_and(|role| role == "toolbar")
}

/// Returns a cleaned deep copy of `message`. The input is never mutated.
pub fn strip_noise(message: &Handle) -> Handle {
    let copy = deep_clone(message);
    let removed = remove_matching(&copy, is_noise);
    trace!("Stripped {removed} noise nodes");
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{HtmlDocument, find_first, text_content};

    #[test]
    fn test_strip_noise_removes_decorations() {
        let doc = HtmlDocument::parse(
            r#"<article><h5 class="sr-only">You said:</h5><div role="toolbar"><span>copy</span></div><nav>n</nav><svg><path/></svg><button>Edit</button><span aria-label="Copy">c</span><p>Question text</p></article>"#,
        );
        let article = find_first(doc.root(), |n| is_element(n, "article")).unwrap();

        let cleaned = strip_noise(&article);

        assert_eq!(text_content(&cleaned), "Question text");
    }

    #[test]
    fn test_strip_noise_leaves_original_intact() {
        let doc = HtmlDocument::parse(r#"<div><button>x</button><p>y</p></div>"#);
        let div = find_first(doc.root(), |n| is_element(n, "div")).unwrap();

        let cleaned = strip_noise(&div);

        assert_eq!(text_content(&cleaned), "y");
        assert_eq!(text_content(&div), "xy");
    }

    #[test]
    fn test_root_itself_is_kept() {
        let doc = HtmlDocument::parse(r#"<div aria-label="message"><p>kept</p></div>"#);
        let div = find_first(doc.root(), |n| is_element(n, "div")).unwrap();

        assert_eq!(text_content(&strip_noise(&div)), "kept");
    }
}
