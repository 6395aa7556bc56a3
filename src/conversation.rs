use crate::dom::{
    HtmlDocument, deep_clone, find_all, find_first, get_attr_value, has_attr, has_class,
    is_element, remove_matching, text_content,
};
use log::debug;
use markup5ever_rcdom::Handle;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::rc::Rc;

pub const DEFAULT_TITLE: &str = "ChatGPT Conversation";
pub const PREVIEW_CHARS: usize = 200;

static TITLE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*\|\s*ChatGPT.*$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    Other,
}

impl Role {
    pub fn from_attribute(value: &str) -> Self {
        match value.trim() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            _ => Role::Other,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Other => write!(f, "other"),
        }
    }
}

/// One turn of the conversation. `content` points into the parsed page and
/// is only ever read or cloned.
#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: Handle,
}

#[derive(Debug, Clone)]
pub struct QaPair {
    pub question: Message,
    pub answer: Message,
}

/// Pairs each assistant turn with the most recent unanswered user turn.
///
/// A user turn replaces any earlier unanswered one, an assistant turn with
/// nothing pending is skipped, and other roles are ignored.
pub fn pair_turns<T>(turns: impl IntoIterator<Item = (Role, T)>) -> Vec<(T, T)> {
    let mut pairs = Vec::new();
    let mut pending_user = None;

    for (role, turn) in turns {
        match role {
            Role::User => pending_user = Some(turn),
            Role::Assistant => {
                if let Some(question) = pending_user.take() {
                    pairs.push((question, turn));
                }
            }
            Role::Other => {}
        }
    }
    pairs
}

/// Where messages live in the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    pub container_tag: String,
    pub role_attribute: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            container_tag: "article".to_string(),
            role_attribute: "data-message-author-role".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConversationExtractor {
    config: ExtractorConfig,
}

impl ConversationExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        ConversationExtractor { config }
    }

    /// Message-bearing nodes in document order.
    ///
    /// A message is a container element holding the role attribute on itself
    /// or a descendant. Pages without such containers fall back to the
    /// role-bearing elements themselves.
    pub fn messages(&self, root: &Handle) -> Vec<Message> {
        let role_attribute = self.config.role_attribute.as_str();
        let role_of = |node: &Handle| -> Option<Role> {
            if let Some(role) = get_attr_value(node, role_attribute) {
                return Some(Role::from_attribute(&role));
            }
            find_first(node, |n| has_attr(n, role_attribute))
                .and_then(|n| get_attr_value(&n, role_attribute))
                .map(|role| Role::from_attribute(&role))
        };

        let containers: Vec<Message> =
            find_all(root, |n| is_element(n, &self.config.container_tag))
                .into_iter()
                .filter_map(|container| {
                    role_of(&container).map(|role| Message {
                        role,
                        content: container,
                    })
                })
                .collect();
        if !containers.is_empty() {
            return containers;
        }

        debug!(
            "No <{}> message containers, using [{}] elements",
            self.config.container_tag, role_attribute
        );
        // Role elements nested inside another role element belong to it.
        let role_elements = find_all(root, |n| has_attr(n, role_attribute));
        role_elements
            .iter()
            .filter(|node| {
                !role_elements
                    .iter()
                    .any(|outer| !Rc::ptr_eq(outer, node) && contains(outer, node))
            })
            .filter_map(|node| {
                role_of(node).map(|role| Message {
                    role,
                    content: node.clone(),
                })
            })
            .collect()
    }

    pub fn extract_pairs(&self, root: &Handle) -> Vec<QaPair> {
        let messages = self.messages(root);
        let message_count = messages.len();
        let pairs: Vec<QaPair> = pair_turns(
            messages
                .into_iter()
                .map(|message| (message.role, message)),
        )
        .into_iter()
        .map(|(question, answer)| QaPair { question, answer })
        .collect();
        debug!(
            "Found {} messages forming {} question/answer pairs",
            message_count,
            pairs.len()
        );
        pairs
    }
}

fn contains(ancestor: &Handle, node: &Handle) -> bool {
    find_first(ancestor, |n| Rc::ptr_eq(n, node)).is_some()
}

/// The page title without the trailing `| ChatGPT` branding.
pub fn conversation_title(document: &HtmlDocument) -> String {
    let title = find_first(document.root(), |n| is_element(n, "title"))
        .map(|title| text_content(&title))
        .unwrap_or_default();
    let title = TITLE_SUFFIX.replace(&title, "");
    let title = title.trim();
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title.to_string()
    }
}

/// The canonical URL of the saved page, or an empty string.
pub fn conversation_link(document: &HtmlDocument) -> String {
    let canonical = find_first(document.root(), |n| {
        is_element(n, "link")
            && get_attr_value(n, "rel").is_some_and(|rel| {
                rel.split_ascii_whitespace()
                    .any(|r| r.eq_ignore_ascii_case("canonical"))
            })
    })
    .and_then(|link| get_attr_value(&link, "href"));
    let og_url = || {
        find_first(document.root(), |n| {
            is_element(n, "meta") && get_attr_value(n, "property").as_deref() == Some("og:url")
        })
        .and_then(|meta| get_attr_value(&meta, "content"))
    };

    canonical
        .or_else(og_url)
        .map(|link| link.trim().to_string())
        .unwrap_or_default()
}

/// Plain-text summary of a question for selection listings.
pub fn question_preview(message: &Message) -> String {
    let copy = deep_clone(&message.content);
    remove_matching(&copy, |n| has_class(n, "sr-only"));
    let text = text_content(&copy)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    truncate(&text, PREVIEW_CHARS)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let mut truncated: String = text.chars().take(max_chars).collect();
        truncated.push('…');
        truncated
    } else {
        text.to_string()
    }
}
