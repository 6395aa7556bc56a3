use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PAGE_TEMPLATE: &str =
    "# {title}\n\n- **Link:** [{link}]({link})\n- **Date:** {date}\n\n---\n\n";
pub const DEFAULT_QUESTION_TEMPLATE: &str = "\n\n```ad-bubble\n{question}\n```";
pub const DEFAULT_FILENAME_TEMPLATE: &str = "{title}";
pub const DEFAULT_INLINE_MATH_TEMPLATE: &str = "${latex}$";
pub const DEFAULT_DISPLAY_MATH_TEMPLATE: &str = "\n$$\n{latex}\n$$\n";

/// Templates as stored in a profile. A missing field falls back to the
/// built-in default when the set is resolved.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_template: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_template: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename_template: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_math_template: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_math_template: Option<String>,
}

impl TemplateSet {
    pub fn get(&self, field: TemplateField) -> Option<&str> {
        match field {
            TemplateField::Page => self.page_template.as_deref(),
            TemplateField::Question => self.question_template.as_deref(),
            TemplateField::Filename => self.filename_template.as_deref(),
            TemplateField::InlineMath => self.inline_math_template.as_deref(),
            TemplateField::DisplayMath => self.display_math_template.as_deref(),
        }
    }

    pub fn set(&mut self, field: TemplateField, value: impl Into<String>) {
        let value = Some(value.into());
        match field {
            TemplateField::Page => self.page_template = value,
            TemplateField::Question => self.question_template = value,
            TemplateField::Filename => self.filename_template = value,
            TemplateField::InlineMath => self.inline_math_template = value,
            TemplateField::DisplayMath => self.display_math_template = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateField {
    Page,
    Question,
    Filename,
    InlineMath,
    DisplayMath,
}

impl TemplateField {
    pub const ALL: [TemplateField; 5] = [
        TemplateField::Page,
        TemplateField::Question,
        TemplateField::Filename,
        TemplateField::InlineMath,
        TemplateField::DisplayMath,
    ];

    /// Key used in the settings file.
    pub fn key(self) -> &'static str {
        match self {
            TemplateField::Page => "pageTemplate",
            TemplateField::Question => "questionTemplate",
            TemplateField::Filename => "filenameTemplate",
            TemplateField::InlineMath => "inlineMathTemplate",
            TemplateField::DisplayMath => "displayMathTemplate",
        }
    }
}

impl fmt::Display for TemplateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TemplateField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        let normalized = normalized
            .strip_suffix("template")
            .unwrap_or(&normalized);
        match normalized {
            "page" => Ok(TemplateField::Page),
            "question" => Ok(TemplateField::Question),
            "filename" => Ok(TemplateField::Filename),
            "inlinemath" | "inline" => Ok(TemplateField::InlineMath),
            "displaymath" | "display" => Ok(TemplateField::DisplayMath),
            _ => Err(format!(
                "unknown template field '{s}' (expected one of: {})",
                TemplateField::ALL.map(TemplateField::key).join(", ")
            )),
        }
    }
}

/// Fully resolved templates used for one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTemplates {
    pub page: String,
    pub question: String,
    pub filename: String,
    pub inline_math: String,
    pub display_math: String,
}

/// The built-in templates, injected into the export assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultTemplateSet {
    templates: ResolvedTemplates,
}

impl DefaultTemplateSet {
    pub fn builtin() -> Self {
        DefaultTemplateSet {
            templates: ResolvedTemplates {
                page: DEFAULT_PAGE_TEMPLATE.to_string(),
                question: DEFAULT_QUESTION_TEMPLATE.to_string(),
                filename: DEFAULT_FILENAME_TEMPLATE.to_string(),
                inline_math: DEFAULT_INLINE_MATH_TEMPLATE.to_string(),
                display_math: DEFAULT_DISPLAY_MATH_TEMPLATE.to_string(),
            },
        }
    }

    pub fn new(templates: ResolvedTemplates) -> Self {
        DefaultTemplateSet { templates }
    }

    pub fn templates(&self) -> &ResolvedTemplates {
        &self.templates
    }

    /// The stored template set with defaults filled in.
    pub fn as_template_set(&self) -> TemplateSet {
        TemplateSet {
            page_template: Some(self.templates.page.clone()),
            question_template: Some(self.templates.question.clone()),
            filename_template: Some(self.templates.filename.clone()),
            inline_math_template: Some(self.templates.inline_math.clone()),
            display_math_template: Some(self.templates.display_math.clone()),
        }
    }

    /// Missing fields take the default. Blank question and math templates
    /// count as missing; an empty page template is used as is and an empty
    /// filename template means the title alone.
    pub fn resolve(&self, set: &TemplateSet) -> ResolvedTemplates {
        let defaults = &self.templates;
        let or_default = |value: Option<&String>, default: &String| {
            value.cloned().unwrap_or_else(|| default.clone())
        };
        let non_blank_or_default = |value: Option<&String>, default: &String| {
            value
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| default.clone())
        };

        ResolvedTemplates {
            page: or_default(set.page_template.as_ref(), &defaults.page),
            question: non_blank_or_default(set.question_template.as_ref(), &defaults.question),
            filename: or_default(set.filename_template.as_ref(), &defaults.filename),
            inline_math: non_blank_or_default(
                set.inline_math_template.as_ref(),
                &defaults.inline_math,
            ),
            display_math: non_blank_or_default(
                set.display_math_template.as_ref(),
                &defaults.display_math,
            ),
        }
    }
}

impl Default for DefaultTemplateSet {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Substitutes `{name}` placeholders in one left-to-right pass. Substituted
/// values are never scanned again and unknown placeholders are kept.
pub fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 1..];
        let value = after_open.find('}').and_then(|close| {
            let name = &after_open[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                output.push_str(value);
                rest = &after_open[close + 1..];
            }
            None => {
                output.push('{');
                rest = after_open;
            }
        }
    }
    output.push_str(rest);
    output
}

/// `DD/MM/YYYY`, the date format used in page headers.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}
