use crate::conversation::{Message, QaPair};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ExportError;
use crate::filename::process_filename;
use crate::panic_handler::catch_conversion_panic;
use crate::parsing::html_to_markdown::HtmlToMarkdownConverter;
use crate::parsing::math::MathRewriter;
use crate::parsing::noise::strip_noise;
use crate::parsing::whitespace::preserve_line_breaks;
use crate::templates::{
    DefaultTemplateSet, ResolvedTemplates, TemplateSet, fill_placeholders, format_date,
};
use chrono::NaiveDate;
use log::{debug, info};

/// The finished Markdown and the file name it should be saved under,
/// without the `.md` extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDocument {
    pub markdown_text: String,
    pub filename: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertedPair {
    pub question_markdown: String,
    pub answer_markdown: String,
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub document: ExportDocument,
    pub diagnostics: Vec<Diagnostic>,
    pub pair_count: usize,
}

/// Turns question/answer pairs into one Markdown document.
#[derive(Debug, Clone)]
pub struct ExportAssembler {
    defaults: DefaultTemplateSet,
    converter: HtmlToMarkdownConverter,
}

impl ExportAssembler {
    pub fn new(defaults: DefaultTemplateSet) -> Self {
        ExportAssembler {
            defaults,
            converter: HtmlToMarkdownConverter::new(),
        }
    }

    pub fn with_converter(defaults: DefaultTemplateSet, converter: HtmlToMarkdownConverter) -> Self {
        ExportAssembler {
            defaults,
            converter,
        }
    }

    /// Converts one pair. The page tree is not modified.
    pub fn convert_pair(&self, pair: &QaPair, templates: &ResolvedTemplates) -> ConvertedPair {
        let math = MathRewriter::new(&templates.inline_math, &templates.display_math);
        ConvertedPair {
            question_markdown: self.convert_message(&pair.question, &math, true),
            answer_markdown: self.convert_message(&pair.answer, &math, false),
        }
    }

    fn convert_message(&self, message: &Message, math: &MathRewriter, keep_line_breaks: bool) -> String {
        let cleaned = strip_noise(&message.content);
        if keep_line_breaks {
            preserve_line_breaks(&cleaned);
        }
        math.rewrite(&cleaned);
        self.converter.convert_node(&cleaned)
    }

    pub fn assemble(
        &self,
        pairs: &[QaPair],
        templates: &TemplateSet,
        title: &str,
        link: &str,
        date: NaiveDate,
    ) -> Result<ExportReport, ExportError> {
        if pairs.is_empty() {
            return Err(ExportError::NothingToExport);
        }

        let resolved = self.defaults.resolve(templates);
        let mut diagnostics = Diagnostics::new();
        let formatted_date = format_date(date);

        let mut markdown = fill_placeholders(
            &resolved.page,
            &[
                ("title", title),
                ("link", link),
                ("date", formatted_date.as_str()),
            ],
        );

        for (index, pair) in pairs.iter().enumerate() {
            debug!("Converting pair {}/{}", index + 1, pairs.len());
            let converted = match catch_conversion_panic(|| self.convert_pair(pair, &resolved)) {
                Ok(converted) => converted,
                Err(message) => {
                    diagnostics.push(
                        Diagnostic::warning(format!("Conversion failed, pair left empty: {message}"))
                            .for_pair(index),
                    );
                    continue;
                }
            };

            let question_block = fill_placeholders(
                &resolved.question,
                &[("question", converted.question_markdown.as_str())],
            );
            markdown.push_str(&question_block);
            markdown.push_str("\n\n");
            markdown.push_str(&converted.answer_markdown);
            markdown.push_str("\n\n");
        }

        let filename = process_filename(&resolved.filename, title, date);
        info!("Assembled {} pairs into {}.md", pairs.len(), filename);

        Ok(ExportReport {
            document: ExportDocument {
                markdown_text: markdown,
                filename,
            },
            diagnostics: diagnostics.into_vec(),
            pair_count: pairs.len(),
        })
    }
}

impl Default for ExportAssembler {
    fn default() -> Self {
        Self::new(DefaultTemplateSet::builtin())
    }
}
