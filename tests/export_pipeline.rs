use chrono::NaiveDate;
use std::path::Path;
use yachexp::ExportError;
use yachexp::conversation::{
    ConversationExtractor, conversation_link, conversation_title, question_preview,
};
use yachexp::dom::HtmlDocument;
use yachexp::export::ExportAssembler;
use yachexp::selection::PairSelection;
use yachexp::templates::{DefaultTemplateSet, TemplateSet};

mod snapshot_assertions;
use snapshot_assertions::assert_markdown_snapshot;

const SORTING_PAGE: &str = include_str!("fixtures/sorting.html");

fn export_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

#[test]
fn test_full_export_matches_snapshot() {
    let document = HtmlDocument::parse(SORTING_PAGE);
    let pairs = ConversationExtractor::default().extract_pairs(document.root());
    let title = conversation_title(&document);
    let link = conversation_link(&document);

    let report = ExportAssembler::new(DefaultTemplateSet::builtin())
        .assemble(
            &pairs,
            &TemplateSet::default(),
            &title,
            &link,
            export_date(),
        )
        .unwrap();

    assert_eq!(report.pair_count, 2);
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.document.filename, "Sorting in Rust");
    assert!(
        report
            .document
            .markdown_text
            .contains("It is $O(n \\log n)$ comparisons.")
    );
    assert_markdown_snapshot(
        report.document.markdown_text,
        &Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/snapshots/sorting_export.md"),
        "test_full_export_matches_snapshot",
    );
}

#[test]
fn test_minimal_conversation_end_to_end() {
    let html = r#"<html><body>
<article><div data-message-author-role="user">What is 2+2?</div></article>
<article><div data-message-author-role="assistant"><p>It is 4.</p></div></article>
</body></html>"#;
    let document = HtmlDocument::parse(html);
    let pairs = ConversationExtractor::default().extract_pairs(document.root());
    let templates = TemplateSet {
        page_template: Some("# {title}\n\n{link}".to_string()),
        question_template: Some("> {question}".to_string()),
        ..TemplateSet::default()
    };

    let report = ExportAssembler::default()
        .assemble(&pairs, &templates, "Math", "https://x/1", export_date())
        .unwrap();
    let text = report.document.markdown_text;

    let heading = text.find("# Math").unwrap();
    let question = text.find("> What is 2+2?").unwrap();
    let answer = text.find("It is 4.").unwrap();
    assert!(heading < question && question < answer);
    assert!(text.contains("https://x/1> What is 2+2?"));
    assert!(!text.contains("\n\n\n"));
}

#[test]
fn test_selected_subset_keeps_document_order() {
    let document = HtmlDocument::parse(SORTING_PAGE);
    let pairs = ConversationExtractor::default().extract_pairs(document.root());
    let selection: PairSelection = "2".parse().unwrap();
    let selected = selection.apply(&pairs).unwrap();

    let report = ExportAssembler::default()
        .assemble(
            &selected,
            &TemplateSet::default(),
            "Sorting",
            "",
            export_date(),
        )
        .unwrap();

    assert_eq!(report.pair_count, 1);
    assert!(report.document.markdown_text.contains("What's the complexity?"));
    assert!(!report.document.markdown_text.contains("How do I sort"));
}

#[test]
fn test_selection_out_of_range() {
    let document = HtmlDocument::parse(SORTING_PAGE);
    let pairs = ConversationExtractor::default().extract_pairs(document.root());
    let selection: PairSelection = "1,3".parse().unwrap();

    assert!(matches!(
        selection.apply(&pairs),
        Err(ExportError::SelectionOutOfRange { index: 3, count: 2 })
    ));
}

#[test]
fn test_previews_list_questions() {
    let document = HtmlDocument::parse(SORTING_PAGE);
    let previews: Vec<String> = ConversationExtractor::default()
        .extract_pairs(document.root())
        .iter()
        .map(|pair| question_preview(&pair.question))
        .collect();

    assert_eq!(
        previews,
        vec![
            "How do I sort a Vec? Descending too, please.",
            "What's the complexity?"
        ]
    );
}

#[test]
fn test_page_without_messages_has_nothing_to_export() {
    let document = HtmlDocument::parse("<html><body><p>Just a page</p></body></html>");
    let pairs = ConversationExtractor::default().extract_pairs(document.root());

    assert!(pairs.is_empty());
    let result = ExportAssembler::default().assemble(
        &pairs,
        &TemplateSet::default(),
        "t",
        "",
        export_date(),
    );
    match result {
        Err(err @ ExportError::NothingToExport) => {
            assert_eq!(err.to_string(), "No exportable conversation found.")
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
