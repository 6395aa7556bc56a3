use snapbox::{Assert, Data};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

/// Compares `actual` with a golden Markdown file. Run with
/// `SNAPSHOTS=overwrite` to accept new output.
///
/// Only newlines are normalized: LaTeX backslashes must survive the
/// comparison, so path separators are left alone.
pub fn assert_markdown_snapshot(actual: String, snapshot_path: &Path, test_name: &str) {
    let result = catch_unwind(AssertUnwindSafe(|| {
        Assert::new()
            .action_env(snapbox::assert::DEFAULT_ACTION_ENV)
            .normalize_paths(false)
            .eq(actual.clone(), Data::read_from(snapshot_path, None).raw());
    }));
    if result.is_ok() {
        return;
    }

    let expected = Data::read_from(snapshot_path, None).to_string();
    let expected_lines: Vec<&str> = expected.lines().collect();
    let actual_lines: Vec<&str> = actual.lines().collect();
    let first_diff_line = expected_lines
        .iter()
        .zip(actual_lines.iter())
        .position(|(expected, actual)| expected != actual)
        .map(|i| i + 1);

    eprintln!("\nMarkdown snapshot mismatch: {test_name}");
    eprintln!(
        "   lines: {} (expected) vs {} (actual)",
        expected_lines.len(),
        actual_lines.len()
    );
    if let Some(line) = first_diff_line {
        eprintln!("   first difference at line {line}");
        eprintln!("   expected: {:?}", expected_lines[line - 1]);
        eprintln!("   actual:   {:?}", actual_lines[line - 1]);
    }
    eprintln!("   to update: SNAPSHOTS=overwrite cargo test {test_name}\n");

    panic!("Markdown snapshot mismatch");
}
