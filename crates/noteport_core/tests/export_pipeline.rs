use noteport_core::{export_backup, ExportError, ExportOptions, ExportReport, RecordOutcome};
use std::fs;
use std::path::{Path, PathBuf};

fn write_backup(dir: &Path, xml: &str) -> PathBuf {
    let path = dir.join("backup.xml");
    fs::write(&path, xml).unwrap();
    path
}

fn run(
    input: &Path,
    output_dir: &Path,
) -> (Result<ExportReport, ExportError>, Vec<RecordOutcome>) {
    let mut outcomes = Vec::new();
    let result = export_backup(&ExportOptions::new(input, output_dir), |outcome| {
        outcomes.push(outcome.clone())
    });
    (result, outcomes)
}

fn output_names(output_dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(output_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn exports_titled_record_and_skips_record_without_id() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_backup(
        dir.path(),
        r#"<?xml version="1.0" encoding="UTF-8"?>
<notes>
  <noteRecord _id="1" title="Grocery List" content="Milk&#10;Eggs"/>
  <noteRecord title="Orphan" content="never written"/>
</notes>"#,
    );
    let output_dir = dir.path().join("parsed_notes");

    let (result, outcomes) = run(&input, &output_dir);
    let report = result.unwrap();

    assert_eq!(output_names(&output_dir), vec!["Grocery_List.txt"]);
    assert_eq!(
        fs::read_to_string(output_dir.join("Grocery_List.txt")).unwrap(),
        "Grocery ListMilk\nEggs"
    );
    assert_eq!(
        outcomes,
        vec![
            RecordOutcome::Created {
                path: output_dir.join("Grocery_List.txt")
            },
            RecordOutcome::SkippedMissingId,
        ]
    );
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.skipped_missing_id, 1);
    assert_eq!(report.records_seen(), 2);
}

#[test]
fn raw_quotes_inside_attribute_value_are_repaired_before_parsing() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_backup(
        dir.path(),
        r#"<notes><noteRecord _id="2" title="Quote" content="He said "hi""/></notes>"#,
    );
    let output_dir = dir.path().join("out");

    let (result, _) = run(&input, &output_dir);
    let report = result.unwrap();

    assert_eq!(report.repair.escaped_quotes, 2);
    assert_eq!(
        fs::read_to_string(output_dir.join("Quote.txt")).unwrap(),
        "QuoteHe said \"hi\""
    );
}

#[test]
fn illegal_char_ref_is_dropped_from_content() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_backup(
        dir.path(),
        r#"<notes><noteRecord _id="3" title="Control" content="before&#1;after"/></notes>"#,
    );
    let output_dir = dir.path().join("out");

    let (result, _) = run(&input, &output_dir);
    let report = result.unwrap();

    assert_eq!(report.repair.removed_char_refs, 1);
    assert_eq!(
        fs::read_to_string(output_dir.join("Control.txt")).unwrap(),
        "Controlbeforeafter"
    );
}

#[test]
fn colliding_titles_keep_first_record_only() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_backup(
        dir.path(),
        r#"<notes>
  <noteRecord _id="1" title="Same Name" content="first"/>
  <noteRecord _id="2" title="Same_Name" content="second"/>
</notes>"#,
    );
    let output_dir = dir.path().join("out");

    let (result, outcomes) = run(&input, &output_dir);
    let report = result.unwrap();

    assert_eq!(output_names(&output_dir), vec!["Same_Name.txt"]);
    assert_eq!(
        fs::read_to_string(output_dir.join("Same_Name.txt")).unwrap(),
        "Same Namefirst"
    );
    assert_eq!(report.skipped_existing, 1);
    assert_eq!(
        outcomes[1],
        RecordOutcome::SkippedExisting {
            file_name: "Same_Name.txt".to_string(),
            path: output_dir.join("Same_Name.txt"),
        }
    );
}

#[test]
fn existing_file_from_earlier_run_is_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_backup(
        dir.path(),
        r#"<notes><noteRecord _id="1" title="Kept" content="new body"/></notes>"#,
    );
    let output_dir = dir.path().join("out");
    fs::create_dir_all(&output_dir).unwrap();
    fs::write(output_dir.join("Kept.txt"), "old body").unwrap();

    let (result, _) = run(&input, &output_dir);
    let report = result.unwrap();

    assert_eq!(report.skipped_existing, 1);
    assert!(report.created.is_empty());
    assert_eq!(
        fs::read_to_string(output_dir.join("Kept.txt")).unwrap(),
        "old body"
    );
}

#[test]
fn records_are_found_at_any_depth_with_defaults_applied() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_backup(
        dir.path(),
        r#"<backup><folder><inner><noteRecord _id="9"/></inner></folder></backup>"#,
    );
    let output_dir = dir.path().join("out");

    let (result, _) = run(&input, &output_dir);
    result.unwrap();

    assert_eq!(
        fs::read_to_string(output_dir.join("Untitled.txt")).unwrap(),
        "Untitled"
    );
}

#[test]
fn double_escaped_markup_is_decoded_to_text() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_backup(
        dir.path(),
        r#"<notes><noteRecord _id="1" title="Markup" content="&amp;lt;b&amp;gt;bold&amp;lt;/b&amp;gt;&amp;nbsp;x"/></notes>"#,
    );
    let output_dir = dir.path().join("out");

    let (result, _) = run(&input, &output_dir);
    result.unwrap();

    assert_eq!(
        fs::read_to_string(output_dir.join("Markup.txt")).unwrap(),
        "Markup<b>bold</b>\u{a0}x"
    );
}

#[test]
fn unparseable_input_aborts_without_writing_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_backup(dir.path(), "this is not xml at all");
    let output_dir = dir.path().join("out");

    let (result, outcomes) = run(&input, &output_dir);

    assert!(matches!(result, Err(ExportError::Parse(_))));
    assert!(outcomes.is_empty());
    assert!(output_names(&output_dir).is_empty());
}

#[test]
fn valid_document_without_records_is_not_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_backup(dir.path(), "<notes><other/></notes>");
    let output_dir = dir.path().join("out");

    let (result, _) = run(&input, &output_dir);

    assert_eq!(result.unwrap().records_seen(), 0);
}

#[test]
fn missing_input_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("out");

    let (result, _) = run(&dir.path().join("missing.xml"), &output_dir);

    assert!(matches!(result, Err(ExportError::ReadInput { .. })));
}

#[test]
fn output_dir_is_created_with_parents() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_backup(
        dir.path(),
        r#"<notes><noteRecord _id="1" title="Deep" content=""/></notes>"#,
    );
    let output_dir = dir.path().join("a").join("b").join("c");

    let (result, _) = run(&input, &output_dir);
    result.unwrap();

    assert!(output_dir.join("Deep.txt").is_file());
}

#[test]
fn output_dir_blocked_by_file_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_backup(
        dir.path(),
        r#"<notes><noteRecord _id="1" title="Blocked"/></notes>"#,
    );
    let blocker = dir.path().join("not_a_dir");
    fs::write(&blocker, "").unwrap();

    let (result, _) = run(&input, &blocker);

    let err = result.unwrap_err();
    assert!(matches!(err, ExportError::CreateOutputDir { .. }));
    assert!(std::error::Error::source(&err).is_some());
}

#[cfg(unix)]
#[test]
fn write_failure_aborts_the_batch_after_earlier_records() {
    let dir = tempfile::tempdir().unwrap();
    let long_title = "x".repeat(300);
    let input = write_backup(
        dir.path(),
        &format!(
            r#"<notes>
  <noteRecord _id="1" title="Before" content="kept"/>
  <noteRecord _id="2" title="{long_title}" content="too long to name"/>
  <noteRecord _id="3" title="After" content="never reached"/>
</notes>"#
        ),
    );
    let output_dir = dir.path().join("out");
    let options = ExportOptions {
        max_filename_chars: 300,
        ..ExportOptions::new(&input, &output_dir)
    };

    let mut outcomes = Vec::new();
    let error = export_backup(&options, |outcome| outcomes.push(outcome.clone())).unwrap_err();

    match &error {
        ExportError::Write { path, .. } => {
            assert_eq!(path, &output_dir.join(format!("{long_title}.txt")));
        }
        other => panic!("expected a write error, got {other:?}"),
    }
    assert!(std::error::Error::source(&error).is_some());
    assert_eq!(output_names(&output_dir), vec!["Before.txt"]);
    assert_eq!(
        outcomes,
        vec![RecordOutcome::Created {
            path: output_dir.join("Before.txt")
        }]
    );
}
