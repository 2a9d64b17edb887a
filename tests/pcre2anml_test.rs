use std::process::Command;

use anmlconv::anml::{ElementData, StartType};
use anmlconv::regex_batch::{self, SkipReason};
use pretty_assertions::assert_eq;

// =============================================================================
// Batch conversion
// =============================================================================

#[test]
fn quantified_line_is_skipped_and_codes_are_kept() {
    let report = regex_batch::convert("rules", "foo\nab{2,4}c\nbar|baz\n");
    assert_eq!(report.added, vec![1, 3]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].line, 2);
    assert_eq!(report.skipped[0].reason, SkipReason::CountedRepetition);

    let codes: Vec<u32> = report
        .network
        .elements()
        .filter_map(|e| e.report_code)
        .collect();
    assert_eq!(codes, vec![1, 3, 3]);
}

#[test]
fn anchored_pattern_starts_at_start_of_data() {
    let report = regex_batch::convert("rules", "^GET /\n");
    let first = report.network.find("_1_0").unwrap();
    assert_eq!(
        first.data,
        ElementData::Ste {
            symbol_set: "[G]".to_string(),
            start: StartType::StartOfData
        }
    );
    let second = report.network.find("_1_1").unwrap();
    assert_eq!(
        second.data,
        ElementData::Ste {
            symbol_set: "[E]".to_string(),
            start: StartType::None
        }
    );
}

#[test]
fn delimited_patterns_with_flags() {
    let report = regex_batch::convert("rules", "/ab/i\n/a.b/s\n");
    assert_eq!(report.added, vec![1, 2]);
    assert_eq!(
        report.network.find("_1_0").unwrap().data,
        ElementData::Ste {
            symbol_set: "[Aa]".to_string(),
            start: StartType::AllInput
        }
    );
    assert_eq!(
        report.network.find("_2_1").unwrap().data,
        ElementData::Ste {
            symbol_set: "*".to_string(),
            start: StartType::None
        }
    );
}

// =============================================================================
// Command line
// =============================================================================

#[test]
fn cli_exports_named_network() {
    let dir = tempfile::tempdir().unwrap();
    let patterns = dir.path().join("rules.txt");
    std::fs::write(&patterns, "abc\n\nx{3}\n(unclosed\nxyz\n").unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_pcre2anml"))
        .current_dir(dir.path())
        .args(["-n", "snort", "-r"])
        .arg(&patterns)
        .args(["--log-level", "off"])
        .status()
        .unwrap();
    assert!(status.success());

    let anml = std::fs::read_to_string(dir.path().join("snort.anml")).unwrap();
    assert!(anml.contains(r#"<automata-network id="snort">"#));
    assert!(anml.contains(r#"id="_1_0""#));
    assert!(anml.contains(r#"id="_5_2""#));
    assert!(!anml.contains(r#"id="_3_0""#));
    assert!(!anml.contains(r#"id="_4_0""#));
    assert!(anml.contains(r#"reportcode="5""#));
}

#[test]
fn cli_requires_name_and_regex() {
    let output = Command::new(env!("CARGO_BIN_EXE_pcre2anml"))
        .args(["-n", "only"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn cli_reports_export_failure() {
    let dir = tempfile::tempdir().unwrap();
    let patterns = dir.path().join("rules.txt");
    std::fs::write(&patterns, "abc\n").unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_pcre2anml"))
        .current_dir(dir.path())
        .args(["-n", "missing_dir/out", "-r"])
        .arg(&patterns)
        .args(["--log-level", "off"])
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(1));
}
