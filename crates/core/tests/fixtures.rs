//! Translates the sample job under fixtures/ from disk.

use std::path::{Path, PathBuf};
use vippdfa_core::{translate, TranslateConfig};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(name)
}

#[test]
fn statement_job_translates_with_its_form() {
    let t = translate(&fixture("statement.dbm"), &TranslateConfig::default())
        .unwrap_or_else(|e| panic!("fixture failed to translate: {}", e));

    assert_eq!(t.name, "STATEMENT");
    assert!(t.dfa.starts_with("/* Generated by vippdfa"), "{}", t.dfa);
    assert!(t.dfa.contains("/* Original Title: Monthly statement */"));
    assert!(t.dfa.contains("DOCDEF STATEMENT;"));
    assert!(t.dfa.contains("USE FORMAT CASIO EXTERNAL;"));
    assert!(t.dfa.contains("DOCFORMAT DF_A1;"));
    assert!(t.dfa.contains("DOCFORMAT DF_B2;"));
    assert!(!t.dfa.contains("DOCFORMAT DF_HD;"), "assignment-only arm is hoisted");
    assert!(t.dfa.contains("COLOR XBLUE AS RGB"));
    assert!(t.dfa.trim_end().ends_with("/* END OF DOCDEF FILE */"));

    assert_eq!(t.overlays.len(), 1);
    let form = &t.overlays[0];
    assert_eq!(form.name, "CASIO");
    assert!(form.dfa.contains("DOCFORMAT CASIO;"));
    assert!(form.dfa.contains("OUTPUT 'ACME Utilities'"));
    assert!(form.dfa.contains("(POSY+5 MM)"));

    assert_eq!(t.report.overlays.len(), 1);
    assert!(t.report.resources.iter().any(|r| r.name == "logo"));
    assert!(t.report.clamped.is_empty());
}

#[test]
fn report_serializes_every_section() {
    let t = translate(&fixture("statement.dbm"), &TranslateConfig::default()).unwrap();
    let v = serde_json::to_value(&t.report).unwrap();
    for key in [
        "conflicts",
        "placeholders",
        "unsupported",
        "clamped",
        "unused_operands",
        "resources",
        "overlays",
    ] {
        assert!(v.get(key).is_some(), "report is missing '{}'", key);
    }
}
