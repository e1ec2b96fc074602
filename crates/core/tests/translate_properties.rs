//! End-to-end translation properties, run through the in-memory provider.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use vippdfa_core::error::ParseErrorKind;
use vippdfa_core::{
    parse_source, translate_with_provider, CommandKind, DocumentKind, InMemoryProvider,
    KnownAliases, TranslateConfig, TranslateError, Translation,
};

fn translate_files(files: &[(&str, &str)]) -> Result<Translation, TranslateError> {
    let map: HashMap<PathBuf, String> = files
        .iter()
        .map(|(p, s)| (PathBuf::from(p), s.to_string()))
        .collect();
    translate_with_provider(
        Path::new("/job/main.dbm"),
        &TranslateConfig::default(),
        &InMemoryProvider::new(map),
    )
}

fn translate_main(src: &str) -> Translation {
    translate_files(&[("/job/main.dbm", src)])
        .unwrap_or_else(|e| panic!("translation failed: {}", e))
}

// ──────────────────────────────────────────────
// Parsing
// ──────────────────────────────────────────────

#[test]
fn balanced_blocks_parse_into_one_subtree() {
    let src = "PREFIX (A) eq { (a1) SH (a2) SH } { (b) SH } IFELSE \
               CASE PREFIX (X) { (x) SH } ENDCASE \
               /SUB { (s) SH } XGFRESDEF (tail) SH";
    let doc = parse_source(src, "main.dbm", DocumentKind::Main, &KnownAliases::default()).unwrap();
    assert_eq!(doc.commands.len(), 4, "{:#?}", doc.commands);
    match &doc.commands[0].kind {
        CommandKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            assert_eq!(then_branch.len(), 2);
            assert_eq!(else_branch.len(), 1);
        }
        other => panic!("expected IF, got {:?}", other),
    }
    assert!(matches!(doc.commands[1].kind, CommandKind::Case(_)));
    assert!(matches!(doc.commands[2].kind, CommandKind::Resource { .. }));
    assert!(matches!(doc.commands[3].kind, CommandKind::Show { .. }));
}

#[test]
fn unclosed_conditional_is_fatal_with_opening_line() {
    let err = translate_files(&[("/job/main.dbm", "(a) SH\nIF X 1 eq THEN\n(b) SH\n")]).unwrap_err();
    assert_eq!(err.stage(), "parse");
    assert_eq!(err.line(), Some(2));
}

#[test]
fn short_operand_list_is_an_arity_error() {
    let err = translate_files(&[("/job/main.dbm", "10 MOVETO")]).unwrap_err();
    match err {
        TranslateError::Parse(e) => assert!(matches!(
            e.kind,
            ParseErrorKind::Arity {
                expected: 2,
                found: 1,
                ..
            }
        )),
        other => panic!("expected parse error, got {}", other),
    }
}

#[test]
fn operands_never_cross_a_statement_keyword() {
    let err = translate_files(&[("/job/main.dbm", "10 20 (x) SH MOVETO")]).unwrap_err();
    match err {
        TranslateError::Parse(e) => assert!(matches!(
            e.kind,
            ParseErrorKind::Arity { found: 0, .. }
        )),
        other => panic!("expected parse error, got {}", other),
    }
}

// ──────────────────────────────────────────────
// Generation
// ──────────────────────────────────────────────

#[test]
fn translating_twice_is_byte_identical() {
    let files = [
        (
            "/job/main.dbm",
            "%%Title: Statement\n/FA /ARIAL 8 INDEXFONT /FB /ARIALB 10 INDEXFONT \
             [ { (casio.frm) SETFORM [[10 10 190 277]] SETLKF } ] SETPAGEDEF \
             CASE PREFIX (A) { FA 10 20 MOVETO NAME SH } (B) { FB 0 -5 120 0.2 LMED DRAWB } ENDCASE",
        ),
        (
            "/job/casio.frm",
            "/FA /COURIER 9 INDEXFONT FA 5 5 MOVETO (Casio) SH (logo.jpg) CACHE [40 12] SCALL",
        ),
    ];
    let a = translate_files(&files).unwrap();
    let b = translate_files(&files).unwrap();
    assert_eq!(a.dfa, b.dfa);
    assert_eq!(a.overlays, b.overlays);
    assert_eq!(
        serde_json::to_value(&a.report).unwrap(),
        serde_json::to_value(&b.report).unwrap()
    );
}

#[test]
fn negative_new_line_moves_up_exactly() {
    for spacing in ["2", "4.2", "12"] {
        let src = format!("{} SETLSP 10 100 MOVETO (a) SH -6 NL (b) SH", spacing);
        let t = translate_main(&src);
        assert!(
            t.dfa.contains("POSITION (SAME) (SAME-6 MM);"),
            "line spacing {}: {}",
            spacing,
            t.dfa
        );
    }
}

#[test]
fn box_above_local_origin_is_drawn_below_it() {
    for d in ["1", "2.5", "10", "42"] {
        let src = format!("0 -{} 50 20 S1 DRAWB", d);
        let t = translate_main(&src);
        let expected = format!("(POSY+{} MM)", d);
        assert!(t.dfa.contains(&expected), "offset -{}: {}", d, t.dfa);
        assert!(t.report.clamped.is_empty());
    }
}

#[test]
fn conflicting_font_alias_is_renamed_in_overlay() {
    let t = translate_files(&[
        (
            "/job/main.dbm",
            "/FA /ARIAL 8 INDEXFONT (casio.frm) SETFORM FA 10 10 MOVETO (m) SH",
        ),
        (
            "/job/casio.frm",
            "/FA /COURIER 10 INDEXFONT FA 5 5 MOVETO (o) SH",
        ),
    ])
    .unwrap();
    assert_eq!(t.report.conflicts.len(), 1);
    let renamed = t.report.conflicts[0].renamed_to.clone();
    assert_ne!(renamed, "FA");

    assert_eq!(t.dfa.matches("FONT FA NOTDEF").count(), 1, "{}", t.dfa);
    let renamed_def = format!("FONT {} NOTDEF", renamed);
    assert_eq!(t.dfa.matches(&renamed_def).count(), 1, "{}", t.dfa);
    assert!(t.dfa.contains("FONT FA NORMAL"), "{}", t.dfa);

    let overlay = &t.overlays[0].dfa;
    assert!(overlay.contains(&format!("FONT {} NORMAL", renamed)), "{}", overlay);
    assert!(!overlay.contains("FONT FA NORMAL"), "{}", overlay);
}

#[test]
fn identical_font_alias_is_shared() {
    let t = translate_files(&[
        ("/job/main.dbm", "/FA /ARIAL 8 INDEXFONT (f.frm) SETFORM"),
        ("/job/f.frm", "/FA /ARIAL 8 INDEXFONT FA (o) SH"),
    ])
    .unwrap();
    assert!(t.report.conflicts.is_empty());
    assert!(t.overlays[0].dfa.contains("FONT FA NORMAL"));
}

#[test]
fn assignment_only_arm_yields_no_docformat() {
    let t = translate_main(
        "CASE PREFIX (VAR) { /VAR_TITLE (Statement) SETVAR /VAR_N 0 SETVAR } \
         (A) { VAR_TITLE SH } ENDCASE",
    );
    assert!(!t.dfa.contains("DOCFORMAT DF_VAR;"), "{}", t.dfa);
    assert!(t.dfa.contains("DOCFORMAT DF_A;"), "{}", t.dfa);
    let init_at = t.dfa.find("DOCFORMAT $_BEFOREFIRSTDOC;").unwrap();
    let init = &t.dfa[init_at..];
    assert!(init.contains("VAR_TITLE = 'Statement';"), "{}", init);
    assert!(init.contains("VAR_N = 0;"), "{}", init);
}

#[test]
fn color_selected_before_new_line_applies_to_output() {
    let t = translate_main("R NL (https://example.com) SHR B");
    let out_at = t.dfa.find("OUTPUT 'https://example.com'").unwrap();
    let output = &t.dfa[out_at..];
    let end = output.find("ALIGN RIGHT NOPAD;").unwrap();
    assert!(output[..end].contains("COLOR R"), "{}", output);
    assert!(t.dfa.contains("COLOR R AS RGB 255 0 0;"), "{}", t.dfa);
}

#[test]
fn unsupported_commands_are_reported_not_dropped() {
    let t = translate_main("0 0 100 100 CLIP (x) SH");
    assert!(
        t.dfa.contains("/* VIPP command not directly supported: CLIP */"),
        "{}",
        t.dfa
    );
    assert_eq!(t.report.unsupported.len(), 1);
    assert_eq!(t.report.unsupported[0].keyword, "CLIP");
}

#[test]
fn resources_are_listed_in_report() {
    let t = translate_main("10 10 MOVETO (TXNB) SCALL (photo.tif) 0.5 ICALL");
    let names: Vec<&str> = t.report.resources.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["TXNB", "photo.tif"]);
}
