//! Translation driver: one main document and the overlays it loads.
//!
//! Runs the passes in order and stops at the first fatal error:
//!
//! 1. read and parse the main document
//! 2. collect overlay names from its `SETFORM` load points and the config
//! 3. read and parse each overlay against the main document's aliases
//! 4. resolve alias conflicts across all documents
//! 5. generate the main stream, then one stream per overlay

use crate::ast::{self, target_name, CommandKind, Document, DocumentKind, Operand};
use crate::codegen::{generate_main, generate_overlay};
use crate::config::TranslateConfig;
use crate::error::TranslateError;
use crate::parser::{operand_text, parse_source, KnownAliases};
use crate::report::Report;
use crate::resolve::resolve_conflicts;
use crate::source::{FileSystemProvider, SourceProvider};
use serde::Serialize;
use std::path::Path;

/// Generated DocDEF for one overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayOutput {
    /// DOCFORMAT name the main stream calls it by
    pub name: String,
    /// Source file it was translated from
    pub file: String,
    pub dfa: String,
}

/// Everything produced for one main document.
#[derive(Debug, Clone, Serialize)]
pub struct Translation {
    pub name: String,
    pub dfa: String,
    pub overlays: Vec<OverlayOutput>,
    pub report: Report,
}

/// An overlay reference found in the main document.
#[derive(Debug, Clone, PartialEq)]
struct OverlayRef {
    name: String,
    reference: String,
    line: u32,
}

/// Translate the main document at `main` using the filesystem.
pub fn translate(main: &Path, config: &TranslateConfig) -> Result<Translation, TranslateError> {
    translate_with_provider(main, config, &FileSystemProvider)
}

/// Translate the main document at `main`, reading it and its overlays
/// through `provider`.
pub fn translate_with_provider(
    main: &Path,
    config: &TranslateConfig,
    provider: &dyn SourceProvider,
) -> Result<Translation, TranslateError> {
    let main_file = main.to_string_lossy().into_owned();
    let src = provider
        .read_source(main)
        .map_err(|source| TranslateError::Source {
            path: main_file.clone(),
            source,
        })?;
    let main_doc = parse_source(&src, &main_file, DocumentKind::Main, &KnownAliases::default())?;
    tracing::info!(file = %main_file, commands = main_doc.commands.len(), "main document parsed");

    let base = main.parent().unwrap_or(Path::new("."));
    let known = KnownAliases::from_document(&main_doc);
    let mut docs = vec![main_doc];
    for overlay in overlay_refs(&docs[0], config) {
        let path = provider.find_overlay(base, &overlay.reference).map_err(|source| {
            TranslateError::Overlay {
                name: overlay.name.clone(),
                file: main_file.clone(),
                line: overlay.line,
                source,
            }
        })?;
        let file = path.to_string_lossy().into_owned();
        let src = provider
            .read_source(&path)
            .map_err(|source| TranslateError::Overlay {
                name: overlay.name.clone(),
                file: main_file.clone(),
                line: overlay.line,
                source,
            })?;
        let doc = parse_source(&src, &file, DocumentKind::Overlay, &known)?;
        tracing::info!(file = %file, name = %overlay.name, "overlay parsed");
        docs.push(doc);
    }

    let mut report = Report::new();
    for doc in &docs {
        for (line, op) in &doc.leftovers {
            report.unused(&doc.file, *line, leftover_text(op));
        }
    }
    report.overlays = docs[1..].iter().map(|d| d.file.clone()).collect();

    let symbols = resolve_conflicts(&mut docs, &mut report);

    let dfa = generate_main(
        &docs[0],
        &symbols.tables[0],
        &docs[1..],
        &symbols,
        config,
        &mut report,
    )?;
    tracing::info!(file = %main_file, bytes = dfa.len(), "main document generated");

    let mut overlays = Vec::with_capacity(docs.len() - 1);
    for (doc, table) in docs[1..].iter().zip(&symbols.tables[1..]) {
        let text = generate_overlay(doc, table, &symbols, config, &mut report)?;
        overlays.push(OverlayOutput {
            name: doc.target_name(),
            file: doc.file.clone(),
            dfa: text,
        });
    }
    tracing::info!(
        overlays = overlays.len(),
        warnings = report.warning_count(),
        "translation finished"
    );

    Ok(Translation {
        name: docs[0].target_name(),
        dfa,
        overlays,
        report,
    })
}

/// Overlays named by `SETFORM` anywhere in the tree, then the configured
/// extras, each target name once.
fn overlay_refs(doc: &Document, config: &TranslateConfig) -> Vec<OverlayRef> {
    let mut refs: Vec<OverlayRef> = Vec::new();
    let mut add = |reference: &str, line: u32| {
        let name = target_name(reference);
        if !refs.iter().any(|r| r.name == name) {
            refs.push(OverlayRef {
                name,
                reference: reference.to_owned(),
                line,
            });
        }
    };
    ast::walk(&doc.commands, &mut |cmd| {
        if let CommandKind::SetForm(form) = &cmd.kind {
            add(form, cmd.line);
        }
    });
    for extra in &config.extra_overlays {
        add(extra, 0);
    }
    refs
}

fn leftover_text(op: &Operand) -> String {
    if let Some(text) = operand_text(op) {
        return text;
    }
    match op.as_number() {
        Some(n) => crate::codegen::num(n),
        None => op.describe().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryProvider;
    use std::path::PathBuf;

    fn provider(files: &[(&str, &str)]) -> InMemoryProvider {
        InMemoryProvider::new(
            files
                .iter()
                .map(|(p, s)| (PathBuf::from(p), s.to_string())),
        )
    }

    fn run(files: &[(&str, &str)]) -> Result<Translation, TranslateError> {
        translate_with_provider(
            Path::new("/jobs/main.dbm"),
            &TranslateConfig::default(),
            &provider(files),
        )
    }

    #[test]
    fn setform_loads_overlay_from_main_directory() {
        let t = run(&[
            ("/jobs/main.dbm", "(casio.frm) SETFORM 10 10 MOVETO (hi) SH"),
            ("/jobs/casio.frm", "0 0 MOVETO (form) SH"),
        ])
        .unwrap();
        assert_eq!(t.name, "MAIN");
        assert_eq!(t.overlays.len(), 1);
        assert_eq!(t.overlays[0].name, "CASIO");
        assert!(t.overlays[0].dfa.contains("DOCFORMAT CASIO;"));
        assert!(t.dfa.contains("USE FORMAT CASIO EXTERNAL;"), "{}", t.dfa);
        assert_eq!(t.report.overlays, vec!["/jobs/casio.frm".to_string()]);
    }

    #[test]
    fn overlay_lookup_ignores_case_and_extension() {
        let t = run(&[
            ("/jobs/main.dbm", "(CASIO) SETFORM"),
            ("/jobs/CASIO.FRM", "(x) SH"),
        ])
        .unwrap();
        assert_eq!(t.overlays[0].file, "/jobs/CASIO.FRM");
    }

    #[test]
    fn overlay_lookup_matches_mixed_case_file() {
        let t = run(&[
            ("/jobs/main.dbm", "(Casio) SETFORM"),
            ("/jobs/casio.Frm", "(x) SH"),
        ])
        .unwrap();
        assert_eq!(t.overlays[0].file, "/jobs/casio.Frm");
        assert_eq!(t.overlays[0].name, "CASIO");
    }

    #[test]
    fn missing_overlay_names_load_point() {
        let err = run(&[("/jobs/main.dbm", "\n\n(gone.frm) SETFORM")]).unwrap_err();
        match &err {
            TranslateError::Overlay { name, file, line, .. } => {
                assert_eq!(name, "GONE");
                assert_eq!(file, "/jobs/main.dbm");
                assert_eq!(*line, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.stage(), "load");
    }

    #[test]
    fn line_mode_main_is_refused_before_overlays_load() {
        let err = run(&[("/jobs/main.dbm", "(absent.frm) SETFORM\nSTARTLM")]).unwrap_err();
        assert!(matches!(err, TranslateError::LineMode { line: 2, .. }), "{err}");
    }

    #[test]
    fn missing_main_is_a_source_error() {
        let err = run(&[]).unwrap_err();
        assert!(matches!(err, TranslateError::Source { .. }));
    }

    #[test]
    fn overlay_referenced_twice_is_translated_once() {
        let t = run(&[
            (
                "/jobs/main.dbm",
                "[ { (f1.frm) SETFORM } { (f1.frm) SETFORM } ] SETPAGEDEF",
            ),
            ("/jobs/f1.frm", "(x) SH"),
        ])
        .unwrap();
        assert_eq!(t.overlays.len(), 1);
    }

    #[test]
    fn configured_extra_overlay_is_translated() {
        let config = TranslateConfig {
            extra_overlays: vec!["terms.frm".into()],
            ..TranslateConfig::default()
        };
        let t = translate_with_provider(
            Path::new("/jobs/main.dbm"),
            &config,
            &provider(&[("/jobs/main.dbm", "(x) SH"), ("/jobs/terms.frm", "(t) SH")]),
        )
        .unwrap();
        assert_eq!(t.overlays[0].name, "TERMS");
    }

    #[test]
    fn overlay_parse_error_is_fatal() {
        let err = run(&[
            ("/jobs/main.dbm", "(bad.frm) SETFORM"),
            ("/jobs/bad.frm", "{ (x) SH"),
        ])
        .unwrap_err();
        assert_eq!(err.stage(), "parse");
        assert_eq!(err.file(), "/jobs/bad.frm");
    }

    #[test]
    fn leftover_operands_are_reported() {
        let t = run(&[("/jobs/main.dbm", "(x) SH 42")]).unwrap();
        assert_eq!(t.report.unused_operands.len(), 1);
        assert_eq!(t.report.unused_operands[0].operand, "42");
    }

    #[test]
    fn translation_is_deterministic() {
        let files = [
            ("/jobs/main.dbm", "/FA /ARIAL 8 INDEXFONT (f.frm) SETFORM FA 10 20 MOVETO (a) SH"),
            ("/jobs/f.frm", "/FA /COURIER 10 INDEXFONT FA (b) SH"),
        ];
        let a = run(&files).unwrap();
        let b = run(&files).unwrap();
        assert_eq!(a.dfa, b.dfa);
        assert_eq!(a.overlays, b.overlays);
    }
}
