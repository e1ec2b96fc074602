//! Cross-file conflict resolution for font and color aliases.
//!
//! Documents are processed in order, main document first, so its
//! definitions always keep their names. A later file that defines an alias
//! with different attributes has it renamed to `ALIAS_N`, and every
//! reference inside that file is rewritten before generation.

use crate::ast::{self, CommandKind, Document, Operand};
use crate::report::{ConflictWarning, Report, SymbolKind};
use crate::symbols::{rename_font_switches, ColorEntry, FontEntry, SymbolTable};
use std::collections::{BTreeMap, BTreeSet};

/// Merged, conflict-free symbol tables for one translation.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSymbols {
    pub fonts: BTreeMap<String, FontEntry>,
    pub colors: BTreeMap<String, ColorEntry>,
    /// Per-document tables after renaming, in input order
    pub tables: Vec<SymbolTable>,
}

impl ResolvedSymbols {
    pub fn font_aliases(&self) -> BTreeSet<String> {
        self.fonts.keys().cloned().collect()
    }

    pub fn font_size(&self, alias: &str) -> Option<f64> {
        self.fonts.get(alias).map(|f| f.size)
    }
}

/// An alias definition that can be compared and renamed.
trait Definition: Clone {
    fn alias(&self) -> &str;
    fn same_as(&self, other: &Self) -> bool;
    fn renamed_from(&self) -> Option<&str>;
    fn rename(&mut self, to: &str);
    fn location(&self) -> (&str, u32);
}

impl Definition for FontEntry {
    fn alias(&self) -> &str {
        &self.alias
    }
    fn same_as(&self, other: &Self) -> bool {
        self.same_definition(other)
    }
    fn renamed_from(&self) -> Option<&str> {
        self.renamed_from.as_deref()
    }
    fn rename(&mut self, to: &str) {
        self.renamed_from = Some(std::mem::replace(&mut self.alias, to.to_owned()));
    }
    fn location(&self) -> (&str, u32) {
        (&self.file, self.line)
    }
}

impl Definition for ColorEntry {
    fn alias(&self) -> &str {
        &self.alias
    }
    fn same_as(&self, other: &Self) -> bool {
        self.rgb == other.rgb
    }
    fn renamed_from(&self) -> Option<&str> {
        self.renamed_from.as_deref()
    }
    fn rename(&mut self, to: &str) {
        self.renamed_from = Some(std::mem::replace(&mut self.alias, to.to_owned()));
    }
    fn location(&self) -> (&str, u32) {
        (&self.file, self.line)
    }
}

/// Allocates `ALIAS_N` names with one counter per base alias.
struct Renamer {
    used: BTreeSet<String>,
    counters: BTreeMap<String, u32>,
}

impl Renamer {
    fn new(used: BTreeSet<String>) -> Self {
        Renamer {
            used,
            counters: BTreeMap::new(),
        }
    }

    fn next(&mut self, base: &str) -> String {
        let counter = self.counters.entry(base.to_owned()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}_{}", base, counter);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// Merge one file's definitions into `global`, returning the renames the
/// file needs.
fn merge<E: Definition>(
    kind: SymbolKind,
    defs: &BTreeMap<String, E>,
    global: &mut BTreeMap<String, E>,
    renamer: &mut Renamer,
    report: &mut Report,
) -> (BTreeMap<String, String>, BTreeMap<String, E>) {
    let mut renames = BTreeMap::new();
    let mut local = BTreeMap::new();
    for (alias, entry) in defs {
        let existing = match global.get(alias) {
            None => {
                global.insert(alias.clone(), entry.clone());
                local.insert(alias.clone(), entry.clone());
                continue;
            }
            Some(existing) => existing,
        };
        if existing.same_as(entry) {
            tracing::debug!(%kind, alias = %alias, "identical redefinition merged");
            local.insert(alias.clone(), entry.clone());
            continue;
        }
        let original_file = existing.location().0.to_owned();
        let reuse = global
            .values()
            .find(|e| e.renamed_from() == Some(alias.as_str()) && e.same_as(entry))
            .map(|e| e.alias().to_owned());
        let new_alias = match reuse {
            Some(name) => name,
            None => {
                let name = renamer.next(alias);
                let mut renamed = entry.clone();
                renamed.rename(&name);
                global.insert(name.clone(), renamed);
                name
            }
        };
        let (file, line) = entry.location();
        report.conflict(ConflictWarning {
            kind,
            alias: alias.clone(),
            renamed_to: new_alias.clone(),
            file: file.to_owned(),
            line,
            original_file,
        });
        let mut renamed = entry.clone();
        renamed.rename(&new_alias);
        local.insert(new_alias.clone(), renamed);
        renames.insert(alias.clone(), new_alias);
    }
    (renames, local)
}

/// Resolve alias conflicts across `docs` (main document first) and rewrite
/// the affected references in place.
pub fn resolve_conflicts(docs: &mut [Document], report: &mut Report) -> ResolvedSymbols {
    let tables: Vec<SymbolTable> = docs.iter().map(SymbolTable::collect).collect();
    let mut font_names = Renamer::new(tables.iter().flat_map(|t| t.fonts.keys().cloned()).collect());
    let mut color_names =
        Renamer::new(tables.iter().flat_map(|t| t.colors.keys().cloned()).collect());

    let mut resolved = ResolvedSymbols::default();
    for (doc, mut table) in docs.iter_mut().zip(tables) {
        let file_fonts: BTreeSet<String> = table.fonts.keys().cloned().collect();
        let (font_renames, fonts) = merge(
            SymbolKind::Font,
            &table.fonts,
            &mut resolved.fonts,
            &mut font_names,
            report,
        );
        let (color_renames, colors) = merge(
            SymbolKind::Color,
            &table.colors,
            &mut resolved.colors,
            &mut color_names,
            report,
        );
        if !font_renames.is_empty() || !color_renames.is_empty() {
            rewrite_references(doc, &file_fonts, &font_renames, &color_renames);
        }
        table.fonts = fonts;
        table.colors = colors;
        resolved.tables.push(table);
    }
    tracing::info!(
        fonts = resolved.fonts.len(),
        colors = resolved.colors.len(),
        conflicts = report.conflicts.len(),
        "symbol tables resolved"
    );
    resolved
}

fn rewrite_references(
    doc: &mut Document,
    file_fonts: &BTreeSet<String>,
    fonts: &BTreeMap<String, String>,
    colors: &BTreeMap<String, String>,
) {
    ast::walk_mut(&mut doc.commands, &mut |cmd| match &mut cmd.kind {
        CommandKind::SelectFont(alias) | CommandKind::DefineFont { alias, .. } => {
            if let Some(new) = fonts.get(alias.as_str()) {
                *alias = new.clone();
            }
        }
        CommandKind::SelectColor(alias) | CommandKind::DefineColor { alias, .. } => {
            if let Some(new) = colors.get(alias.as_str()) {
                *alias = new.clone();
            }
        }
        CommandKind::Show { text, .. } => rewrite_text(text, file_fonts, fonts),
        CommandKind::SetVar { value, .. } => rewrite_text(value, file_fonts, fonts),
        CommandKind::DrawBox { style, .. } => rewrite_style(style, colors),
        _ => {}
    });
}

fn rewrite_text(op: &mut Operand, file_fonts: &BTreeSet<String>, fonts: &BTreeMap<String, String>) {
    match op {
        Operand::Str { text, .. } if text.contains("~~") => {
            *text = rename_font_switches(text, file_fonts, fonts);
        }
        Operand::Array(items) => {
            for item in items {
                rewrite_text(item, file_fonts, fonts);
            }
        }
        _ => {}
    }
}

/// Style words name a color either whole (`R`) or as the part before an
/// underscore (`R_S1`).
fn rewrite_style(op: &mut Operand, colors: &BTreeMap<String, String>) {
    match op {
        Operand::Ident(word) | Operand::Name(word) => {
            if let Some(new) = colors.get(word.as_str()) {
                *word = new.clone();
                return;
            }
            if let Some((head, tail)) = word.split_once('_') {
                if let Some(new) = colors.get(head) {
                    *word = format!("{}_{}", new, tail);
                }
            }
        }
        Operand::Array(items) => {
            for item in items {
                rewrite_style(item, colors);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::DocumentKind;
    use crate::parser::{parse_source, KnownAliases};

    fn doc(src: &str, file: &str, kind: DocumentKind) -> Document {
        parse_source(src, file, kind, &KnownAliases::default()).unwrap()
    }

    fn selected_fonts(doc: &Document) -> Vec<String> {
        let mut out = Vec::new();
        ast::walk(&doc.commands, &mut |c| {
            if let CommandKind::SelectFont(a) = &c.kind {
                out.push(a.clone());
            }
        });
        out
    }

    #[test]
    fn differing_overlay_font_is_renamed_and_references_follow() {
        let main = doc("/FA /ARIAL 8 INDEXFONT FA (m) SH", "m.dbm", DocumentKind::Main);
        let overlay = doc(
            "/FA /ARIALB 12 INDEXFONT FA (o) SH (~~FAx) SH",
            "o.frm",
            DocumentKind::Overlay,
        );
        let mut docs = vec![main, overlay];
        let mut report = Report::new();
        let resolved = resolve_conflicts(&mut docs, &mut report);

        assert_eq!(resolved.fonts.len(), 2, "exactly two distinct font definitions");
        assert_eq!(resolved.fonts["FA"].font, "ARIAL");
        assert_eq!(resolved.fonts["FA_1"].font, "ARIALB");
        assert_eq!(resolved.fonts["FA_1"].renamed_from.as_deref(), Some("FA"));
        assert_eq!(selected_fonts(&docs[0]), vec!["FA"]);
        assert_eq!(selected_fonts(&docs[1]), vec!["FA_1"]);
        assert!(matches!(
            &docs[1].commands[3].kind,
            CommandKind::Show { text: Operand::Str { text, .. }, .. } if text == "~~FA_1x"
        ));
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].renamed_to, "FA_1");
        assert_eq!(report.conflicts[0].original_file, "m.dbm");
    }

    #[test]
    fn identical_redefinition_is_merged() {
        let mut docs = vec![
            doc("/FA /ARIAL 8 INDEXFONT", "m.dbm", DocumentKind::Main),
            doc("/FA /arial 8 INDEXFONT FA", "o.frm", DocumentKind::Overlay),
        ];
        let mut report = Report::new();
        let resolved = resolve_conflicts(&mut docs, &mut report);
        assert_eq!(resolved.fonts.len(), 1);
        assert!(report.conflicts.is_empty());
        assert_eq!(selected_fonts(&docs[1]), vec!["FA"]);
    }

    #[test]
    fn rename_skips_names_already_in_use() {
        let mut docs = vec![
            doc("/FA /ARIAL 8 INDEXFONT /FA_1 /TIMES 9 INDEXFONT", "m.dbm", DocumentKind::Main),
            doc("/FA /COURIER 10 INDEXFONT FA", "o.frm", DocumentKind::Overlay),
        ];
        let mut report = Report::new();
        let resolved = resolve_conflicts(&mut docs, &mut report);
        assert_eq!(selected_fonts(&docs[1]), vec!["FA_2"]);
        assert_eq!(resolved.fonts.len(), 3);
    }

    #[test]
    fn second_overlay_reuses_matching_rename() {
        let mut docs = vec![
            doc("/FA /ARIAL 8 INDEXFONT", "m.dbm", DocumentKind::Main),
            doc("/FA /TIMES 9 INDEXFONT FA", "a.frm", DocumentKind::Overlay),
            doc("/FA /TIMES 9 INDEXFONT FA", "b.frm", DocumentKind::Overlay),
        ];
        let mut report = Report::new();
        let resolved = resolve_conflicts(&mut docs, &mut report);
        assert_eq!(resolved.fonts.len(), 2);
        assert_eq!(selected_fonts(&docs[2]), vec!["FA_1"]);
    }

    #[test]
    fn color_conflicts_rename_selects_and_box_styles() {
        let mut docs = vec![
            doc("/HL RED INDEXCOLOR", "m.dbm", DocumentKind::Main),
            doc(
                "/HL BLUE INDEXCOLOR HL 0 0 10 10 HL_S1 DRAWB",
                "o.frm",
                DocumentKind::Overlay,
            ),
        ];
        let mut report = Report::new();
        let resolved = resolve_conflicts(&mut docs, &mut report);
        assert_eq!(resolved.colors.len(), 2);
        assert!(matches!(&docs[1].commands[1].kind, CommandKind::SelectColor(c) if c == "HL_1"));
        assert!(matches!(
            &docs[1].commands[2].kind,
            CommandKind::DrawBox { style: Operand::Ident(s), .. } if s == "HL_1_S1"
        ));
        assert_eq!(report.conflicts[0].kind, SymbolKind::Color);
    }
}
